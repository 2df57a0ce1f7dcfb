//! Job model: package formats, pipeline variants, destinations, and the
//! immutable [`Job`] description of a single packaging run.
//!
//! All enums serialize in lowercase and implement `Display` manually for a
//! consistent string representation in notifications and logs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::ids::RefId;
use crate::{Error, Result};

/// File extension of the compressed package.
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

// ---------------------------------------------------------------------------
// PackageFormat
// ---------------------------------------------------------------------------

/// Classification of a staged object.
///
/// `Unknown` is the state of an audio/video job before classification has
/// run; failure notifications report it verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageFormat {
    #[default]
    Unknown,
    Image,
    Audio,
    Video,
}

impl PackageFormat {
    /// Lowercase name used in notification attributes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for PackageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PipelineVariant
// ---------------------------------------------------------------------------

/// Deployment variant of the packaging pipeline.
///
/// Each variant is a capability descriptor: it decides which optional steps
/// run and which fixed strings end up in the bag and the notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineVariant {
    /// Digitized still images. Format is implicit, no derivatives.
    Image,
    /// Digitized audio and video. Format is classified from the staged files.
    #[serde(alias = "av")]
    AudioVisual,
}

impl PipelineVariant {
    /// Service name reported in notifications.
    pub fn service_name(&self) -> &'static str {
        match self {
            Self::Image => "digitized_image_packaging",
            Self::AudioVisual => "digitized_av_packaging",
        }
    }

    /// Provenance origin written to the bag metadata.
    pub fn origin(&self) -> &'static str {
        match self {
            Self::Image => "digitization",
            Self::AudioVisual => "av_digitization",
        }
    }

    /// Format the job starts with before any step runs.
    pub fn initial_format(&self) -> PackageFormat {
        match self {
            Self::Image => PackageFormat::Image,
            Self::AudioVisual => PackageFormat::Unknown,
        }
    }

    /// Whether the staged files must be classified.
    pub fn classifies(&self) -> bool {
        matches!(self, Self::AudioVisual)
    }
}

impl fmt::Display for PipelineVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::AudioVisual => write!(f, "audiovisual"),
        }
    }
}

// ---------------------------------------------------------------------------
// Destinations
// ---------------------------------------------------------------------------

/// Role of an uploaded artifact, used to select its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationRole {
    Package,
    VideoMezzanine,
    VideoAccess,
    VideoPoster,
    AudioAccess,
}

impl fmt::Display for DestinationRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Package => write!(f, "package"),
            Self::VideoMezzanine => write!(f, "video_mezzanine"),
            Self::VideoAccess => write!(f, "video_access"),
            Self::VideoPoster => write!(f, "video_poster"),
            Self::AudioAccess => write!(f, "audio_access"),
        }
    }
}

/// Named storage targets keyed by artifact role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationSet {
    pub package: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_mezzanine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_access: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_poster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_access: Option<String>,
}

impl DestinationSet {
    /// Create a set with only the package destination.
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            ..Self::default()
        }
    }

    /// Look up the destination for a role.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when no (non-empty) destination is configured
    /// for the role.
    pub fn get(&self, role: DestinationRole) -> Result<&str> {
        let value = match role {
            DestinationRole::Package => Some(self.package.as_str()),
            DestinationRole::VideoMezzanine => self.video_mezzanine.as_deref(),
            DestinationRole::VideoAccess => self.video_access.as_deref(),
            DestinationRole::VideoPoster => self.video_poster.as_deref(),
            DestinationRole::AudioAccess => self.audio_access.as_deref(),
        };
        value
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::Config(format!("no destination configured for {role}")))
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// Everything one invocation needs to package a single archival object.
///
/// Immutable for the duration of the run.
#[derive(Debug, Clone)]
pub struct Job {
    refid: RefId,
    rights_ids: Vec<String>,
    tmp_dir: PathBuf,
    source_dir: PathBuf,
    destinations: DestinationSet,
    variant: PipelineVariant,
    topic: String,
}

impl Job {
    /// Build a job from invocation parameters.
    ///
    /// `rights_ids` is the raw comma-separated list supplied by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the rights list is empty after parsing or
    /// if the package destination or topic is blank.
    pub fn new(
        refid: RefId,
        rights_ids: &str,
        tmp_dir: impl Into<PathBuf>,
        source_dir: impl Into<PathBuf>,
        destinations: DestinationSet,
        variant: PipelineVariant,
        topic: impl Into<String>,
    ) -> Result<Self> {
        let rights_ids = parse_rights_ids(rights_ids);
        if rights_ids.is_empty() {
            return Err(Error::Config("at least one rights id is required".into()));
        }
        destinations.get(DestinationRole::Package)?;
        let topic = topic.into();
        if topic.trim().is_empty() {
            return Err(Error::Config("notification topic must not be empty".into()));
        }

        Ok(Self {
            refid,
            rights_ids,
            tmp_dir: tmp_dir.into(),
            source_dir: source_dir.into(),
            destinations,
            variant,
            topic,
        })
    }

    pub fn refid(&self) -> &RefId {
        &self.refid
    }

    pub fn rights_ids(&self) -> &[String] {
        &self.rights_ids
    }

    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn destinations(&self) -> &DestinationSet {
        &self.destinations
    }

    pub fn variant(&self) -> PipelineVariant {
        self.variant
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Staged copy of the object inside the working directory; also the bag
    /// directory once enveloped.
    pub fn bag_dir(&self) -> PathBuf {
        self.tmp_dir.join(self.refid.as_str())
    }

    /// Original input directory of the object.
    pub fn source_path(&self) -> PathBuf {
        self.source_dir.join(self.refid.as_str())
    }

    /// Compressed package path, a sibling of the bag directory.
    pub fn archive_path(&self) -> PathBuf {
        self.tmp_dir
            .join(format!("{}.{ARCHIVE_EXTENSION}", self.refid))
    }
}

/// Split a comma-separated rights list, trimming entries and dropping blanks.
pub fn parse_rights_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(variant: PipelineVariant) -> Job {
        Job::new(
            RefId::new("b90862f3baceaae3b7418c78f9d50d52").unwrap(),
            "1, 2",
            "tmp",
            "source",
            DestinationSet::new("destination"),
            variant,
            "topic",
        )
        .unwrap()
    }

    #[test]
    fn derived_paths() {
        let job = job(PipelineVariant::Image);
        assert_eq!(job.bag_dir(), PathBuf::from("tmp/b90862f3baceaae3b7418c78f9d50d52"));
        assert_eq!(
            job.source_path(),
            PathBuf::from("source/b90862f3baceaae3b7418c78f9d50d52")
        );
        assert_eq!(
            job.archive_path(),
            PathBuf::from("tmp/b90862f3baceaae3b7418c78f9d50d52.tar.gz")
        );
    }

    #[test]
    fn rights_ids_are_trimmed() {
        assert_eq!(job(PipelineVariant::Image).rights_ids(), ["1", "2"]);
        assert_eq!(parse_rights_ids(" a ,, b,"), vec!["a", "b"]);
    }

    #[test]
    fn empty_rights_rejected() {
        let result = Job::new(
            RefId::new("abc").unwrap(),
            " , ",
            "tmp",
            "source",
            DestinationSet::new("destination"),
            PipelineVariant::Image,
            "topic",
        );
        assert!(result.is_err());
    }

    #[test]
    fn variant_descriptors() {
        assert_eq!(PipelineVariant::Image.initial_format(), PackageFormat::Image);
        assert_eq!(
            PipelineVariant::AudioVisual.initial_format(),
            PackageFormat::Unknown
        );
        assert!(!PipelineVariant::Image.classifies());
        assert!(PipelineVariant::AudioVisual.classifies());
        assert_eq!(PipelineVariant::Image.origin(), "digitization");
        assert_eq!(PipelineVariant::AudioVisual.origin(), "av_digitization");
        assert_eq!(
            PipelineVariant::Image.service_name(),
            "digitized_image_packaging"
        );
    }

    #[test]
    fn destination_lookup() {
        let mut set = DestinationSet::new("packages");
        set.audio_access = Some("audio".into());
        set.video_access = Some("  ".into());
        assert_eq!(set.get(DestinationRole::Package).unwrap(), "packages");
        assert_eq!(set.get(DestinationRole::AudioAccess).unwrap(), "audio");
        assert!(set.get(DestinationRole::VideoAccess).is_err());
        assert!(set.get(DestinationRole::VideoPoster).is_err());
    }

    #[test]
    fn format_strings() {
        assert_eq!(PackageFormat::default(), PackageFormat::Unknown);
        assert_eq!(PackageFormat::Unknown.to_string(), "unknown");
        assert_eq!(PackageFormat::Audio.as_str(), "audio");
        let json = serde_json::to_string(&PackageFormat::Video).unwrap();
        assert_eq!(json, "\"video\"");
    }

    #[test]
    fn variant_accepts_av_alias() {
        let v: PipelineVariant = serde_json::from_str("\"av\"").unwrap();
        assert_eq!(v, PipelineVariant::AudioVisual);
    }
}
