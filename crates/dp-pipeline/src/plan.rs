//! Derivative upload plans.
//!
//! A plan depends on the package format, the job and the staged file names:
//! which staged files go to which destination, under which key, with which
//! content type. Object keys are always `<refid>.<ext>` in lowercase, whatever
//! the staged file is called.

use std::path::{Path, PathBuf};

use dp_av::POSTER_FILE_NAME;
use dp_core::{DestinationRole, Error, Job, PackageFormat, RefId, Result};

use crate::classify::has_extension;

/// One file to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub role: DestinationRole,
    /// Local file inside the staged directory.
    pub source: PathBuf,
    /// Destination bucket.
    pub destination: String,
    /// Object key at the destination.
    pub key: String,
    pub content_type: &'static str,
}

/// Ordered uploads for one job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivativePlan {
    pub entries: Vec<PlanEntry>,
}

impl DerivativePlan {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter()
    }
}

/// (role, fixed staged file name or `None` to look it up by extension,
/// extension, content type)
type Template = (DestinationRole, Option<&'static str>, &'static str, &'static str);

const VIDEO: &[Template] = &[
    (DestinationRole::VideoMezzanine, None, "mkv", "video/x-matroska"),
    (DestinationRole::VideoAccess, None, "mp4", "video/mp4"),
    (DestinationRole::VideoPoster, Some(POSTER_FILE_NAME), "png", "image/png"),
];

const AUDIO: &[Template] = &[(DestinationRole::AudioAccess, None, "mp3", "audio/mpeg")];

/// Staged file carrying extension `ext`, compared case-insensitively.
///
/// `<refid>.<ext>` wins; otherwise a single file with that extension is
/// taken.
fn find_derivative<'a>(staged_files: &'a [String], refid: &RefId, ext: &str) -> Result<&'a str> {
    let candidates: Vec<&'a str> = staged_files
        .iter()
        .map(String::as_str)
        .filter(|name| has_extension(name, &[ext]))
        .collect();

    let named = candidates.iter().copied().find(|name| {
        Path::new(name)
            .file_stem()
            .is_some_and(|stem| stem == refid.as_str())
    });
    match (named, candidates.as_slice()) {
        (Some(name), _) => Ok(name),
        (None, [only]) => Ok(*only),
        (None, []) => Err(Error::Precondition(format!(
            "expected derivative {refid}.{ext} not found among staged files [{}]",
            staged_files.join(", ")
        ))),
        (None, many) => Err(Error::Precondition(format!(
            "expected derivative {refid}.{ext}, found several .{ext} files: [{}]",
            many.join(", ")
        ))),
    }
}

/// Build the derivative plan for `format` from the staged file names.
///
/// # Errors
///
/// [`Error::Config`] when the job has no destination for a role the plan
/// needs, [`Error::Precondition`] when a derivative is missing from
/// `staged_files` or cannot be told apart from another file.
pub fn plan(format: PackageFormat, job: &Job, staged_files: &[String]) -> Result<DerivativePlan> {
    let templates = match format {
        PackageFormat::Video => VIDEO,
        PackageFormat::Audio => AUDIO,
        PackageFormat::Image | PackageFormat::Unknown => &[],
    };

    let staged = job.bag_dir();
    let refid = job.refid();
    let entries = templates
        .iter()
        .map(|&(role, file_name, ext, content_type)| {
            let key = format!("{refid}.{ext}");
            let source = match file_name {
                Some(name) => staged.join(name),
                None => staged.join(find_derivative(staged_files, refid, ext)?),
            };
            Ok(PlanEntry {
                role,
                source,
                destination: job.destinations().get(role)?.to_string(),
                key,
                content_type,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(DerivativePlan { entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use dp_core::{DestinationSet, PipelineVariant};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn job() -> Job {
        let destinations = DestinationSet {
            package: "packages".into(),
            video_mezzanine: Some("mezzanine".into()),
            video_access: Some("video-access".into()),
            video_poster: Some("posters".into()),
            audio_access: Some("audio-access".into()),
        };
        Job::new(
            RefId::new("abc").unwrap(),
            "1",
            "/tmp/work",
            "/source",
            destinations,
            PipelineVariant::AudioVisual,
            "topic",
        )
        .unwrap()
    }

    #[test]
    fn video_plan() {
        let staged = names(&["abc.mkv", "abc.mov", "abc.mp4"]);
        let plan = plan(PackageFormat::Video, &job(), &staged).unwrap();
        assert_eq!(plan.len(), 3);
        let poster = &plan.entries[2];
        assert_eq!(poster.source, PathBuf::from("/tmp/work/abc/poster.png"));
        assert_eq!(poster.key, "abc.png");
        assert_eq!(poster.destination, "posters");
        assert_eq!(poster.content_type, "image/png");
        assert_eq!(plan.entries[0].key, "abc.mkv");
        assert_eq!(plan.entries[0].content_type, "video/x-matroska");
        assert_eq!(plan.entries[1].destination, "video-access");
    }

    #[test]
    fn audio_plan() {
        let staged = names(&["abc.mp3", "abc.wav"]);
        let plan = plan(PackageFormat::Audio, &job(), &staged).unwrap();
        assert_eq!(plan.len(), 1);
        let entry = &plan.entries[0];
        assert_eq!(entry.source, PathBuf::from("/tmp/work/abc/abc.mp3"));
        assert_eq!(entry.destination, "audio-access");
        assert_eq!(entry.content_type, "audio/mpeg");
    }

    #[test]
    fn image_and_unknown_plans_are_empty() {
        assert!(plan(PackageFormat::Image, &job(), &[]).unwrap().is_empty());
        assert!(plan(PackageFormat::Unknown, &job(), &[]).unwrap().is_empty());
    }

    #[test]
    fn uppercase_extension_keeps_lowercase_key() {
        let staged = names(&["abc.MP3", "abc.wav"]);
        let plan = plan(PackageFormat::Audio, &job(), &staged).unwrap();
        let entry = &plan.entries[0];
        assert_eq!(entry.source, PathBuf::from("/tmp/work/abc/abc.MP3"));
        assert_eq!(entry.key, "abc.mp3");
    }

    #[test]
    fn single_derivative_under_another_name() {
        let staged = names(&["track01.mp3", "track01.wav"]);
        let plan = plan(PackageFormat::Audio, &job(), &staged).unwrap();
        assert_eq!(plan.entries[0].source, PathBuf::from("/tmp/work/abc/track01.mp3"));
        assert_eq!(plan.entries[0].key, "abc.mp3");
    }

    #[test]
    fn refid_named_derivative_wins() {
        let staged = names(&["abc.mp3", "extra.mp3", "abc.wav"]);
        let plan = plan(PackageFormat::Audio, &job(), &staged).unwrap();
        assert_eq!(plan.entries[0].source, PathBuf::from("/tmp/work/abc/abc.mp3"));
    }

    #[test]
    fn missing_or_ambiguous_derivative_fails() {
        let err = plan(PackageFormat::Video, &job(), &names(&["abc.mov", "abc.mp4"])).unwrap_err();
        assert_matches!(err, Error::Precondition(ref msg) if msg.contains("abc.mkv"));

        let err = plan(PackageFormat::Audio, &job(), &names(&["a.mp3", "b.mp3"])).unwrap_err();
        assert_matches!(err, Error::Precondition(ref msg) if msg.contains("a.mp3, b.mp3"));
    }

    #[test]
    fn missing_destination_fails() {
        let job = Job::new(
            RefId::new("abc").unwrap(),
            "1",
            "/tmp/work",
            "/source",
            DestinationSet::new("packages"),
            PipelineVariant::AudioVisual,
            "topic",
        )
        .unwrap();
        let err = plan(PackageFormat::Audio, &job, &names(&["abc.mp3"])).unwrap_err();
        assert_eq!(err.kind(), dp_core::ErrorKind::Config);
    }
}
