//! Application configuration types.
//!
//! The top-level [`Config`] is deserialized from the TOML config file and
//! carries the deployment-wide settings: tool paths, transfer tuning, and the
//! locations of the storage, notification, and parameter collaborators. Every
//! section defaults sensibly so an empty file is valid. Per-job values
//! (refid, rights, directories, destinations) come from the invocation, not
//! from this file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::job::PipelineVariant;

/// Default BagIt profile identifier written into every bag.
pub const DEFAULT_PROFILE_IDENTIFIER: &str = "zorya_bagit_profile.json";

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub variant: PipelineVariant,
    pub tools: ToolsConfig,
    pub transfer: TransferConfig,
    pub storage: StorageConfig,
    pub notifications: NotificationConfig,
    pub parameters: ParameterConfig,
    pub bag: BagConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            variant: PipelineVariant::Image,
            tools: ToolsConfig::default(),
            transfer: TransferConfig::default(),
            storage: StorageConfig::default(),
            notifications: NotificationConfig::default(),
            parameters: ParameterConfig::default(),
            bag: BagConfig::default(),
        }
    }
}

impl Config {
    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.transfer.multipart_chunksize == 0 {
            warnings.push(
                "transfer.multipart_chunksize is 0; multipart uploads are disabled and \
                 every file is sent in a single put"
                    .into(),
            );
        }
        if self.transfer.max_concurrency == 0 {
            warnings.push("transfer.max_concurrency is 0; 1 will be used".into());
        }
        if self.transfer.multipart_threshold < self.transfer.multipart_chunksize {
            warnings.push(
                "transfer.multipart_threshold is below multipart_chunksize; \
                 files between the two sizes go through a multipart upload of one part"
                    .into(),
            );
        }

        if self.notifications.endpoint.is_none() {
            warnings.push(
                "notifications.endpoint is not set; outcome events will only be logged".into(),
            );
        }

        if self.bag.profile_identifier.trim().is_empty() {
            warnings.push("bag.profile_identifier is empty; bags will fail validation".into());
        }

        if let Some(ref ffmpeg) = self.tools.ffmpeg_path {
            if !ffmpeg.exists() {
                warnings.push(format!(
                    "tools.ffmpeg_path {} does not exist; PATH will be searched",
                    ffmpeg.display()
                ));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
}

/// Tuning for chunked uploads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Files of at least this many bytes are uploaded in parts.
    pub multipart_threshold: u64,
    /// Size of each part in bytes.
    pub multipart_chunksize: u64,
    /// Maximum number of parts in flight at once.
    pub max_concurrency: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            multipart_threshold: 1024 * 25,
            multipart_chunksize: 1024 * 25,
            max_concurrency: 10,
        }
    }
}

/// Object store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory under which each destination is a subdirectory.
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./data/storage"),
        }
    }
}

/// Outcome notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// HTTP endpoint events are posted to. When unset, events are logged.
    pub endpoint: Option<String>,
    /// Bearer token sent with every publish, if any.
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Parameter store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterConfig {
    /// Root directory of the parameter tree. A parameter path such as
    /// `/dev/digitized_image_packaging` maps to a directory below this root
    /// whose files are the parameters.
    pub root: PathBuf,
}

impl Default for ParameterConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/etc/digipack/parameters"),
        }
    }
}

/// Bag writing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BagConfig {
    pub profile_identifier: String,
}

impl Default for BagConfig {
    fn default() -> Self {
        Self {
            profile_identifier: DEFAULT_PROFILE_IDENTIFIER.into(),
        }
    }
}
