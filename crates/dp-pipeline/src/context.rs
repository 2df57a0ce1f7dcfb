//! Per-run state shared by all steps.

use std::fmt;
use std::sync::Arc;

use dp_av::ToolRegistry;
use dp_core::config::TransferConfig;
use dp_core::config::DEFAULT_PROFILE_IDENTIFIER;
use dp_core::{Error, Job, PackageFormat, Result};

use crate::collaborators::CredentialedClientFactory;
use crate::resolver::MetadataResolver;

/// Position of a run in the packaging state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Configured,
    Staged,
    Classified,
    PosterGenerated,
    DerivativesDelivered,
    Enveloped,
    Compressed,
    Delivered,
    CleanedUp,
    Notified,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Configured => "configured",
            Self::Staged => "staged",
            Self::Classified => "classified",
            Self::PosterGenerated => "poster_generated",
            Self::DerivativesDelivered => "derivatives_delivered",
            Self::Enveloped => "enveloped",
            Self::Compressed => "compressed",
            Self::Delivered => "delivered",
            Self::CleanedUp => "cleaned_up",
            Self::Notified => "notified",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deployment-wide settings the steps need besides the job itself.
#[derive(Debug, Clone)]
pub struct PackagerOptions {
    /// Parameter store path holding the registry settings.
    pub parameter_path: String,
    pub transfer: TransferConfig,
    /// Value of `BagIt-Profile-Identifier`.
    pub profile_identifier: String,
}

impl PackagerOptions {
    pub fn new(parameter_path: impl Into<String>) -> Self {
        Self {
            parameter_path: parameter_path.into(),
            transfer: TransferConfig::default(),
            profile_identifier: DEFAULT_PROFILE_IDENTIFIER.to_string(),
        }
    }
}

/// Mutable state threaded through the steps of one run.
pub struct RunContext {
    pub job: Job,
    pub options: PackagerOptions,
    pub tools: Arc<ToolRegistry>,
    pub factory: Arc<dyn CredentialedClientFactory>,
    /// `Unknown` until classified, or the variant's implicit format.
    pub format: PackageFormat,
    /// Last state reached.
    pub state: JobState,
    resolver: Option<MetadataResolver>,
}

impl RunContext {
    pub fn new(
        job: Job,
        options: PackagerOptions,
        tools: Arc<ToolRegistry>,
        factory: Arc<dyn CredentialedClientFactory>,
    ) -> Self {
        let format = job.variant().initial_format();
        Self {
            job,
            options,
            tools,
            factory,
            format,
            state: JobState::Pending,
            resolver: None,
        }
    }

    pub fn set_resolver(&mut self, resolver: MetadataResolver) {
        self.resolver = Some(resolver);
    }

    /// Registry resolver built by the configuration step.
    pub fn resolver(&self) -> Result<&MetadataResolver> {
        self.resolver
            .as_ref()
            .ok_or_else(|| Error::Internal("registry used before configuration was loaded".into()))
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("job", &self.job)
            .field("format", &self.format)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
