//! The orchestrator: runs the pipeline for one job and implements the
//! failure contract.
//!
//! A run either completes every step (artifacts delivered, source removed,
//! success published) or stops at the first failing step. On failure the
//! working directory is purged, best effort, and a failure event is
//! published. The source is left in place for a retry.

use std::sync::Arc;

use dp_av::ToolRegistry;
use dp_core::{Error, Job, PackageFormat, Result};

use crate::cleanup;
use crate::collaborators::CredentialedClientFactory;
use crate::context::{JobState, PackagerOptions, RunContext};
use crate::executor::PipelineExecutor;
use crate::notifier::Notifier;
use crate::step::Step;
use crate::steps::standard_steps;

/// Terminal result of a run whose outcome was published.
#[derive(Debug)]
pub enum RunOutcome {
    Succeeded {
        format: PackageFormat,
    },
    Failed {
        format: PackageFormat,
        /// Last state reached before the failing step.
        state: JobState,
        error: Error,
    },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    pub fn format(&self) -> PackageFormat {
        match self {
            Self::Succeeded { format } | Self::Failed { format, .. } => *format,
        }
    }
}

pub struct Packager {
    job: Job,
    options: PackagerOptions,
    tools: Arc<ToolRegistry>,
    factory: Arc<dyn CredentialedClientFactory>,
    steps: Option<Vec<Box<dyn Step>>>,
}

impl Packager {
    pub fn new(
        job: Job,
        options: PackagerOptions,
        tools: Arc<ToolRegistry>,
        factory: Arc<dyn CredentialedClientFactory>,
    ) -> Self {
        Self {
            job,
            options,
            tools,
            factory,
            steps: None,
        }
    }

    /// Replace the standard step sequence.
    pub fn with_steps(mut self, steps: Vec<Box<dyn Step>>) -> Self {
        self.steps = Some(steps);
        self
    }

    /// Package the job.
    ///
    /// # Errors
    ///
    /// Pipeline failures are reported through [`RunOutcome::Failed`]. An
    /// error is returned only when the failure notification itself cannot be
    /// published.
    pub async fn run(self) -> Result<RunOutcome> {
        let Packager {
            job,
            options,
            tools,
            factory,
            steps,
        } = self;
        tracing::info!(
            "Packaging started for {} ({})",
            job.refid(),
            job.variant().service_name()
        );

        let executor = PipelineExecutor::new(steps.unwrap_or_else(standard_steps));
        let mut ctx = RunContext::new(job, options, tools, factory.clone());

        match executor.execute(&mut ctx).await {
            Ok(()) => {
                tracing::info!("Package {} successfully packaged.", ctx.job.refid());
                Ok(RunOutcome::Succeeded { format: ctx.format })
            }
            Err(error) => {
                tracing::error!(
                    "Package {} failed ({}): {}",
                    ctx.job.refid(),
                    error.kind(),
                    error
                );
                if let Err(cleanup_err) = cleanup::cleanup_failure(&ctx.job) {
                    tracing::warn!("Cleanup after failure did not complete: {}", cleanup_err);
                }
                Notifier::new(factory.pubsub()?)
                    .notify_failure(&ctx.job, ctx.format, &error)
                    .await?;
                Ok(RunOutcome::Failed {
                    format: ctx.format,
                    state: ctx.state,
                    error,
                })
            }
        }
    }
}
