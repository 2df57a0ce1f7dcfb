//! The [`Step`] trait defines a single pipeline step.
//!
//! Each step decides whether it applies to the current run, does its work,
//! and names the [`JobState`] the run reaches once it succeeds.

use async_trait::async_trait;

use crate::context::{JobState, RunContext};

#[async_trait]
pub trait Step: Send + Sync {
    /// State reached when this step succeeds; also the step's name in errors
    /// and logs.
    fn reaches(&self) -> JobState;

    /// Whether the step runs for this job. Skipped steps leave the state
    /// unchanged.
    fn applies(&self, _ctx: &RunContext) -> bool {
        true
    }

    async fn execute(&self, ctx: &mut RunContext) -> dp_core::Result<()>;
}
