//! Pipeline executor: runs a fixed sequence of [`Step`]s, stopping at the
//! first failure.

use crate::context::RunContext;
use crate::step::Step;

/// Runs steps in order against one [`RunContext`].
pub struct PipelineExecutor {
    steps: Vec<Box<dyn Step>>,
}

impl PipelineExecutor {
    pub fn new(steps: Vec<Box<dyn Step>>) -> Self {
        Self { steps }
    }

    /// Execute every applicable step.
    ///
    /// # Errors
    ///
    /// Returns the first step error wrapped in
    /// [`Error::Pipeline`](dp_core::Error::Pipeline) naming the step. Later
    /// steps do not run; `ctx.state` is the last state reached.
    pub async fn execute(&self, ctx: &mut RunContext) -> dp_core::Result<()> {
        if self.steps.is_empty() {
            return Err(dp_core::Error::Internal("no steps to execute".into()));
        }

        let total = self.steps.len();
        for (i, step) in self.steps.iter().enumerate() {
            let name = step.reaches();
            if !step.applies(ctx) {
                tracing::debug!("Skipping: {}", name);
                continue;
            }

            tracing::debug!("Starting: {}", name);
            step.execute(ctx)
                .await
                .map_err(|e| dp_core::Error::pipeline(name.as_str(), e))?;
            ctx.state = name;

            let pct = ((i + 1) as f32 / total as f32) * 100.0;
            tracing::info!("[{:.0}%] Completed: {}", pct, name);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{JobState, PackagerOptions};
    use crate::memory::{MemoryClientFactory, StaticParameterStore, StaticRegistry};
    use async_trait::async_trait;
    use dp_core::{DestinationSet, Job, PipelineVariant, RefId};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn ctx() -> RunContext {
        let job = Job::new(
            RefId::new("abc").unwrap(),
            "1",
            "tmp",
            "source",
            DestinationSet::new("packages"),
            PipelineVariant::Image,
            "topic",
        )
        .unwrap();
        RunContext::new(
            job,
            PackagerOptions::new("/dev/app"),
            Arc::new(dp_av::ToolRegistry::default()),
            Arc::new(MemoryClientFactory::new(
                StaticParameterStore::new(),
                StaticRegistry::new(),
            )),
        )
    }

    struct FakeOk {
        state: JobState,
        applies: bool,
        executed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Step for FakeOk {
        fn reaches(&self) -> JobState {
            self.state
        }
        fn applies(&self, _ctx: &RunContext) -> bool {
            self.applies
        }
        async fn execute(&self, _ctx: &mut RunContext) -> dp_core::Result<()> {
            self.executed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakeFail;

    #[async_trait]
    impl Step for FakeFail {
        fn reaches(&self) -> JobState {
            JobState::Enveloped
        }
        async fn execute(&self, _ctx: &mut RunContext) -> dp_core::Result<()> {
            Err(dp_core::Error::Bag("intentional failure".into()))
        }
    }

    fn ok(state: JobState, applies: bool, counter: &Arc<AtomicUsize>) -> Box<dyn Step> {
        Box::new(FakeOk {
            state,
            applies,
            executed: counter.clone(),
        })
    }

    #[tokio::test]
    async fn empty_pipeline_errors() {
        let mut ctx = ctx();
        assert!(PipelineExecutor::new(vec![]).execute(&mut ctx).await.is_err());
    }

    #[tokio::test]
    async fn steps_run_in_order_and_track_state() {
        let mut ctx = ctx();
        let counter = Arc::new(AtomicUsize::new(0));
        let executor = PipelineExecutor::new(vec![
            ok(JobState::Configured, true, &counter),
            ok(JobState::Staged, true, &counter),
        ]);
        executor.execute(&mut ctx).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(ctx.state, JobState::Staged);
    }

    #[tokio::test]
    async fn skipped_steps_do_not_run() {
        let mut ctx = ctx();
        let counter = Arc::new(AtomicUsize::new(0));
        let executor = PipelineExecutor::new(vec![
            ok(JobState::Staged, true, &counter),
            ok(JobState::Classified, false, &counter),
        ]);
        executor.execute(&mut ctx).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.state, JobState::Staged);
    }

    #[tokio::test]
    async fn failure_stops_pipeline_and_names_step() {
        let mut ctx = ctx();
        let counter = Arc::new(AtomicUsize::new(0));
        let executor = PipelineExecutor::new(vec![
            ok(JobState::Staged, true, &counter),
            Box::new(FakeFail),
            ok(JobState::Compressed, true, &counter),
        ]);
        let err = executor.execute(&mut ctx).await.unwrap_err();
        assert_eq!(err.step(), Some("enveloped"));
        assert!(err.to_string().contains("intentional failure"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.state, JobState::Staged);
    }
}
