//! Outcome notifications.

use std::sync::Arc;

use dp_core::events::JobEvent;
use dp_core::{Error, Job, PackageFormat, Result};

use crate::collaborators::PubSub;

/// Publishes one [`JobEvent`] per run.
pub struct Notifier {
    pubsub: Arc<dyn PubSub>,
}

impl Notifier {
    pub fn new(pubsub: Arc<dyn PubSub>) -> Self {
        Self { pubsub }
    }

    pub async fn notify_success(&self, job: &Job, format: PackageFormat) -> Result<()> {
        let event = JobEvent::success(job.refid().as_str(), job.variant().service_name(), format);
        self.publish(job, &event).await
    }

    /// Publish a failure event whose diagnostic carries the error and its
    /// trace.
    pub async fn notify_failure(&self, job: &Job, format: PackageFormat, error: &Error) -> Result<()> {
        let event = JobEvent::failure(
            job.refid().as_str(),
            job.variant().service_name(),
            format,
            &root_message(error),
            &render_trace(error),
        );
        self.publish(job, &event).await
    }

    async fn publish(&self, job: &Job, event: &JobEvent) -> Result<()> {
        tracing::debug!("Publishing {} for {} to {}", event.outcome, event.refid, job.topic());
        self.pubsub
            .publish(job.topic(), &event.message(), &event.attributes())
            .await
    }
}

/// The error the failing step raised, without the step wrapper.
fn step_error(error: &Error) -> &Error {
    match error {
        Error::Pipeline { source, .. } => step_error(source),
        other => other,
    }
}

fn root_message(error: &Error) -> String {
    step_error(error).to_string()
}

/// Failing step, error class, and the cause chain below the step's error.
///
/// The step error's own message is left out; it already heads the
/// diagnostic.
pub fn render_trace(error: &Error) -> String {
    let inner = step_error(error);
    let mut lines = Vec::new();
    if let Some(step) = error.step() {
        lines.push(format!("step: {step}"));
    }
    lines.push(format!("kind: {}", inner.kind()));

    let mut cause = std::error::Error::source(inner);
    while let Some(err) = cause {
        lines.push(format!("caused by: {err}"));
        cause = err.source();
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::RecordingPubSub;
    use dp_core::events::{ATTR_FORMAT, ATTR_MESSAGE, ATTR_OUTCOME, ATTR_SERVICE};
    use dp_core::{DestinationSet, PipelineVariant, RefId};

    fn job() -> Job {
        Job::new(
            RefId::new("abc").unwrap(),
            "1",
            "tmp",
            "source",
            DestinationSet::new("packages"),
            PipelineVariant::AudioVisual,
            "arn:topic",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn success_message() {
        let pubsub = Arc::new(RecordingPubSub::new());
        Notifier::new(pubsub.clone())
            .notify_success(&job(), PackageFormat::Audio)
            .await
            .unwrap();

        let messages = pubsub.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].topic, "arn:topic");
        assert_eq!(messages[0].message, "Package abc successfully packaged.");
        assert_eq!(messages[0].attributes[ATTR_OUTCOME], "SUCCESS");
        assert_eq!(messages[0].attributes[ATTR_SERVICE], "digitized_av_packaging");
        assert_eq!(messages[0].attributes[ATTR_FORMAT], "audio");
    }

    #[tokio::test]
    async fn failure_message_carries_trace() {
        let pubsub = Arc::new(RecordingPubSub::new());
        let error = Error::pipeline(
            "staged",
            Error::file(
                "/source/abc",
                std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
            ),
        );
        Notifier::new(pubsub.clone())
            .notify_failure(&job(), PackageFormat::Unknown, &error)
            .await
            .unwrap();

        let attrs = &pubsub.messages()[0].attributes;
        assert_eq!(attrs[ATTR_OUTCOME], "FAILURE");
        assert_eq!(attrs[ATTR_FORMAT], "unknown");
        let diagnostic = &attrs[ATTR_MESSAGE];
        assert!(diagnostic.starts_with("IO error at /source/abc: gone\n\n<pre>"));
        assert!(diagnostic.contains("step: staged"));
        assert!(diagnostic.contains("caused by: gone"));
        assert!(diagnostic.ends_with("</pre>"));
    }

    #[tokio::test]
    async fn publish_errors_propagate() {
        let pubsub = Arc::new(RecordingPubSub::new());
        pubsub.fail_publishes();
        let result = Notifier::new(pubsub)
            .notify_failure(&job(), PackageFormat::Unknown, &Error::Internal("x".into()))
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn trace_omits_top_message() {
        let error = Error::pipeline("classified", Error::UnrecognizedFormat { files: vec![] });
        assert_eq!(render_trace(&error), "step: classified\nkind: precondition");
    }
}
