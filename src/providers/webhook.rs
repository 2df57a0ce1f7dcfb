use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use dp_core::config::NotificationConfig;
use dp_core::{Error, Result};
use dp_pipeline::PubSub;

const SERVICE: &str = "pubsub";

#[derive(Serialize)]
struct Envelope<'a> {
    topic: &'a str,
    message: &'a str,
    attributes: &'a BTreeMap<String, String>,
}

/// Publishes events as JSON `POST`s to an HTTP endpoint.
pub struct WebhookPublisher {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl WebhookPublisher {
    pub fn new(endpoint: impl Into<String>, config: &NotificationConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client: {}", e);
                Client::new()
            });

        Self {
            client,
            endpoint: endpoint.into(),
            token: config.token.clone(),
        }
    }
}

#[async_trait]
impl PubSub for WebhookPublisher {
    async fn publish(
        &self,
        topic: &str,
        message: &str,
        attributes: &BTreeMap<String, String>,
    ) -> Result<()> {
        let mut request = self.client.post(&self.endpoint).json(&Envelope {
            topic,
            message,
            attributes,
        });
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::transport(SERVICE, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::transport(
                SERVICE,
                format!("publish to {} failed ({}): {}", topic, status, body),
            ));
        }

        Ok(())
    }
}

/// Writes events to the log when no endpoint is configured.
pub struct LogPublisher;

#[async_trait]
impl PubSub for LogPublisher {
    async fn publish(
        &self,
        topic: &str,
        message: &str,
        attributes: &BTreeMap<String, String>,
    ) -> Result<()> {
        tracing::info!(topic, ?attributes, "{}", message);
        Ok(())
    }
}
