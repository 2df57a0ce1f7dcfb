//! Concrete collaborators for production runs.

pub mod aspace;
pub mod fs_store;
pub mod parameters;
pub mod webhook;

pub use aspace::ArchivesSpaceClient;
pub use fs_store::FsObjectStore;
pub use parameters::DirParameterStore;
pub use webhook::{LogPublisher, WebhookPublisher};

use std::sync::Arc;

use async_trait::async_trait;

use dp_core::config::Config;
use dp_core::Result;
use dp_pipeline::{
    CredentialedClientFactory, ObjectStore, ParameterStore, PubSub, Registry, RegistrySettings,
};

/// Builds every collaborator from the application config.
pub struct ClientFactory {
    store: Arc<FsObjectStore>,
    pubsub: Arc<dyn PubSub>,
    parameters: Arc<DirParameterStore>,
}

impl ClientFactory {
    pub fn new(config: &Config) -> Self {
        let pubsub: Arc<dyn PubSub> = match config.notifications.endpoint {
            Some(ref endpoint) => Arc::new(WebhookPublisher::new(
                endpoint.clone(),
                &config.notifications,
            )),
            None => Arc::new(LogPublisher),
        };

        Self {
            store: Arc::new(FsObjectStore::new(config.storage.root.clone())),
            pubsub,
            parameters: Arc::new(DirParameterStore::new(config.parameters.root.clone())),
        }
    }
}

#[async_trait]
impl CredentialedClientFactory for ClientFactory {
    fn object_store(&self) -> Result<Arc<dyn ObjectStore>> {
        Ok(self.store.clone())
    }

    fn pubsub(&self) -> Result<Arc<dyn PubSub>> {
        Ok(self.pubsub.clone())
    }

    fn parameter_store(&self) -> Result<Arc<dyn ParameterStore>> {
        Ok(self.parameters.clone())
    }

    async fn registry(&self, settings: &RegistrySettings) -> Result<Arc<dyn Registry>> {
        Ok(Arc::new(ArchivesSpaceClient::login(settings).await?))
    }
}
