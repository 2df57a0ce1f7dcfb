//! Interfaces of the external systems the pipeline talks to.
//!
//! The pipeline never constructs a network client itself. A single
//! [`CredentialedClientFactory`] is injected into the
//! [`Packager`](crate::Packager) and hands out the object store, pub/sub
//! channel and parameter store; the registry client is built from the
//! parameters fetched at the start of each run.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use dp_bag::DateRecord;
use dp_core::{Error, RefId, Result};

/// Parameter name of the registry base URL.
pub const PARAM_BASEURL: &str = "AS_BASEURL";
/// Parameter name of the registry repository id.
pub const PARAM_REPO: &str = "AS_REPO";
/// Parameter name of the registry user.
pub const PARAM_USERNAME: &str = "AS_USERNAME";
/// Parameter name of the registry password.
pub const PARAM_PASSWORD: &str = "AS_PASSWORD";

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Result of a find-by-identifier query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindResult {
    /// The query as issued, reported when the match count is wrong.
    pub query: String,
    /// URIs of the matching archival objects.
    pub uris: Vec<String>,
}

/// Archival-object registry.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Find archival objects carrying the given reference id.
    async fn find_by_ref_id(&self, refid: &RefId) -> Result<FindResult>;

    /// Date records of the object at `uri`, or of its closest ancestor that
    /// has any.
    async fn closest_dates(&self, uri: &str) -> Result<Vec<DateRecord>>;
}

/// Connection settings for the registry, read from the parameter store.
#[derive(Clone, PartialEq, Eq)]
pub struct RegistrySettings {
    pub baseurl: String,
    pub repo: String,
    pub username: String,
    pub password: String,
}

impl RegistrySettings {
    /// Extract the registry settings from a parameter map.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming every missing or blank parameter.
    pub fn from_parameters(params: &BTreeMap<String, String>) -> Result<Self> {
        let missing: Vec<&str> = [PARAM_BASEURL, PARAM_REPO, PARAM_USERNAME, PARAM_PASSWORD]
            .into_iter()
            .filter(|name| params.get(*name).map_or(true, |v| v.trim().is_empty()))
            .collect();
        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "missing parameters: {}",
                missing.join(", ")
            )));
        }
        let get = |name: &str| params.get(name).cloned().unwrap_or_default();
        Ok(Self {
            baseurl: get(PARAM_BASEURL),
            repo: get(PARAM_REPO),
            username: get(PARAM_USERNAME),
            password: get(PARAM_PASSWORD),
        })
    }
}

impl fmt::Debug for RegistrySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrySettings")
            .field("baseurl", &self.baseurl)
            .field("repo", &self.repo)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Object store
// ---------------------------------------------------------------------------

/// One uploaded part of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    /// 1-based part number.
    pub part_number: u32,
    /// Opaque tag returned by the store for the part.
    pub etag: String,
}

/// Write-only object storage with multipart support.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` under `bucket/key` in a single request.
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes, content_type: &str)
        -> Result<()>;

    /// Begin a multipart upload and return its upload id.
    async fn start_multipart(&self, bucket: &str, key: &str, content_type: &str)
        -> Result<String>;

    /// Upload one part and return its tag.
    async fn put_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<String>;

    /// Assemble the uploaded parts into the final object.
    async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<()>;

    /// Discard a multipart upload and any parts already uploaded.
    async fn abort_multipart(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Pub/sub and parameters
// ---------------------------------------------------------------------------

/// Notification channel.
#[async_trait]
pub trait PubSub: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        message: &str,
        attributes: &BTreeMap<String, String>,
    ) -> Result<()>;
}

/// Hierarchical parameter and secrets store.
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// Parameters directly under `path` (not recursive), keyed by leaf name.
    async fn get_parameters_by_path(&self, path: &str) -> Result<BTreeMap<String, String>>;
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Source of authenticated collaborator clients.
#[async_trait]
pub trait CredentialedClientFactory: Send + Sync {
    fn object_store(&self) -> Result<Arc<dyn ObjectStore>>;

    fn pubsub(&self) -> Result<Arc<dyn PubSub>>;

    fn parameter_store(&self) -> Result<Arc<dyn ParameterStore>>;

    /// Build a registry client, authenticating with `settings`.
    async fn registry(&self, settings: &RegistrySettings) -> Result<Arc<dyn Registry>>;
}
