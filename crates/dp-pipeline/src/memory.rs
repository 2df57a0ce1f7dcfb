//! In-memory collaborators.
//!
//! Stand-ins for the external services, used by the unit and integration
//! tests. Every client records what it was asked to do and can be told to
//! fail on demand.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};

use dp_bag::DateRecord;
use dp_core::{Error, RefId, Result};

use crate::collaborators::{
    CompletedPart, CredentialedClientFactory, FindResult, ObjectStore, ParameterStore, PubSub,
    Registry, RegistrySettings,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Registry answering from fixed tables.
#[derive(Debug, Default)]
pub struct StaticRegistry {
    matches: HashMap<String, Vec<String>>,
    dates: HashMap<String, Vec<DateRecord>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the URIs returned for a reference id.
    pub fn with_object(mut self, refid: &str, uris: &[&str]) -> Self {
        self.matches
            .insert(refid.to_string(), uris.iter().map(|u| u.to_string()).collect());
        self
    }

    /// Register the closest dates for a URI.
    pub fn with_dates(mut self, uri: &str, dates: Vec<DateRecord>) -> Self {
        self.dates.insert(uri.to_string(), dates);
        self
    }
}

#[async_trait]
impl Registry for StaticRegistry {
    async fn find_by_ref_id(&self, refid: &RefId) -> Result<FindResult> {
        Ok(FindResult {
            query: format!("find_by_id/archival_objects?ref_id[]={refid}"),
            uris: self.matches.get(refid.as_str()).cloned().unwrap_or_default(),
        })
    }

    async fn closest_dates(&self, uri: &str) -> Result<Vec<DateRecord>> {
        self.dates
            .get(uri)
            .cloned()
            .ok_or_else(|| Error::Precondition(format!("no dates found for {uri} or its ancestors")))
    }
}

// ---------------------------------------------------------------------------
// Object store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
    /// Number of parts, `None` for a single put.
    pub parts: Option<usize>,
}

#[derive(Debug, Default)]
struct PendingUpload {
    bucket: String,
    key: String,
    content_type: String,
    parts: BTreeMap<u32, Bytes>,
}

/// Object store keeping everything in memory.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<(String, String), StoredObject>>,
    pending: Mutex<HashMap<String, PendingUpload>>,
    aborted: Mutex<Vec<String>>,
    next_id: AtomicU64,
    fail_part: Mutex<Option<u32>>,
    fail_puts: Mutex<bool>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every upload of the given part number fail.
    pub fn fail_on_part(&self, part_number: u32) {
        *lock(&self.fail_part) = Some(part_number);
    }

    /// Make every single put fail.
    pub fn fail_puts(&self) {
        *lock(&self.fail_puts) = true;
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        lock(&self.objects)
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// `(bucket, key)` of every stored object, sorted.
    pub fn keys(&self) -> Vec<(String, String)> {
        lock(&self.objects).keys().cloned().collect()
    }

    /// Upload ids that were aborted.
    pub fn aborted(&self) -> Vec<String> {
        lock(&self.aborted).clone()
    }

    /// Number of multipart uploads neither completed nor aborted.
    pub fn pending_uploads(&self) -> usize {
        lock(&self.pending).len()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<()> {
        if *lock(&self.fail_puts) {
            return Err(Error::transport("object-store", format!("put {bucket}/{key} rejected")));
        }
        lock(&self.objects).insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body,
                content_type: content_type.to_string(),
                parts: None,
            },
        );
        Ok(())
    }

    async fn start_multipart(&self, bucket: &str, key: &str, content_type: &str) -> Result<String> {
        let id = format!("upload-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        lock(&self.pending).insert(
            id.clone(),
            PendingUpload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                content_type: content_type.to_string(),
                parts: BTreeMap::new(),
            },
        );
        Ok(id)
    }

    async fn put_part(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<String> {
        if *lock(&self.fail_part) == Some(part_number) {
            return Err(Error::transport(
                "object-store",
                format!("part {part_number} of {upload_id} rejected"),
            ));
        }
        let mut pending = lock(&self.pending);
        let upload = pending
            .get_mut(upload_id)
            .ok_or_else(|| Error::transport("object-store", format!("no such upload {upload_id}")))?;
        upload.parts.insert(part_number, body);
        Ok(format!("{upload_id}-{part_number}"))
    }

    async fn complete_multipart(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<()> {
        let upload = lock(&self.pending)
            .remove(upload_id)
            .ok_or_else(|| Error::transport("object-store", format!("no such upload {upload_id}")))?;

        let mut body = BytesMut::new();
        for part in &parts {
            let chunk = upload.parts.get(&part.part_number).ok_or_else(|| {
                Error::transport(
                    "object-store",
                    format!("part {} was never uploaded", part.part_number),
                )
            })?;
            body.extend_from_slice(chunk);
        }

        lock(&self.objects).insert(
            (upload.bucket, upload.key),
            StoredObject {
                body: body.freeze(),
                content_type: upload.content_type,
                parts: Some(parts.len()),
            },
        );
        Ok(())
    }

    async fn abort_multipart(&self, _bucket: &str, _key: &str, upload_id: &str) -> Result<()> {
        lock(&self.pending).remove(upload_id);
        lock(&self.aborted).push(upload_id.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pub/sub
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub message: String,
    pub attributes: BTreeMap<String, String>,
}

/// Publisher that records every message.
#[derive(Debug, Default)]
pub struct RecordingPubSub {
    messages: Mutex<Vec<PublishedMessage>>,
    fail: Mutex<bool>,
}

impl RecordingPubSub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every publish fail.
    pub fn fail_publishes(&self) {
        *lock(&self.fail) = true;
    }

    pub fn messages(&self) -> Vec<PublishedMessage> {
        lock(&self.messages).clone()
    }
}

#[async_trait]
impl PubSub for RecordingPubSub {
    async fn publish(
        &self,
        topic: &str,
        message: &str,
        attributes: &BTreeMap<String, String>,
    ) -> Result<()> {
        if *lock(&self.fail) {
            return Err(Error::transport("pubsub", format!("publish to {topic} rejected")));
        }
        lock(&self.messages).push(PublishedMessage {
            topic: topic.to_string(),
            message: message.to_string(),
            attributes: attributes.clone(),
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Parameter store backed by a flat map of full parameter names.
#[derive(Debug, Default)]
pub struct StaticParameterStore {
    params: BTreeMap<String, String>,
}

impl StaticParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter by full name, e.g. `/dev/packager/AS_REPO`.
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.params.insert(name.to_string(), value.to_string());
        self
    }
}

#[async_trait]
impl ParameterStore for StaticParameterStore {
    async fn get_parameters_by_path(&self, path: &str) -> Result<BTreeMap<String, String>> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        Ok(self
            .params
            .iter()
            .filter_map(|(name, value)| {
                let leaf = name.strip_prefix(&prefix)?;
                (!leaf.contains('/')).then(|| (leaf.to_string(), value.clone()))
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Factory handing out shared in-memory clients.
pub struct MemoryClientFactory {
    pub store: Arc<MemoryObjectStore>,
    pub pubsub: Arc<RecordingPubSub>,
    pub parameters: Arc<StaticParameterStore>,
    pub registry: Arc<StaticRegistry>,
    settings: Mutex<Option<RegistrySettings>>,
}

impl MemoryClientFactory {
    pub fn new(parameters: StaticParameterStore, registry: StaticRegistry) -> Self {
        Self {
            store: Arc::new(MemoryObjectStore::new()),
            pubsub: Arc::new(RecordingPubSub::new()),
            parameters: Arc::new(parameters),
            registry: Arc::new(registry),
            settings: Mutex::new(None),
        }
    }

    /// Settings the registry client was last built with.
    pub fn registry_settings(&self) -> Option<RegistrySettings> {
        lock(&self.settings).clone()
    }
}

#[async_trait]
impl CredentialedClientFactory for MemoryClientFactory {
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
        *lock(&self.settings) = Some(settings.clone());
        Ok(self.registry.clone())
    }
}
