//! Uploads to the object store.
//!
//! Files below the multipart threshold go up in a single request. Larger
//! files are split into fixed-size parts, uploaded with bounded concurrency,
//! and assembled; a failed multipart upload is aborted so no orphaned parts
//! remain. The local file is removed only after the store accepted it.

use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use dp_core::config::TransferConfig;
use dp_core::{Error, Result};

use crate::collaborators::{CompletedPart, ObjectStore};
use crate::plan::DerivativePlan;

/// Content type of compressed packages.
pub const PACKAGE_CONTENT_TYPE: &str = "application/gzip";

pub struct DeliveryAgent {
    store: Arc<dyn ObjectStore>,
    transfer: TransferConfig,
}

impl DeliveryAgent {
    pub fn new(store: Arc<dyn ObjectStore>, transfer: TransferConfig) -> Self {
        Self { store, transfer }
    }

    /// Upload `local` to `destination/key` and delete it afterwards.
    ///
    /// # Errors
    ///
    /// Returns the store's error, or an I/O error reading the file. The
    /// local file is kept on failure.
    pub async fn upload(
        &self,
        local: &Path,
        destination: &str,
        key: &str,
        content_type: &str,
    ) -> Result<()> {
        let size = tokio::fs::metadata(local)
            .await
            .map_err(|e| Error::file(local, e))?
            .len();

        if size >= self.transfer.multipart_threshold && self.transfer.multipart_chunksize > 0 {
            self.upload_multipart(local, size, destination, key, content_type)
                .await?;
        } else {
            let body = tokio::fs::read(local)
                .await
                .map_err(|e| Error::file(local, e))?;
            self.store
                .put_object(destination, key, Bytes::from(body), content_type)
                .await?;
        }

        tracing::debug!(
            "Uploaded {} ({} bytes) to {}/{}",
            local.display(),
            size,
            destination,
            key
        );
        tokio::fs::remove_file(local)
            .await
            .map_err(|e| Error::file(local, e))?;
        Ok(())
    }

    /// Upload every entry of a derivative plan, in order.
    pub async fn deliver_plan(&self, plan: &DerivativePlan) -> Result<()> {
        for entry in plan.iter() {
            self.upload(&entry.source, &entry.destination, &entry.key, entry.content_type)
                .await?;
        }
        Ok(())
    }

    async fn upload_multipart(
        &self,
        local: &Path,
        size: u64,
        destination: &str,
        key: &str,
        content_type: &str,
    ) -> Result<()> {
        let upload_id = self
            .store
            .start_multipart(destination, key, content_type)
            .await?;

        match self.upload_parts(local, size, destination, key, &upload_id).await {
            Ok(parts) => {
                tracing::debug!("Completing upload {} with {} parts", upload_id, parts.len());
                self.store
                    .complete_multipart(destination, key, &upload_id, parts)
                    .await
            }
            Err(e) => {
                if let Err(abort_err) = self
                    .store
                    .abort_multipart(destination, key, &upload_id)
                    .await
                {
                    tracing::warn!("Failed to abort upload {}: {}", upload_id, abort_err);
                }
                Err(e)
            }
        }
    }

    async fn upload_parts(
        &self,
        local: &Path,
        size: u64,
        destination: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<Vec<CompletedPart>> {
        let chunk = self.transfer.multipart_chunksize;
        let count = size.div_ceil(chunk).max(1);
        let concurrency = self.transfer.max_concurrency.max(1);

        let mut parts: Vec<CompletedPart> = stream::iter(0..count)
            .map(|index| async move {
                let offset = index * chunk;
                let len = chunk.min(size - offset);
                let body = read_range(local, offset, len).await?;
                let part_number = u32::try_from(index + 1)
                    .map_err(|_| Error::Internal(format!("too many parts for {}", local.display())))?;
                let etag = self
                    .store
                    .put_part(destination, key, upload_id, part_number, body)
                    .await?;
                Ok::<_, Error>(CompletedPart { part_number, etag })
            })
            .buffer_unordered(concurrency)
            .try_collect()
            .await?;

        parts.sort_by_key(|p| p.part_number);
        Ok(parts)
    }
}

async fn read_range(path: &Path, offset: u64, len: u64) -> Result<Bytes> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| Error::file(path, e))?;
    file.seek(SeekFrom::Start(offset))
        .await
        .map_err(|e| Error::file(path, e))?;
    let mut buf = vec![0u8; len as usize];
    file.read_exact(&mut buf)
        .await
        .map_err(|e| Error::file(path, e))?;
    Ok(Bytes::from(buf))
}
