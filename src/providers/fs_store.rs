//! Filesystem-backed [`ObjectStore`].
//!
//! Each bucket is a directory below the store root and each key a file in
//! it. Content types are kept next to the object in a `.meta` directory.
//! Multipart uploads stage their parts under `.multipart/<upload id>` and are
//! assembled into a temporary file that is atomically renamed into place.

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use dp_core::{Error, Result};
use dp_pipeline::{CompletedPart, ObjectStore};

const META_DIR: &str = ".meta";
const MULTIPART_DIR: &str = ".multipart";
const UPLOAD_MANIFEST: &str = "upload.json";

#[derive(Debug, Serialize, Deserialize)]
struct UploadManifest {
    bucket: String,
    key: String,
    content_type: String,
}

pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the stored object.
    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        Ok(self.root.join(checked(bucket)?).join(checked(key)?))
    }

    /// Content type recorded for an object.
    pub fn content_type(&self, bucket: &str, key: &str) -> Result<String> {
        let path = self.meta_path(bucket, key)?;
        std::fs::read_to_string(&path).map_err(|e| Error::file(&path, e))
    }

    fn meta_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        Ok(self
            .root
            .join(checked(bucket)?)
            .join(META_DIR)
            .join(checked(key)?))
    }

    fn upload_dir(&self, upload_id: &str) -> Result<PathBuf> {
        Ok(self.root.join(MULTIPART_DIR).join(checked(upload_id)?))
    }

    /// Fill a temporary file next to the object with `write`, then rename it
    /// into place.
    fn store(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        write: impl FnOnce(&mut std::fs::File) -> std::io::Result<()>,
    ) -> Result<()> {
        let target = self.object_path(bucket, key)?;
        let dir = parent_of(&target)?;
        std::fs::create_dir_all(dir).map_err(|e| Error::file(dir, e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::file(dir, e))?;
        write(tmp.as_file_mut()).map_err(|e| Error::file(tmp.path(), e))?;
        tmp.as_file().sync_all().map_err(|e| Error::file(tmp.path(), e))?;
        tmp.persist(&target)
            .map_err(|e| Error::file(&target, e.error))?;

        let meta = self.meta_path(bucket, key)?;
        let meta_dir = parent_of(&meta)?;
        std::fs::create_dir_all(meta_dir).map_err(|e| Error::file(meta_dir, e))?;
        std::fs::write(&meta, content_type).map_err(|e| Error::file(&meta, e))?;
        Ok(())
    }
}

fn parent_of(path: &Path) -> Result<&Path> {
    path.parent()
        .ok_or_else(|| Error::Internal(format!("{} has no parent", path.display())))
}

/// Reject names that would escape the store root.
fn checked(name: &str) -> Result<&str> {
    let path = Path::new(name);
    let ok = !name.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        && !path.starts_with(META_DIR)
        && !path.starts_with(MULTIPART_DIR);
    if ok {
        Ok(name)
    } else {
        Err(Error::transport("object-store", format!("invalid object name {name:?}")))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<()> {
        self.store(bucket, key, content_type, |file| file.write_all(&body))
    }

    async fn start_multipart(&self, bucket: &str, key: &str, content_type: &str) -> Result<String> {
        checked(bucket)?;
        checked(key)?;
        let upload_id = uuid::Uuid::new_v4().to_string();
        let dir = self.upload_dir(&upload_id)?;
        std::fs::create_dir_all(&dir).map_err(|e| Error::file(&dir, e))?;

        let manifest = UploadManifest {
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_type: content_type.to_string(),
        };
        let json = serde_json::to_vec(&manifest)
            .map_err(|e| Error::Internal(format!("cannot encode upload manifest: {e}")))?;
        let path = dir.join(UPLOAD_MANIFEST);
        std::fs::write(&path, json).map_err(|e| Error::file(&path, e))?;
        Ok(upload_id)
    }

    async fn put_part(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<String> {
        let dir = self.upload_dir(upload_id)?;
        if !dir.is_dir() {
            return Err(Error::transport(
                "object-store",
                format!("no such upload {upload_id}"),
            ));
        }
        let path = dir.join(format!("{part_number:05}"));
        tokio::fs::write(&path, &body)
            .await
            .map_err(|e| Error::file(&path, e))?;
        Ok(format!("{upload_id}-{part_number}"))
    }

    async fn complete_multipart(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<()> {
        let dir = self.upload_dir(upload_id)?;
        let manifest_path = dir.join(UPLOAD_MANIFEST);
        let raw = std::fs::read(&manifest_path).map_err(|e| Error::file(&manifest_path, e))?;
        let manifest: UploadManifest = serde_json::from_slice(&raw)
            .map_err(|e| Error::transport("object-store", format!("corrupt upload {upload_id}: {e}")))?;

        self.store(&manifest.bucket, &manifest.key, &manifest.content_type, |file| {
            for part in &parts {
                let mut chunk = std::fs::File::open(dir.join(format!("{:05}", part.part_number)))?;
                std::io::copy(&mut chunk, file)?;
            }
            Ok(())
        })?;

        std::fs::remove_dir_all(&dir).map_err(|e| Error::file(&dir, e))?;
        Ok(())
    }

    async fn abort_multipart(&self, _bucket: &str, _key: &str, upload_id: &str) -> Result<()> {
        let dir = self.upload_dir(upload_id)?;
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::file(&dir, e)),
        }
    }
}
