use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;

use dp_core::{Error, Result};
use dp_pipeline::ParameterStore;

/// [`ParameterStore`] backed by a directory tree.
///
/// The parameter path `/dev/packaging` maps to `<root>/dev/packaging`; each
/// regular file in that directory is one parameter, named after the file and
/// holding its trimmed contents. Subdirectories are not descended into.
pub struct DirParameterStore {
    root: PathBuf,
}

impl DirParameterStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ParameterStore for DirParameterStore {
    async fn get_parameters_by_path(&self, path: &str) -> Result<BTreeMap<String, String>> {
        let relative = path.trim_matches('/');
        if relative.split('/').any(|part| part == "..") {
            return Err(Error::Config(format!("invalid parameter path {path:?}")));
        }
        let dir = self.root.join(relative);

        let mut params = BTreeMap::new();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("No parameters found at {}", dir.display());
                return Ok(params);
            }
            Err(e) => return Err(Error::file(&dir, e)),
        };

        for entry in entries {
            let entry = entry.map_err(|e| Error::file(&dir, e))?;
            let file_path = entry.path();
            if !file_path.is_file() {
                continue;
            }
            let value = std::fs::read_to_string(&file_path)
                .map_err(|e| Error::file(&file_path, e))?;
            params.insert(
                entry.file_name().to_string_lossy().into_owned(),
                value.trim().to_string(),
            );
        }
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_leaf_files_only() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("dev/packaging");
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("AS_REPO"), "2\n").unwrap();
        std::fs::write(dir.join("AS_BASEURL"), "https://aspace.example.org/api").unwrap();
        std::fs::write(dir.join("nested/AS_REPO"), "3").unwrap();

        let store = DirParameterStore::new(root.path());
        let params = store.get_parameters_by_path("/dev/packaging").await.unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params["AS_REPO"], "2");
    }

    #[tokio::test]
    async fn missing_path_is_empty() {
        let root = tempfile::tempdir().unwrap();
        let store = DirParameterStore::new(root.path());
        assert!(store.get_parameters_by_path("/prod/x").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn parent_traversal_rejected() {
        let root = tempfile::tempdir().unwrap();
        let store = DirParameterStore::new(root.path());
        assert!(store.get_parameters_by_path("/../etc").await.is_err());
    }
}
