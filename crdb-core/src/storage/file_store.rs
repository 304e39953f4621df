/*
    file_store.rs - Local filesystem storage provider

    One flat file per resource under a base directory, named by the
    opaque half of the resource id. A single local copy means a
    single-payload sink. Overwrite semantics, no tombstones.
*/

use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use super::errors::{StorageError, StorageResult};
use super::{PayloadSink, Storage};
use crate::resource::{ResourceId, ResourceKey};

/// Storage type id of the file provider.
pub const FILE_STORAGE_TYPE: &str = "file";

/// Flat-file storage provider
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    /// Create a provider rooted at `base_path`, creating the directory
    /// if needed.
    pub fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;
        Ok(FileStore { base_path })
    }

    /// Resolve the file backing a resource id. Locators arrive from
    /// clients, so anything that could escape the base directory is
    /// rejected.
    fn resource_path(&self, id: &ResourceId) -> StorageResult<PathBuf> {
        let opaque = id.opaque();
        if opaque.is_empty()
            || opaque.contains('/')
            || opaque.contains('\\')
            || opaque.contains("..")
        {
            return Err(StorageError::InvalidLocator);
        }
        Ok(self.base_path.join(opaque))
    }

    fn write_atomic(path: &Path, data: &[u8]) -> StorageResult<()> {
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, data)?;
        fs::rename(temp_path, path)?;
        Ok(())
    }
}

#[async_trait]
impl Storage for FileStore {
    fn type_id(&self) -> &str {
        FILE_STORAGE_TYPE
    }

    async fn generate_resource_id(&self) -> StorageResult<ResourceId> {
        Ok(ResourceId::new(
            FILE_STORAGE_TYPE,
            &Uuid::new_v4().to_string(),
        ))
    }

    async fn has_resource(&self, id: &ResourceId) -> bool {
        match self.resource_path(id) {
            Ok(path) => path.exists(),
            Err(_) => false,
        }
    }

    async fn get_data(
        &self,
        id: &ResourceId,
        _key: &ResourceKey,
        sink: PayloadSink,
    ) -> StorageResult<()> {
        let path = self.resource_path(id)?;
        if !path.exists() {
            return Err(StorageError::UnknownResource);
        }

        let data = fs::read(&path)?;
        debug!(id = %id, bytes = data.len(), "file store read");

        // A dropped receiver just means the consumer gave up early.
        let _ = sink.send(data).await;
        Ok(())
    }

    async fn set_data(
        &self,
        id: &ResourceId,
        _key: &ResourceKey,
        data: &[u8],
    ) -> StorageResult<()> {
        let path = self.resource_path(id)?;
        Self::write_atomic(&path, data)?;
        debug!(id = %id, bytes = data.len(), "file store write");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    async fn collect(store: &FileStore, id: &ResourceId) -> StorageResult<Vec<Vec<u8>>> {
        let (tx, mut rx) = mpsc::channel(4);
        let key = ResourceKey::new("aes-256-cbc", &[0u8; 64]);
        store.get_data(id, &key, tx).await?;

        let mut payloads = Vec::new();
        while let Some(payload) = rx.recv().await {
            payloads.push(payload);
        }
        Ok(payloads)
    }

    #[tokio::test]
    async fn test_set_then_get_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let key = ResourceKey::new("aes-256-cbc", &[0u8; 64]);

        let id = store.generate_resource_id().await.unwrap();
        assert_eq!(id.storage_id(), "file");
        assert!(!store.has_resource(&id).await);

        store.set_data(&id, &key, b"ciphertext").await.unwrap();
        assert!(store.has_resource(&id).await);

        let payloads = collect(&store, &id).await.unwrap();
        assert_eq!(payloads, vec![b"ciphertext".to_vec()]);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_payload() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let key = ResourceKey::new("aes-256-cbc", &[0u8; 64]);

        let id = store.generate_resource_id().await.unwrap();
        store.set_data(&id, &key, b"first").await.unwrap();
        store.set_data(&id, &key, b"second").await.unwrap();

        let payloads = collect(&store, &id).await.unwrap();
        assert_eq!(payloads, vec![b"second".to_vec()]);
    }

    #[tokio::test]
    async fn test_missing_resource_is_unknown() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path()).unwrap();

        let id = ResourceId::new("file", "no-such-file");
        let result = collect(&store, &id).await;
        assert!(matches!(result, Err(StorageError::UnknownResource)));
    }

    #[tokio::test]
    async fn test_traversal_locator_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let key = ResourceKey::new("aes-256-cbc", &[0u8; 64]);

        let id = ResourceId::new("file", "../escape");
        let result = store.set_data(&id, &key, b"data").await;
        assert!(matches!(result, Err(StorageError::InvalidLocator)));
        assert!(!store.has_resource(&id).await);
    }

    #[tokio::test]
    async fn test_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let key = ResourceKey::new("aes-256-cbc", &[0u8; 64]);

        let id = {
            let store = FileStore::new(dir.path()).unwrap();
            let id = store.generate_resource_id().await.unwrap();
            store.set_data(&id, &key, b"durable").await.unwrap();
            id
        };

        let reopened = FileStore::new(dir.path()).unwrap();
        let payloads = collect(&reopened, &id).await.unwrap();
        assert_eq!(payloads, vec![b"durable".to_vec()]);
    }
}
