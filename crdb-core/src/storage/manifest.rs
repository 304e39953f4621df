/*
    manifest.rs - A peer's published blob holdings

    The manifest is a content-addressed object whose data payload is a
    fixed sentinel and whose outbound links map obfuscated link names to
    blob hashes. It is republished under the local peer's name record
    after every link update, so other peers always resolve the most
    recently published view.
*/

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::errors::{StorageError, StorageResult};
use super::object_store::ObjectStore;

/// Data payload identifying a manifest object.
pub const MANIFEST_SENTINEL: &[u8] = b"crdt:Datastore";

struct ManifestState {
    hash: String,
    links: BTreeMap<String, String>,
}

/// The local peer's manifest.
pub struct Manifest {
    store: Arc<dyn ObjectStore>,
    state: Mutex<ManifestState>,
}

impl Manifest {
    /// Resolve this peer's existing manifest, or initialize and publish
    /// a fresh one when none resolves or the resolved object is not a
    /// manifest.
    pub async fn open(store: Arc<dyn ObjectStore>) -> StorageResult<Self> {
        let peer_id = store.peer_id().to_string();

        let state = match store.name_resolve(&peer_id).await {
            Ok(hash) => match store.get_object(&hash).await {
                Ok(object) if object.data == MANIFEST_SENTINEL => {
                    debug!(peer = %peer_id, links = object.links.len(), "resolved existing manifest");
                    ManifestState {
                        hash,
                        links: object.links,
                    }
                }
                _ => Self::init(&*store, &peer_id).await?,
            },
            Err(_) => Self::init(&*store, &peer_id).await?,
        };

        Ok(Manifest {
            store,
            state: Mutex::new(state),
        })
    }

    async fn init(store: &dyn ObjectStore, peer_id: &str) -> StorageResult<ManifestState> {
        info!(peer = %peer_id, "initializing manifest");
        let hash = store.put_object(MANIFEST_SENTINEL.to_vec()).await?;
        store.name_publish(&hash).await?;
        Ok(ManifestState {
            hash,
            links: BTreeMap::new(),
        })
    }

    /// Add or replace one link and advance the manifest hash.
    pub async fn add_link(&self, name: &str, target: &str) -> StorageResult<()> {
        let mut state = self.state.lock().await;

        let new_hash = self.store.add_link(&state.hash, name, target).await?;
        if new_hash.is_empty() {
            return Err(StorageError::Backend("empty manifest hash".to_string()));
        }

        debug!(link = %name, target = %target, "manifest link added");
        state.hash = new_hash;
        state.links.insert(name.to_string(), target.to_string());
        Ok(())
    }

    /// Target hash of a link, if present.
    pub async fn lookup(&self, name: &str) -> Option<String> {
        self.state.lock().await.links.get(name).cloned()
    }

    /// Republish the current manifest under the local peer's name.
    pub async fn publish(&self) -> StorageResult<()> {
        let state = self.state.lock().await;
        self.store.name_publish(&state.hash).await
    }

    /// Current manifest hash.
    pub async fn current_hash(&self) -> String {
        self.state.lock().await.hash.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::object_store::{MemoryCluster, MemoryObjectStore};

    #[tokio::test]
    async fn test_open_initializes_and_publishes() {
        let cluster = MemoryCluster::new();
        let store = Arc::new(MemoryObjectStore::new(cluster, "peer-a"));

        let manifest = Manifest::open(store.clone()).await.unwrap();
        let hash = manifest.current_hash().await;

        assert_eq!(store.name_resolve("peer-a").await.unwrap(), hash);
        let object = store.get_object(&hash).await.unwrap();
        assert_eq!(object.data, MANIFEST_SENTINEL);
    }

    #[tokio::test]
    async fn test_add_link_advances_hash() {
        let cluster = MemoryCluster::new();
        let store = Arc::new(MemoryObjectStore::new(cluster, "peer-a"));

        let manifest = Manifest::open(store.clone()).await.unwrap();
        let before = manifest.current_hash().await;

        let blob = store.put_object(b"blob".to_vec()).await.unwrap();
        manifest.add_link("entry", &blob).await.unwrap();

        assert_ne!(manifest.current_hash().await, before);
        assert_eq!(manifest.lookup("entry").await, Some(blob));
        assert_eq!(manifest.lookup("missing").await, None);
    }

    #[tokio::test]
    async fn test_reopen_recovers_links() {
        let cluster = MemoryCluster::new();
        let store = Arc::new(MemoryObjectStore::new(cluster, "peer-a"));

        let blob = store.put_object(b"blob".to_vec()).await.unwrap();
        {
            let manifest = Manifest::open(store.clone()).await.unwrap();
            manifest.add_link("entry", &blob).await.unwrap();
            manifest.publish().await.unwrap();
        }

        let reopened = Manifest::open(store).await.unwrap();
        assert_eq!(reopened.lookup("entry").await, Some(blob));
    }

    #[tokio::test]
    async fn test_foreign_name_record_is_replaced() {
        let cluster = MemoryCluster::new();
        let store = Arc::new(MemoryObjectStore::new(cluster, "peer-a"));

        // Publish something that is not a manifest under our name.
        let junk = store.put_object(b"not a manifest".to_vec()).await.unwrap();
        store.name_publish(&junk).await.unwrap();

        let manifest = Manifest::open(store.clone()).await.unwrap();
        let resolved = store.name_resolve("peer-a").await.unwrap();
        assert_eq!(resolved, manifest.current_hash().await);
        assert_ne!(resolved, junk);
    }
}
