/*
    Storage subsystem - persistent byte blobs keyed by resource id

    A storage provider persists opaque ciphertext; it never sees
    plaintext. Retrieval goes through a lazy sink so a single resource id
    may yield several payloads, one per replica holding a copy.
*/

pub mod errors;
pub mod file_store;
pub mod manifest;
pub mod object_store;
pub mod swarm_store;

pub use errors::{StorageError, StorageResult};
pub use file_store::{FileStore, FILE_STORAGE_TYPE};
pub use manifest::{Manifest, MANIFEST_SENTINEL};
pub use object_store::{multihash_hex, MemoryCluster, MemoryObjectStore, ObjectStore, StoredObject};
pub use swarm_store::{SwarmStore, SWARM_STORAGE_TYPE};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::resource::{ResourceId, ResourceKey};

/// Receiving end of a retrieval: payloads arrive as the producer finds
/// them, and the stream closes when the producer drops the sender.
pub type PayloadSink = mpsc::Sender<Vec<u8>>;

/// A registered storage backend.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Self-describing identifier stored as the prefix of a resource id.
    fn type_id(&self) -> &str;

    /// Mint a fresh resource id under this backend.
    async fn generate_resource_id(&self) -> StorageResult<ResourceId>;

    /// Whether this backend can serve the given id.
    async fn has_resource(&self, id: &ResourceId) -> bool;

    /// Stream every payload held for the id into the sink. The key is
    /// used for link naming only; payloads are already encrypted.
    /// Unreachable replicas are skipped, not failed.
    async fn get_data(
        &self,
        id: &ResourceId,
        key: &ResourceKey,
        sink: PayloadSink,
    ) -> StorageResult<()>;

    /// Persist a payload for the id, overwriting this peer's previous
    /// copy.
    async fn set_data(&self, id: &ResourceId, key: &ResourceKey, data: &[u8])
        -> StorageResult<()>;
}
