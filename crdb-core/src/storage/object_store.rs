/*
    object_store.rs - Content-addressed object store abstraction

    The swarm provider is written against this trait rather than any
    specific network: objects are immutable blobs with named outbound
    links, addressed by a multihash of their content, discoverable by
    hash, with a mutable name record per peer.

    MemoryObjectStore implements the trait over a shared in-process
    cluster. Several stores over one cluster behave like independent
    peers on one network, which is how replication tests are built.
*/

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use super::errors::{StorageError, StorageResult};

/// Helper to convert poison errors into StorageError
fn handle_poison<T>(_err: PoisonError<T>) -> StorageError {
    StorageError::Backend("Lock poisoned: a thread panicked while holding the lock".to_string())
}

/// sha2-256 multihash (code 0x12, length 0x20), hex encoded.
pub fn multihash_hex(input: &[u8]) -> String {
    let digest = Sha256::digest(input);
    let mut bytes = Vec::with_capacity(2 + digest.len());
    bytes.push(0x12);
    bytes.push(0x20);
    bytes.extend_from_slice(&digest);
    hex::encode(bytes)
}

/// An immutable object: a data payload plus named outbound links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    /// link name -> target object hash
    pub links: BTreeMap<String, String>,
}

impl StoredObject {
    pub fn leaf(data: Vec<u8>) -> Self {
        StoredObject {
            data,
            links: BTreeMap::new(),
        }
    }

    /// Content address of this object: data and sorted links.
    pub fn hash(&self) -> String {
        let mut input = Vec::new();
        input.extend_from_slice(&(self.data.len() as u64).to_le_bytes());
        input.extend_from_slice(&self.data);
        for (name, target) in &self.links {
            input.extend_from_slice(name.as_bytes());
            input.push(0);
            input.extend_from_slice(target.as_bytes());
            input.push(0);
        }
        multihash_hex(&input)
    }
}

/// A pluggable content-addressed object store with peer discovery.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Identity of the local peer.
    fn peer_id(&self) -> &str;

    /// Store a leaf object, returning its hash. The local peer becomes
    /// a provider of the object.
    async fn put_object(&self, data: Vec<u8>) -> StorageResult<String>;

    /// Fetch an object by hash. Fetching makes the local peer a
    /// provider of the object.
    async fn get_object(&self, hash: &str) -> StorageResult<StoredObject>;

    /// Derive a new object from `base` with one link added, returning
    /// the new hash.
    async fn add_link(&self, base: &str, name: &str, target: &str) -> StorageResult<String>;

    /// Peers known to hold the object.
    async fn find_providers(&self, hash: &str) -> StorageResult<Vec<String>>;

    /// Publish `hash` as this peer's current name record.
    async fn name_publish(&self, hash: &str) -> StorageResult<()>;

    /// Resolve a peer's current name record.
    async fn name_resolve(&self, peer_id: &str) -> StorageResult<String>;
}

/// Shared state of an in-process object network.
pub struct MemoryCluster {
    objects: Mutex<HashMap<String, StoredObject>>,
    /// peer id -> published name record
    names: Mutex<HashMap<String, String>>,
    /// object hash -> providing peers
    providers: Mutex<HashMap<String, HashSet<String>>>,
}

impl MemoryCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(MemoryCluster {
            objects: Mutex::new(HashMap::new()),
            names: Mutex::new(HashMap::new()),
            providers: Mutex::new(HashMap::new()),
        })
    }
}

/// One peer's view of a MemoryCluster.
#[derive(Clone)]
pub struct MemoryObjectStore {
    cluster: Arc<MemoryCluster>,
    peer_id: String,
}

impl MemoryObjectStore {
    pub fn new(cluster: Arc<MemoryCluster>, peer_id: impl Into<String>) -> Self {
        MemoryObjectStore {
            cluster,
            peer_id: peer_id.into(),
        }
    }

    fn record_provider(&self, hash: &str) -> StorageResult<()> {
        self.cluster
            .providers
            .lock()
            .map_err(handle_poison)?
            .entry(hash.to_string())
            .or_default()
            .insert(self.peer_id.clone());
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn peer_id(&self) -> &str {
        &self.peer_id
    }

    async fn put_object(&self, data: Vec<u8>) -> StorageResult<String> {
        let object = StoredObject::leaf(data);
        let hash = object.hash();

        self.cluster
            .objects
            .lock()
            .map_err(handle_poison)?
            .insert(hash.clone(), object);
        self.record_provider(&hash)?;

        Ok(hash)
    }

    async fn get_object(&self, hash: &str) -> StorageResult<StoredObject> {
        let object = self
            .cluster
            .objects
            .lock()
            .map_err(handle_poison)?
            .get(hash)
            .cloned()
            .ok_or(StorageError::UnknownResource)?;

        // Retrieval caches the object locally, so this peer now
        // provides it as well.
        self.record_provider(hash)?;

        Ok(object)
    }

    async fn add_link(&self, base: &str, name: &str, target: &str) -> StorageResult<String> {
        let mut object = self
            .cluster
            .objects
            .lock()
            .map_err(handle_poison)?
            .get(base)
            .cloned()
            .ok_or(StorageError::UnknownResource)?;

        object.links.insert(name.to_string(), target.to_string());
        let hash = object.hash();

        self.cluster
            .objects
            .lock()
            .map_err(handle_poison)?
            .insert(hash.clone(), object);
        self.record_provider(&hash)?;

        Ok(hash)
    }

    async fn find_providers(&self, hash: &str) -> StorageResult<Vec<String>> {
        let mut peers: Vec<String> = self
            .cluster
            .providers
            .lock()
            .map_err(handle_poison)?
            .get(hash)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        peers.sort();
        Ok(peers)
    }

    async fn name_publish(&self, hash: &str) -> StorageResult<()> {
        self.cluster
            .names
            .lock()
            .map_err(handle_poison)?
            .insert(self.peer_id.clone(), hash.to_string());
        Ok(())
    }

    async fn name_resolve(&self, peer_id: &str) -> StorageResult<String> {
        self.cluster
            .names
            .lock()
            .map_err(handle_poison)?
            .get(peer_id)
            .cloned()
            .ok_or(StorageError::UnknownResource)
    }
}
