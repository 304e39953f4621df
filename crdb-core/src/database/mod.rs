/*
    Database core - the single point of composition

    Owns the three plugin registries (datatypes, storages, crypto
    methods), the live resource table and the reference indirection
    table, and drives the resource lifecycle:

        create -> attach -> mutate -> commit -> restore -> merge/clone

    A fresh Database is a fresh set of registries; there are no process
    globals, so tests construct as many independent instances as they
    need.
*/

pub mod errors;
pub mod registry;

pub use errors::{DatabaseError, DbResult};
pub use registry::Registry;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::crdt::ResourceFactory;
use crate::crypto::CryptoMethod;
use crate::resource::{ReferenceId, Resource, ResourceId, ResourceKey, ResourceType};
use crate::storage::Storage;

/// Payload channel depth for restores.
const RESTORE_SINK_DEPTH: usize = 8;

/// The CRDT database.
pub struct Database {
    datatypes: Registry<Arc<dyn ResourceFactory>>,
    storages: Registry<Arc<dyn Storage>>,
    cryptos: Registry<Arc<dyn CryptoMethod>>,

    /// resource id -> live resource. Entries are added on create and
    /// successful restore, and never evicted by the core.
    datastore: RwLock<HashMap<ResourceId, Arc<Resource>>>,

    /// reference id -> resource id. Detach removes the mapping only.
    references: RwLock<HashMap<ReferenceId, ResourceId>>,
}

impl Database {
    pub fn new() -> Self {
        Database {
            datatypes: Registry::new(),
            storages: Registry::new(),
            cryptos: Registry::new(),
            datastore: RwLock::new(HashMap::new()),
            references: RwLock::new(HashMap::new()),
        }
    }

    // --- plugin registration -------------------------------------------

    /// Register a resource datatype factory.
    pub fn register_type(&self, factory: Arc<dyn ResourceFactory>) -> DbResult<()> {
        let type_id = factory.type_id();
        self.datatypes.register(type_id.as_str(), factory)?;
        info!(datatype = %type_id, "registered resource type");
        Ok(())
    }

    /// Register a storage backend.
    pub fn register_storage(&self, storage: Arc<dyn Storage>) -> DbResult<()> {
        let type_id = storage.type_id().to_string();
        self.storages.register(&type_id, storage)?;
        info!(storage = %type_id, "registered storage backend");
        Ok(())
    }

    /// Register a cryptographic method.
    pub fn register_crypto_method(&self, method: Arc<dyn CryptoMethod>) -> DbResult<()> {
        let type_id = method.type_id().to_string();
        self.cryptos.register(&type_id, method)?;
        info!(crypto = %type_id, "registered crypto method");
        Ok(())
    }

    // --- enumeration queries -------------------------------------------

    pub fn supported_types(&self) -> Vec<ResourceType> {
        self.datatypes
            .ids()
            .into_iter()
            .map(ResourceType::from)
            .collect()
    }

    pub fn is_supported_type(&self, datatype: &ResourceType) -> bool {
        self.datatypes.contains(datatype.as_str())
    }

    pub fn supported_storage_types(&self) -> Vec<String> {
        self.storages.ids()
    }

    pub fn is_supported_storage_type(&self, type_id: &str) -> bool {
        self.storages.contains(type_id)
    }

    pub fn supported_crypto_methods(&self) -> Vec<String> {
        self.cryptos.ids()
    }

    pub fn is_supported_crypto_method(&self, type_id: &str) -> bool {
        self.cryptos.contains(type_id)
    }

    // --- lifecycle ------------------------------------------------------

    /// Create a fresh resource: new id from the storage, new key from
    /// the crypto method, empty state from the factory.
    pub async fn create(
        &self,
        datatype: &ResourceType,
        storage_id: &str,
        crypto_id: &str,
    ) -> DbResult<Arc<Resource>> {
        if !datatype.is_valid() {
            return Err(DatabaseError::InvalidType);
        }
        let factory = self
            .datatypes
            .get(datatype.as_str())
            .ok_or(DatabaseError::UnknownType)?;
        let storage = self
            .storages
            .get(storage_id)
            .ok_or(DatabaseError::UnknownStorage)?;
        let crypto = self
            .cryptos
            .get(crypto_id)
            .ok_or(DatabaseError::UnknownCrypto)?;

        let id = storage.generate_resource_id().await?;

        // RSA key generation can take a while; keep it off the runtime
        // threads.
        let key = tokio::task::spawn_blocking(move || crypto.generate_key())
            .await
            .map_err(|e| DatabaseError::Internal(e.to_string()))??;

        let resource = Arc::new(Resource::new(
            id.clone(),
            key,
            datatype.clone(),
            factory.create(),
        ));

        self.datastore
            .write()
            .await
            .insert(id.clone(), resource.clone());

        info!(id = %id, datatype = %datatype, "resource created");
        Ok(resource)
    }

    /// Obtain a reference to a resource, restoring it from storage when
    /// it is not live. The supplied key must match byte-exactly.
    pub async fn attach(&self, id: &ResourceId, key: &ResourceKey) -> DbResult<ReferenceId> {
        if !id.is_valid() {
            return Err(DatabaseError::UnknownResource);
        }
        if !key.is_valid() {
            return Err(DatabaseError::InvalidKey);
        }

        let live = self.datastore.read().await.get(id).cloned();
        let resource = match live {
            Some(resource) => resource,
            None => self.restore(id, key).await?,
        };

        if resource.key() != key {
            return Err(DatabaseError::InvalidKey);
        }

        let reference = ReferenceId::generate();
        self.references
            .write()
            .await
            .insert(reference.clone(), id.clone());

        debug!(id = %id, reference = %reference, "resource attached");
        Ok(reference)
    }

    /// Drop a reference. The resource itself stays live; other
    /// references are untouched.
    pub async fn detach(&self, reference: &ReferenceId) -> DbResult<()> {
        match self.references.write().await.remove(reference) {
            Some(_) => {
                debug!(reference = %reference, "reference detached");
                Ok(())
            }
            None => Err(DatabaseError::InvalidReference),
        }
    }

    /// Resolve a reference to its live resource.
    pub async fn resolve(&self, reference: &ReferenceId) -> DbResult<Arc<Resource>> {
        let id = self
            .references
            .read()
            .await
            .get(reference)
            .cloned()
            .ok_or(DatabaseError::InvalidReference)?;

        self.datastore
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(DatabaseError::InvalidResource)
    }

    /// Encrypt the current state and write it through the resource's
    /// storage backend.
    pub async fn commit(&self, reference: &ReferenceId) -> DbResult<()> {
        let resource = self.resolve(reference).await?;

        let storage = self
            .storages
            .get(resource.id().storage_id())
            .ok_or(DatabaseError::UnknownStorage)?;
        let crypto = self
            .cryptos
            .get(resource.key().crypto_id())
            .ok_or(DatabaseError::UnknownCrypto)?;

        let plaintext = {
            let state = resource.read_state().await;
            let mut buffer = Vec::from(state.type_tag().as_bytes());
            buffer.push(0);
            buffer.extend_from_slice(&state.encode());
            buffer
        };

        let ciphertext = crypto.encrypt(resource.key(), &plaintext)?;
        storage
            .set_data(resource.id(), resource.key(), &ciphertext)
            .await?;

        info!(id = %resource.id(), bytes = ciphertext.len(), "resource committed");
        Ok(())
    }

    /// Pull every payload a storage backend holds for the id, decrypt
    /// each, and fold them into a single live resource. The first
    /// payload constructs the state; every further payload must carry
    /// the same type tag and is merged in.
    pub async fn restore(&self, id: &ResourceId, key: &ResourceKey) -> DbResult<Arc<Resource>> {
        let storage = self
            .storages
            .get(id.storage_id())
            .ok_or(DatabaseError::UnknownResource)?;
        let crypto = self
            .cryptos
            .get(key.crypto_id())
            .ok_or(DatabaseError::InvalidKey)?;

        let (tx, mut rx) = mpsc::channel(RESTORE_SINK_DEPTH);
        let producer = {
            let storage = storage.clone();
            let id = id.clone();
            let key = key.clone();
            tokio::spawn(async move { storage.get_data(&id, &key, tx).await })
        };

        let mut restored: Option<(ResourceType, crate::crdt::SetState)> = None;

        while let Some(payload) = rx.recv().await {
            let plaintext = crypto.decrypt(key, &payload)?;

            let separator = plaintext
                .iter()
                .position(|byte| *byte == 0)
                .ok_or(DatabaseError::InvalidResourceData)?;
            let tag = std::str::from_utf8(&plaintext[..separator])
                .map_err(|_| DatabaseError::InvalidResourceData)?;
            let body = &plaintext[separator + 1..];

            if let Some((expected, state)) = restored.as_mut() {
                if expected.as_str() != tag {
                    return Err(DatabaseError::TypeMismatch);
                }
                state.decode_merge(body)?;
                debug!(id = %id, "merged replica payload");
            } else {
                let factory = self
                    .datatypes
                    .get(tag)
                    .ok_or(DatabaseError::UnknownType)?;
                let state = factory.restore(body)?;
                restored = Some((ResourceType::from(tag), state));
            }
        }

        // The sink closed. Nothing received means either a storage
        // failure or an id nobody holds.
        let produced = producer
            .await
            .map_err(|e| DatabaseError::Internal(e.to_string()))?;

        let (datatype, state) = match restored {
            Some(pair) => pair,
            None => {
                return Err(match produced {
                    Err(e) => e.into(),
                    Ok(()) => DatabaseError::UnknownResource,
                })
            }
        };
        if let Err(e) = produced {
            warn!(id = %id, error = %e, "storage reported an error after yielding payloads");
        }

        let resource = Arc::new(Resource::new(id.clone(), key.clone(), datatype, state));
        self.datastore
            .write()
            .await
            .insert(id.clone(), resource.clone());

        info!(id = %id, "resource restored");
        Ok(resource)
    }

    /// Merge resource b into resource a (a becomes a join of both).
    pub async fn merge(&self, ref_a: &ReferenceId, ref_b: &ReferenceId) -> DbResult<()> {
        let a = self.resolve(ref_a).await?;
        let b = self.resolve(ref_b).await?;

        if a.datatype() != b.datatype() {
            return Err(DatabaseError::TypeMismatch);
        }
        if Arc::ptr_eq(&a, &b) {
            // Merging a resource into itself is the identity.
            return Ok(());
        }

        // Snapshot b first so two opposing merges can never hold one
        // lock each while waiting for the other.
        let b_state = b.read_state().await.clone();
        let mut a_state = a.write_state().await;
        a_state.merge(&b_state)?;

        debug!(a = %a.id(), b = %b.id(), "resources merged");
        Ok(())
    }

    /// Create a fresh resource in the same storage and crypto as the
    /// source, carrying a deep copy of its state.
    pub async fn clone_resource(&self, reference: &ReferenceId) -> DbResult<Arc<Resource>> {
        let source = self.resolve(reference).await?;

        let datatype = source.datatype().clone();
        let storage_id = source.id().storage_id().to_string();
        let crypto_id = source.key().crypto_id().to_string();

        let target = self.create(&datatype, &storage_id, &crypto_id).await?;

        let snapshot = source.read_state().await.clone();
        *target.write_state().await = snapshot;

        debug!(source = %source.id(), target = %target.id(), "resource cloned");
        Ok(target)
    }

    /// Structural equality of two referenced resources.
    pub async fn equals(&self, ref_a: &ReferenceId, ref_b: &ReferenceId) -> DbResult<bool> {
        let a = self.resolve(ref_a).await?;
        let b = self.resolve(ref_b).await?;

        if a.datatype() != b.datatype() {
            return Err(DatabaseError::TypeMismatch);
        }
        if Arc::ptr_eq(&a, &b) {
            return Ok(true);
        }

        let b_state = b.read_state().await.clone();
        let a_state = a.read_state().await;
        Ok(a_state.equals(&b_state)?)
    }

    /// Drop a resource from the live table so a later attach restores
    /// it from storage. Used by replication tests and administrative
    /// tooling; references to the id become dangling.
    pub async fn evict(&self, id: &ResourceId) -> bool {
        self.datastore.write().await.remove(id).is_some()
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}
