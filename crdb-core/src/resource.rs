/*
    resource.rs - Identifier algebra and the live resource handle

    Identifiers are plain strings with a single ':' separator:
    - resource id  = <storage-id>:<opaque locator>
    - resource key = <crypto-id>:<base64 key material>
    - reference id = flat UUID, minted per attach

    A Resource is a live CRDT instance plus its id, key and type. Every
    resource carries its own reader/writer guard; mutations on the same
    resource serialize through it while different resources proceed in
    parallel.
*/

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::crdt::SetState;

/// Identifier of a persisted resource: `<storage-id>:<opaque>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId(String);

impl ResourceId {
    /// Compose a resource id from a storage type id and its locator.
    pub fn new(storage_id: &str, opaque: &str) -> Self {
        ResourceId(format!("{}:{}", storage_id, opaque))
    }

    /// The storage backend selector (text before the first colon).
    pub fn storage_id(&self) -> &str {
        self.0.split_once(':').map(|(s, _)| s).unwrap_or("")
    }

    /// The backend-specific locator (text after the first colon).
    pub fn opaque(&self) -> &str {
        self.0.split_once(':').map(|(_, o)| o).unwrap_or("")
    }

    /// Valid iff both halves are non-empty.
    pub fn is_valid(&self) -> bool {
        match self.0.split_once(':') {
            Some((storage, opaque)) => !storage.is_empty() && !opaque.is_empty(),
            None => false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        ResourceId(s.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(s: String) -> Self {
        ResourceId(s)
    }
}

/// Access credential for a resource: `<crypto-id>:<base64 key material>`.
///
/// Equality is byte-exact; possession of the exact key is the access
/// credential.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey(String);

impl ResourceKey {
    /// Compose a resource key from a crypto method id and raw material.
    pub fn new(crypto_id: &str, material: &[u8]) -> Self {
        ResourceKey(format!("{}:{}", crypto_id, BASE64.encode(material)))
    }

    /// The crypto method selector (text before the first colon).
    pub fn crypto_id(&self) -> &str {
        self.0.split_once(':').map(|(c, _)| c).unwrap_or("")
    }

    /// Decoded key material. `None` when the encoded half is not valid
    /// base64.
    pub fn material(&self) -> Option<Vec<u8>> {
        let encoded = self.0.split_once(':').map(|(_, m)| m)?;
        BASE64.decode(encoded).ok()
    }

    /// Valid iff the crypto tag is non-empty.
    pub fn is_valid(&self) -> bool {
        !self.crypto_id().is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceKey {
    fn from(s: &str) -> Self {
        ResourceKey(s.to_string())
    }
}

impl From<String> for ResourceKey {
    fn from(s: String) -> Self {
        ResourceKey(s)
    }
}

/// Ephemeral, process-local handle a client uses to address a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceId(String);

impl ReferenceId {
    /// Mint a fresh, unguessable reference id.
    pub fn generate() -> Self {
        ReferenceId(Uuid::new_v4().to_string())
    }

    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReferenceId {
    fn from(s: &str) -> Self {
        ReferenceId(s.to_string())
    }
}

impl From<String> for ReferenceId {
    fn from(s: String) -> Self {
        ReferenceId(s)
    }
}

/// Symbolic datatype tag selecting the resource factory (e.g. `crdt:gset`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceType(String);

impl ResourceType {
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceType {
    fn from(s: &str) -> Self {
        ResourceType(s.to_string())
    }
}

impl From<String> for ResourceType {
    fn from(s: String) -> Self {
        ResourceType(s)
    }
}

/// A live CRDT instance plus its identity.
pub struct Resource {
    id: ResourceId,
    key: ResourceKey,
    datatype: ResourceType,
    state: RwLock<SetState>,
}

impl Resource {
    pub fn new(id: ResourceId, key: ResourceKey, datatype: ResourceType, state: SetState) -> Self {
        Resource {
            id,
            key,
            datatype,
            state: RwLock::new(state),
        }
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    pub fn datatype(&self) -> &ResourceType {
        &self.datatype
    }

    /// Shared read access to the CRDT state. Iteration holds this guard
    /// for the duration of the stream.
    pub async fn read_state(&self) -> RwLockReadGuard<'_, SetState> {
        self.state.read().await
    }

    /// Exclusive access for mutations.
    pub async fn write_state(&self) -> RwLockWriteGuard<'_, SetState> {
        self.state.write().await
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id)
            .field("type", &self.datatype)
            .finish()
    }
}
