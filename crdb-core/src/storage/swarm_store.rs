/*
    swarm_store.rs - Content-addressed peer-to-peer storage provider

    Resources are located by content hash; each peer publishes its
    holdings in a manifest under an obfuscated link name derived from
    (peer id, resource locator, key material). Two peers holding the
    same resource therefore use different link names, and a manifest
    dump does not reveal which resources a peer shares. Computing a
    link name requires the key material, so the name also authenticates
    intent.

    Retrieval emits the local copy first, then gathers peer copies
    until providers are exhausted or the gather timeout fires. A
    timeout is not an error: the sink closes normally over whatever
    arrived.
*/

use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::errors::StorageResult;
use super::manifest::{Manifest, MANIFEST_SENTINEL};
use super::object_store::{multihash_hex, ObjectStore};
use super::{PayloadSink, Storage};
use crate::resource::{ResourceId, ResourceKey};

/// Storage type id of the swarm provider.
pub const SWARM_STORAGE_TYPE: &str = "swarm";

/// Size of the random seed object backing a fresh resource id.
const RESOURCE_SEED_SIZE: usize = 256;

/// Content-addressed storage provider over a pluggable object store.
pub struct SwarmStore {
    store: Arc<dyn ObjectStore>,
    manifest: Manifest,
    gather_timeout: Duration,
}

impl SwarmStore {
    /// Open a provider over the given object store, resolving or
    /// initializing the local manifest.
    pub async fn open(
        store: Arc<dyn ObjectStore>,
        gather_timeout: Duration,
    ) -> StorageResult<Self> {
        let manifest = Manifest::open(store.clone()).await?;
        Ok(SwarmStore {
            store,
            manifest,
            gather_timeout,
        })
    }

    /// Obfuscated manifest link name for one (peer, resource, key)
    /// triple.
    pub fn link_name(peer_id: &str, id: &ResourceId, key: &ResourceKey) -> String {
        let mut input = Vec::from(peer_id.as_bytes());
        input.extend_from_slice(id.opaque().as_bytes());
        input.extend_from_slice(&key.material().unwrap_or_default());
        multihash_hex(&input)
    }

    /// Walk every provider of the resource and emit each peer's payload
    /// into the sink. Per-peer failures are skipped.
    async fn gather_from_peers(
        &self,
        id: &ResourceId,
        key: &ResourceKey,
        sink: &PayloadSink,
    ) -> StorageResult<()> {
        let local_peer = self.store.peer_id().to_string();
        let providers = self.store.find_providers(id.opaque()).await?;

        for peer in providers.iter().filter(|p| **p != local_peer) {
            let link = Self::link_name(peer, id, key);

            let manifest_hash = match self.store.name_resolve(peer).await {
                Ok(hash) => hash,
                Err(e) => {
                    warn!(peer = %peer, error = %e, "failed to resolve peer manifest");
                    continue;
                }
            };

            let manifest = match self.store.get_object(&manifest_hash).await {
                Ok(object) => object,
                Err(e) => {
                    warn!(peer = %peer, error = %e, "failed to fetch peer manifest");
                    continue;
                }
            };

            if manifest.data != MANIFEST_SENTINEL {
                warn!(peer = %peer, "resolved object is not a manifest");
                continue;
            }

            let blob_hash = match manifest.links.get(&link) {
                Some(hash) => hash,
                None => {
                    debug!(peer = %peer, "peer manifest has no entry for this resource");
                    continue;
                }
            };

            let blob = match self.store.get_object(blob_hash).await {
                Ok(object) if !object.data.is_empty() => object,
                Ok(_) => {
                    warn!(peer = %peer, "peer served an empty payload");
                    continue;
                }
                Err(e) => {
                    warn!(peer = %peer, error = %e, "failed to fetch peer payload");
                    continue;
                }
            };

            debug!(peer = %peer, bytes = blob.data.len(), "gathered peer payload");
            if sink.send(blob.data).await.is_err() {
                // Consumer stopped listening; stop gathering.
                return Ok(());
            }

            // Pull the seed object so this peer is discoverable as a
            // provider from now on.
            let _ = self.store.get_object(id.opaque()).await;
        }

        Ok(())
    }
}

#[async_trait]
impl Storage for SwarmStore {
    fn type_id(&self) -> &str {
        SWARM_STORAGE_TYPE
    }

    /// Pin a random seed object; its hash becomes the locator peers use
    /// for provider discovery.
    async fn generate_resource_id(&self) -> StorageResult<ResourceId> {
        let mut seed = vec![0u8; RESOURCE_SEED_SIZE];
        OsRng.fill_bytes(&mut seed);

        let hash = self.store.put_object(seed).await?;
        Ok(ResourceId::new(SWARM_STORAGE_TYPE, &hash))
    }

    async fn has_resource(&self, id: &ResourceId) -> bool {
        id.storage_id() == SWARM_STORAGE_TYPE
    }

    async fn get_data(
        &self,
        id: &ResourceId,
        key: &ResourceKey,
        sink: PayloadSink,
    ) -> StorageResult<()> {
        // Local copy first.
        let local_link = Self::link_name(self.store.peer_id(), id, key);
        match self.manifest.lookup(&local_link).await {
            Some(hash) => match self.store.get_object(&hash).await {
                Ok(object) if !object.data.is_empty() => {
                    debug!(id = %id, bytes = object.data.len(), "emitting local payload");
                    let _ = sink.send(object.data).await;
                }
                _ => warn!(id = %id, "local manifest entry points at a bad object"),
            },
            None => debug!(id = %id, "no local copy of resource"),
        }

        // Peer copies, bounded by the gather timeout.
        if timeout(self.gather_timeout, self.gather_from_peers(id, key, &sink))
            .await
            .is_err()
        {
            debug!(id = %id, "peer gather timed out, closing sink");
        }

        Ok(())
    }

    async fn set_data(
        &self,
        id: &ResourceId,
        key: &ResourceKey,
        data: &[u8],
    ) -> StorageResult<()> {
        let hash = self.store.put_object(data.to_vec()).await?;

        let link = Self::link_name(self.store.peer_id(), id, key);
        self.manifest.add_link(&link, &hash).await?;
        self.manifest.publish().await?;

        debug!(id = %id, blob = %hash, "payload published");
        Ok(())
    }
}
