/*
    Service layer - thin adapter over the database

    Translates request messages into core calls and wraps every outcome
    in a Status. Client input never panics the server; failures come
    back as wire kind strings. Raw element bytes are base64-encoded
    before insertion and decoded on listing, so the CRDT element domain
    stays canonical and collision-free.
*/

pub mod messages;
pub mod wire;

pub use messages::*;
pub use wire::{
    decode_message, encode_message, read_frame, write_frame, Request, Response, MAX_FRAME_SIZE,
};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

use crate::crdt::{CrdtError, SetKind};
use crate::database::{Database, DbResult};
use crate::resource::{ReferenceId, Resource, ResourceId, ResourceKey, ResourceType};

/// The CRDT service surface.
pub struct CrdtService {
    database: Arc<Database>,
}

impl CrdtService {
    pub fn new(database: Arc<Database>) -> Self {
        CrdtService { database }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    async fn resolve(&self, reference_id: &str) -> DbResult<Arc<Resource>> {
        self.database
            .resolve(&ReferenceId::from(reference_id))
            .await
    }

    // --- lifecycle operations ------------------------------------------

    pub async fn create(&self, request: CreateRequest) -> CreateResponse {
        let datatype = ResourceType::from(request.resource_type);
        match self
            .database
            .create(&datatype, &request.storage_id, &request.crypto_id)
            .await
        {
            Ok(resource) => CreateResponse {
                status: Status::ok(),
                resource_id: resource.id().to_string(),
                resource_key: resource.key().to_string(),
            },
            Err(e) => CreateResponse {
                status: Status::failure(&e),
                resource_id: String::new(),
                resource_key: String::new(),
            },
        }
    }

    pub async fn attach(&self, request: AttachRequest) -> AttachResponse {
        let id = ResourceId::from(request.resource_id);
        let key = ResourceKey::from(request.resource_key);

        match self.database.attach(&id, &key).await {
            Ok(reference) => AttachResponse {
                status: Status::ok(),
                reference_id: reference.to_string(),
            },
            Err(e) => AttachResponse {
                status: Status::failure(&e),
                reference_id: String::new(),
            },
        }
    }

    pub async fn detach(&self, request: DetachRequest) -> DetachResponse {
        let status = match self
            .database
            .detach(&ReferenceId::from(request.reference_id))
            .await
        {
            Ok(()) => Status::ok(),
            Err(e) => Status::failure(&e),
        };
        DetachResponse { status }
    }

    pub async fn commit(&self, request: CommitRequest) -> CommitResponse {
        let status = match self
            .database
            .commit(&ReferenceId::from(request.reference_id))
            .await
        {
            Ok(()) => Status::ok(),
            Err(e) => Status::failure(&e),
        };
        CommitResponse { status }
    }

    pub async fn merge(&self, request: MergeRequest) -> MergeResponse {
        let status = match self
            .database
            .merge(
                &ReferenceId::from(request.reference_id),
                &ReferenceId::from(request.other_reference_id),
            )
            .await
        {
            Ok(()) => Status::ok(),
            Err(e) => Status::failure(&e),
        };
        MergeResponse { status }
    }

    pub async fn clone_resource(&self, request: CloneRequest) -> CloneResponse {
        match self
            .database
            .clone_resource(&ReferenceId::from(request.reference_id))
            .await
        {
            Ok(resource) => CloneResponse {
                status: Status::ok(),
                resource_id: resource.id().to_string(),
                resource_key: resource.key().to_string(),
            },
            Err(e) => CloneResponse {
                status: Status::failure(&e),
                resource_id: String::new(),
                resource_key: String::new(),
            },
        }
    }

    pub async fn equals(&self, request: EqualsRequest) -> EqualsResponse {
        match self
            .database
            .equals(
                &ReferenceId::from(request.reference_id),
                &ReferenceId::from(request.other_reference_id),
            )
            .await
        {
            Ok(result) => EqualsResponse {
                status: Status::ok(),
                result,
            },
            Err(e) => EqualsResponse {
                status: Status::failure(&e),
                result: false,
            },
        }
    }

    // --- registry queries ----------------------------------------------

    pub fn supported_types(&self) -> TypeListResponse {
        TypeListResponse {
            types: self
                .database
                .supported_types()
                .into_iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }

    pub fn supported_storage_types(&self) -> TypeListResponse {
        TypeListResponse {
            types: self.database.supported_storage_types(),
        }
    }

    pub fn supported_crypto_methods(&self) -> TypeListResponse {
        TypeListResponse {
            types: self.database.supported_crypto_methods(),
        }
    }

    pub fn is_supported_type(&self, request: TypeQueryRequest) -> BooleanResponse {
        BooleanResponse {
            value: self
                .database
                .is_supported_type(&ResourceType::from(request.type_id)),
        }
    }

    pub fn is_supported_storage_type(&self, request: TypeQueryRequest) -> BooleanResponse {
        BooleanResponse {
            value: self.database.is_supported_storage_type(&request.type_id),
        }
    }

    pub fn is_supported_crypto_method(&self, request: TypeQueryRequest) -> BooleanResponse {
        BooleanResponse {
            value: self.database.is_supported_crypto_method(&request.type_id),
        }
    }

    // --- set operations ------------------------------------------------

    pub async fn set_insert(&self, request: SetInsertRequest) -> SetInsertResponse {
        let canonical = BASE64.encode(&request.object);

        let status = match self.resolve(&request.reference_id).await {
            Err(e) => Status::failure(&e),
            Ok(resource) => {
                let mut state = resource.write_state().await;
                match state.insert(&canonical) {
                    Ok(true) => Status::ok(),
                    Ok(false) => match state.kind() {
                        SetKind::GrowOnly => Status::failure(&CrdtError::AlreadyPresent),
                        SetKind::TwoPhase => Status::failure(&CrdtError::AlreadyInserted),
                    },
                    Err(e) => Status::failure(&e),
                }
            }
        };
        SetInsertResponse { status }
    }

    pub async fn set_remove(&self, request: SetRemoveRequest) -> SetRemoveResponse {
        let canonical = BASE64.encode(&request.object);

        let status = match self.resolve(&request.reference_id).await {
            Err(e) => Status::failure(&e),
            Ok(resource) => {
                let mut state = resource.write_state().await;
                match state.remove(&canonical) {
                    Ok(true) => Status::ok(),
                    // Never-inserted element; failed but kind-less.
                    Ok(false) => Status::rejected(),
                    Err(e) => Status::failure(&e),
                }
            }
        };
        SetRemoveResponse { status }
    }

    pub async fn set_contains(&self, request: SetContainsRequest) -> SetContainsResponse {
        let canonical = BASE64.encode(&request.object);

        match self.resolve(&request.reference_id).await {
            Err(e) => SetContainsResponse {
                status: Status::failure(&e),
                result: false,
            },
            Ok(resource) => SetContainsResponse {
                status: Status::ok(),
                result: resource.read_state().await.contains(&canonical),
            },
        }
    }

    pub async fn set_length(&self, request: SetLengthRequest) -> SetLengthResponse {
        match self.resolve(&request.reference_id).await {
            Err(e) => SetLengthResponse {
                status: Status::failure(&e),
                length: 0,
            },
            Ok(resource) => SetLengthResponse {
                status: Status::ok(),
                length: resource.read_state().await.len() as u64,
            },
        }
    }

    /// Stream the membership of a set, one message per element. The
    /// resource's read guard is held for the duration of the stream; a
    /// dropped receiver ends the iteration early.
    pub async fn set_list(&self, request: SetListRequest, sink: mpsc::Sender<SetElementMessage>) {
        let resource = match self.resolve(&request.reference_id).await {
            Ok(resource) => resource,
            Err(e) => {
                warn!(reference = %request.reference_id, error = %e, "list on unresolved reference");
                return;
            }
        };

        let state = resource.read_state().await;
        for element in state.iter() {
            let raw = match BASE64.decode(element) {
                Ok(raw) => raw,
                Err(_) => {
                    warn!(reference = %request.reference_id, "non-canonical element in set");
                    return;
                }
            };

            let message = SetElementMessage {
                reference_id: request.reference_id.clone(),
                object: raw,
            };
            if sink.send(message).await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::{GSetFactory, TwoPhaseSetFactory};
    use crate::crypto::{AesCbcMethod, AES_256_KEY_SIZE};
    use crate::storage::FileStore;
    use tempfile::TempDir;

    fn build_service(dir: &TempDir) -> CrdtService {
        let database = Database::new();
        database
            .register_storage(Arc::new(FileStore::new(dir.path()).unwrap()))
            .unwrap();
        database
            .register_crypto_method(Arc::new(AesCbcMethod::new(AES_256_KEY_SIZE).unwrap()))
            .unwrap();
        database.register_type(Arc::new(GSetFactory)).unwrap();
        database
            .register_type(Arc::new(TwoPhaseSetFactory))
            .unwrap();
        CrdtService::new(Arc::new(database))
    }

    async fn create_and_attach(service: &CrdtService, resource_type: &str) -> String {
        let created = service
            .create(CreateRequest {
                resource_type: resource_type.to_string(),
                storage_id: "file".to_string(),
                crypto_id: "aes-256-cbc".to_string(),
            })
            .await;
        assert!(created.status.success);

        let attached = service
            .attach(AttachRequest {
                resource_id: created.resource_id,
                resource_key: created.resource_key,
            })
            .await;
        assert!(attached.status.success);
        attached.reference_id
    }

    fn insert(reference: &str, object: &[u8]) -> SetInsertRequest {
        SetInsertRequest {
            reference_id: reference.to_string(),
            object: object.to_vec(),
        }
    }

    #[tokio::test]
    async fn test_insert_contains_length() {
        let dir = TempDir::new().unwrap();
        let service = build_service(&dir);
        let reference = create_and_attach(&service, "crdt:gset").await;

        assert!(service.set_insert(insert(&reference, b"alpha")).await.status.success);
        assert!(service.set_insert(insert(&reference, b"beta")).await.status.success);

        let contains = service
            .set_contains(SetContainsRequest {
                reference_id: reference.clone(),
                object: b"alpha".to_vec(),
            })
            .await;
        assert!(contains.status.success && contains.result);

        let missing = service
            .set_contains(SetContainsRequest {
                reference_id: reference.clone(),
                object: b"gamma".to_vec(),
            })
            .await;
        assert!(missing.status.success && !missing.result);

        let length = service
            .set_length(SetLengthRequest {
                reference_id: reference,
            })
            .await;
        assert_eq!(length.length, 2);
    }

    #[tokio::test]
    async fn test_duplicate_insert_kinds() {
        let dir = TempDir::new().unwrap();
        let service = build_service(&dir);

        let gset_ref = create_and_attach(&service, "crdt:gset").await;
        service.set_insert(insert(&gset_ref, b"x")).await;
        let dup = service.set_insert(insert(&gset_ref, b"x")).await;
        assert_eq!(dup.status.error, "crdt:item-already-present");

        let twop_ref = create_and_attach(&service, "crdt:2pset").await;
        service.set_insert(insert(&twop_ref, b"x")).await;
        let dup = service.set_insert(insert(&twop_ref, b"x")).await;
        assert_eq!(dup.status.error, "crdt:error-already-inserted");
    }

    #[tokio::test]
    async fn test_tombstone_surface() {
        let dir = TempDir::new().unwrap();
        let service = build_service(&dir);
        let reference = create_and_attach(&service, "crdt:2pset").await;

        service.set_insert(insert(&reference, b"x")).await;

        let removed = service
            .set_remove(SetRemoveRequest {
                reference_id: reference.clone(),
                object: b"x".to_vec(),
            })
            .await;
        assert!(removed.status.success);

        let again = service.set_insert(insert(&reference, b"x")).await;
        assert_eq!(again.status.error, "crdt:error-already-removed");

        let never = service
            .set_remove(SetRemoveRequest {
                reference_id: reference.clone(),
                object: b"ghost".to_vec(),
            })
            .await;
        assert!(!never.status.success);
        assert!(never.status.error.is_empty());
    }

    #[tokio::test]
    async fn test_remove_on_gset_is_unsupported() {
        let dir = TempDir::new().unwrap();
        let service = build_service(&dir);
        let reference = create_and_attach(&service, "crdt:gset").await;

        service.set_insert(insert(&reference, b"x")).await;
        let removed = service
            .set_remove(SetRemoveRequest {
                reference_id: reference,
                object: b"x".to_vec(),
            })
            .await;
        assert_eq!(removed.status.error, "crdt:unsupported-operation");
    }

    #[tokio::test]
    async fn test_unknown_reference_surfaces_kind() {
        let dir = TempDir::new().unwrap();
        let service = build_service(&dir);

        let response = service.set_insert(insert("no-such-ref", b"x")).await;
        assert_eq!(response.status.error, "crdt:invalid-reference");

        let response = service
            .detach(DetachRequest {
                reference_id: "no-such-ref".to_string(),
            })
            .await;
        assert_eq!(response.status.error, "crdt:invalid-reference");
    }

    #[tokio::test]
    async fn test_list_streams_raw_bytes() {
        let dir = TempDir::new().unwrap();
        let service = build_service(&dir);
        let reference = create_and_attach(&service, "crdt:gset").await;

        let payloads: Vec<&[u8]> = vec![b"one", b"two", &[0xff, 0x00, 0x7f]];
        for payload in &payloads {
            assert!(service.set_insert(insert(&reference, payload)).await.status.success);
        }

        let (tx, mut rx) = mpsc::channel(4);
        service
            .set_list(
                SetListRequest {
                    reference_id: reference.clone(),
                },
                tx,
            )
            .await;

        let mut received = Vec::new();
        while let Some(message) = rx.recv().await {
            assert_eq!(message.reference_id, reference);
            received.push(message.object);
        }

        assert_eq!(received.len(), payloads.len());
        for payload in payloads {
            assert!(received.iter().any(|r| r == payload));
        }
    }

    #[tokio::test]
    async fn test_list_stops_when_receiver_drops() {
        let dir = TempDir::new().unwrap();
        let service = build_service(&dir);
        let reference = create_and_attach(&service, "crdt:gset").await;

        for i in 0..16 {
            service
                .set_insert(insert(&reference, format!("element-{}", i).as_bytes()))
                .await;
        }

        let (tx, mut rx) = mpsc::channel(1);
        let first = tokio::spawn(async move { rx.recv().await });

        // Receiver takes one message and goes away; the producer must
        // finish rather than hang on a full channel.
        service
            .set_list(
                SetListRequest {
                    reference_id: reference,
                },
                tx,
            )
            .await;
        assert!(first.await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_registry_queries() {
        let dir = TempDir::new().unwrap();
        let service = build_service(&dir);

        let types = service.supported_types();
        assert_eq!(types.types, vec!["crdt:2pset", "crdt:gset"]);

        assert!(service
            .is_supported_type(TypeQueryRequest {
                type_id: "crdt:gset".to_string()
            })
            .value);
        assert!(!service
            .is_supported_storage_type(TypeQueryRequest {
                type_id: "tape".to_string()
            })
            .value);
        assert!(service
            .is_supported_crypto_method(TypeQueryRequest {
                type_id: "aes-256-cbc".to_string()
            })
            .value);
    }

    #[tokio::test]
    async fn test_clone_and_equals_via_service() {
        let dir = TempDir::new().unwrap();
        let service = build_service(&dir);
        let reference = create_and_attach(&service, "crdt:gset").await;

        service.set_insert(insert(&reference, b"shared")).await;

        let cloned = service
            .clone_resource(CloneRequest {
                reference_id: reference.clone(),
            })
            .await;
        assert!(cloned.status.success);

        let clone_ref = service
            .attach(AttachRequest {
                resource_id: cloned.resource_id,
                resource_key: cloned.resource_key,
            })
            .await
            .reference_id;

        let equals = service
            .equals(EqualsRequest {
                reference_id: reference,
                other_reference_id: clone_ref,
            })
            .await;
        assert!(equals.status.success);
        assert!(equals.result);
    }
}
