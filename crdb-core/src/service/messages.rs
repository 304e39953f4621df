/*
    messages.rs - Request/response message types

    Every response carries a Status whose error field is the stable
    `crdt:` wire kind string on failure and empty on success. Raw
    element bytes travel base64-encoded on the wire.
*/

use serde::{Deserialize, Serialize};
use std::fmt;

/// Base64 transport encoding for byte fields.
pub mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Outcome of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub success: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl Status {
    pub fn ok() -> Self {
        Status {
            success: true,
            error: String::new(),
        }
    }

    pub fn failure(error: &impl fmt::Display) -> Self {
        Status {
            success: false,
            error: error.to_string(),
        }
    }

    /// Failed without a dedicated error kind.
    pub fn rejected() -> Self {
        Status {
            success: false,
            error: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequest {
    pub resource_type: String,
    pub storage_id: String,
    pub crypto_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResponse {
    pub status: Status,
    #[serde(default)]
    pub resource_id: String,
    #[serde(default)]
    pub resource_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachRequest {
    pub resource_id: String,
    pub resource_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachResponse {
    pub status: Status,
    #[serde(default)]
    pub reference_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetachRequest {
    pub reference_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetachResponse {
    pub status: Status,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRequest {
    pub reference_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitResponse {
    pub status: Status,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRequest {
    pub reference_id: String,
    pub other_reference_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeResponse {
    pub status: Status,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloneRequest {
    pub reference_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloneResponse {
    pub status: Status,
    #[serde(default)]
    pub resource_id: String,
    #[serde(default)]
    pub resource_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EqualsRequest {
    pub reference_id: String,
    pub other_reference_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EqualsResponse {
    pub status: Status,
    #[serde(default)]
    pub result: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeListResponse {
    pub types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeQueryRequest {
    pub type_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BooleanResponse {
    pub value: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetInsertRequest {
    pub reference_id: String,
    #[serde(with = "b64")]
    pub object: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetInsertResponse {
    pub status: Status,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetRemoveRequest {
    pub reference_id: String,
    #[serde(with = "b64")]
    pub object: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetRemoveResponse {
    pub status: Status,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetContainsRequest {
    pub reference_id: String,
    #[serde(with = "b64")]
    pub object: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetContainsResponse {
    pub status: Status,
    #[serde(default)]
    pub result: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetLengthRequest {
    pub reference_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetLengthResponse {
    pub status: Status,
    #[serde(default)]
    pub length: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetListRequest {
    pub reference_id: String,
}

/// One element of a streamed listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetElementMessage {
    pub reference_id: String,
    #[serde(with = "b64")]
    pub object: Vec<u8>,
}

/// Terminator frame of a streamed listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListEndMessage {
    pub status: Status,
}
