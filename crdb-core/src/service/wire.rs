/*
    wire.rs - Framed request/response envelope

    Tagged JSON messages in u32-LE length-prefixed frames. The frame
    length is read before the body and bounded, so a malformed or
    hostile peer cannot make the server allocate unbounded memory.

    Streaming operations emit any number of ListItem frames followed by
    one ListEnd frame.
*/

use serde::{Deserialize, Serialize};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::messages::*;

/// Default maximum frame size (64 KiB).
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Client-to-server messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Create(CreateRequest),
    Attach(AttachRequest),
    Detach(DetachRequest),
    Commit(CommitRequest),
    Merge(MergeRequest),
    Clone(CloneRequest),
    Equals(EqualsRequest),
    SupportedTypes,
    SupportedStorageTypes,
    SupportedCryptoMethods,
    IsSupportedType(TypeQueryRequest),
    IsSupportedStorageType(TypeQueryRequest),
    IsSupportedCryptoMethod(TypeQueryRequest),
    SetInsert(SetInsertRequest),
    SetRemove(SetRemoveRequest),
    SetContains(SetContainsRequest),
    SetLength(SetLengthRequest),
    SetList(SetListRequest),
}

/// Server-to-client messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Response {
    Create(CreateResponse),
    Attach(AttachResponse),
    Detach(DetachResponse),
    Commit(CommitResponse),
    Merge(MergeResponse),
    Clone(CloneResponse),
    Equals(EqualsResponse),
    Types(TypeListResponse),
    Boolean(BooleanResponse),
    SetInsert(SetInsertResponse),
    SetRemove(SetRemoveResponse),
    SetContains(SetContainsResponse),
    SetLength(SetLengthResponse),
    ListItem(SetElementMessage),
    ListEnd(ListEndMessage),
}

/// Encode a message into a frame body.
pub fn encode_message<T: Serialize>(message: &T) -> io::Result<Vec<u8>> {
    serde_json::to_vec(message).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Decode a frame body into a message.
pub fn decode_message<T: for<'de> Deserialize<'de>>(payload: &[u8]) -> io::Result<T> {
    serde_json::from_slice(payload).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Write one length-prefixed frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    if payload.len() > MAX_FRAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "frame exceeds maximum size",
        ));
    }

    writer.write_all(&(payload.len() as u32).to_le_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await
}

/// Read one length-prefixed frame. `Ok(None)` means the peer closed the
/// connection cleanly between frames.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_frame_size: usize,
) -> io::Result<Option<Vec<u8>>> {
    let mut length_bytes = [0u8; 4];
    match reader.read_exact(&mut length_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let length = u32::from_le_bytes(length_bytes) as usize;
    if length > max_frame_size {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "frame exceeds maximum size",
        ));
    }

    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}
