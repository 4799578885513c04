use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{BatchRequest, BatchResponse, MAX_MESSAGE_SIZE, PROTOCOL_VERSION};

/// JSON codec for batched exchanges.
pub struct BatchCodec;

impl BatchCodec {
    pub fn encode_request(request: &BatchRequest) -> ProtocolResult<Bytes> {
        encode(request)
    }

    /// Decode a request, rejecting oversized bodies and foreign versions.
    pub fn decode_request(data: &[u8]) -> ProtocolResult<BatchRequest> {
        let request: BatchRequest = decode(data)?;
        if request.version != PROTOCOL_VERSION {
            return Err(ProtocolError::VersionMismatch {
                local: PROTOCOL_VERSION,
                remote: request.version,
            });
        }
        Ok(request)
    }

    pub fn encode_response(response: &BatchResponse) -> ProtocolResult<Bytes> {
        encode(response)
    }

    pub fn decode_response(data: &[u8]) -> ProtocolResult<BatchResponse> {
        decode(data)
    }
}

fn encode<T: Serialize>(message: &T) -> ProtocolResult<Bytes> {
    let body = serde_json::to_vec(message).map_err(|e| ProtocolError::Serialization(e.to_string()))?;
    if body.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: body.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(Bytes::from(body))
}

fn decode<T: DeserializeOwned>(data: &[u8]) -> ProtocolResult<T> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: data.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    serde_json::from_slice(data).map_err(|e| ProtocolError::Deserialization(e.to_string()))
}
