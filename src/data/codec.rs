use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Errors raised while moving records on and off the wire
#[derive(Debug, Clone, PartialEq)]
pub enum CodecError {
    EmptyPayload,
    Malformed(String),
    Encode(String),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::EmptyPayload => write!(f, "payload is empty"),
            CodecError::Malformed(msg) => write!(f, "malformed payload: {}", msg),
            CodecError::Encode(msg) => write!(f, "failed to encode record: {}", msg),
        }
    }
}

impl std::error::Error for CodecError {}

/// Encode a record as a JSON wire payload.
pub fn to_wire<T: Serialize>(record: &T) -> Result<String, CodecError> {
    serde_json::to_string(record).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decode a JSON wire payload into a record.
///
/// Fields absent from the payload take the record's defaults.
pub fn from_wire<T: DeserializeOwned>(payload: &str) -> Result<T, CodecError> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Err(CodecError::EmptyPayload);
    }

    debug!(payload_len = trimmed.len(), "Decoding wire payload");

    serde_json::from_str(trimmed).map_err(|e| CodecError::Malformed(e.to_string()))
}
