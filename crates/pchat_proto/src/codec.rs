//! Wire codec: JSON text frames in both directions.
//!
//! Inbound decoding separates three failure classes so callers can log
//! them distinctly and carry on:
//! - the frame is not JSON at all,
//! - the frame is JSON but its `type` tag is missing or unknown,
//! - the tag is known but the payload does not match its shape.

use serde::Serialize;

use crate::event::{ClientEvent, ServerEvent};
use crate::validation::{Classification, FrameEvent};

#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    #[error("Malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("Missing event type tag")]
    MissingType,
    #[error("Unknown event type: {0}")]
    UnknownEvent(String),
    #[error("Invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),
}

/// Decode one frame from the primary channel.
pub fn decode_server_event(text: &str) -> Result<ServerEvent, ProtoError> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(ProtoError::Malformed)?;
    let kind = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or(ProtoError::MissingType)?
        .to_string();
    if !ServerEvent::KINDS.contains(&kind.as_str()) {
        return Err(ProtoError::UnknownEvent(kind));
    }
    serde_json::from_value(value).map_err(|source| ProtoError::InvalidPayload { kind, source })
}

/// Decode one frame from the validation channel.
pub fn decode_classification(text: &str) -> Result<Classification, ProtoError> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(ProtoError::Malformed)?;
    serde_json::from_value(value).map_err(|source| ProtoError::InvalidPayload {
        kind: "classification".into(),
        source,
    })
}

pub fn encode_client_event(event: &ClientEvent) -> Result<String, ProtoError> {
    encode(event)
}

pub fn encode_frame(frame: &FrameEvent) -> Result<String, ProtoError> {
    encode(frame)
}

fn encode<T: Serialize>(value: &T) -> Result<String, ProtoError> {
    serde_json::to_string(value).map_err(ProtoError::Serialization)
}
