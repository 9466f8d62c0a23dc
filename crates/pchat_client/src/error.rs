use thiserror::Error;

use pchat_proto::ProtoError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Channel transport error: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request failed ({status}): {detail}")]
    Request { status: u16, detail: String },

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtoError),

    #[error("Not connected: the chat channel is closed")]
    NotConnected,

    #[error("{viewer} may not do that to message {message_id}")]
    NotPermitted { viewer: String, message_id: String },

    #[error("Unknown message: {0}")]
    UnknownMessage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Failures that end a validation session attempt. None are retried.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Validation channel failed to open: {0}")]
    ChannelOpen(String),

    #[error("Frame capture failed: {0}")]
    Capture(String),
}
