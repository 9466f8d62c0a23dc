//! Request/response bodies for the HTTP collaborators.
//! These map directly to JSON bodies on the wire.

use serde::{Deserialize, Serialize};

use crate::record::{MessageId, MessageStatus};

// ── Toggle ───────────────────────────────────────────────────────────────────

/// `POST /toggle_status/{message_id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleStatusRequest {
    #[serde(skip)]
    pub message_id: MessageId,
    pub status: MessageStatus,
    /// Present only when the addressed receiver toggles for themselves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleStatusResponse {
    pub success: bool,
}

// ── Upload ───────────────────────────────────────────────────────────────────

/// Form fields of `POST /upload`; the file part is added by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadForm {
    pub sender: String,
    pub text: String,
    pub private: bool,
    pub receiver: Option<String>,
    pub status: MessageStatus,
    pub filename: String,
    pub content_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message_id: MessageId,
    pub file_id: String,
}

// ── Common ───────────────────────────────────────────────────────────────────

/// FastAPI-style error body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}
