//! Events on the validation (liveness) channel.

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

use crate::record::MessageId;

/// One captured frame, sent once per capture period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameEvent {
    /// Base64 (standard alphabet) JPEG bytes, no data-URL prefix.
    pub frame: String,
    pub message_id: MessageId,
    #[serde(rename = "faceAuth")]
    pub face_auth: bool,
    #[serde(rename = "requireSingle")]
    pub require_single: bool,
}

impl FrameEvent {
    pub fn from_jpeg(
        jpeg: &[u8],
        message_id: MessageId,
        face_auth: bool,
        require_single: bool,
    ) -> Self {
        Self {
            frame: general_purpose::STANDARD.encode(jpeg),
            message_id,
            face_auth,
            require_single,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationStatus {
    Valid,
    Invalid,
    Error,
}

impl ClassificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Invalid => "invalid",
            Self::Error => "error",
        }
    }
}

/// Server verdict for one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub status: ClassificationStatus,
    #[serde(default)]
    pub message_id: Option<MessageId>,
    /// Human-readable reason, e.g. "2 people (need 1)".
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persons: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorized: Option<u32>,
}

impl Classification {
    /// Status line shown while validating.
    pub fn summary(&self) -> &str {
        self.message.as_deref().unwrap_or(self.status.as_str())
    }
}
