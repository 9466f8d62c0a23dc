//! Persisted status toggling.
//!
//! The client never flips status locally. It sends the flipped value and
//! waits for the server's status push, so repeated toggles before the push
//! send the same request again.

use pchat_proto::api::ToggleStatusRequest;
use pchat_proto::{MessageId, MessageRecord, MessageStatus};

use crate::error::ClientError;
use crate::store::PENDING_PREFIX;

/// Request flipping `current`. `viewer_scoped` is set only when the
/// addressed receiver toggles for themselves.
pub fn build_toggle(
    message_id: MessageId,
    current: MessageStatus,
    viewer_scoped: Option<&str>,
) -> ToggleStatusRequest {
    ToggleStatusRequest {
        message_id,
        status: current.flipped(),
        viewer: viewer_scoped.map(str::to_string),
    }
}

/// Toggle request for `viewer` acting on `record`, if they may.
///
/// The sender toggles globally. The receiver of a private message toggles
/// for themselves. Anyone else is refused, including a receiver named on a
/// public message.
pub fn toggle_request(
    record: &MessageRecord,
    viewer: &str,
) -> Result<ToggleStatusRequest, ClientError> {
    if record.id.as_str().starts_with(PENDING_PREFIX) {
        return Err(ClientError::InvalidInput(format!(
            "message {} is not confirmed yet",
            record.id
        )));
    }
    let scope = if record.is_from(viewer) {
        None
    } else if record.is_private_to(viewer) {
        Some(viewer)
    } else {
        return Err(ClientError::NotPermitted {
            viewer: viewer.to_string(),
            message_id: record.id.to_string(),
        });
    };
    Ok(build_toggle(record.id.clone(), record.status, scope))
}
