//! Per-viewer visibility decision.
//!
//! Evaluated fresh on every render and never stored. The rules form a strict
//! priority chain; the first one that matches decides.
//!
//! 1. The sender always sees their own content.
//! 2. A private message addressed to the viewer is shown only while a session
//!    validating exactly that message is active and has not flagged it.
//! 3. Anything else is obscured if flagged by the session, else if its
//!    persisted status is `invalid`.

use pchat_proto::{MessageId, MessageRecord, MessageStatus};
use serde::Serialize;

use crate::validation::TransientUnlockSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Reveal,
    Obscure,
}

impl Visibility {
    pub fn is_obscured(self) -> bool {
        matches!(self, Self::Obscure)
    }

    fn obscure_if(cond: bool) -> Self {
        if cond {
            Self::Obscure
        } else {
            Self::Reveal
        }
    }
}

/// Decide whether `viewer` may see `message` right now.
///
/// `active_target` is the message the streaming validation session is
/// checking, or `None` when no session is active.
pub fn decide(
    message: &MessageRecord,
    viewer: &str,
    active_target: Option<&MessageId>,
    unlocks: &TransientUnlockSet,
) -> Visibility {
    if message.is_from(viewer) {
        return Visibility::Reveal;
    }

    if message.is_private_to(viewer) {
        return match active_target {
            None => Visibility::Obscure,
            Some(target) if *target == message.id => {
                Visibility::obscure_if(unlocks.contains(&message.id))
            }
            Some(_) => Visibility::Obscure,
        };
    }

    if unlocks.contains(&message.id) {
        return Visibility::Obscure;
    }
    Visibility::obscure_if(message.status == MessageStatus::Invalid)
}
