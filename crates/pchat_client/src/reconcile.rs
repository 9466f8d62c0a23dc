//! Applying server pushes to local state.

use pchat_proto::ServerEvent;
use tracing::debug;

use crate::presence::PresenceSet;
use crate::store::{AppendOutcome, MessageStore};

/// Everything the server of record is authoritative for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatState {
    pub store: MessageStore,
    pub presence: PresenceSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Presence,
    Appended(AppendOutcome),
    Reconciled,
    /// Status push for an id the store does not hold.
    Ignored,
}

impl Applied {
    pub fn changed(self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

pub fn apply(state: &mut ChatState, event: ServerEvent) -> Applied {
    match event {
        ServerEvent::UserList(users) => {
            state.presence.replace(users);
            Applied::Presence
        }
        ServerEvent::Message(record) => Applied::Appended(state.store.append(record)),
        ServerEvent::StatusUpdate(record) => {
            let id = record.id.clone();
            if state.store.reconcile_by_id(record) {
                Applied::Reconciled
            } else {
                debug!(message_id = %id, "status push for unknown message");
                Applied::Ignored
            }
        }
    }
}
