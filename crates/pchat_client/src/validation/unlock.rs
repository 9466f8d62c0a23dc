use std::collections::HashSet;

use pchat_proto::{ClassificationStatus, MessageId};

/// Message ids the liveness check currently classifies as unsafe to show.
///
/// Derived from classifications only; it never touches persisted status and
/// is emptied whenever a session closes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransientUnlockSet {
    flagged: HashSet<MessageId>,
}

impl TransientUnlockSet {
    pub fn contains(&self, id: &MessageId) -> bool {
        self.flagged.contains(id)
    }

    pub fn apply(&mut self, id: MessageId, status: ClassificationStatus) {
        match status {
            ClassificationStatus::Valid => {
                self.flagged.remove(&id);
            }
            ClassificationStatus::Invalid | ClassificationStatus::Error => {
                self.flagged.insert(id);
            }
        }
    }

    pub fn clear(&mut self) {
        self.flagged.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.flagged.is_empty()
    }

    pub fn len(&self) -> usize {
        self.flagged.len()
    }
}
