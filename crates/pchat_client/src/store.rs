//! Ordered message view, reconciled against the server of record.
//!
//! Insertion order is render order. Records are matched by identifier only;
//! nothing here compares message content.

use pchat_proto::{MessageId, MessageRecord};
use tracing::debug;

/// Prefix of identifiers given to optimistic entries before confirmation.
pub const PENDING_PREFIX: &str = "pending:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Added at the end.
    Appended,
    /// A record with this id was already present and was replaced in place.
    Merged,
    /// An optimistic entry with the same correlation token was confirmed in place.
    Confirmed,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageStore {
    records: Vec<MessageRecord>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MessageRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[MessageRecord] {
        &self.records
    }

    pub fn get(&self, id: &MessageId) -> Option<&MessageRecord> {
        self.records.iter().find(|r| &r.id == id)
    }

    pub fn position(&self, id: &MessageId) -> Option<usize> {
        self.records.iter().position(|r| &r.id == id)
    }

    /// Add a confirmed record at the end. Identifier uniqueness is kept: a
    /// record whose id is already present replaces that entry in place, and
    /// a record echoing the correlation token of an optimistic entry takes
    /// over that entry's slot.
    pub fn append(&mut self, record: MessageRecord) -> AppendOutcome {
        if self.position(&record.id).is_some() {
            self.reconcile_by_id(record);
            return AppendOutcome::Merged;
        }
        if let Some(idx) = record
            .client_ref
            .as_deref()
            .and_then(|token| self.pending_position(token))
        {
            debug!(id = %record.id, "optimistic entry confirmed");
            self.records[idx] = record;
            return AppendOutcome::Confirmed;
        }
        self.records.push(record);
        AppendOutcome::Appended
    }

    /// Add an unconfirmed local record. Its id must carry [`PENDING_PREFIX`].
    pub fn append_pending(&mut self, record: MessageRecord) {
        debug_assert!(record.id.as_str().starts_with(PENDING_PREFIX));
        self.records.push(record);
    }

    /// Replace the entry with the same identifier, keeping its position.
    ///
    /// Returns `false` (and changes nothing) when the id is unknown: a status
    /// push may legitimately race ahead of the record it refers to.
    pub fn reconcile_by_id(&mut self, incoming: MessageRecord) -> bool {
        let Some(idx) = self.position(&incoming.id) else {
            debug!(id = %incoming.id, "reconcile for unknown id ignored");
            return false;
        };
        let slot = &mut self.records[idx];
        if slot.sender != incoming.sender || slot.private != incoming.private {
            debug!(id = %incoming.id, "ignoring change to immutable sender/private fields");
        }
        let sender = std::mem::take(&mut slot.sender);
        let private = slot.private;
        *slot = MessageRecord {
            sender,
            private,
            ..incoming
        };
        true
    }

    /// Replace the whole view, e.g. with freshly fetched history. Duplicate
    /// ids collapse onto their first position.
    pub fn replace_all(&mut self, records: Vec<MessageRecord>) {
        self.records.clear();
        for record in records {
            self.append(record);
        }
    }

    fn pending_position(&self, token: &str) -> Option<usize> {
        self.records.iter().position(|r| {
            r.id.as_str().starts_with(PENDING_PREFIX) && r.client_ref.as_deref() == Some(token)
        })
    }
}
