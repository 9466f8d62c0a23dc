//! Everything the engine reacts to arrives as one of these, in order, on a
//! single queue.

use pchat_proto::{Classification, ServerEvent};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Decoded push from the primary channel.
    Primary(ServerEvent),
    /// The primary channel ended. No reconnection follows.
    PrimaryClosed { reason: Option<String> },
    /// Verdict from the validation channel opened for `generation`.
    Classification {
        generation: u64,
        result: Classification,
    },
    /// The validation channel opened for `generation` ended or failed.
    ValidationClosed {
        generation: u64,
        reason: Option<String>,
    },
    /// Capture period elapsed for the session opened as `generation`.
    CaptureTick { generation: u64 },
}

pub type EventSender = mpsc::UnboundedSender<EngineEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

pub fn event_queue() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
