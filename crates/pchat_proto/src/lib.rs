//! pchat_proto: Wire types and serialisation for Privacy Chat
//!
//! Both channels speak JSON text frames. The server of record is
//! authoritative; these types only mirror what it sends and accepts.
//!
//! # Modules
//! - `record`: `MessageRecord`, the unit of the message store
//! - `event`: Tagged events on the primary (chat) channel
//! - `validation`: Frame and classification events on the validation channel
//! - `api`: Request/response bodies for the HTTP collaborators
//! - `codec`: Tolerant decoding of inbound frames

pub mod api;
pub mod codec;
pub mod event;
pub mod record;
pub mod validation;

pub use codec::ProtoError;
pub use event::{ClientEvent, OutgoingMessage, ServerEvent};
pub use record::{MessageId, MessageRecord, MessageStatus};
pub use validation::{Classification, ClassificationStatus, FrameEvent};
