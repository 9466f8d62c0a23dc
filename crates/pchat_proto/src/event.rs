//! Tagged events on the primary chat channel.

use serde::{Deserialize, Serialize};

use crate::record::{MessageRecord, MessageStatus};

/// Client → server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Sent once the channel is open.
    Register { username: String },
    Message(OutgoingMessage),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub sender: String,
    pub text: String,
    pub private: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    pub status: MessageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ref: Option<String>,
}

/// Server → client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full presence list; replaces whatever the client had.
    UserList(Vec<String>),
    /// A newly confirmed message.
    Message(MessageRecord),
    /// Authoritative replacement of an existing message.
    StatusUpdate(MessageRecord),
}

impl ServerEvent {
    pub const KINDS: &'static [&'static str] = &["user_list", "message", "status_update"];

    pub fn kind(&self) -> &'static str {
        match self {
            Self::UserList(_) => "user_list",
            Self::Message(_) => "message",
            Self::StatusUpdate(_) => "status_update",
        }
    }
}
