//! Seams between the engine and the two duplex channels.
//!
//! A connector opens a channel, spawns whatever reads from it (feeding the
//! engine's event queue) and hands back the write half. Dropping the
//! returned sink closes the channel.

use async_trait::async_trait;

use crate::error::ClientError;
use crate::event::EventSender;

#[async_trait]
pub trait ChannelSink: Send {
    async fn send_text(&mut self, text: String) -> Result<(), ClientError>;

    /// False once the peer closed or a read/write failed.
    fn is_open(&self) -> bool;
}

#[async_trait]
pub trait PrimaryConnector: Send + Sync {
    async fn open(&self, events: EventSender) -> Result<Box<dyn ChannelSink>, ClientError>;
}

#[async_trait]
pub trait ValidationConnector: Send + Sync {
    /// Inbound classifications must be tagged with `generation`.
    async fn open(
        &self,
        generation: u64,
        events: EventSender,
    ) -> Result<Box<dyn ChannelSink>, ClientError>;
}
