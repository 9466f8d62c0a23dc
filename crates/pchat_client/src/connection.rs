//! Lifetime of the primary chat channel.

use std::sync::Arc;

use pchat_proto::codec::encode_client_event;
use pchat_proto::ClientEvent;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::event::{EngineEvent, EventSender};
use crate::link::{ChannelSink, PrimaryConnector};

pub struct ConnectionManager {
    connector: Arc<dyn PrimaryConnector>,
    link: Option<Box<dyn ChannelSink>>,
    events: Option<EventSender>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn PrimaryConnector>) -> Self {
        Self {
            connector,
            link: None,
            events: None,
        }
    }

    /// Open the channel and register `identity` on it. Inbound pushes are
    /// delivered to `events`. An existing connection is replaced.
    pub async fn connect(&mut self, identity: &str, events: EventSender) -> Result<(), ClientError> {
        if identity.trim().is_empty() {
            return Err(ClientError::InvalidInput("identity must not be empty".into()));
        }
        self.disconnect();
        let link = self.connector.open(events.clone()).await?;
        self.link = Some(link);
        self.events = Some(events);
        self.send(&ClientEvent::Register {
            username: identity.to_string(),
        })
        .await?;
        info!(identity, "registered on chat channel");
        Ok(())
    }

    /// Fire-and-forget transmit. Fails only when there is no open channel or
    /// the write itself fails. A failed write ends the channel; dropping it
    /// stops its reader, so the close is queued from here instead.
    pub async fn send(&mut self, event: &ClientEvent) -> Result<(), ClientError> {
        let link = match self.link.as_mut() {
            Some(link) if link.is_open() => link,
            _ => return Err(ClientError::NotConnected),
        };
        let text = encode_client_event(event)?;
        if let Err(err) = link.send_text(text).await {
            warn!(error = %err, "chat channel write failed");
            self.link = None;
            if let Some(events) = &self.events {
                let _ = events.send(EngineEvent::PrimaryClosed {
                    reason: Some(err.to_string()),
                });
            }
            return Err(err);
        }
        debug!(kind = event_kind(event), "sent");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.link.as_ref().is_some_and(|l| l.is_open())
    }

    /// The channel ended on its own. Nothing reconnects.
    pub fn on_closed(&mut self, reason: Option<&str>) {
        warn!(reason = reason.unwrap_or("closed by peer"), "chat channel closed");
        self.link = None;
    }

    pub fn disconnect(&mut self) {
        if self.link.take().is_some() {
            info!("chat channel disconnected");
        }
    }
}

fn event_kind(event: &ClientEvent) -> &'static str {
    match event {
        ClientEvent::Register { .. } => "register",
        ClientEvent::Message(_) => "message",
    }
}
