//! WebSocket implementation of the channel seams.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, StreamExt};
use futures_util::SinkExt;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use pchat_proto::codec::{decode_classification, decode_server_event};

use crate::error::ClientError;
use crate::event::{EngineEvent, EventSender};
use crate::link::{ChannelSink, PrimaryConnector, ValidationConnector};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Write half of a WebSocket plus the task draining its read half.
pub struct WsSink {
    sink: SplitSink<WsStream, Message>,
    open: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

#[async_trait]
impl ChannelSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<(), ClientError> {
        if !self.is_open() {
            return Err(ClientError::NotConnected);
        }
        if let Err(err) = self.sink.send(Message::Text(text.into())).await {
            self.open.store(false, Ordering::SeqCst);
            return Err(ClientError::Transport(err.to_string()));
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl Drop for WsSink {
    fn drop(&mut self) {
        self.open.store(false, Ordering::SeqCst);
        self.reader.abort();
    }
}

/// Connect to `url` and forward every text frame through `decode`.
///
/// Frames `decode` rejects are dropped; when the stream ends, `closed` is
/// queued with the close reason (if any).
async fn open_ws<D, C>(
    url: &str,
    events: EventSender,
    decode: D,
    closed: C,
) -> Result<WsSink, ClientError>
where
    D: Fn(&str) -> Option<EngineEvent> + Send + 'static,
    C: FnOnce(Option<String>) -> EngineEvent + Send + 'static,
{
    let (stream, _) = connect_async(url)
        .await
        .map_err(|e| ClientError::Transport(format!("{url}: {e}")))?;
    let (sink, mut read) = stream.split();
    let open = Arc::new(AtomicBool::new(true));
    let flag = open.clone();

    let reader = tokio::spawn(async move {
        let reason = loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => {
                    if let Some(event) = decode(text.as_str()) {
                        if events.send(event).is_err() {
                            // engine gone
                            return;
                        }
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    break frame.map(|f| f.reason.to_string()).filter(|r| !r.is_empty());
                }
                Some(Ok(other)) => debug!(kind = ?other, "ignoring non-text frame"),
                Some(Err(err)) => break Some(err.to_string()),
                None => break None,
            }
        };
        flag.store(false, Ordering::SeqCst);
        let _ = events.send(closed(reason));
    });

    Ok(WsSink {
        sink,
        open,
        reader,
    })
}

#[derive(Debug, Clone)]
pub struct WsPrimaryConnector {
    url: String,
}

impl WsPrimaryConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl PrimaryConnector for WsPrimaryConnector {
    async fn open(&self, events: EventSender) -> Result<Box<dyn ChannelSink>, ClientError> {
        let sink = open_ws(
            &self.url,
            events,
            |text| match decode_server_event(text) {
                Ok(event) => Some(EngineEvent::Primary(event)),
                Err(err) => {
                    warn!(error = %err, "dropping primary channel frame");
                    None
                }
            },
            |reason| EngineEvent::PrimaryClosed { reason },
        )
        .await?;
        info!(url = %self.url, "primary channel connected");
        Ok(Box::new(sink))
    }
}

#[derive(Debug, Clone)]
pub struct WsValidationConnector {
    url: String,
}

impl WsValidationConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl ValidationConnector for WsValidationConnector {
    async fn open(
        &self,
        generation: u64,
        events: EventSender,
    ) -> Result<Box<dyn ChannelSink>, ClientError> {
        let sink = open_ws(
            &self.url,
            events,
            move |text| match decode_classification(text) {
                Ok(result) => Some(EngineEvent::Classification { generation, result }),
                Err(err) => {
                    warn!(error = %err, generation, "dropping validation frame");
                    None
                }
            },
            move |reason| EngineEvent::ValidationClosed { generation, reason },
        )
        .await?;
        info!(url = %self.url, generation, "validation channel connected");
        Ok(Box::new(sink))
    }
}
