//! The single-owner chat engine.
//!
//! One value owns the message store, presence, the primary connection and the
//! validation session. Channel pushes, capture ticks and user intents are
//! applied one at a time from a single loop, so none of that state is shared.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use pchat_proto::api::UploadForm;
use pchat_proto::{ClientEvent, MessageId, MessageRecord, MessageStatus, OutgoingMessage};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{ApiClient, ChatApi};
use crate::connection::ConnectionManager;
use crate::error::ClientError;
use crate::event::{event_queue, EngineEvent, EventReceiver, EventSender};
use crate::link::{PrimaryConnector, ValidationConnector};
use crate::presence::PresenceSet;
use crate::reconcile::{self, ChatState};
use crate::settings::ClientSettings;
use crate::store::{MessageStore, PENDING_PREFIX};
use crate::toggle::toggle_request;
use crate::validation::{DeviceProvider, TickOutcome, ValidationSession};
use crate::visibility::{self, Visibility};
use crate::ws::{WsPrimaryConnector, WsValidationConnector};

/// Something the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Post a text message. A private message with no receiver goes to the
    /// only other user present, if there is exactly one.
    Say {
        text: String,
        private: bool,
        receiver: Option<String>,
    },
    Upload {
        path: PathBuf,
        caption: String,
        private: bool,
        receiver: Option<String>,
    },
    Toggle(MessageId),
    /// Start validating a private message addressed to us.
    View(MessageId),
    StopView,
    Fetch { file_id: String, out: PathBuf },
    RefreshUsers,
    /// Re-render without changing anything.
    Show,
    Quit,
}

/// What the presenter should be told after a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// State changed; re-render.
    Changed,
    Info(String),
    Failure(String),
    /// The chat channel is gone and will not come back on its own.
    Disconnected(Option<String>),
}

/// Rendering front-end. Kept synchronous; it only reads engine state.
pub trait Presenter {
    fn refresh(&mut self, engine: &ChatEngine);
    fn notice(&mut self, notice: &Notice);
}

/// One store entry as the local identity should see it right now.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage<'a> {
    pub record: &'a MessageRecord,
    pub visibility: Visibility,
    pub own: bool,
    pub addressed_to_me: bool,
    pub can_toggle: bool,
    pub can_validate: bool,
    pub being_validated: bool,
    pub pending: bool,
}

/// Collaborators the engine is built from.
pub struct EngineParts {
    pub primary: Arc<dyn PrimaryConnector>,
    pub validation: Arc<dyn ValidationConnector>,
    pub devices: Arc<dyn DeviceProvider>,
    pub api: Arc<dyn ChatApi>,
}

pub struct ChatEngine {
    identity: String,
    settings: ClientSettings,
    state: ChatState,
    connection: ConnectionManager,
    session: ValidationSession,
    api: Arc<dyn ChatApi>,
    events_tx: EventSender,
    events: EventReceiver,
}

enum Step {
    Event(Option<EngineEvent>),
    Intent(Option<Intent>),
}

impl ChatEngine {
    pub fn new(identity: impl Into<String>, settings: ClientSettings, parts: EngineParts) -> Self {
        let (events_tx, events) = event_queue();
        let session = ValidationSession::new(
            parts.devices,
            parts.validation,
            settings.validation.clone(),
            events_tx.clone(),
        );
        Self {
            identity: identity.into(),
            settings,
            state: ChatState::default(),
            connection: ConnectionManager::new(parts.primary),
            session,
            api: parts.api,
            events_tx,
            events,
        }
    }

    /// Engine wired to the real WebSocket and HTTP endpoints from `settings`.
    pub fn with_defaults(
        identity: impl Into<String>,
        settings: ClientSettings,
        devices: Arc<dyn DeviceProvider>,
    ) -> Result<Self, ClientError> {
        settings.validate()?;
        let parts = EngineParts {
            primary: Arc::new(WsPrimaryConnector::new(&settings.endpoints.ws_url)),
            validation: Arc::new(WsValidationConnector::new(&settings.endpoints.video_ws_url)),
            devices,
            api: Arc::new(ApiClient::new(settings.api_base())?),
        };
        Ok(Self::new(identity, settings, parts))
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn store(&self) -> &MessageStore {
        &self.state.store
    }

    pub fn presence(&self) -> &PresenceSet {
        &self.state.presence
    }

    pub fn session(&self) -> &ValidationSession {
        &self.session
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Next already-queued event, without waiting.
    pub fn try_next_event(&mut self) -> Option<EngineEvent> {
        self.events.try_recv().ok()
    }

    /// Open the chat channel, register, then load history and presence.
    /// History and presence failures are logged and leave the view empty.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        self.connection
            .connect(&self.identity, self.events_tx.clone())
            .await?;

        match self.api.fetch_history(&self.identity).await {
            Ok(records) => {
                info!(count = records.len(), "history loaded");
                self.state.store.replace_all(records);
            }
            Err(err) => warn!(error = %err, "history fetch failed"),
        }
        if let Err(err) = self.refresh_users().await {
            warn!(error = %err, "user list fetch failed");
        }
        Ok(())
    }

    /// Apply one queued event.
    pub async fn handle_event(&mut self, event: EngineEvent) -> Option<Notice> {
        match event {
            EngineEvent::Primary(push) => {
                let kind = push.kind();
                let applied = reconcile::apply(&mut self.state, push);
                debug!(kind, ?applied, "push applied");
                applied.changed().then_some(Notice::Changed)
            }
            EngineEvent::PrimaryClosed { reason } => {
                self.connection.on_closed(reason.as_deref());
                Some(Notice::Disconnected(reason))
            }
            EngineEvent::Classification { generation, result } => self
                .session
                .on_classification(generation, result)
                .then_some(Notice::Changed),
            EngineEvent::ValidationClosed { generation, reason } => {
                if self.session.on_channel_closed(generation, reason) {
                    let line = self.session.status_line().unwrap_or("Validation ended");
                    Some(Notice::Failure(line.to_string()))
                } else {
                    None
                }
            }
            EngineEvent::CaptureTick { generation } => {
                match self.session.on_tick(generation).await {
                    TickOutcome::ChannelLost => {
                        let line = self.session.status_line().unwrap_or("Validation ended");
                        Some(Notice::Failure(line.to_string()))
                    }
                    TickOutcome::Stale | TickOutcome::Skipped | TickOutcome::Sent => None,
                }
            }
        }
    }

    /// Apply one user intent.
    pub async fn handle_intent(&mut self, intent: Intent) -> Result<Option<Notice>, ClientError> {
        match intent {
            Intent::Say {
                text,
                private,
                receiver,
            } => self.send_text(&text, private, receiver).await.map(|_| None),
            Intent::Upload {
                path,
                caption,
                private,
                receiver,
            } => {
                let id = self.upload(&path, &caption, private, receiver).await?;
                Ok(Some(Notice::Info(format!("uploaded as {id}"))))
            }
            Intent::Toggle(id) => {
                self.toggle(&id).await?;
                Ok(Some(Notice::Info(format!("status change requested for {id}"))))
            }
            Intent::View(id) => {
                self.start_validation(&id).await?;
                Ok(Some(Notice::Changed))
            }
            Intent::StopView => Ok(self.stop_validation().then_some(Notice::Changed)),
            Intent::Fetch { file_id, out } => {
                let written = self.fetch_attachment(&file_id, &out).await?;
                Ok(Some(Notice::Info(format!(
                    "saved {written} bytes to {}",
                    out.display()
                ))))
            }
            Intent::RefreshUsers => {
                self.refresh_users().await?;
                Ok(Some(Notice::Changed))
            }
            Intent::Show => Ok(Some(Notice::Changed)),
            Intent::Quit => Ok(None),
        }
    }

    /// Post a text message. The record appears once the server pushes it
    /// back, or immediately as a pending entry when optimistic echo is on.
    pub async fn send_text(
        &mut self,
        text: &str,
        private: bool,
        receiver: Option<String>,
    ) -> Result<(), ClientError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ClientError::InvalidInput("message text is empty".into()));
        }
        let receiver = self.resolve_receiver(private, receiver)?;
        let client_ref = self
            .settings
            .optimistic_echo
            .then(|| Uuid::new_v4().to_string());

        let outgoing = OutgoingMessage {
            sender: self.identity.clone(),
            text: text.to_string(),
            private,
            receiver: receiver.clone(),
            status: MessageStatus::initial_for(private),
            client_ref: client_ref.clone(),
        };
        self.connection
            .send(&ClientEvent::Message(outgoing.clone()))
            .await?;

        if let Some(token) = client_ref {
            self.state.store.append_pending(MessageRecord {
                id: MessageId::new(format!("{PENDING_PREFIX}{token}")),
                sender: outgoing.sender,
                receiver,
                text: Some(outgoing.text),
                file_id: None,
                filename: None,
                content_type: None,
                private,
                status: outgoing.status,
                timestamp: Some(Utc::now()),
                client_ref: Some(token),
            });
        }
        Ok(())
    }

    fn resolve_receiver(
        &self,
        private: bool,
        receiver: Option<String>,
    ) -> Result<Option<String>, ClientError> {
        if !private {
            return Ok(None);
        }
        let receiver = receiver
            .filter(|r| !r.trim().is_empty())
            .or_else(|| {
                self.state
                    .presence
                    .sole_receiver(&self.identity)
                    .map(str::to_string)
            })
            .ok_or_else(|| ClientError::InvalidInput("private message needs a receiver".into()))?;
        if receiver == self.identity {
            return Err(ClientError::InvalidInput(
                "cannot send a private message to yourself".into(),
            ));
        }
        Ok(Some(receiver))
    }

    /// Upload a file as an attachment message. Returns the new message id.
    pub async fn upload(
        &mut self,
        path: &Path,
        caption: &str,
        private: bool,
        receiver: Option<String>,
    ) -> Result<MessageId, ClientError> {
        let receiver = self.resolve_receiver(private, receiver)?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ClientError::InvalidInput(format!("not a file: {}", path.display())))?
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string();

        let form = UploadForm {
            sender: self.identity.clone(),
            text: caption.trim().to_string(),
            private,
            receiver,
            status: MessageStatus::initial_for(private),
            filename,
            content_type,
        };
        let stored = self.api.upload(form, bytes).await?;
        info!(message_id = %stored.message_id, "attachment uploaded");
        Ok(stored.message_id)
    }

    /// Ask the server to flip the persisted status of `id`. Nothing changes
    /// locally until the status push arrives.
    pub async fn toggle(&mut self, id: &MessageId) -> Result<(), ClientError> {
        let record = self
            .state
            .store
            .get(id)
            .ok_or_else(|| ClientError::UnknownMessage(id.to_string()))?;
        let request = toggle_request(record, &self.identity)?;
        if !self.api.toggle_status(&request).await? {
            return Err(ClientError::Request {
                status: 200,
                detail: format!("server declined toggle of {id}"),
            });
        }
        Ok(())
    }

    /// Start a validation session for a private message addressed to us.
    pub async fn start_validation(&mut self, id: &MessageId) -> Result<(), ClientError> {
        let record = self
            .state
            .store
            .get(id)
            .ok_or_else(|| ClientError::UnknownMessage(id.to_string()))?;
        if !record.is_private_to(&self.identity) {
            return Err(ClientError::NotPermitted {
                viewer: self.identity.clone(),
                message_id: id.to_string(),
            });
        }
        self.session.start(id.clone()).await?;
        Ok(())
    }

    pub fn stop_validation(&mut self) -> bool {
        self.session.stop()
    }

    /// Download an attachment as the local identity and write it to `out`.
    pub async fn fetch_attachment(&self, file_id: &str, out: &Path) -> Result<usize, ClientError> {
        let attachment = self.api.fetch_attachment(file_id, &self.identity).await?;
        tokio::fs::write(out, &attachment.bytes).await?;
        debug!(file_id, content_type = %attachment.content_type, "attachment saved");
        Ok(attachment.bytes.len())
    }

    pub async fn refresh_users(&mut self) -> Result<(), ClientError> {
        let users = self.api.fetch_users().await?;
        self.state.presence.replace(users);
        Ok(())
    }

    pub fn visibility_of(&self, record: &MessageRecord) -> Visibility {
        visibility::decide(
            record,
            &self.identity,
            self.session.active_target(),
            self.session.unlocks(),
        )
    }

    /// The store in render order, each entry judged for the local identity.
    pub fn rendered(&self) -> Vec<RenderedMessage<'_>> {
        let me = self.identity.as_str();
        let target = self.session.active_target();
        self.state
            .store
            .iter()
            .map(|record| {
                let pending = record.id.as_str().starts_with(PENDING_PREFIX);
                let own = record.is_from(me);
                let addressed_to_me = record.receiver.as_deref() == Some(me);
                let being_validated = target == Some(&record.id);
                RenderedMessage {
                    record,
                    visibility: self.visibility_of(record),
                    own,
                    addressed_to_me,
                    can_toggle: !pending && (own || record.is_private_to(me)),
                    can_validate: !pending && record.is_private_to(me) && !being_validated,
                    being_validated,
                    pending,
                }
            })
            .collect()
    }

    /// Drive the engine until `intents` closes or a `Quit` arrives.
    pub async fn run<P: Presenter>(
        &mut self,
        mut intents: mpsc::Receiver<Intent>,
        presenter: &mut P,
    ) {
        presenter.refresh(self);
        loop {
            // Channel events go first so a render never lags a queued push.
            let step = tokio::select! {
                biased;
                event = self.events.recv() => Step::Event(event),
                intent = intents.recv() => Step::Intent(intent),
            };
            let notice = match step {
                Step::Event(Some(event)) => self.handle_event(event).await,
                // we hold a sender, so the queue cannot close
                Step::Event(None) => None,
                Step::Intent(None) | Step::Intent(Some(Intent::Quit)) => break,
                Step::Intent(Some(intent)) => match self.handle_intent(intent).await {
                    Ok(notice) => notice,
                    Err(err) => {
                        warn!(error = %err, "intent failed");
                        Some(Notice::Failure(err.to_string()))
                    }
                },
            };
            match notice {
                Some(Notice::Changed) => presenter.refresh(self),
                Some(notice) => {
                    presenter.notice(&notice);
                    presenter.refresh(self);
                }
                None => {}
            }
        }
        self.shutdown();
    }

    /// Close the validation session and the chat channel.
    pub fn shutdown(&mut self) {
        self.session.stop();
        self.connection.disconnect();
    }
}
