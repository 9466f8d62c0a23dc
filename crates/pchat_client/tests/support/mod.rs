//! In-memory doubles for the channel, camera and HTTP seams.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pchat_client::api::{Attachment, ChatApi};
use pchat_client::event::{EngineEvent, EventSender};
use pchat_client::link::{ChannelSink, PrimaryConnector, ValidationConnector};
use pchat_client::settings::ClientSettings;
use pchat_client::validation::{CaptureDevice, DeviceProvider};
use pchat_client::{ClientError, SessionError};
use pchat_proto::api::{ToggleStatusRequest, UploadForm, UploadResponse};
use pchat_proto::{Classification, ClassificationStatus, MessageId, MessageRecord, MessageStatus};

/// Resource lifecycle as observed by the doubles, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    DeviceAcquired(usize),
    DeviceReleased(usize),
    ChannelOpened(u64),
    ChannelClosed(u64),
    Frame { generation: u64, text: String },
}

#[derive(Debug, Clone, Default)]
pub struct Log(Arc<Mutex<Vec<Entry>>>);

impl Log {
    pub fn push(&self, entry: Entry) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, entry: &Entry) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }

    /// Message ids of frames sent by `generation`, decoded from the JSON.
    pub fn frames_for(&self, generation: u64) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|e| match e {
                Entry::Frame { generation: g, text } if g == generation => {
                    let v: serde_json::Value = serde_json::from_str(&text).unwrap();
                    Some(v["message_id"].as_str().unwrap().to_string())
                }
                _ => None,
            })
            .collect()
    }
}

// ── Camera ───────────────────────────────────────────────────────────────────

pub struct FakeCamera {
    id: usize,
    log: Log,
    ready: Arc<AtomicBool>,
}

impl CaptureDevice for FakeCamera {
    fn capture(&mut self) -> Result<Option<Vec<u8>>, SessionError> {
        if self.ready.load(Ordering::SeqCst) {
            Ok(Some(vec![0xff, 0xd8, 0xff, 0xd9]))
        } else {
            Ok(None)
        }
    }

    fn release(&mut self) {
        self.log.push(Entry::DeviceReleased(self.id));
    }
}

#[derive(Clone)]
pub struct FakeCameras {
    pub log: Log,
    pub deny: Arc<AtomicBool>,
    pub ready: Arc<AtomicBool>,
    count: Arc<AtomicUsize>,
}

impl FakeCameras {
    pub fn new(log: Log) -> Self {
        Self {
            log,
            deny: Arc::new(AtomicBool::new(false)),
            ready: Arc::new(AtomicBool::new(true)),
            count: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl DeviceProvider for FakeCameras {
    async fn acquire(&self) -> Result<Box<dyn CaptureDevice>, SessionError> {
        if self.deny.load(Ordering::SeqCst) {
            return Err(SessionError::DeviceUnavailable("permission denied".into()));
        }
        let id = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.push(Entry::DeviceAcquired(id));
        Ok(Box::new(FakeCamera {
            id,
            log: self.log.clone(),
            ready: self.ready.clone(),
        }))
    }
}

// ── Validation channel ───────────────────────────────────────────────────────

pub struct FakeValidationSink {
    generation: u64,
    log: Log,
    open: Arc<AtomicBool>,
}

#[async_trait]
impl ChannelSink for FakeValidationSink {
    async fn send_text(&mut self, text: String) -> Result<(), ClientError> {
        if !self.is_open() {
            return Err(ClientError::NotConnected);
        }
        self.log.push(Entry::Frame {
            generation: self.generation,
            text,
        });
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl Drop for FakeValidationSink {
    fn drop(&mut self) {
        self.log.push(Entry::ChannelClosed(self.generation));
    }
}

#[derive(Clone, Default)]
pub struct FakeValidationServer {
    pub log: Log,
    pub refuse: Arc<AtomicBool>,
    channels: Arc<Mutex<HashMap<u64, (EventSender, Arc<AtomicBool>)>>>,
}

impl FakeValidationServer {
    pub fn new(log: Log) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    /// Push a classification down the channel opened for `generation`.
    pub fn classify(&self, generation: u64, id: &str, status: ClassificationStatus) {
        let channels = self.channels.lock().unwrap();
        let (events, _) = channels.get(&generation).expect("no such channel");
        let result = Classification {
            status,
            message_id: Some(MessageId::from(id)),
            message: Some(format!("{} for {id}", status.as_str())),
            persons: Some(1),
            authorized: None,
        };
        events
            .send(EngineEvent::Classification { generation, result })
            .unwrap();
    }

    /// Simulate the server dropping the channel for `generation`.
    pub fn hang_up(&self, generation: u64) {
        let channels = self.channels.lock().unwrap();
        let (events, open) = channels.get(&generation).expect("no such channel");
        open.store(false, Ordering::SeqCst);
        events
            .send(EngineEvent::ValidationClosed {
                generation,
                reason: Some("server closed".into()),
            })
            .unwrap();
    }
}

#[async_trait]
impl ValidationConnector for FakeValidationServer {
    async fn open(
        &self,
        generation: u64,
        events: EventSender,
    ) -> Result<Box<dyn ChannelSink>, ClientError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(ClientError::Transport("connection refused".into()));
        }
        let open = Arc::new(AtomicBool::new(true));
        self.channels
            .lock()
            .unwrap()
            .insert(generation, (events, open.clone()));
        self.log.push(Entry::ChannelOpened(generation));
        Ok(Box::new(FakeValidationSink {
            generation,
            log: self.log.clone(),
            open,
        }))
    }
}

// ── Primary channel ──────────────────────────────────────────────────────────

struct FakePrimarySink {
    sent: Arc<Mutex<Vec<serde_json::Value>>>,
    open: Arc<AtomicBool>,
    broken: Arc<AtomicBool>,
}

#[async_trait]
impl ChannelSink for FakePrimarySink {
    async fn send_text(&mut self, text: String) -> Result<(), ClientError> {
        if !self.is_open() {
            return Err(ClientError::NotConnected);
        }
        if self.broken.load(Ordering::SeqCst) {
            return Err(ClientError::Transport("connection reset".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push(serde_json::from_str(&text).unwrap());
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
pub struct FakeChatServer {
    pub sent: Arc<Mutex<Vec<serde_json::Value>>>,
    events: Arc<Mutex<Option<EventSender>>>,
    open: Arc<AtomicBool>,
    broken: Arc<AtomicBool>,
}

impl FakeChatServer {
    /// Later writes fail while the link still reports open.
    pub fn break_writes(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<serde_json::Value> {
        self.sent.lock().unwrap().clone()
    }

    pub fn push(&self, event: pchat_proto::ServerEvent) {
        let events = self.events.lock().unwrap();
        events
            .as_ref()
            .expect("not connected")
            .send(EngineEvent::Primary(event))
            .unwrap();
    }

    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        let events = self.events.lock().unwrap();
        events
            .as_ref()
            .expect("not connected")
            .send(EngineEvent::PrimaryClosed { reason: None })
            .unwrap();
    }
}

#[async_trait]
impl PrimaryConnector for FakeChatServer {
    async fn open(&self, events: EventSender) -> Result<Box<dyn ChannelSink>, ClientError> {
        *self.events.lock().unwrap() = Some(events);
        self.open.store(true, Ordering::SeqCst);
        Ok(Box::new(FakePrimarySink {
            sent: self.sent.clone(),
            open: self.open.clone(),
            broken: self.broken.clone(),
        }))
    }
}

// ── HTTP ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct FakeApi {
    pub history: Arc<Mutex<Vec<MessageRecord>>>,
    pub users: Arc<Mutex<Vec<String>>>,
    pub toggles: Arc<Mutex<Vec<ToggleStatusRequest>>>,
    pub uploads: Arc<Mutex<Vec<(UploadForm, Vec<u8>)>>>,
    pub files: Arc<Mutex<HashMap<String, Attachment>>>,
}

#[async_trait]
impl ChatApi for FakeApi {
    async fn fetch_history(&self, _viewer: &str) -> Result<Vec<MessageRecord>, ClientError> {
        Ok(self.history.lock().unwrap().clone())
    }

    async fn fetch_users(&self) -> Result<Vec<String>, ClientError> {
        Ok(self.users.lock().unwrap().clone())
    }

    async fn upload(&self, form: UploadForm, file: Vec<u8>) -> Result<UploadResponse, ClientError> {
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push((form, file));
        Ok(UploadResponse {
            message_id: MessageId::new(format!("up-{}", uploads.len())),
            file_id: format!("file-{}", uploads.len()),
        })
    }

    async fn toggle_status(&self, request: &ToggleStatusRequest) -> Result<bool, ClientError> {
        self.toggles.lock().unwrap().push(request.clone());
        Ok(true)
    }

    async fn fetch_attachment(
        &self,
        file_id: &str,
        _viewer: &str,
    ) -> Result<Attachment, ClientError> {
        self.files
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .ok_or_else(|| ClientError::UnknownMessage(file_id.to_string()))
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

/// Settings whose capture timer never fires during a test; tests drive ticks
/// by hand.
pub fn manual_tick_settings() -> ClientSettings {
    let mut settings = ClientSettings::default();
    settings.validation.warmup_ms = 3_600_000;
    settings
}

pub fn record(id: &str, sender: &str, text: &str) -> MessageRecord {
    MessageRecord {
        id: MessageId::from(id),
        sender: sender.into(),
        receiver: None,
        text: Some(text.into()),
        file_id: None,
        filename: None,
        content_type: None,
        private: false,
        status: MessageStatus::Valid,
        timestamp: None,
        client_ref: None,
    }
}

pub fn private_record(id: &str, sender: &str, receiver: &str, text: &str) -> MessageRecord {
    MessageRecord {
        receiver: Some(receiver.into()),
        private: true,
        status: MessageStatus::Invalid,
        ..record(id, sender, text)
    }
}
