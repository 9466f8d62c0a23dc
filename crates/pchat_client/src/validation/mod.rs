//! Liveness validation session.
//!
//! At most one session exists. It owns the camera and the validation channel
//! exclusively; both are released on every path out of `Streaming`. Each
//! session gets a fresh generation number, and anything tagged with an older
//! generation (ticks, classifications, close notices) is ignored.

mod capture;
mod device;
mod unlock;

pub use capture::{spawn_capture_loop, SessionGuard};
pub use device::{CaptureDevice, DeviceProvider, FrameDirectory, NoCamera};
pub use unlock::TransientUnlockSet;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use pchat_proto::codec::encode_frame;
use pchat_proto::{Classification, FrameEvent, MessageId};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::event::EventSender;
use crate::link::{ChannelSink, ValidationConnector};
use crate::settings::ValidationSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Opening(MessageId),
    Streaming(MessageId),
    Closed,
}

/// What a capture tick ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Tick from a closed or superseded session.
    Stale,
    /// Camera had no frame ready.
    Skipped,
    Sent,
    /// The channel was found closed; the session has been torn down.
    ChannelLost,
}

struct ActiveSession {
    target: MessageId,
    generation: u64,
    device: Box<dyn CaptureDevice>,
    link: Box<dyn ChannelSink>,
    guard: SessionGuard,
    capture: JoinHandle<()>,
}

impl ActiveSession {
    fn close(mut self) {
        self.capture.abort();
        self.device.release();
        drop(self.link);
        debug!(message_id = %self.target, generation = self.generation, "session resources released");
    }
}

pub struct ValidationSession {
    devices: Arc<dyn DeviceProvider>,
    connector: Arc<dyn ValidationConnector>,
    settings: ValidationSettings,
    events: EventSender,
    current: Arc<AtomicU64>,
    state: SessionState,
    active: Option<ActiveSession>,
    unlocks: TransientUnlockSet,
    status_line: Option<String>,
}

impl ValidationSession {
    pub fn new(
        devices: Arc<dyn DeviceProvider>,
        connector: Arc<dyn ValidationConnector>,
        settings: ValidationSettings,
        events: EventSender,
    ) -> Self {
        Self {
            devices,
            connector,
            settings,
            events,
            current: Arc::new(AtomicU64::new(0)),
            state: SessionState::Idle,
            active: None,
            unlocks: TransientUnlockSet::default(),
            status_line: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The message being validated, only while frames are streaming.
    pub fn active_target(&self) -> Option<&MessageId> {
        match &self.state {
            SessionState::Streaming(target) => Some(target),
            _ => None,
        }
    }

    pub fn unlocks(&self) -> &TransientUnlockSet {
        &self.unlocks
    }

    /// Last classification message, or the reason the session ended.
    pub fn status_line(&self) -> Option<&str> {
        self.status_line.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    /// Open a session validating `target`. Any existing session is fully
    /// closed first. On failure the session ends `Closed` with nothing held.
    pub async fn start(&mut self, target: MessageId) -> Result<(), SessionError> {
        self.stop();

        let generation = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.state = SessionState::Opening(target.clone());
        self.status_line = Some("Opening camera...".into());
        info!(message_id = %target, generation, "validation session opening");

        let (device, link) = tokio::join!(
            self.devices.acquire(),
            self.connector.open(generation, self.events.clone()),
        );

        let device = match device {
            Ok(device) => device,
            Err(err) => {
                drop(link);
                return Err(self.fail_open(&target, generation, err));
            }
        };
        let link = match link {
            Ok(link) => link,
            Err(err) => {
                let mut device = device;
                device.release();
                let err = SessionError::ChannelOpen(err.to_string());
                return Err(self.fail_open(&target, generation, err));
            }
        };

        let guard = SessionGuard::new(self.current.clone(), generation);
        let capture = spawn_capture_loop(
            guard.clone(),
            self.settings.warmup(),
            self.settings.capture_period(),
            self.events.clone(),
        );
        self.active = Some(ActiveSession {
            target: target.clone(),
            generation,
            device,
            link,
            guard,
            capture,
        });
        self.state = SessionState::Streaming(target);
        self.status_line = Some("Validating...".into());
        Ok(())
    }

    fn fail_open(&mut self, target: &MessageId, generation: u64, err: SessionError) -> SessionError {
        warn!(message_id = %target, generation, error = %err, "validation session failed to open");
        self.current.fetch_add(1, Ordering::SeqCst);
        self.state = SessionState::Closed;
        self.unlocks.clear();
        self.status_line = Some(err.to_string());
        err
    }

    /// Close the current session, if any. Returns whether anything was open.
    pub fn stop(&mut self) -> bool {
        let was_open = matches!(
            self.state,
            SessionState::Opening(_) | SessionState::Streaming(_)
        );
        if was_open {
            self.teardown();
            self.status_line = None;
        }
        was_open
    }

    fn teardown(&mut self) {
        self.current.fetch_add(1, Ordering::SeqCst);
        if let Some(active) = self.active.take() {
            info!(message_id = %active.target, generation = active.generation, "validation session closed");
            active.close();
        }
        self.unlocks.clear();
        self.state = SessionState::Closed;
    }

    fn is_current(&self, generation: u64) -> bool {
        generation == self.generation() && self.active.is_some()
    }

    /// Capture one frame and send it, if `generation` is still streaming.
    pub async fn on_tick(&mut self, generation: u64) -> TickOutcome {
        if !self.is_current(generation) {
            return TickOutcome::Stale;
        }
        let Some(active) = self.active.as_mut() else {
            return TickOutcome::Stale;
        };
        active.guard.tick_handled();
        if !active.link.is_open() {
            self.lose_channel(None);
            return TickOutcome::ChannelLost;
        }

        let jpeg = match active.device.capture() {
            Ok(Some(jpeg)) => jpeg,
            Ok(None) => return TickOutcome::Skipped,
            Err(err) => {
                warn!(generation, error = %err, "frame capture failed");
                return TickOutcome::Skipped;
            }
        };
        let frame = FrameEvent::from_jpeg(
            &jpeg,
            active.target.clone(),
            self.settings.face_auth,
            self.settings.require_single,
        );
        let text = match encode_frame(&frame) {
            Ok(text) => text,
            Err(err) => {
                warn!(generation, error = %err, "frame encoding failed");
                return TickOutcome::Skipped;
            }
        };
        match active.link.send_text(text).await {
            Ok(()) => TickOutcome::Sent,
            Err(err) => {
                self.lose_channel(Some(err.to_string()));
                TickOutcome::ChannelLost
            }
        }
    }

    /// Fold a classification into the unlock set. Returns whether it applied.
    pub fn on_classification(&mut self, generation: u64, result: Classification) -> bool {
        if !self.is_current(generation) {
            debug!(generation, "stale classification dropped");
            return false;
        }
        let Some(active) = self.active.as_ref() else {
            return false;
        };
        let id = result
            .message_id
            .clone()
            .unwrap_or_else(|| active.target.clone());
        debug!(message_id = %id, status = result.status.as_str(), "classification");
        self.status_line = Some(result.summary().to_string());
        self.unlocks.apply(id, result.status);
        true
    }

    /// The validation channel for `generation` ended on its own.
    pub fn on_channel_closed(&mut self, generation: u64, reason: Option<String>) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.lose_channel(reason);
        true
    }

    fn lose_channel(&mut self, reason: Option<String>) {
        warn!(reason = reason.as_deref().unwrap_or("closed"), "validation channel lost");
        self.teardown();
        self.status_line = Some(match reason {
            Some(reason) => format!("Validation channel closed: {reason}"),
            None => "Validation channel closed".into(),
        });
    }
}

impl Drop for ValidationSession {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            self.current.fetch_add(1, Ordering::SeqCst);
            active.close();
        }
    }
}
