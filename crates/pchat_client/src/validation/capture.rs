//! The periodic capture task.
//!
//! The task never touches the device or the channel itself. It only posts
//! `CaptureTick`s tagged with the generation it was started for; the engine
//! does the capture and send, and drops ticks whose generation is stale.
//! At most one tick is queued at a time: a period that elapses while the
//! previous tick is still unhandled is skipped.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

use crate::event::{EngineEvent, EventSender};

/// Ties a capture task to the session generation it was started for.
#[derive(Debug, Clone)]
pub struct SessionGuard {
    current: Arc<AtomicU64>,
    generation: u64,
    tick_pending: Arc<AtomicBool>,
}

impl SessionGuard {
    pub fn new(current: Arc<AtomicU64>, generation: u64) -> Self {
        Self {
            current,
            generation,
            tick_pending: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }

    /// Mark a tick as queued. False if one is already waiting.
    pub fn claim_tick(&self) -> bool {
        !self.tick_pending.swap(true, Ordering::SeqCst)
    }

    /// The queued tick was taken off the queue; the next period may post.
    pub fn tick_handled(&self) {
        self.tick_pending.store(false, Ordering::SeqCst);
    }
}

/// Post a tick every `period`, starting after `warmup`, until the guard goes
/// stale or the engine's queue is gone. Periods that pass while a tick is
/// still queued post nothing, so a busy engine never sees a backlog.
pub fn spawn_capture_loop(
    guard: SessionGuard,
    warmup: Duration,
    period: Duration,
    events: EventSender,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + warmup, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if !guard.is_current() {
                break;
            }
            if !guard.claim_tick() {
                continue;
            }
            let tick = EngineEvent::CaptureTick {
                generation: guard.generation(),
            };
            if events.send(tick).is_err() {
                break;
            }
        }
        debug!(generation = guard.generation(), "capture loop stopped");
    })
}
