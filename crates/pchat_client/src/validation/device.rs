//! Camera access behind a trait, so sessions can run against a real device,
//! a directory of recorded frames, or a test double.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::SessionError;

/// An acquired camera. Exclusive to one session at a time.
pub trait CaptureDevice: Send {
    /// Grab one JPEG frame. `Ok(None)` means no frame is ready yet; the tick
    /// is skipped and capture continues.
    fn capture(&mut self) -> Result<Option<Vec<u8>>, SessionError>;

    /// Give the device back. Called exactly once when the session closes.
    fn release(&mut self);
}

#[async_trait]
pub trait DeviceProvider: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn CaptureDevice>, SessionError>;
}

/// Replays `*.jpg` / `*.jpeg` files from a directory, in name order, looping.
#[derive(Debug, Clone)]
pub struct FrameDirectory {
    dir: PathBuf,
}

impl FrameDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
        .unwrap_or(false)
}

#[async_trait]
impl DeviceProvider for FrameDirectory {
    async fn acquire(&self) -> Result<Box<dyn CaptureDevice>, SessionError> {
        let unavailable = |e: std::io::Error| {
            SessionError::DeviceUnavailable(format!("{}: {e}", self.dir.display()))
        };
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(unavailable)?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(unavailable)? {
            let path = entry.path();
            if is_jpeg(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut frames = Vec::with_capacity(paths.len());
        for path in &paths {
            frames.push(tokio::fs::read(path).await.map_err(unavailable)?);
        }
        if frames.is_empty() {
            return Err(SessionError::DeviceUnavailable(format!(
                "no JPEG frames in {}",
                self.dir.display()
            )));
        }
        info!(dir = %self.dir.display(), frames = frames.len(), "camera acquired");
        Ok(Box::new(DirectoryCamera {
            frames,
            next: 0,
            released: false,
        }))
    }
}

struct DirectoryCamera {
    frames: Vec<Vec<u8>>,
    next: usize,
    released: bool,
}

impl CaptureDevice for DirectoryCamera {
    fn capture(&mut self) -> Result<Option<Vec<u8>>, SessionError> {
        if self.released {
            return Err(SessionError::Capture("device already released".into()));
        }
        let frame = self.frames[self.next].clone();
        self.next = (self.next + 1) % self.frames.len();
        Ok(Some(frame))
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            debug!("camera released");
        }
    }
}

/// Provider for hosts without a camera.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCamera;

#[async_trait]
impl DeviceProvider for NoCamera {
    async fn acquire(&self) -> Result<Box<dyn CaptureDevice>, SessionError> {
        Err(SessionError::DeviceUnavailable(
            "no camera configured".into(),
        ))
    }
}
