//! Single-slot audio recorder
//!
//! `Recorder` enforces that at most one capture is active at a time and
//! publishes a `RecorderEvent` on every state change. The actual device work
//! is delegated to a `CaptureBackend`.

#[cfg(feature = "audio-io")]
pub mod cpal_backend;
pub mod wav;

#[cfg(feature = "audio-io")]
pub use cpal_backend::CpalBackend;

use crate::utils::channels::{Broadcaster, Subscription, SubscriptionId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Reference to a recorded audio artifact. Opaque to everything but the uploader.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioUri(String);

impl AudioUri {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self(format!("file://{}", path.as_ref().display()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Local filesystem path for `file://` URIs and bare paths
    pub fn to_path(&self) -> Option<PathBuf> {
        if let Some(path) = self.0.strip_prefix("file://") {
            return Some(PathBuf::from(path));
        }
        if self.0.contains("://") || self.0.is_empty() {
            return None;
        }
        Some(PathBuf::from(&self.0))
    }
}

impl fmt::Display for AudioUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecorderError {
    #[error("recording permission denied")]
    PermissionDenied,

    #[error("a recording is already in progress")]
    AlreadyRecording,

    #[error("no recording in progress")]
    NoActiveRecording,

    #[error("recorder has not been initialized")]
    NotInitialized,

    #[error("audio device error: {0}")]
    Device(String),

    #[error("recording IO error: {0}")]
    Io(String),
}

impl RecorderError {
    pub fn is_recoverable(&self) -> bool {
        match self {
            RecorderError::PermissionDenied => false,
            // Caller misuse; the recorder itself is fine
            RecorderError::AlreadyRecording => true,
            RecorderError::NoActiveRecording => true,
            RecorderError::NotInitialized => true,
            RecorderError::Device(_) => false,
            RecorderError::Io(_) => false,
        }
    }
}

impl From<std::io::Error> for RecorderError {
    fn from(e: std::io::Error) -> Self {
        RecorderError::Io(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecorderEvent {
    Initialized,
    Started { at: DateTime<Utc> },
    Paused,
    Resumed,
    Stopped { uri: AudioUri, duration: Duration },
    Cancelled,
}

/// Snapshot of the recorder for status displays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordingStatus {
    pub is_recording: bool,
    pub is_paused: bool,
    pub duration: Duration,
}

/// Platform audio capture
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Ask for recording permission and configure the audio session.
    /// `Ok(false)` means the user declined.
    async fn request_permission(&self) -> Result<bool, RecorderError>;

    async fn begin(&self) -> Result<(), RecorderError>;

    async fn pause(&self) -> Result<(), RecorderError>;

    async fn resume(&self) -> Result<(), RecorderError>;

    /// Finalize the capture and return where the audio was written
    async fn finish(&self) -> Result<AudioUri, RecorderError>;

    /// Stop the capture and discard whatever was recorded
    async fn abort(&self) -> Result<(), RecorderError>;
}

#[derive(Debug, Clone, Copy)]
struct ActiveCapture {
    started: Instant,
    paused_at: Option<Instant>,
    paused_total: Duration,
}

impl ActiveCapture {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            paused_at: None,
            paused_total: Duration::ZERO,
        }
    }

    fn duration(&self) -> Duration {
        let end = self.paused_at.unwrap_or_else(Instant::now);
        end.duration_since(self.started)
            .saturating_sub(self.paused_total)
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Idle,
    /// Reserved while the backend is starting, so a concurrent start is rejected
    Starting,
    Active(ActiveCapture),
    Stopping,
}

#[derive(Debug)]
struct RecorderState {
    initialized: bool,
    slot: Slot,
}

pub struct Recorder {
    backend: Arc<dyn CaptureBackend>,
    state: Mutex<RecorderState>,
    events: Broadcaster<RecorderEvent>,
}

impl Recorder {
    pub fn new(backend: impl CaptureBackend + 'static) -> Self {
        Self::with_backend(Arc::new(backend))
    }

    pub fn with_backend(backend: Arc<dyn CaptureBackend>) -> Self {
        Self {
            backend,
            state: Mutex::new(RecorderState {
                initialized: false,
                slot: Slot::Idle,
            }),
            events: Broadcaster::new(),
        }
    }

    pub fn subscribe(&self) -> Subscription<RecorderEvent> {
        self.events.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.events.unsubscribe(id);
    }

    /// Request permission and configure the audio session
    pub async fn initialize(&self) -> Result<(), RecorderError> {
        if !self.backend.request_permission().await? {
            warn!("Recording permission denied");
            return Err(RecorderError::PermissionDenied);
        }

        self.state.lock().initialized = true;
        info!("Recorder initialized");
        self.events.emit(RecorderEvent::Initialized);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    pub async fn start(&self) -> Result<(), RecorderError> {
        {
            let mut state = self.state.lock();
            if !state.initialized {
                return Err(RecorderError::NotInitialized);
            }
            match state.slot {
                Slot::Idle => state.slot = Slot::Starting,
                _ => {
                    warn!("Start requested while a recording is active");
                    return Err(RecorderError::AlreadyRecording);
                }
            }
        }

        if let Err(e) = self.backend.begin().await {
            self.state.lock().slot = Slot::Idle;
            return Err(e);
        }

        self.state.lock().slot = Slot::Active(ActiveCapture::new());
        info!("Started recording");
        self.events.emit(RecorderEvent::Started { at: Utc::now() });
        Ok(())
    }

    /// Finish the active capture and return its audio reference
    pub async fn stop(&self) -> Result<AudioUri, RecorderError> {
        let capture = self.take_active()?;

        let result = self.backend.finish().await;
        self.state.lock().slot = Slot::Idle;

        let uri = result?;
        let duration = capture.duration();
        info!("Stopped recording after {:.1}s: {}", duration.as_secs_f32(), uri);
        self.events.emit(RecorderEvent::Stopped {
            uri: uri.clone(),
            duration,
        });
        Ok(uri)
    }

    /// Stop the active capture without keeping the audio
    pub async fn cancel(&self) -> Result<(), RecorderError> {
        self.take_active()?;

        let result = self.backend.abort().await;
        self.state.lock().slot = Slot::Idle;
        result?;

        debug!("Recording cancelled");
        self.events.emit(RecorderEvent::Cancelled);
        Ok(())
    }

    pub async fn pause(&self) -> Result<(), RecorderError> {
        match self.state.lock().slot {
            Slot::Active(capture) if capture.paused_at.is_some() => return Ok(()),
            Slot::Active(_) => {}
            _ => return Err(RecorderError::NoActiveRecording),
        }

        self.backend.pause().await?;

        if let Slot::Active(capture) = &mut self.state.lock().slot {
            capture.paused_at = Some(Instant::now());
        }
        self.events.emit(RecorderEvent::Paused);
        Ok(())
    }

    pub async fn resume(&self) -> Result<(), RecorderError> {
        match self.state.lock().slot {
            Slot::Active(capture) if capture.paused_at.is_none() => return Ok(()),
            Slot::Active(_) => {}
            _ => return Err(RecorderError::NoActiveRecording),
        }

        self.backend.resume().await?;

        if let Slot::Active(capture) = &mut self.state.lock().slot {
            if let Some(paused_at) = capture.paused_at.take() {
                capture.paused_total += paused_at.elapsed();
            }
        }
        self.events.emit(RecorderEvent::Resumed);
        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state.lock().slot, Slot::Active(_))
    }

    pub fn status(&self) -> RecordingStatus {
        match self.state.lock().slot {
            Slot::Active(capture) => RecordingStatus {
                is_recording: true,
                is_paused: capture.paused_at.is_some(),
                duration: capture.duration(),
            },
            _ => RecordingStatus::default(),
        }
    }

    fn take_active(&self) -> Result<ActiveCapture, RecorderError> {
        let mut state = self.state.lock();
        match state.slot {
            Slot::Active(capture) => {
                state.slot = Slot::Stopping;
                Ok(capture)
            }
            _ => Err(RecorderError::NoActiveRecording),
        }
    }
}
