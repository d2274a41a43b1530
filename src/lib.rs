pub mod concert;
pub mod config;
pub mod files;
pub mod preferences;
pub mod recorder;
pub mod session;
pub mod tickets;
pub mod upload;
pub mod utils;

pub use concert::{ConcertDraft, ConcertField, ConcertInfo};
pub use config::AppConfig;
pub use files::FileManager;
pub use recorder::{AudioUri, Recorder, RecorderError, RecorderEvent};
pub use session::{CaptureSession, UploadStatus};
pub use tickets::{PendingId, PendingStatus, PendingTicket, StoreError, Ticket, TicketStore};
pub use upload::{AnalysisResult, Analyzer, UploadClient, UploadError};

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum SoundsUpError {
    #[error("Recorder error: {0}")]
    Recorder(#[from] RecorderError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Ticket store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid concert info: {0}")]
    InvalidConcertInfo(String),

    #[error("Concert info must be configured before recording")]
    ConcertInfoRequired,

    #[error("IO error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for SoundsUpError {
    fn from(e: std::io::Error) -> Self {
        SoundsUpError::IOError(e.to_string())
    }
}

impl SoundsUpError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            SoundsUpError::Recorder(e) => e.is_recoverable(),
            // Failed uploads stay visible and can be retried
            SoundsUpError::Upload(_) => true,
            // Store errors are logic faults, not user conditions
            SoundsUpError::Store(_) => false,
            SoundsUpError::ConfigError(_) => false,
            SoundsUpError::InvalidConcertInfo(_) => true,
            SoundsUpError::ConcertInfoRequired => true,
            SoundsUpError::IOError(_) => false,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            SoundsUpError::Recorder(RecorderError::PermissionDenied) => {
                "Microphone access was denied. Enable it to record concerts.".to_string()
            }
            SoundsUpError::Recorder(_) => {
                "Recording failed. Please check your microphone.".to_string()
            }
            SoundsUpError::Upload(e) => format!("Failed to upload: {}", e.message()),
            SoundsUpError::Store(_) => {
                "Internal ticket error. Please restart the application.".to_string()
            }
            SoundsUpError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
            SoundsUpError::InvalidConcertInfo(msg) => msg.clone(),
            SoundsUpError::ConcertInfoRequired => {
                "Please enter the artist before recording.".to_string()
            }
            SoundsUpError::IOError(_) => "File system error occurred.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SoundsUpError>;
