//! Capture session: the record → pending → upload → ticket flow
//!
//! The session holds the concert draft, drives the recorder, and turns the
//! uploader's outcome into ticket store transitions. Upload failures of any
//! kind end in `fail`, so a known failure never leaves an entry processing.

use crate::concert::{ConcertDraft, ConcertField, ConcertInfo};
use crate::recorder::{AudioUri, Recorder};
use crate::tickets::{PendingId, StoreError, Ticket, TicketStore};
use crate::upload::{Analyzer, UploadError};
use crate::{Result, SoundsUpError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Outcome of the most recent successful upload
#[derive(Debug, Clone, PartialEq)]
pub struct UploadSummary {
    pub ticket_id: String,
    pub concert_info: ConcertInfo,
    pub uploaded_at: DateTime<Utc>,
}

/// Aggregate upload progress for status displays
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadStatus {
    /// Number of uploads currently running
    pub in_flight: usize,
    pub last_upload: Option<UploadSummary>,
    pub last_error: Option<String>,
}

impl UploadStatus {
    pub fn is_uploading(&self) -> bool {
        self.in_flight > 0
    }

    fn begin(&mut self) {
        self.in_flight += 1;
        self.last_error = None;
    }

    fn succeed(&mut self, summary: UploadSummary) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.last_upload = Some(summary);
        self.last_error = None;
    }

    fn fail(&mut self, message: String) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.last_error = Some(message);
    }
}

pub struct CaptureSession {
    recorder: Arc<Recorder>,
    analyzer: Arc<dyn Analyzer>,
    store: TicketStore,
    draft: Mutex<ConcertDraft>,
    uploads: Mutex<UploadStatus>,
}

impl CaptureSession {
    pub fn new(recorder: Recorder, analyzer: Arc<dyn Analyzer>, store: TicketStore) -> Self {
        Self {
            recorder: Arc::new(recorder),
            analyzer,
            store,
            draft: Mutex::new(ConcertDraft::new()),
            uploads: Mutex::new(UploadStatus::default()),
        }
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn store(&self) -> &TicketStore {
        &self.store
    }

    pub async fn initialize(&self) -> Result<()> {
        self.recorder.initialize().await?;
        Ok(())
    }

    // === Concert draft ===

    pub fn set_concert_info(&self, info: ConcertInfo) {
        self.draft.lock().set(info);
    }

    pub fn update_concert_field(&self, field: ConcertField, value: impl Into<String>) {
        self.draft.lock().update_field(field, value);
    }

    pub fn clear_concert_info(&self) {
        self.draft.lock().clear();
    }

    pub fn concert_info(&self) -> Option<ConcertInfo> {
        self.draft.lock().info().cloned()
    }

    // === Upload status ===

    pub fn upload_status(&self) -> UploadStatus {
        self.uploads.lock().clone()
    }

    pub fn clear_upload_error(&self) {
        self.uploads.lock().last_error = None;
    }

    pub fn clear_last_upload(&self) {
        self.uploads.lock().last_upload = None;
    }

    // === Flow ===

    /// Start capturing. Concert info must be configured first.
    pub async fn start_recording(&self) -> Result<()> {
        if !self.draft.lock().is_configured() {
            return Err(SoundsUpError::ConcertInfoRequired);
        }
        self.recorder.start().await?;
        Ok(())
    }

    /// Stop capturing and submit the recording for analysis
    pub async fn stop_and_submit(&self) -> Result<Ticket> {
        let audio = self.recorder.stop().await?;
        self.submit(audio).await
    }

    /// Submit an existing recording with the current concert info
    pub async fn submit(&self, audio: AudioUri) -> Result<Ticket> {
        let concert = self
            .concert_info()
            .ok_or(SoundsUpError::ConcertInfoRequired)?;

        let id = self.store.create_pending(concert.clone(), audio.clone());
        let ticket = self.run_upload(&id, concert.clone(), audio).await?;

        // Ready for the next recording, unless the user already moved on
        let mut draft = self.draft.lock();
        if draft.info() == Some(&concert) {
            draft.clear();
        }
        Ok(ticket)
    }

    /// Upload a failed entry again with its original recording and info
    pub async fn retry(&self, id: &PendingId) -> Result<Ticket> {
        let pending = self
            .store
            .pending_ticket(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        self.store.requeue(id)?;

        info!("Retrying upload for {}", id);
        self.run_upload(id, pending.concert_info, pending.audio_uri)
            .await
    }

    /// Drop a pending entry, typically a failed one the user gave up on
    pub fn discard(&self, id: &PendingId) -> bool {
        self.store.remove(id)
    }

    async fn run_upload(
        &self,
        id: &PendingId,
        concert: ConcertInfo,
        audio: AudioUri,
    ) -> Result<Ticket> {
        self.store.mark_processing(id)?;
        self.uploads.lock().begin();

        let analyzer = Arc::clone(&self.analyzer);
        let (task_audio, task_concert) = (audio.clone(), concert.clone());
        // A panicking analyzer surfaces as a join error and is handled like any upload failure
        let outcome = tokio::spawn(async move { analyzer.upload(&task_audio, &task_concert).await })
            .await
            .unwrap_or_else(|e| Err(UploadError::Unexpected(e.to_string())));

        let analysis = match outcome {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!("Upload for {} failed: {}", id, e);
                self.record_failure(id, e.message().to_string());
                return Err(e.into());
            }
        };

        let ticket = analysis.into_ticket(concert.clone(), audio);
        if let Err(e) = self.store.complete(id, ticket.clone()) {
            error!("Could not complete {}: {}", id, e);
            self.record_failure(id, e.to_string());
            return Err(e.into());
        }

        self.uploads.lock().succeed(UploadSummary {
            ticket_id: ticket.id.clone(),
            concert_info: concert,
            uploaded_at: Utc::now(),
        });
        Ok(ticket)
    }

    fn record_failure(&self, id: &PendingId, message: String) {
        if let Err(e) = self.store.fail(id, message.clone()) {
            error!("Could not mark {} as failed: {}", id, e);
        }
        self.uploads.lock().fail(message);
    }
}
