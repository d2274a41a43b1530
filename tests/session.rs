//! End-to-end capture sessions with a fake microphone and analyzer

use async_trait::async_trait;
use parking_lot::Mutex;
use soundsup::recorder::CaptureBackend;
use soundsup::tickets::EmotionDistribution;
use soundsup::{
    AnalysisResult, Analyzer, AudioUri, CaptureSession, ConcertField, ConcertInfo, PendingStatus,
    Recorder, RecorderError, SoundsUpError, TicketStore, UploadError,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct FakeMicrophone {
    takes: AtomicUsize,
}

#[async_trait]
impl CaptureBackend for FakeMicrophone {
    async fn request_permission(&self) -> Result<bool, RecorderError> {
        Ok(true)
    }

    async fn begin(&self) -> Result<(), RecorderError> {
        Ok(())
    }

    async fn pause(&self) -> Result<(), RecorderError> {
        Ok(())
    }

    async fn resume(&self) -> Result<(), RecorderError> {
        Ok(())
    }

    async fn finish(&self) -> Result<AudioUri, RecorderError> {
        let n = self.takes.fetch_add(1, Ordering::SeqCst);
        Ok(AudioUri::new(format!("file:///tmp/take_{}.m4a", n)))
    }

    async fn abort(&self) -> Result<(), RecorderError> {
        Ok(())
    }
}

/// Replays queued outcomes and records what was uploaded
#[derive(Default)]
struct ScriptedAnalyzer {
    outcomes: Mutex<VecDeque<Result<AnalysisResult, UploadError>>>,
    calls: Mutex<Vec<(AudioUri, ConcertInfo)>>,
}

impl ScriptedAnalyzer {
    fn then(self, outcome: Result<AnalysisResult, UploadError>) -> Self {
        self.outcomes.lock().push_back(outcome);
        self
    }
}

#[async_trait]
impl Analyzer for ScriptedAnalyzer {
    async fn upload(
        &self,
        audio: &AudioUri,
        concert: &ConcertInfo,
    ) -> Result<AnalysisResult, UploadError> {
        self.calls.lock().push((audio.clone(), concert.clone()));
        self.outcomes
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(UploadError::Network("no scripted outcome".into())))
    }
}

struct PanickingAnalyzer;

#[async_trait]
impl Analyzer for PanickingAnalyzer {
    async fn upload(&self, _: &AudioUri, _: &ConcertInfo) -> Result<AnalysisResult, UploadError> {
        panic!("analyzer exploded");
    }
}

fn calm_analysis(id: &str) -> AnalysisResult {
    AnalysisResult {
        analysis_id: Some(id.to_string()),
        emotions: EmotionDistribution::from_weights([("Calm", 60.0), ("Joy", 40.0)]),
        text: Some("A calm evening".into()),
        ..Default::default()
    }
}

fn server_busy() -> UploadError {
    UploadError::Status {
        status: 500,
        message: "server busy".into(),
    }
}

fn session_with(analyzer: Arc<dyn Analyzer>) -> CaptureSession {
    CaptureSession::new(
        Recorder::new(FakeMicrophone::default()),
        analyzer,
        TicketStore::new(),
    )
}

fn adele() -> ConcertInfo {
    ConcertInfo::new("Adele").unwrap()
}

#[tokio::test]
async fn test_record_and_upload_produces_ticket() {
    let analyzer = Arc::new(ScriptedAnalyzer::default().then(Ok(calm_analysis("T1"))));
    let session = session_with(analyzer.clone());
    session.initialize().await.unwrap();
    session.set_concert_info(adele().with_location("O2 Arena"));

    session.start_recording().await.unwrap();
    let ticket = session.stop_and_submit().await.unwrap();

    assert_eq!(ticket.id, "T1");
    assert_eq!(ticket.dominant_emotion.as_deref(), Some("Calm"));
    assert_eq!(ticket.concert_info.location(), Some("O2 Arena"));
    assert_eq!(ticket.audio_uri, Some(AudioUri::new("file:///tmp/take_0.m4a")));

    let store = session.store();
    assert!(store.pending().is_empty());
    assert_eq!(store.tickets().len(), 1);

    let status = session.upload_status();
    assert!(!status.is_uploading());
    assert_eq!(status.last_upload.unwrap().ticket_id, "T1");
    assert!(status.last_error.is_none());

    // Draft is cleared for the next concert
    assert!(session.concert_info().is_none());
    assert_eq!(analyzer.calls.lock().len(), 1);
}

#[tokio::test]
async fn test_recording_requires_concert_info() {
    let session = session_with(Arc::new(ScriptedAnalyzer::default()));
    session.initialize().await.unwrap();

    assert!(matches!(
        session.start_recording().await,
        Err(SoundsUpError::ConcertInfoRequired)
    ));

    session.set_concert_info(adele());
    session.update_concert_field(ConcertField::Artist, "   ");
    assert!(matches!(
        session.start_recording().await,
        Err(SoundsUpError::ConcertInfoRequired)
    ));
    assert!(!session.recorder().is_recording());
}

#[tokio::test]
async fn test_second_start_rejected_first_stop_succeeds() {
    let session = session_with(Arc::new(ScriptedAnalyzer::default()));
    session.initialize().await.unwrap();
    session.set_concert_info(adele());

    session.start_recording().await.unwrap();
    assert!(matches!(
        session.start_recording().await,
        Err(SoundsUpError::Recorder(RecorderError::AlreadyRecording))
    ));

    let uri = session.recorder().stop().await.unwrap();
    assert_eq!(uri, AudioUri::new("file:///tmp/take_0.m4a"));
}

#[tokio::test]
async fn test_failed_upload_stays_pending_and_retries() {
    let analyzer = Arc::new(
        ScriptedAnalyzer::default()
            .then(Err(server_busy()))
            .then(Ok(calm_analysis("T1"))),
    );
    let session = session_with(analyzer.clone());
    session.set_concert_info(adele());

    let err = session
        .submit(AudioUri::new("file:///tmp/set.m4a"))
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "Failed to upload: server busy");

    let pending = session.store().pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].status, PendingStatus::Failed);
    assert_eq!(pending[0].last_error.as_deref(), Some("server busy"));
    assert_eq!(session.upload_status().last_error.as_deref(), Some("server busy"));
    // Draft is kept so the user can try again
    assert!(session.concert_info().is_some());

    let ticket = session.retry(&pending[0].id).await.unwrap();
    assert_eq!(ticket.id, "T1");
    assert!(session.store().pending().is_empty());

    let calls = analyzer.calls.lock();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], calls[1]);
}

#[tokio::test]
async fn test_discard_failed_upload() {
    let session = session_with(Arc::new(ScriptedAnalyzer::default().then(Err(server_busy()))));
    session.set_concert_info(adele());
    assert!(session.submit(AudioUri::new("file:///tmp/set.m4a")).await.is_err());

    let id = session.store().pending()[0].id.clone();
    assert!(session.discard(&id));
    assert!(!session.discard(&id));
    assert!(session.store().pending().is_empty());
    assert!(session.store().tickets().is_empty());
}

#[tokio::test]
async fn test_duplicate_ticket_marks_entry_failed() {
    let session = session_with(Arc::new(
        ScriptedAnalyzer::default()
            .then(Ok(calm_analysis("T1")))
            .then(Ok(calm_analysis("T1"))),
    ));

    session.set_concert_info(adele());
    session.submit(AudioUri::new("file:///tmp/a.m4a")).await.unwrap();

    session.set_concert_info(adele());
    let err = session
        .submit(AudioUri::new("file:///tmp/b.m4a"))
        .await
        .unwrap_err();
    assert!(matches!(err, SoundsUpError::Store(_)));

    let pending = session.store().pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].status, PendingStatus::Failed);
    assert_eq!(session.store().tickets_len(), 1);
}

#[tokio::test]
async fn test_panicking_analyzer_fails_entry() {
    let session = session_with(Arc::new(PanickingAnalyzer));
    session.set_concert_info(adele());

    let err = session
        .submit(AudioUri::new("file:///tmp/a.m4a"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SoundsUpError::Upload(UploadError::Unexpected(_))
    ));
    assert_eq!(session.store().pending()[0].status, PendingStatus::Failed);
    assert!(!session.upload_status().is_uploading());
}
