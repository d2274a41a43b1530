use crate::concert::ConcertInfo;
use crate::recorder::AudioUri;
use crate::tickets::emotions::EmotionDistribution;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingId(String);

impl PendingId {
    pub fn generate() -> Self {
        Self(format!("pending_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PendingId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PendingId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for PendingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl PendingStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, PendingStatus::Failed)
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, PendingStatus::Pending | PendingStatus::Processing)
    }
}

impl fmt::Display for PendingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingStatus::Pending => write!(f, "pending"),
            PendingStatus::Processing => write!(f, "processing"),
            PendingStatus::Completed => write!(f, "completed"),
            PendingStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A recording submitted for analysis that has not resolved yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTicket {
    pub id: PendingId,
    pub concert_info: ConcertInfo,
    pub audio_uri: AudioUri,
    pub created_at: DateTime<Utc>,
    pub status: PendingStatus,
    /// Failure message while the ticket is failed
    pub last_error: Option<String>,
}

/// Generated artwork, either a plain URI or an inline `data:` URI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketImage(String);

impl TicketImage {
    pub fn uri(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Wrap a bare base64 JPEG payload as a data URI
    pub fn from_base64_jpeg(payload: &str) -> Self {
        Self(format!("data:image/jpeg;base64,{}", payload))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_inline(&self) -> bool {
        self.0.starts_with("data:")
    }

    /// Mime type and raw bytes of an inline image
    ///
    /// Returns `None` for plain URIs and for payloads that are not valid base64.
    pub fn decode(&self) -> Option<(String, Vec<u8>)> {
        let rest = self.0.strip_prefix("data:")?;
        let (mime, payload) = rest.split_once(";base64,")?;
        let bytes = STANDARD.decode(payload).ok()?;
        Some((mime.to_string(), bytes))
    }
}

/// A completed analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub recording_id: String,
    pub analysis_id: String,
    pub title: String,
    pub description: String,
    pub concert_info: ConcertInfo,
    pub emotions: EmotionDistribution,
    pub dominant_emotion: Option<String>,
    pub image: Option<TicketImage>,
    pub text: Option<String>,
    pub audio_uri: Option<AudioUri>,
    pub created_at: DateTime<Utc>,
    pub is_favorite: bool,
    pub status: PendingStatus,
}

impl Ticket {
    pub fn new(id: impl Into<String>, concert_info: ConcertInfo) -> Self {
        let id = id.into();
        Self {
            recording_id: format!("recording_{}", Uuid::new_v4().simple()),
            analysis_id: id.clone(),
            title: concert_info.title(),
            description: concert_info.description().unwrap_or_default().to_string(),
            id,
            concert_info,
            emotions: EmotionDistribution::new(),
            dominant_emotion: None,
            image: None,
            text: None,
            audio_uri: None,
            created_at: Utc::now(),
            is_favorite: false,
            status: PendingStatus::Completed,
        }
    }

    pub fn with_analysis_id(mut self, analysis_id: impl Into<String>) -> Self {
        self.analysis_id = analysis_id.into();
        self
    }

    pub fn with_recording_id(mut self, recording_id: impl Into<String>) -> Self {
        self.recording_id = recording_id.into();
        self
    }

    /// Set the emotions, deriving the dominant one from the weights
    pub fn with_emotions(mut self, emotions: EmotionDistribution) -> Self {
        self.dominant_emotion = emotions.dominant().map(str::to_string);
        self.emotions = emotions;
        self
    }

    pub fn with_dominant_emotion(mut self, emotion: impl Into<String>) -> Self {
        self.dominant_emotion = Some(emotion.into());
        self
    }

    pub fn with_image(mut self, image: TicketImage) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_audio_uri(mut self, audio_uri: AudioUri) -> Self {
        self.audio_uri = Some(audio_uri);
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn favorite(mut self) -> Self {
        self.is_favorite = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_ids_are_unique() {
        let a = PendingId::generate();
        let b = PendingId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("pending_"));
    }

    #[test]
    fn test_inline_image_decodes() {
        let image = TicketImage::from_base64_jpeg("aGVsbG8=");
        assert!(image.is_inline());
        assert_eq!(image.as_str(), "data:image/jpeg;base64,aGVsbG8=");

        let (mime, bytes) = image.decode().unwrap();
        assert_eq!(mime, "image/jpeg");
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn test_plain_uri_image_does_not_decode() {
        let image = TicketImage::uri("https://cdn.example.com/t.jpg");
        assert!(!image.is_inline());
        assert!(image.decode().is_none());
    }

    #[test]
    fn test_ticket_takes_dominant_from_emotions() {
        let info = ConcertInfo::new("Adele").unwrap();
        let ticket = Ticket::new("T1", info)
            .with_emotions(EmotionDistribution::from_weights([("Calm", 60.0), ("Joy", 40.0)]));

        assert_eq!(ticket.dominant_emotion.as_deref(), Some("Calm"));
        assert_eq!(ticket.title, "Adele - Concert");
        assert_eq!(ticket.status, PendingStatus::Completed);
    }
}
