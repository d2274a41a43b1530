//! Upload of recordings to the remote analysis service

pub mod client;
pub mod response;

pub use client::UploadClient;

use crate::concert::ConcertInfo;
use crate::recorder::AudioUri;
use crate::tickets::{EmotionDistribution, Ticket, TicketImage};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("cannot read audio {uri}: {reason}")]
    AudioUnreadable { uri: String, reason: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("analysis rejected: {0}")]
    Rejected(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("upload aborted unexpectedly: {0}")]
    Unexpected(String),
}

impl UploadError {
    /// The most specific message available, server text when there is one
    pub fn message(&self) -> &str {
        match self {
            UploadError::AudioUnreadable { reason, .. } => reason,
            UploadError::Network(msg) => msg,
            UploadError::Status { message, .. } => message,
            UploadError::Rejected(msg) => msg,
            UploadError::Malformed(msg) => msg,
            UploadError::Unexpected(msg) => msg,
        }
    }
}

/// Normalized analysis returned for one recording
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisResult {
    pub analysis_id: Option<String>,
    pub image: Option<TicketImage>,
    pub text: Option<String>,
    pub emotions: EmotionDistribution,
    pub dominant_emotion: Option<String>,
}

impl AnalysisResult {
    /// Build the completed ticket for this analysis
    pub fn into_ticket(self, concert_info: ConcertInfo, audio_uri: AudioUri) -> Ticket {
        let id = self
            .analysis_id
            .clone()
            .unwrap_or_else(|| format!("ticket_{}", Uuid::new_v4().simple()));

        let mut ticket = Ticket::new(id.clone(), concert_info)
            .with_analysis_id(self.analysis_id.unwrap_or(id))
            .with_emotions(self.emotions)
            .with_audio_uri(audio_uri);

        if let Some(dominant) = self.dominant_emotion {
            ticket = ticket.with_dominant_emotion(dominant);
        }
        if let Some(image) = self.image {
            ticket = ticket.with_image(image);
        }
        if let Some(text) = self.text {
            ticket = ticket.with_text(text);
        }
        ticket
    }
}

/// Something that can turn a recording plus concert info into an analysis
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Perform exactly one upload attempt
    async fn upload(
        &self,
        audio: &AudioUri,
        concert: &ConcertInfo,
    ) -> Result<AnalysisResult, UploadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_ticket_uses_analysis_id() {
        let result = AnalysisResult {
            analysis_id: Some("a-42".into()),
            emotions: EmotionDistribution::from_weights([("Calm", 60.0), ("Joy", 40.0)]),
            text: Some("Soft and warm".into()),
            ..Default::default()
        };
        let concert = ConcertInfo::new("Adele").unwrap();
        let ticket = result.into_ticket(concert, AudioUri::new("file://a.m4a"));

        assert_eq!(ticket.id, "a-42");
        assert_eq!(ticket.analysis_id, "a-42");
        assert_eq!(ticket.dominant_emotion.as_deref(), Some("Calm"));
        assert_eq!(ticket.text.as_deref(), Some("Soft and warm"));
        assert_eq!(ticket.audio_uri, Some(AudioUri::new("file://a.m4a")));
    }

    #[test]
    fn test_into_ticket_generates_id_and_prefers_server_dominant() {
        let result = AnalysisResult {
            emotions: EmotionDistribution::from_weights([("Calm", 60.0), ("Joy", 40.0)]),
            dominant_emotion: Some("Joy".into()),
            ..Default::default()
        };
        let ticket = result.into_ticket(
            ConcertInfo::new("Adele").unwrap(),
            AudioUri::new("file://a.m4a"),
        );

        assert!(ticket.id.starts_with("ticket_"));
        assert_eq!(ticket.analysis_id, ticket.id);
        assert_eq!(ticket.dominant_emotion.as_deref(), Some("Joy"));
    }

    #[test]
    fn test_error_message_is_server_text() {
        let err = UploadError::Status {
            status: 500,
            message: "server busy".into(),
        };
        assert_eq!(err.message(), "server busy");
        assert_eq!(err.to_string(), "server returned 500: server busy");
    }
}
