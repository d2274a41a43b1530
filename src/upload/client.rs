//! HTTP client for the analysis service

use crate::concert::ConcertInfo;
use crate::config::ApiConfig;
use crate::recorder::AudioUri;
use crate::upload::response::{failure_message, parse_success};
use crate::upload::{AnalysisResult, Analyzer, UploadError};
use crate::utils::format::recording_file_name;
use crate::{Result, SoundsUpError};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::{debug, info, warn};

/// Text fields sent alongside the audio. Unset values become empty strings.
pub fn form_fields(concert: &ConcertInfo) -> [(&'static str, String); 4] {
    [
        ("concert_time", concert.time().unwrap_or_default().to_string()),
        ("concert_location", concert.location().unwrap_or_default().to_string()),
        ("artist", concert.artist().to_string()),
        ("description", concert.description().unwrap_or_default().to_string()),
    ]
}

#[derive(Clone)]
pub struct UploadClient {
    client: Client,
    config: ApiConfig,
}

impl UploadClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        Part::text("").mime_str(&config.audio_mime).map_err(|e| {
            SoundsUpError::ConfigError(format!(
                "invalid audio MIME type {:?}: {}",
                config.audio_mime, e
            ))
        })?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| SoundsUpError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Whether the service base URL answers with a success status
    pub async fn test_connection(&self) -> bool {
        match self.client.get(&self.config.base_url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!("Connection test failed: {}", e);
                false
            }
        }
    }

    async fn audio_part(&self, audio: &AudioUri) -> std::result::Result<Part, UploadError> {
        let unreadable = |reason: String| UploadError::AudioUnreadable {
            uri: audio.to_string(),
            reason,
        };

        let path = audio
            .to_path()
            .ok_or_else(|| unreadable("not a local file".to_string()))?;
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| unreadable(e.to_string()))?;
        let len = file
            .metadata()
            .await
            .map_err(|e| unreadable(e.to_string()))?
            .len();

        let file_name = recording_file_name(Utc::now());
        debug!("Uploading {} ({} bytes) as {}", path.display(), len, file_name);

        Part::stream_with_length(file, len)
            .file_name(file_name)
            .mime_str(&self.config.audio_mime)
            .map_err(|e| UploadError::Unexpected(format!("invalid audio MIME type: {}", e)))
    }
}

#[async_trait]
impl Analyzer for UploadClient {
    async fn upload(
        &self,
        audio: &AudioUri,
        concert: &ConcertInfo,
    ) -> std::result::Result<AnalysisResult, UploadError> {
        let mut form = Form::new().part("audio_file", self.audio_part(audio).await?);
        for (name, value) in form_fields(concert) {
            form = form.text(name, value);
        }

        let url = self.config.analyze_url();
        info!("Uploading recording for {} to {}", concert.artist(), url);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UploadError::Network(format!("Failed to read response: {}", e)))?;
        debug!("Analysis service answered {}", status);

        if !status.is_success() {
            let message = failure_message(&body)
                .unwrap_or_else(|| format!("Upload failed with status {}", status.as_u16()));
            warn!("Upload failed ({}): {}", status, message);
            return Err(UploadError::Status {
                status: status.as_u16(),
                message,
            });
        }

        parse_success(&body)
    }
}
