//! Application configuration
//!
//! Loaded from TOML. Every field has a default, so an absent file or a
//! partial one is fine. `SOUNDSUP_API_URL` overrides the service base URL.

use crate::preferences::UserPreferences;
use crate::{Result, SoundsUpError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const CONFIG_ENV: &str = "SOUNDSUP_CONFIG";
pub const API_URL_ENV: &str = "SOUNDSUP_API_URL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the analysis service
    pub base_url: String,
    /// Path of the analysis endpoint, appended to the base URL
    pub analyze_path: String,
    /// Transport timeout; none by default
    pub timeout_secs: Option<u64>,
    /// MIME type sent with the audio part
    pub audio_mime: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            analyze_path: "/analyze_concert".to_string(),
            timeout_secs: None,
            audio_mime: "audio/m4a".to_string(),
        }
    }
}

impl ApiConfig {
    pub fn analyze_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.analyze_path)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Directory new recordings are written to
    pub output_dir: PathBuf,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            output_dir: data_dir().join("recordings"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub audio_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let cache = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            audio_dir: data_dir().join("audio"),
            cache_dir: cache.join("soundsup").join("temp"),
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("soundsup")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub recorder: RecorderConfig,
    pub storage: StorageConfig,
    pub preferences: UserPreferences,
}

impl AppConfig {
    /// Load from `$SOUNDSUP_CONFIG`, then the user config dir, then defaults
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(path)?,
                None => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        if let Ok(url) = std::env::var(API_URL_ENV) {
            config.api.base_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SoundsUpError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SoundsUpError::ConfigError(e.to_string()))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.api.timeout_secs = Some(timeout.as_secs());
        self
    }

    pub fn with_recordings_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.recorder.output_dir = dir.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        let api = &self.api;
        if !(api.base_url.starts_with("http://") || api.base_url.starts_with("https://")) {
            return Err(SoundsUpError::ConfigError(format!(
                "api.base_url must be an http(s) URL: {}",
                api.base_url
            )));
        }
        if !api.analyze_path.starts_with('/') {
            return Err(SoundsUpError::ConfigError(
                "api.analyze_path must start with '/'".to_string(),
            ));
        }
        if api.timeout_secs == Some(0) {
            return Err(SoundsUpError::ConfigError(
                "api.timeout_secs must be positive".to_string(),
            ));
        }
        let valid_mime = api
            .audio_mime
            .split_once('/')
            .map(|(kind, sub)| !kind.is_empty() && !sub.is_empty())
            .unwrap_or(false);
        if !valid_mime {
            return Err(SoundsUpError::ConfigError(format!(
                "api.audio_mime is not a MIME type: {}",
                api.audio_mime
            )));
        }
        Ok(())
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("soundsup").join("config.toml"))
}
