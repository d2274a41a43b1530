use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioQuality {
    Low,
    Medium,
    #[default]
    High,
}

impl AudioQuality {
    /// Capture sample rate for this quality level
    pub fn sample_rate(&self) -> u32 {
        match self {
            AudioQuality::Low => 16000,
            AudioQuality::Medium => 22050,
            AudioQuality::High => 44100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferences {
    pub notifications: bool,
    pub background_recording: bool,
    pub audio_quality: AudioQuality,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            notifications: true,
            background_recording: true,
            audio_quality: AudioQuality::High,
        }
    }
}

/// Partial update; unset fields keep their current value
#[derive(Debug, Clone, Default)]
pub struct PreferencesUpdate {
    pub notifications: Option<bool>,
    pub background_recording: Option<bool>,
    pub audio_quality: Option<AudioQuality>,
}

impl UserPreferences {
    pub fn apply(&mut self, update: PreferencesUpdate) {
        if let Some(notifications) = update.notifications {
            self.notifications = notifications;
        }
        if let Some(background_recording) = update.background_recording {
            self.background_recording = background_recording;
        }
        if let Some(audio_quality) = update.audio_quality {
            self.audio_quality = audio_quality;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_update() {
        let mut prefs = UserPreferences::default();
        prefs.apply(PreferencesUpdate {
            audio_quality: Some(AudioQuality::Low),
            ..Default::default()
        });

        assert!(prefs.notifications);
        assert!(prefs.background_recording);
        assert_eq!(prefs.audio_quality.sample_rate(), 16000);
    }
}
