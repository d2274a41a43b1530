use chrono::{DateTime, Utc};
use std::time::Duration;

/// Audio file extensions the analysis service accepts, lowercase
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "aac"];

/// Format a duration as `m:ss`
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    format!("{}:{:02}", total / 60, total % 60)
}

/// Check whether a file name has an audio extension the service accepts
pub fn is_supported_audio_file(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Upload file name for a recording, `recording_<epoch-ms>.m4a`
pub fn recording_file_name(now: DateTime<Utc>) -> String {
    format!("recording_{}.m4a", now.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0:00");
        assert_eq!(format_duration(Duration::from_secs(65)), "1:05");
        assert_eq!(format_duration(Duration::from_millis(3_599_900)), "59:59");
    }

    #[test]
    fn test_supported_audio_files() {
        assert!(is_supported_audio_file("set.M4A"));
        assert!(is_supported_audio_file("encore.wav"));
        assert!(!is_supported_audio_file("poster.jpg"));
        assert!(!is_supported_audio_file("m4a"));
    }

    #[test]
    fn test_recording_file_name() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(recording_file_name(at), "recording_1700000000123.m4a");
    }
}
