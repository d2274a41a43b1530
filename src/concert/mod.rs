//! Concert metadata entered by the user before recording
//!
//! `ConcertInfo` is the immutable value attached to a pending ticket, while
//! `ConcertDraft` holds the info the user is still editing.

use crate::{Result, SoundsUpError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ConcertInfoRecord")]
pub struct ConcertInfo {
    artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    concert_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl ConcertInfo {
    /// Create concert info for an artist. The artist must not be blank.
    pub fn new(artist: impl Into<String>) -> Result<Self> {
        let artist = artist.into().trim().to_string();
        if artist.is_empty() {
            return Err(SoundsUpError::InvalidConcertInfo(
                "artist is required".to_string(),
            ));
        }

        Ok(Self {
            artist,
            time: None,
            location: None,
            concert_name: None,
            description: None,
        })
    }

    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = non_blank(time.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = non_blank(location.into());
        self
    }

    pub fn with_concert_name(mut self, name: impl Into<String>) -> Self {
        self.concert_name = non_blank(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = non_blank(description.into());
        self
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn time(&self) -> Option<&str> {
        self.time.as_deref()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn concert_name(&self) -> Option<&str> {
        self.concert_name.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Display title used for completed tickets
    pub fn title(&self) -> String {
        format!(
            "{} - {}",
            self.artist,
            self.concert_name.as_deref().unwrap_or("Concert")
        )
    }
}

#[derive(Deserialize)]
struct ConcertInfoRecord {
    artist: String,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    concert_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl TryFrom<ConcertInfoRecord> for ConcertInfo {
    type Error = SoundsUpError;

    fn try_from(record: ConcertInfoRecord) -> Result<Self> {
        let mut info = ConcertInfo::new(record.artist)?;
        info.time = record.time.and_then(non_blank);
        info.location = record.location.and_then(non_blank);
        info.concert_name = record.concert_name.and_then(non_blank);
        info.description = record.description.and_then(non_blank);
        Ok(info)
    }
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Editable concert field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcertField {
    Artist,
    Time,
    Location,
    ConcertName,
    Description,
}

/// Concert info being edited before a recording starts
#[derive(Debug, Clone, Default)]
pub struct ConcertDraft {
    info: Option<ConcertInfo>,
}

impl ConcertDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, info: ConcertInfo) {
        self.info = Some(info);
    }

    pub fn clear(&mut self) {
        self.info = None;
    }

    /// Update a single field. Does nothing when no info has been set yet.
    ///
    /// A blank artist leaves the draft unconfigured until a valid one is set.
    pub fn update_field(&mut self, field: ConcertField, value: impl Into<String>) {
        let Some(info) = self.info.as_mut() else {
            return;
        };

        let value = value.into();
        match field {
            ConcertField::Artist => info.artist = value.trim().to_string(),
            ConcertField::Time => info.time = non_blank(value),
            ConcertField::Location => info.location = non_blank(value),
            ConcertField::ConcertName => info.concert_name = non_blank(value),
            ConcertField::Description => info.description = non_blank(value),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.info
            .as_ref()
            .map(|info| !info.artist.is_empty())
            .unwrap_or(false)
    }

    /// The configured info, if the artist is present
    pub fn info(&self) -> Option<&ConcertInfo> {
        self.info.as_ref().filter(|info| !info.artist.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_artist_rejected() {
        assert!(ConcertInfo::new("").is_err());
        assert!(ConcertInfo::new("   ").is_err());
        assert_eq!(ConcertInfo::new(" Adele ").unwrap().artist(), "Adele");
    }

    #[test]
    fn test_title_falls_back_to_concert() {
        let info = ConcertInfo::new("Mayday").unwrap();
        assert_eq!(info.title(), "Mayday - Concert");

        let info = info.with_concert_name("Life Tour");
        assert_eq!(info.title(), "Mayday - Life Tour");
    }

    #[test]
    fn test_draft_configuration() {
        let mut draft = ConcertDraft::new();
        assert!(!draft.is_configured());

        // No info yet, update is ignored
        draft.update_field(ConcertField::Location, "Taipei");
        assert!(draft.info().is_none());

        draft.set(ConcertInfo::new("Mayday").unwrap());
        assert!(draft.is_configured());

        draft.update_field(ConcertField::Location, "National Stadium");
        assert_eq!(draft.info().unwrap().location(), Some("National Stadium"));

        draft.update_field(ConcertField::Artist, "  ");
        assert!(!draft.is_configured());
        assert!(draft.info().is_none());

        draft.clear();
        assert!(!draft.is_configured());
    }

    #[test]
    fn test_deserialize_validates_artist() {
        let info: ConcertInfo =
            serde_json::from_str(r#"{"artist":"Adele","location":""}"#).unwrap();
        assert_eq!(info.artist(), "Adele");
        assert_eq!(info.location(), None);

        assert!(serde_json::from_str::<ConcertInfo>(r#"{"artist":""}"#).is_err());
    }

    #[test]
    fn test_empty_optional_fields_are_unset() {
        let info = ConcertInfo::new("Adele").unwrap().with_time("").with_description(" ");
        assert_eq!(info.time(), None);
        assert_eq!(info.description(), None);
    }
}
