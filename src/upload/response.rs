//! Parse-and-validate boundary for analysis service responses
//!
//! The service answers with loosely typed JSON. Everything optional is mapped
//! to an explicit `None` (or an empty distribution) when it is absent or has
//! the wrong shape, instead of failing the whole upload.

use crate::tickets::{EmotionDistribution, TicketImage};
use crate::upload::{AnalysisResult, UploadError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Value};
use tracing::warn;

const GENERIC_FAILURE: &str = "Upload failed";

/// Parse a 2xx response body
pub fn parse_success(body: &str) -> Result<AnalysisResult, UploadError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| UploadError::Malformed(format!("invalid JSON: {}", e)))?;
    let Value::Object(fields) = value else {
        return Err(UploadError::Malformed("expected a JSON object".into()));
    };

    if !is_truthy(fields.get("success")) {
        let message = error_text(&fields).unwrap_or_else(|| GENERIC_FAILURE.to_string());
        return Err(UploadError::Rejected(message));
    }

    Ok(AnalysisResult {
        analysis_id: fields.get("analysis_id").and_then(id_string),
        image: fields.get("generated_image").and_then(parse_image),
        text: non_empty_string(fields.get("text_summary")),
        emotions: fields
            .get("emotion_distribution")
            .map(parse_emotions)
            .unwrap_or_default(),
        dominant_emotion: non_empty_string(fields.get("dominant_emotion")),
    })
}

/// Error text carried by a failure body, if any
///
/// JSON bodies contribute their `error` or `message` field; anything else
/// non-blank is returned as is.
pub fn failure_message(body: &str) -> Option<String> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(fields)) => error_text(&fields),
        _ => {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
    }
}

/// JavaScript-style truthiness, which is what the service's clients assume
fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn error_text(fields: &Map<String, Value>) -> Option<String> {
    non_empty_string(fields.get("error")).or_else(|| non_empty_string(fields.get("message")))
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_image(value: &Value) -> Option<TicketImage> {
    let Value::String(payload) = value else {
        warn!("Ignoring non-string generated_image");
        return None;
    };
    if payload.is_empty() {
        return None;
    }
    if STANDARD.decode(payload).is_err() {
        warn!("Ignoring generated_image that is not valid base64");
        return None;
    }
    Some(TicketImage::from_base64_jpeg(payload))
}

fn parse_emotions(value: &Value) -> EmotionDistribution {
    let Value::Object(weights) = value else {
        warn!("Ignoring emotion_distribution that is not an object");
        return EmotionDistribution::new();
    };

    let mut emotions = EmotionDistribution::new();
    for (label, weight) in weights {
        let accepted = weight
            .as_f64()
            .map(|w| emotions.insert(label.clone(), w))
            .unwrap_or(false);
        if !accepted {
            warn!("Dropping emotion {} with invalid weight {}", label, weight);
        }
    }
    emotions
}
