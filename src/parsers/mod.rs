//! Turn raw endpoint payloads into [`TranscriptLine`](crate::engine::TranscriptLine)s.
//!
//! `captions` handles timed-caption bodies (JSON events or legacy XML),
//! `renderer` handles the structured transcript endpoint and the request
//! params embedded in page state.

pub mod captions;
pub mod renderer;

pub use captions::{parse_caption_body, strip_guard};
pub use renderer::{
    extract_param_from_markup, find_transcript_param, parse_transcript_response, ParsedTranscript,
};

use serde_json::Value;

/// Follow `path` through nested objects
pub(crate) fn field<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(*key))
        .filter(|found| !found.is_null())
}

/// First path in `paths` that resolves to a non-null value
pub(crate) fn first_field<'a>(value: &'a Value, paths: &[&[&str]]) -> Option<&'a Value> {
    paths.iter().find_map(|path| field(value, path))
}

/// Read a number that may be encoded as a JSON number or a numeric string
pub(crate) fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => Some(0.0),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}
