use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use super::as_number;
use crate::engine::TranscriptLine;
use crate::{Result, TranscriptError};

/// Anti-JSON-hijacking prefix some endpoints put in front of JSON bodies
const JSON_GUARD: &str = ")]}'";

/// Remove a leading JSON guard and surrounding whitespace
pub fn strip_guard(raw: &str) -> &str {
    raw.strip_prefix(JSON_GUARD).unwrap_or(raw).trim()
}

/// Parse a timed-caption response body.
///
/// An empty body, a JSON document without `events`, or XML without `<text>`
/// nodes yields an empty list. Malformed JSON and unrecognized formats are
/// `ParseError`s.
pub fn parse_caption_body(raw: &str) -> Result<Vec<TranscriptLine>> {
    let cleaned = strip_guard(raw);
    if cleaned.is_empty() {
        return Ok(Vec::new());
    }

    if cleaned.starts_with('{') || cleaned.starts_with('[') {
        let document: Value = serde_json::from_str(cleaned)
            .map_err(|e| TranscriptError::ParseError(format!("caption JSON: {}", e)))?;
        return Ok(lines_from_json(&document));
    }

    if cleaned.starts_with('<') {
        return Ok(lines_from_xml(cleaned));
    }

    Err(TranscriptError::ParseError("unknown caption format".to_string()).into())
}

/// `json3` events, read one at a time. Non-object events are skipped and
/// segments without string text contribute nothing.
fn lines_from_json(document: &Value) -> Vec<TranscriptLine> {
    let Some(events) = document.get("events").and_then(Value::as_array) else {
        return Vec::new();
    };

    events
        .iter()
        .filter(|event| event.is_object())
        .filter_map(|event| {
            let segs = event
                .get("segs")
                .and_then(Value::as_array)
                .filter(|segs| !segs.is_empty())?;
            let text: String = segs
                .iter()
                .filter_map(|seg| seg.get("utf8").and_then(Value::as_str))
                .collect();
            let start_ms = event.get("tStartMs").and_then(as_number).unwrap_or(0.0);
            TranscriptLine::from_millis(start_ms, &text)
        })
        .collect()
}

fn text_node_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<text\b([^>]*?)(?:/>|>(.*?)</text>)").expect("valid text node regex")
    })
}

fn attribute_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?:^|\s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*"([^"]*)""#).expect("valid attribute regex")
    })
}

fn inner_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid tag regex"))
}

/// Legacy caption XML: one line per `<text>` node
fn lines_from_xml(xml: &str) -> Vec<TranscriptLine> {
    text_node_re()
        .captures_iter(xml)
        .filter_map(|caps| {
            let attributes = caps.get(1).map_or("", |m| m.as_str());
            let body = caps.get(2).map_or("", |m| m.as_str());

            let start_ms = xml_start_ms(attributes);
            let stripped = inner_tag_re().replace_all(body, " ");
            let text = html_escape::decode_html_entities(&stripped);
            TranscriptLine::from_millis(start_ms, &text)
        })
        .collect()
}

/// Start offset from an integer-millisecond `t`, else a fractional-second `start`
fn xml_start_ms(attributes: &str) -> f64 {
    let mut t = None;
    let mut start = None;
    for caps in attribute_re().captures_iter(attributes) {
        match &caps[1] {
            "t" => t = Some(caps[2].to_string()),
            "start" => start = Some(caps[2].to_string()),
            _ => {}
        }
    }

    if let Some(t) = t {
        return t.trim().parse::<f64>().ok().filter(|v| v.is_finite()).map_or(0.0, f64::round);
    }
    if let Some(start) = start {
        return start
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map_or(0.0, |secs| (secs * 1000.0).round());
    }
    0.0
}
