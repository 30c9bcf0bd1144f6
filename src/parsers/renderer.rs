use serde_json::Value;
use std::collections::{HashSet, VecDeque};

use super::{as_number, field, first_field};
use crate::engine::{dedupe_lines, LanguageParam, TranscriptLine};
use crate::utils::{collapse_whitespace, decode_param};

/// Literal that precedes the transcript request param in watch page markup
const PARAM_MARKER: &str = r#""getTranscriptEndpoint":{"params":""#;

/// Everything the engine uses from one structured transcript response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedTranscript {
    /// Deduplicated lines in segment order
    pub lines: Vec<TranscriptLine>,

    /// Param of the currently selected transcript, if the response names one
    pub default_param: Option<String>,

    /// Alternate-language transcript params from the language menu
    pub language_params: Vec<LanguageParam>,
}

/// Walk every object and array reachable from `root` breadth-first.
///
/// Nodes are marked visited by identity, so each one is handed to `visit` once.
/// Stops early when `visit` returns `Some`.
fn walk_breadth_first<'a, T>(root: &'a Value, mut visit: impl FnMut(&'a Value) -> Option<T>) -> Option<T> {
    let mut queue = VecDeque::from([root]);
    let mut seen: HashSet<*const Value> = HashSet::new();

    while let Some(current) = queue.pop_front() {
        if !seen.insert(current as *const Value) {
            continue;
        }

        if let Some(found) = visit(current) {
            return Some(found);
        }

        let children: Box<dyn Iterator<Item = &'a Value>> = match current {
            Value::Object(map) => Box::new(map.values()),
            Value::Array(items) => Box::new(items.iter()),
            _ => continue,
        };
        queue.extend(children.filter(|child| child.is_object() || child.is_array()));
    }

    None
}

/// Containers anywhere in `data` that expose a transcript segment list
fn collect_transcript_panels(data: &Value) -> Vec<&Value> {
    let mut panels: Vec<&Value> = Vec::new();
    walk_breadth_first::<()>(data, |current| {
        if !current.is_object() {
            return None;
        }
        let panel = field(current, &["transcriptSearchPanelRenderer"])
            .filter(|panel| field(panel, &["body"]).is_some())
            .or_else(|| {
                field(current, &["transcriptRenderer"]).filter(|panel| field(panel, &["body"]).is_some())
            })
            .or_else(|| field(current, &["body", "transcriptSegmentListRenderer"]).map(|_| current));

        // A panel is reachable both through its wrapper and on its own
        if let Some(panel) = panel {
            if !panels.iter().any(|known| std::ptr::eq(*known, panel)) {
                panels.push(panel);
            }
        }
        None
    });
    panels
}

/// Parse a structured transcript endpoint response of unknown shape
pub fn parse_transcript_response(data: &Value) -> ParsedTranscript {
    let mut result = ParsedTranscript::default();

    for panel in collect_transcript_panels(data) {
        let renderer = first_field(panel, &[&["transcriptSearchPanelRenderer"], &["transcriptRenderer"]])
            .unwrap_or(panel);
        if !renderer.is_object() {
            continue;
        }

        if result.default_param.is_none() {
            result.default_param = field(
                renderer,
                &["header", "transcriptSearchBoxRenderer", "onTextChangeCommand", "getTranscriptEndpoint", "params"],
            )
            .and_then(Value::as_str)
            .map(decode_param);
        }

        result.lines.extend(panel_lines(renderer));

        for item in language_menu_items(renderer) {
            if item.selected {
                result.default_param = Some(item.params.clone());
            }
            result.language_params.push(item);
        }
    }

    result.lines = dedupe_lines(result.lines);
    result
}

fn panel_lines(renderer: &Value) -> Vec<TranscriptLine> {
    let body = first_field(
        renderer,
        &[
            &["body", "transcriptSegmentListRenderer"],
            &["transcriptSegmentListRenderer"],
            &["segmentListRenderer"],
        ],
    )
    .unwrap_or(renderer);

    let Some(segments) = first_field(body, &[&["segments"], &["initialSegments"]]).and_then(Value::as_array) else {
        return Vec::new();
    };

    segments
        .iter()
        .filter_map(|item| {
            let segment = first_field(
                item,
                &[
                    &["transcriptSegmentRenderer"],
                    &["transcriptSearchPanelSegmentRenderer", "segment"],
                    &["segment"],
                ],
            )
            .unwrap_or(item);
            if !segment.is_object() {
                return None;
            }

            let start_ms = first_field(segment, &[&["startMs"], &["startTimeMs"], &["tStartMs"], &["startTime"]])
                .and_then(as_number)
                .unwrap_or(0.0);
            let runs = first_field(
                segment,
                &[&["snippet", "runs"], &["subtitleText", "runs"], &["bodyText", "runs"]],
            )?;
            TranscriptLine::from_millis(start_ms, &text_from_runs(runs))
        })
        .collect()
}

fn text_from_runs(runs: &Value) -> String {
    let joined: String = runs
        .as_array()
        .map(|runs| {
            runs.iter()
                .filter_map(|run| run.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();
    collapse_whitespace(&joined)
}

/// Plain text of a label that may be a string, `simpleText` or `runs`
fn label_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        other => field(other, &["simpleText"])
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| field(other, &["runs"]).map(text_from_runs))?,
    };
    let text = collapse_whitespace(&text);
    (!text.is_empty()).then_some(text)
}

fn language_menu_items(renderer: &Value) -> Vec<LanguageParam> {
    let footer = first_field(renderer, &[&["footer", "transcriptFooterRenderer"], &["transcriptFooterRenderer"]]);
    let Some(items) = footer
        .and_then(|footer| field(footer, &["languageMenu", "sortFilterSubMenuRenderer", "subMenuItems"]))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let label = field(item, &["title"]).and_then(label_text)?;
            let continuation = field(item, &["continuation", "reloadContinuationData", "continuation"])
                .and_then(Value::as_str)
                .filter(|c| !c.is_empty())?;
            Some(LanguageParam {
                label,
                params: decode_param(continuation),
                selected: field(item, &["selected"]).and_then(Value::as_bool).unwrap_or(false),
            })
        })
        .collect()
}

/// Search initial-state objects for an embedded transcript request param
pub fn find_transcript_param(roots: &[Value]) -> Option<String> {
    roots.iter().find_map(|root| {
        walk_breadth_first(root, |current| {
            field(current, &["getTranscriptEndpoint", "params"])
                .and_then(Value::as_str)
                .filter(|params| !params.is_empty())
                .map(decode_param)
        })
    })
}

/// Pull the transcript request param out of raw page markup
pub fn extract_param_from_markup(html: &str) -> Option<String> {
    let start = html.find(PARAM_MARKER)? + PARAM_MARKER.len();
    let end = html[start..].find('"')?;
    let raw = &html[start..start + end];
    (!raw.is_empty()).then(|| decode_param(raw))
}
