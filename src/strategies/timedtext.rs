use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use super::{log_failure, TranscriptStrategy};
use crate::engine::token::{ensure_access_token, known_access_token};
use crate::engine::{EngineContext, TranscriptLine};
use crate::http::HttpRequest;
use crate::parsers::{field, parse_caption_body};

const FORMAT_PARAM: &str = "fmt";
const FORMAT_HINT: &str = "json3";
const TOKEN_PARAM: &str = "pot";

/// A caption track advertised by the player configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionTrackDescriptor {
    #[serde(rename = "baseUrl")]
    pub base_url: String,

    #[serde(rename = "languageCode", default)]
    pub language_code: String,

    /// `asr` for auto-generated tracks, absent for uploaded ones
    #[serde(default)]
    pub kind: Option<String>,
}

/// Caption tracks listed in a player response
pub fn caption_tracks(player_response: &Value) -> Vec<CaptionTrackDescriptor> {
    let Some(tracks) = field(
        player_response,
        &["captions", "playerCaptionsTracklistRenderer", "captionTracks"],
    )
    .and_then(Value::as_array) else {
        return Vec::new();
    };

    tracks
        .iter()
        .filter_map(|track| serde_json::from_value::<CaptionTrackDescriptor>(track.clone()).ok())
        .filter(|track| !track.base_url.is_empty())
        .collect()
}

/// Exact language match, else the first uploaded track, else the first track
pub fn pick_caption_track<'a>(
    tracks: &'a [CaptionTrackDescriptor],
    preferred_language: Option<&str>,
) -> Option<&'a CaptionTrackDescriptor> {
    let preferred = preferred_language.map(str::to_lowercase);

    preferred
        .and_then(|lang| tracks.iter().find(|track| track.language_code.to_lowercase() == lang))
        .or_else(|| {
            tracks
                .iter()
                .find(|track| track.kind.as_deref().map_or(true, str::is_empty))
        })
        .or_else(|| tracks.first())
}

/// Ask for the structured JSON caption format unless a format is already set
pub fn with_format_hint(base_url: &str) -> String {
    match Url::parse(base_url) {
        Ok(mut url) => {
            if !url.query_pairs().any(|(key, _)| key == FORMAT_PARAM) {
                url.query_pairs_mut().append_pair(FORMAT_PARAM, FORMAT_HINT);
            }
            url.to_string()
        }
        Err(_) => {
            if has_query_param(base_url, FORMAT_PARAM) {
                return base_url.to_string();
            }
            format!("{}{}{}={}", base_url, separator(base_url), FORMAT_PARAM, FORMAT_HINT)
        }
    }
}

/// Set the access token query value, replacing any existing one
pub fn with_access_token(base_url: &str, token: &str) -> String {
    match Url::parse(base_url) {
        Ok(mut url) => {
            let kept: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(key, _)| key != TOKEN_PARAM)
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .collect();
            url.query_pairs_mut()
                .clear()
                .extend_pairs(kept)
                .append_pair(TOKEN_PARAM, token);
            url.to_string()
        }
        Err(_) => {
            if has_query_param(base_url, TOKEN_PARAM) {
                return base_url.to_string();
            }
            format!(
                "{}{}{}={}",
                base_url,
                separator(base_url),
                TOKEN_PARAM,
                urlencoding::encode(token)
            )
        }
    }
}

fn has_query_param(url: &str, name: &str) -> bool {
    url.contains(&format!("?{}=", name)) || url.contains(&format!("&{}=", name))
}

fn separator(url: &str) -> char {
    if url.contains('?') {
        '&'
    } else {
        '?'
    }
}

/// Caption URLs to try, in order, without duplicates
pub fn candidate_urls(base_url: &str, token: Option<&str>) -> Vec<String> {
    let hinted = with_format_hint(base_url);
    let mut urls = Vec::with_capacity(4);

    if let Some(token) = token.filter(|token| !token.is_empty()) {
        urls.push(with_access_token(&hinted, token));
        urls.push(with_access_token(base_url, token));
    }
    urls.push(hinted);
    urls.push(base_url.to_string());

    dedupe_urls(urls)
}

fn dedupe_urls(urls: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(urls.len());
    for url in urls {
        if !url.is_empty() && !unique.contains(&url) {
            unique.push(url);
        }
    }
    unique
}

/// Downloads captions straight from a track's delivery URL
pub struct TimedTextStrategy;

impl TimedTextStrategy {
    pub fn new() -> Self {
        Self
    }

    /// First candidate that yields parseable, non-empty captions
    async fn fetch_first(&self, ctx: &EngineContext, urls: &[String]) -> Option<Vec<TranscriptLine>> {
        for url in dedupe_urls(urls.to_vec()) {
            let response = match ctx.http.fetch(HttpRequest::get(&url)).await {
                Ok(response) => response,
                Err(e) => {
                    log_failure("Caption fetch failed", &e);
                    continue;
                }
            };

            if !response.is_success() {
                tracing::debug!("Caption fetch returned HTTP {}", response.status);
                continue;
            }

            match parse_caption_body(&response.body) {
                Ok(lines) if !lines.is_empty() => return Some(lines),
                Ok(_) => tracing::debug!("Caption response had no usable events"),
                Err(e) => log_failure("Caption parse failed", &e),
            }
        }

        None
    }
}

impl Default for TimedTextStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranscriptStrategy for TimedTextStrategy {
    fn name(&self) -> &'static str {
        "timed-caption"
    }

    fn description(&self) -> &'static str {
        "Caption track delivery URL from the player configuration, with access-token retry"
    }

    async fn fetch_lines(&self, ctx: &EngineContext, video_id: &str) -> Option<Vec<TranscriptLine>> {
        let Some(player_response) = ctx.page.player_response() else {
            tracing::debug!("No player configuration on page");
            return None;
        };

        let tracks = caption_tracks(&player_response);
        let preferred = ctx
            .preferred_language
            .clone()
            .or_else(|| ctx.page.preferred_language());
        let Some(track) = pick_caption_track(&tracks, preferred.as_deref()) else {
            tracing::debug!("Video {} lists no caption tracks", video_id);
            return None;
        };
        tracing::debug!(
            "Using caption track {} ({})",
            track.language_code,
            track.kind.as_deref().unwrap_or("standard")
        );

        let base_url = track.base_url.as_str();
        let token = known_access_token(ctx, video_id);
        if let Some(lines) = self.fetch_first(ctx, &candidate_urls(base_url, token.as_deref())).await {
            return Some(lines);
        }
        if token.is_some() {
            return None;
        }

        let token = ensure_access_token(ctx, video_id).await?;
        tracing::debug!("Retrying captions with a captured access token");
        let urls = vec![
            with_access_token(&with_format_hint(base_url), &token),
            with_access_token(base_url, &token),
        ];
        self.fetch_first(ctx, &urls).await
    }
}
