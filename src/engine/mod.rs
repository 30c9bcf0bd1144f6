use futures_util::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::cache::BoundedCache;
use crate::config::EngineConfig;
use crate::http::HttpClient;
use crate::output::{render_document, VideoMetadata};
use crate::page::{NetworkLog, PageAccessor};
use crate::strategies::{default_strategies, TranscriptStrategy};
use crate::utils::{collapse_whitespace, format_timestamp_ms};
use crate::{Result, TranscriptError};

pub mod token;

/// One timestamped unit of caption text
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TranscriptLine {
    /// Display offset such as `1:05` or `01:01:01`
    pub timestamp: String,

    /// Single-spaced, trimmed, never empty
    pub text: String,
}

impl TranscriptLine {
    pub fn new(timestamp: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            text: text.into(),
        }
    }

    /// Build a line from a millisecond offset, normalizing whitespace.
    /// Returns `None` when no text is left.
    pub fn from_millis(start_ms: f64, raw_text: &str) -> Option<Self> {
        let text = collapse_whitespace(raw_text);
        if text.is_empty() {
            return None;
        }
        Some(Self {
            timestamp: format_timestamp_ms(start_ms),
            text,
        })
    }
}

impl fmt::Display for TranscriptLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.timestamp, self.text)
    }
}

/// Alternate-language transcript request param offered by the language menu
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageParam {
    pub label: String,
    pub params: String,
    pub selected: bool,
}

/// Drop repeated lines, keeping the first occurrence and source order.
///
/// A line is dropped when the same timestamp and text were already kept, or
/// when its text repeats the line kept just before it.
pub fn dedupe_lines(lines: Vec<TranscriptLine>) -> Vec<TranscriptLine> {
    let mut seen = HashSet::new();
    let mut result: Vec<TranscriptLine> = Vec::with_capacity(lines.len());

    for line in lines {
        if line.text.is_empty() {
            continue;
        }
        if result.last().is_some_and(|previous| previous.text == line.text) {
            continue;
        }
        if seen.insert(line.clone()) {
            result.push(line);
        }
    }

    result
}

pub(crate) type SharedCapture = Shared<BoxFuture<'static, Option<String>>>;

/// State scoped to the video currently being viewed
#[derive(Default)]
pub struct VideoSession {
    pub video_id: Option<String>,
    pub cached_lines: Option<Vec<TranscriptLine>>,
    pub access_token: Option<String>,
    pub(crate) token_capture_in_flight: Option<SharedCapture>,
}

impl VideoSession {
    pub fn is_for(&self, video_id: &str) -> bool {
        self.video_id.as_deref() == Some(video_id)
    }
}

/// Session plus the per-video caches that outlive it
pub struct EngineState {
    pub session: VideoSession,
    pub transcripts: BoundedCache<Vec<TranscriptLine>>,
    pub params: BoundedCache<String>,
    pub languages: BoundedCache<Vec<LanguageParam>>,
}

impl EngineState {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            session: VideoSession::default(),
            transcripts: BoundedCache::new(config.transcript_cache_size),
            params: BoundedCache::new(config.param_cache_size),
            languages: BoundedCache::new(config.language_cache_size),
        }
    }

    /// Make `video_id` the active video, resetting the session if it changed
    pub fn activate(&mut self, video_id: &str) {
        if self.session.is_for(video_id) {
            return;
        }
        tracing::info!("Active video is now {}", video_id);
        self.session = VideoSession {
            video_id: Some(video_id.to_string()),
            cached_lines: self.transcripts.get(video_id).cloned(),
            ..VideoSession::default()
        };
    }

    /// Store a param for later requests; kept even before it is known to work
    pub fn store_param(&mut self, video_id: &str, param: &str) {
        if param.is_empty() {
            return;
        }
        self.params.insert(video_id, param.to_string());
    }
}

/// Collaborators, tuning and state shared by the engine and its strategies
pub struct EngineContext {
    pub page: Arc<dyn PageAccessor>,
    pub http: Arc<dyn HttpClient>,
    pub network_log: Arc<dyn NetworkLog>,
    pub config: EngineConfig,
    pub preferred_language: Option<String>,
    state: Mutex<EngineState>,
}

impl EngineContext {
    /// Lock the engine state. The guard must not be held across an `.await`.
    pub fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Resolves transcripts for videos, one strategy at a time
pub struct TranscriptEngine {
    ctx: EngineContext,
    strategies: Vec<Box<dyn TranscriptStrategy>>,
}

impl TranscriptEngine {
    /// Create an engine with the default strategy order
    pub fn new(
        page: Arc<dyn PageAccessor>,
        http: Arc<dyn HttpClient>,
        network_log: Arc<dyn NetworkLog>,
        config: EngineConfig,
    ) -> Self {
        let state = Mutex::new(EngineState::new(&config));
        Self {
            ctx: EngineContext {
                page,
                http,
                network_log,
                config,
                preferred_language: None,
                state,
            },
            strategies: default_strategies(),
        }
    }

    /// Prefer caption tracks in `language` over the page's own preference
    pub fn with_preferred_language(mut self, language: Option<String>) -> Self {
        self.ctx.preferred_language = language;
        self
    }

    /// Replace the strategy chain
    pub fn with_strategies(mut self, strategies: Vec<Box<dyn TranscriptStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    /// React to the host page showing another video (or none)
    pub fn navigate(&self, video_id: Option<&str>) {
        let mut state = self.ctx.state();
        match video_id {
            Some(id) if !id.is_empty() => state.activate(id),
            _ => {
                if state.session.video_id.is_some() {
                    tracing::info!("No video on page; session cleared");
                }
                state.session = VideoSession::default();
            }
        }
    }

    /// Video the current session belongs to
    pub fn active_video(&self) -> Option<String> {
        self.ctx.state().session.video_id.clone()
    }

    /// Lines already resolved for the active video
    pub fn session_lines(&self) -> Option<Vec<TranscriptLine>> {
        self.ctx.state().session.cached_lines.clone()
    }

    /// Resolve the transcript of `video_id`.
    ///
    /// Served from the transcript cache when possible; otherwise the strategies run
    /// in order and the first non-empty, deduplicated result is cached and returned.
    /// Fails with [`TranscriptError::TranscriptUnavailable`] when every strategy
    /// comes back empty. Failures are not cached.
    pub async fn resolve_transcript(&self, video_id: &str) -> Result<Vec<TranscriptLine>> {
        if video_id.is_empty() {
            return Err(TranscriptError::NoVideoDetected.into());
        }

        {
            let mut state = self.ctx.state();
            state.activate(video_id);
            if let Some(lines) = state.transcripts.get(video_id).cloned() {
                tracing::debug!("Transcript for {} served from cache", video_id);
                state.session.cached_lines = Some(lines.clone());
                return Ok(lines);
            }
        }

        for strategy in &self.strategies {
            tracing::debug!("Trying {} strategy for {}", strategy.name(), video_id);

            let lines = match strategy.fetch_lines(&self.ctx, video_id).await {
                Some(lines) => dedupe_lines(lines),
                None => continue,
            };
            if lines.is_empty() {
                continue;
            }

            tracing::info!(
                "Resolved {} transcript line(s) for {} via {}",
                lines.len(),
                video_id,
                strategy.name()
            );

            let mut state = self.ctx.state();
            state.transcripts.insert(video_id, lines.clone());
            if state.session.is_for(video_id) {
                state.session.cached_lines = Some(lines.clone());
            }
            return Ok(lines);
        }

        tracing::warn!("Every strategy came back empty for {}", video_id);
        Err(TranscriptError::TranscriptUnavailable.into())
    }

    /// Resolve the transcript and prepend a metadata header
    pub async fn build_transcript_document(
        &self,
        video_id: &str,
        metadata: &VideoMetadata,
    ) -> Result<String> {
        let lines = self.resolve_transcript(video_id).await?;
        Ok(render_document(&lines, metadata))
    }
}
