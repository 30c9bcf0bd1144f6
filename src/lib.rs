//! Transcript Copier - fetch the timestamped transcript of a YouTube video
//!
//! This library resolves the transcript of the video currently shown on a page by
//! trying the platform's internal transcript endpoint, the timed-caption endpoint and
//! finally the rendered transcript panel, caching what it finds per video.

pub mod cache;
pub mod cli;
pub mod config;
pub mod engine;
pub mod http;
pub mod output;
pub mod page;
pub mod parsers;
pub mod strategies;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use engine::{TranscriptEngine, TranscriptLine};
pub use output::VideoMetadata;
pub use http::{HttpClient, ReqwestClient};
pub use page::{HtmlSnapshot, MemoryNetworkLog, NetworkLog, PageAccessor};
pub use strategies::TranscriptStrategy;

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to transcript acquisition
#[derive(thiserror::Error, Debug)]
pub enum TranscriptError {
    #[error("No video detected.")]
    NoVideoDetected,

    #[error("Transcript unavailable.")]
    TranscriptUnavailable,

    #[error("Endpoint returned HTTP {status}")]
    EndpointHttpError { status: u16 },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Clipboard unavailable.")]
    ClipboardUnavailable,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl TranscriptError {
    /// Whether this error belongs to the expected network/parse failures that the
    /// strategies swallow and log at a diagnostic level.
    pub fn is_diagnostic(&self) -> bool {
        matches!(
            self,
            TranscriptError::EndpointHttpError { .. } | TranscriptError::ParseError(_)
        )
    }
}
