use async_trait::async_trait;

pub mod panel;
pub mod structured;
pub mod timedtext;

pub use panel::RenderedPanelStrategy;
pub use structured::StructuredEndpointStrategy;
pub use timedtext::{CaptionTrackDescriptor, TimedTextStrategy};

use crate::engine::{EngineContext, TranscriptLine};
use crate::TranscriptError;

/// One way of getting transcript lines for a video.
///
/// Strategies never fail: every endpoint or parse problem is logged and turned
/// into `None` (or an empty list) so the engine can move on to the next one.
#[async_trait]
pub trait TranscriptStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// One-line description for listings
    fn description(&self) -> &'static str;

    /// Fetch the lines of `video_id`, in source order
    async fn fetch_lines(&self, ctx: &EngineContext, video_id: &str) -> Option<Vec<TranscriptLine>>;
}

/// Strategies in the order the engine tries them
pub fn default_strategies() -> Vec<Box<dyn TranscriptStrategy>> {
    vec![
        Box::new(StructuredEndpointStrategy::new()),
        Box::new(TimedTextStrategy::new()),
        Box::new(RenderedPanelStrategy::new()),
    ]
}

/// Log a swallowed failure: expected network and parse problems at debug level,
/// anything else as a warning.
pub(crate) fn log_failure(what: &str, err: &anyhow::Error) {
    let expected = err
        .downcast_ref::<TranscriptError>()
        .map(TranscriptError::is_diagnostic)
        .unwrap_or(false)
        || err.downcast_ref::<reqwest::Error>().is_some();

    if expected {
        tracing::debug!("{}: {}", what, err);
    } else {
        tracing::warn!("{}: {:#}", what, err);
    }
}
