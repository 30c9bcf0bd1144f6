//! Access-token ("pot") capture for the timed-caption endpoint.
//!
//! The player attaches a short-lived token to its own caption requests. Toggling
//! subtitles off and on makes it issue one, and the token is then read back out
//! of the network log.

use futures_util::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use url::Url;

use super::EngineContext;
use crate::page::{NetworkLog, NodeId, PageAccessor};
use crate::utils::poll_until;

/// Path fragment identifying caption requests in the network log
pub const TIMEDTEXT_MARKER: &str = "/api/timedtext?";

pub(crate) const SUBTITLE_TOGGLE_SELECTOR: &str = "button.ytp-subtitles-button";

fn token_from_url(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    url.query_pairs()
        .find(|(key, value)| key == "pot" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

/// Token from the most recent caption request in `log`
pub fn read_token_from_log(log: &dyn NetworkLog) -> Option<String> {
    log.entries()
        .iter()
        .rev()
        .filter(|entry| entry.contains(TIMEDTEXT_MARKER))
        .find_map(|entry| token_from_url(entry))
}

/// Token already known for `video_id`, without touching the player
pub fn known_access_token(ctx: &EngineContext, video_id: &str) -> Option<String> {
    let mut state = ctx.state();
    if state.session.is_for(video_id) {
        if let Some(token) = &state.session.access_token {
            return Some(token.clone());
        }
    }

    let token = read_token_from_log(ctx.network_log.as_ref())?;
    if state.session.is_for(video_id) {
        state.session.access_token = Some(token.clone());
    }
    Some(token)
}

/// Get an access token for `video_id`, capturing one from the player if needed.
///
/// Concurrent callers share a single capture attempt. Returns `None` when the
/// session no longer belongs to `video_id` or no token turned up.
pub async fn ensure_access_token(ctx: &EngineContext, video_id: &str) -> Option<String> {
    let capture = {
        let mut state = ctx.state();
        if !state.session.is_for(video_id) {
            return None;
        }
        if let Some(token) = &state.session.access_token {
            return Some(token.clone());
        }

        if let Some(capture) = state.session.token_capture_in_flight.clone() {
            capture
        } else {
            if let Some(token) = read_token_from_log(ctx.network_log.as_ref()) {
                state.session.access_token = Some(token.clone());
                return Some(token);
            }

            tracing::debug!("Capturing caption access token for {}", video_id);
            let capture = TokenCapture::new(ctx).run().boxed().shared();
            state.session.token_capture_in_flight = Some(capture.clone());
            capture
        }
    };

    let token = capture.clone().await;

    let mut state = ctx.state();
    if state
        .session
        .token_capture_in_flight
        .as_ref()
        .is_some_and(|current| current.ptr_eq(&capture))
    {
        state.session.token_capture_in_flight = None;
    }

    match &token {
        Some(token) if state.session.is_for(video_id) => {
            state.session.access_token = Some(token.clone());
        }
        Some(_) => tracing::debug!("Video changed during token capture; token not kept"),
        None => tracing::debug!("No caption access token captured for {}", video_id),
    }
    token
}

/// One subtitle-toggle round trip
struct TokenCapture {
    page: Arc<dyn PageAccessor>,
    network_log: Arc<dyn NetworkLog>,
    toggle_delay: Duration,
    poll_interval: Duration,
    timeout: Duration,
}

impl TokenCapture {
    fn new(ctx: &EngineContext) -> Self {
        Self {
            page: ctx.page.clone(),
            network_log: ctx.network_log.clone(),
            toggle_delay: ctx.config.toggle_delay(),
            poll_interval: ctx.config.token_poll_interval(),
            timeout: ctx.config.token_timeout(),
        }
    }

    fn is_pressed(&self, toggle: NodeId) -> bool {
        self.page.attribute(toggle, "aria-pressed").as_deref() == Some("true")
    }

    async fn run(self) -> Option<String> {
        let Some(toggle) = self.page.query_first(SUBTITLE_TOGGLE_SELECTOR) else {
            tracing::debug!("Subtitle toggle not found");
            return None;
        };
        let initially_pressed = self.is_pressed(toggle);

        self.network_log.clear();
        self.page.click(toggle);
        sleep(self.toggle_delay).await;
        self.page.click(toggle);

        let token = poll_until(self.poll_interval, self.timeout, || {
            read_token_from_log(self.network_log.as_ref())
        })
        .await;

        if self.is_pressed(toggle) != initially_pressed {
            self.page.click(toggle);
        }

        token.or_else(|| read_token_from_log(self.network_log.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::MockHttpClient;
    use crate::page::MemoryNetworkLog;
    use crate::test_support::{engine_with_log, with_subtitle_toggle, FakePage, LOGGED_CAPTION_URL};

    #[test]
    fn test_newest_log_entry_wins() {
        let log = MemoryNetworkLog::new();
        log.record("https://www.youtube.com/api/timedtext?v=1&pot=OLD");
        log.record("https://www.youtube.com/api/timedtext?v=1");
        log.record("https://www.youtube.com/api/timedtext?v=1&pot=NEW");
        log.record("https://www.youtube.com/youtubei/v1/player?pot=OTHER");
        assert_eq!(read_token_from_log(&log), Some("NEW".to_string()));

        log.clear();
        log.record("not a url /api/timedtext?pot=X");
        assert_eq!(read_token_from_log(&log), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_toggles_twice_and_stores_token() {
        let log = Arc::new(MemoryNetworkLog::new());
        let (page, toggle) = with_subtitle_toggle(FakePage::new(), log.clone(), false, true);
        let engine = engine_with_log(page.clone(), MockHttpClient::new(), log);
        engine.navigate(Some("vid"));

        let token = ensure_access_token(engine.context(), "vid").await;

        assert_eq!(token.as_deref(), Some("TOKEN"));
        assert_eq!(page.clicks(), vec![toggle, toggle]);
        let state = engine.context().state();
        assert_eq!(state.session.access_token.as_deref(), Some("TOKEN"));
        assert!(state.session.token_capture_in_flight.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_restores_toggle_state() {
        let log = Arc::new(MemoryNetworkLog::new());
        let (page, toggle) = with_subtitle_toggle(FakePage::new(), log.clone(), true, false);
        let engine = engine_with_log(page.clone(), MockHttpClient::new(), log);
        engine.navigate(Some("vid"));

        let token = ensure_access_token(engine.context(), "vid").await;

        assert_eq!(token, None);
        assert_eq!(page.clicks().len(), 3);
        assert_eq!(page.with_dom(|dom| dom.attribute(toggle, "aria-pressed").map(str::to_string)), Some("true".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_capture() {
        let log = Arc::new(MemoryNetworkLog::new());
        let (page, _) = with_subtitle_toggle(FakePage::new(), log.clone(), false, true);
        let engine = engine_with_log(page.clone(), MockHttpClient::new(), log);
        engine.navigate(Some("vid"));

        let (first, second) = tokio::join!(
            ensure_access_token(engine.context(), "vid"),
            ensure_access_token(engine.context(), "vid")
        );

        assert_eq!(first, second);
        assert_eq!(first.as_deref(), Some("TOKEN"));
        assert_eq!(page.clicks().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_not_kept_after_video_change() {
        let log = Arc::new(MemoryNetworkLog::new());
        let (page, _) = with_subtitle_toggle(FakePage::new(), log.clone(), false, true);
        let engine = engine_with_log(page, MockHttpClient::new(), log);
        engine.navigate(Some("vid"));

        let (token, _) = tokio::join!(ensure_access_token(engine.context(), "vid"), async {
            sleep(Duration::from_millis(50)).await;
            engine.navigate(Some("other"));
        });

        assert_eq!(token.as_deref(), Some("TOKEN"));
        assert!(engine.context().state().session.access_token.is_none());
        assert_eq!(ensure_access_token(engine.context(), "vid").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_toggle_gives_none() {
        let log = Arc::new(MemoryNetworkLog::new());
        let engine = engine_with_log(Arc::new(FakePage::new()), MockHttpClient::new(), log);
        engine.navigate(Some("vid"));

        assert_eq!(ensure_access_token(engine.context(), "vid").await, None);
    }

    #[tokio::test]
    async fn test_token_already_in_log_skips_capture() {
        let log = Arc::new(MemoryNetworkLog::new());
        log.record(LOGGED_CAPTION_URL);
        let (page, _) = with_subtitle_toggle(FakePage::new(), log.clone(), false, true);
        let engine = engine_with_log(page.clone(), MockHttpClient::new(), log);
        engine.navigate(Some("vid"));

        assert_eq!(known_access_token(engine.context(), "vid").as_deref(), Some("TOKEN"));
        assert_eq!(ensure_access_token(engine.context(), "vid").await.as_deref(), Some("TOKEN"));
        assert!(page.clicks().is_empty());
    }
}
