use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use super::TranscriptStrategy;
use crate::engine::{EngineContext, TranscriptLine};
use crate::page::{wait_for_element, NodeId, PageAccessor};
use crate::utils::{collapse_whitespace, normalize_label};

/// Rendered transcript rows; the first selector with matches wins
const SEGMENT_SELECTORS: &[&str] = &[
    "ytd-transcript-search-panel-renderer ytd-transcript-segment-renderer",
    r#"ytd-engagement-panel-section-list-renderer[target-id="engagement-panel-searchable-transcript"] ytd-transcript-segment-renderer"#,
    "#segments-container ytd-transcript-segment-renderer",
    "ytd-transcript-renderer .cue-group",
    "yt-transcript-segment-list-renderer yt-transcript-segment-renderer",
    "ytd-transcript-segment-list-renderer ytd-transcript-segment-renderer",
];

const TIMESTAMP_SELECTORS: &[&str] = &[".segment-timestamp", ".cue-group-start-offset", ".cue-time", ".timestamp"];

const TEXT_SELECTORS: &[&str] = &[".segment-text", ".cue", ".cue-text", "yt-formatted-string"];

/// Controls that open the transcript panel, directly or from the overflow menu
pub const TRANSCRIPT_BUTTON_SELECTORS: &[&str] = &[
    r#"button[aria-label*="transcript" i]"#,
    r#"button[aria-label*="transcription" i]"#,
    r#"tp-yt-paper-item[aria-label*="transcript" i]"#,
    r#"tp-yt-paper-item[aria-label*="transcription" i]"#,
    r#"yt-formatted-string[aria-label*="transcript" i]"#,
    r#"yt-formatted-string[aria-label*="transcription" i]"#,
];

const OVERFLOW_SELECTORS: &[&str] = &[
    r#"#menu button[aria-label*="more actions" i]"#,
    r#"#actions button[aria-label*="more actions" i]"#,
];

const TABLIST_SELECTORS: &[&str] = &[
    r#"chip-bar-view-model[role="tablist"]"#,
    r#"ytd-transcript-search-panel-renderer [role="tablist"]"#,
];

const TAB_SELECTORS: &[&str] = &[r#"button[role="tab"]"#, "tp-yt-paper-tab"];

const CHAPTER_KEYWORDS: &[&str] = &["chapitre", "chapters", "chapter", "capit", "kapitel"];

const TRANSCRIPT_KEYWORDS: &[&str] = &[
    "transcript",
    "transcription",
    "transcripcion",
    "transcricao",
    "transkripsjon",
    "transkript",
    "trascrizione",
];

fn query_transcript_nodes(page: &dyn PageAccessor) -> Vec<NodeId> {
    SEGMENT_SELECTORS
        .iter()
        .map(|selector| page.query_all(selector))
        .find(|nodes| !nodes.is_empty())
        .unwrap_or_default()
}

fn find_first(page: &dyn PageAccessor, selectors: &[&str]) -> Option<NodeId> {
    selectors.iter().find_map(|selector| page.query_first(selector))
}

/// Line for one rendered row, if it has both a timestamp and text
fn segment_line(page: &dyn PageAccessor, node: NodeId) -> Option<TranscriptLine> {
    let timestamp = page
        .query_first_within(node, TIMESTAMP_SELECTORS)
        .and_then(|child| page.text_content(child))
        .map(|time| time.trim().to_string())
        .filter(|time| !time.is_empty())?;
    let text = page
        .query_first_within(node, TEXT_SELECTORS)
        .and_then(|child| page.text_content(child))
        .map(|text| collapse_whitespace(&text))
        .filter(|text| !text.is_empty())?;

    Some(TranscriptLine::new(timestamp, text))
}

/// Folded tab label, from `aria-label` or else the tab's text
fn tab_label(page: &dyn PageAccessor, tab: NodeId) -> Option<String> {
    let label = page
        .attribute(tab, "aria-label")
        .filter(|label| !label.trim().is_empty())
        .or_else(|| page.text_content(tab))?;
    let label = label.trim();
    (!label.is_empty()).then(|| normalize_label(label))
}

fn matches_any(label: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| label.contains(keyword))
}

/// Scrapes transcript rows from the page, opening the transcript panel first
/// when it is not showing.
pub struct RenderedPanelStrategy;

impl RenderedPanelStrategy {
    pub fn new() -> Self {
        Self
    }

    async fn open_transcript_panel(&self, ctx: &EngineContext) {
        let page = ctx.page.as_ref();
        if !query_transcript_nodes(page).is_empty() {
            return;
        }

        if let Some(button) = find_first(page, TRANSCRIPT_BUTTON_SELECTORS) {
            tracing::debug!("Opening transcript panel");
            page.click(button);
            return;
        }

        let Some(overflow) = find_first(page, OVERFLOW_SELECTORS) else {
            tracing::debug!("No transcript control or overflow menu on page");
            return;
        };
        page.click(overflow);

        let item = wait_for_element(ctx.config.element_poll_interval(), ctx.config.menu_wait(), || {
            find_first(page, TRANSCRIPT_BUTTON_SELECTORS)
        })
        .await;
        match item {
            Some(item) => {
                tracing::debug!("Opening transcript panel from the overflow menu");
                page.click(item);
            }
            None => tracing::debug!("Overflow menu has no transcript item"),
        }
    }

    /// Make sure the panel shows the transcript rather than the chapter list
    async fn ensure_transcript_tab_selected(&self, ctx: &EngineContext) {
        let page = ctx.page.as_ref();
        let tablist = wait_for_element(ctx.config.element_poll_interval(), ctx.config.tablist_wait(), || {
            find_first(page, TABLIST_SELECTORS)
        })
        .await;
        let Some(tablist) = tablist else {
            return;
        };

        let tabs: Vec<(NodeId, String)> = TAB_SELECTORS
            .iter()
            .flat_map(|selector| page.query_within(tablist, selector))
            .filter_map(|tab| tab_label(page, tab).map(|label| (tab, label)))
            .collect();

        let chapter_tab = tabs.iter().find(|(_, label)| matches_any(label, CHAPTER_KEYWORDS));
        let Some(&(transcript_tab, _)) = tabs.iter().find(|(_, label)| matches_any(label, TRANSCRIPT_KEYWORDS)) else {
            return;
        };
        if page.attribute(transcript_tab, "aria-selected").as_deref() == Some("true") {
            return;
        }

        match chapter_tab {
            Some(&(chapter_tab, _)) => {
                tracing::debug!("Switching transcript panel away from chapters");
                page.click(chapter_tab);
                sleep(ctx.config.chapter_switch_delay()).await;
                page.click(transcript_tab);
                sleep(ctx.config.chapter_return_delay()).await;
            }
            None => {
                page.click(transcript_tab);
                sleep(ctx.config.tab_click_delay()).await;
            }
        }
    }

    /// Wait for rows to render, re-checking on each document change until `timeout`
    async fn wait_for_transcript_nodes(&self, page: &dyn PageAccessor, timeout: Duration) -> Vec<NodeId> {
        let deadline = Instant::now() + timeout;

        loop {
            let nodes = query_transcript_nodes(page);
            if !nodes.is_empty() {
                return nodes;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || !page.wait_for_mutation(remaining).await {
                break;
            }
        }

        query_transcript_nodes(page)
    }
}

impl Default for RenderedPanelStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranscriptStrategy for RenderedPanelStrategy {
    fn name(&self) -> &'static str {
        "rendered-panel"
    }

    fn description(&self) -> &'static str {
        "Transcript panel rendered in the page, opened on demand"
    }

    async fn fetch_lines(&self, ctx: &EngineContext, video_id: &str) -> Option<Vec<TranscriptLine>> {
        let page = ctx.page.as_ref();

        let nodes = if query_transcript_nodes(page).is_empty() {
            self.open_transcript_panel(ctx).await;
            self.ensure_transcript_tab_selected(ctx).await;
            self.wait_for_transcript_nodes(page, ctx.config.panel_wait()).await
        } else {
            self.ensure_transcript_tab_selected(ctx).await;
            query_transcript_nodes(page)
        };

        if nodes.is_empty() {
            tracing::debug!("No transcript rows rendered for {}", video_id);
            return None;
        }

        let lines: Vec<TranscriptLine> = nodes.into_iter().filter_map(|node| segment_line(page, node)).collect();
        tracing::debug!("Read {} rendered transcript row(s)", lines.len());
        Some(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{engine_with, FakePage};
    use std::sync::Arc;

    const SEGMENT: &str = "ytd-transcript-search-panel-renderer ytd-transcript-segment-renderer";
    const TABLIST: &str = r#"chip-bar-view-model[role="tablist"]"#;
    const TAB: &str = r#"button[role="tab"]"#;

    fn add_segment(page: &FakePage, time: &str, text: &str) -> NodeId {
        page.with_dom(|dom| {
            let row = dom.add_node(SEGMENT);
            let stamp = dom.add_child(row, ".segment-timestamp");
            dom.set_text(stamp, time);
            let body = dom.add_child(row, ".segment-text");
            dom.set_text(body, text);
            row
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_rows_already_on_page() {
        let page = Arc::new(FakePage::new());
        add_segment(&page, " 0:01 ", "hello   world");
        add_segment(&page, "0:05", "   ");
        add_segment(&page, "0:09", "bye");

        let engine = engine_with(page.clone(), crate::http::MockHttpClient::new());
        let lines = RenderedPanelStrategy::new()
            .fetch_lines(engine.context(), "vid")
            .await
            .unwrap();

        assert_eq!(lines, vec![TranscriptLine::new("0:01", "hello world"), TranscriptLine::new("0:09", "bye")]);
        assert!(page.clicks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_panel_from_overflow_menu() {
        let page = Arc::new(FakePage::new());
        let overflow = page.with_dom(|dom| dom.add_node(OVERFLOW_SELECTORS[0]));
        page.on_click(overflow, |dom| {
            let item = dom.add_node(TRANSCRIPT_BUTTON_SELECTORS[2]);
            dom.on_click(item, |dom| {
                let row = dom.add_node(SEGMENT);
                let stamp = dom.add_child(row, ".cue-time");
                dom.set_text(stamp, "1:00");
                let body = dom.add_child(row, "yt-formatted-string");
                dom.set_text(body, "from the menu");
            });
        });

        let engine = engine_with(page.clone(), crate::http::MockHttpClient::new());
        let lines = RenderedPanelStrategy::new()
            .fetch_lines(engine.context(), "vid")
            .await
            .unwrap();

        assert_eq!(lines, vec![TranscriptLine::new("1:00", "from the menu")]);
        assert_eq!(page.clicks().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switches_from_active_chapters_tab() {
        let page = Arc::new(FakePage::new());
        add_segment(&page, "0:00", "intro");
        let (chapters, transcript) = page.with_dom(|dom| {
            let tablist = dom.add_node(TABLIST);
            let chapters = dom.add_child(tablist, TAB);
            dom.set_attribute(chapters, "aria-label", "Chapitres");
            dom.set_attribute(chapters, "aria-selected", "true");
            let transcript = dom.add_child(tablist, TAB);
            dom.set_text(transcript, "Transcripción");
            dom.set_attribute(transcript, "aria-selected", "false");
            (chapters, transcript)
        });

        let engine = engine_with(page.clone(), crate::http::MockHttpClient::new());
        RenderedPanelStrategy::new()
            .fetch_lines(engine.context(), "vid")
            .await
            .unwrap();

        assert_eq!(page.clicks(), vec![chapters, transcript]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_selected_transcript_tab_is_left_alone() {
        let page = Arc::new(FakePage::new());
        add_segment(&page, "0:00", "intro");
        page.with_dom(|dom| {
            let tablist = dom.add_node(TABLIST);
            let transcript = dom.add_child(tablist, "tp-yt-paper-tab");
            dom.set_attribute(transcript, "aria-label", "Transcript");
            dom.set_attribute(transcript, "aria-selected", "true");
        });

        let engine = engine_with(page.clone(), crate::http::MockHttpClient::new());
        RenderedPanelStrategy::new()
            .fetch_lines(engine.context(), "vid")
            .await
            .unwrap();

        assert!(page.clicks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rows_rendered_after_mutation() {
        let page = Arc::new(FakePage::new());
        let button = page.with_dom(|dom| dom.add_node(TRANSCRIPT_BUTTON_SELECTORS[0]));
        let delayed = page.clone();
        page.on_click(button, move |_| {
            let delayed = delayed.clone();
            tokio::spawn(async move {
                sleep(Duration::from_millis(2500)).await;
                add_segment(&delayed, "0:03", "late row");
            });
        });

        let engine = engine_with(page.clone(), crate::http::MockHttpClient::new());
        let lines = RenderedPanelStrategy::new()
            .fetch_lines(engine.context(), "vid")
            .await
            .unwrap();

        assert_eq!(lines, vec![TranscriptLine::new("0:03", "late row")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_to_open_gives_no_result() {
        let page = Arc::new(FakePage::new());
        let engine = engine_with(page.clone(), crate::http::MockHttpClient::new());
        assert!(RenderedPanelStrategy::new()
            .fetch_lines(engine.context(), "vid")
            .await
            .is_none());
    }
}
