//! In-memory page and engine builders shared by the unit tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;

use crate::config::EngineConfig;
use crate::engine::token::SUBTITLE_TOGGLE_SELECTOR;
use crate::engine::TranscriptEngine;
use crate::http::MockHttpClient;
use crate::page::{MemoryNetworkLog, NodeId, PageAccessor};

type ClickHandler = Box<dyn FnMut(&mut FakeDom) + Send>;

/// Minimal element tree: selectors are matched by exact registration, not parsed
#[derive(Default)]
pub(crate) struct FakeDom {
    next_id: u64,
    roots: Vec<(String, NodeId)>,
    children: HashMap<NodeId, Vec<(String, NodeId)>>,
    attributes: HashMap<(NodeId, String), String>,
    text: HashMap<NodeId, String>,
    clicks: Vec<NodeId>,
    handlers: HashMap<NodeId, ClickHandler>,
}

impl FakeDom {
    fn allocate(&mut self) -> NodeId {
        self.next_id += 1;
        NodeId(self.next_id)
    }

    /// Add an element that document-wide queries for `selector` find
    pub fn add_node(&mut self, selector: &str) -> NodeId {
        let node = self.allocate();
        self.roots.push((selector.to_string(), node));
        node
    }

    /// Add an element under `parent` that scoped queries for `selector` find
    pub fn add_child(&mut self, parent: NodeId, selector: &str) -> NodeId {
        let node = self.allocate();
        self.children
            .entry(parent)
            .or_default()
            .push((selector.to_string(), node));
        node
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) {
        self.text.insert(node, text.to_string());
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        self.attributes.insert((node, name.to_string()), value.to_string());
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.attributes.get(&(node, name.to_string())).map(String::as_str)
    }

    pub fn on_click(&mut self, node: NodeId, handler: impl FnMut(&mut FakeDom) + Send + 'static) {
        self.handlers.insert(node, Box::new(handler));
    }

    fn query(&self, selector: &str) -> Vec<NodeId> {
        self.roots
            .iter()
            .filter(|(registered, _)| registered == selector)
            .map(|(_, node)| *node)
            .collect()
    }

    fn query_within(&self, scope: NodeId, selector: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        for (registered, node) in self.children.get(&scope).into_iter().flatten() {
            if registered == selector {
                found.push(*node);
            }
            found.extend(self.query_within(*node, selector));
        }
        found
    }

    fn click(&mut self, node: NodeId) {
        self.clicks.push(node);
        if let Some(mut handler) = self.handlers.remove(&node) {
            handler(self);
            self.handlers.entry(node).or_insert(handler);
        }
    }
}

/// `PageAccessor` over a [`FakeDom`] plus fixed page state
pub(crate) struct FakePage {
    origin: String,
    language: Option<String>,
    initial_data: Vec<Value>,
    player_response: Option<Value>,
    config: HashMap<String, Value>,
    markup: Option<String>,
    dom: Mutex<FakeDom>,
    changed: Notify,
}

impl FakePage {
    pub fn new() -> Self {
        Self {
            origin: "https://www.youtube.com".to_string(),
            language: None,
            initial_data: Vec::new(),
            player_response: None,
            config: HashMap::new(),
            markup: None,
            dom: Mutex::new(FakeDom::default()),
            changed: Notify::new(),
        }
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    pub fn with_initial_data(mut self, data: Value) -> Self {
        self.initial_data.push(data);
        self
    }

    pub fn with_player_response(mut self, player_response: Value) -> Self {
        self.player_response = Some(player_response);
        self
    }

    pub fn with_config(mut self, key: &str, value: Value) -> Self {
        self.config.insert(key.to_string(), value);
        self
    }

    /// Page configuration with a usable API key and client context
    pub fn with_api_credentials(self) -> Self {
        self.with_config("INNERTUBE_API_KEY", Value::from("KEY"))
            .with_config("INNERTUBE_CONTEXT", serde_json::json!({"client": {"hl": "en"}}))
            .with_config("INNERTUBE_CONTEXT_CLIENT_NAME", Value::from(1))
            .with_config("INNERTUBE_CONTEXT_CLIENT_VERSION", Value::from("2.20251030"))
    }

    pub fn with_markup(mut self, markup: &str) -> Self {
        self.markup = Some(markup.to_string());
        self
    }

    fn lock(&self) -> MutexGuard<'_, FakeDom> {
        self.dom.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Change the DOM and wake anyone waiting for a mutation
    pub fn with_dom<R>(&self, change: impl FnOnce(&mut FakeDom) -> R) -> R {
        let result = change(&mut self.lock());
        self.changed.notify_one();
        result
    }

    pub fn on_click(&self, node: NodeId, handler: impl FnMut(&mut FakeDom) + Send + 'static) {
        self.lock().on_click(node, handler);
    }

    /// Every click so far, in order
    pub fn clicks(&self) -> Vec<NodeId> {
        self.lock().clicks.clone()
    }
}

#[async_trait]
impl PageAccessor for FakePage {
    fn origin(&self) -> String {
        self.origin.clone()
    }

    fn preferred_language(&self) -> Option<String> {
        self.language.clone()
    }

    fn initial_data(&self) -> Vec<Value> {
        self.initial_data.clone()
    }

    fn player_response(&self) -> Option<Value> {
        self.player_response.clone()
    }

    fn config_value(&self, key: &str) -> Option<Value> {
        self.config.get(key).cloned()
    }

    fn markup(&self) -> Option<String> {
        self.markup.clone()
    }

    fn query_all(&self, selector: &str) -> Vec<NodeId> {
        self.lock().query(selector)
    }

    fn query_within(&self, scope: NodeId, selector: &str) -> Vec<NodeId> {
        self.lock().query_within(scope, selector)
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.lock().attribute(node, name).map(str::to_string)
    }

    fn text_content(&self, node: NodeId) -> Option<String> {
        self.lock().text.get(&node).cloned()
    }

    fn click(&self, node: NodeId) {
        self.lock().click(node);
        self.changed.notify_one();
    }

    async fn wait_for_mutation(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.changed.notified()).await.is_ok()
    }
}

/// Caption request the fake player issues when subtitles come back on
pub(crate) const LOGGED_CAPTION_URL: &str = "https://www.youtube.com/api/timedtext?v=vid&lang=en&pot=TOKEN";

/// Give `page` a subtitle toggle that flips `aria-pressed` on each click and
/// logs [`LOGGED_CAPTION_URL`] on the second one. With `answers_second_click`
/// off, the second click is ignored.
pub(crate) fn with_subtitle_toggle(
    page: FakePage,
    log: Arc<MemoryNetworkLog>,
    pressed: bool,
    answers_second_click: bool,
) -> (Arc<FakePage>, NodeId) {
    let page = Arc::new(page);
    let toggle = page.with_dom(|dom| {
        let toggle = dom.add_node(SUBTITLE_TOGGLE_SELECTOR);
        dom.set_attribute(toggle, "aria-pressed", if pressed { "true" } else { "false" });
        toggle
    });

    let mut clicks = 0;
    page.on_click(toggle, move |dom| {
        clicks += 1;
        if clicks == 2 && !answers_second_click {
            return;
        }
        let now_pressed = dom.attribute(toggle, "aria-pressed") == Some("true");
        dom.set_attribute(toggle, "aria-pressed", if now_pressed { "false" } else { "true" });
        if clicks == 2 {
            log.record(LOGGED_CAPTION_URL);
        }
    });
    (page, toggle)
}

pub(crate) fn engine_with(page: Arc<FakePage>, http: MockHttpClient) -> TranscriptEngine {
    engine_with_log(page, http, Arc::new(MemoryNetworkLog::new()))
}

pub(crate) fn engine_with_log(
    page: Arc<FakePage>,
    http: MockHttpClient,
    network_log: Arc<MemoryNetworkLog>,
) -> TranscriptEngine {
    TranscriptEngine::new(page, Arc::new(http), network_log, EngineConfig::default())
}
