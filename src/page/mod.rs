use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;

pub mod snapshot;

pub use snapshot::HtmlSnapshot;

use crate::utils::poll_until;

/// Opaque handle to an element of the host page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u64);

/// Read access to the page currently showing the video, plus the few
/// interactions the rendered-panel and token-capture paths need.
///
/// Selectors are CSS selectors as understood by the host document.
#[async_trait]
pub trait PageAccessor: Send + Sync {
    /// Scheme and host of the current page, e.g. `https://www.youtube.com`
    fn origin(&self) -> String;

    /// Viewer language preference, e.g. `en-us`
    fn preferred_language(&self) -> Option<String>;

    /// Initial-state objects embedded in the page (`ytInitialData` and friends)
    fn initial_data(&self) -> Vec<Value>;

    /// Player configuration embedded in the page
    fn player_response(&self) -> Option<Value>;

    /// A page configuration value such as `INNERTUBE_API_KEY`
    fn config_value(&self, key: &str) -> Option<Value>;

    /// Serialized markup of the current document
    fn markup(&self) -> Option<String>;

    /// All elements matching `selector`, in document order
    fn query_all(&self, selector: &str) -> Vec<NodeId>;

    /// All descendants of `scope` matching `selector`, in document order
    fn query_within(&self, scope: NodeId, selector: &str) -> Vec<NodeId>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    fn text_content(&self, node: NodeId) -> Option<String>;

    fn click(&self, node: NodeId);

    /// Wait until the document changes or `timeout` elapses; `false` on timeout
    async fn wait_for_mutation(&self, timeout: Duration) -> bool;

    /// First element matching `selector`
    fn query_first(&self, selector: &str) -> Option<NodeId> {
        self.query_all(selector).into_iter().next()
    }

    /// First descendant of `scope` matching the earliest selector in `selectors` that has a match
    fn query_first_within(&self, scope: NodeId, selectors: &[&str]) -> Option<NodeId> {
        selectors
            .iter()
            .find_map(|selector| self.query_within(scope, selector).into_iter().next())
    }
}

/// Wait for `find` to locate an element, polling at `interval` up to `timeout`
pub async fn wait_for_element<F>(interval: Duration, timeout: Duration, find: F) -> Option<NodeId>
where
    F: FnMut() -> Option<NodeId>,
{
    poll_until(interval, timeout, find).await
}

/// Recently loaded resources, as exposed by the browser's resource-timing buffer
pub trait NetworkLog: Send + Sync {
    /// URLs of recorded resource loads, oldest first
    fn entries(&self) -> Vec<String>;

    /// Drop all recorded entries
    fn clear(&self);
}

/// Network log kept in memory; hosts record the URLs they load into it
#[derive(Debug, Default)]
pub struct MemoryNetworkLog {
    entries: Mutex<Vec<String>>,
}

impl MemoryNetworkLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, url: impl Into<String>) {
        self.lock().push(url.into());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl NetworkLog for MemoryNetworkLog {
    fn entries(&self) -> Vec<String> {
        self.lock().clone()
    }

    fn clear(&self) {
        self.lock().clear();
    }
}
