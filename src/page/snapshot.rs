use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};
use std::time::Duration;
use url::Url;

use super::{NodeId, PageAccessor};
use crate::http::{HttpClient, HttpRequest};
use crate::{Result, TranscriptError};

/// A watch page captured once over HTTP.
///
/// Exposes the state objects embedded in the page's inline scripts. There is no
/// live document behind it, so element queries find nothing and the document
/// never changes.
#[derive(Debug, Clone)]
pub struct HtmlSnapshot {
    origin: String,
    html: String,
    preferred_language: Option<String>,
    initial_data: Vec<Value>,
    player_response: Option<Value>,
    page_config: Map<String, Value>,
}

impl HtmlSnapshot {
    /// Download `url` and capture it
    pub async fn fetch(
        http: &dyn HttpClient,
        url: &str,
        preferred_language: Option<String>,
    ) -> Result<Self> {
        tracing::debug!("Fetching watch page: {}", url);

        let response = http.fetch(HttpRequest::get(url)).await?;
        if !response.is_success() {
            return Err(TranscriptError::EndpointHttpError {
                status: response.status,
            }
            .into());
        }

        Self::parse(url, response.body, preferred_language)
    }

    /// Capture already-downloaded markup served from `url`
    pub fn parse(url: &str, html: String, preferred_language: Option<String>) -> Result<Self> {
        let parsed = Url::parse(url)
            .map_err(|_| anyhow::anyhow!("Invalid URL format: {}", url))?;
        let origin = parsed.origin().ascii_serialization();

        let initial_data_re = Regex::new(
            r#"(?:var\s+ytInitialData|window\[["']ytInitialData["']\]|window\.ytInitialData)\s*=\s*"#,
        )?;
        let player_re = Regex::new(
            r#"(?:var\s+ytInitialPlayerResponse|window\[["']ytInitialPlayerResponse["']\]|window\.ytInitialPlayerResponse)\s*=\s*"#,
        )?;
        let config_re = Regex::new(r"ytcfg\.set\(\s*")?;

        let initial_data = json_values_after(&html, &initial_data_re);
        let player_response = json_values_after(&html, &player_re).into_iter().next();

        let mut page_config = Map::new();
        for value in json_values_after(&html, &config_re) {
            if let Value::Object(entries) = value {
                page_config.extend(entries);
            }
        }

        tracing::debug!(
            "Captured page: {} initial-data block(s), player response: {}, {} config key(s)",
            initial_data.len(),
            player_response.is_some(),
            page_config.len()
        );

        Ok(Self {
            origin,
            html,
            preferred_language,
            initial_data,
            player_response,
            page_config,
        })
    }
}

/// Parse the JSON object that immediately follows each match of `marker`
fn json_values_after(html: &str, marker: &Regex) -> Vec<Value> {
    marker
        .find_iter(html)
        .filter_map(|found| {
            let rest = &html[found.end()..];
            if !rest.starts_with('{') {
                return None;
            }
            let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
            match stream.next() {
                Some(Ok(value)) => Some(value),
                Some(Err(e)) => {
                    tracing::debug!("Skipping unparseable embedded JSON: {}", e);
                    None
                }
                None => None,
            }
        })
        .collect()
}

#[async_trait]
impl PageAccessor for HtmlSnapshot {
    fn origin(&self) -> String {
        self.origin.clone()
    }

    fn preferred_language(&self) -> Option<String> {
        self.preferred_language.clone()
    }

    fn initial_data(&self) -> Vec<Value> {
        self.initial_data.clone()
    }

    fn player_response(&self) -> Option<Value> {
        self.player_response.clone()
    }

    fn config_value(&self, key: &str) -> Option<Value> {
        self.page_config.get(key).cloned()
    }

    fn markup(&self) -> Option<String> {
        Some(self.html.clone())
    }

    fn query_all(&self, _selector: &str) -> Vec<NodeId> {
        Vec::new()
    }

    fn query_within(&self, _scope: NodeId, _selector: &str) -> Vec<NodeId> {
        Vec::new()
    }

    fn attribute(&self, _node: NodeId, _name: &str) -> Option<String> {
        None
    }

    fn text_content(&self, _node: NodeId) -> Option<String> {
        None
    }

    fn click(&self, node: NodeId) {
        tracing::debug!("Ignoring click on {:?}: snapshot pages are static", node);
    }

    async fn wait_for_mutation(&self, _timeout: Duration) -> bool {
        false
    }
}
