use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;

use super::{log_failure, TranscriptStrategy};
use crate::engine::{EngineContext, TranscriptLine};
use crate::http::HttpRequest;
use crate::parsers::{
    extract_param_from_markup, find_transcript_param, parse_transcript_response, ParsedTranscript,
};
use crate::{Result, TranscriptError};

/// Credentials and client identity read from page configuration
struct ApiCredentials {
    key: String,
    context: Value,
    client_name: Option<String>,
    client_version: Option<String>,
}

/// Calls the platform's internal `get_transcript` endpoint
pub struct StructuredEndpointStrategy;

impl StructuredEndpointStrategy {
    pub fn new() -> Self {
        Self
    }

    /// Find the request param for `video_id`: cache, page state, page markup,
    /// then a fresh copy of the watch page. Hits are cached right away.
    async fn discover_param(&self, ctx: &EngineContext, video_id: &str) -> Option<String> {
        if let Some(param) = ctx.state().params.get(video_id).cloned() {
            return Some(param);
        }

        let embedded = find_transcript_param(&ctx.page.initial_data())
            .map(|param| (param, "initial data"))
            .or_else(|| {
                ctx.page
                    .markup()
                    .as_deref()
                    .and_then(extract_param_from_markup)
                    .map(|param| (param, "page markup"))
            });

        let (param, source) = match embedded {
            Some(found) => found,
            None => (self.fetch_param_from_watch(ctx, video_id).await?, "watch page"),
        };

        tracing::debug!("Transcript param for {} found in {}", video_id, source);
        ctx.state().store_param(video_id, &param);
        Some(param)
    }

    async fn fetch_param_from_watch(&self, ctx: &EngineContext, video_id: &str) -> Option<String> {
        let url = format!(
            "{}/watch?v={}&bp=0",
            ctx.page.origin(),
            urlencoding::encode(video_id)
        );

        match ctx.http.fetch(HttpRequest::get(&url)).await {
            Ok(response) if response.is_success() => extract_param_from_markup(&response.body),
            Ok(response) => {
                tracing::debug!("Watch page fetch returned HTTP {}", response.status);
                None
            }
            Err(e) => {
                log_failure("Watch page fetch failed", &e);
                None
            }
        }
    }

    fn credentials(&self, ctx: &EngineContext) -> Option<ApiCredentials> {
        let key = ctx
            .page
            .config_value("INNERTUBE_API_KEY")
            .and_then(config_string)?;
        let context = ctx
            .page
            .config_value("INNERTUBE_CONTEXT")
            .filter(|context| !context.is_null())?;

        Some(ApiCredentials {
            key,
            context,
            client_name: ctx
                .page
                .config_value("INNERTUBE_CONTEXT_CLIENT_NAME")
                .and_then(config_string),
            client_version: ctx
                .page
                .config_value("INNERTUBE_CONTEXT_CLIENT_VERSION")
                .and_then(config_string),
        })
    }

    async fn request(
        &self,
        ctx: &EngineContext,
        credentials: &ApiCredentials,
        params: &str,
    ) -> Result<ParsedTranscript> {
        let url = format!(
            "{}/youtubei/v1/get_transcript?key={}",
            ctx.page.origin(),
            urlencoding::encode(&credentials.key)
        );
        let body = json!({ "context": credentials.context, "params": params });

        let mut request = HttpRequest::post(url, body.to_string()).header("Content-Type", "application/json");
        if let Some(name) = &credentials.client_name {
            request = request.header("X-Youtube-Client-Name", name);
        }
        if let Some(version) = &credentials.client_version {
            request = request.header("X-Youtube-Client-Version", version);
        }

        let response = ctx.http.fetch(request).await?;
        if !response.is_success() {
            return Err(TranscriptError::EndpointHttpError {
                status: response.status,
            }
            .into());
        }

        let data: Value = response.json()?;
        Ok(parse_transcript_response(&data))
    }

    /// Request `params` and keep any default param the response names
    async fn request_alternate(
        &self,
        ctx: &EngineContext,
        credentials: &ApiCredentials,
        video_id: &str,
        params: &str,
    ) -> Option<Vec<TranscriptLine>> {
        match self.request(ctx, credentials, params).await {
            Ok(parsed) => {
                if let Some(default) = &parsed.default_param {
                    ctx.state().store_param(video_id, default);
                }
                (!parsed.lines.is_empty()).then_some(parsed.lines)
            }
            Err(e) => {
                log_failure("Alternate transcript request failed", &e);
                None
            }
        }
    }
}

impl Default for StructuredEndpointStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranscriptStrategy for StructuredEndpointStrategy {
    fn name(&self) -> &'static str {
        "structured-endpoint"
    }

    fn description(&self) -> &'static str {
        "Internal transcript endpoint, using the request param embedded in the page"
    }

    async fn fetch_lines(&self, ctx: &EngineContext, video_id: &str) -> Option<Vec<TranscriptLine>> {
        let Some(params) = self.discover_param(ctx, video_id).await else {
            tracing::debug!("No transcript param for {}", video_id);
            return None;
        };
        let Some(credentials) = self.credentials(ctx) else {
            tracing::debug!("Page configuration lacks an API key or client context");
            return None;
        };

        let mut tried = HashSet::from([params.clone()]);
        let mut alternates = Vec::new();

        match self.request(ctx, &credentials, &params).await {
            Ok(first) => {
                {
                    let mut state = ctx.state();
                    if let Some(default) = &first.default_param {
                        state.store_param(video_id, default);
                    }
                    if !first.language_params.is_empty() {
                        state.languages.insert(video_id, first.language_params.clone());
                        for item in first.language_params.iter().filter(|item| item.selected) {
                            state.store_param(video_id, &item.params);
                        }
                    }
                }

                if !first.lines.is_empty() {
                    return Some(first.lines);
                }
                alternates.extend(first.language_params.into_iter().map(|item| item.params));
            }
            Err(e) => {
                log_failure("Transcript request failed", &e);
                return None;
            }
        }

        let cached: Vec<String> = ctx
            .state()
            .languages
            .get(video_id)
            .map(|items| items.iter().map(|item| item.params.clone()).collect())
            .unwrap_or_default();
        alternates.extend(cached);

        for params in alternates {
            if params.is_empty() || !tried.insert(params.clone()) {
                continue;
            }
            tracing::debug!("Retrying transcript request with an alternate language param");
            if let Some(lines) = self.request_alternate(ctx, &credentials, video_id, &params).await {
                return Some(lines);
            }
        }

        None
    }
}

/// Page configuration values may be strings or numbers
fn config_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
