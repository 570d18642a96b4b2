//! HTTP invoker for generate-content style model APIs.

use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::{
    ChunkStream, InvokeError, ModelAnswer, ModelChunk, ModelInvoker, ModelRequest, ResponseMode,
    MAX_SERVER_WAIT,
};
use crate::config::ModelConfig;
use crate::core::TokenUsage;

/// Calls `POST {base_url}/models/{model}:generateContent`.
///
/// Thought parts become reasoning chunks, executable-code parts become code
/// chunks and the remaining text is the final answer.
#[derive(Clone)]
pub struct HttpModelInvoker {
    http: reqwest::Client,
    config: ModelConfig,
    api_key: Option<String>,
}

impl HttpModelInvoker {
    /// Creates an invoker, reading the API key from `config.api_key_env`.
    #[must_use]
    pub fn from_env(config: ModelConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env).ok();
        Self::build(config, api_key)
    }

    /// Creates an invoker with an explicit API key.
    #[must_use]
    pub fn with_api_key(config: ModelConfig, api_key: impl Into<String>) -> Self {
        Self::build(config, Some(api_key.into()))
    }

    fn build(config: ModelConfig, api_key: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            config,
            api_key,
        }
    }

    /// Returns the request URL.
    #[must_use]
    pub fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn body(&self, request: &ModelRequest) -> Value {
        let mut generation = serde_json::Map::new();
        if request.response_mode == ResponseMode::Json {
            generation.insert("responseMimeType".into(), json!("application/json"));
        }
        if let Some(budget) = request.thinking_budget.or(self.config.thinking_budget) {
            generation.insert(
                "thinkingConfig".into(),
                json!({ "thinkingBudget": budget, "includeThoughts": true }),
            );
        }

        let mut body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
            "generationConfig": generation,
        });
        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|tool| {
                    let mut entry = serde_json::Map::new();
                    entry.insert(tool.clone(), json!({}));
                    Value::Object(entry)
                })
                .collect();
            body["tools"] = Value::Array(tools);
        }
        body
    }

    async fn send(
        http: reqwest::Client,
        url: String,
        api_key: Option<String>,
        body: Value,
    ) -> Vec<ModelChunk> {
        let mut req = http.post(&url).json(&body);
        if let Some(key) = api_key {
            req = req.header("x-goog-api-key", key);
        }

        let response = match req.send().await {
            Ok(response) => response,
            Err(e) => return vec![ModelChunk::Error(InvokeError::Network(e.to_string()))],
        };

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after_header(&response);
            let text = response.text().await.unwrap_or_default();
            let message = extract_error_message(&text).unwrap_or(text);
            debug!(status = status.as_u16(), %message, "Model API returned an error");
            return vec![ModelChunk::Error(InvokeError::Status {
                status: status.as_u16(),
                message,
                retry_after,
            })];
        }

        match response.json::<GenerateResponse>().await {
            Ok(parsed) => parsed.into_chunks(),
            Err(e) => vec![ModelChunk::Error(InvokeError::Network(format!(
                "malformed response body: {e}"
            )))],
        }
    }
}

impl ModelInvoker for HttpModelInvoker {
    fn invoke(&self, request: &ModelRequest) -> ChunkStream {
        let fut = Self::send(
            self.http.clone(),
            self.url(),
            self.api_key.clone(),
            self.body(request),
        );
        futures::stream::once(fut)
            .flat_map(futures::stream::iter)
            .boxed()
    }
}

impl std::fmt::Debug for HttpModelInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpModelInvoker")
            .field("url", &self.url())
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Reads a numeric `Retry-After` header in seconds.
fn parse_retry_after_header(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after)
}

/// Delay-seconds form only; HTTP dates are ignored.
fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs = value.trim().parse::<f64>().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(Duration::try_from_secs_f64(secs).map_or(MAX_SERVER_WAIT, |d| d.min(MAX_SERVER_WAIT)))
}

fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
    #[serde(default)]
    executable_code: Option<ExecutableCode>,
}

#[derive(Debug, Deserialize)]
struct ExecutableCode {
    #[serde(default)]
    code: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    #[serde(default)]
    thoughts_token_count: u64,
}

impl GenerateResponse {
    fn into_chunks(self) -> Vec<ModelChunk> {
        let mut chunks = Vec::new();
        let mut answer = String::new();
        let parts = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts)
            .unwrap_or_default();

        for part in parts {
            if let Some(code) = part.executable_code {
                chunks.push(ModelChunk::Code(code.code));
            }
            match part.text {
                Some(text) if part.thought => chunks.push(ModelChunk::Reasoning(text)),
                Some(text) => answer.push_str(&text),
                None => {}
            }
        }

        let usage = self.usage_metadata.map_or_else(TokenUsage::default, |u| {
            TokenUsage::new(u.prompt_token_count, u.candidates_token_count, u.thoughts_token_count)
        });
        chunks.push(ModelChunk::Final(ModelAnswer::new(answer).with_usage(usage)));
        chunks
    }
}
