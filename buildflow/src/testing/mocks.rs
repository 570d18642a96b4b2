//! Scripted collaborators for testing.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use super::fixtures;
use crate::artifacts::CodeBundle;
use crate::client::{ChunkStream, InvokeError, ModelAnswer, ModelChunk, ModelInvoker, ModelRequest};
use crate::core::TokenUsage;
use crate::errors::BuildflowError;
use crate::stages::Deployer;

/// One scripted model invocation.
#[derive(Debug, Clone)]
pub struct Script {
    fragments: Vec<ModelChunk>,
    outcome: Result<ModelAnswer, InvokeError>,
    delay: Option<Duration>,
}

impl Script {
    /// Answers with `text`.
    #[must_use]
    pub fn answer(text: impl Into<String>) -> Self {
        Self {
            fragments: Vec::new(),
            outcome: Ok(ModelAnswer::new(text)),
            delay: None,
        }
    }

    /// Answers with `value` serialized as JSON.
    #[must_use]
    pub fn json(value: Value) -> Self {
        Self::answer(value.to_string())
    }

    /// Fails with `error`.
    #[must_use]
    pub const fn error(error: InvokeError) -> Self {
        Self {
            fragments: Vec::new(),
            outcome: Err(error),
            delay: None,
        }
    }

    /// Streams a reasoning fragment before the outcome.
    #[must_use]
    pub fn with_reasoning(mut self, text: impl Into<String>) -> Self {
        self.fragments.push(ModelChunk::Reasoning(text.into()));
        self
    }

    /// Streams a code fragment before the outcome.
    #[must_use]
    pub fn with_code(mut self, text: impl Into<String>) -> Self {
        self.fragments.push(ModelChunk::Code(text.into()));
        self
    }

    /// Reports token usage with the answer.
    #[must_use]
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        if let Ok(answer) = &mut self.outcome {
            answer.usage = usage;
        }
        self
    }

    /// Waits before producing anything.
    #[must_use]
    pub const fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn into_stream(self) -> ChunkStream {
        let mut chunks = self.fragments;
        chunks.push(match self.outcome {
            Ok(answer) => ModelChunk::Final(answer),
            Err(error) => ModelChunk::Error(error),
        });
        let delay = self.delay;
        stream::once(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            stream::iter(chunks)
        })
        .flatten()
        .boxed()
    }
}

#[derive(Debug, Default)]
struct ScriptBook {
    queued: HashMap<String, VecDeque<Script>>,
    fallback: HashMap<String, Script>,
    requests: Vec<ModelRequest>,
}

/// A [`ModelInvoker`] that replays scripts keyed by request label.
///
/// Scripts queued with [`push`](Self::push) are used once each, in order;
/// after that the [`always`](Self::always) script for the label applies.
/// A label with nothing scripted fails with a non-retryable 400.
#[derive(Debug, Default)]
pub struct ScriptedInvoker {
    book: Mutex<ScriptBook>,
}

impl ScriptedInvoker {
    /// Creates an invoker with nothing scripted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a one-shot script for `label`.
    pub fn push(&self, label: impl Into<String>, script: Script) {
        self.book
            .lock()
            .queued
            .entry(label.into())
            .or_default()
            .push_back(script);
    }

    /// Sets the script used for `label` once its queue is empty.
    pub fn always(&self, label: impl Into<String>, script: Script) {
        self.book.lock().fallback.insert(label.into(), script);
    }

    /// Returns how many times `label` was invoked.
    #[must_use]
    pub fn call_count(&self, label: &str) -> usize {
        self.book
            .lock()
            .requests
            .iter()
            .filter(|r| r.label == label)
            .count()
    }

    /// Returns the total number of invocations.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.book.lock().requests.len()
    }

    /// Returns the requests made for `label`, oldest first.
    #[must_use]
    pub fn requests(&self, label: &str) -> Vec<ModelRequest> {
        self.book
            .lock()
            .requests
            .iter()
            .filter(|r| r.label == label)
            .cloned()
            .collect()
    }
}

impl ModelInvoker for ScriptedInvoker {
    fn invoke(&self, request: &ModelRequest) -> ChunkStream {
        let script = {
            let mut book = self.book.lock();
            book.requests.push(request.clone());
            book.queued
                .get_mut(&request.label)
                .and_then(VecDeque::pop_front)
                .or_else(|| book.fallback.get(&request.label).cloned())
        };
        script
            .unwrap_or_else(|| {
                Script::error(InvokeError::status(
                    400,
                    format!("No script for '{}'", request.label),
                ))
            })
            .into_stream()
    }
}

/// A [`Deployer`] with fixed per-provider outcomes.
///
/// Providers without an outcome fail. Every call is recorded.
#[derive(Debug)]
pub struct StaticDeployer {
    outcomes: HashMap<String, Result<Value, String>>,
    healthy: bool,
    deploys: Mutex<Vec<String>>,
    health_checks: Mutex<Vec<String>>,
    teardowns: Mutex<Vec<String>>,
}

impl Default for StaticDeployer {
    fn default() -> Self {
        Self {
            outcomes: HashMap::new(),
            healthy: true,
            deploys: Mutex::new(Vec::new()),
            health_checks: Mutex::new(Vec::new()),
            teardowns: Mutex::new(Vec::new()),
        }
    }
}

impl StaticDeployer {
    /// Creates a deployer where every provider fails.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `provider` succeed with a well-formed result.
    #[must_use]
    pub fn succeed(self, provider: &str) -> Self {
        self.respond(provider, fixtures::deployment_json(provider))
    }

    /// Makes `provider` return `raw`.
    #[must_use]
    pub fn respond(mut self, provider: &str, raw: Value) -> Self {
        self.outcomes.insert(provider.to_string(), Ok(raw));
        self
    }

    /// Makes `provider` fail with `message`.
    #[must_use]
    pub fn fail(mut self, provider: &str, message: impl Into<String>) -> Self {
        self.outcomes.insert(provider.to_string(), Err(message.into()));
        self
    }

    /// Sets the health-check answer.
    #[must_use]
    pub const fn healthy(mut self, healthy: bool) -> Self {
        self.healthy = healthy;
        self
    }

    /// Returns the providers deployed to, in order.
    #[must_use]
    pub fn deploy_calls(&self) -> Vec<String> {
        self.deploys.lock().clone()
    }

    /// Returns the endpoints health-checked, in order.
    #[must_use]
    pub fn health_checks(&self) -> Vec<String> {
        self.health_checks.lock().clone()
    }

    /// Returns the deployment ids torn down, in order.
    #[must_use]
    pub fn teardowns(&self) -> Vec<String> {
        self.teardowns.lock().clone()
    }
}

#[async_trait]
impl Deployer for StaticDeployer {
    async fn deploy(&self, _bundle: &CodeBundle, provider: &str) -> Result<Value, BuildflowError> {
        self.deploys.lock().push(provider.to_string());
        match self.outcomes.get(provider) {
            Some(Ok(raw)) => Ok(raw.clone()),
            Some(Err(message)) => Err(BuildflowError::Deployment(message.clone())),
            None => Err(BuildflowError::Deployment(format!("Unknown provider: {provider}"))),
        }
    }

    async fn health_check(&self, endpoint: &str) -> bool {
        self.health_checks.lock().push(endpoint.to_string());
        self.healthy
    }

    async fn teardown(&self, deployment_id: &str) -> Result<(), BuildflowError> {
        self.teardowns.lock().push(deployment_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(invoker: &ScriptedInvoker, label: &str) -> Vec<ModelChunk> {
        invoker.invoke(&ModelRequest::new(label, "p")).collect().await
    }

    #[tokio::test]
    async fn test_queue_then_fallback() {
        let invoker = ScriptedInvoker::new();
        invoker.push("a", Script::answer("first"));
        invoker.always("a", Script::answer("again"));

        assert_eq!(collect(&invoker, "a").await, vec![ModelChunk::Final(ModelAnswer::new("first"))]);
        assert_eq!(collect(&invoker, "a").await, vec![ModelChunk::Final(ModelAnswer::new("again"))]);
        assert_eq!(collect(&invoker, "a").await, vec![ModelChunk::Final(ModelAnswer::new("again"))]);
        assert_eq!(invoker.call_count("a"), 3);
    }

    #[tokio::test]
    async fn test_unscripted_label_fails() {
        let invoker = ScriptedInvoker::new();
        let chunks = collect(&invoker, "nothing").await;

        assert!(matches!(
            &chunks[..],
            [ModelChunk::Error(InvokeError::Status { status: 400, .. })]
        ));
    }

    #[tokio::test]
    async fn test_fragments_precede_outcome() {
        let invoker = ScriptedInvoker::new();
        invoker.push("a", Script::answer("done").with_reasoning("hmm").with_code("x = 1"));

        let chunks = collect(&invoker, "a").await;
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], ModelChunk::Reasoning("hmm".into()));
        assert_eq!(chunks[1], ModelChunk::Code("x = 1".into()));
    }

    #[tokio::test]
    async fn test_static_deployer_records_calls() {
        let deployer = StaticDeployer::new().succeed("vercel").fail("fly", "no capacity");
        let spec = fixtures::requirements_spec(3);
        let bundle = fixtures::code_bundle(&fixtures::architecture_document(&spec), &[true]);

        assert!(deployer.deploy(&bundle, "fly").await.is_err());
        assert!(deployer.deploy(&bundle, "vercel").await.is_ok());
        assert!(deployer.deploy(&bundle, "render").await.is_err());
        assert_eq!(deployer.deploy_calls(), vec!["fly", "vercel", "render"]);
    }
}
