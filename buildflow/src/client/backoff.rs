//! Retry-with-backoff wrapper around a [`ModelInvoker`].

use futures::StreamExt;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::output::{finish_answer, ModelOutput};
use super::retry::{DelaySource, RetryDecision, RetryEnvelope};
use super::{InvokeError, ModelAnswer, ModelChunk, ModelInvoker, ModelRequest, RateLimitCountdown};
use crate::config::ClientConfig;
use crate::errors::ClientError;
use crate::events::StageReporter;

#[allow(clippy::expect_used)]
static WAIT_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)retry\s+(?:in|after)\s+(\d+(?:\.\d+)?)\s*(ms|milliseconds?|s|secs?|seconds?)?\b")
        .expect("valid pattern")
});

/// Extracts a server wait from text like "Please retry in 7.5s".
#[must_use]
pub fn parse_wait_hint(message: &str) -> Option<Duration> {
    let caps = WAIT_HINT.captures(message)?;
    let amount: f64 = caps.get(1)?.as_str().parse().ok()?;
    let is_ms = caps
        .get(2)
        .is_some_and(|unit| unit.as_str().to_ascii_lowercase().starts_with('m'));
    let secs = if is_ms { amount / 1000.0 } else { amount };
    Duration::try_from_secs_f64(secs).ok()
}

/// Calls a model with classification, backoff and a shared countdown.
///
/// Clones share the invoker and the countdown.
#[derive(Clone)]
pub struct BackoffClient {
    invoker: Arc<dyn ModelInvoker>,
    config: Arc<ClientConfig>,
    countdown: RateLimitCountdown,
    unmetered: bool,
}

impl BackoffClient {
    /// Creates a client.
    #[must_use]
    pub fn new(invoker: Arc<dyn ModelInvoker>, config: ClientConfig) -> Self {
        let unmetered = config.unmetered;
        Self {
            invoker,
            config: Arc::new(config),
            countdown: RateLimitCountdown::new(),
            unmetered,
        }
    }

    /// Returns a clone with unmetered mode set, sharing the countdown.
    #[must_use]
    pub fn with_unmetered(&self, unmetered: bool) -> Self {
        Self {
            unmetered,
            ..self.clone()
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns whether the countdown is suppressed.
    #[must_use]
    pub const fn is_unmetered(&self) -> bool {
        self.unmetered
    }

    /// Returns the shared countdown.
    #[must_use]
    pub const fn countdown(&self) -> &RateLimitCountdown {
        &self.countdown
    }

    /// Seconds until the next attempt after a server-requested wait.
    #[must_use]
    pub fn seconds_remaining(&self) -> u64 {
        if self.unmetered {
            0
        } else {
            self.countdown.seconds_remaining()
        }
    }

    /// Classifies an invoker failure.
    #[must_use]
    pub fn classify(&self, error: InvokeError) -> ClientError {
        match error {
            InvokeError::Network(message) => ClientError::Network { message },
            InvokeError::Status {
                status,
                message,
                retry_after,
            } => {
                let retry_after = if status == 429 {
                    retry_after.or_else(|| parse_wait_hint(&message))
                } else {
                    None
                };
                ClientError::Api {
                    status,
                    retryable: self.config.is_retryable_status(status),
                    message,
                    retry_after,
                }
            }
        }
    }

    /// Runs `request` until it succeeds, fails fatally or runs out of retries.
    ///
    /// Reasoning and code fragments are forwarded through `reporter` as they
    /// arrive; token usage is recorded on it.
    ///
    /// # Errors
    ///
    /// Returns the last classified error, or [`ClientError::Cancelled`] when
    /// the build is cancelled.
    pub async fn call(
        &self,
        request: &ModelRequest,
        reporter: &StageReporter,
    ) -> Result<ModelOutput, ClientError> {
        let mut envelope = RetryEnvelope::new();

        loop {
            if reporter.is_cancelled() {
                return Err(ClientError::Cancelled);
            }

            let error = match self.attempt(request, reporter).await {
                Ok(answer) => {
                    self.countdown.clear();
                    reporter.record_usage(answer.usage);
                    let output = finish_answer(&answer.text, answer.usage, request.response_mode)?;
                    for block in &output.reasoning {
                        reporter.reasoning(block).await;
                    }
                    debug!(
                        label = %request.label,
                        retries = envelope.attempt,
                        tokens = answer.usage.total(),
                        "Model call succeeded"
                    );
                    return Ok(output);
                }
                Err(ClientError::Cancelled) => return Err(ClientError::Cancelled),
                Err(error) => error,
            };

            match envelope.decide(&error, &self.config) {
                RetryDecision::Retry(delay, source) => {
                    if source == DelaySource::Server && !self.unmetered {
                        self.countdown.start(delay);
                    }
                    warn!(
                        label = %request.label,
                        attempt = envelope.attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        status = ?error.status(),
                        server_wait = source == DelaySource::Server,
                        error = %error,
                        "Retrying model call"
                    );
                    tokio::select! {
                        biased;
                        () = reporter.cancel_token().cancelled() => return Err(ClientError::Cancelled),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                RetryDecision::GiveUp => {
                    info!(
                        label = %request.label,
                        retries = envelope.attempt,
                        waited_ms = u64::try_from(envelope.total_delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "Model call retries exhausted"
                    );
                    return Err(error);
                }
                RetryDecision::NotRetryable => {
                    info!(label = %request.label, error = %error, "Model call failed");
                    return Err(error);
                }
            }
        }
    }

    async fn attempt(
        &self,
        request: &ModelRequest,
        reporter: &StageReporter,
    ) -> Result<ModelAnswer, ClientError> {
        let mut stream = self.invoker.invoke(request);
        loop {
            let chunk = tokio::select! {
                biased;
                () = reporter.cancel_token().cancelled() => return Err(ClientError::Cancelled),
                chunk = stream.next() => chunk,
            };
            match chunk {
                Some(ModelChunk::Reasoning(text)) => {
                    reporter.reasoning(&text).await;
                }
                Some(ModelChunk::Code(text)) => {
                    reporter.code_fragment(&text).await;
                }
                Some(ModelChunk::Final(answer)) => return Ok(answer),
                Some(ModelChunk::Error(error)) => return Err(self.classify(error)),
                None => return Err(ClientError::network("model stream ended without an answer")),
            }
        }
    }
}

impl std::fmt::Debug for BackoffClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackoffClient")
            .field("config", &self.config)
            .field("unmetered", &self.unmetered)
            .finish_non_exhaustive()
    }
}
