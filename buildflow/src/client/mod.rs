//! Backoff client for the external model API.
//!
//! [`BackoffClient`] wraps a [`ModelInvoker`], classifies its failures as
//! retryable or fatal, retries with exponential delay (or the server's
//! requested wait) and publishes a shared [`RateLimitCountdown`].

mod backoff;
mod countdown;
#[cfg(feature = "http")]
pub mod http;
mod invoker;
mod output;
mod retry;

pub use backoff::{parse_wait_hint, BackoffClient};
pub use countdown::RateLimitCountdown;
pub use invoker::{
    ChunkStream, InvokeError, ModelAnswer, ModelChunk, ModelInvoker, ModelRequest, ResponseMode,
};
pub use output::{finish_answer, parse_json_answer, strip_reasoning, ModelOutput};
pub use retry::{
    backoff_delay, DelaySource, JitterStrategy, RetryDecision, RetryEnvelope, MAX_SERVER_WAIT,
};

#[cfg(feature = "http")]
pub use http::HttpModelInvoker;
