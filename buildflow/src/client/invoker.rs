//! The model-calling collaborator.

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::TokenUsage;

/// How the final answer should be interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// A JSON document, optionally wrapped in a markdown fence.
    #[default]
    Json,
    /// Free text.
    Text,
}

/// One outbound model request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRequest {
    /// Short label for logs (e.g. "requirements").
    pub label: String,
    /// The prompt.
    pub prompt: String,
    /// How to interpret the answer.
    #[serde(default)]
    pub response_mode: ResponseMode,
    /// Token budget for model reasoning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<u32>,
    /// Names of tools the model may use.
    #[serde(default)]
    pub tools: Vec<String>,
}

impl ModelRequest {
    /// Creates a JSON-mode request.
    #[must_use]
    pub fn new(label: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            prompt: prompt.into(),
            response_mode: ResponseMode::Json,
            thinking_budget: None,
            tools: Vec::new(),
        }
    }

    /// Sets the response mode.
    #[must_use]
    pub const fn with_response_mode(mut self, mode: ResponseMode) -> Self {
        self.response_mode = mode;
        self
    }

    /// Sets the reasoning budget.
    #[must_use]
    pub const fn with_thinking_budget(mut self, budget: u32) -> Self {
        self.thinking_budget = Some(budget);
        self
    }

    /// Allows a tool.
    #[must_use]
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tools.push(tool.into());
        self
    }
}

/// The final answer of a model call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelAnswer {
    /// Answer text as returned by the model.
    pub text: String,
    /// Token counts reported for the call.
    pub usage: TokenUsage,
}

impl ModelAnswer {
    /// Creates an answer with no usage data.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: TokenUsage::default(),
        }
    }

    /// Sets the usage.
    #[must_use]
    pub const fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }
}

/// Unclassified failure reported by an invoker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvokeError {
    /// The request never produced an HTTP status.
    Network(String),
    /// The server answered with an error status.
    Status {
        /// HTTP status code.
        status: u16,
        /// Error text.
        message: String,
        /// Parsed `retry-after` header, if present.
        retry_after: Option<Duration>,
    },
}

impl InvokeError {
    /// Creates a status error without a wait hint.
    #[must_use]
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
            retry_after: None,
        }
    }
}

/// One item of an invocation stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelChunk {
    /// A fragment of model reasoning.
    Reasoning(String),
    /// A fragment of generated code.
    Code(String),
    /// The final answer; ends the stream.
    Final(ModelAnswer),
    /// A failure; ends the stream.
    Error(InvokeError),
}

/// Lazy, finite stream of chunks for one invocation.
pub type ChunkStream = BoxStream<'static, ModelChunk>;

/// Something that can call a language model.
///
/// Each call returns a fresh stream; nothing happens until it is polled.
pub trait ModelInvoker: Send + Sync {
    /// Starts one invocation.
    fn invoke(&self, request: &ModelRequest) -> ChunkStream;
}
