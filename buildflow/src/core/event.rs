//! Progress events emitted while a build runs.

use serde::{Deserialize, Serialize};
use std::ops::AddAssign;
use uuid::Uuid;

use super::PipelineStage;
use crate::utils::{now_utc, Timestamp};

/// The kind of a progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A stage began executing.
    StageStarted,
    /// Intermediate progress (retries, waits, repair iterations).
    Progress,
    /// A fragment of model reasoning.
    Reasoning,
    /// A fragment of generated code.
    CodeFragment,
    /// The outcome of one generated test.
    TestResult,
    /// A stage finished and its artifact was stored.
    StageComplete,
    /// A stage failed; the build stops here.
    StageError,
}

impl EventKind {
    /// Returns the wire name of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::StageStarted => "stage_started",
            Self::Progress => "progress",
            Self::Reasoning => "reasoning",
            Self::CodeFragment => "code_fragment",
            Self::TestResult => "test_result",
            Self::StageComplete => "stage_complete",
            Self::StageError => "stage_error",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token counts reported by the model collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    /// Tokens in the prompt.
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Tokens in the generated candidates.
    #[serde(default)]
    pub candidate_tokens: u64,
    /// Tokens spent on internal reasoning.
    #[serde(default)]
    pub thinking_tokens: u64,
}

impl TokenUsage {
    /// Creates a usage record.
    #[must_use]
    pub const fn new(prompt_tokens: u64, candidate_tokens: u64, thinking_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            candidate_tokens,
            thinking_tokens,
        }
    }

    /// Returns the sum of all token counts.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.prompt_tokens
            .saturating_add(self.candidate_tokens)
            .saturating_add(self.thinking_tokens)
    }

    /// Returns true when nothing was counted.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(rhs.prompt_tokens);
        self.candidate_tokens = self.candidate_tokens.saturating_add(rhs.candidate_tokens);
        self.thinking_tokens = self.thinking_tokens.saturating_add(rhs.thinking_tokens);
    }
}

/// An immutable record of something that happened during a build.
///
/// Events are append-only and ordered per build by `sequence`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// The build this event belongs to.
    pub build_id: Uuid,
    /// Position of the event in the build's stream, starting at 0.
    pub sequence: u64,
    /// The stage that produced the event.
    pub stage: PipelineStage,
    /// What happened.
    pub kind: EventKind,
    /// Kind-specific payload.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// When the event was produced.
    pub timestamp: Timestamp,
    /// Token usage attached to the event, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl ProgressEvent {
    /// Creates an unsequenced event; the orchestrator assigns the sequence.
    #[must_use]
    pub fn new(build_id: Uuid, stage: PipelineStage, kind: EventKind, payload: serde_json::Value) -> Self {
        Self {
            build_id,
            sequence: 0,
            stage,
            kind,
            payload,
            timestamp: now_utc(),
            usage: None,
        }
    }

    /// Creates a "stage started" event.
    #[must_use]
    pub fn started(build_id: Uuid, stage: PipelineStage) -> Self {
        Self::new(
            build_id,
            stage,
            EventKind::StageStarted,
            serde_json::json!({ "stage": stage.as_str() }),
        )
    }

    /// Creates a "stage complete" event carrying the artifact summary.
    #[must_use]
    pub fn completed(build_id: Uuid, stage: PipelineStage, artifact: serde_json::Value, duration_ms: f64) -> Self {
        Self::new(
            build_id,
            stage,
            EventKind::StageComplete,
            serde_json::json!({ "artifact": artifact, "durationMs": duration_ms }),
        )
    }

    /// Creates a "stage error" event.
    #[must_use]
    pub fn failed(build_id: Uuid, stage: PipelineStage, message: &str, details: serde_json::Value) -> Self {
        Self::new(
            build_id,
            stage,
            EventKind::StageError,
            serde_json::json!({ "message": message, "details": details }),
        )
    }

    /// Attaches token usage.
    #[must_use]
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Assigns the stream position.
    #[must_use]
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Returns the `message` field of the payload, if present.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.payload.get("message").and_then(serde_json::Value::as_str)
    }

    /// Returns true for events that end a build's stream.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.kind == EventKind::StageError
    }
}
