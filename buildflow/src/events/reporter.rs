//! Per-stage event reporter.

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{EventSink, NoOpEventSink};
use crate::artifacts::TestOutcome;
use crate::cancellation::CancellationToken;
use crate::core::{EventKind, PipelineStage, ProgressEvent, TokenUsage};

/// Emits progress events for one stage of one build.
///
/// Events are numbered from a per-build counter and delivered through the
/// build's outward channel. Once the build is cancelled every emit is a
/// no-op, and a send blocked on a slow consumer is abandoned.
#[derive(Clone)]
pub struct StageReporter {
    build_id: Uuid,
    stage: PipelineStage,
    tx: Option<mpsc::Sender<ProgressEvent>>,
    cancel: Arc<CancellationToken>,
    sequence: Arc<AtomicU64>,
    sink: Arc<dyn EventSink>,
    usage: Arc<Mutex<TokenUsage>>,
}

impl StageReporter {
    /// Creates a reporter that delivers into `tx`.
    #[must_use]
    pub fn new(
        build_id: Uuid,
        stage: PipelineStage,
        tx: mpsc::Sender<ProgressEvent>,
        cancel: Arc<CancellationToken>,
        sequence: Arc<AtomicU64>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            build_id,
            stage,
            tx: Some(tx),
            cancel,
            sequence,
            sink,
            usage: Arc::new(Mutex::new(TokenUsage::default())),
        }
    }

    /// Creates a reporter with no outward channel.
    ///
    /// Events only reach `sink`. Useful when running a stage worker on its own.
    #[must_use]
    pub fn detached(stage: PipelineStage, sink: Arc<dyn EventSink>) -> Self {
        Self {
            build_id: Uuid::nil(),
            stage,
            tx: None,
            cancel: Arc::new(CancellationToken::new()),
            sequence: Arc::new(AtomicU64::new(0)),
            sink,
            usage: Arc::new(Mutex::new(TokenUsage::default())),
        }
    }

    /// Creates a detached reporter that discards events.
    #[must_use]
    pub fn silent(stage: PipelineStage) -> Self {
        Self::detached(stage, Arc::new(NoOpEventSink))
    }

    /// Returns a reporter for `stage` sharing this build's channel.
    ///
    /// Token usage starts from zero.
    #[must_use]
    pub fn for_stage(&self, stage: PipelineStage) -> Self {
        Self {
            stage,
            usage: Arc::new(Mutex::new(TokenUsage::default())),
            ..self.clone()
        }
    }

    /// Returns the build id.
    #[must_use]
    pub const fn build_id(&self) -> Uuid {
        self.build_id
    }

    /// Returns the stage events are attributed to.
    #[must_use]
    pub const fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Returns the build's cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns whether the build was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Adds one model call's usage to the stage total.
    pub fn record_usage(&self, usage: TokenUsage) {
        *self.usage.lock() += usage;
    }

    /// Returns the stage's accumulated token usage.
    #[must_use]
    pub fn usage(&self) -> TokenUsage {
        *self.usage.lock()
    }

    /// Numbers and delivers an event.
    ///
    /// Returns false when the build was cancelled or nobody is listening.
    pub async fn send(&self, event: ProgressEvent) -> bool {
        if self.is_cancelled() {
            return false;
        }
        let event = event.with_sequence(self.sequence.fetch_add(1, Ordering::SeqCst));

        let delivered = match &self.tx {
            None => true,
            Some(tx) => {
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => return false,
                    sent = tx.send(event.clone()) => sent.is_ok(),
                }
            }
        };
        self.sink.emit(&event).await;
        delivered
    }

    /// Emits an event of `kind` for this stage.
    pub async fn emit(&self, kind: EventKind, payload: Value) -> bool {
        self.send(ProgressEvent::new(self.build_id, self.stage, kind, payload))
            .await
    }

    /// Emits an intermediate progress message.
    pub async fn progress(&self, message: &str, data: Value) -> bool {
        self.emit(EventKind::Progress, json!({ "message": message, "data": data }))
            .await
    }

    /// Emits a reasoning fragment.
    pub async fn reasoning(&self, text: &str) -> bool {
        self.emit(EventKind::Reasoning, json!({ "text": text })).await
    }

    /// Emits a generated code fragment.
    pub async fn code_fragment(&self, text: &str) -> bool {
        self.emit(EventKind::CodeFragment, json!({ "text": text })).await
    }

    /// Emits one test outcome.
    pub async fn test_result(&self, outcome: &TestOutcome, iteration: u32) -> bool {
        self.emit(
            EventKind::TestResult,
            json!({
                "name": outcome.name,
                "passed": outcome.passed,
                "error": outcome.error,
                "iteration": iteration,
            }),
        )
        .await
    }
}

impl std::fmt::Debug for StageReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageReporter")
            .field("build_id", &self.build_id)
            .field("stage", &self.stage)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
