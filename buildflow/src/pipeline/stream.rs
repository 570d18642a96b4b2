//! The consumer side of a build's progress events.

use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::cancellation::CancellationToken;
use crate::core::{PipelineStage, ProgressEvent};
use crate::errors::BuildflowError;

/// Ordered progress events of one build run.
///
/// The stream ends after the last stage completes, after a stage error, or
/// as soon as the build is cancelled. Dropping it does not cancel the build.
#[derive(Debug)]
pub struct BuildStream {
    build_id: Uuid,
    rx: mpsc::Receiver<ProgressEvent>,
    cancel: Option<Arc<CancellationToken>>,
    done: bool,
}

impl BuildStream {
    pub(crate) const fn new(
        build_id: Uuid,
        rx: mpsc::Receiver<ProgressEvent>,
        cancel: Arc<CancellationToken>,
    ) -> Self {
        Self {
            build_id,
            rx,
            cancel: Some(cancel),
            done: false,
        }
    }

    /// A stream holding a single stage error and nothing else.
    pub(crate) fn rejected(build_id: Uuid, stage: PipelineStage, error: &BuildflowError) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let details = serde_json::json!({ "kind": error.kind(), "buildId": build_id });
        // A fresh channel with capacity 1 always has room.
        let _ = tx.try_send(
            ProgressEvent::failed(build_id, stage, &error.to_string(), details).with_sequence(0),
        );
        Self {
            build_id,
            rx,
            cancel: None,
            done: false,
        }
    }

    /// Returns the build id.
    #[must_use]
    pub const fn build_id(&self) -> Uuid {
        self.build_id
    }
}

impl Stream for BuildStream {
    type Item = ProgressEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        if self.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
            self.done = true;
            self.rx.close();
            return Poll::Ready(None);
        }
        match self.rx.poll_recv(cx) {
            Poll::Ready(None) => {
                self.done = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}
