//! Assertions over progress event streams.

use crate::core::{EventKind, PipelineStage, ProgressEvent};

/// Returns the stage lifecycle events as `(stage, kind)` pairs.
///
/// Only stage-started, stage-complete and stage-error events are kept.
#[must_use]
pub fn lifecycle(events: &[ProgressEvent]) -> Vec<(PipelineStage, EventKind)> {
    events
        .iter()
        .filter(|e| {
            matches!(
                e.kind,
                EventKind::StageStarted | EventKind::StageComplete | EventKind::StageError
            )
        })
        .map(|e| (e.stage, e.kind))
        .collect()
}

/// Returns the stages that completed, in order.
#[must_use]
pub fn completed_stages(events: &[ProgressEvent]) -> Vec<PipelineStage> {
    events
        .iter()
        .filter(|e| e.kind == EventKind::StageComplete)
        .map(|e| e.stage)
        .collect()
}

/// Asserts that every stage in `stages` started and completed, in order,
/// and that nothing else happened at the lifecycle level.
pub fn assert_stages_completed(events: &[ProgressEvent], stages: &[PipelineStage]) {
    let expected: Vec<_> = stages
        .iter()
        .flat_map(|s| [(*s, EventKind::StageStarted), (*s, EventKind::StageComplete)])
        .collect();
    assert_eq!(
        lifecycle(events),
        expected,
        "Unexpected stage lifecycle"
    );
}

/// Asserts that the stream ends with exactly one stage error at `stage`
/// whose message contains `message`.
pub fn assert_failed_at(events: &[ProgressEvent], stage: PipelineStage, message: &str) {
    let errors: Vec<_> = events.iter().filter(|e| e.is_error()).collect();
    assert_eq!(errors.len(), 1, "Expected one stage error, got {}", errors.len());
    let last = events.last();
    assert!(
        last.is_some_and(|e| e.is_error()),
        "Expected the stream to end with the stage error"
    );
    assert_eq!(errors[0].stage, stage, "Stage error attributed to the wrong stage");
    let actual = errors[0].message().unwrap_or_default();
    assert!(
        actual.contains(message),
        "Expected error message containing '{message}', got '{actual}'"
    );
}

/// Asserts that no event mentions a stage after `stage`.
pub fn assert_nothing_after(events: &[ProgressEvent], stage: PipelineStage) {
    let late: Vec<_> = events
        .iter()
        .filter(|e| e.stage.index() > stage.index())
        .map(|e| (e.stage, e.kind))
        .collect();
    assert!(late.is_empty(), "Unexpected events after {stage}: {late:?}");
}

/// Asserts that sequence numbers strictly increase.
pub fn assert_ordered(events: &[ProgressEvent]) {
    for pair in events.windows(2) {
        assert!(
            pair[0].sequence < pair[1].sequence,
            "Events out of order: {} then {}",
            pair[0].sequence,
            pair[1].sequence
        );
    }
}
