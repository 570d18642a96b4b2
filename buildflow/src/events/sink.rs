//! Event sink trait and implementations.

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, warn, Level};

use crate::core::{EventKind, ProgressEvent};

/// Observer that receives a copy of every outward progress event.
///
/// Sinks are used for logging and tests; they never influence delivery.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Receives an event.
    async fn emit(&self, event: &ProgressEvent);
}

/// A no-op event sink that discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event: &ProgressEvent) {}
}

/// An event sink that logs events using the tracing framework.
///
/// Stage errors are always logged at WARN; other kinds use the configured
/// level.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a new logging event sink with the specified level.
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub const fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    fn log_event(&self, event: &ProgressEvent) {
        if event.kind == EventKind::StageError {
            warn!(
                build_id = %event.build_id,
                stage = %event.stage,
                sequence = event.sequence,
                message = event.message().unwrap_or_default(),
                "Stage failed"
            );
            return;
        }
        if self.level == Level::DEBUG {
            debug!(
                build_id = %event.build_id,
                stage = %event.stage,
                kind = %event.kind,
                sequence = event.sequence,
                payload = %event.payload,
                "Event: {}", event.kind
            );
        } else {
            info!(
                build_id = %event.build_id,
                stage = %event.stage,
                kind = %event.kind,
                sequence = event.sequence,
                "Event: {}", event.kind
            );
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event: &ProgressEvent) {
        self.log_event(event);
    }
}

/// A collecting event sink for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<ProgressEvent>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.read().clone()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns the events of one kind.
    #[must_use]
    pub fn events_of_kind(&self, kind: EventKind) -> Vec<ProgressEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event: &ProgressEvent) {
        self.events.write().push(event.clone());
    }
}
