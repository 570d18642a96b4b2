//! Progress event delivery and observation.
//!
//! [`StageReporter`] numbers and delivers a stage's events through the
//! build's outward channel; every delivered event is mirrored to an
//! [`EventSink`].

mod reporter;
mod sink;

pub use reporter::StageReporter;
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
