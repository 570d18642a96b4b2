//! Observability utilities.
//!
//! Subscriber installation for binaries and a timer for stage durations.

mod logging;

pub use logging::{init_tracing, LogFormat, StageTimer, DEFAULT_FILTER};
