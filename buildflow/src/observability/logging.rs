//! Tracing subscriber setup and stage timing.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::core::PipelineStage;

/// Filter used when `RUST_LOG` is unset or does not parse.
pub const DEFAULT_FILTER: &str = "buildflow=info";

/// Output format of the global subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global tracing subscriber.
///
/// Returns false when a subscriber was already installed.
pub fn init_tracing(format: LogFormat) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(true);
    match format {
        LogFormat::Pretty => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    }
}

/// Measures one stage run.
#[derive(Debug)]
pub struct StageTimer {
    start: Instant,
    build_id: Uuid,
    stage: PipelineStage,
}

impl StageTimer {
    /// Starts timing `stage` of `build_id`.
    #[must_use]
    pub fn start(build_id: Uuid, stage: PipelineStage) -> Self {
        debug!(build_id = %build_id, stage = %stage, "Stage timer started");
        Self {
            start: Instant::now(),
            build_id,
            stage,
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns the stage being timed.
    #[must_use]
    pub const fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Stops the timer, logs the outcome and returns the duration.
    pub fn finish(self, outcome: &str) -> f64 {
        let duration_ms = self.elapsed_ms();
        info!(
            build_id = %self.build_id,
            stage = %self.stage,
            outcome,
            duration_ms,
            "Stage finished"
        );
        duration_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_timer() {
        let timer = StageTimer::start(Uuid::nil(), PipelineStage::Architecting);
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert_eq!(timer.stage(), PipelineStage::Architecting);
        let duration = timer.finish("complete");
        assert!(duration >= 10.0);
    }

    #[test]
    fn test_second_init_is_rejected() {
        let _ = init_tracing(LogFormat::Pretty);
        assert!(!init_tracing(LogFormat::Json));
    }

    #[test]
    fn test_log_format_deserializes() {
        let format: LogFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(format, LogFormat::Json);
    }
}
