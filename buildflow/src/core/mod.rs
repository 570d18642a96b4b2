//! Core domain model types for buildflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - The ordered pipeline stages
//! - Progress events and token usage
//! - The stage artifact envelope
//! - Per-build state and options

mod artifact;
mod build;
mod event;
mod status;

pub use artifact::StageArtifact;
pub use build::{Build, BuildArtifacts, BuildFailure, BuildOptions};
pub use event::{EventKind, ProgressEvent, TokenUsage};
pub use status::{PipelineStage, UnknownStageError};
