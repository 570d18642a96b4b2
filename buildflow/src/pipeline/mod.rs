//! Build orchestration.
//!
//! This module provides:
//! - The [`Orchestrator`] that sequences the five stages per build
//! - The [`BuildStream`] each build reports through
//! - The registry of builds known to an orchestrator

mod integration_tests;
mod orchestrator;
mod registry;
mod stream;

pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use registry::{BuildHandle, BuildRegistry};
pub use stream::BuildStream;
