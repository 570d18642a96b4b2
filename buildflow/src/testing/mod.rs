//! Testing utilities for buildflow.
//!
//! This module provides:
//! - A scripted model invoker and a static deployer
//! - Sample documents and artifacts
//! - Assertions over progress event streams

mod assertions;
pub mod fixtures;
mod mocks;

pub use assertions::{
    assert_failed_at, assert_nothing_after, assert_ordered, assert_stages_completed,
    completed_stages, lifecycle,
};
pub use mocks::{Script, ScriptedInvoker, StaticDeployer};
