//! # Buildflow
//!
//! A five-stage pipeline that turns a natural-language description into a
//! deployed software agent.
//!
//! Buildflow provides:
//!
//! - **Ordered stages**: analyzing, architecting, generating, deploying and
//!   designing, each producing a validated artifact for the next
//! - **Streamed progress**: every build reports through an ordered stream of
//!   events, including reasoning and code fragments while a stage runs
//! - **Bounded recovery**: retry with backoff on transient API errors,
//!   validation retries on malformed documents and a repair loop for
//!   generated code that fails its tests
//! - **Control**: cooperative cancellation and retry from any stage
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use buildflow::prelude::*;
//! use futures::StreamExt;
//!
//! let orchestrator = Orchestrator::builder(invoker, deployer)
//!     .config(PipelineConfig::from_file("buildflow.json")?)
//!     .build()?;
//!
//! let mut events = orchestrator.start_build("build a support bot", BuildOptions::new());
//! while let Some(event) = events.next().await {
//!     println!("{} {}", event.stage, event.kind);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod artifacts;
pub mod cancellation;
pub mod client;
pub mod config;
pub mod contracts;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::artifacts::{
        ArchitectureDocument, CodeBundle, DeploymentResult, GeneratedUi, RequirementsSpec,
    };
    pub use crate::cancellation::CancellationToken;
    pub use crate::client::{BackoffClient, ModelInvoker, ModelRequest, RateLimitCountdown};
    pub use crate::config::{ClientConfig, PipelineConfig};
    pub use crate::core::{
        Build, BuildOptions, EventKind, PipelineStage, ProgressEvent, StageArtifact, TokenUsage,
    };
    pub use crate::errors::{BuildflowError, ClientError, StageError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{BuildStream, Orchestrator};
    pub use crate::stages::{Deployer, StageWorker};
    pub use crate::utils::{generate_uuid_v7, Timestamp};
}
