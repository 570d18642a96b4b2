//! Typed stage artifacts.
//!
//! Each stage of a build produces one artifact. Artifacts carry their own id
//! and the id(s) of the artifact(s) they were derived from, forming the chain
//! requirements → architecture → code → deployment, with the UI pointing back
//! at both the requirements and the deployment.
//!
//! Field names serialize in camelCase so a serialized artifact is accepted by
//! the matching contract in [`crate::contracts`].

mod architecture;
mod code;
mod deployment;
mod requirements;
mod ui;

pub use architecture::{
    AgentPattern, AgentRole, ArchitectureDocument, Component, CoordinationMode, FeasibilityIssue,
    IntegrationSpec, ModelTier, MultiAgentStrategy, Tradeoff,
};
pub use code::{CodeBundle, FailureReport, SourceFile, TestOutcome};
pub use deployment::{DeploymentResult, DeploymentStatus, LOCAL_PROVIDER};
pub use requirements::{
    AuthType, Constraints, EdgeCase, Integration, IoField, IoKind, RequirementsSpec, Tone,
};
pub use ui::{ComponentKind, GeneratedUi, UiComponent};
