//! Stage workers.
//!
//! Each of the five pipeline stages is a [`StageWorker`]: it reads the
//! artifacts of earlier stages from [`StageInputs`], reports progress
//! through a [`StageReporter`] and returns its own artifact.

mod architect;
mod codegen;
mod deployment;
mod prompts;
mod requirements;
mod ui;
mod validated;

pub use architect::{assess_feasibility, post_process_architecture, template_endpoint, Architect};
pub use codegen::CodeGenerator;
pub use deployment::{local_fallback, Deployer, DeploymentEngine};
#[cfg(test)]
pub use deployment::MockDeployer;
pub use requirements::{
    post_process_requirements, RequirementsAnalyzer, DEFAULT_EDGE_CASE, DEFAULT_MITIGATION,
};
pub use ui::{default_components, UiGenerator};
pub use validated::invoke_validated;

use async_trait::async_trait;
use std::fmt::Debug;

use crate::artifacts::{ArchitectureDocument, CodeBundle, DeploymentResult, RequirementsSpec};
use crate::client::BackoffClient;
use crate::core::{BuildArtifacts, BuildOptions, PipelineStage, StageArtifact};
use crate::errors::StageError;
use crate::events::StageReporter;

/// One stage of the pipeline.
#[async_trait]
pub trait StageWorker: Send + Sync + Debug {
    /// Returns the stage this worker runs.
    fn stage(&self) -> PipelineStage;

    /// Produces the stage's artifact.
    ///
    /// # Errors
    ///
    /// Returns the [`StageError`] that stops the build.
    async fn run(
        &self,
        inputs: &StageInputs,
        reporter: &StageReporter,
    ) -> Result<StageArtifact, StageError>;
}

/// What a worker sees of its build.
#[derive(Debug, Clone, Default)]
pub struct StageInputs {
    /// The natural-language description.
    pub description: String,
    /// Per-build options.
    pub options: BuildOptions,
    /// Artifacts produced so far.
    pub artifacts: BuildArtifacts,
}

impl StageInputs {
    /// Creates inputs with no artifacts.
    #[must_use]
    pub fn new(description: impl Into<String>, options: BuildOptions) -> Self {
        Self {
            description: description.into(),
            options,
            artifacts: BuildArtifacts::default(),
        }
    }

    /// Adds an upstream artifact.
    #[must_use]
    pub fn with_artifact(mut self, artifact: impl Into<StageArtifact>) -> Self {
        self.artifacts.store(artifact.into());
        self
    }

    /// Returns the client to use for this build.
    ///
    /// Applies the per-build unmetered override.
    #[must_use]
    pub fn client(&self, base: &BackoffClient) -> BackoffClient {
        match self.options.unmetered {
            Some(unmetered) => base.with_unmetered(unmetered),
            None => base.clone(),
        }
    }

    /// Returns the requirements, or a prerequisite error for `stage`.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::Prerequisite`] when the artifact is missing.
    pub fn requirements(&self, stage: PipelineStage) -> Result<&RequirementsSpec, StageError> {
        require(self.artifacts.requirements.as_ref(), stage, PipelineStage::Analyzing)
    }

    /// Returns the architecture, or a prerequisite error for `stage`.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::Prerequisite`] when the artifact is missing.
    pub fn architecture(&self, stage: PipelineStage) -> Result<&ArchitectureDocument, StageError> {
        require(self.artifacts.architecture.as_ref(), stage, PipelineStage::Architecting)
    }

    /// Returns the code bundle, or a prerequisite error for `stage`.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::Prerequisite`] when the artifact is missing.
    pub fn code(&self, stage: PipelineStage) -> Result<&CodeBundle, StageError> {
        require(self.artifacts.code.as_ref(), stage, PipelineStage::Generating)
    }

    /// Returns the deployment, or a prerequisite error for `stage`.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::Prerequisite`] when the artifact is missing.
    pub fn deployment(&self, stage: PipelineStage) -> Result<&DeploymentResult, StageError> {
        require(self.artifacts.deployment.as_ref(), stage, PipelineStage::Deploying)
    }
}

fn require<T>(
    value: Option<&T>,
    stage: PipelineStage,
    missing: PipelineStage,
) -> Result<&T, StageError> {
    value.ok_or(StageError::Prerequisite { stage, missing })
}
