//! Stage artifact envelope.

use serde::Serialize;
use uuid::Uuid;

use super::PipelineStage;
use crate::artifacts::{
    ArchitectureDocument, CodeBundle, DeploymentResult, GeneratedUi, RequirementsSpec,
};

/// The validated output of one pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StageArtifact {
    /// Output of [`PipelineStage::Analyzing`].
    Requirements(RequirementsSpec),
    /// Output of [`PipelineStage::Architecting`].
    Architecture(ArchitectureDocument),
    /// Output of [`PipelineStage::Generating`].
    Code(CodeBundle),
    /// Output of [`PipelineStage::Deploying`].
    Deployment(DeploymentResult),
    /// Output of [`PipelineStage::Designing`].
    Ui(GeneratedUi),
}

impl StageArtifact {
    /// Returns the stage that produces this kind of artifact.
    #[must_use]
    pub const fn stage(&self) -> PipelineStage {
        match self {
            Self::Requirements(_) => PipelineStage::Analyzing,
            Self::Architecture(_) => PipelineStage::Architecting,
            Self::Code(_) => PipelineStage::Generating,
            Self::Deployment(_) => PipelineStage::Deploying,
            Self::Ui(_) => PipelineStage::Designing,
        }
    }

    /// Returns the artifact's own id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        match self {
            Self::Requirements(a) => a.id,
            Self::Architecture(a) => a.id,
            Self::Code(a) => a.id,
            Self::Deployment(a) => a.id,
            Self::Ui(a) => a.id,
        }
    }

    /// Returns the ids of the artifacts this one was derived from.
    #[must_use]
    pub fn derived_from(&self) -> Vec<Uuid> {
        match self {
            Self::Requirements(_) => Vec::new(),
            Self::Architecture(a) => vec![a.requirements_id],
            Self::Code(a) => vec![a.architecture_id],
            Self::Deployment(a) => vec![a.code_bundle_id],
            Self::Ui(a) => vec![a.requirements_id, a.deployment_id],
        }
    }

    /// Serializes the artifact for an event payload.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl From<RequirementsSpec> for StageArtifact {
    fn from(value: RequirementsSpec) -> Self {
        Self::Requirements(value)
    }
}

impl From<ArchitectureDocument> for StageArtifact {
    fn from(value: ArchitectureDocument) -> Self {
        Self::Architecture(value)
    }
}

impl From<CodeBundle> for StageArtifact {
    fn from(value: CodeBundle) -> Self {
        Self::Code(value)
    }
}

impl From<DeploymentResult> for StageArtifact {
    fn from(value: DeploymentResult) -> Self {
        Self::Deployment(value)
    }
}

impl From<GeneratedUi> for StageArtifact {
    fn from(value: GeneratedUi) -> Self {
        Self::Ui(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_stage_mapping() {
        let spec = fixtures::requirements_spec(3);
        let artifact = StageArtifact::from(spec.clone());

        assert_eq!(artifact.stage(), PipelineStage::Analyzing);
        assert_eq!(artifact.id(), spec.id);
        assert!(artifact.derived_from().is_empty());
    }

    #[test]
    fn test_ui_derives_from_two_artifacts() {
        let spec = fixtures::requirements_spec(3);
        let deployment = fixtures::deployment_result(uuid::Uuid::new_v4());
        let ui = fixtures::generated_ui(&spec, &deployment);

        let artifact = StageArtifact::from(ui);
        assert_eq!(artifact.derived_from(), vec![spec.id, deployment.id]);
    }

    #[test]
    fn test_to_json_uses_camel_case() {
        let spec = fixtures::requirements_spec(3);
        let json = StageArtifact::from(spec).to_json();

        assert!(json.get("agentName").is_some());
        assert!(json.get("complexityScore").is_some());
    }
}
