//! Per-build state owned by the orchestrator.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{PipelineStage, StageArtifact};
use crate::artifacts::{
    ArchitectureDocument, CodeBundle, DeploymentResult, GeneratedUi, RequirementsSpec, Tone,
};
use crate::utils::{now_utc, Timestamp};

/// Per-build options supplied to `start_build`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildOptions {
    /// Agent name to use instead of the generated one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Personality to use instead of the generated one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone: Option<Tone>,
    /// Deployment providers to try, in order, instead of the configured list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub providers: Option<Vec<String>>,
    /// Overrides the client's unmetered setting for this build.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unmetered: Option<bool>,
}

impl BuildOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the agent name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the personality.
    #[must_use]
    pub const fn with_tone(mut self, tone: Tone) -> Self {
        self.tone = Some(tone);
        self
    }

    /// Sets the provider order.
    #[must_use]
    pub fn with_providers<I, S>(mut self, providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.providers = Some(providers.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the unmetered override.
    #[must_use]
    pub const fn with_unmetered(mut self, unmetered: bool) -> Self {
        self.unmetered = Some(unmetered);
        self
    }
}

/// The terminal error of a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildFailure {
    /// Stage that failed.
    pub stage: PipelineStage,
    /// Failure message.
    pub message: String,
}

/// Artifacts accumulated by a build.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildArtifacts {
    /// Output of the analyzing stage.
    pub requirements: Option<RequirementsSpec>,
    /// Output of the architecting stage.
    pub architecture: Option<ArchitectureDocument>,
    /// Output of the generating stage.
    pub code: Option<CodeBundle>,
    /// Output of the deploying stage.
    pub deployment: Option<DeploymentResult>,
    /// Output of the designing stage.
    pub ui: Option<GeneratedUi>,
}

impl BuildArtifacts {
    /// Stores an artifact in its slot, replacing any previous value.
    pub fn store(&mut self, artifact: StageArtifact) {
        match artifact {
            StageArtifact::Requirements(a) => self.requirements = Some(a),
            StageArtifact::Architecture(a) => self.architecture = Some(a),
            StageArtifact::Code(a) => self.code = Some(a),
            StageArtifact::Deployment(a) => self.deployment = Some(a),
            StageArtifact::Ui(a) => self.ui = Some(a),
        }
    }

    /// Returns true when the artifact of `stage` is present.
    #[must_use]
    pub const fn has(&self, stage: PipelineStage) -> bool {
        match stage {
            PipelineStage::Analyzing => self.requirements.is_some(),
            PipelineStage::Architecting => self.architecture.is_some(),
            PipelineStage::Generating => self.code.is_some(),
            PipelineStage::Deploying => self.deployment.is_some(),
            PipelineStage::Designing => self.ui.is_some(),
        }
    }

    /// Drops the artifacts of `stage` and every later stage.
    pub fn clear_from(&mut self, stage: PipelineStage) {
        for s in stage.remaining() {
            match s {
                PipelineStage::Analyzing => self.requirements = None,
                PipelineStage::Architecting => self.architecture = None,
                PipelineStage::Generating => self.code = None,
                PipelineStage::Deploying => self.deployment = None,
                PipelineStage::Designing => self.ui = None,
            }
        }
    }

    /// Returns the artifacts `stage` needs that are missing.
    #[must_use]
    pub fn missing_prerequisites(&self, stage: PipelineStage) -> Vec<PipelineStage> {
        let needed: &[PipelineStage] = match stage {
            PipelineStage::Analyzing => &[],
            PipelineStage::Architecting => &[PipelineStage::Analyzing],
            PipelineStage::Generating => &[PipelineStage::Analyzing, PipelineStage::Architecting],
            PipelineStage::Deploying => &[PipelineStage::Generating],
            PipelineStage::Designing => &[PipelineStage::Analyzing, PipelineStage::Deploying],
        };
        needed.iter().copied().filter(|s| !self.has(*s)).collect()
    }
}

/// One pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    /// Build id.
    pub id: Uuid,
    /// The natural-language description being built.
    pub description: String,
    /// Options supplied at start.
    pub options: BuildOptions,
    /// The stage running now, or the last stage reached.
    pub current_stage: Option<PipelineStage>,
    /// Whether cancellation was requested.
    pub cancelled: bool,
    /// Terminal error, if the build stopped on one.
    pub last_error: Option<BuildFailure>,
    /// Accumulated artifacts.
    pub artifacts: BuildArtifacts,
    /// When the build was created.
    pub created_at: Timestamp,
    /// When the build last changed.
    pub updated_at: Timestamp,
}

impl Build {
    /// Creates a build with a fresh id.
    #[must_use]
    pub fn new(description: impl Into<String>, options: BuildOptions) -> Self {
        let now = now_utc();
        Self {
            id: crate::utils::generate_uuid_v7(),
            description: description.into(),
            options,
            current_stage: None,
            cancelled: false,
            last_error: None,
            artifacts: BuildArtifacts::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Marks `stage` as the one running.
    pub fn enter(&mut self, stage: PipelineStage) {
        self.current_stage = Some(stage);
        self.updated_at = now_utc();
    }

    /// Stores a completed stage's artifact.
    pub fn complete(&mut self, artifact: StageArtifact) {
        self.artifacts.store(artifact);
        self.updated_at = now_utc();
    }

    /// Records a terminal error.
    pub fn fail(&mut self, stage: PipelineStage, message: impl Into<String>) {
        self.last_error = Some(BuildFailure {
            stage,
            message: message.into(),
        });
        self.updated_at = now_utc();
    }

    /// Prepares the build to re-run from `stage`.
    pub fn rewind(&mut self, stage: PipelineStage) {
        self.last_error = None;
        self.cancelled = false;
        self.artifacts.clear_from(stage);
        self.updated_at = now_utc();
    }

    /// Returns true when every stage produced an artifact.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        PipelineStage::ALL.iter().all(|s| self.artifacts.has(*s))
    }
}
