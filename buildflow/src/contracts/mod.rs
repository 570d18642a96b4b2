//! Structural contracts for stage outputs.
//!
//! Every check is pure and collects all field errors in a document rather
//! than stopping at the first. Unknown enum strings are coerced to a safe
//! default; type mismatches, missing required fields and out-of-range
//! numbers are hard failures.

mod architecture;
mod bundle;
mod deployment;
mod errors;
mod reader;
mod requirements;

pub use architecture::validate_architecture;
pub use bundle::{parse_code_bundle, parse_ui};
pub use deployment::validate_deployment;
pub use errors::{summarize, FieldError, Validation};
pub use reader::coerce_variant;
pub use requirements::validate_requirements;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::{PipelineStage, StageArtifact};

/// The kinds of document a contract exists for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Requirements specification.
    Requirements,
    /// Architecture document.
    Architecture,
    /// Code bundle.
    Code,
    /// Deployment result.
    Deployment,
    /// Generated UI.
    Ui,
}

impl ArtifactKind {
    /// Returns the kind produced by `stage`.
    #[must_use]
    pub const fn for_stage(stage: PipelineStage) -> Self {
        match stage {
            PipelineStage::Analyzing => Self::Requirements,
            PipelineStage::Architecting => Self::Architecture,
            PipelineStage::Generating => Self::Code,
            PipelineStage::Deploying => Self::Deployment,
            PipelineStage::Designing => Self::Ui,
        }
    }

    /// Returns the kind's name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Requirements => "requirements",
            Self::Architecture => "architecture",
            Self::Code => "code",
            Self::Deployment => "deployment",
            Self::Ui => "ui",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Checks `raw` against the contract for `kind`.
#[must_use]
pub fn validate(kind: ArtifactKind, raw: &serde_json::Value) -> Validation<StageArtifact> {
    match kind {
        ArtifactKind::Requirements => validate_requirements(raw).map(StageArtifact::from),
        ArtifactKind::Architecture => validate_architecture(raw).map(StageArtifact::from),
        ArtifactKind::Code => parse_code_bundle(raw).map(StageArtifact::from),
        ArtifactKind::Deployment => validate_deployment(raw).map(StageArtifact::from),
        ArtifactKind::Ui => parse_ui(raw).map(StageArtifact::from),
    }
}
