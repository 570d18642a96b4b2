//! Pipeline stage enum.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the five ordered pipeline phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Requirements analysis of the description.
    Analyzing,
    /// Architecture design from the requirements.
    Architecting,
    /// Code generation with the repair loop.
    Generating,
    /// Deployment through the provider fallback chain.
    Deploying,
    /// Generation of the agent's user interface.
    Designing,
}

impl PipelineStage {
    /// Every stage, in execution order.
    pub const ALL: [Self; 5] = [
        Self::Analyzing,
        Self::Architecting,
        Self::Generating,
        Self::Deploying,
        Self::Designing,
    ];

    /// Returns the wire name of the stage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Analyzing => "analyzing",
            Self::Architecting => "architecting",
            Self::Generating => "generating",
            Self::Deploying => "deploying",
            Self::Designing => "designing",
        }
    }

    /// Position of the stage in [`PipelineStage::ALL`].
    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Self::Analyzing => 0,
            Self::Architecting => 1,
            Self::Generating => 2,
            Self::Deploying => 3,
            Self::Designing => 4,
        }
    }

    /// Returns this stage and every stage after it.
    #[must_use]
    pub fn remaining(&self) -> &'static [Self] {
        &Self::ALL[self.index()..]
    }

    /// Returns the stage that runs after this one, if any.
    #[must_use]
    pub fn next(&self) -> Option<Self> {
        Self::ALL.get(self.index() + 1).copied()
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stage name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown pipeline stage: '{0}'")]
pub struct UnknownStageError(pub String);

impl FromStr for PipelineStage {
    type Err = UnknownStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == normalized)
            .ok_or_else(|| UnknownStageError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display() {
        assert_eq!(PipelineStage::Analyzing.to_string(), "analyzing");
        assert_eq!(PipelineStage::Designing.to_string(), "designing");
    }

    #[test]
    fn test_stage_order() {
        assert_eq!(PipelineStage::ALL[0], PipelineStage::Analyzing);
        assert_eq!(PipelineStage::Generating.next(), Some(PipelineStage::Deploying));
        assert_eq!(PipelineStage::Designing.next(), None);
        assert_eq!(PipelineStage::Deploying.remaining().len(), 2);
    }

    #[test]
    fn test_stage_from_str() {
        assert_eq!("analyzing".parse::<PipelineStage>(), Ok(PipelineStage::Analyzing));
        assert_eq!(" Deploying ".parse::<PipelineStage>(), Ok(PipelineStage::Deploying));
        assert!("compiling".parse::<PipelineStage>().is_err());
    }

    #[test]
    fn test_stage_serialize() {
        let json = serde_json::to_string(&PipelineStage::Architecting).unwrap();
        assert_eq!(json, r#""architecting""#);

        let deserialized: PipelineStage = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, PipelineStage::Architecting);
    }
}
