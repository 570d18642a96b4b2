//! Error types for buildflow.
//!
//! The taxonomy follows the failure classes a build can hit: transient and
//! fatal API failures, output-shape and schema-validation failures, missing
//! prerequisites, unknown builds and cooperative cancellation.

use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::contracts::{summarize, FieldError};
use crate::core::{PipelineStage, UnknownStageError};

/// The main error type for buildflow operations.
#[derive(Debug, Error)]
pub enum BuildflowError {
    /// A model call failed.
    #[error("{0}")]
    Client(#[from] ClientError),

    /// A stage failed.
    #[error("{0}")]
    Stage(#[from] StageError),

    /// Configuration could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// No build is registered under the id.
    #[error("Build not found")]
    UnknownBuild(Uuid),

    /// A retry was requested while the build is still running.
    #[error("Build is already running")]
    BuildRunning(Uuid),

    /// A stage name did not parse.
    #[error("{0}")]
    UnknownStage(#[from] UnknownStageError),

    /// The deployment collaborator failed outside the fallback chain.
    #[error("Deployment error: {0}")]
    Deployment(String),
}

impl BuildflowError {
    /// Returns a stable identifier for the error class.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Client(e) => e.kind(),
            Self::Stage(e) => e.kind(),
            Self::Config(_) => "config",
            Self::UnknownBuild(_) => "unknown_build",
            Self::BuildRunning(_) => "build_running",
            Self::UnknownStage(_) => "unknown_stage",
            Self::Deployment(_) => "deployment",
        }
    }
}

/// Failure of a single model call, after classification.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// The request never produced an HTTP status.
    #[error("Network error: {message}")]
    Network {
        /// Transport error text.
        message: String,
    },

    /// The server answered with an error status.
    #[error("API error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error text from the server.
        message: String,
        /// Whether another attempt may succeed.
        retryable: bool,
        /// Server-specified wait before the next attempt.
        retry_after: Option<Duration>,
    },

    /// The answer did not have the expected shape.
    #[error("Unexpected output at '{path}': expected {expected}, received {received}")]
    OutputShape {
        /// Path of the offending value.
        path: String,
        /// What was expected.
        expected: String,
        /// What was found.
        received: String,
    },

    /// The build was cancelled while the call was in flight.
    #[error("Call cancelled")]
    Cancelled,
}

impl ClientError {
    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates an output-shape error.
    #[must_use]
    pub fn output_shape(
        path: impl Into<String>,
        expected: impl Into<String>,
        received: impl Into<String>,
    ) -> Self {
        Self::OutputShape {
            path: path.into(),
            expected: expected.into(),
            received: received.into(),
        }
    }

    /// Returns true when another attempt may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::Api { retryable, .. } => *retryable,
            Self::OutputShape { .. } | Self::Cancelled => false,
        }
    }

    /// Returns the server-specified wait, if any.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Api { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Returns the HTTP status, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns a stable identifier for the error class.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        if self.is_retryable() {
            return "transient_api";
        }
        match self {
            Self::OutputShape { .. } => "output_shape",
            Self::Cancelled => "cancelled",
            _ => "fatal_api",
        }
    }

    /// Serialize the error for event payloads.
    #[must_use]
    pub fn to_dict(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("kind".to_string(), serde_json::json!(self.kind()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        match self {
            Self::Network { .. } | Self::Cancelled => {}
            Self::Api {
                status,
                retryable,
                retry_after,
                ..
            } => {
                map.insert("status".to_string(), serde_json::json!(status));
                map.insert("retryable".to_string(), serde_json::json!(retryable));
                if let Some(wait) = retry_after {
                    let ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
                    map.insert("retryAfterMs".to_string(), serde_json::json!(ms));
                }
            }
            Self::OutputShape {
                path,
                expected,
                received,
            } => {
                map.insert("path".to_string(), serde_json::json!(path));
                map.insert("expected".to_string(), serde_json::json!(expected));
                map.insert("received".to_string(), serde_json::json!(received));
            }
        }
        serde_json::Value::Object(map)
    }
}

/// Why a stage could not produce its artifact.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StageError {
    /// The model call failed.
    #[error("{0}")]
    Model(ClientError),

    /// Every attempt produced a document that broke its contract.
    #[error("Validation failed after {attempts} attempts: {}", summarize(errors))]
    Validation {
        /// Attempts made.
        attempts: u32,
        /// Errors from the last attempt.
        errors: Vec<FieldError>,
    },

    /// The model answer could not be parsed into the stage's output.
    #[error("Malformed output: {}", summarize(errors))]
    Malformed {
        /// Shape errors.
        errors: Vec<FieldError>,
    },

    /// A required upstream artifact is missing.
    #[error("Cannot run {stage}: missing {missing} artifact")]
    Prerequisite {
        /// Stage that could not run.
        stage: PipelineStage,
        /// Stage whose artifact is missing.
        missing: PipelineStage,
    },

    /// The worker panicked.
    #[error("Internal error: {0}")]
    Internal(String),

    /// The build was cancelled.
    #[error("Build cancelled")]
    Cancelled,
}

impl From<ClientError> for StageError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::Cancelled => Self::Cancelled,
            other => Self::Model(other),
        }
    }
}

impl StageError {
    /// Returns a stable identifier for the error class.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Model(e) => e.kind(),
            Self::Validation { .. } => "schema_validation",
            Self::Malformed { .. } => "output_shape",
            Self::Prerequisite { .. } => "prerequisite_missing",
            Self::Internal(_) => "internal",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns true for cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Serialize the error for event payloads.
    #[must_use]
    pub fn to_dict(&self) -> serde_json::Value {
        match self {
            Self::Model(e) => e.to_dict(),
            Self::Validation { attempts, errors } => serde_json::json!({
                "kind": self.kind(),
                "attempts": attempts,
                "errors": errors.iter().map(FieldError::to_dict).collect::<Vec<_>>(),
            }),
            Self::Malformed { errors } => serde_json::json!({
                "kind": self.kind(),
                "errors": errors.iter().map(FieldError::to_dict).collect::<Vec<_>>(),
            }),
            Self::Prerequisite { stage, missing } => serde_json::json!({
                "kind": self.kind(),
                "stage": stage,
                "missing": missing,
            }),
            Self::Internal(message) => serde_json::json!({
                "kind": self.kind(),
                "message": message,
            }),
            Self::Cancelled => serde_json::json!({ "kind": self.kind() }),
        }
    }
}

/// Error raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid configuration JSON.
    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("Invalid config value for '{field}': {message}")]
    Invalid {
        /// Field path.
        field: String,
        /// What is wrong.
        message: String,
    },
}

/// Result alias for buildflow operations.
pub type Result<T> = std::result::Result<T, BuildflowError>;
