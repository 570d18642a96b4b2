//! Deployment result produced by the deploying stage.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Provider name used for the synthesized local fallback.
pub const LOCAL_PROVIDER: &str = "local";

/// State of a deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    /// Serving traffic.
    Live,
    /// Not yet serving.
    #[default]
    Pending,
    /// Deployed but unhealthy.
    Error,
}

/// Where and how the generated agent was deployed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentResult {
    /// Artifact id.
    pub id: Uuid,
    /// The code bundle that was deployed.
    pub code_bundle_id: Uuid,
    /// Provider that hosts the deployment.
    pub provider: String,
    /// Provider-side deployment id.
    #[serde(default)]
    pub deployment_id: String,
    /// Public endpoint.
    pub endpoint: String,
    /// Current status.
    pub status: DeploymentStatus,
    /// Provider log lines.
    #[serde(default)]
    pub logs: Vec<String>,
    /// True when every provider failed and this is the local fallback.
    #[serde(default)]
    pub fallback_used: bool,
    /// Steps to run the agent locally.
    #[serde(default)]
    pub local_instructions: Vec<String>,
    /// Whether the endpoint was health-checked.
    #[serde(default)]
    pub health_checked: bool,
}

impl DeploymentResult {
    /// Returns true for the synthesized local fallback.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.provider == LOCAL_PROVIDER
    }
}
