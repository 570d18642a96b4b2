//! Requirements specification produced by the analyzing stage.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Personality of the agent being built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    /// Neutral and businesslike.
    #[default]
    Professional,
    /// Warm and approachable.
    Friendly,
    /// Relaxed and informal.
    Casual,
    /// Strict and formal.
    Formal,
    /// Light-hearted.
    Playful,
    /// Supportive and understanding.
    Empathetic,
}

/// Data type of a declared input or output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IoKind {
    /// Free text.
    #[default]
    Text,
    /// A number.
    Number,
    /// A yes/no value.
    Boolean,
    /// An uploaded file.
    File,
    /// An image.
    Image,
    /// Structured JSON.
    Json,
}

/// Authentication scheme of an external integration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// No authentication.
    #[default]
    None,
    /// Static API key.
    ApiKey,
    /// OAuth 2.0 flow.
    Oauth2,
    /// HTTP basic auth.
    Basic,
    /// Bearer token.
    Bearer,
}

/// A declared input or output of the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IoField {
    /// Field name.
    pub name: String,
    /// Field type.
    #[serde(rename = "type")]
    pub kind: IoKind,
    /// Optional human description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// An external system the agent talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Integration {
    /// Integration name (e.g. "Zendesk").
    pub name: String,
    /// How the agent authenticates.
    pub auth_type: AuthType,
    /// What the integration is used for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

/// Operational constraints stated by the requester.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
    /// Upper bound on response time in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_response_time_ms: Option<u64>,
    /// Upper bound on cost per request in USD.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cost_per_request: Option<f64>,
}

/// A situation the agent must handle and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeCase {
    /// The situation.
    pub scenario: String,
    /// How the agent responds; never empty once the stage completes.
    #[serde(default)]
    pub mitigation: String,
}

/// Structured requirements for the agent being built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementsSpec {
    /// Artifact id.
    pub id: Uuid,
    /// The original description these requirements were derived from.
    #[serde(default)]
    pub description: String,
    /// Name of the agent.
    pub agent_name: String,
    /// One-sentence purpose.
    pub purpose: String,
    /// Personality of the agent.
    pub personality: Tone,
    /// What the agent can do.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Declared inputs.
    #[serde(default)]
    pub inputs: Vec<IoField>,
    /// Declared outputs.
    #[serde(default)]
    pub outputs: Vec<IoField>,
    /// External integrations.
    #[serde(default)]
    pub integrations: Vec<Integration>,
    /// Operational constraints.
    #[serde(default)]
    pub constraints: Constraints,
    /// Edge cases with mitigations.
    #[serde(default)]
    pub edge_cases: Vec<EdgeCase>,
    /// Complexity from 1 (trivial) to 10 (very complex).
    pub complexity_score: u8,
    /// Where the agent's knowledge comes from.
    #[serde(default)]
    pub data_sources: Vec<String>,
    /// Fields whose values were guessed rather than stated.
    #[serde(default)]
    pub inferred_fields: Vec<String>,
}

impl RequirementsSpec {
    /// Complexity above which a design needs multi-agent coordination.
    pub const HIGH_COMPLEXITY_THRESHOLD: u8 = 7;

    /// Returns true when the complexity score exceeds the threshold.
    #[must_use]
    pub const fn is_high_complexity(&self) -> bool {
        self.complexity_score > Self::HIGH_COMPLEXITY_THRESHOLD
    }

    /// Returns true when `field` was inferred rather than stated.
    #[must_use]
    pub fn is_inferred(&self, field: &str) -> bool {
        self.inferred_fields.iter().any(|f| f == field)
    }
}
