//! Architecture document produced by the architecting stage.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AuthType;

/// Overall shape of the agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentPattern {
    /// One agent handles everything.
    #[default]
    SingleAgent,
    /// A fixed sequence of steps.
    Pipeline,
    /// A router dispatching to workers.
    RouterWorkers,
    /// Several cooperating agents.
    MultiAgent,
}

/// Model tier the design runs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    /// Fast, cheap model.
    #[default]
    Standard,
    /// Higher-cost, more capable model.
    Advanced,
}

/// How agents in a multi-agent design coordinate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinationMode {
    /// A coordinator delegates to specialists.
    #[default]
    Hierarchical,
    /// Agents hand off in order.
    Sequential,
    /// Agents work concurrently and results are merged.
    Parallel,
}

/// A building block of the design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    /// Component name.
    pub name: String,
    /// What it is responsible for.
    pub responsibility: String,
}

/// One agent in a multi-agent design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRole {
    /// Agent name.
    pub name: String,
    /// Role title (e.g. "coordinator").
    pub role: String,
    /// Responsibilities.
    #[serde(default)]
    pub responsibilities: Vec<String>,
}

/// Coordination plan for designs with several agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiAgentStrategy {
    /// How agents coordinate.
    pub coordination: CoordinationMode,
    /// The agents.
    #[serde(default)]
    pub agents: Vec<AgentRole>,
}

/// How the agent talks to one declared integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationSpec {
    /// Integration name, matching the requirements.
    pub name: String,
    /// Base endpoint.
    pub endpoint: String,
    /// Authentication scheme.
    pub auth_type: AuthType,
    /// Operations used.
    #[serde(default)]
    pub methods: Vec<String>,
}

/// A design decision with its consequences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tradeoff {
    /// The decision taken.
    pub decision: String,
    /// Benefits.
    #[serde(default)]
    pub pros: Vec<String>,
    /// Costs.
    #[serde(default)]
    pub cons: Vec<String>,
}

/// A feasibility rule the design violates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeasibilityIssue {
    /// High complexity on the higher-cost model.
    Cost,
    /// Multi-agent coordination under a tight response-time budget.
    Latency,
    /// More integrations than one agent can reasonably juggle.
    Capability,
    /// An explicit cost ceiling on a high-complexity design.
    Budget,
}

/// The architecture of the agent being built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchitectureDocument {
    /// Artifact id.
    pub id: Uuid,
    /// The requirements this design was derived from.
    pub requirements_id: Uuid,
    /// Overall pattern.
    pub pattern: AgentPattern,
    /// Model tier.
    pub model: ModelTier,
    /// Building blocks.
    #[serde(default)]
    pub components: Vec<Component>,
    /// Coordination plan, required above the complexity threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_agent_strategy: Option<MultiAgentStrategy>,
    /// One entry per declared integration.
    #[serde(default)]
    pub integration_specs: Vec<IntegrationSpec>,
    /// Design decisions.
    #[serde(default)]
    pub tradeoffs: Vec<Tradeoff>,
    /// Expected response time in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_latency_ms: Option<u64>,
    /// Expected cost per request in USD.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_cost_per_request: Option<f64>,
    /// Feasibility rules the design violates.
    #[serde(default)]
    pub feasibility_issues: Vec<FeasibilityIssue>,
}

impl ArchitectureDocument {
    /// Returns true when a strategy with at least one agent is present.
    #[must_use]
    pub fn has_agents(&self) -> bool {
        self.multi_agent_strategy
            .as_ref()
            .is_some_and(|strategy| !strategy.agents.is_empty())
    }

    /// Returns the integration spec named `name` (case-insensitive).
    #[must_use]
    pub fn integration_spec(&self, name: &str) -> Option<&IntegrationSpec> {
        self.integration_specs
            .iter()
            .find(|spec| spec.name.eq_ignore_ascii_case(name))
    }
}
