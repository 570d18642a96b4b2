//! Architecting stage: requirements to architecture document.

use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

use super::{invoke_validated, prompts, StageInputs, StageWorker};
use crate::artifacts::{
    AgentPattern, AgentRole, ArchitectureDocument, FeasibilityIssue, IntegrationSpec, ModelTier,
    MultiAgentStrategy, RequirementsSpec, Tradeoff,
};
use crate::client::{BackoffClient, ModelRequest};
use crate::contracts::validate_architecture;
use crate::core::{PipelineStage, StageArtifact};
use crate::errors::StageError;
use crate::events::StageReporter;
use crate::utils::slugify;

/// Response-time budget below which a multi-agent design is flagged.
pub const LATENCY_BUDGET_MS: u64 = 3000;

/// Integration count above which a design is flagged.
pub const MAX_INTEGRATIONS: usize = 10;

/// Endpoint used when the model gives none for an integration.
#[must_use]
pub fn template_endpoint(integration: &str) -> String {
    format!("https://api.{}.example.com/v1", slugify(integration))
}

/// Lists the feasibility problems of `doc` for `spec`.
#[must_use]
pub fn assess_feasibility(
    doc: &ArchitectureDocument,
    spec: &RequirementsSpec,
) -> Vec<FeasibilityIssue> {
    let mut issues = Vec::new();
    if spec.is_high_complexity() && doc.model == ModelTier::Advanced {
        issues.push(FeasibilityIssue::Cost);
    }
    if doc.has_agents()
        && spec
            .constraints
            .max_response_time_ms
            .is_some_and(|ms| ms < LATENCY_BUDGET_MS)
    {
        issues.push(FeasibilityIssue::Latency);
    }
    if spec.integrations.len() > MAX_INTEGRATIONS {
        issues.push(FeasibilityIssue::Capability);
    }
    if spec.is_high_complexity() && spec.constraints.max_cost_per_request.is_some() {
        issues.push(FeasibilityIssue::Budget);
    }
    issues
}

fn tradeoff_for(issue: FeasibilityIssue, spec: &RequirementsSpec) -> Tradeoff {
    let strings = |items: &[&str]| items.iter().map(ToString::to_string).collect();
    match issue {
        FeasibilityIssue::Cost => Tradeoff {
            decision: "Use the advanced model tier".to_string(),
            pros: strings(&["Better reasoning on complex requests"]),
            cons: strings(&["Higher cost per request"]),
        },
        FeasibilityIssue::Latency => Tradeoff {
            decision: "Coordinate several agents per request".to_string(),
            pros: strings(&["Each agent stays focused on one task"]),
            cons: vec![format!(
                "Extra model round trips may exceed the {} ms response budget",
                spec.constraints.max_response_time_ms.unwrap_or(LATENCY_BUDGET_MS)
            )],
        },
        FeasibilityIssue::Capability => Tradeoff {
            decision: "Connect a large number of external services".to_string(),
            pros: strings(&["Covers every requested integration"]),
            cons: vec![format!(
                "{} integrations increase failure modes and maintenance",
                spec.integrations.len()
            )],
        },
        FeasibilityIssue::Budget => Tradeoff {
            decision: "Build a complex design under a per-request cost cap".to_string(),
            pros: strings(&["Predictable spend"]),
            cons: strings(&["May force a cheaper model or fewer agent calls"]),
        },
    }
}

fn default_strategy(spec: &RequirementsSpec, existing: Option<&MultiAgentStrategy>) -> MultiAgentStrategy {
    let specialist_duties = if spec.capabilities.is_empty() {
        vec![spec.purpose.clone()]
    } else {
        spec.capabilities.clone()
    };
    MultiAgentStrategy {
        coordination: existing.map(|s| s.coordination).unwrap_or_default(),
        agents: vec![
            AgentRole {
                name: "Coordinator".to_string(),
                role: "coordinator".to_string(),
                responsibilities: vec![
                    "Route each request to the specialist".to_string(),
                    "Assemble the final answer".to_string(),
                ],
            },
            AgentRole {
                name: format!("{} Specialist", spec.agent_name),
                role: "specialist".to_string(),
                responsibilities: specialist_duties,
            },
        ],
    }
}

/// Makes an architecture document consistent with its requirements.
///
/// High-complexity designs get a multi-agent strategy, every declared
/// integration gets a spec, and each feasibility problem is recorded with a
/// tradeoff. Existing tradeoffs are kept and none is added twice.
#[must_use]
pub fn post_process_architecture(
    mut doc: ArchitectureDocument,
    spec: &RequirementsSpec,
) -> ArchitectureDocument {
    if doc.id.is_nil() {
        doc.id = Uuid::new_v4();
    }
    doc.requirements_id = spec.id;

    if spec.is_high_complexity() && !doc.has_agents() {
        doc.multi_agent_strategy = Some(default_strategy(spec, doc.multi_agent_strategy.as_ref()));
        if doc.pattern == AgentPattern::SingleAgent {
            doc.pattern = AgentPattern::MultiAgent;
        }
    }

    for integration in &spec.integrations {
        if doc.integration_spec(&integration.name).is_none() {
            doc.integration_specs.push(IntegrationSpec {
                name: integration.name.clone(),
                endpoint: template_endpoint(&integration.name),
                auth_type: integration.auth_type,
                methods: Vec::new(),
            });
        }
    }

    for issue in assess_feasibility(&doc, spec) {
        if !doc.feasibility_issues.contains(&issue) {
            doc.feasibility_issues.push(issue);
        }
        let tradeoff = tradeoff_for(issue, spec);
        if !doc.tradeoffs.iter().any(|t| t.decision == tradeoff.decision) {
            doc.tradeoffs.push(tradeoff);
        }
    }
    doc
}

/// Runs the architecting stage.
#[derive(Debug, Clone)]
pub struct Architect {
    client: BackoffClient,
    validation_retries: u32,
}

impl Architect {
    /// Creates the worker.
    #[must_use]
    pub const fn new(client: BackoffClient, validation_retries: u32) -> Self {
        Self {
            client,
            validation_retries,
        }
    }
}

#[async_trait]
impl StageWorker for Architect {
    fn stage(&self) -> PipelineStage {
        PipelineStage::Architecting
    }

    async fn run(
        &self,
        inputs: &StageInputs,
        reporter: &StageReporter,
    ) -> Result<StageArtifact, StageError> {
        let spec = inputs.requirements(self.stage())?;
        let client = inputs.client(&self.client);
        reporter
            .progress("Designing the architecture", serde_json::Value::Null)
            .await;

        let request = ModelRequest::new("architecture", prompts::architecture(spec));
        let doc = invoke_validated(
            &client,
            &request,
            reporter,
            self.validation_retries,
            validate_architecture,
            |doc| post_process_architecture(doc, spec),
        )
        .await?;

        if !doc.feasibility_issues.is_empty() {
            warn!(
                build_id = %reporter.build_id(),
                issues = ?doc.feasibility_issues,
                "Architecture has feasibility issues"
            );
        }
        info!(
            build_id = %reporter.build_id(),
            pattern = ?doc.pattern,
            agents = doc.multi_agent_strategy.as_ref().map_or(0, |s| s.agents.len()),
            integrations = doc.integration_specs.len(),
            "Architecture ready"
        );
        Ok(doc.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{AuthType, Constraints, Integration};
    use crate::config::ClientConfig;
    use crate::contracts::validate_architecture;
    use crate::core::BuildOptions;
    use crate::testing::{fixtures, Script, ScriptedInvoker};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn bare_doc() -> ArchitectureDocument {
        validate_architecture(&fixtures::architecture_json())
            .into_result()
            .unwrap()
    }

    fn with_integrations(mut spec: RequirementsSpec, count: usize) -> RequirementsSpec {
        spec.integrations = (0..count)
            .map(|i| Integration {
                name: format!("Service {i}"),
                auth_type: AuthType::Bearer,
                purpose: None,
            })
            .collect();
        spec
    }

    #[test]
    fn test_template_endpoint() {
        assert_eq!(
            template_endpoint("Google Sheets API"),
            "https://api.google-sheets-api.example.com/v1"
        );
    }

    #[test]
    fn test_high_complexity_gets_strategy() {
        let spec = fixtures::requirements_spec(9);
        let doc = post_process_architecture(bare_doc(), &spec);

        let strategy = doc.multi_agent_strategy.as_ref().unwrap();
        assert_eq!(strategy.agents.len(), 2);
        assert_eq!(strategy.agents[0].role, "coordinator");
        assert_eq!(doc.pattern, AgentPattern::MultiAgent);
        assert_eq!(doc.requirements_id, spec.id);
    }

    #[test]
    fn test_low_complexity_untouched() {
        let spec = fixtures::requirements_spec(4);
        let doc = post_process_architecture(bare_doc(), &spec);

        assert!(doc.multi_agent_strategy.is_none());
        assert_eq!(doc.pattern, AgentPattern::SingleAgent);
    }

    #[test]
    fn test_missing_integration_specs_synthesized() {
        let spec = with_integrations(fixtures::requirements_spec(4), 3);
        let mut doc = bare_doc();
        doc.integration_specs.push(IntegrationSpec {
            name: "service 1".to_string(),
            endpoint: "https://svc1.internal".to_string(),
            auth_type: AuthType::Oauth2,
            methods: vec!["GET".to_string()],
        });

        let doc = post_process_architecture(doc, &spec);
        assert_eq!(doc.integration_specs.len(), 3);
        assert_eq!(doc.integration_specs[0].endpoint, "https://svc1.internal");
        let synthesized = doc.integration_spec("Service 0").unwrap();
        assert_eq!(synthesized.endpoint, "https://api.service-0.example.com/v1");
        assert_eq!(synthesized.auth_type, AuthType::Bearer);
    }

    #[test]
    fn test_feasibility_flags() {
        let mut spec = with_integrations(fixtures::requirements_spec(9), 11);
        spec.constraints = Constraints {
            max_response_time_ms: Some(2000),
            max_cost_per_request: Some(0.05),
        };
        let mut doc = bare_doc();
        doc.model = ModelTier::Advanced;

        let doc = post_process_architecture(doc, &spec);
        assert_eq!(
            doc.feasibility_issues,
            vec![
                FeasibilityIssue::Cost,
                FeasibilityIssue::Latency,
                FeasibilityIssue::Capability,
                FeasibilityIssue::Budget,
            ]
        );
        assert_eq!(doc.tradeoffs.len(), 1 + 4);
    }

    #[test]
    fn test_tradeoffs_not_duplicated() {
        let mut spec = fixtures::requirements_spec(9);
        spec.constraints.max_cost_per_request = Some(0.01);

        let once = post_process_architecture(bare_doc(), &spec);
        let twice = post_process_architecture(once.clone(), &spec);

        assert_eq!(once, twice);
        assert_eq!(once.feasibility_issues, vec![FeasibilityIssue::Budget]);
    }

    #[test]
    fn test_existing_tradeoffs_kept() {
        let spec = fixtures::requirements_spec(4);
        let doc = bare_doc();
        let original = doc.tradeoffs.clone();

        let doc = post_process_architecture(doc, &spec);
        assert_eq!(doc.tradeoffs, original);
    }

    #[tokio::test]
    async fn test_support_bot_scenario() {
        let spec = with_integrations(fixtures::requirements_spec(9), 2);
        let invoker = Arc::new(ScriptedInvoker::new());
        invoker.push("architecture", Script::json(fixtures::architecture_json()));
        let worker = Architect::new(BackoffClient::new(invoker.clone(), ClientConfig::new()), 2);
        let inputs = StageInputs::new("build a support bot", BuildOptions::new()).with_artifact(spec);

        let artifact = worker
            .run(&inputs, &StageReporter::silent(PipelineStage::Architecting))
            .await
            .unwrap();

        let StageArtifact::Architecture(doc) = artifact else {
            panic!("expected architecture");
        };
        assert!(doc.has_agents());
        assert_eq!(doc.integration_specs.len(), 2);
    }

    #[tokio::test]
    async fn test_requires_requirements() {
        let invoker = Arc::new(ScriptedInvoker::new());
        let worker = Architect::new(BackoffClient::new(invoker.clone(), ClientConfig::new()), 2);

        let err = worker
            .run(
                &StageInputs::new("x", BuildOptions::new()),
                &StageReporter::silent(PipelineStage::Architecting),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "prerequisite_missing");
        assert_eq!(invoker.call_count("architecture"), 0);
    }
}
