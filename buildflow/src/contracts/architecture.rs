//! Contract for the architecture document.

use serde_json::Value;

use super::reader::{whole_u64, FieldReader};
use super::Validation;
use crate::artifacts::{
    AgentRole, ArchitectureDocument, Component, IntegrationSpec, MultiAgentStrategy, Tradeoff,
};

/// Checks a raw architecture document.
#[must_use]
pub fn validate_architecture(raw: &Value) -> Validation<ArchitectureDocument> {
    let mut r = FieldReader::new();
    let Some(obj) = r.root(raw) else {
        return r.fail();
    };

    let pattern = r.tolerant(obj, "", "pattern");
    let model = r.tolerant(obj, "", "model");

    let components = r
        .objects(obj, "", "components")
        .into_iter()
        .map(|(path, item)| Component {
            name: r.required_text(item, &path, "name"),
            responsibility: r.optional_str(item, &path, "responsibility").unwrap_or_default(),
        })
        .collect();

    let multi_agent_strategy = r
        .optional_object(obj, "", "multiAgentStrategy")
        .map(|strategy| {
            let prefix = "multiAgentStrategy";
            let coordination = r.tolerant(strategy, prefix, "coordination");
            let agents = r
                .objects(strategy, prefix, "agents")
                .into_iter()
                .map(|(path, agent)| AgentRole {
                    name: r.required_text(agent, &path, "name"),
                    role: r.required_text(agent, &path, "role"),
                    responsibilities: r.string_list(agent, &path, "responsibilities"),
                })
                .collect();
            MultiAgentStrategy {
                coordination,
                agents,
            }
        });

    let integration_specs = r
        .objects(obj, "", "integrationSpecs")
        .into_iter()
        .map(|(path, item)| IntegrationSpec {
            name: r.required_text(item, &path, "name"),
            endpoint: r.required_text(item, &path, "endpoint"),
            auth_type: r.tolerant(item, &path, "authType"),
            methods: r.string_list(item, &path, "methods"),
        })
        .collect();

    let tradeoffs = r
        .objects(obj, "", "tradeoffs")
        .into_iter()
        .map(|(path, item)| Tradeoff {
            decision: r.required_text(item, &path, "decision"),
            pros: r.string_list(item, &path, "pros"),
            cons: r.string_list(item, &path, "cons"),
        })
        .collect();

    let estimated_latency_ms = r.non_negative(obj, "", "estimatedLatencyMs").map(whole_u64);
    let estimated_cost_per_request = r.non_negative(obj, "", "estimatedCostPerRequest");
    let feasibility_issues = r.variant_list(obj, "", "feasibilityIssues");

    let doc = ArchitectureDocument {
        id: FieldReader::id(obj, "id"),
        requirements_id: FieldReader::id(obj, "requirementsId"),
        pattern,
        model,
        components,
        multi_agent_strategy,
        integration_specs,
        tradeoffs,
        estimated_latency_ms,
        estimated_cost_per_request,
        feasibility_issues,
    };
    r.finish(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{AgentPattern, CoordinationMode, FeasibilityIssue, ModelTier};
    use crate::testing::fixtures;
    use serde_json::json;

    #[test]
    fn test_valid_document() {
        let doc = validate_architecture(&fixtures::architecture_json())
            .into_result()
            .unwrap();

        assert_eq!(doc.pattern, AgentPattern::SingleAgent);
        assert_eq!(doc.model, ModelTier::Standard);
        assert_eq!(doc.components.len(), 2);
        assert!(doc.multi_agent_strategy.is_none());
        assert_eq!(doc.estimated_latency_ms, Some(1200));
    }

    #[test]
    fn test_negative_estimates_are_rejected() {
        let mut raw = fixtures::architecture_json();
        raw["estimatedLatencyMs"] = json!(-1);
        raw["estimatedCostPerRequest"] = json!(-0.01);

        let errors = validate_architecture(&raw).into_result().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].path, "estimatedLatencyMs");
        assert_eq!(errors[1].path, "estimatedCostPerRequest");
    }

    #[test]
    fn test_strategy_agents_are_checked() {
        let mut raw = fixtures::architecture_json();
        raw["multiAgentStrategy"] = json!({
            "coordination": "round-robin",
            "agents": [{"name": "Router"}, "not an agent"]
        });

        let errors = validate_architecture(&raw).into_result().unwrap_err();
        let paths: Vec<_> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["multiAgentStrategy.agents[1]", "multiAgentStrategy.agents[0].role"]
        );
    }

    #[test]
    fn test_tolerant_strategy_and_issues() {
        let mut raw = fixtures::architecture_json();
        raw["multiAgentStrategy"] = json!({
            "coordination": "swarm",
            "agents": [{"name": "Router", "role": "coordinator"}]
        });
        raw["feasibilityIssues"] = json!(["latency", "vibes"]);

        let doc = validate_architecture(&raw).into_result().unwrap();
        let strategy = doc.multi_agent_strategy.unwrap();
        assert_eq!(strategy.coordination, CoordinationMode::Hierarchical);
        assert_eq!(doc.feasibility_issues, vec![FeasibilityIssue::Latency]);
    }

    #[test]
    fn test_integration_spec_requires_endpoint() {
        let mut raw = fixtures::architecture_json();
        raw["integrationSpecs"] = json!([{"name": "Zendesk", "authType": "api_key"}]);

        let errors = validate_architecture(&raw).into_result().unwrap_err();
        assert_eq!(errors[0].path, "integrationSpecs[0].endpoint");
        assert_eq!(errors[0].received, "missing");
    }
}
