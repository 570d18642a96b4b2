//! Sample documents and artifacts.
//!
//! The JSON builders return what a model would answer; the typed builders
//! return artifacts as a finished stage would store them.

use serde_json::{json, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::artifacts::{
    AgentPattern, ArchitectureDocument, AuthType, CodeBundle, Component, Constraints,
    DeploymentResult, DeploymentStatus, EdgeCase, GeneratedUi, Integration, IoField, IoKind,
    ModelTier, RequirementsSpec, SourceFile, TestOutcome, Tone, Tradeoff,
};
use crate::stages::default_components;

/// A typical short build description.
pub const SUPPORT_BOT: &str = "build a support bot";

/// A requirements answer with the given complexity score.
#[must_use]
pub fn requirements_json(complexity: u8) -> Value {
    json!({
        "agentName": "Support Helper",
        "purpose": "Answer customer questions about orders and returns",
        "personality": "friendly",
        "capabilities": ["Look up order status", "Explain the returns policy"],
        "inputs": [{"name": "question", "type": "text", "description": "The customer's question"}],
        "outputs": [{"name": "answer", "type": "text"}],
        "integrations": [{"name": "Zendesk", "authType": "api_key", "purpose": "Create tickets"}],
        "constraints": {"maxResponseTimeMs": 5000},
        "edgeCases": [
            {"scenario": "Order number not found", "mitigation": "Ask the customer to check the number"}
        ],
        "complexityScore": complexity,
        "dataSources": ["Help center articles"]
    })
}

/// A processed requirements specification with the given complexity score.
#[must_use]
pub fn requirements_spec(complexity: u8) -> RequirementsSpec {
    RequirementsSpec {
        id: Uuid::new_v4(),
        description: SUPPORT_BOT.to_string(),
        agent_name: "Support Helper".to_string(),
        purpose: "Answer customer questions about orders and returns".to_string(),
        personality: Tone::Friendly,
        capabilities: vec![
            "Look up order status".to_string(),
            "Explain the returns policy".to_string(),
        ],
        inputs: vec![IoField {
            name: "question".to_string(),
            kind: IoKind::Text,
            description: Some("The customer's question".to_string()),
        }],
        outputs: vec![IoField {
            name: "answer".to_string(),
            kind: IoKind::Text,
            description: None,
        }],
        integrations: vec![Integration {
            name: "Zendesk".to_string(),
            auth_type: AuthType::ApiKey,
            purpose: Some("Create tickets".to_string()),
        }],
        constraints: Constraints {
            max_response_time_ms: Some(5000),
            max_cost_per_request: None,
        },
        edge_cases: vec![EdgeCase {
            scenario: "Order number not found".to_string(),
            mitigation: "Ask the customer to check the number".to_string(),
        }],
        complexity_score: complexity,
        data_sources: vec!["Help center articles".to_string()],
        inferred_fields: Vec::new(),
    }
}

/// A single-agent architecture answer without integration specs.
#[must_use]
pub fn architecture_json() -> Value {
    json!({
        "pattern": "single_agent",
        "model": "standard",
        "components": [
            {"name": "Conversation handler", "responsibility": "Parse questions and draft answers"},
            {"name": "Order lookup", "responsibility": "Fetch order status"}
        ],
        "tradeoffs": [
            {"decision": "Use a single agent", "pros": ["Low latency"], "cons": ["Less specialised"]}
        ],
        "estimatedLatencyMs": 1200,
        "estimatedCostPerRequest": 0.002
    })
}

/// A processed architecture document for `spec`.
#[must_use]
pub fn architecture_document(spec: &RequirementsSpec) -> ArchitectureDocument {
    ArchitectureDocument {
        id: Uuid::new_v4(),
        requirements_id: spec.id,
        pattern: AgentPattern::SingleAgent,
        model: ModelTier::Standard,
        components: vec![Component {
            name: "Conversation handler".to_string(),
            responsibility: "Parse questions and draft answers".to_string(),
        }],
        multi_agent_strategy: None,
        integration_specs: Vec::new(),
        tradeoffs: vec![Tradeoff {
            decision: "Use a single agent".to_string(),
            pros: vec!["Low latency".to_string()],
            cons: vec!["Less specialised".to_string()],
        }],
        estimated_latency_ms: Some(1200),
        estimated_cost_per_request: Some(0.002),
        feasibility_issues: Vec::new(),
    }
}

fn test_name(index: usize) -> String {
    format!("test_case_{index}")
}

const TEST_FAILURE: &str = "AssertionError: expected a polite answer";

/// A code bundle answer with one test per entry of `results`.
#[must_use]
pub fn code_bundle_json(results: &[bool]) -> Value {
    let tests: Vec<Value> = results
        .iter()
        .enumerate()
        .map(|(i, passed)| {
            if *passed {
                json!({"name": test_name(i), "passed": true})
            } else {
                json!({"name": test_name(i), "passed": false, "error": TEST_FAILURE})
            }
        })
        .collect();
    json!({
        "files": [
            {"path": "agent.py", "content": "def answer(q):\n    return 'Hello'\n", "language": "python"},
            {"path": "test_agent.py", "content": "from agent import answer\n", "language": "python"}
        ],
        "dependencies": {"openai": "^1.0"},
        "tests": tests
    })
}

/// A code bundle for `architecture` with one test per entry of `results`.
#[must_use]
pub fn code_bundle(architecture: &ArchitectureDocument, results: &[bool]) -> CodeBundle {
    let tests: Vec<TestOutcome> = results
        .iter()
        .enumerate()
        .map(|(i, passed)| TestOutcome {
            name: test_name(i),
            passed: *passed,
            error: (!passed).then(|| TEST_FAILURE.to_string()),
        })
        .collect();
    let validated = !tests.is_empty() && tests.iter().all(|t| t.passed);
    CodeBundle {
        id: Uuid::new_v4(),
        architecture_id: architecture.id,
        files: vec![
            SourceFile {
                path: "agent.py".to_string(),
                content: "def answer(q):\n    return 'Hello'\n".to_string(),
                language: Some("python".to_string()),
            },
            SourceFile {
                path: "test_agent.py".to_string(),
                content: "from agent import answer\n".to_string(),
                language: Some("python".to_string()),
            },
        ],
        dependencies: BTreeMap::from([("openai".to_string(), "^1.0".to_string())]),
        tests,
        validated,
        debug_iterations: 0,
        failure_report: None,
    }
}

/// A provider's deployment answer.
#[must_use]
pub fn deployment_json(provider: &str) -> Value {
    json!({
        "provider": provider,
        "deploymentId": format!("dep-{provider}"),
        "endpoint": format!("https://support-helper.{provider}.app"),
        "status": "live",
        "logs": ["Build succeeded"]
    })
}

/// A live hosted deployment of the bundle `code_bundle_id`.
#[must_use]
pub fn deployment_result(code_bundle_id: Uuid) -> DeploymentResult {
    DeploymentResult {
        id: Uuid::new_v4(),
        code_bundle_id,
        provider: "vercel".to_string(),
        deployment_id: "dep-vercel".to_string(),
        endpoint: "https://support-helper.vercel.app".to_string(),
        status: DeploymentStatus::Live,
        logs: vec!["Build succeeded".to_string()],
        fallback_used: false,
        local_instructions: Vec::new(),
        health_checked: true,
    }
}

/// A generated interface for `spec` served from `deployment`.
#[must_use]
pub fn generated_ui(spec: &RequirementsSpec, deployment: &DeploymentResult) -> GeneratedUi {
    GeneratedUi {
        id: Uuid::new_v4(),
        requirements_id: spec.id,
        deployment_id: deployment.id,
        components: default_components(spec),
        theme: Some("light".to_string()),
        public_url: Some(format!("{}/ui", deployment.endpoint)),
    }
}
