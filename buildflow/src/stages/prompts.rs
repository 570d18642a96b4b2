//! Prompt text for the model-backed stages.

use serde::Serialize;
use std::fmt::Write;

use crate::artifacts::{
    ArchitectureDocument, CodeBundle, DeploymentResult, RequirementsSpec, TestOutcome,
};
use crate::core::BuildOptions;

fn pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

pub(crate) fn requirements(description: &str, options: &BuildOptions) -> String {
    let mut prompt = String::from(
        "You are a product analyst. Turn the description below into a requirements \
         specification for an AI agent.\n\n",
    );
    let _ = writeln!(prompt, "Description:\n{description}\n");
    if let Some(name) = &options.name {
        let _ = writeln!(prompt, "The agent must be called \"{name}\".");
    }
    if let Some(tone) = options.tone {
        let _ = writeln!(prompt, "The agent's personality must be {tone:?}.");
    }
    prompt.push_str(
        "Answer with one JSON object with the fields: agentName, purpose, personality \
         (professional, friendly, casual, formal, playful or empathetic), capabilities, \
         inputs and outputs (each {name, type, description}), integrations \
         ({name, authType, purpose}), constraints ({maxResponseTimeMs, maxCostPerRequest}), \
         edgeCases ({scenario, mitigation}), complexityScore (1-10) and dataSources.",
    );
    prompt
}

pub(crate) fn architecture(spec: &RequirementsSpec) -> String {
    format!(
        "You are a software architect. Design the agent specified below.\n\n\
         Requirements:\n{}\n\n\
         Answer with one JSON object with the fields: pattern (single_agent, pipeline, \
         router_workers or multi_agent), model (standard or advanced), components \
         ({{name, responsibility}}), multiAgentStrategy ({{coordination, agents: [{{name, role, \
         responsibilities}}]}}) when more than one agent is needed, integrationSpecs \
         ({{name, endpoint, authType, methods}}) for every integration, tradeoffs \
         ({{decision, pros, cons}}), estimatedLatencyMs and estimatedCostPerRequest.",
        pretty(spec)
    )
}

pub(crate) fn code(spec: &RequirementsSpec, architecture: &ArchitectureDocument) -> String {
    format!(
        "You are a senior engineer. Implement the agent below, write tests for it and run them.\n\n\
         Requirements:\n{}\n\nArchitecture:\n{}\n\n\
         Answer with one JSON object with the fields: files ({{path, content, language}}), \
         dependencies (name to version) and tests ({{name, passed, error}}).",
        pretty(spec),
        pretty(architecture)
    )
}

pub(crate) fn repair(
    spec: &RequirementsSpec,
    architecture: &ArchitectureDocument,
    bundle: &CodeBundle,
    failing: &[TestOutcome],
) -> String {
    let mut prompt = code(spec, architecture);
    prompt.push_str("\n\nThe previous attempt produced these files:\n");
    for file in &bundle.files {
        let _ = writeln!(prompt, "--- {}\n{}", file.path, file.content);
    }
    prompt.push_str("\nThese tests failed. Fix the code so that every test passes:\n");
    for test in failing {
        match &test.error {
            Some(error) => {
                let _ = writeln!(prompt, "- {}: {error}", test.name);
            }
            None => {
                let _ = writeln!(prompt, "- {}", test.name);
            }
        }
    }
    prompt
}

pub(crate) fn ui(spec: &RequirementsSpec, deployment: &DeploymentResult) -> String {
    format!(
        "You are a UI designer. Design a simple web interface for the agent below, \
         served from {}.\n\nRequirements:\n{}\n\n\
         Answer with one JSON object with the fields: components ({{type, name, props}} where \
         type is input_form, response_display, loading, error or custom), theme and publicUrl.",
        deployment.endpoint,
        pretty(spec)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::Tone;
    use crate::testing::fixtures;

    #[test]
    fn test_requirements_prompt_mentions_overrides() {
        let options = BuildOptions::new().with_name("Ada").with_tone(Tone::Playful);
        let prompt = requirements("help me plan trips", &options);

        assert!(prompt.contains("help me plan trips"));
        assert!(prompt.contains("\"Ada\""));
        assert!(prompt.contains("Playful"));
    }

    #[test]
    fn test_repair_prompt_lists_failures() {
        let spec = fixtures::requirements_spec(3);
        let arch = fixtures::architecture_document(&spec);
        let bundle = fixtures::code_bundle(&arch, &[false]);
        let failing: Vec<_> = bundle.failing_tests().into_iter().cloned().collect();

        let prompt = repair(&spec, &arch, &bundle, &failing);
        assert!(prompt.contains(&format!("- {}", failing[0].name)));
        assert!(prompt.contains(&bundle.files[0].path));
    }
}
