//! Analyzing stage: description to requirements specification.

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use tracing::info;
use uuid::Uuid;

use super::{invoke_validated, prompts, StageInputs, StageWorker};
use crate::artifacts::{EdgeCase, RequirementsSpec};
use crate::client::{BackoffClient, ModelRequest};
use crate::contracts::validate_requirements;
use crate::core::{BuildOptions, PipelineStage, StageArtifact};
use crate::errors::StageError;
use crate::events::StageReporter;

/// Mitigation given to edge cases that arrive without one.
pub const DEFAULT_MITIGATION: &str =
    "Respond gracefully, explain what went wrong and ask the user for clarification";

/// Scenario added when the model lists no edge cases.
pub const DEFAULT_EDGE_CASE: &str = "Malformed or empty input";

#[allow(clippy::expect_used)]
static TONE_LANGUAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(tone|personality|voice|friendly|casual|formal|playful|empathetic|professional|polite|witty|cheerful|humou?r\w*)\b",
    )
    .expect("valid pattern")
});

#[allow(clippy::expect_used)]
static DATA_SOURCE_LANGUAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(data\s?base|api|apis|spreadsheets?|sheets?|csv|docs|documents?|documentation|knowledge\s?base|websites?|crm|feeds?|datasets?|files?|sql|inbox|calendar)\b",
    )
    .expect("valid pattern")
});

/// Fills the gaps the model leaves in a requirements specification.
///
/// Assigns an id, applies the build's name and tone overrides, gives every
/// edge case a mitigation (adding a default case when there are none) and
/// records which fields were inferred rather than stated in the
/// description. Running it twice gives the same result.
#[must_use]
pub fn post_process_requirements(
    mut spec: RequirementsSpec,
    description: &str,
    options: &BuildOptions,
) -> RequirementsSpec {
    if spec.id.is_nil() {
        spec.id = Uuid::new_v4();
    }
    if spec.description.trim().is_empty() {
        spec.description = description.to_string();
    }
    if let Some(name) = options.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        spec.agent_name = name.to_string();
    }
    if let Some(tone) = options.tone {
        spec.personality = tone;
    }

    if spec.edge_cases.is_empty() {
        spec.edge_cases.push(EdgeCase {
            scenario: DEFAULT_EDGE_CASE.to_string(),
            mitigation: String::new(),
        });
    }
    for case in &mut spec.edge_cases {
        if case.mitigation.trim().is_empty() {
            case.mitigation = DEFAULT_MITIGATION.to_string();
        }
    }

    if options.tone.is_none() && !TONE_LANGUAGE.is_match(description) {
        mark_inferred(&mut spec, "personality");
    }
    if !DATA_SOURCE_LANGUAGE.is_match(description) {
        mark_inferred(&mut spec, "dataSources");
    }
    spec
}

fn mark_inferred(spec: &mut RequirementsSpec, field: &str) {
    if !spec.is_inferred(field) {
        spec.inferred_fields.push(field.to_string());
    }
}

/// Runs the analyzing stage.
#[derive(Debug, Clone)]
pub struct RequirementsAnalyzer {
    client: BackoffClient,
    validation_retries: u32,
}

impl RequirementsAnalyzer {
    /// Creates the worker.
    #[must_use]
    pub const fn new(client: BackoffClient, validation_retries: u32) -> Self {
        Self {
            client,
            validation_retries,
        }
    }

    /// Produces a requirements specification for `description`.
    ///
    /// # Errors
    ///
    /// See [`invoke_validated`].
    pub async fn analyze(
        &self,
        client: &BackoffClient,
        description: &str,
        options: &BuildOptions,
        reporter: &StageReporter,
    ) -> Result<RequirementsSpec, StageError> {
        reporter
            .progress("Analyzing the description", serde_json::Value::Null)
            .await;
        let request = ModelRequest::new("requirements", prompts::requirements(description, options));

        let spec = invoke_validated(
            client,
            &request,
            reporter,
            self.validation_retries,
            validate_requirements,
            |spec| post_process_requirements(spec, description, options),
        )
        .await?;

        info!(
            build_id = %reporter.build_id(),
            agent = %spec.agent_name,
            complexity = spec.complexity_score,
            integrations = spec.integrations.len(),
            inferred = ?spec.inferred_fields,
            "Requirements ready"
        );
        Ok(spec)
    }
}

#[async_trait]
impl StageWorker for RequirementsAnalyzer {
    fn stage(&self) -> PipelineStage {
        PipelineStage::Analyzing
    }

    async fn run(
        &self,
        inputs: &StageInputs,
        reporter: &StageReporter,
    ) -> Result<StageArtifact, StageError> {
        let client = inputs.client(&self.client);
        self.analyze(&client, &inputs.description, &inputs.options, reporter)
            .await
            .map(StageArtifact::from)
    }
}
