//! Generating stage: architecture to a tested code bundle.

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{prompts, StageInputs, StageWorker};
use crate::artifacts::{ArchitectureDocument, CodeBundle, FailureReport, TestOutcome};
use crate::client::{BackoffClient, ModelRequest};
use crate::contracts::parse_code_bundle;
use crate::core::{PipelineStage, StageArtifact};
use crate::errors::StageError;
use crate::events::StageReporter;

/// Runs the generating stage with a bounded repair loop.
///
/// The first generation must succeed. After that, a bundle whose tests fail
/// is regenerated with the failing tests in the request, up to
/// `repair_iterations` times. A bundle that never passes is still returned,
/// marked unvalidated and carrying a [`FailureReport`].
#[derive(Debug, Clone)]
pub struct CodeGenerator {
    client: BackoffClient,
    repair_iterations: u32,
}

impl CodeGenerator {
    /// Creates the worker.
    #[must_use]
    pub const fn new(client: BackoffClient, repair_iterations: u32) -> Self {
        Self {
            client,
            repair_iterations,
        }
    }

    async fn generate(
        client: &BackoffClient,
        request: &ModelRequest,
        architecture: &ArchitectureDocument,
        reporter: &StageReporter,
    ) -> Result<CodeBundle, StageError> {
        let output = client.call(request, reporter).await?;
        let mut bundle = parse_code_bundle(&output.content)
            .into_result()
            .map_err(|errors| StageError::Malformed { errors })?;
        if bundle.id.is_nil() {
            bundle.id = Uuid::new_v4();
        }
        bundle.architecture_id = architecture.id;
        bundle.validated = false;
        bundle.failure_report = None;
        Ok(bundle)
    }

    async fn report_tests(bundle: &CodeBundle, iteration: u32, reporter: &StageReporter) {
        for outcome in &bundle.tests {
            reporter.test_result(outcome, iteration).await;
        }
    }

    fn accept(mut bundle: CodeBundle, iterations: u32) -> CodeBundle {
        bundle.validated = true;
        bundle.debug_iterations = iterations;
        bundle.failure_report = None;
        bundle
    }

    fn give_up(mut bundle: CodeBundle, iterations: u32, last_error: Option<String>) -> CodeBundle {
        let failing = bundle.failing_tests();
        let mut unresolved: Vec<String> = failing
            .iter()
            .map(|t| match &t.error {
                Some(error) => format!("{}: {error}", t.name),
                None => t.name.clone(),
            })
            .collect();
        if bundle.tests.is_empty() {
            unresolved.push("No tests were produced".to_string());
        }
        let last_error = last_error.or_else(|| failing.iter().rev().find_map(|t| t.error.clone()));

        bundle.validated = false;
        bundle.debug_iterations = iterations;
        bundle.failure_report = Some(FailureReport {
            unresolved_issues: unresolved,
            iterations,
            last_error,
        });
        bundle
    }
}

#[async_trait]
impl StageWorker for CodeGenerator {
    fn stage(&self) -> PipelineStage {
        PipelineStage::Generating
    }

    async fn run(
        &self,
        inputs: &StageInputs,
        reporter: &StageReporter,
    ) -> Result<StageArtifact, StageError> {
        let architecture = inputs.architecture(self.stage())?;
        let spec = inputs.requirements(self.stage())?;
        let client = inputs.client(&self.client);

        reporter
            .progress("Generating code", json!({ "maxRepairIterations": self.repair_iterations }))
            .await;
        let request = ModelRequest::new("code", prompts::code(spec, architecture));
        let mut bundle = Self::generate(&client, &request, architecture, reporter).await?;
        Self::report_tests(&bundle, 0, reporter).await;

        if bundle.all_tests_pass() {
            info!(build_id = %reporter.build_id(), tests = bundle.tests.len(), "Generated code passed its tests");
            return Ok(Self::accept(bundle, 0).into());
        }

        let mut last_error = None;
        for iteration in 1..=self.repair_iterations {
            if reporter.is_cancelled() {
                return Err(StageError::Cancelled);
            }

            let failing: Vec<TestOutcome> = bundle.failing_tests().into_iter().cloned().collect();
            reporter
                .progress(
                    &format!("Repair iteration {iteration} of {}", self.repair_iterations),
                    json!({
                        "iteration": iteration,
                        "failingTests": failing.iter().map(|t| &t.name).collect::<Vec<_>>(),
                    }),
                )
                .await;
            debug!(
                build_id = %reporter.build_id(),
                iteration,
                failing = failing.len(),
                "Repairing generated code"
            );

            let request = ModelRequest::new(
                "repair",
                prompts::repair(spec, architecture, &bundle, &failing),
            );
            match Self::generate(&client, &request, architecture, reporter).await {
                Ok(candidate) => {
                    Self::report_tests(&candidate, iteration, reporter).await;
                    bundle = candidate;
                    if bundle.all_tests_pass() {
                        info!(build_id = %reporter.build_id(), iteration, "Repaired code passed its tests");
                        return Ok(Self::accept(bundle, iteration).into());
                    }
                }
                Err(StageError::Cancelled) => return Err(StageError::Cancelled),
                Err(error) => {
                    warn!(
                        build_id = %reporter.build_id(),
                        iteration,
                        error = %error,
                        "Repair generation failed; keeping previous bundle"
                    );
                    last_error = Some(error.to_string());
                }
            }
        }

        let bundle = Self::give_up(bundle, self.repair_iterations, last_error);
        warn!(
            build_id = %reporter.build_id(),
            iterations = self.repair_iterations,
            unresolved = bundle.failure_report.as_ref().map_or(0, |r| r.unresolved_issues.len()),
            "Code still failing after repair; continuing with best effort"
        );
        Ok(bundle.into())
    }
}
