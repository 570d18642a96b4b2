//! Deploying stage: provider fallback chain with a local last resort.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{StageInputs, StageWorker};
use crate::artifacts::{CodeBundle, DeploymentResult, DeploymentStatus, LOCAL_PROVIDER};
use crate::contracts::{summarize, validate_deployment, Validation};
use crate::core::{PipelineStage, StageArtifact};
use crate::errors::{BuildflowError, StageError};
use crate::events::StageReporter;

/// The deployment collaborator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Deployer: Send + Sync {
    /// Deploys `bundle` to `provider`, returning the provider's raw result.
    async fn deploy(&self, bundle: &CodeBundle, provider: &str) -> Result<Value, BuildflowError>;

    /// Returns true when `endpoint` answers.
    async fn health_check(&self, endpoint: &str) -> bool;

    /// Removes a deployment.
    async fn teardown(&self, deployment_id: &str) -> Result<(), BuildflowError>;
}

/// Builds the result used when no provider could host the bundle.
#[must_use]
pub fn local_fallback(bundle: &CodeBundle, port: u16, attempted: &[String]) -> DeploymentResult {
    let endpoint = format!("http://localhost:{port}");
    let language = bundle.primary_language().map(str::to_ascii_lowercase);
    let deps: Vec<&str> = bundle.dependencies.keys().map(String::as_str).collect();
    let files: Vec<&str> = bundle.files.iter().map(|f| f.path.as_str()).collect();

    let mut steps = vec![format!(
        "Save the generated files ({}) into a new directory",
        files.join(", ")
    )];
    if !deps.is_empty() {
        steps.push(match language.as_deref() {
            Some("python") => format!("Install dependencies: pip install {}", deps.join(" ")),
            Some("javascript" | "typescript") => {
                format!("Install dependencies: npm install {}", deps.join(" "))
            }
            _ => format!("Install dependencies: {}", deps.join(", ")),
        });
    }
    let entry = files.first().copied().unwrap_or("the entry point");
    steps.push(match language.as_deref() {
        Some("python") => format!("Start the agent: PORT={port} python {entry}"),
        Some("javascript") => format!("Start the agent: PORT={port} node {entry}"),
        Some("typescript") => format!("Start the agent: PORT={port} npx tsx {entry}"),
        _ => format!("Start the agent from {entry} listening on port {port}"),
    });
    steps.push(format!("Open {endpoint} to talk to the agent"));

    let log = if attempted.is_empty() {
        "No deployment providers configured".to_string()
    } else {
        format!("Every provider failed: {}", attempted.join(", "))
    };

    DeploymentResult {
        id: Uuid::new_v4(),
        code_bundle_id: bundle.id,
        provider: LOCAL_PROVIDER.to_string(),
        deployment_id: String::new(),
        endpoint,
        status: DeploymentStatus::Pending,
        logs: vec![log],
        fallback_used: true,
        local_instructions: steps,
        health_checked: false,
    }
}

/// Runs the deploying stage.
///
/// Providers are tried in order. A provider error or a result that breaks
/// the deployment contract moves on to the next provider. The first valid
/// result is health-checked and returned; a failed check marks it as an
/// error without failing the stage. When every provider fails, the local
/// fallback is returned.
#[derive(Clone)]
pub struct DeploymentEngine {
    deployer: Arc<dyn Deployer>,
    providers: Vec<String>,
    local_port: u16,
}

impl DeploymentEngine {
    /// Creates the worker.
    #[must_use]
    pub fn new(deployer: Arc<dyn Deployer>, providers: Vec<String>, local_port: u16) -> Self {
        Self {
            deployer,
            providers,
            local_port,
        }
    }

    /// Deploys `bundle` through the chain.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::Cancelled`] when the build is cancelled.
    pub async fn deploy(
        &self,
        bundle: &CodeBundle,
        providers: &[String],
        reporter: &StageReporter,
    ) -> Result<DeploymentResult, StageError> {
        let mut attempted = Vec::new();

        for (index, provider) in providers.iter().enumerate() {
            if reporter.is_cancelled() {
                return Err(StageError::Cancelled);
            }
            attempted.push(provider.clone());
            reporter
                .progress(
                    &format!("Deploying to {provider}"),
                    json!({ "provider": provider, "attempt": index + 1 }),
                )
                .await;

            let raw = match self.deployer.deploy(bundle, provider).await {
                Ok(raw) => raw,
                Err(error) => {
                    warn!(build_id = %reporter.build_id(), provider = %provider, error = %error, "Deployment failed");
                    reporter
                        .progress(
                            &format!("Deployment to {provider} failed"),
                            json!({ "provider": provider, "error": error.to_string() }),
                        )
                        .await;
                    continue;
                }
            };

            let mut result = match validate_deployment(&raw) {
                Validation::Valid(result) => result,
                Validation::Invalid(errors) => {
                    warn!(
                        build_id = %reporter.build_id(),
                        provider = %provider,
                        errors = %summarize(&errors),
                        "Deployment result is invalid"
                    );
                    reporter
                        .progress(
                            &format!("Deployment to {provider} returned an invalid result"),
                            json!({ "provider": provider, "error": summarize(&errors) }),
                        )
                        .await;
                    continue;
                }
            };

            if result.id.is_nil() {
                result.id = Uuid::new_v4();
            }
            result.code_bundle_id = bundle.id;
            result.fallback_used = index > 0;

            if reporter.is_cancelled() {
                return Err(StageError::Cancelled);
            }
            let healthy = self.deployer.health_check(&result.endpoint).await;
            result.health_checked = true;
            if healthy {
                if result.status == DeploymentStatus::Pending {
                    result.status = DeploymentStatus::Live;
                }
                info!(build_id = %reporter.build_id(), provider = %provider, endpoint = %result.endpoint, "Deployment is live");
            } else {
                result.status = DeploymentStatus::Error;
                result
                    .logs
                    .push(format!("Health check failed for {}", result.endpoint));
                warn!(build_id = %reporter.build_id(), provider = %provider, endpoint = %result.endpoint, "Health check failed");
            }
            return Ok(result);
        }

        let local = local_fallback(bundle, self.local_port, &attempted);
        if let Ok(raw) = serde_json::to_value(&local) {
            if let Validation::Invalid(errors) = validate_deployment(&raw) {
                warn!(
                    build_id = %reporter.build_id(),
                    errors = %summarize(&errors),
                    "Local fallback does not satisfy the deployment contract; using it anyway"
                );
            }
        }
        info!(
            build_id = %reporter.build_id(),
            attempted = attempted.len(),
            endpoint = %local.endpoint,
            "Falling back to local deployment"
        );
        reporter
            .progress(
                "No provider succeeded; prepared local run instructions",
                json!({ "attempted": attempted }),
            )
            .await;
        Ok(local)
    }

    /// Removes a hosted deployment. Local results need no teardown.
    ///
    /// # Errors
    ///
    /// Returns the collaborator's error.
    pub async fn teardown(&self, result: &DeploymentResult) -> Result<(), BuildflowError> {
        if result.is_local() || result.deployment_id.is_empty() {
            return Ok(());
        }
        self.deployer.teardown(&result.deployment_id).await
    }
}

impl std::fmt::Debug for DeploymentEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentEngine")
            .field("providers", &self.providers)
            .field("local_port", &self.local_port)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl StageWorker for DeploymentEngine {
    fn stage(&self) -> PipelineStage {
        PipelineStage::Deploying
    }

    async fn run(
        &self,
        inputs: &StageInputs,
        reporter: &StageReporter,
    ) -> Result<StageArtifact, StageError> {
        let bundle = inputs.code(self.stage())?;
        let providers = inputs
            .options
            .providers
            .as_deref()
            .unwrap_or(&self.providers);
        self.deploy(bundle, providers, reporter).await.map(Into::into)
    }
}
