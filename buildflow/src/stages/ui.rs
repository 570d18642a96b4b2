//! Designing stage: a simple interface in front of the deployed agent.

use async_trait::async_trait;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::{prompts, StageInputs, StageWorker};
use crate::artifacts::{ComponentKind, DeploymentResult, IoField, RequirementsSpec, UiComponent};
use crate::client::{BackoffClient, ModelRequest};
use crate::contracts::parse_ui;
use crate::core::{PipelineStage, StageArtifact};
use crate::errors::StageError;
use crate::events::StageReporter;

fn fields(items: &[IoField]) -> serde_json::Value {
    items
        .iter()
        .map(|f| json!({ "name": f.name, "type": f.kind, "label": f.description }))
        .collect()
}

/// The components used when the model proposes none.
#[must_use]
pub fn default_components(spec: &RequirementsSpec) -> Vec<UiComponent> {
    vec![
        UiComponent {
            kind: ComponentKind::InputForm,
            name: format!("Ask {}", spec.agent_name),
            props: json!({ "fields": fields(&spec.inputs) }),
        },
        UiComponent {
            kind: ComponentKind::ResponseDisplay,
            name: "Response".to_string(),
            props: json!({ "fields": fields(&spec.outputs) }),
        },
        UiComponent {
            kind: ComponentKind::Loading,
            name: "Loading".to_string(),
            props: json!({ "message": format!("{} is thinking…", spec.agent_name) }),
        },
        UiComponent {
            kind: ComponentKind::Error,
            name: "Error".to_string(),
            props: json!({ "message": "Something went wrong. Please try again." }),
        },
    ]
}

fn public_url(deployment: &DeploymentResult) -> String {
    format!("{}/ui", deployment.endpoint.trim_end_matches('/'))
}

/// Runs the designing stage. One model call, no validation retries.
#[derive(Debug, Clone)]
pub struct UiGenerator {
    client: BackoffClient,
}

impl UiGenerator {
    /// Creates the worker.
    #[must_use]
    pub const fn new(client: BackoffClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StageWorker for UiGenerator {
    fn stage(&self) -> PipelineStage {
        PipelineStage::Designing
    }

    async fn run(
        &self,
        inputs: &StageInputs,
        reporter: &StageReporter,
    ) -> Result<StageArtifact, StageError> {
        let spec = inputs.requirements(self.stage())?;
        let deployment = inputs.deployment(self.stage())?;
        let client = inputs.client(&self.client);

        reporter
            .progress("Designing the interface", serde_json::Value::Null)
            .await;
        let request = ModelRequest::new("ui", prompts::ui(spec, deployment));
        let output = client.call(&request, reporter).await?;
        let mut ui = parse_ui(&output.content)
            .into_result()
            .map_err(|errors| StageError::Malformed { errors })?;

        if ui.id.is_nil() {
            ui.id = Uuid::new_v4();
        }
        ui.requirements_id = spec.id;
        ui.deployment_id = deployment.id;
        let synthesized = ui.components.is_empty();
        if synthesized {
            ui.components = default_components(spec);
        }
        if !ui.public_url.as_deref().is_some_and(|url| !url.trim().is_empty()) {
            ui.public_url = Some(public_url(deployment));
        }

        info!(
            build_id = %reporter.build_id(),
            components = ui.components.len(),
            synthesized,
            url = ui.public_url.as_deref().unwrap_or_default(),
            "Interface ready"
        );
        Ok(ui.into())
    }
}
