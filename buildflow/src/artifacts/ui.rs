//! Generated user interface produced by the designing stage.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a UI component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    /// Collects the agent's inputs.
    InputForm,
    /// Shows the agent's response.
    ResponseDisplay,
    /// Shown while a request is in flight.
    Loading,
    /// Shown when a request fails.
    Error,
    /// Anything else.
    #[default]
    Custom,
}

/// One component of the generated UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiComponent {
    /// Component role.
    #[serde(rename = "type")]
    pub kind: ComponentKind,
    /// Component name.
    pub name: String,
    /// Free-form component properties.
    #[serde(default)]
    pub props: serde_json::Value,
}

/// The UI wrapped around a deployed agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedUi {
    /// Artifact id.
    pub id: Uuid,
    /// The requirements whose inputs and outputs the UI exposes.
    pub requirements_id: Uuid,
    /// The deployment the UI talks to.
    pub deployment_id: Uuid,
    /// Components, never empty once the stage completes.
    pub components: Vec<UiComponent>,
    /// Theme name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    /// Where the UI is served.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
}

impl GeneratedUi {
    /// Returns true when a component of `kind` exists.
    #[must_use]
    pub fn has_component(&self, kind: ComponentKind) -> bool {
        self.components.iter().any(|c| c.kind == kind)
    }
}
