//! Contract for the deployment result.

use serde_json::Value;

use super::reader::FieldReader;
use super::Validation;
use crate::artifacts::DeploymentResult;

/// Checks a raw deployment result.
#[must_use]
pub fn validate_deployment(raw: &Value) -> Validation<DeploymentResult> {
    let mut r = FieldReader::new();
    let Some(obj) = r.root(raw) else {
        return r.fail();
    };

    let provider = r.required_text(obj, "", "provider");
    let deployment_id = r.optional_str(obj, "", "deploymentId").unwrap_or_default();
    let endpoint = r.required_text(obj, "", "endpoint");
    let status = r.tolerant(obj, "", "status");
    let logs = r.string_list(obj, "", "logs");
    let fallback_used = r.bool_or(obj, "", "fallbackUsed", false);
    let local_instructions = r.string_list(obj, "", "localInstructions");
    let health_checked = r.bool_or(obj, "", "healthChecked", false);

    let result = DeploymentResult {
        id: FieldReader::id(obj, "id"),
        code_bundle_id: FieldReader::id(obj, "codeBundleId"),
        provider,
        deployment_id,
        endpoint,
        status,
        logs,
        fallback_used,
        local_instructions,
        health_checked,
    };
    r.finish(result)
}
