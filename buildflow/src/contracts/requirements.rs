//! Contract for the requirements specification.

use serde_json::Value;

use super::reader::{whole_u64, FieldReader, Object};
use super::Validation;
use crate::artifacts::{Constraints, EdgeCase, Integration, IoField, RequirementsSpec};

/// Checks a raw requirements document.
#[must_use]
pub fn validate_requirements(raw: &Value) -> Validation<RequirementsSpec> {
    let mut r = FieldReader::new();
    let Some(obj) = r.root(raw) else {
        return r.fail();
    };

    let agent_name = r.required_text(obj, "", "agentName");
    let purpose = r.required_text(obj, "", "purpose");
    let description = r.optional_str(obj, "", "description").unwrap_or_default();
    let personality = r.tolerant(obj, "", "personality");
    let capabilities = r.string_list(obj, "", "capabilities");
    let inputs = io_fields(&mut r, obj, "inputs");
    let outputs = io_fields(&mut r, obj, "outputs");

    let integrations = r
        .objects(obj, "", "integrations")
        .into_iter()
        .map(|(path, item)| Integration {
            name: r.required_text(item, &path, "name"),
            auth_type: r.tolerant(item, &path, "authType"),
            purpose: r.optional_str(item, &path, "purpose"),
        })
        .collect();

    let constraints = r
        .optional_object(obj, "", "constraints")
        .map(|c| Constraints {
            max_response_time_ms: r
                .non_negative(c, "constraints", "maxResponseTimeMs")
                .map(whole_u64),
            max_cost_per_request: r.non_negative(c, "constraints", "maxCostPerRequest"),
        })
        .unwrap_or_default();

    let edge_cases = r
        .objects(obj, "", "edgeCases")
        .into_iter()
        .map(|(path, item)| EdgeCase {
            scenario: r.required_text(item, &path, "scenario"),
            mitigation: r.optional_str(item, &path, "mitigation").unwrap_or_default(),
        })
        .collect();

    let complexity_score = r
        .integer_in_range(obj, "", "complexityScore", 1, 10)
        .and_then(|v| u8::try_from(v).ok())
        .unwrap_or(1);
    let data_sources = r.string_list(obj, "", "dataSources");
    let inferred_fields = r.string_list(obj, "", "inferredFields");

    let spec = RequirementsSpec {
        id: FieldReader::id(obj, "id"),
        description,
        agent_name,
        purpose,
        personality,
        capabilities,
        inputs,
        outputs,
        integrations,
        constraints,
        edge_cases,
        complexity_score,
        data_sources,
        inferred_fields,
    };
    r.finish(spec)
}

fn io_fields(r: &mut FieldReader, obj: &Object, key: &str) -> Vec<IoField> {
    r.objects(obj, "", key)
        .into_iter()
        .map(|(path, item)| IoField {
            name: r.required_text(item, &path, "name"),
            kind: r.tolerant(item, &path, "type"),
            description: r.optional_str(item, &path, "description"),
        })
        .collect()
}
