//! Output-shape parsers for the code bundle and the generated UI.
//!
//! These report errors in the same shape as the contracts but are not
//! retried; a shape failure is final for the call that produced it.

use serde_json::Value;
use std::collections::BTreeMap;

use super::reader::{describe, join, FieldReader, Object};
use super::Validation;
use crate::artifacts::{
    CodeBundle, FailureReport, GeneratedUi, SourceFile, TestOutcome, UiComponent,
};

/// Parses a raw code bundle.
#[must_use]
pub fn parse_code_bundle(raw: &Value) -> Validation<CodeBundle> {
    let mut r = FieldReader::new();
    let Some(obj) = r.root(raw) else {
        return r.fail();
    };

    match obj.get("files") {
        None => r.error("files", "non-empty array", "missing"),
        Some(Value::Null) => r.error("files", "non-empty array", "null"),
        Some(Value::Array(items)) if items.is_empty() => {
            r.error("files", "non-empty array", "empty array");
        }
        Some(_) => {}
    }
    let files = r
        .objects(obj, "", "files")
        .into_iter()
        .map(|(path, item)| SourceFile {
            path: r.required_text(item, &path, "path"),
            content: r.required_str(item, &path, "content"),
            language: r.optional_str(item, &path, "language"),
        })
        .collect();

    let dependencies = dependencies(&mut r, obj);

    let tests = r
        .objects(obj, "", "tests")
        .into_iter()
        .map(|(path, item)| {
            let name = r.required_text(item, &path, "name");
            let passed = match item.get("passed") {
                Some(Value::Bool(b)) => *b,
                Some(other) => {
                    r.error(join(&path, "passed"), "boolean", describe(other));
                    false
                }
                None => {
                    r.error(join(&path, "passed"), "boolean", "missing");
                    false
                }
            };
            TestOutcome {
                name,
                passed,
                error: r.optional_str(item, &path, "error"),
            }
        })
        .collect();

    let validated = r.bool_or(obj, "", "validated", false);
    let debug_iterations = r.count(obj, "", "debugIterations");
    let failure_report = r
        .optional_object(obj, "", "failureReport")
        .map(|report| FailureReport {
            unresolved_issues: r.string_list(report, "failureReport", "unresolvedIssues"),
            iterations: r.count(report, "failureReport", "iterations"),
            last_error: r.optional_str(report, "failureReport", "lastError"),
        });

    let bundle = CodeBundle {
        id: FieldReader::id(obj, "id"),
        architecture_id: FieldReader::id(obj, "architectureId"),
        files,
        dependencies,
        tests,
        validated,
        debug_iterations,
        failure_report,
    };
    r.finish(bundle)
}

/// Accepts either a name → version map or a list of names.
fn dependencies(r: &mut FieldReader, obj: &Object) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    match obj.get("dependencies") {
        None | Some(Value::Null) => {}
        Some(Value::Object(map)) => {
            for (name, version) in map {
                match version {
                    Value::String(v) => {
                        out.insert(name.clone(), v.clone());
                    }
                    other => r.error(join("dependencies", name), "string", describe(other)),
                }
            }
        }
        Some(Value::Array(_)) => {
            for name in r.string_list(obj, "", "dependencies") {
                out.insert(name, "*".to_string());
            }
        }
        Some(other) => r.error("dependencies", "object or array", describe(other)),
    }
    out
}

/// Parses a raw generated UI.
#[must_use]
pub fn parse_ui(raw: &Value) -> Validation<GeneratedUi> {
    let mut r = FieldReader::new();
    let Some(obj) = r.root(raw) else {
        return r.fail();
    };

    let components = r
        .objects(obj, "", "components")
        .into_iter()
        .map(|(path, item)| {
            let kind = r.tolerant(item, &path, "type");
            let name = r.optional_str(item, &path, "name").unwrap_or_else(|| {
                item.get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("component")
                    .to_string()
            });
            let props = match item.get("props") {
                None | Some(Value::Null) => Value::Object(Object::new()),
                Some(Value::Object(map)) => Value::Object(map.clone()),
                Some(other) => {
                    r.error(join(&path, "props"), "object", describe(other));
                    Value::Object(Object::new())
                }
            };
            UiComponent { kind, name, props }
        })
        .collect();

    let theme = r.optional_str(obj, "", "theme");
    let public_url = r.optional_str(obj, "", "publicUrl");

    let ui = GeneratedUi {
        id: FieldReader::id(obj, "id"),
        requirements_id: FieldReader::id(obj, "requirementsId"),
        deployment_id: FieldReader::id(obj, "deploymentId"),
        components,
        theme,
        public_url,
    };
    r.finish(ui)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::ComponentKind;
    use crate::testing::fixtures;
    use serde_json::json;

    #[test]
    fn test_parse_bundle() {
        let bundle = parse_code_bundle(&fixtures::code_bundle_json(&[true, false]))
            .into_result()
            .unwrap();

        assert_eq!(bundle.files.len(), 2);
        assert_eq!(bundle.tests.len(), 2);
        assert!(!bundle.all_tests_pass());
        assert_eq!(bundle.dependencies.get("openai").map(String::as_str), Some("^1.0"));
    }

    #[test]
    fn test_bundle_without_files() {
        let errors = parse_code_bundle(&json!({"files": []})).into_result().unwrap_err();
        assert_eq!(errors[0].path, "files");
        assert_eq!(errors[0].received, "empty array");

        let errors = parse_code_bundle(&json!({"tests": []})).into_result().unwrap_err();
        assert_eq!(errors[0].received, "missing");
    }

    #[test]
    fn test_dependency_list_form() {
        let mut raw = fixtures::code_bundle_json(&[true]);
        raw["dependencies"] = json!(["requests", "pydantic"]);

        let bundle = parse_code_bundle(&raw).into_result().unwrap();
        assert_eq!(bundle.dependencies.get("requests").map(String::as_str), Some("*"));
    }

    #[test]
    fn test_test_outcome_needs_passed_flag() {
        let mut raw = fixtures::code_bundle_json(&[true]);
        raw["tests"] = json!([{"name": "smoke", "passed": "yes"}]);

        let errors = parse_code_bundle(&raw).into_result().unwrap_err();
        assert_eq!(errors[0].path, "tests[0].passed");
        assert_eq!(errors[0].received, "string");
    }

    #[test]
    fn test_parse_ui_tolerates_missing_components() {
        let ui = parse_ui(&json!({"theme": "dark"})).into_result().unwrap();
        assert!(ui.components.is_empty());
        assert_eq!(ui.theme.as_deref(), Some("dark"));
        assert!(ui.public_url.is_none());
    }

    #[test]
    fn test_parse_ui_components() {
        let raw = json!({
            "components": [
                {"type": "input-form", "props": {"fields": ["question"]}},
                {"type": "sparkle", "name": "Confetti"}
            ]
        });

        let ui = parse_ui(&raw).into_result().unwrap();
        assert_eq!(ui.components[0].kind, ComponentKind::InputForm);
        assert_eq!(ui.components[0].name, "input-form");
        assert_eq!(ui.components[1].kind, ComponentKind::Custom);
        assert_eq!(ui.components[1].props, json!({}));
    }
}
