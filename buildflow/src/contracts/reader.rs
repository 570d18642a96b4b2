//! Error-accumulating reader over raw JSON documents.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{FieldError, Validation};

pub(crate) type Object = Map<String, Value>;

/// Joins a parent path and a key.
pub(crate) fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn index(prefix: &str, i: usize) -> String {
    format!("{prefix}[{i}]")
}

/// Short description of a JSON value's type, used as `received`.
pub(crate) fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
    .to_string()
}

/// Coerces a loosely spelled enum value to its variant, or the default.
///
/// Accepts any case and `-`, space, or camelCase word separators, so
/// `"Router-Workers"`, `"routerWorkers"` and `"router_workers"` all match.
pub fn coerce_variant<E: DeserializeOwned + Default>(raw: &str) -> E {
    parse_variant(raw).unwrap_or_default()
}

fn parse_variant<E: DeserializeOwned>(raw: &str) -> Option<E> {
    let trimmed = raw.trim();
    let mut snake = String::with_capacity(trimmed.len() + 4);
    let mut prev_lower = false;
    for ch in trimmed.chars() {
        if ch == '-' || ch == ' ' {
            snake.push('_');
            prev_lower = false;
        } else if ch.is_ascii_uppercase() {
            if prev_lower {
                snake.push('_');
            }
            snake.push(ch.to_ascii_lowercase());
            prev_lower = false;
        } else {
            snake.push(ch);
            prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        }
    }
    let flat = trimmed.to_ascii_lowercase().replace(['-', ' '], "_");

    [snake, flat]
        .into_iter()
        .find_map(|candidate| serde_json::from_value(Value::String(candidate)).ok())
}

/// Walks a document and collects every field error it finds.
#[derive(Debug, Default)]
pub(crate) struct FieldReader {
    errors: Vec<FieldError>,
}

impl FieldReader {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn error(
        &mut self,
        path: impl Into<String>,
        expected: impl Into<String>,
        received: impl Into<String>,
    ) {
        self.errors.push(FieldError::new(path, expected, received));
    }

    /// Returns the document as an object, recording an error otherwise.
    pub(crate) fn root<'v>(&mut self, raw: &'v Value) -> Option<&'v Object> {
        let object = raw.as_object();
        if object.is_none() {
            self.error("$", "object", describe(raw));
        }
        object
    }

    pub(crate) fn required_str(&mut self, obj: &Object, prefix: &str, key: &str) -> String {
        match obj.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => {
                self.error(join(prefix, key), "string", describe(other));
                String::new()
            }
            None => {
                self.error(join(prefix, key), "string", "missing");
                String::new()
            }
        }
    }

    /// Like [`Self::required_str`] but also rejects blank strings.
    pub(crate) fn required_text(&mut self, obj: &Object, prefix: &str, key: &str) -> String {
        match obj.get(key) {
            Some(Value::String(s)) if s.trim().is_empty() => {
                self.error(join(prefix, key), "non-empty string", "empty string");
                String::new()
            }
            _ => self.required_str(obj, prefix, key),
        }
    }

    pub(crate) fn optional_str(&mut self, obj: &Object, prefix: &str, key: &str) -> Option<String> {
        match obj.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                self.error(join(prefix, key), "string", describe(other));
                None
            }
        }
    }

    pub(crate) fn string_list(&mut self, obj: &Object, prefix: &str, key: &str) -> Vec<String> {
        let path = join(prefix, key);
        match obj.get(key) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    match item {
                        Value::String(s) => out.push(s.clone()),
                        other => self.error(index(&path, i), "string", describe(other)),
                    }
                }
                out
            }
            Some(other) => {
                self.error(path, "array of strings", describe(other));
                Vec::new()
            }
        }
    }

    /// Returns each object element of an optional array with its path.
    pub(crate) fn objects<'v>(
        &mut self,
        obj: &'v Object,
        prefix: &str,
        key: &str,
    ) -> Vec<(String, &'v Object)> {
        let path = join(prefix, key);
        match obj.get(key) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    match item {
                        Value::Object(inner) => out.push((index(&path, i), inner)),
                        other => self.error(index(&path, i), "object", describe(other)),
                    }
                }
                out
            }
            Some(other) => {
                self.error(path, "array", describe(other));
                Vec::new()
            }
        }
    }

    pub(crate) fn optional_object<'v>(
        &mut self,
        obj: &'v Object,
        prefix: &str,
        key: &str,
    ) -> Option<&'v Object> {
        match obj.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::Object(inner)) => Some(inner),
            Some(other) => {
                self.error(join(prefix, key), "object", describe(other));
                None
            }
        }
    }

    /// Reads a required whole number within `min..=max`.
    pub(crate) fn integer_in_range(
        &mut self,
        obj: &Object,
        prefix: &str,
        key: &str,
        min: i64,
        max: i64,
    ) -> Option<i64> {
        let expected = format!("integer between {min} and {max}");
        let path = join(prefix, key);
        match obj.get(key) {
            None => {
                self.error(path, expected, "missing");
                None
            }
            Some(Value::Number(n)) => {
                let whole = n.as_i64().or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() < 1e15)
                        .map(truncate_f64)
                });
                match whole {
                    Some(v) if (min..=max).contains(&v) => Some(v),
                    _ => {
                        self.error(path, expected, n.to_string());
                        None
                    }
                }
            }
            Some(other) => {
                self.error(path, expected, describe(other));
                None
            }
        }
    }

    /// Reads an optional number that must not be negative.
    pub(crate) fn non_negative(&mut self, obj: &Object, prefix: &str, key: &str) -> Option<f64> {
        let path = join(prefix, key);
        match obj.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => match n.as_f64() {
                Some(v) if v >= 0.0 => Some(v),
                _ => {
                    self.error(path, "non-negative number", n.to_string());
                    None
                }
            },
            Some(other) => {
                self.error(path, "non-negative number", describe(other));
                None
            }
        }
    }

    pub(crate) fn count(&mut self, obj: &Object, prefix: &str, key: &str) -> u32 {
        self.non_negative(obj, prefix, key)
            .map_or(0, |v| u32::try_from(truncate_f64(v)).unwrap_or(u32::MAX))
    }

    pub(crate) fn bool_or(&mut self, obj: &Object, prefix: &str, key: &str, default: bool) -> bool {
        match obj.get(key) {
            None | Some(Value::Null) => default,
            Some(Value::Bool(b)) => *b,
            Some(other) => {
                self.error(join(prefix, key), "boolean", describe(other));
                default
            }
        }
    }

    /// Reads a string enum, falling back to the default for unknown values.
    pub(crate) fn tolerant<E: DeserializeOwned + Default>(
        &mut self,
        obj: &Object,
        prefix: &str,
        key: &str,
    ) -> E {
        match obj.get(key) {
            None | Some(Value::Null) => E::default(),
            Some(Value::String(s)) => coerce_variant(s),
            Some(other) => {
                self.error(join(prefix, key), "string", describe(other));
                E::default()
            }
        }
    }

    /// Reads a list of string enums, dropping unknown values.
    pub(crate) fn variant_list<E: DeserializeOwned>(
        &mut self,
        obj: &Object,
        prefix: &str,
        key: &str,
    ) -> Vec<E> {
        self.string_list(obj, prefix, key)
            .iter()
            .filter_map(|s| parse_variant(s))
            .collect()
    }

    /// Reads an id, using the nil id when absent or malformed.
    pub(crate) fn id(obj: &Object, key: &str) -> Uuid {
        obj.get(key)
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::nil)
    }

    pub(crate) fn fail<T>(self) -> Validation<T> {
        Validation::Invalid(self.errors)
    }

    pub(crate) fn finish<T>(self, value: T) -> Validation<T> {
        if self.errors.is_empty() {
            Validation::Valid(value)
        } else {
            Validation::Invalid(self.errors)
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn truncate_f64(value: f64) -> i64 {
    value.round() as i64
}

/// Rounds a non-negative number to a whole `u64`.
pub(crate) fn whole_u64(value: f64) -> u64 {
    u64::try_from(truncate_f64(value.min(9e15))).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{AgentPattern, AuthType, Tone};
    use serde_json::json;

    #[test]
    fn test_coerce_variant_spellings() {
        assert_eq!(coerce_variant::<AgentPattern>("Router-Workers"), AgentPattern::RouterWorkers);
        assert_eq!(coerce_variant::<AgentPattern>("routerWorkers"), AgentPattern::RouterWorkers);
        assert_eq!(coerce_variant::<AgentPattern>("multi agent"), AgentPattern::MultiAgent);
        assert_eq!(coerce_variant::<AuthType>("API_KEY"), AuthType::ApiKey);
        assert_eq!(coerce_variant::<AuthType>("OAuth2"), AuthType::Oauth2);
    }

    #[test]
    fn test_coerce_variant_unknown_uses_default() {
        assert_eq!(coerce_variant::<Tone>("sarcastic"), Tone::Professional);
        assert_eq!(coerce_variant::<AuthType>(""), AuthType::None);
    }

    #[test]
    fn test_reader_collects_all_errors() {
        let raw = json!({"name": 5, "tags": ["a", 1], "score": 11});
        let mut reader = FieldReader::new();
        let obj = reader.root(&raw).unwrap();

        reader.required_str(obj, "", "name");
        reader.string_list(obj, "", "tags");
        reader.integer_in_range(obj, "", "score", 1, 10);
        reader.required_str(obj, "", "missing");

        let errors = reader.fail::<()>().into_result().unwrap_err();
        let paths: Vec<_> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["name", "tags[1]", "score", "missing"]);
        assert_eq!(errors[2].received, "11");
        assert_eq!(errors[3].received, "missing");
    }

    #[test]
    fn test_integer_accepts_whole_floats() {
        let raw = json!({"score": 4.0, "bad": 4.5});
        let mut reader = FieldReader::new();
        let obj = reader.root(&raw).unwrap();

        assert_eq!(reader.integer_in_range(obj, "", "score", 1, 10), Some(4));
        assert_eq!(reader.integer_in_range(obj, "", "bad", 1, 10), None);
    }

    #[test]
    fn test_root_must_be_object() {
        let mut reader = FieldReader::new();
        assert!(reader.root(&json!([1, 2])).is_none());
        let errors = reader.fail::<()>().into_result().unwrap_err();
        assert_eq!(errors[0].path, "$");
        assert_eq!(errors[0].received, "array");
    }

    #[test]
    fn test_id_tolerates_garbage() {
        let raw = json!({"id": "not-a-uuid"});
        assert!(FieldReader::id(raw.as_object().unwrap(), "id").is_nil());
    }
}
