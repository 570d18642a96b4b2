//! Code bundle produced by the generating stage.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One generated source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    /// Path relative to the project root.
    pub path: String,
    /// File contents.
    pub content: String,
    /// Language tag, if declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Outcome of one generated test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOutcome {
    /// Test name.
    pub name: String,
    /// Whether it passed.
    pub passed: bool,
    /// Failure output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Why a bundle left the repair loop unvalidated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    /// One line per failing test.
    pub unresolved_issues: Vec<String>,
    /// Repair iterations attempted.
    pub iterations: u32,
    /// The most recent error text seen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl FailureReport {
    /// Returns true when the report carries no information.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.unresolved_issues.is_empty() && self.last_error.is_none()
    }
}

/// Generated source, dependencies and test outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBundle {
    /// Artifact id.
    pub id: Uuid,
    /// The architecture this code implements.
    pub architecture_id: Uuid,
    /// Source files.
    #[serde(default)]
    pub files: Vec<SourceFile>,
    /// Package name to version requirement.
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    /// Outcomes of the generated tests.
    #[serde(default)]
    pub tests: Vec<TestOutcome>,
    /// True only when at least one test exists and all pass.
    #[serde(default)]
    pub validated: bool,
    /// Repair iterations spent on this bundle.
    #[serde(default)]
    pub debug_iterations: u32,
    /// Present when the repair loop was exhausted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_report: Option<FailureReport>,
}

impl CodeBundle {
    /// Returns true when at least one test exists and every test passed.
    #[must_use]
    pub fn all_tests_pass(&self) -> bool {
        !self.tests.is_empty() && self.tests.iter().all(|t| t.passed)
    }

    /// Returns the failing tests.
    #[must_use]
    pub fn failing_tests(&self) -> Vec<&TestOutcome> {
        self.tests.iter().filter(|t| !t.passed).collect()
    }

    /// Returns the most common declared language, if any.
    #[must_use]
    pub fn primary_language(&self) -> Option<&str> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for file in &self.files {
            if let Some(lang) = file.language.as_deref() {
                *counts.entry(lang).or_default() += 1;
            }
        }
        counts
            .into_iter()
            .max_by_key(|(_, count)| *count)
            .map(|(lang, _)| lang)
    }
}
