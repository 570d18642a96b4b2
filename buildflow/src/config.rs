//! Pipeline configuration.
//!
//! Every field has a default, so an empty JSON object is a valid
//! configuration. Values can also be set with the `with_*` builders.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use crate::client::JitterStrategy;
use crate::errors::ConfigError;

/// Retry behaviour of the backoff client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound on any computed delay in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Jitter applied to computed delays.
    #[serde(default)]
    pub jitter: JitterStrategy,
    /// HTTP statuses that are worth retrying.
    #[serde(default = "default_retryable_statuses")]
    pub retryable_statuses: BTreeSet<u16>,
    /// Bring-your-own-key mode; suppresses the rate-limit countdown.
    #[serde(default)]
    pub unmetered: bool,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_retryable_statuses() -> BTreeSet<u16> {
    [429, 500, 502, 503].into_iter().collect()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: JitterStrategy::default(),
            retryable_statuses: default_retryable_statuses(),
            unmetered: false,
        }
    }
}

impl ClientConfig {
    /// Creates a client configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the retry count.
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the first retry delay.
    #[must_use]
    pub const fn with_initial_delay_ms(mut self, delay: u64) -> Self {
        self.initial_delay_ms = delay;
        self
    }

    /// Sets the delay cap.
    #[must_use]
    pub const fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub const fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Replaces the retryable status set.
    #[must_use]
    pub fn with_retryable_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_statuses = statuses.into_iter().collect();
        self
    }

    /// Enables or disables unmetered mode.
    #[must_use]
    pub const fn with_unmetered(mut self, unmetered: bool) -> Self {
        self.unmetered = unmetered;
        self
    }

    /// Returns true when `status` should be retried.
    #[must_use]
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }
}

/// Bounds on the stage-level retry loops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Extra attempts when a document breaks its contract.
    #[serde(default = "default_validation_retries")]
    pub validation_retries: u32,
    /// Repair iterations when generated code fails its tests.
    #[serde(default = "default_repair_iterations")]
    pub repair_iterations: u32,
}

fn default_validation_retries() -> u32 {
    2
}

fn default_repair_iterations() -> u32 {
    5
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            validation_retries: default_validation_retries(),
            repair_iterations: default_repair_iterations(),
        }
    }
}

/// Deployment provider chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Providers to try, in order.
    #[serde(default)]
    pub providers: Vec<String>,
    /// Port used in the local fallback instructions.
    #[serde(default = "default_local_port")]
    pub local_port: u16,
}

fn default_local_port() -> u16 {
    8080
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            local_port: default_local_port(),
        }
    }
}

/// HTTP model endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Token budget for model reasoning, when supported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<u32>,
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_api_key_env() -> String {
    "BUILDFLOW_API_KEY".to_string()
}

fn default_timeout_seconds() -> u64 {
    120
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_seconds: default_timeout_seconds(),
            thinking_budget: None,
        }
    }
}

impl ModelConfig {
    /// Returns the request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Backoff client settings.
    #[serde(default)]
    pub client: ClientConfig,
    /// Stage retry bounds.
    #[serde(default)]
    pub stages: StageConfig,
    /// Deployment chain.
    #[serde(default)]
    pub deployment: DeploymentConfig,
    /// HTTP model settings.
    #[serde(default)]
    pub model: ModelConfig,
}

impl PipelineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error when the JSON is malformed or a value is out of range.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or does not parse.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client.initial_delay_ms > self.client.max_delay_ms {
            return Err(ConfigError::Invalid {
                field: "client.initial_delay_ms".to_string(),
                message: format!(
                    "{} exceeds max_delay_ms {}",
                    self.client.initial_delay_ms, self.client.max_delay_ms
                ),
            });
        }
        if self.deployment.providers.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "deployment.providers".to_string(),
                message: "provider names must not be blank".to_string(),
            });
        }
        Ok(())
    }

    /// Sets the client section.
    #[must_use]
    pub fn with_client(mut self, client: ClientConfig) -> Self {
        self.client = client;
        self
    }

    /// Sets the validation retry count.
    #[must_use]
    pub const fn with_validation_retries(mut self, retries: u32) -> Self {
        self.stages.validation_retries = retries;
        self
    }

    /// Sets the repair iteration count.
    #[must_use]
    pub const fn with_repair_iterations(mut self, iterations: u32) -> Self {
        self.stages.repair_iterations = iterations;
        self
    }

    /// Sets the provider order.
    #[must_use]
    pub fn with_providers<I, S>(mut self, providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deployment.providers = providers.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the model section.
    #[must_use]
    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.model = model;
        self
    }
}
