use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::engine::log::DEFAULT_CAPACITY;
use crate::engine::report::CONSOLE_BUDGET_BYTES;

pub const DEFAULT_CAPTURE_ENDPOINT: &str = "https://capture.vigil.dev/entry";
pub const DEFAULT_FAULT_ENDPOINT: &str = "https://capture.vigil.dev/fault";

/// Installation configuration. Every field has a working default;
/// validation rejects individual bad fields and keeps the rest, so a
/// partially wrong config degrades instead of refusing to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub token: String,
    pub application: String,
    pub capture_endpoint: String,
    pub fault_endpoint: String,
    /// Overrides endpoint selection outright when set.
    pub forward_endpoint: Option<String>,
    /// Consecutive-duplicate suppression in the gate.
    pub dedupe: bool,
    /// Capture a synthetic stack at wrap time for every watched callback.
    pub capture_bind_stack: bool,
    pub log_capacity: usize,
    pub console_budget_bytes: usize,
    pub console: ConsoleOptions,
    pub network: NetworkOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleOptions {
    pub enabled: bool,
    /// Feed error-severity console lines into the report path.
    pub report_errors: bool,
}

impl Default for ConsoleOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            report_errors: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkOptions {
    pub enabled: bool,
    /// Report captured calls that complete with a failure status.
    pub report_failures: bool,
}

impl Default for NetworkOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            report_failures: true,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            application: String::new(),
            capture_endpoint: DEFAULT_CAPTURE_ENDPOINT.to_string(),
            fault_endpoint: DEFAULT_FAULT_ENDPOINT.to_string(),
            forward_endpoint: None,
            dedupe: true,
            capture_bind_stack: false,
            log_capacity: DEFAULT_CAPACITY,
            console_budget_bytes: CONSOLE_BUDGET_BYTES,
            console: ConsoleOptions::default(),
            network: NetworkOptions::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("endpoint `{0}` is not an absolute http(s) URL")]
    BadEndpoint(String),
    #[error("{0} must be greater than zero")]
    ZeroSize(&'static str),
}

fn check_endpoint(url: &str) -> Result<(), ConfigError> {
    if url.starts_with("https://") {
        return Ok(());
    }
    if url.starts_with("http://") {
        warn!(target: "vigil::config", url, "insecure capture endpoint");
        return Ok(());
    }
    Err(ConfigError::BadEndpoint(url.to_string()))
}

/// Per-field validation: a rejected field falls back to its default with
/// a warning, everything else is applied as given.
pub fn sanitize(mut config: AgentConfig) -> AgentConfig {
    if let Err(err) = check_endpoint(&config.capture_endpoint) {
        warn!(target: "vigil::config", %err, "capture endpoint rejected");
        config.capture_endpoint = DEFAULT_CAPTURE_ENDPOINT.to_string();
    }
    if let Err(err) = check_endpoint(&config.fault_endpoint) {
        warn!(target: "vigil::config", %err, "fault endpoint rejected");
        config.fault_endpoint = DEFAULT_FAULT_ENDPOINT.to_string();
    }
    if let Some(forward) = &config.forward_endpoint {
        if let Err(err) = check_endpoint(forward) {
            warn!(target: "vigil::config", %err, "forward endpoint rejected");
            config.forward_endpoint = None;
        }
    }
    if config.log_capacity == 0 {
        warn!(target: "vigil::config", "{}", ConfigError::ZeroSize("log_capacity"));
        config.log_capacity = DEFAULT_CAPACITY;
    }
    if config.console_budget_bytes == 0 {
        warn!(target: "vigil::config", "{}", ConfigError::ZeroSize("console_budget_bytes"));
        config.console_budget_bytes = CONSOLE_BUDGET_BYTES;
    }
    config
}
