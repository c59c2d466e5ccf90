mod liveness;
mod observability;
mod policy;
mod server;
mod workspace;

pub use liveness::*;
pub use observability::*;
pub use policy::*;
pub use server::*;
pub use workspace::*;

use std::fmt;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub liveness: LivenessConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the resolved configuration. Returns an empty vec when clean.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut issues = Vec::new();

        if self.policy.payload_cap_bytes == 0 {
            issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "policy.payload_cap_bytes".into(),
                message: "must be greater than zero".into(),
            });
        }

        if self.policy.requests_per_minute == 0 {
            issues.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "policy.requests_per_minute".into(),
                message: "zero effectively blocks all control requests".into(),
            });
        }

        for pattern in &self.policy.brain_url_allowlist {
            if regex_lite_check(pattern).is_err() {
                issues.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "policy.brain_url_allowlist".into(),
                    message: format!("invalid regex: {pattern}"),
                });
            }
        }

        if self.liveness.watchdog_grace_secs == 0 {
            issues.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "liveness.watchdog_grace_secs".into(),
                message: "zero grace fires the relaunch warning immediately on disconnect".into(),
            });
        }

        issues
    }
}

/// Cheap up-front syntax check so bad patterns fail at config-validate time
/// rather than at first use. Delegates to the `regex` crate used by the
/// gateway's policy engine.
fn regex_lite_check(pattern: &str) -> Result<(), ()> {
    regex::Regex::new(pattern).map(|_| ()).map_err(|_| ())
}
