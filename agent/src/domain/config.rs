//! Agent configuration model, defaults and validation.
//!
//! Loading lives in `crate::infra::config`; this module is pure.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use websoft9_common::{HealthCheck, validate_agent_id};

use crate::domain::error::ConfigError;
use crate::domain::security::{DEFAULT_ALLOWED_COMMANDS, DEFAULT_ALLOWED_ROOTS, SecurityPolicy};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/websoft9/agent.yaml";

pub const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Top-level agent configuration (`agent.yaml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub agent: AgentSection,
    pub valkey: ValkeySection,
    pub log: LogSection,
    pub security: SecuritySection,
    pub health_checks: Vec<HealthCheck>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub id: String,
    /// Seconds between heartbeats.
    pub heartbeat_interval: u64,
    /// Seconds between metric collections.
    pub monitor_interval: u64,
    /// Seconds between health-check rounds.
    pub health_check_interval: u64,
    pub work_dir: PathBuf,
    /// Captured process output is cut to this many bytes.
    pub max_output_bytes: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            id: String::new(),
            heartbeat_interval: 30,
            monitor_interval: 60,
            health_check_interval: 30,
            work_dir: PathBuf::from("/var/lib/websoft9/agent"),
            max_output_bytes: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValkeySection {
    pub url: String,
    pub username: Option<String>,
    /// File holding the ACL password (e.g. a Docker secret).
    pub password_file: Option<PathBuf>,
}

impl Default for ValkeySection {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            username: None,
            password_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    pub allowed_commands: Vec<String>,
    pub allowed_roots: Vec<PathBuf>,
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            allowed_commands: DEFAULT_ALLOWED_COMMANDS
                .iter()
                .map(|c| (*c).to_string())
                .collect(),
            allowed_roots: DEFAULT_ALLOWED_ROOTS.iter().map(PathBuf::from).collect(),
        }
    }
}

impl AgentConfig {
    /// Check every field that the agent relies on at runtime.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_agent_id(&self.agent.id).map_err(ConfigError::InvalidAgentId)?;

        for (field, value) in [
            ("agent.heartbeat_interval", self.agent.heartbeat_interval),
            ("agent.monitor_interval", self.agent.monitor_interval),
            ("agent.health_check_interval", self.agent.health_check_interval),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroInterval { field });
            }
        }

        if !VALID_LOG_LEVELS.contains(&self.log.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.log.level.clone()));
        }

        if self.security.allowed_commands.is_empty() {
            return Err(ConfigError::NoAllowedCommands);
        }
        if let Some(root) = self.security.allowed_roots.iter().find(|r| !r.is_absolute()) {
            return Err(ConfigError::RelativeRoot(root.display().to_string()));
        }
        Ok(())
    }

    /// Build the immutable policy shared by every handler and worker.
    #[must_use]
    pub fn security_policy(&self) -> SecurityPolicy {
        SecurityPolicy::new(
            self.security.allowed_commands.iter().cloned(),
            self.security.allowed_roots.iter().cloned(),
        )
    }

    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.agent.heartbeat_interval)
    }

    #[must_use]
    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.agent.monitor_interval)
    }

    #[must_use]
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.agent.health_check_interval)
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────
