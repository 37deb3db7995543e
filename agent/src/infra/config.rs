//! Loads `AgentConfig` from a YAML file plus `WEBSOFT9_AGENT_*` overrides.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::domain::SecurityPolicy;
use crate::domain::config::AgentConfig;

pub const ENV_PREFIX: &str = "WEBSOFT9_AGENT_";

/// Environment overrides. Each field maps to `WEBSOFT9_AGENT_<FIELD>`:
///   - `WEBSOFT9_AGENT_ID`
///   - `WEBSOFT9_AGENT_VALKEY_URL`
///   - `WEBSOFT9_AGENT_LOG_LEVEL`
#[derive(Debug, Default, Deserialize)]
pub struct EnvOverrides {
    pub id: Option<String>,
    pub valkey_url: Option<String>,
    pub log_level: Option<String>,
}

impl EnvOverrides {
    /// Read overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a set variable cannot be decoded.
    pub fn from_env() -> Result<Self> {
        envy::prefixed(ENV_PREFIX)
            .from_env()
            .with_context(|| format!("failed to read {ENV_PREFIX}* env vars"))
    }

    /// Read overrides from explicit `(name, value)` pairs.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be decoded.
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(ENV_PREFIX)
            .from_iter(pairs)
            .with_context(|| format!("failed to decode {ENV_PREFIX}* overrides"))
    }

    pub fn apply(self, config: &mut AgentConfig) {
        if let Some(id) = self.id {
            config.agent.id = id;
        }
        if let Some(url) = self.valkey_url {
            config.valkey.url = url;
        }
        if let Some(level) = self.log_level {
            config.log.level = level;
        }
    }
}

/// Load, override and validate the configuration at `path`.
///
/// The path must itself pass the default config-path policy before it is
/// opened.
///
/// # Errors
///
/// Returns an error if the path is rejected, the file cannot be read or
/// parsed, or the final configuration is invalid.
pub fn load_config(path: &str) -> Result<AgentConfig> {
    load_config_with(&SecurityPolicy::default(), path, EnvOverrides::from_env()?)
}

/// [`load_config`] with an explicit path policy and overrides.
///
/// # Errors
///
/// See [`load_config`].
pub fn load_config_with(
    policy: &SecurityPolicy,
    path: &str,
    overrides: EnvOverrides,
) -> Result<AgentConfig> {
    let canonical: PathBuf = policy
        .validate_config_path(path)
        .context("config path rejected")?;
    info!(audit = true, path = %canonical.display(), "loading config file");

    let content = std::fs::read_to_string(&canonical)
        .with_context(|| format!("cannot read {}", canonical.display()))?;
    let mut config: AgentConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("cannot parse {}", canonical.display()))?;

    overrides.apply(&mut config);
    config
        .validate()
        .with_context(|| format!("invalid configuration in {}", canonical.display()))?;
    Ok(config)
}
