//! Host configuration.
//!
//! [`HostConfig`] starts from defaults and is overridden by environment
//! variables read through [`EnvReader`], so tests can supply a [`MockEnv`]
//! instead of touching the process environment.
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `SATELLITE_PRE_FAILURE` | `pre_failure` | `advisory` |
//! | `SATELLITE_HOST_ROOT` | `host_root` | `ignite` |
//! | `SATELLITE_CHAIN_ID` | `chain.chain_id` | empty |
//! | `SATELLITE_RPC_ADDRESS` | `chain.rpc_address` | `http://localhost:26657` |
//! | `SATELLITE_HOME` | `chain.home` | empty |
//! | `SATELLITE_APP_PATH` | `chain.app_path` | empty |
//! | `SATELLITE_LOG` | `log_spec` | `warn` |

use std::collections::HashMap;
use thiserror::Error;

use crate::capability::ChainInfo;
use crate::hooks::PreFailurePolicy;

pub const ENV_PRE_FAILURE: &str = "SATELLITE_PRE_FAILURE";
pub const ENV_HOST_ROOT: &str = "SATELLITE_HOST_ROOT";
pub const ENV_CHAIN_ID: &str = "SATELLITE_CHAIN_ID";
pub const ENV_RPC_ADDRESS: &str = "SATELLITE_RPC_ADDRESS";
pub const ENV_HOME: &str = "SATELLITE_HOME";
pub const ENV_APP_PATH: &str = "SATELLITE_APP_PATH";
pub const ENV_LOG: &str = "SATELLITE_LOG";

const DEFAULT_RPC_ADDRESS: &str = "http://localhost:26657";

/// Abstraction over environment variables.
pub trait EnvReader: Send + Sync {
    /// Get an environment variable value.
    fn var(&self, name: &str) -> Option<String>;
}

/// Real environment variable reader.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealEnv;

impl EnvReader for RealEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Mock environment variable reader for testing.
#[derive(Debug, Clone, Default)]
pub struct MockEnv {
    vars: HashMap<String, String>,
}

impl MockEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

impl EnvReader for MockEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings a host needs to drive apps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub pre_failure: PreFailurePolicy,
    /// Name of the host's root command, stripped from placement paths.
    pub host_root: String,
    /// Chain identity the host reports through the capability facade.
    pub chain: ChainInfo,
    /// Log specification handed to the logger.
    pub log_spec: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            pre_failure: PreFailurePolicy::Advisory,
            host_root: "ignite".to_string(),
            chain: ChainInfo {
                rpc_address: DEFAULT_RPC_ADDRESS.to_string(),
                ..Default::default()
            },
            log_spec: "warn".to_string(),
        }
    }
}

impl HostConfig {
    /// Defaults overridden by whatever `env` provides. Empty values are
    /// treated as unset.
    pub fn from_env(env: &dyn EnvReader) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let get = |name: &str| env.var(name).filter(|v| !v.trim().is_empty());

        if let Some(value) = get(ENV_PRE_FAILURE) {
            config.pre_failure = value.parse().map_err(|e: crate::hooks::ParsePolicyError| {
                ConfigError::Invalid {
                    var: ENV_PRE_FAILURE,
                    value: value.clone(),
                    reason: e.to_string(),
                }
            })?;
        }
        if let Some(value) = get(ENV_HOST_ROOT) {
            config.host_root = value;
        }
        if let Some(value) = get(ENV_CHAIN_ID) {
            config.chain.chain_id = value;
        }
        if let Some(value) = get(ENV_RPC_ADDRESS) {
            config.chain.rpc_address = value;
        }
        if let Some(value) = get(ENV_HOME) {
            config.chain.home = value;
        }
        if let Some(value) = get(ENV_APP_PATH) {
            config.chain.config_path = format!("{}/config.yml", value.trim_end_matches('/'));
            config.chain.app_path = value;
        }
        if let Some(value) = get(ENV_LOG) {
            config.log_spec = value;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HostConfig::from_env(&MockEnv::new()).unwrap();
        assert_eq!(config, HostConfig::default());
        assert_eq!(config.pre_failure, PreFailurePolicy::Advisory);
        assert_eq!(config.host_root, "ignite");
        assert_eq!(config.chain.rpc_address, "http://localhost:26657");
        assert_eq!(config.log_spec, "warn");
    }

    #[test]
    fn test_overrides() {
        let env = MockEnv::new()
            .with_var(ENV_PRE_FAILURE, "abort")
            .with_var(ENV_CHAIN_ID, "venus")
            .with_var(ENV_APP_PATH, "/src/venus/")
            .with_var(ENV_LOG, "debug");
        let config = HostConfig::from_env(&env).unwrap();

        assert_eq!(config.pre_failure, PreFailurePolicy::Abort);
        assert_eq!(config.chain.chain_id, "venus");
        assert_eq!(config.chain.app_path, "/src/venus/");
        assert_eq!(config.chain.config_path, "/src/venus/config.yml");
        assert_eq!(config.log_spec, "debug");
    }

    #[test]
    fn test_empty_values_are_unset() {
        let env = MockEnv::new().with_var(ENV_HOST_ROOT, "  ");
        assert_eq!(HostConfig::from_env(&env).unwrap().host_root, "ignite");
    }

    #[test]
    fn test_invalid_policy() {
        let env = MockEnv::new().with_var(ENV_PRE_FAILURE, "sometimes");
        let err = HostConfig::from_env(&env).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                var: ENV_PRE_FAILURE,
                ..
            }
        ));
    }
}
