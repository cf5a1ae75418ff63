//! Environment-driven configuration for the API binary.

use std::net::SocketAddr;

use thiserror::Error;

use keygate_auth::policy::DEFAULT_PERMISSION_CLAIM;
use keygate_observability::{LogConfig, LogFormat, ParseLogFormatError};

pub const ENV_BIND: &str = "KEYGATE_BIND";
pub const ENV_PERMISSION_CLAIM: &str = "KEYGATE_PERMISSION_CLAIM";
pub const ENV_LOG_FORMAT: &str = "KEYGATE_LOG_FORMAT";
pub const ENV_LOG_LEVEL: &str = "KEYGATE_LOG_LEVEL";
pub const ENV_INSECURE_DEV_DECODE: &str = "KEYGATE_INSECURE_DEV_DECODE";

const DEFAULT_BIND: &str = "0.0.0.0:8080";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("KEYGATE_BIND is not a socket address: '{0}'")]
    InvalidBind(String),

    #[error("KEYGATE_PERMISSION_CLAIM must not be empty")]
    EmptyPermissionClaim,

    #[error("KEYGATE_LOG_FORMAT: {0}")]
    InvalidLogFormat(#[from] ParseLogFormatError),

    #[error("KEYGATE_INSECURE_DEV_DECODE must be '0' or '1', got '{0}'")]
    InvalidFlag(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind: SocketAddr,
    /// Name of the explicit permission-list claim.
    pub permission_claim: String,
    pub log: LogConfig,
    /// Accept unsigned token payloads (local development only).
    pub insecure_dev_decode: bool,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_raw = lookup(ENV_BIND).unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidBind(bind_raw.clone()))?;

        let permission_claim =
            lookup(ENV_PERMISSION_CLAIM).unwrap_or_else(|| DEFAULT_PERMISSION_CLAIM.to_string());
        if permission_claim.trim().is_empty() {
            return Err(ConfigError::EmptyPermissionClaim);
        }

        let format = match lookup(ENV_LOG_FORMAT) {
            Some(raw) => raw.parse::<LogFormat>()?,
            None => LogFormat::default(),
        };
        let default_filter = lookup(ENV_LOG_LEVEL).unwrap_or_else(|| "info".to_string());

        let insecure_dev_decode = match lookup(ENV_INSECURE_DEV_DECODE).as_deref() {
            None | Some("0") => false,
            Some("1") => true,
            Some(other) => return Err(ConfigError::InvalidFlag(other.to_string())),
        };

        Ok(Self {
            bind,
            permission_claim,
            log: LogConfig {
                format,
                default_filter,
            },
            insecure_dev_decode,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.permission_claim, "permissions");
        assert_eq!(config.log, LogConfig::default());
        assert!(!config.insecure_dev_decode);
    }

    #[test]
    fn overrides_are_read() {
        let config = load(&[
            (ENV_BIND, "127.0.0.1:9000"),
            (ENV_PERMISSION_CLAIM, "scopes"),
            (ENV_LOG_FORMAT, "pretty"),
            (ENV_LOG_LEVEL, "keygate_auth=debug"),
            (ENV_INSECURE_DEV_DECODE, "1"),
        ])
        .unwrap();

        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.permission_claim, "scopes");
        assert_eq!(config.log.format, LogFormat::Pretty);
        assert_eq!(config.log.default_filter, "keygate_auth=debug");
        assert!(config.insecure_dev_decode);
    }

    #[test]
    fn invalid_values_are_errors() {
        assert_eq!(
            load(&[(ENV_BIND, "nowhere")]),
            Err(ConfigError::InvalidBind("nowhere".into()))
        );
        assert_eq!(load(&[(ENV_PERMISSION_CLAIM, " ")]), Err(ConfigError::EmptyPermissionClaim));
        assert!(matches!(
            load(&[(ENV_LOG_FORMAT, "xml")]),
            Err(ConfigError::InvalidLogFormat(_))
        ));
        assert_eq!(
            load(&[(ENV_INSECURE_DEV_DECODE, "yes")]),
            Err(ConfigError::InvalidFlag("yes".into()))
        );
    }
}
