//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{AppConfig, Environment};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {reason}")]
    Env { var: &'static str, reason: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Environment variables that override file values.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    pub environment: Option<String>,
    pub port: Option<String>,
    pub webhook_secret: Option<String>,
}

impl EnvOverrides {
    /// Read `APP_ENV`, `PORT` and `WEBHOOK_SECRET`.
    pub fn from_env() -> Self {
        Self {
            environment: std::env::var("APP_ENV").ok(),
            port: std::env::var("PORT").ok(),
            webhook_secret: std::env::var("WEBHOOK_SECRET").ok(),
        }
    }

    /// Apply overrides and re-validate.
    pub fn apply(self, mut config: AppConfig) -> Result<AppConfig, ConfigError> {
        if let Some(env) = self.environment {
            config.environment = env
                .parse::<Environment>()
                .map_err(|reason| ConfigError::Env { var: "APP_ENV", reason })?;
        }

        if let Some(port) = self.port {
            let port: u16 = port.trim().parse().map_err(|e| ConfigError::Env {
                var: "PORT",
                reason: format!("{e}"),
            })?;
            config.listener.bind_address = with_port(&config.listener.bind_address, port);
        }

        if let Some(secret) = self.webhook_secret {
            config.payments.webhook_secret = secret;
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

/// Replace the port of a `host:port` bind address.
pub fn with_port(bind_address: &str, port: u16) -> String {
    let host = bind_address
        .rsplit_once(':')
        .map(|(host, _)| host)
        .unwrap_or(bind_address);
    format!("{host}:{port}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_overrides() {
        let overrides = EnvOverrides {
            environment: Some("development".into()),
            port: Some("8000".into()),
            webhook_secret: Some("whsec_test".into()),
        };
        let config = overrides.apply(AppConfig::default()).unwrap();

        assert!(config.environment.is_development());
        assert_eq!(config.listener.bind_address, "0.0.0.0:8000");
        assert_eq!(config.payments.webhook_secret, "whsec_test");
    }

    #[test]
    fn test_bad_environment_rejected() {
        let overrides = EnvOverrides {
            environment: Some("staging".into()),
            ..Default::default()
        };
        let err = overrides.apply(AppConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "APP_ENV", .. }));
    }

    #[test]
    fn test_with_port() {
        assert_eq!(with_port("127.0.0.1:3000", 80), "127.0.0.1:80");
        assert_eq!(with_port("[::1]:3000", 80), "[::1]:80");
    }

    #[test]
    fn test_load_config_from_file() {
        let path = std::env::temp_dir().join(format!("tour-server-{}.toml", uuid::Uuid::new_v4()));
        fs::write(&path, "[listener]\nbind_address = \"127.0.0.1:4000\"\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:4000");

        fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_example_config_is_valid() {
        let config: AppConfig =
            toml::from_str(include_str!("../../tour-server.example.toml")).unwrap();
        validate_config(&config).unwrap();
        assert!(config.environment.is_development());
        assert_eq!(config.params.whitelist.len(), 6);
    }
}
