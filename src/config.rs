//! Configuration module
//!
//! Reads TOML from `~/.config/auth-service/config.toml` (overridable via
//! `AUTH_CONFIG`). Every section has workable defaults except the signing
//! secret, which must come from the file or `JWT_SECRET` — starting without
//! one is a configuration error, not a per-request failure.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::infrastructure::crypto::jwt::JwtConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("security.jwt_secret must be set (or JWT_SECRET exported)")]
    MissingJwtSecret,
}

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseSection,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
    pub email: EmailSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Bounded wait for background tasks on shutdown, in seconds.
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout: 30,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// SeaORM connection URL; the literal `"memory"` selects the in-memory
    /// repository instead of a database.
    pub url: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: "sqlite://./auth.db?mode=rwc".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            jwt_issuer: "auth-service".to_string(),
            jwt_audience: "auth-service-clients".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmailSection {
    /// Delivery mechanism; `"log"` writes messages to the service log.
    pub transport: String,
}

impl Default for EmailSection {
    fn default() -> Self {
        Self {
            transport: "log".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Build the JWT signing configuration, falling back to the
    /// `JWT_SECRET` environment variable for the secret.
    pub fn jwt_config(&self) -> Result<JwtConfig, ConfigError> {
        let secret = if self.security.jwt_secret.is_empty() {
            std::env::var("JWT_SECRET").unwrap_or_default()
        } else {
            self.security.jwt_secret.clone()
        };

        if secret.is_empty() {
            return Err(ConfigError::MissingJwtSecret);
        }

        Ok(JwtConfig {
            secret,
            issuer: self.security.jwt_issuer.clone(),
            audience: self.security.jwt_audience.clone(),
        })
    }
}

/// Default configuration file location
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("auth-service")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [server]
            port = 9100

            [security]
            jwt_secret = "k"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.server.port, 9100);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.email.transport, "log");
        assert_eq!(cfg.security.jwt_issuer, "auth-service");

        let jwt = cfg.jwt_config().unwrap();
        assert_eq!(jwt.secret, "k");
    }

    #[test]
    fn empty_secret_is_rejected() {
        let cfg = AppConfig::default();
        // Guard against ambient JWT_SECRET leaking into the test.
        if std::env::var("JWT_SECRET").unwrap_or_default().is_empty() {
            assert!(matches!(
                cfg.jwt_config(),
                Err(ConfigError::MissingJwtSecret)
            ));
        }
    }
}
