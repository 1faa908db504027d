//! Configuration management for the ChronoDB policy engine
//!
//! This module provides a centralized configuration system that supports:
//! - YAML/TOML configuration files
//! - Environment variable overrides
//! - Reasonable defaults
//! - Configuration validation

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ChronoConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub license: LicenseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ChronoConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest priority)
    /// 2. Config file specified by CHRONODB_CONFIG env var
    /// 3. ./config/chronodb.yaml
    /// 4. /etc/chronodb/chronodb.yaml
    /// 5. Hardcoded defaults (lowest priority)
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        builder = Self::set_defaults(builder)?;

        if let Ok(config_path) = std::env::var("CHRONODB_CONFIG") {
            builder = builder.add_source(File::with_name(&config_path).required(false));
        }

        builder = builder
            .add_source(File::with_name("./config/chronodb").required(false))
            .add_source(File::with_name("/etc/chronodb/chronodb").required(false));

        // Example: CHRONODB__POLICY__REORDER__FAST_CONTINUE=false
        builder = builder.add_source(
            Environment::with_prefix("CHRONODB")
                .separator("__")
                .try_parsing(true),
        );

        let config: ChronoConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    /// Set default values for all configuration options
    fn set_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            // Database
            .set_default("database.url", "sqlite://chronodb.db")?
            .set_default("database.max_connections", 8)?
            // Policy executors
            .set_default("policy.reorder.fast_continue", true)?
            .set_default("policy.materialize.verbose", true)?
            // License
            .set_default("license.expiration_warning_days", 7)?
            // Logging
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.is_empty() {
            return Err(ConfigError::Message(
                "database.url cannot be empty".to_string(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "database.max_connections must be > 0".to_string(),
            ));
        }

        if self.license.expiration_warning_days < 0 {
            return Err(ConfigError::Message(
                "license.expiration_warning_days must be >= 0".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Message(format!(
                "logging.level must be one of {valid_levels:?}, got `{}`",
                self.logging.level
            )));
        }

        if !["pretty", "json"].contains(&self.logging.format.as_str()) {
            return Err(ConfigError::Message(format!(
                "logging.format must be `pretty` or `json`, got `{}`",
                self.logging.format
            )));
        }

        Ok(())
    }

    /// Load configuration from a specific file path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: ChronoConfig = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()?;
        config.validate()?;

        Ok(config)
    }
}

/// Catalog database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite URL of the catalog (default: "sqlite://chronodb.db")
    pub url: String,

    /// Max connections in pool (default: 8)
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://chronodb.db".to_string(),
            max_connections: 8,
        }
    }
}

/// Policy executor configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PolicyConfig {
    #[serde(default)]
    pub reorder: ReorderConfig,

    #[serde(default)]
    pub materialize: MaterializeConfig,
}

/// Reorder executor configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReorderConfig {
    /// Ask for an immediate re-run while reorderable chunks remain
    pub fast_continue: bool,
}

impl Default for ReorderConfig {
    fn default() -> Self {
        Self {
            fast_continue: true,
        }
    }
}

/// Materialize executor configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MaterializeConfig {
    /// Run the materialization engine verbosely
    pub verbose: bool,
}

impl Default for MaterializeConfig {
    fn default() -> Self {
        Self { verbose: true }
    }
}

/// License gate configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LicenseConfig {
    /// Days before expiry at which a warning is logged
    pub expiration_warning_days: i64,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            expiration_warning_days: 7,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error (default: "info")
    pub level: String,

    /// Log format: json or pretty (default: "pretty")
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration() {
        let config = ChronoConfig::default();

        assert_eq!(config.database.url, "sqlite://chronodb.db");
        assert_eq!(config.database.max_connections, 8);
        assert!(config.policy.reorder.fast_continue);
        assert!(config.policy.materialize.verbose);
        assert_eq!(config.license.expiration_warning_days, 7);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = ChronoConfig::default();

        config.database.max_connections = 0;
        assert!(config.validate().is_err());

        config.database.max_connections = 4;
        assert!(config.validate().is_ok());

        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "debug".to_string();
        config.license.expiration_warning_days = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!(
            "chronodb-config-test-{}.toml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            r#"
[policy.reorder]
fast_continue = false

[logging]
level = "debug"
format = "json"
"#,
        )
        .unwrap();

        let config = ChronoConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert!(!config.policy.reorder.fast_continue);
        assert!(config.policy.materialize.verbose);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.database.max_connections, 8);
    }
}
