//! Configuration management for the Murmur server.
//!
//! Loads the TOML file, validates it, and converts it into the server's
//! [`ServerConfig`].

use murmur_proximity::{IndexKind, MessageLimits, ProximitySettings, MAX_MESSAGE_CHARS, RANGE_M, UPDATE_RANGE_M};
use murmur_server::ServerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub proximity: ProximitySection,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Network binding and connection limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Network address to bind the server to (e.g., "127.0.0.1:8080")
    pub bind_address: String,
    /// Maximum number of concurrent client connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_max_connections() -> usize {
    1000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            max_connections: default_max_connections(),
        }
    }
}

/// Delivery radius, jitter threshold, index strategy and message limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximitySection {
    pub range_m: f64,
    pub update_range_m: f64,
    pub index: IndexKind,
    pub max_message_chars: usize,
}

impl Default for ProximitySection {
    fn default() -> Self {
        Self {
            range_m: RANGE_M,
            update_range_m: UPDATE_RANGE_M,
            index: IndexKind::default(),
            max_message_chars: MAX_MESSAGE_CHARS,
        }
    }
}

/// Log output format and level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, writes the defaults to `path` and returns them.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    pub fn to_server_config(&self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        Ok(ServerConfig {
            bind_address: self.server.bind_address.parse()?,
            max_connections: self.server.max_connections,
            proximity: ProximitySettings {
                range_m: self.proximity.range_m,
                update_range_m: self.proximity.update_range_m,
                index: self.proximity.index,
            },
            limits: MessageLimits {
                max_chars: self.proximity.max_message_chars,
            },
        })
    }

    /// Validates the configuration for consistency and correctness.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!("Invalid bind address: {}", self.server.bind_address));
        }
        if self.server.max_connections == 0 {
            return Err("max_connections must be at least 1".to_string());
        }

        let proximity = &self.proximity;
        if !proximity.range_m.is_finite() || proximity.range_m <= 0.0 {
            return Err(format!("range_m must be a positive distance, got {}", proximity.range_m));
        }
        if !proximity.update_range_m.is_finite() || proximity.update_range_m < 0.0 {
            return Err(format!(
                "update_range_m must be zero or more, got {}",
                proximity.update_range_m
            ));
        }
        if proximity.max_message_chars == 0 {
            return Err("max_message_chars must be at least 1".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                self.logging.level
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind_address, "127.0.0.1:8080");
        assert_eq!(config.server.max_connections, 1000);
        assert_eq!(config.proximity.range_m, 10_000.0);
        assert_eq!(config.proximity.update_range_m, 3.0);
        assert_eq!(config.proximity.index, IndexKind::BallTree);
        assert_eq!(config.proximity.max_message_chars, 256);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json_format);
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:8080");
        assert!(path.exists());

        // The written file parses back to the same settings.
        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded.proximity.index, config.proximity.index);
        assert_eq!(reloaded.proximity.range_m, config.proximity.range_m);
    }

    #[tokio::test]
    async fn test_load_from_existing_file() {
        let toml_content = r#"
[server]
bind_address = "0.0.0.0:3000"
max_connections = 50

[proximity]
range_m = 500.0
index = "quadtree"

[logging]
level = "debug"
json_format = true
"#;
        let temp_file = NamedTempFile::new().unwrap();
        tokio::fs::write(temp_file.path(), toml_content).await.unwrap();

        let config = AppConfig::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0:3000");
        assert_eq!(config.server.max_connections, 50);
        assert_eq!(config.proximity.range_m, 500.0);
        assert_eq!(config.proximity.index, IndexKind::Quadtree);
        // Omitted keys fall back to defaults.
        assert_eq!(config.proximity.update_range_m, 3.0);
        assert_eq!(config.proximity.max_message_chars, 256);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);

        let server_config = config.to_server_config().unwrap();
        assert_eq!(server_config.bind_address.port(), 3000);
        assert_eq!(server_config.proximity.index, IndexKind::Quadtree);
        assert_eq!(server_config.limits.max_chars, 256);
    }

    #[tokio::test]
    async fn test_unknown_index_is_rejected() {
        let temp_file = NamedTempFile::new().unwrap();
        tokio::fs::write(temp_file.path(), "[proximity]\nindex = \"kd_tree\"\n")
            .await
            .unwrap();
        assert!(AppConfig::load_from_file(temp_file.path()).await.is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.bind_address = "invalid".to_string();
        assert!(config.validate().is_err());

        config.server.bind_address = "127.0.0.1:8080".to_string();
        config.proximity.range_m = 0.0;
        assert!(config.validate().is_err());

        config.proximity.range_m = 10_000.0;
        config.proximity.update_range_m = -1.0;
        assert!(config.validate().is_err());

        config.proximity.update_range_m = 3.0;
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "warn".to_string();
        assert!(config.validate().is_ok());
    }
}
