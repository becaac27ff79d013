//! Configuration module for the gift order service.
//!
//! This module provides structures and utilities for managing service
//! configuration. It supports loading configuration from TOML files with
//! `${ENV_VAR}` substitution and provides validation to ensure all
//! required configuration values are properly set.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the gift order service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Configuration for the HTTP API server.
	#[serde(default)]
	pub api: ApiConfig,
	/// Configuration for the fulfillment upstream.
	pub fulfillment: FulfillmentConfig,
	/// Configuration for the order store backend.
	#[serde(default)]
	pub storage: StorageConfig,
	/// Configuration for the live update stream.
	#[serde(default)]
	pub live: LiveConfig,
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			host: default_api_host(),
			port: default_api_port(),
		}
	}
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

/// Configuration for the fulfillment upstream API.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FulfillmentConfig {
	/// Base URL of the fulfillment API.
	#[serde(default = "default_fulfillment_url")]
	pub api_url: String,
	/// API key used for basic authentication.
	pub api_key: String,
	/// Public base URL of this service, used to construct webhook
	/// callback URLs registered at order placement.
	pub webhook_base_url: String,
	/// Request timeout in seconds for upstream calls.
	#[serde(default = "default_request_timeout_secs")]
	pub request_timeout_secs: u64,
}

fn default_fulfillment_url() -> String {
	"https://api.zinc.io/v1".to_string()
}

fn default_request_timeout_secs() -> u64 {
	30
}

/// Configuration for the order store backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which backend to use: "memory" or "file".
	#[serde(default = "default_storage_backend")]
	pub backend: String,
	/// Directory for the file backend's order records.
	#[serde(default = "default_storage_path")]
	pub path: String,
}

impl Default for StorageConfig {
	fn default() -> Self {
		Self {
			backend: default_storage_backend(),
			path: default_storage_path(),
		}
	}
}

fn default_storage_backend() -> String {
	"memory".to_string()
}

fn default_storage_path() -> String {
	"./data/orders".to_string()
}

/// Configuration for the live update stream.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LiveConfig {
	/// Heartbeat interval in seconds.
	#[serde(default = "default_heartbeat_secs")]
	pub heartbeat_secs: u64,
	/// Maximum connection lifetime in seconds; the stream emits a timeout
	/// event and closes when it is reached.
	#[serde(default = "default_max_connection_secs")]
	pub max_connection_secs: u64,
}

impl Default for LiveConfig {
	fn default() -> Self {
		Self {
			heartbeat_secs: default_heartbeat_secs(),
			max_connection_secs: default_max_connection_secs(),
		}
	}
}

fn default_heartbeat_secs() -> u64 {
	30
}

fn default_max_connection_secs() -> u64 {
	600
}

impl Config {
	/// Loads configuration from a TOML file, resolving `${ENV_VAR}`
	/// references before parsing.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
		let content = std::fs::read_to_string(path)?;
		Config::from_toml_str(&content)
	}

	/// Parses configuration from a TOML string.
	pub fn from_toml_str(content: &str) -> Result<Config, ConfigError> {
		let resolved = resolve_env_vars(content)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}

	/// Validates the configuration values.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.fulfillment.api_key.trim().is_empty() {
			return Err(ConfigError::Validation(
				"fulfillment.api_key must not be empty".into(),
			));
		}
		if self.fulfillment.webhook_base_url.trim().is_empty() {
			return Err(ConfigError::Validation(
				"fulfillment.webhook_base_url must not be empty".into(),
			));
		}
		match self.storage.backend.as_str() {
			"memory" | "file" => {}
			other => {
				return Err(ConfigError::Validation(format!(
					"unknown storage backend '{}'",
					other
				)));
			}
		}
		if self.live.heartbeat_secs == 0 || self.live.max_connection_secs == 0 {
			return Err(ConfigError::Validation(
				"live stream intervals must be positive".into(),
			));
		}
		Ok(())
	}
}

/// Resolves `${VAR}` and `${VAR:-default}` references against the
/// environment. A reference without a default fails validation when the
/// variable is unset.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let var_name = var.as_str();
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name
					)));
				}
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply replacements in reverse order to maintain positions
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

#[cfg(test)]
mod tests {
	use super::*;

	const MINIMAL: &str = r#"
[fulfillment]
api_key = "test-key"
webhook_base_url = "https://gifts.example.com"
"#;

	#[test]
	fn minimal_config_uses_defaults() {
		let config = Config::from_toml_str(MINIMAL).unwrap();
		assert_eq!(config.api.port, 3000);
		assert_eq!(config.storage.backend, "memory");
		assert_eq!(config.live.heartbeat_secs, 30);
		assert_eq!(config.live.max_connection_secs, 600);
		assert_eq!(config.fulfillment.api_url, "https://api.zinc.io/v1");
	}

	#[test]
	fn env_var_resolution() {
		std::env::set_var("GIFT_TEST_KEY", "resolved-key");
		let content = r#"
[fulfillment]
api_key = "${GIFT_TEST_KEY}"
webhook_base_url = "${GIFT_TEST_BASE:-https://gifts.example.com}"
"#;
		let config = Config::from_toml_str(content).unwrap();
		assert_eq!(config.fulfillment.api_key, "resolved-key");
		assert_eq!(
			config.fulfillment.webhook_base_url,
			"https://gifts.example.com"
		);
	}

	#[test]
	fn missing_env_var_fails_validation() {
		let content = r#"
[fulfillment]
api_key = "${GIFT_TEST_MISSING_VAR}"
webhook_base_url = "https://gifts.example.com"
"#;
		let err = Config::from_toml_str(content).unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}

	#[test]
	fn unknown_storage_backend_is_rejected() {
		let content = r#"
[fulfillment]
api_key = "test-key"
webhook_base_url = "https://gifts.example.com"

[storage]
backend = "postgres"
"#;
		assert!(Config::from_toml_str(content).is_err());
	}

	#[test]
	fn loads_from_file() {
		use std::io::Write;
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(MINIMAL.as_bytes()).unwrap();
		let config = Config::from_file(file.path()).unwrap();
		assert_eq!(config.fulfillment.api_key, "test-key");
	}
}
