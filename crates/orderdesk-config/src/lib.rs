//! Configuration module for the orderdesk system.
//!
//! Configuration is read from TOML. Values may reference the environment with
//! `${VAR}` or `${VAR:-default}`; references are resolved before parsing.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["service.toml", "cache.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

mod loader;

#[cfg(feature = "testing")]
pub mod builders {
	pub mod config;
}

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub use loader::ConfigLoader;

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
		// Keep the message, drop the echoed input.
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the order desk.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this desk instance.
	pub desk: DeskConfig,
	/// Remote order service selection.
	pub service: ServiceConfig,
	/// Query cache policy.
	#[serde(default)]
	pub cache: CacheConfig,
	/// Order list defaults.
	#[serde(default)]
	pub orders: OrdersConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeskConfig {
	/// Identifier used in logs.
	pub id: String,
}

/// Configuration for the order service client.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Name of the implementation every call is routed to.
	pub primary: String,
	/// Upper bound for a single remote call.
	#[serde(default = "default_timeout_seconds")]
	pub timeout_seconds: u64,
	/// Map of implementation names to their raw configuration.
	pub implementations: HashMap<String, toml::Value>,
}

impl ServiceConfig {
	pub fn timeout(&self) -> Duration {
		Duration::from_secs(self.timeout_seconds)
	}
}

fn default_timeout_seconds() -> u64 {
	10
}

/// Query cache policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
	/// Snapshots younger than this are served without refetching.
	/// Zero refetches on every read.
	#[serde(default)]
	pub stale_after_seconds: u64,
	/// Snapshots older than this are discarded by the maintenance task.
	#[serde(default = "default_gc_after_seconds")]
	pub gc_after_seconds: u64,
	/// How often the maintenance task runs.
	#[serde(default = "default_cleanup_interval_seconds")]
	pub cleanup_interval_seconds: u64,
	/// Also patch cached order details after a successful mutation.
	#[serde(default)]
	pub patch_detail_entries: bool,
}

impl CacheConfig {
	pub fn stale_after(&self) -> Duration {
		Duration::from_secs(self.stale_after_seconds)
	}

	pub fn gc_after(&self) -> Duration {
		Duration::from_secs(self.gc_after_seconds)
	}

	pub fn cleanup_interval(&self) -> Duration {
		Duration::from_secs(self.cleanup_interval_seconds)
	}
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			stale_after_seconds: 0,
			gc_after_seconds: default_gc_after_seconds(),
			cleanup_interval_seconds: default_cleanup_interval_seconds(),
			patch_detail_entries: false,
		}
	}
}

fn default_gc_after_seconds() -> u64 {
	300
}

fn default_cleanup_interval_seconds() -> u64 {
	60
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrdersConfig {
	/// Page size used when a request does not name one.
	#[serde(default = "default_per_page")]
	pub per_page: u32,
}

impl Default for OrdersConfig {
	fn default() -> Self {
		Self {
			per_page: default_per_page(),
		}
	}
}

fn default_per_page() -> u32 {
	10
}

/// Resolves `${VAR}` and `${VAR:-default}` references in `input`.
///
/// A reference without a default fails when the variable is unset.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last..full_match.start()]);
		result.push_str(&value);
		last = full_match.end();
	}
	result.push_str(&input[last..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Checks cross-field constraints serde cannot express.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.desk.id.trim().is_empty() {
			return Err(ConfigError::Validation("Desk ID cannot be empty".into()));
		}

		if self.service.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one order service implementation must be configured".into(),
			));
		}
		if !self
			.service
			.implementations
			.contains_key(&self.service.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary order service '{}' not found in implementations",
				self.service.primary
			)));
		}
		if self.service.timeout_seconds == 0 {
			return Err(ConfigError::Validation(
				"service.timeout_seconds must be greater than zero".into(),
			));
		}

		if self.cache.cleanup_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"cache.cleanup_interval_seconds must be greater than zero".into(),
			));
		}
		if self.cache.gc_after_seconds < self.cache.stale_after_seconds {
			return Err(ConfigError::Validation(format!(
				"cache.gc_after_seconds ({}) must not be shorter than cache.stale_after_seconds ({})",
				self.cache.gc_after_seconds, self.cache.stale_after_seconds
			)));
		}

		if self.orders.per_page == 0 {
			return Err(ConfigError::Validation(
				"orders.per_page must be greater than zero".into(),
			));
		}

		Ok(())
	}
}

/// Parses configuration from a TOML string.
///
/// Environment references are resolved first and the result is validated.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
