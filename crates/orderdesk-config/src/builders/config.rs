//! Configuration builder for tests and local development.

use crate::{CacheConfig, Config, DeskConfig, OrdersConfig, ServiceConfig};
use std::collections::HashMap;

/// Builder for `Config` with defaults that point at the in-memory service.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	desk_id: String,
	primary: String,
	timeout_seconds: u64,
	implementations: HashMap<String, toml::Value>,
	cache: CacheConfig,
	per_page: u32,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	pub fn new() -> Self {
		let mut implementations = HashMap::new();
		implementations.insert(
			"memory".to_string(),
			toml::Value::Table(toml::Table::new()),
		);

		Self {
			desk_id: "test-desk".to_string(),
			primary: "memory".to_string(),
			timeout_seconds: 5,
			implementations,
			cache: CacheConfig::default(),
			per_page: 10,
		}
	}

	pub fn desk_id(mut self, id: impl Into<String>) -> Self {
		self.desk_id = id.into();
		self
	}

	/// Sets the primary implementation. It must also be added with
	/// [`ConfigBuilder::implementation`] unless it is `memory`.
	pub fn primary(mut self, primary: impl Into<String>) -> Self {
		self.primary = primary.into();
		self
	}

	pub fn implementation(mut self, name: impl Into<String>, config: toml::Value) -> Self {
		self.implementations.insert(name.into(), config);
		self
	}

	pub fn timeout_seconds(mut self, timeout: u64) -> Self {
		self.timeout_seconds = timeout;
		self
	}

	pub fn stale_after_seconds(mut self, seconds: u64) -> Self {
		self.cache.stale_after_seconds = seconds;
		self
	}

	pub fn gc_after_seconds(mut self, seconds: u64) -> Self {
		self.cache.gc_after_seconds = seconds;
		self
	}

	pub fn patch_detail_entries(mut self, enabled: bool) -> Self {
		self.cache.patch_detail_entries = enabled;
		self
	}

	pub fn per_page(mut self, per_page: u32) -> Self {
		self.per_page = per_page;
		self
	}

	/// Builds the configuration. No validation is performed.
	pub fn build(self) -> Config {
		Config {
			desk: DeskConfig { id: self.desk_id },
			service: ServiceConfig {
				primary: self.primary,
				timeout_seconds: self.timeout_seconds,
				implementations: self.implementations,
			},
			cache: self.cache,
			orders: OrdersConfig {
				per_page: self.per_page,
			},
		}
	}
}
