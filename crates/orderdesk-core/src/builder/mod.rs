//! Builder for constructing an order desk from configuration.
//!
//! Order service implementations are created through factory functions keyed
//! by implementation name, so the binary decides which implementations exist
//! and configuration decides which of them are instantiated.

use crate::OrderDesk;
use orderdesk_client::{OrderServiceClient, OrderServiceError, OrderServiceInterface};
use orderdesk_config::Config;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while building a desk.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions for every known order service implementation.
pub struct DeskFactories<SF> {
	pub service_factories: HashMap<String, SF>,
}

pub struct DeskBuilder {
	config: Config,
}

impl DeskBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Instantiates every configured implementation that has a factory and
	/// assembles the desk around the primary one.
	pub fn build<SF>(self, factories: DeskFactories<SF>) -> Result<OrderDesk, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn OrderServiceInterface>, OrderServiceError>,
	{
		let service = &self.config.service;

		let mut implementations: HashMap<String, Arc<dyn OrderServiceInterface>> = HashMap::new();
		for (name, config) in &service.implementations {
			let Some(factory) = factories.service_factories.get(name) else {
				tracing::warn!(
					component = "order_service",
					implementation = %name,
					"No factory registered, skipping"
				);
				continue;
			};

			match factory(config) {
				Ok(implementation) => {
					let is_primary = &service.primary == name;
					tracing::info!(component = "order_service", implementation = %name, enabled = %is_primary, "Loaded");
					implementations.insert(name.clone(), Arc::from(implementation));
				},
				Err(e) => {
					tracing::error!(
						component = "order_service",
						implementation = %name,
						error = %e,
						"Failed to create order service implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create order service implementation '{}': {}",
						name, e
					)));
				},
			}
		}

		if !implementations.contains_key(&service.primary) {
			return Err(BuilderError::MissingComponent(format!(
				"Primary order service '{}' failed to load or has no factory",
				service.primary
			)));
		}

		let client = OrderServiceClient::new(implementations, service.primary.clone(), service.timeout())
			.map_err(|e| BuilderError::Config(e.to_string()))?;

		Ok(OrderDesk::new(self.config, Arc::new(client)))
	}
}
