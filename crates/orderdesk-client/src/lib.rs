//! Order service client for the orderdesk system.
//!
//! The remote order-processing backend is an external collaborator. This crate
//! defines the request/response operations the desk consumes from it, a
//! service wrapper that routes calls to the configured implementation and
//! bounds them with a timeout, and two implementations: `http` for a real
//! backend and `memory` for development and tests.

use async_trait::async_trait;
use orderdesk_types::{
	truncate_id, ImplementationRegistry, OrderAction, OrderDetail, OrderPage, OrdersQuery,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

/// Re-export implementations
pub mod implementations {
	pub mod http;
	pub mod memory;
}

/// Errors that can occur while talking to the order service.
#[derive(Debug, Error)]
pub enum OrderServiceError {
	/// Transport-level failure: connection refused, DNS, TLS, reset.
	#[error("Network error: {0}")]
	Network(String),
	/// The service answered with a non-2xx status.
	#[error("Service responded with status {status}: {message}")]
	Status { status: u16, message: String },
	/// The response body could not be decoded.
	#[error("Decode error: {0}")]
	Decode(String),
	/// The call did not complete within the configured timeout.
	#[error("Request timed out after {0:?}")]
	Timeout(Duration),
	/// The order does not exist on the service.
	#[error("Order not found: {0}")]
	NotFound(String),
	/// The service refused the request.
	#[error("Request rejected: {0}")]
	Rejected(String),
	/// Invalid implementation configuration.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the operations consumed from the order service.
///
/// Reads return snapshots; the four transition calls only report success or
/// failure.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait OrderServiceInterface: Send + Sync {
	/// Fetches one page of order summaries.
	async fn list_orders(&self, query: &OrdersQuery) -> Result<OrderPage, OrderServiceError>;

	/// Fetches the full detail of one order.
	async fn get_order_detail(&self, order_id: &str) -> Result<OrderDetail, OrderServiceError>;

	async fn approve_order(&self, order_id: &str) -> Result<(), OrderServiceError>;

	async fn cancel_order(&self, order_id: &str) -> Result<(), OrderServiceError>;

	async fn dispatch_order(&self, order_id: &str) -> Result<(), OrderServiceError>;

	async fn deliver_order(&self, order_id: &str) -> Result<(), OrderServiceError>;
}

/// Type alias for order service factory functions.
pub type OrderServiceFactory =
	fn(&toml::Value) -> Result<Box<dyn OrderServiceInterface>, OrderServiceError>;

/// Registry trait for order service implementations.
pub trait OrderServiceRegistry: ImplementationRegistry<Factory = OrderServiceFactory> {}

/// Get all registered order service implementations.
///
/// Returns a vector of (name, factory) tuples used by the builder to resolve
/// the implementations named in configuration.
pub fn get_all_implementations() -> Vec<(&'static str, OrderServiceFactory)> {
	use implementations::{http, memory};

	vec![
		(http::Registry::NAME, http::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Service that routes order service calls to the primary implementation.
///
/// Every call is bounded by `timeout`; an elapsed timeout is reported as
/// [`OrderServiceError::Timeout`]. No call is ever retried.
pub struct OrderServiceClient {
	implementations: HashMap<String, Arc<dyn OrderServiceInterface>>,
	primary: String,
	timeout: Duration,
}

impl OrderServiceClient {
	/// Creates a client over the given implementations.
	///
	/// Fails when `primary` is not one of them.
	pub fn new(
		implementations: HashMap<String, Arc<dyn OrderServiceInterface>>,
		primary: impl Into<String>,
		timeout: Duration,
	) -> Result<Self, OrderServiceError> {
		let primary = primary.into();
		if !implementations.contains_key(&primary) {
			return Err(OrderServiceError::Configuration(format!(
				"Primary implementation '{}' not found in available implementations",
				primary
			)));
		}

		Ok(Self {
			implementations,
			primary,
			timeout,
		})
	}

	/// Creates a client over a single implementation.
	pub fn single(
		name: impl Into<String>,
		implementation: Arc<dyn OrderServiceInterface>,
		timeout: Duration,
	) -> Self {
		let name = name.into();
		let mut implementations = HashMap::new();
		implementations.insert(name.clone(), implementation);
		Self {
			implementations,
			primary: name,
			timeout,
		}
	}

	pub fn primary_name(&self) -> &str {
		&self.primary
	}

	fn primary(&self) -> Result<&Arc<dyn OrderServiceInterface>, OrderServiceError> {
		self.implementations.get(&self.primary).ok_or_else(|| {
			OrderServiceError::Configuration(format!(
				"Primary implementation '{}' not available",
				self.primary
			))
		})
	}

	async fn bounded<T, F>(&self, call: F) -> Result<T, OrderServiceError>
	where
		F: Future<Output = Result<T, OrderServiceError>>,
	{
		match tokio::time::timeout(self.timeout, call).await {
			Ok(result) => result,
			Err(_) => Err(OrderServiceError::Timeout(self.timeout)),
		}
	}

	/// Fetches one page of order summaries.
	#[instrument(skip_all, fields(page = query.page_index))]
	pub async fn list_orders(&self, query: &OrdersQuery) -> Result<OrderPage, OrderServiceError> {
		let service = self.primary()?;
		self.bounded(service.list_orders(query)).await
	}

	/// Fetches the full detail of one order.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn get_order_detail(&self, order_id: &str) -> Result<OrderDetail, OrderServiceError> {
		let service = self.primary()?;
		self.bounded(service.get_order_detail(order_id)).await
	}

	/// Issues the remote call matching `action`.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id), action = %action))]
	pub async fn submit(&self, order_id: &str, action: OrderAction) -> Result<(), OrderServiceError> {
		let service = self.primary()?;
		match action {
			OrderAction::Approve => self.bounded(service.approve_order(order_id)).await,
			OrderAction::Cancel => self.bounded(service.cancel_order(order_id)).await,
			OrderAction::Dispatch => self.bounded(service.dispatch_order(order_id)).await,
			OrderAction::Deliver => self.bounded(service.deliver_order(order_id)).await,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::memory::MemoryOrderService;

	#[test]
	fn test_registered_implementations() {
		let names: Vec<&str> = get_all_implementations()
			.into_iter()
			.map(|(name, _)| name)
			.collect();
		assert_eq!(names, vec!["http", "memory"]);
	}

	#[test]
	fn test_unknown_primary_is_rejected() {
		let result = OrderServiceClient::new(HashMap::new(), "http", Duration::from_secs(1));
		assert!(matches!(result, Err(OrderServiceError::Configuration(_))));
	}

	#[tokio::test]
	async fn test_submit_routes_to_matching_call() {
		let service = Arc::new(MemoryOrderService::demo());
		let client =
			OrderServiceClient::single("memory", service.clone(), Duration::from_secs(1));

		client.submit("ord-1001", OrderAction::Approve).await.unwrap();
		let detail = client.get_order_detail("ord-1001").await.unwrap();
		assert_eq!(detail.status(), orderdesk_types::OrderStatus::Processing);
	}

	#[tokio::test(start_paused = true)]
	async fn test_slow_calls_time_out() {
		let service = Arc::new(MemoryOrderService::demo().with_latency(Duration::from_secs(30)));
		let client = OrderServiceClient::single("memory", service, Duration::from_secs(5));

		let result = client.submit("ord-1001", OrderAction::Approve).await;
		assert!(matches!(result, Err(OrderServiceError::Timeout(_))));
	}
}
