//! In-memory order service.
//!
//! Keeps a small order book in process and enforces the same lifecycle rules
//! the remote backend does. Useful for local development and tests; it can
//! simulate latency and fail chosen actions on demand.

use crate::{OrderServiceError, OrderServiceFactory, OrderServiceInterface, OrderServiceRegistry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orderdesk_types::{
	transition, Customer, ImplementationRegistry, OrderAction, OrderDetail, OrderItem, OrderPage,
	OrderStatus, OrderSummary, OrdersQuery, PageMeta, Product,
};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Page size used when a query asks for zero rows per page.
const FALLBACK_PER_PAGE: u32 = 10;

/// Configuration for the memory order service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryServiceConfig {
	/// Orders to start with. When empty, a small demo book is used.
	#[serde(default)]
	pub orders: Vec<SeedOrder>,
	/// Actions that always fail with a 503.
	#[serde(default)]
	pub fail_actions: Vec<OrderAction>,
	/// Artificial delay applied to every call.
	#[serde(default)]
	pub latency_ms: u64,
}

/// Order declared in configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedOrder {
	pub id: String,
	pub customer_name: String,
	#[serde(default)]
	pub customer_email: Option<String>,
	#[serde(default)]
	pub customer_phone: Option<String>,
	#[serde(default = "default_seed_status")]
	pub status: OrderStatus,
	#[serde(default)]
	pub items: Vec<SeedItem>,
	/// Defaults to the sum of the item subtotals.
	#[serde(default)]
	pub total_in_cents: Option<u64>,
}

fn default_seed_status() -> OrderStatus {
	OrderStatus::Pending
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedItem {
	pub product: String,
	pub price_in_cents: u64,
	#[serde(default = "default_quantity")]
	pub quantity: u32,
}

fn default_quantity() -> u32 {
	1
}

impl SeedOrder {
	fn into_detail(self, created_at: DateTime<Utc>) -> OrderDetail {
		let order_items: Vec<OrderItem> = self
			.items
			.into_iter()
			.enumerate()
			.map(|(index, item)| OrderItem {
				id: format!("{}-item-{}", self.id, index + 1),
				price_in_cents: item.price_in_cents,
				quantity: item.quantity,
				product: Product { name: item.product },
			})
			.collect();
		let items_total = order_items
			.iter()
			.map(OrderItem::subtotal_in_cents)
			.fold(0u64, u64::saturating_add);
		let email = self.customer_email.unwrap_or_else(|| {
			format!(
				"{}@example.com",
				self.customer_name.to_lowercase().replace(' ', ".")
			)
		});

		OrderDetail::new(
			self.id,
			self.status,
			created_at,
			self.total_in_cents.unwrap_or(items_total),
			Customer {
				name: self.customer_name,
				email,
				phone: self.customer_phone,
			},
			order_items,
		)
	}
}

struct State {
	orders: Vec<OrderDetail>,
	failing: HashSet<OrderAction>,
}

/// In-memory order service implementation.
pub struct MemoryOrderService {
	state: RwLock<State>,
	latency: Option<Duration>,
	transition_calls: AtomicUsize,
}

impl MemoryOrderService {
	/// Creates a service holding `orders`.
	pub fn new(orders: Vec<OrderDetail>) -> Self {
		Self {
			state: RwLock::new(State {
				orders,
				failing: HashSet::new(),
			}),
			latency: None,
			transition_calls: AtomicUsize::new(0),
		}
	}

	/// Creates a service from configuration, falling back to the demo book.
	pub fn from_config(config: MemoryServiceConfig) -> Self {
		let seeds = if config.orders.is_empty() {
			demo_seeds()
		} else {
			config.orders
		};
		let service = Self::new(seed_details(seeds));
		let service = if config.latency_ms > 0 {
			service.with_latency(Duration::from_millis(config.latency_ms))
		} else {
			service
		};
		config
			.fail_actions
			.into_iter()
			.fold(service, |service, action| service.failing_on(action))
	}

	/// Service holding the demo order book.
	pub fn demo() -> Self {
		Self::new(seed_details(demo_seeds()))
	}

	pub fn with_latency(mut self, latency: Duration) -> Self {
		self.latency = Some(latency);
		self
	}

	/// Makes every `action` call fail with a 503.
	pub fn failing_on(mut self, action: OrderAction) -> Self {
		self.state.get_mut().failing.insert(action);
		self
	}

	pub async fn set_failing(&self, action: OrderAction, failing: bool) {
		let mut state = self.state.write().await;
		if failing {
			state.failing.insert(action);
		} else {
			state.failing.remove(&action);
		}
	}

	/// Number of transition calls received, successful or not.
	pub fn transition_calls(&self) -> usize {
		self.transition_calls.load(Ordering::SeqCst)
	}

	async fn simulate_latency(&self) {
		if let Some(latency) = self.latency {
			tokio::time::sleep(latency).await;
		}
	}

	async fn transition(&self, order_id: &str, action: OrderAction) -> Result<(), OrderServiceError> {
		self.transition_calls.fetch_add(1, Ordering::SeqCst);
		self.simulate_latency().await;

		let mut state = self.state.write().await;
		if state.failing.contains(&action) {
			return Err(OrderServiceError::Status {
				status: 503,
				message: format!("simulated failure for '{}'", action),
			});
		}

		let order = state
			.orders
			.iter_mut()
			.find(|order| order.id == order_id)
			.ok_or_else(|| OrderServiceError::NotFound(order_id.to_string()))?;
		let next = transition::apply(order.status(), action)
			.map_err(|e| OrderServiceError::Rejected(e.to_string()))?;
		*order = order
			.advanced_to(next)
			.map_err(|e| OrderServiceError::Rejected(e.to_string()))?;

		tracing::debug!(order_id = %order_id, status = %next, "Memory order service applied transition");
		Ok(())
	}
}

fn matches_query(order: &OrderDetail, query: &OrdersQuery) -> bool {
	let status_ok = query.status.is_none_or(|status| order.status() == status);
	let customer_ok = query.customer_name.as_deref().is_none_or(|name| {
		order
			.customer
			.name
			.to_lowercase()
			.contains(&name.to_lowercase())
	});
	let id_ok = query
		.order_id
		.as_deref()
		.is_none_or(|id| order.id.contains(id));
	status_ok && customer_ok && id_ok
}

fn seed_details(seeds: Vec<SeedOrder>) -> Vec<OrderDetail> {
	let now = Utc::now();
	seeds
		.into_iter()
		.enumerate()
		.map(|(index, seed)| {
			let minutes = 15 * i64::try_from(index).unwrap_or(i64::MAX / 60);
			seed.into_detail(now - chrono::Duration::minutes(minutes))
		})
		.collect()
}

fn demo_seeds() -> Vec<SeedOrder> {
	let seed = |id: &str, customer: &str, status: OrderStatus, items: &[(&str, u64, u32)]| SeedOrder {
		id: id.to_string(),
		customer_name: customer.to_string(),
		customer_email: None,
		customer_phone: Some("(555) 123-4567".to_string()),
		status,
		items: items
			.iter()
			.map(|(product, price_in_cents, quantity)| SeedItem {
				product: product.to_string(),
				price_in_cents: *price_in_cents,
				quantity: *quantity,
			})
			.collect(),
		total_in_cents: None,
	};

	vec![
		seed(
			"ord-1001",
			"Lucas Tenani",
			OrderStatus::Pending,
			&[("Pepperoni pizza", 1599, 2), ("Tuscan pizza", 1299, 1)],
		),
		seed(
			"ord-1002",
			"Marina Costa",
			OrderStatus::Processing,
			&[("Margherita pizza", 1499, 2)],
		),
		seed(
			"ord-1003",
			"Joao Pedro",
			OrderStatus::Delivering,
			&[("Four cheese pizza", 1799, 1)],
		),
		seed(
			"ord-1004",
			"Ana Lima",
			OrderStatus::Delivered,
			&[("Calabresa pizza", 1399, 3)],
		),
		seed(
			"ord-1005",
			"Rafael Souza",
			OrderStatus::Canceled,
			&[("Veggie pizza", 1199, 1)],
		),
		seed(
			"ord-1006",
			"Beatriz Alves",
			OrderStatus::Pending,
			&[("Pepperoni pizza", 1599, 1)],
		),
	]
}

#[async_trait]
impl OrderServiceInterface for MemoryOrderService {
	async fn list_orders(&self, query: &OrdersQuery) -> Result<OrderPage, OrderServiceError> {
		self.simulate_latency().await;

		let per_page = if query.per_page == 0 {
			FALLBACK_PER_PAGE
		} else {
			query.per_page
		};
		let state = self.state.read().await;
		let mut matching: Vec<&OrderDetail> = state
			.orders
			.iter()
			.filter(|order| matches_query(order, query))
			.collect();
		matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

		let offset = (query.page_index as usize).saturating_mul(per_page as usize);
		let orders: Vec<OrderSummary> = matching
			.iter()
			.skip(offset)
			.take(per_page as usize)
			.map(|order| order.summary())
			.collect();

		Ok(OrderPage {
			orders,
			meta: PageMeta {
				page_index: query.page_index,
				per_page,
				total_count: matching.len() as u64,
			},
		})
	}

	async fn get_order_detail(&self, order_id: &str) -> Result<OrderDetail, OrderServiceError> {
		self.simulate_latency().await;

		let state = self.state.read().await;
		state
			.orders
			.iter()
			.find(|order| order.id == order_id)
			.cloned()
			.ok_or_else(|| OrderServiceError::NotFound(order_id.to_string()))
	}

	async fn approve_order(&self, order_id: &str) -> Result<(), OrderServiceError> {
		self.transition(order_id, OrderAction::Approve).await
	}

	async fn cancel_order(&self, order_id: &str) -> Result<(), OrderServiceError> {
		self.transition(order_id, OrderAction::Cancel).await
	}

	async fn dispatch_order(&self, order_id: &str) -> Result<(), OrderServiceError> {
		self.transition(order_id, OrderAction::Dispatch).await
	}

	async fn deliver_order(&self, order_id: &str) -> Result<(), OrderServiceError> {
		self.transition(order_id, OrderAction::Deliver).await
	}
}

/// Factory function to create a memory order service from configuration.
pub fn create_service(
	config: &toml::Value,
) -> Result<Box<dyn OrderServiceInterface>, OrderServiceError> {
	let memory_config: MemoryServiceConfig = config
		.clone()
		.try_into()
		.map_err(|e| OrderServiceError::Configuration(format!("Invalid memory config: {}", e)))?;

	Ok(Box::new(MemoryOrderService::from_config(memory_config)))
}

/// Registry for the memory order service implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = OrderServiceFactory;

	fn factory() -> Self::Factory {
		create_service
	}
}

impl OrderServiceRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_list_filters_and_paginates() {
		let service = MemoryOrderService::demo();

		let page = service
			.list_orders(&OrdersQuery::page(0, 4))
			.await
			.unwrap();
		assert_eq!(page.orders.len(), 4);
		assert_eq!(page.meta.total_count, 6);
		assert_eq!(page.meta.page_count(), 2);
		// Newest first.
		assert_eq!(page.orders[0].order_id, "ord-1001");

		let second = service
			.list_orders(&OrdersQuery::page(1, 4))
			.await
			.unwrap();
		assert_eq!(second.orders.len(), 2);

		let pending = service
			.list_orders(&OrdersQuery::page(0, 10).with_status(OrderStatus::Pending))
			.await
			.unwrap();
		assert_eq!(pending.meta.total_count, 2);

		let by_name = service
			.list_orders(&OrdersQuery::page(0, 10).with_customer_name("marina"))
			.await
			.unwrap();
		assert_eq!(by_name.orders.len(), 1);
		assert_eq!(by_name.orders[0].order_id, "ord-1002");
	}

	#[tokio::test]
	async fn test_transitions_follow_rules() {
		let service = MemoryOrderService::demo();

		service.approve_order("ord-1001").await.unwrap();
		service.dispatch_order("ord-1001").await.unwrap();
		let rejected = service.approve_order("ord-1001").await;
		assert!(matches!(rejected, Err(OrderServiceError::Rejected(_))));

		let detail = service.get_order_detail("ord-1001").await.unwrap();
		assert_eq!(detail.status(), OrderStatus::Delivering);
		assert_eq!(service.transition_calls(), 3);
	}

	#[tokio::test]
	async fn test_failing_actions_leave_orders_untouched() {
		let service = MemoryOrderService::demo().failing_on(OrderAction::Cancel);

		let result = service.cancel_order("ord-1001").await;
		assert!(matches!(
			result,
			Err(OrderServiceError::Status { status: 503, .. })
		));
		let detail = service.get_order_detail("ord-1001").await.unwrap();
		assert_eq!(detail.status(), OrderStatus::Pending);

		service.set_failing(OrderAction::Cancel, false).await;
		service.cancel_order("ord-1001").await.unwrap();
	}

	#[tokio::test]
	async fn test_unknown_order() {
		let service = MemoryOrderService::demo();
		assert!(matches!(
			service.get_order_detail("missing").await,
			Err(OrderServiceError::NotFound(_))
		));
		assert!(matches!(
			service.deliver_order("missing").await,
			Err(OrderServiceError::NotFound(_))
		));
	}

	#[test]
	fn test_factory_reads_seed_orders() {
		let config: toml::Value = toml::from_str(
			r#"
latency_ms = 0
fail_actions = ["dispatch"]

[[orders]]
id = "A"
customer_name = "Ana Lima"
total_in_cents = 8000

[[orders]]
id = "B"
customer_name = "Bruno"
status = "processing"
[[orders.items]]
product = "Margherita pizza"
price_in_cents = 1500
quantity = 2
"#,
		)
		.unwrap();

		assert!(create_service(&config).is_ok());

		let parsed: MemoryServiceConfig = config.try_into().unwrap();
		let details = seed_details(parsed.orders);
		assert_eq!(details[0].total_in_cents, 8000);
		assert_eq!(details[0].customer.email, "ana.lima@example.com");
		assert_eq!(details[1].status(), OrderStatus::Processing);
		assert_eq!(details[1].total_in_cents, 3000);
		assert_eq!(parsed.fail_actions, vec![OrderAction::Dispatch]);
	}
}
