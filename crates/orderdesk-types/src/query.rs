//! Query keys and cached snapshot payloads.
//!
//! A query key is an ordered tuple of scalar parameters. Two families exist:
//! list pages (`orders`) and single-order details (`order`). Keys are the
//! identity of a cache entry, so every parameter that changes the server's
//! answer is part of the key.

use crate::order::{OrderDetail, OrderPage, OrderStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Parameters of a list query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdersQuery {
	pub page_index: u32,
	pub per_page: u32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<OrderStatus>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub customer_name: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub order_id: Option<String>,
}

impl OrdersQuery {
	/// Unfiltered query for the given page.
	pub fn page(page_index: u32, per_page: u32) -> Self {
		Self {
			page_index,
			per_page,
			status: None,
			customer_name: None,
			order_id: None,
		}
	}

	pub fn with_status(mut self, status: OrderStatus) -> Self {
		self.status = Some(status);
		self
	}

	pub fn with_customer_name(mut self, customer_name: impl Into<String>) -> Self {
		self.customer_name = Some(customer_name.into());
		self
	}

	pub fn with_order_id(mut self, order_id: impl Into<String>) -> Self {
		self.order_id = Some(order_id.into());
		self
	}
}

/// Family a query key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryFamily {
	/// Paged collections of order summaries.
	Orders,
	/// Single order details.
	Order,
}

impl QueryFamily {
	pub fn as_str(&self) -> &'static str {
		match self {
			QueryFamily::Orders => "orders",
			QueryFamily::Order => "order",
		}
	}
}

/// Identity of a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "lowercase")]
pub enum QueryKey {
	Orders(OrdersQuery),
	Order { order_id: String },
}

impl QueryKey {
	pub fn orders(query: OrdersQuery) -> Self {
		QueryKey::Orders(query)
	}

	pub fn order(order_id: impl Into<String>) -> Self {
		QueryKey::Order {
			order_id: order_id.into(),
		}
	}

	pub fn family(&self) -> QueryFamily {
		match self {
			QueryKey::Orders(_) => QueryFamily::Orders,
			QueryKey::Order { .. } => QueryFamily::Order,
		}
	}

	pub fn is_list(&self) -> bool {
		self.family() == QueryFamily::Orders
	}
}

impl fmt::Display for QueryKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			QueryKey::Orders(query) => write!(
				f,
				"orders:{}:{}:{}:{}:{}",
				query.page_index,
				query.per_page,
				query.status.map(|s| s.as_str()).unwrap_or("-"),
				query.customer_name.as_deref().unwrap_or("-"),
				query.order_id.as_deref().unwrap_or("-"),
			),
			QueryKey::Order { order_id } => write!(f, "order:{}", order_id),
		}
	}
}

/// Snapshot stored under a query key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "family", content = "data", rename_all = "lowercase")]
pub enum QueryData {
	Orders(OrderPage),
	Order(OrderDetail),
}

impl QueryData {
	pub fn family(&self) -> QueryFamily {
		match self {
			QueryData::Orders(_) => QueryFamily::Orders,
			QueryData::Order(_) => QueryFamily::Order,
		}
	}

	pub fn as_page(&self) -> Option<&OrderPage> {
		match self {
			QueryData::Orders(page) => Some(page),
			QueryData::Order(_) => None,
		}
	}

	pub fn as_detail(&self) -> Option<&OrderDetail> {
		match self {
			QueryData::Order(detail) => Some(detail),
			QueryData::Orders(_) => None,
		}
	}
}
