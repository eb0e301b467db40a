//! Order entity model.
//!
//! Defines the order summary shown in list pages, the lazily fetched order
//! detail, the status enumeration and the operator actions. The `status` of a
//! summary or detail is not publicly assignable: it is set when a snapshot is
//! decoded from the order service and afterwards only changes through
//! [`OrderSummary::advanced_to`], which consults the transition rules.

use crate::transition::{self, TransitionError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
	/// Order was placed and waits for the restaurant to accept it.
	Pending,
	/// Order was approved and is being prepared.
	Processing,
	/// Order left the restaurant.
	Delivering,
	/// Order reached the customer. Terminal.
	Delivered,
	/// Order was canceled. Terminal.
	Canceled,
}

/// Colour family used when rendering a status badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
	Neutral,
	Amber,
	Emerald,
	Rose,
}

impl OrderStatus {
	/// Returns an iterator over every status, in lifecycle order.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Pending,
			Self::Processing,
			Self::Delivering,
			Self::Delivered,
			Self::Canceled,
		]
		.into_iter()
	}

	/// Wire representation of the status.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Pending => "pending",
			OrderStatus::Processing => "processing",
			OrderStatus::Delivering => "delivering",
			OrderStatus::Delivered => "delivered",
			OrderStatus::Canceled => "canceled",
		}
	}

	/// Human readable label.
	pub fn label(&self) -> &'static str {
		match self {
			OrderStatus::Pending => "Pending",
			OrderStatus::Processing => "Processing",
			OrderStatus::Delivering => "Delivering",
			OrderStatus::Delivered => "Delivered",
			OrderStatus::Canceled => "Canceled",
		}
	}

	pub fn tone(&self) -> StatusTone {
		match self {
			OrderStatus::Pending => StatusTone::Neutral,
			OrderStatus::Processing | OrderStatus::Delivering => StatusTone::Amber,
			OrderStatus::Delivered => StatusTone::Emerald,
			OrderStatus::Canceled => StatusTone::Rose,
		}
	}

	/// Terminal statuses have no outgoing transitions.
	pub fn is_terminal(&self) -> bool {
		matches!(self, OrderStatus::Delivered | OrderStatus::Canceled)
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for OrderStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		OrderStatus::all()
			.find(|status| status.as_str().eq_ignore_ascii_case(s))
			.ok_or_else(|| format!("unknown order status '{}'", s))
	}
}

/// Operator action that moves an order along its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderAction {
	Approve,
	Dispatch,
	Deliver,
	Cancel,
}

impl OrderAction {
	/// Returns an iterator over every action.
	pub fn all() -> impl Iterator<Item = Self> {
		[Self::Approve, Self::Dispatch, Self::Deliver, Self::Cancel].into_iter()
	}

	/// Path segment used by the order service for this action.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderAction::Approve => "approve",
			OrderAction::Dispatch => "dispatch",
			OrderAction::Deliver => "deliver",
			OrderAction::Cancel => "cancel",
		}
	}

	/// Button label for the action.
	pub fn label(&self) -> &'static str {
		match self {
			OrderAction::Approve => "Approve",
			OrderAction::Dispatch => "Dispatch",
			OrderAction::Deliver => "Deliver",
			OrderAction::Cancel => "Cancel",
		}
	}
}

impl fmt::Display for OrderAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for OrderAction {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		OrderAction::all()
			.find(|action| action.as_str().eq_ignore_ascii_case(s))
			.ok_or_else(|| format!("unknown order action '{}'", s))
	}
}

/// One row of an order list page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
	/// Opaque unique identifier.
	pub order_id: String,
	/// When the order was placed.
	pub created_at: DateTime<Utc>,
	status: OrderStatus,
	pub customer_name: String,
	/// Order total in cents.
	#[serde(rename = "total")]
	pub total_in_cents: u64,
}

impl OrderSummary {
	pub fn new(
		order_id: impl Into<String>,
		created_at: DateTime<Utc>,
		status: OrderStatus,
		customer_name: impl Into<String>,
		total_in_cents: u64,
	) -> Self {
		Self {
			order_id: order_id.into(),
			created_at,
			status,
			customer_name: customer_name.into(),
			total_in_cents,
		}
	}

	pub fn status(&self) -> OrderStatus {
		self.status
	}

	/// Returns a copy of this summary carrying `status`, identical in every other field.
	///
	/// Fails when `status` cannot follow the current status through legal
	/// transitions, including when the summary already sits in a terminal status.
	pub fn advanced_to(&self, status: OrderStatus) -> Result<Self, TransitionError> {
		transition::ensure_reachable(self.status, status)?;
		Ok(Self {
			status,
			..self.clone()
		})
	}
}

/// Customer contact details attached to an order detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
	pub name: String,
	pub email: String,
	#[serde(default)]
	pub phone: Option<String>,
}

/// Product referenced by a line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
	pub name: String,
}

/// Line item of an order detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
	pub id: String,
	pub price_in_cents: u64,
	pub quantity: u32,
	pub product: Product,
}

impl OrderItem {
	/// Price times quantity, in cents.
	pub fn subtotal_in_cents(&self) -> u64 {
		self.price_in_cents.saturating_mul(u64::from(self.quantity))
	}
}

/// Full order payload, fetched separately from list pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
	pub id: String,
	status: OrderStatus,
	pub created_at: DateTime<Utc>,
	pub total_in_cents: u64,
	pub customer: Customer,
	#[serde(default)]
	pub order_items: Vec<OrderItem>,
}

impl OrderDetail {
	pub fn new(
		id: impl Into<String>,
		status: OrderStatus,
		created_at: DateTime<Utc>,
		total_in_cents: u64,
		customer: Customer,
		order_items: Vec<OrderItem>,
	) -> Self {
		Self {
			id: id.into(),
			status,
			created_at,
			total_in_cents,
			customer,
			order_items,
		}
	}

	pub fn status(&self) -> OrderStatus {
		self.status
	}

	/// Sum of the line item subtotals, in cents.
	pub fn items_total_in_cents(&self) -> u64 {
		self.order_items
			.iter()
			.map(OrderItem::subtotal_in_cents)
			.fold(0u64, u64::saturating_add)
	}

	/// Projects the detail onto the summary shape used by list pages.
	pub fn summary(&self) -> OrderSummary {
		OrderSummary::new(
			self.id.clone(),
			self.created_at,
			self.status,
			self.customer.name.clone(),
			self.total_in_cents,
		)
	}

	/// Same contract as [`OrderSummary::advanced_to`].
	pub fn advanced_to(&self, status: OrderStatus) -> Result<Self, TransitionError> {
		transition::ensure_reachable(self.status, status)?;
		Ok(Self {
			status,
			..self.clone()
		})
	}
}

/// Pagination metadata returned with every list page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
	pub page_index: u32,
	pub per_page: u32,
	pub total_count: u64,
}

impl PageMeta {
	/// Number of pages, never less than one.
	pub fn page_count(&self) -> u32 {
		if self.per_page == 0 || self.total_count == 0 {
			return 1;
		}
		let pages = self.total_count.div_ceil(u64::from(self.per_page));
		u32::try_from(pages).unwrap_or(u32::MAX)
	}

	pub fn last_page_index(&self) -> u32 {
		self.page_count() - 1
	}

	pub fn previous_page_index(&self) -> Option<u32> {
		self.page_index.checked_sub(1)
	}

	pub fn next_page_index(&self) -> Option<u32> {
		(self.page_index < self.last_page_index()).then(|| self.page_index + 1)
	}
}

/// One page of order summaries plus pagination metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPage {
	pub orders: Vec<OrderSummary>,
	pub meta: PageMeta,
}

impl OrderPage {
	pub fn find(&self, order_id: &str) -> Option<&OrderSummary> {
		self.orders.iter().find(|order| order.order_id == order_id)
	}

	pub fn contains(&self, order_id: &str) -> bool {
		self.find(order_id).is_some()
	}
}
