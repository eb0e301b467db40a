//! Error taxonomy of the order desk.
//!
//! Errors fall into two tiers. `InvalidTransition`, `AlreadyInProgress` and
//! `NotCached` are programming or UI-race errors. `MutationFailed` and
//! `FetchFailed` are expected at runtime and are shown to the operator.
//! `CacheSync` reports an aborted batch patch. Every variant names the order
//! or query it is scoped to.

use orderdesk_types::{OrderAction, OrderStatus, QueryKey};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum DeskError {
	/// The action is not legal from the order's last-known status.
	#[error("Cannot {action} order {order_id} while it is {from}")]
	InvalidTransition {
		order_id: String,
		from: OrderStatus,
		action: OrderAction,
	},
	/// A mutation for the same order has not completed yet.
	#[error("A {action} request for order {order_id} is already in progress")]
	AlreadyInProgress {
		order_id: String,
		action: OrderAction,
	},
	/// The remote service rejected the mutation or could not be reached.
	#[error("Failed to {action} order {order_id}: {reason}")]
	MutationFailed {
		order_id: String,
		action: OrderAction,
		reason: String,
	},
	/// A read could not be completed.
	#[error("Failed to fetch '{key}': {reason}")]
	FetchFailed { key: QueryKey, reason: String },
	/// The row is not present in the cached snapshot it was addressed through.
	#[error("Order {order_id} is not cached under '{key}'")]
	NotCached { key: QueryKey, order_id: String },
	/// The cache could not be brought in line with a confirmed mutation.
	#[error("Cache synchronization failed for order {order_id}: {reason}")]
	CacheSync { order_id: String, reason: String },
}

impl DeskError {
	/// Whether the error belongs to the runtime tier that is surfaced to the
	/// operator as-is.
	pub fn is_expected(&self) -> bool {
		matches!(
			self,
			DeskError::MutationFailed { .. } | DeskError::FetchFailed { .. }
		)
	}

	/// Order the error is scoped to, when it concerns a single order.
	pub fn order_id(&self) -> Option<&str> {
		match self {
			DeskError::InvalidTransition { order_id, .. }
			| DeskError::AlreadyInProgress { order_id, .. }
			| DeskError::MutationFailed { order_id, .. }
			| DeskError::NotCached { order_id, .. }
			| DeskError::CacheSync { order_id, .. } => Some(order_id),
			DeskError::FetchFailed { key, .. } => match key {
				QueryKey::Order { order_id } => Some(order_id),
				QueryKey::Orders(_) => None,
			},
		}
	}
}
