//! Event types for inter-component communication.
//!
//! The query cache announces every write as a [`CacheEvent`]; the mutation
//! dispatcher and the row controller publish [`MutationEvent`]s and
//! [`Notice`]s. Consumers subscribe and re-render from the cache.

use crate::order::{OrderAction, OrderStatus};
use crate::query::QueryKey;
use serde::{Deserialize, Serialize};

/// Main event type published on the desk event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DeskEvent {
	/// Events from the query cache.
	Cache(CacheEvent),
	/// Events from the mutation dispatcher.
	Mutation(MutationEvent),
	/// Operator-facing notifications.
	Notice(Notice),
}

/// Writes to the query cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheEvent {
	/// A fetch stored a fresh snapshot.
	Stored { key: QueryKey },
	/// The synchronizer patched the status of one order inside the snapshot.
	Patched {
		key: QueryKey,
		order_id: String,
		status: OrderStatus,
	},
	/// The snapshot was marked stale; its data is unchanged.
	Invalidated { key: QueryKey },
	/// The entry was discarded.
	Removed { key: QueryKey },
}

impl CacheEvent {
	pub fn key(&self) -> &QueryKey {
		match self {
			CacheEvent::Stored { key }
			| CacheEvent::Patched { key, .. }
			| CacheEvent::Invalidated { key }
			| CacheEvent::Removed { key } => key,
		}
	}
}

/// Lifecycle of a status mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MutationEvent {
	/// The remote call was issued.
	Submitted {
		order_id: String,
		action: OrderAction,
	},
	/// The remote call succeeded and the cache was synchronized.
	Applied {
		order_id: String,
		action: OrderAction,
		status: OrderStatus,
		patched_entries: usize,
	},
	/// The remote call failed; the cache was left untouched.
	Failed {
		order_id: String,
		action: OrderAction,
		error: String,
	},
}

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeLevel {
	Success,
	Error,
}

/// Non-blocking notification for the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
	pub level: NoticeLevel,
	pub order_id: String,
	pub message: String,
}

impl Notice {
	pub fn success(order_id: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			level: NoticeLevel::Success,
			order_id: order_id.into(),
			message: message.into(),
		}
	}

	pub fn error(order_id: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			level: NoticeLevel::Error,
			order_id: order_id.into(),
			message: message.into(),
		}
	}
}
