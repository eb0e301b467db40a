//! Mutation dispatcher.
//!
//! Every status change goes through [`MutationDispatcher::submit`]:
//!
//! 1. the transition rules are checked against the caller's last-known status;
//! 2. the order is marked in flight, rejecting any concurrent mutation for it;
//! 3. the remote call runs on a spawned task;
//! 4. on success the cache synchronizer patches every cached copy of the order,
//!    on failure the cache is left alone.
//!
//! The spawned task owns the in-flight mark, so the mark is released and the
//! cache is synchronized even when the caller stops waiting.

use crate::engine::event_bus::EventBus;
use crate::synchronizer::CacheSynchronizer;
use crate::DeskError;
use orderdesk_client::OrderServiceClient;
use orderdesk_types::{
	next_status, truncate_id, DeskEvent, MutationEvent, OrderAction, OrderStatus,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::instrument;

/// Order ids with a mutation outstanding.
type InFlight = Arc<Mutex<HashSet<String>>>;

/// Marks an order in flight for as long as it lives.
struct InFlightGuard {
	orders: InFlight,
	order_id: String,
}

impl InFlightGuard {
	fn acquire(orders: &InFlight, order_id: &str) -> Option<Self> {
		let inserted = orders
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.insert(order_id.to_string());
		inserted.then(|| Self {
			orders: Arc::clone(orders),
			order_id: order_id.to_string(),
		})
	}
}

impl Drop for InFlightGuard {
	fn drop(&mut self) {
		self.orders
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.remove(&self.order_id);
	}
}

/// Issues status mutations against the order service.
pub struct MutationDispatcher {
	client: Arc<OrderServiceClient>,
	synchronizer: CacheSynchronizer,
	event_bus: EventBus,
	in_flight: InFlight,
}

impl MutationDispatcher {
	pub fn new(
		client: Arc<OrderServiceClient>,
		synchronizer: CacheSynchronizer,
		event_bus: EventBus,
	) -> Self {
		Self {
			client,
			synchronizer,
			event_bus,
			in_flight: Arc::new(Mutex::new(HashSet::new())),
		}
	}

	pub async fn approve(
		&self,
		order_id: &str,
		last_known: OrderStatus,
	) -> Result<OrderStatus, DeskError> {
		self.submit(order_id, last_known, OrderAction::Approve).await
	}

	pub async fn cancel(
		&self,
		order_id: &str,
		last_known: OrderStatus,
	) -> Result<OrderStatus, DeskError> {
		self.submit(order_id, last_known, OrderAction::Cancel).await
	}

	pub async fn dispatch(
		&self,
		order_id: &str,
		last_known: OrderStatus,
	) -> Result<OrderStatus, DeskError> {
		self.submit(order_id, last_known, OrderAction::Dispatch).await
	}

	pub async fn deliver(
		&self,
		order_id: &str,
		last_known: OrderStatus,
	) -> Result<OrderStatus, DeskError> {
		self.submit(order_id, last_known, OrderAction::Deliver).await
	}

	/// Whether a mutation for `order_id` is outstanding.
	pub fn is_in_flight(&self, order_id: &str) -> bool {
		self.in_flight
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.contains(order_id)
	}

	/// Applies `action` to the order and returns its new status.
	///
	/// # Errors
	///
	/// - `InvalidTransition` when `action` is not legal from `last_known`; no
	///   remote call is made.
	/// - `AlreadyInProgress` when another mutation for the order is outstanding;
	///   no remote call is made.
	/// - `MutationFailed` when the remote call fails; the cache is unchanged.
	/// - `CacheSync` when the remote call succeeded but the cache could not be
	///   patched; the affected entries are marked stale.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id), action = %action))]
	pub async fn submit(
		&self,
		order_id: &str,
		last_known: OrderStatus,
		action: OrderAction,
	) -> Result<OrderStatus, DeskError> {
		let Some(new_status) = next_status(last_known, action) else {
			tracing::warn!(from = %last_known, "Rejected transition");
			return Err(DeskError::InvalidTransition {
				order_id: order_id.to_string(),
				from: last_known,
				action,
			});
		};

		let Some(guard) = InFlightGuard::acquire(&self.in_flight, order_id) else {
			return Err(DeskError::AlreadyInProgress {
				order_id: order_id.to_string(),
				action,
			});
		};

		let client = Arc::clone(&self.client);
		let synchronizer = self.synchronizer.clone();
		let event_bus = self.event_bus.clone();
		let task_order_id = order_id.to_string();

		let task = tokio::spawn(async move {
			let _guard = guard;
			run_mutation(&client, &synchronizer, &event_bus, task_order_id, action, new_status)
				.await
		});

		task.await.unwrap_or_else(|e| {
			Err(DeskError::MutationFailed {
				order_id: order_id.to_string(),
				action,
				reason: format!("mutation task aborted: {}", e),
			})
		})
	}
}

async fn run_mutation(
	client: &OrderServiceClient,
	synchronizer: &CacheSynchronizer,
	event_bus: &EventBus,
	order_id: String,
	action: OrderAction,
	new_status: OrderStatus,
) -> Result<OrderStatus, DeskError> {
	event_bus.publish(DeskEvent::Mutation(MutationEvent::Submitted {
		order_id: order_id.clone(),
		action,
	}));

	if let Err(e) = client.submit(&order_id, action).await {
		tracing::warn!(order_id = %truncate_id(&order_id), action = %action, error = %e, "Mutation failed");
		event_bus.publish(DeskEvent::Mutation(MutationEvent::Failed {
			order_id: order_id.clone(),
			action,
			error: e.to_string(),
		}));
		return Err(DeskError::MutationFailed {
			order_id,
			action,
			reason: e.to_string(),
		});
	}

	match synchronizer.apply_status_change(&order_id, new_status) {
		Ok(patched) => {
			tracing::info!(
				order_id = %truncate_id(&order_id),
				action = %action,
				status = %new_status,
				patched_entries = patched.len(),
				"Mutation applied"
			);
			event_bus.publish(DeskEvent::Mutation(MutationEvent::Applied {
				order_id,
				action,
				status: new_status,
				patched_entries: patched.len(),
			}));
			Ok(new_status)
		},
		Err(e) => {
			// The service holds the new status; force a refetch of every copy.
			let stale = synchronizer.invalidate_holding(&order_id);
			tracing::error!(
				order_id = %truncate_id(&order_id),
				action = %action,
				invalidated = stale,
				error = %e,
				"Cache synchronization failed"
			);
			Err(e)
		},
	}
}
