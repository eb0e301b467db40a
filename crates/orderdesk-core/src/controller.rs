//! Row interaction controller.
//!
//! Presents one order row as its status plus the actions the transition rules
//! allow from it, and runs those actions through the dispatcher. The row's
//! status is always read from the cached snapshot the row was rendered from;
//! the controller never assigns it.

use crate::dispatcher::MutationDispatcher;
use crate::engine::event_bus::EventBus;
use crate::DeskError;
use orderdesk_cache::QueryCache;
use orderdesk_types::{
	available_actions, truncate_id, DeskEvent, Notice, OrderAction, OrderStatus, QueryData,
	QueryKey, StatusTone,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::instrument;

type Pending = Arc<Mutex<HashSet<(String, OrderAction)>>>;

/// One action button on a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionState {
	pub action: OrderAction,
	pub label: &'static str,
	/// False while a request for this action is pending here, or while any
	/// mutation for the order is still outstanding at the dispatcher.
	pub enabled: bool,
}

/// Everything needed to render one order row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowView {
	pub order_id: String,
	pub status: OrderStatus,
	pub status_label: &'static str,
	pub tone: StatusTone,
	/// Legal actions for `status`, in rule-table order. Empty for terminal
	/// statuses.
	pub actions: Vec<ActionState>,
}

impl RowView {
	pub fn action(&self, action: OrderAction) -> Option<&ActionState> {
		self.actions.iter().find(|state| state.action == action)
	}

	pub fn is_enabled(&self, action: OrderAction) -> bool {
		self.action(action).is_some_and(|state| state.enabled)
	}
}

/// Clears a `(order, action)` flag when dropped.
struct PendingFlag {
	pending: Pending,
	entry: (String, OrderAction),
}

impl PendingFlag {
	fn raise(pending: &Pending, order_id: &str, action: OrderAction) -> Option<Self> {
		let entry = (order_id.to_string(), action);
		let raised = pending
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.insert(entry.clone());
		raised.then(|| Self {
			pending: Arc::clone(pending),
			entry,
		})
	}
}

impl Drop for PendingFlag {
	fn drop(&mut self) {
		self.pending
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.remove(&self.entry);
	}
}

pub struct RowController {
	dispatcher: Arc<MutationDispatcher>,
	cache: Arc<QueryCache>,
	event_bus: EventBus,
	pending: Pending,
}

impl RowController {
	pub fn new(
		dispatcher: Arc<MutationDispatcher>,
		cache: Arc<QueryCache>,
		event_bus: EventBus,
	) -> Self {
		Self {
			dispatcher,
			cache,
			event_bus,
			pending: Arc::new(Mutex::new(HashSet::new())),
		}
	}

	/// Status of `order_id` as held by the snapshot under `key`.
	pub fn status_in(&self, key: &QueryKey, order_id: &str) -> Result<OrderStatus, DeskError> {
		let status = self.cache.get(key).and_then(|data| match data.as_ref() {
			QueryData::Orders(page) => page.find(order_id).map(|row| row.status()),
			QueryData::Order(detail) => (detail.id == order_id).then(|| detail.status()),
		});

		status.ok_or_else(|| DeskError::NotCached {
			key: key.clone(),
			order_id: order_id.to_string(),
		})
	}

	/// Derives the row for `order_id` from the snapshot under `key`.
	pub fn row_view(&self, key: &QueryKey, order_id: &str) -> Result<RowView, DeskError> {
		let status = self.status_in(key, order_id)?;
		let order_busy = self.dispatcher.is_in_flight(order_id);
		let pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);

		let actions = available_actions(status)
			.into_iter()
			.map(|action| ActionState {
				action,
				label: action.label(),
				enabled: !order_busy && !pending.contains(&(order_id.to_string(), action)),
			})
			.collect();

		Ok(RowView {
			order_id: order_id.to_string(),
			status,
			status_label: status.label(),
			tone: status.tone(),
			actions,
		})
	}

	/// Rows for every order of the list page under `key`, in page order.
	pub fn rows(&self, key: &QueryKey) -> Vec<RowView> {
		let Some(data) = self.cache.get(key) else {
			return Vec::new();
		};
		let Some(page) = data.as_page() else {
			return Vec::new();
		};
		page.orders
			.iter()
			.filter_map(|row| self.row_view(key, &row.order_id).ok())
			.collect()
	}

	/// Runs `action` on the row and returns the row as re-read from the cache.
	///
	/// Successes publish a success notice. Remote failures publish an error
	/// notice; refusals such as `InvalidTransition` or `AlreadyInProgress` are
	/// only logged and returned.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id), action = %action))]
	pub async fn perform(
		&self,
		key: &QueryKey,
		order_id: &str,
		action: OrderAction,
	) -> Result<RowView, DeskError> {
		let outcome = self.run(key, order_id, action).await;

		match &outcome {
			Ok(row) => {
				self.notify(Notice::success(
					order_id,
					format!("Order {} successfully", past_tense(action)),
				));
				tracing::debug!(status = %row.status, "Row updated");
			},
			Err(e) if e.is_expected() => {
				self.notify(Notice::error(order_id, e.to_string()));
			},
			Err(e) => {
				tracing::warn!(error = %e, "Row action refused");
			},
		}
		outcome
	}

	async fn run(
		&self,
		key: &QueryKey,
		order_id: &str,
		action: OrderAction,
	) -> Result<RowView, DeskError> {
		let status = self.status_in(key, order_id)?;

		let Some(flag) = PendingFlag::raise(&self.pending, order_id, action) else {
			return Err(DeskError::AlreadyInProgress {
				order_id: order_id.to_string(),
				action,
			});
		};
		let result = self.dispatcher.submit(order_id, status, action).await;
		drop(flag);

		result?;
		self.row_view(key, order_id)
	}

	fn notify(&self, notice: Notice) {
		self.event_bus.publish(DeskEvent::Notice(notice));
	}
}

fn past_tense(action: OrderAction) -> &'static str {
	match action {
		OrderAction::Approve => "approved",
		OrderAction::Dispatch => "dispatched",
		OrderAction::Deliver => "delivered",
		OrderAction::Cancel => "canceled",
	}
}
