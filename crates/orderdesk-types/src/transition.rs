//! Transition rules for the order lifecycle.
//!
//! Orders move through: pending -> processing -> delivering -> delivered.
//! Pending and processing orders may also be canceled. Delivered and canceled
//! are terminal. Every function here is pure.

use crate::order::{OrderAction, OrderStatus};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors raised when a status change breaks the lifecycle rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
	#[error("Action '{action}' is not allowed for an order in status '{from}'")]
	ActionNotAllowed {
		from: OrderStatus,
		action: OrderAction,
	},
	#[error("Status '{to}' cannot follow status '{from}'")]
	Unreachable { from: OrderStatus, to: OrderStatus },
}

/// Legal edges, in the order actions are offered to operators.
const EDGES: &[(OrderStatus, OrderAction, OrderStatus)] = &[
	(
		OrderStatus::Pending,
		OrderAction::Approve,
		OrderStatus::Processing,
	),
	(OrderStatus::Pending, OrderAction::Cancel, OrderStatus::Canceled),
	(
		OrderStatus::Processing,
		OrderAction::Dispatch,
		OrderStatus::Delivering,
	),
	(
		OrderStatus::Processing,
		OrderAction::Cancel,
		OrderStatus::Canceled,
	),
	(
		OrderStatus::Delivering,
		OrderAction::Deliver,
		OrderStatus::Delivered,
	),
];

static TRANSITIONS: Lazy<HashMap<(OrderStatus, OrderAction), OrderStatus>> = Lazy::new(|| {
	EDGES
		.iter()
		.map(|&(from, action, to)| ((from, action), to))
		.collect()
});

/// Statuses reachable from each status through one or more edges.
static REACHABLE: Lazy<HashMap<OrderStatus, HashSet<OrderStatus>>> = Lazy::new(|| {
	OrderStatus::all()
		.map(|start| {
			let mut seen = HashSet::new();
			let mut frontier = vec![start];
			while let Some(current) = frontier.pop() {
				for &(from, _, to) in EDGES {
					if from == current && seen.insert(to) {
						frontier.push(to);
					}
				}
			}
			(start, seen)
		})
		.collect()
});

/// Checks whether `action` is legal for an order currently in `current`.
pub fn is_transition_allowed(current: OrderStatus, action: OrderAction) -> bool {
	TRANSITIONS.contains_key(&(current, action))
}

/// Status an order ends up in after `action`, or `None` when the action is illegal.
pub fn next_status(current: OrderStatus, action: OrderAction) -> Option<OrderStatus> {
	TRANSITIONS.get(&(current, action)).copied()
}

/// Like [`next_status`] but reports the rejected pair.
pub fn apply(current: OrderStatus, action: OrderAction) -> Result<OrderStatus, TransitionError> {
	next_status(current, action).ok_or(TransitionError::ActionNotAllowed {
		from: current,
		action,
	})
}

/// Actions legal for `current`, in the order they are offered to operators.
pub fn available_actions(current: OrderStatus) -> Vec<OrderAction> {
	EDGES
		.iter()
		.filter(|(from, _, _)| *from == current)
		.map(|(_, action, _)| *action)
		.collect()
}

/// Whether `to` can follow `from` through one or more legal edges.
pub fn is_reachable(from: OrderStatus, to: OrderStatus) -> bool {
	REACHABLE.get(&from).is_some_and(|set| set.contains(&to))
}

pub(crate) fn ensure_reachable(from: OrderStatus, to: OrderStatus) -> Result<(), TransitionError> {
	if is_reachable(from, to) {
		Ok(())
	} else {
		Err(TransitionError::Unreachable { from, to })
	}
}
