//! Common types for the orderdesk system.
//!
//! This crate holds the order entity model, the transition rules that govern
//! status changes, the query keys used to address cached snapshots, and the
//! events exchanged between components. Everything here is pure data or pure
//! functions; no I/O happens in this crate.

/// Event types for inter-component communication.
pub mod events;
/// Order entity model: summaries, details, statuses and actions.
pub mod order;
/// Query keys and cached snapshot payloads.
pub mod query;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Transition rules for the order lifecycle.
pub mod transition;
/// Formatting helpers.
pub mod utils;

pub use events::*;
pub use order::*;
pub use query::*;
pub use registry::ImplementationRegistry;
pub use transition::{
	available_actions, is_reachable, is_transition_allowed, next_status, TransitionError,
};
pub use utils::{format_cents, truncate_id};
