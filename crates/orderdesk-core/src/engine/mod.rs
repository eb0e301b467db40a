//! Runtime plumbing shared by the desk components.

pub mod event_bus;
pub mod maintenance;
