//! Registry trait for self-registering implementations.
//!
//! Each pluggable order service implementation exposes a `Registry` type that
//! names it for configuration and hands out its factory function.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation.
	///
	/// This matches the key under `[service.implementations]`, for example
	/// `"http"` or `"memory"`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
