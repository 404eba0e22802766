//! Registry trait for self-registering implementations.

/// Base trait for implementation registries.
///
/// Every pluggable implementation (delivery, request source, report writer,
/// account) exposes a `Registry` type implementing this trait, declaring the name
/// it is selected by in configuration and the factory that builds it.
pub trait ImplementationRegistry {
	/// Name used in configuration files, e.g. `"evm_alloy"` for
	/// `[delivery.implementations.evm_alloy]` or `"csv"` for `[input.implementations.csv]`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Returns the factory function for this implementation.
	fn factory() -> Self::Factory;
}
