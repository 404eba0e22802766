//! Storage module for the transaction latency benchmark.
//!
//! This module provides the two ends of a run: a [`RequestSource`] that reads the
//! staged request batch and a [`ReportWriter`] that persists the ordered outcome
//! set. Both are pluggable, with CSV implementations for real runs and in-memory
//! implementations for tests and dry runs.

use async_trait::async_trait;
use latency_types::{ConfigSchema, ImplementationRegistry, RequestRecord, TransactionOutcome};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod csv;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when the input does not exist.
	#[error("Not found: {0}")]
	NotFound(String),
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for request batch sources.
#[async_trait]
pub trait RequestSource: Send + Sync {
	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Reads the whole batch, in input order.
	///
	/// Malformed rows are returned as records with missing fields; only an
	/// unreadable source is an error.
	async fn read_batch(&self) -> Result<Vec<RequestRecord>, StorageError>;
}

/// Trait defining the interface for outcome report writers.
#[async_trait]
pub trait ReportWriter: Send + Sync {
	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Writes the outcome set, replacing any previous report.
	///
	/// Outcomes are written in the order given. Writing the same set twice must
	/// produce identical output.
	async fn write(&self, outcomes: &[TransactionOutcome]) -> Result<(), StorageError>;
}

/// Type alias for request source factory functions.
pub type SourceFactory = fn(&toml::Value) -> Result<Box<dyn RequestSource>, StorageError>;

/// Type alias for report writer factory functions.
pub type WriterFactory = fn(&toml::Value) -> Result<Box<dyn ReportWriter>, StorageError>;

/// Registry trait for request source implementations.
pub trait SourceRegistry: ImplementationRegistry<Factory = SourceFactory> {}

/// Registry trait for report writer implementations.
pub trait WriterRegistry: ImplementationRegistry<Factory = WriterFactory> {}

/// Get all registered request source implementations.
pub fn get_all_sources() -> Vec<(&'static str, SourceFactory)> {
	use implementations::{csv, memory};

	vec![
		(csv::SourceRegistry::NAME, csv::SourceRegistry::factory()),
		(memory::SourceRegistry::NAME, memory::SourceRegistry::factory()),
	]
}

/// Get all registered report writer implementations.
pub fn get_all_writers() -> Vec<(&'static str, WriterFactory)> {
	use implementations::{csv, memory};

	vec![
		(csv::WriterRegistry::NAME, csv::WriterRegistry::factory()),
		(memory::WriterRegistry::NAME, memory::WriterRegistry::factory()),
	]
}
