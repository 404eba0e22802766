//! In-memory request source and report writer.
//!
//! Useful for tests and dry runs where no files should be touched. Both types are
//! cheap to clone and clones share their contents.

use crate::{ReportWriter, RequestSource, StorageError};
use async_trait::async_trait;
use latency_types::{ConfigSchema, RequestRecord, Schema, TransactionOutcome, ValidationError};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Request source serving a fixed batch.
#[derive(Clone, Default)]
pub struct MemoryRequestSource {
	records: Arc<RwLock<Vec<RequestRecord>>>,
}

impl MemoryRequestSource {
	/// Creates a new source serving the given records.
	pub fn new(records: Vec<RequestRecord>) -> Self {
		Self {
			records: Arc::new(RwLock::new(records)),
		}
	}
}

/// Configuration schema for the memory source.
pub struct MemorySourceSchema;

impl ConfigSchema for MemorySourceSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// Records are inline tables; their fields are validated per request
		let schema = Schema::new(vec![], vec![]);
		schema.validate(config)?;
		match config.get("records") {
			Some(records) if !records.is_array() => Err(ValidationError::TypeMismatch {
				field: "records".to_string(),
				expected: "array".to_string(),
				actual: records.type_str().to_string(),
			}),
			_ => Ok(()),
		}
	}
}

#[async_trait]
impl RequestSource for MemoryRequestSource {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemorySourceSchema)
	}

	async fn read_batch(&self) -> Result<Vec<RequestRecord>, StorageError> {
		Ok(self.records.read().await.clone())
	}
}

/// Report writer that keeps the last written outcome set.
#[derive(Clone, Default)]
pub struct MemoryReportWriter {
	outcomes: Arc<RwLock<Vec<TransactionOutcome>>>,
	writes: Arc<RwLock<usize>>,
}

impl MemoryReportWriter {
	/// Creates a new, empty writer.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the last written outcome set.
	pub async fn outcomes(&self) -> Vec<TransactionOutcome> {
		self.outcomes.read().await.clone()
	}

	/// Number of completed writes.
	pub async fn writes(&self) -> usize {
		*self.writes.read().await
	}
}

/// Configuration schema for the memory writer.
pub struct MemoryWriterSchema;

impl ConfigSchema for MemoryWriterSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// Memory writer has no configuration
		let schema = Schema::new(vec![], vec![]);
		schema.validate(config)
	}
}

#[async_trait]
impl ReportWriter for MemoryReportWriter {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryWriterSchema)
	}

	async fn write(&self, outcomes: &[TransactionOutcome]) -> Result<(), StorageError> {
		*self.outcomes.write().await = outcomes.to_vec();
		*self.writes.write().await += 1;
		Ok(())
	}
}

/// Factory function to create a memory source from configuration.
///
/// Configuration parameters:
/// - `records` (optional): array of inline request tables
pub fn create_source(config: &toml::Value) -> Result<Box<dyn RequestSource>, StorageError> {
	MemorySourceSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let records: Vec<RequestRecord> = match config.get("records") {
		Some(records) => records
			.clone()
			.try_into()
			.map_err(|e: toml::de::Error| StorageError::Configuration(e.to_string()))?,
		None => Vec::new(),
	};

	Ok(Box::new(MemoryRequestSource::new(records)))
}

/// Factory function to create a memory writer from configuration.
pub fn create_writer(config: &toml::Value) -> Result<Box<dyn ReportWriter>, StorageError> {
	MemoryWriterSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;
	Ok(Box::new(MemoryReportWriter::new()))
}

/// Registry for the memory request source.
pub struct SourceRegistry;

impl latency_types::ImplementationRegistry for SourceRegistry {
	const NAME: &'static str = "memory";
	type Factory = crate::SourceFactory;

	fn factory() -> Self::Factory {
		create_source
	}
}

impl crate::SourceRegistry for SourceRegistry {}

/// Registry for the memory report writer.
pub struct WriterRegistry;

impl latency_types::ImplementationRegistry for WriterRegistry {
	const NAME: &'static str = "memory";
	type Factory = crate::WriterFactory;

	fn factory() -> Self::Factory {
		create_writer
	}
}

impl crate::WriterRegistry for WriterRegistry {}
