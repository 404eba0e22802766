//! CSV request source and report writer.
//!
//! The source reads the batch staged by the load generator; the writer produces
//! the per-request latency report. Files are read whole and written atomically
//! through a temporary file.

use crate::{ReportWriter, RequestSource, StorageError};
use ::csv::{ReaderBuilder, Trim, WriterBuilder};
use async_trait::async_trait;
use latency_types::{
	ConfigSchema, Field, FieldType, RequestRecord, Schema, SecretString, TransactionOutcome,
	ValidationError,
};
use std::path::PathBuf;
use tokio::fs;

/// Report columns, in order.
pub const REPORT_HEADER: [&str; 10] = [
	"user_id",
	"nft_id",
	"tx_hash",
	"status",
	"t1_jmeter",
	"t2_python_received",
	"t3_signed",
	"t4_sent",
	"t5_confirmed",
	"total_delay",
];

/// Optional trailing column carrying the failure reason.
pub const ERROR_COLUMN: &str = "error";

fn path_field() -> Field {
	Field::new("path", FieldType::String).with_validator(|value| match value.as_str() {
		Some(s) if !s.trim().is_empty() => Ok(()),
		_ => Err("path cannot be empty".to_string()),
	})
}

fn path_from_config(config: &toml::Value) -> Result<PathBuf, StorageError> {
	config
		.get("path")
		.and_then(|v| v.as_str())
		.map(PathBuf::from)
		.ok_or_else(|| StorageError::Configuration("path is required".to_string()))
}

/// Input columns the source understands.
#[derive(Debug, Clone, Copy)]
enum Column {
	UserId,
	NftId,
	Timestamp,
	PrivateKey,
	ContractAddress,
	EncodedData,
}

impl Column {
	fn from_header(header: &[u8]) -> Option<Self> {
		match header {
			b"user_id" => Some(Column::UserId),
			b"nft_id" => Some(Column::NftId),
			b"timestamp" => Some(Column::Timestamp),
			b"private_key" => Some(Column::PrivateKey),
			b"contract_address" => Some(Column::ContractAddress),
			b"encoded_data" => Some(Column::EncodedData),
			_ => None,
		}
	}

	fn name(self) -> &'static str {
		match self {
			Column::UserId => "user_id",
			Column::NftId => "nft_id",
			Column::Timestamp => "timestamp",
			Column::PrivateKey => "private_key",
			Column::ContractAddress => "contract_address",
			Column::EncodedData => "encoded_data",
		}
	}

	fn assign(self, record: &mut RequestRecord, value: Option<String>) {
		match self {
			Column::UserId => record.user_id = value,
			Column::NftId => record.nft_id = value,
			Column::Timestamp => record.timestamp = value,
			Column::PrivateKey => record.private_key = value.map(SecretString::new),
			Column::ContractAddress => record.contract_address = value,
			Column::EncodedData => record.encoded_data = value,
		}
	}
}

/// Reads request records from a CSV file with a header row.
///
/// Columns are matched by header name; extra columns are ignored. Missing, empty
/// and undecodable cells become absent fields, so a damaged row still yields a
/// record and fails on its own during validation.
pub struct CsvRequestSource {
	path: PathBuf,
}

impl CsvRequestSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

/// Configuration schema for the CSV request source.
pub struct CsvSourceSchema;

impl ConfigSchema for CsvSourceSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![path_field()], vec![]).validate(config)
	}
}

#[async_trait]
impl RequestSource for CsvRequestSource {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(CsvSourceSchema)
	}

	async fn read_batch(&self) -> Result<Vec<RequestRecord>, StorageError> {
		let data = match fs::read(&self.path).await {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return Err(StorageError::NotFound(self.path.display().to_string()))
			},
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let mut reader = ReaderBuilder::new()
			.has_headers(true)
			.flexible(true)
			.trim(Trim::Headers)
			.from_reader(data.as_slice());

		let columns: Vec<Option<Column>> = reader
			.byte_headers()
			.map_err(|e| StorageError::Serialization(format!("header: {}", e)))?
			.iter()
			.map(Column::from_header)
			.collect();

		let mut records = Vec::new();
		for (row, result) in reader.byte_records().enumerate() {
			let cells = result
				.map_err(|e| StorageError::Serialization(format!("row {}: {}", row + 1, e)))?;

			let mut record = RequestRecord::default();
			for (column, cell) in columns.iter().zip(cells.iter()) {
				let Some(column) = column else { continue };
				let value = match std::str::from_utf8(cell) {
					Ok(text) => Some(text).filter(|t| !t.is_empty()).map(str::to_string),
					Err(_) => {
						tracing::warn!(row = row + 1, column = column.name(), "Cell is not valid UTF-8");
						None
					},
				};
				column.assign(&mut record, value);
			}
			records.push(record);
		}

		tracing::debug!(path = %self.path.display(), count = records.len(), "Read request batch");
		Ok(records)
	}
}

/// Writes the latency report as CSV.
pub struct CsvReportWriter {
	path: PathBuf,
	include_errors: bool,
}

impl CsvReportWriter {
	pub fn new(path: impl Into<PathBuf>, include_errors: bool) -> Self {
		Self {
			path: path.into(),
			include_errors,
		}
	}

	/// Renders the report in memory.
	pub fn render(&self, outcomes: &[TransactionOutcome]) -> Result<Vec<u8>, StorageError> {
		let mut writer = WriterBuilder::new().from_writer(Vec::new());

		let mut header: Vec<&str> = REPORT_HEADER.to_vec();
		if self.include_errors {
			header.push(ERROR_COLUMN);
		}
		writer
			.write_record(&header)
			.map_err(|e| StorageError::Serialization(e.to_string()))?;

		for outcome in outcomes {
			let mut row = vec![
				outcome.user_id.clone(),
				outcome.nft_id.clone(),
				outcome
					.tx_hash
					.as_ref()
					.map(|h| h.to_hex())
					.unwrap_or_default(),
				outcome.status.as_report_str().to_string(),
				seconds(outcome.timestamps.generated),
				seconds(outcome.timestamps.received),
				seconds(outcome.timestamps.signed),
				seconds(outcome.timestamps.broadcast),
				seconds(outcome.timestamps.confirmed),
				outcome
					.total_delay()
					.map(|d| format!("{:.3}", d))
					.unwrap_or_default(),
			];
			if self.include_errors {
				row.push(outcome.error.clone().unwrap_or_default());
			}
			writer
				.write_record(&row)
				.map_err(|e| StorageError::Serialization(e.to_string()))?;
		}

		writer
			.into_inner()
			.map_err(|e| StorageError::Serialization(e.to_string()))
	}
}

fn seconds(value: Option<f64>) -> String {
	value.map(|v| format!("{:.6}", v)).unwrap_or_default()
}

/// Configuration schema for the CSV report writer.
pub struct CsvWriterSchema;

impl ConfigSchema for CsvWriterSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(
			vec![path_field()],
			vec![Field::new("include_errors", FieldType::Boolean)],
		)
		.validate(config)
	}
}

#[async_trait]
impl ReportWriter for CsvReportWriter {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(CsvWriterSchema)
	}

	async fn write(&self, outcomes: &[TransactionOutcome]) -> Result<(), StorageError> {
		let data = self.render(outcomes)?;

		if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		// Write atomically by writing to temp file then renaming
		let temp_path = self.path.with_extension("tmp");
		fs::write(&temp_path, data)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&temp_path, &self.path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		tracing::debug!(path = %self.path.display(), rows = outcomes.len(), "Wrote report");
		Ok(())
	}
}

/// Factory function to create a CSV request source from configuration.
///
/// Configuration parameters:
/// - `path`: file to read
pub fn create_source(config: &toml::Value) -> Result<Box<dyn RequestSource>, StorageError> {
	CsvSourceSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;
	Ok(Box::new(CsvRequestSource::new(path_from_config(config)?)))
}

/// Factory function to create a CSV report writer from configuration.
///
/// Configuration parameters:
/// - `path`: file to write
/// - `include_errors`: append an `error` column (default: false)
pub fn create_writer(config: &toml::Value) -> Result<Box<dyn ReportWriter>, StorageError> {
	CsvWriterSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let include_errors = config
		.get("include_errors")
		.and_then(|v| v.as_bool())
		.unwrap_or(false);

	Ok(Box::new(CsvReportWriter::new(
		path_from_config(config)?,
		include_errors,
	)))
}

/// Registry for the CSV request source.
pub struct SourceRegistry;

impl latency_types::ImplementationRegistry for SourceRegistry {
	const NAME: &'static str = "csv";
	type Factory = crate::SourceFactory;

	fn factory() -> Self::Factory {
		create_source
	}
}

impl crate::SourceRegistry for SourceRegistry {}

/// Registry for the CSV report writer.
pub struct WriterRegistry;

impl latency_types::ImplementationRegistry for WriterRegistry {
	const NAME: &'static str = "csv";
	type Factory = crate::WriterFactory;

	fn factory() -> Self::Factory {
		create_writer
	}
}

impl crate::WriterRegistry for WriterRegistry {}
