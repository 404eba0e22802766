//! Transaction request types.
//!
//! A [`RequestRecord`] is one row exactly as the load generator staged it. Every
//! column is optional so that a malformed row still reaches the dispatcher, where
//! it becomes a per-request failure instead of aborting the batch. A
//! [`TransactionRequest`] is the validated, immutable form of a record.

use crate::utils::without_0x_prefix;
use crate::SecretString;
use alloy_primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Errors produced when validating a raw request record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
	/// A required column was absent or empty.
	#[error("Missing required field: {0}")]
	MissingField(&'static str),
	/// A column was present but could not be parsed.
	#[error("Invalid value for field '{field}': {message}")]
	InvalidField {
		field: &'static str,
		message: String,
	},
}

/// One staged transaction request as read from the input batch.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RequestRecord {
	pub user_id: Option<String>,
	pub nft_id: Option<String>,
	/// Generator-assigned float seconds since the Unix epoch.
	pub timestamp: Option<String>,
	pub private_key: Option<SecretString>,
	pub contract_address: Option<String>,
	pub encoded_data: Option<String>,
}

impl RequestRecord {
	/// User identifier, or an empty string if the record has none.
	pub fn user_id(&self) -> &str {
		self.user_id.as_deref().unwrap_or_default()
	}

	/// NFT identifier, or an empty string if the record has none.
	pub fn nft_id(&self) -> &str {
		self.nft_id.as_deref().unwrap_or_default()
	}

	/// Parses the generation timestamp if it is present and valid.
	///
	/// Used to keep `t_generated` on outcomes whose other fields are malformed.
	pub fn generated_at(&self) -> Option<f64> {
		parse_timestamp(self.timestamp.as_deref()?).ok()
	}
}

/// A validated transaction request.
///
/// All fields are required and immutable after construction. The signing key is
/// scoped to the lifetime of this value and is zeroized when it is dropped.
#[derive(Debug, Clone)]
pub struct TransactionRequest {
	pub user_id: String,
	pub nft_id: String,
	/// Batch-start reference point for latency measurement.
	pub generated_at: f64,
	pub signing_key: SecretString,
	pub contract_address: Address,
	pub encoded_payload: Bytes,
}

impl TryFrom<&RequestRecord> for TransactionRequest {
	type Error = RequestError;

	fn try_from(record: &RequestRecord) -> Result<Self, Self::Error> {
		let user_id = required(&record.user_id, "user_id")?.to_string();
		let nft_id = required(&record.nft_id, "nft_id")?.to_string();
		let generated_at = parse_timestamp(required(&record.timestamp, "timestamp")?)?;

		let signing_key = match &record.private_key {
			Some(key) if !key.is_blank() => key.clone(),
			_ => return Err(RequestError::MissingField("private_key")),
		};

		let contract_address = Address::from_str(
			required(&record.contract_address, "contract_address")?,
		)
		.map_err(|e| RequestError::InvalidField {
			field: "contract_address",
			message: e.to_string(),
		})?;

		let encoded_data = record
			.encoded_data
			.as_deref()
			.map(str::trim)
			.ok_or(RequestError::MissingField("encoded_data"))?;
		let encoded_payload = hex::decode(without_0x_prefix(encoded_data))
			.map(Bytes::from)
			.map_err(|e| RequestError::InvalidField {
				field: "encoded_data",
				message: e.to_string(),
			})?;

		Ok(Self {
			user_id,
			nft_id,
			generated_at,
			signing_key,
			contract_address,
			encoded_payload,
		})
	}
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, RequestError> {
	match value.as_deref().map(str::trim) {
		Some(v) if !v.is_empty() => Ok(v),
		_ => Err(RequestError::MissingField(field)),
	}
}

fn parse_timestamp(raw: &str) -> Result<f64, RequestError> {
	let value = raw
		.trim()
		.parse::<f64>()
		.map_err(|e| RequestError::InvalidField {
			field: "timestamp",
			message: e.to_string(),
		})?;
	if !value.is_finite() || value < 0.0 {
		return Err(RequestError::InvalidField {
			field: "timestamp",
			message: format!("{} is not a valid epoch timestamp", raw),
		});
	}
	Ok(value)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn valid_record() -> RequestRecord {
		RequestRecord {
			user_id: Some("user-1".into()),
			nft_id: Some("nft-7".into()),
			timestamp: Some("1700000000.125".into()),
			private_key: Some(SecretString::from(
				"0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
			)),
			contract_address: Some("0x5FbDB2315678afecb367f032d93F642f64180aa3".into()),
			encoded_data: Some("0xa0712d680000000000000000000000000000000000000000000000000000000000000001".into()),
		}
	}

	#[test]
	fn test_valid_record() {
		let request = TransactionRequest::try_from(&valid_record()).unwrap();
		assert_eq!(request.user_id, "user-1");
		assert_eq!(request.nft_id, "nft-7");
		assert_eq!(request.generated_at, 1700000000.125);
		assert_eq!(request.encoded_payload.len(), 36);
		assert_eq!(
			request.contract_address,
			Address::from_str("0x5fbdb2315678afecb367f032d93f642f64180aa3").unwrap()
		);
	}

	#[test]
	fn test_empty_private_key_is_missing() {
		let mut record = valid_record();
		record.private_key = Some(SecretString::from(""));
		let err = TransactionRequest::try_from(&record).unwrap_err();
		assert_eq!(err, RequestError::MissingField("private_key"));

		record.private_key = None;
		let err = TransactionRequest::try_from(&record).unwrap_err();
		assert_eq!(err, RequestError::MissingField("private_key"));
	}

	#[test]
	fn test_invalid_fields() {
		let mut record = valid_record();
		record.timestamp = Some("yesterday".into());
		assert!(matches!(
			TransactionRequest::try_from(&record),
			Err(RequestError::InvalidField { field: "timestamp", .. })
		));

		let mut record = valid_record();
		record.contract_address = Some("0x1234".into());
		assert!(matches!(
			TransactionRequest::try_from(&record),
			Err(RequestError::InvalidField { field: "contract_address", .. })
		));

		let mut record = valid_record();
		record.encoded_data = Some("0xzz".into());
		assert!(matches!(
			TransactionRequest::try_from(&record),
			Err(RequestError::InvalidField { field: "encoded_data", .. })
		));
	}

	#[test]
	fn test_empty_payload_is_allowed() {
		let mut record = valid_record();
		record.encoded_data = Some("0x".into());
		let request = TransactionRequest::try_from(&record).unwrap();
		assert!(request.encoded_payload.is_empty());
	}

	#[test]
	fn test_generated_at_survives_other_failures() {
		let mut record = valid_record();
		record.private_key = None;
		assert_eq!(record.generated_at(), Some(1700000000.125));

		record.timestamp = Some("-1".into());
		assert_eq!(record.generated_at(), None);
	}

	#[test]
	fn test_debug_does_not_leak_key() {
		let request = TransactionRequest::try_from(&valid_record()).unwrap();
		let debug = format!("{:?}", request);
		assert!(!debug.contains("ac0974bec39a17e3"));
	}
}
