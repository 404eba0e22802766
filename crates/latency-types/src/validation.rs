//! Configuration validation for implementation tables.
//!
//! Each pluggable implementation receives its own raw TOML table. Before the table
//! is used, the implementation validates it against a [`Schema`] of required and
//! optional [`Field`]s, optionally with custom validators.

use thiserror::Error;

/// Reasons an implementation table can be rejected.
#[derive(Debug, Error)]
pub enum ValidationError {
	#[error("Missing required field: {0}")]
	MissingField(String),
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
}

impl ValidationError {
	fn mismatch(field: &str, expected: &str, found: &toml::Value) -> Self {
		Self::TypeMismatch {
			field: field.to_string(),
			expected: expected.to_string(),
			actual: found.type_str().to_string(),
		}
	}

	fn invalid(field: &str, message: impl Into<String>) -> Self {
		Self::InvalidValue {
			field: field.to_string(),
			message: message.into(),
		}
	}
}

/// Expected shape of a field value.
#[derive(Debug)]
pub enum FieldType {
	String,
	/// Integer within the optional inclusive bounds.
	Integer {
		min: Option<i64>,
		max: Option<i64>,
	},
	Boolean,
}

impl FieldType {
	fn check(&self, field: &str, value: &toml::Value) -> Result<(), ValidationError> {
		match self {
			FieldType::String if value.is_str() => Ok(()),
			FieldType::String => Err(ValidationError::mismatch(field, "string", value)),
			FieldType::Boolean if value.is_bool() => Ok(()),
			FieldType::Boolean => Err(ValidationError::mismatch(field, "boolean", value)),
			FieldType::Integer { min, max } => {
				let n = value
					.as_integer()
					.ok_or_else(|| ValidationError::mismatch(field, "integer", value))?;
				match (min, max) {
					(Some(lo), _) if n < *lo => Err(ValidationError::invalid(
						field,
						format!("{} is below the minimum of {}", n, lo),
					)),
					(_, Some(hi)) if n > *hi => Err(ValidationError::invalid(
						field,
						format!("{} is above the maximum of {}", n, hi),
					)),
					_ => Ok(()),
				}
			},
		}
	}
}

/// Extra check run once the value has the expected shape. Returns the failure
/// message.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// One named entry of a [`Schema`].
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("has_validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	/// Adds a check that runs after the type check passes.
	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		self.field_type.check(&self.name, value)?;
		match &self.validator {
			Some(validator) => {
				validator(value).map_err(|message| ValidationError::invalid(&self.name, message))
			},
			None => Ok(()),
		}
	}
}

/// Required and optional fields of an implementation table.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Checks `config` against the schema.
	///
	/// Optional fields are only checked when present and unknown keys are
	/// ignored.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| ValidationError::mismatch("root", "table", config))?;

		for field in &self.required {
			match table.get(&field.name) {
				Some(value) => field.check(value)?,
				None => return Err(ValidationError::MissingField(field.name.clone())),
			}
		}
		self.optional
			.iter()
			.filter_map(|field| table.get(&field.name).map(|value| (field, value)))
			.try_for_each(|(field, value)| field.check(value))
	}
}

/// Validation hook exposed by every pluggable implementation.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn schema() -> Schema {
		Schema::new(
			vec![Field::new("path", FieldType::String).with_validator(|v| {
				match v.as_str() {
					Some(s) if !s.is_empty() => Ok(()),
					_ => Err("path cannot be empty".to_string()),
				}
			})],
			vec![
				Field::new(
					"poll_interval_ms",
					FieldType::Integer {
						min: Some(1),
						max: Some(60_000),
					},
				),
				Field::new("include_errors", FieldType::Boolean),
			],
		)
	}

	#[test]
	fn test_valid_table() {
		let value: toml::Value = toml::from_str("path = \"out.csv\"\npoll_interval_ms = 500").unwrap();
		assert!(schema().validate(&value).is_ok());
	}

	#[test]
	fn test_missing_required() {
		let value: toml::Value = toml::from_str("poll_interval_ms = 500").unwrap();
		assert!(matches!(
			schema().validate(&value),
			Err(ValidationError::MissingField(f)) if f == "path"
		));
	}

	#[test]
	fn test_bounds_and_types() {
		let value: toml::Value = toml::from_str("path = \"a\"\npoll_interval_ms = 0").unwrap();
		assert!(matches!(
			schema().validate(&value),
			Err(ValidationError::InvalidValue { .. })
		));

		let value: toml::Value = toml::from_str("path = \"a\"\ninclude_errors = 3").unwrap();
		assert!(matches!(
			schema().validate(&value),
			Err(ValidationError::TypeMismatch { field, actual, .. })
				if field == "include_errors" && actual == "integer"
		));
	}

	#[test]
	fn test_custom_validator() {
		let value: toml::Value = toml::from_str("path = \"\"").unwrap();
		let err = schema().validate(&value).unwrap_err();
		assert!(err.to_string().contains("path cannot be empty"));
	}
}
