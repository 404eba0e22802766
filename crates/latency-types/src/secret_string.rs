//! Signing keys as they travel from the request batch to the signer.
//!
//! Private keys arrive in plaintext in the staged request batch. They are wrapped
//! in [`SecretString`] as soon as they are read: the buffer is zeroized on drop and
//! every formatted or serialized form is redacted.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::Zeroizing;

const REDACTED: &str = "[redacted]";

/// Plaintext secret that never prints itself.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
	pub fn new(plaintext: String) -> Self {
		Self(Zeroizing::new(plaintext))
	}

	/// The plaintext. Callers must not log or persist it.
	pub fn expose_secret(&self) -> &str {
		self.0.as_str()
	}

	/// Runs `f` on the plaintext, keeping the borrow scoped to the call.
	pub fn with_exposed<R>(&self, f: impl FnOnce(&str) -> R) -> R {
		f(self.expose_secret())
	}

	/// True if the secret is empty or only whitespace.
	pub fn is_blank(&self) -> bool {
		self.0.trim().is_empty()
	}
}

impl fmt::Debug for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("SecretString").field(&REDACTED).finish()
	}
}

impl fmt::Display for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl From<String> for SecretString {
	fn from(plaintext: String) -> Self {
		Self::new(plaintext)
	}
}

impl From<&str> for SecretString {
	fn from(plaintext: &str) -> Self {
		Self::new(plaintext.to_owned())
	}
}

impl Serialize for SecretString {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

impl<'de> Deserialize<'de> for SecretString {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		String::deserialize(deserializer).map(Self::new)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

	#[test]
	fn test_formatting_hides_key() {
		let secret = SecretString::from(KEY);
		assert_eq!(format!("{:?}", secret), "SecretString(\"[redacted]\")");
		assert_eq!(secret.to_string(), "[redacted]");
		assert!(!format!("{:?}", Some(secret)).contains("59c6"));
	}

	#[test]
	fn test_serialized_key_is_redacted() {
		let json = serde_json::to_string(&SecretString::from(KEY)).unwrap();
		assert_eq!(json, "\"[redacted]\"");
	}

	#[test]
	fn test_deserialized_key_is_usable() {
		let secret: SecretString = serde_json::from_str(&format!("\"{}\"", KEY)).unwrap();
		assert_eq!(secret.expose_secret(), KEY);
		assert_eq!(secret.with_exposed(str::len), 66);
		assert!(!secret.is_blank());
	}

	#[test]
	fn test_blank_keys() {
		assert!(SecretString::from("").is_blank());
		assert!(SecretString::from("  \t").is_blank());
		assert!(!SecretString::from(" 0x01 ").is_blank());
	}
}
