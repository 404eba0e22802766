//! String formatting utilities for hex values and log output.

/// Truncates an identifier or hex string for log output.
///
/// Shows only the first 10 characters followed by ".." for longer strings, which
/// keeps the `0x` prefix plus four bytes of a hash.
pub fn truncate_id(id: &str) -> String {
	if id.len() <= 10 {
		id.to_string()
	} else {
		format!("{}..", &id[..10])
	}
}

/// Removes a "0x" or "0X" prefix from a hex string if present.
pub fn without_0x_prefix(hex_str: &str) -> &str {
	hex_str
		.strip_prefix("0x")
		.or_else(|| hex_str.strip_prefix("0X"))
		.unwrap_or(hex_str)
}
