//! String formatting utilities for hex strings and token amounts.

/// Truncates a hex string for log output, keeping the first 10 characters.
pub fn truncate_id(id: &str) -> String {
	if id.len() <= 10 {
		id.to_string()
	} else {
		format!("{}..", &id[..10])
	}
}

/// Removes "0x" or "0X" prefix from a hex string if present.
pub fn without_0x_prefix(hex_str: &str) -> &str {
	hex_str
		.strip_prefix("0x")
		.or_else(|| hex_str.strip_prefix("0X"))
		.unwrap_or(hex_str)
}

/// Formats a raw on-chain token amount with its decimal places for display.
///
/// `format_token_amount("250000000", 6)` yields `"250.0"`.
pub fn format_token_amount(amount: &str, decimals: u8) -> String {
	if decimals == 0 {
		return amount.to_string();
	}

	let places = decimals as usize;
	let (integer_part, fraction_part) = if amount.len() <= places {
		("0".to_string(), format!("{:0>width$}", amount, width = places))
	} else {
		let split = amount.len() - places;
		(amount[..split].to_string(), amount[split..].to_string())
	};

	let trimmed = fraction_part.trim_end_matches('0');
	if trimmed.is_empty() {
		format!("{}.0", integer_part)
	} else {
		format!("{}.{}", integer_part, trimmed)
	}
}
