//! Serde helpers for token amounts in configuration files.
//!
//! TOML integers stop at `i64::MAX`, far below typical 18-decimal supplies,
//! so amounts may also be written as decimal or `0x` strings.

use alloy_primitives::U256;
use serde::{de, Deserialize, Deserializer};
use std::str::FromStr;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
	Integer(i64),
	Text(String),
}

fn parse(raw: RawAmount) -> Result<U256, String> {
	match raw {
		RawAmount::Integer(value) if value < 0 => {
			Err(format!("amount cannot be negative: {}", value))
		},
		RawAmount::Integer(value) => Ok(U256::from(value as u64)),
		RawAmount::Text(text) => {
			let trimmed = text.trim().replace('_', "");
			U256::from_str(&trimmed).map_err(|e| format!("invalid amount '{}': {}", text, e))
		},
	}
}

pub fn deserialize_u256<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
	D: Deserializer<'de>,
{
	parse(RawAmount::deserialize(deserializer)?).map_err(de::Error::custom)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Deserialize)]
	struct Holder {
		#[serde(deserialize_with = "deserialize_u256")]
		amount: U256,
	}

	fn amount(toml_src: &str) -> Result<U256, toml::de::Error> {
		toml::from_str::<Holder>(toml_src).map(|h| h.amount)
	}

	#[test]
	fn test_integer_and_string_forms() {
		assert_eq!(amount("amount = 250").unwrap(), U256::from(250u64));
		assert_eq!(
			amount("amount = \"1000000000000000000000000\"").unwrap(),
			U256::from(10u64).pow(U256::from(24u64))
		);
		assert_eq!(amount("amount = \"0x12c\"").unwrap(), U256::from(300u64));
		assert_eq!(amount("amount = \"1_000\"").unwrap(), U256::from(1000u64));
	}

	#[test]
	fn test_rejects_negative_and_garbage() {
		assert!(amount("amount = -1").is_err());
		assert!(amount("amount = \"lots\"").is_err());
		assert!(amount("amount = 1.5").is_err());
	}
}
