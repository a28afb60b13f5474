//! Common types used throughout the agora system.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;

/// Unix timestamp in seconds.
pub type Timestamp = i64;

/// Generates a run-scoped identifier of the form `{prefix}-{uuid}`.
pub fn prefixed_id(prefix: &str) -> String {
	format!("{}-{}", prefix, uuid::Uuid::new_v4())
}

/// Keccak-256 digest of a payload, hex-encoded with a `0x` prefix.
pub fn keccak_hex(payload: &[u8]) -> String {
	let mut hasher = Keccak256::new();
	hasher.update(payload);
	format!("0x{}", hex::encode(hasher.finalize()))
}

/// An amount of a specific asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
	pub amount: Decimal,
	pub asset: String,
}

impl Budget {
	pub fn new(amount: Decimal, asset: impl Into<String>) -> Self {
		Self {
			amount,
			asset: asset.into(),
		}
	}
}

impl fmt::Display for Budget {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} {}", self.amount, self.asset)
	}
}
