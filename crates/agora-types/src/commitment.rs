//! Records produced by the encrypted-commitment layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Logical checkpoint at which confidentiality may be applied.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionLayer {
	Strategy,
	Escrow,
	Query,
	Settlement,
}

impl EncryptionLayer {
	/// All four checkpoints, the safe default when the policy oracle
	/// is unavailable.
	pub fn all() -> Vec<EncryptionLayer> {
		vec![
			EncryptionLayer::Strategy,
			EncryptionLayer::Escrow,
			EncryptionLayer::Query,
			EncryptionLayer::Settlement,
		]
	}

	/// Parses an oracle-supplied layer name, case-insensitively.
	pub fn parse(name: &str) -> Option<EncryptionLayer> {
		match name.trim().to_ascii_lowercase().as_str() {
			"strategy" => Some(EncryptionLayer::Strategy),
			"escrow" => Some(EncryptionLayer::Escrow),
			"query" => Some(EncryptionLayer::Query),
			"settlement" => Some(EncryptionLayer::Settlement),
			_ => None,
		}
	}
}

impl fmt::Display for EncryptionLayer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			EncryptionLayer::Strategy => "strategy",
			EncryptionLayer::Escrow => "escrow",
			EncryptionLayer::Query => "query",
			EncryptionLayer::Settlement => "settlement",
		};
		write!(f, "{}", name)
	}
}

/// One committed payload: where it went and when.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitmentRecord {
	pub layer: EncryptionLayer,
	pub reference: String,
	pub sent_at: DateTime<Utc>,
	pub received_at: DateTime<Utc>,
	pub decrypted_at: Option<DateTime<Utc>>,
	/// Whether the decrypted payload matched what was committed.
	/// `None` until a decrypt-and-verify round has run.
	pub verified: Option<bool>,
}

/// Outcome of one decrypt-and-verify round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
	pub verified: bool,
	pub observed: String,
	pub decrypted_at: DateTime<Utc>,
}

/// Per-run encryption accounting, owned by one commitment service instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitmentStats {
	pub count: u64,
	pub layers: BTreeSet<EncryptionLayer>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_layer_parse_is_case_insensitive() {
		assert_eq!(
			EncryptionLayer::parse("Strategy"),
			Some(EncryptionLayer::Strategy)
		);
		assert_eq!(
			EncryptionLayer::parse(" SETTLEMENT "),
			Some(EncryptionLayer::Settlement)
		);
		assert_eq!(EncryptionLayer::parse("plaintext"), None);
	}

	#[test]
	fn test_all_layers_covers_every_checkpoint() {
		let all = EncryptionLayer::all();
		assert_eq!(all.len(), 4);
		for name in ["strategy", "escrow", "query", "settlement"] {
			assert!(all.contains(&EncryptionLayer::parse(name).unwrap()));
		}
	}
}
