//! Escrow records held by the conditional-payment ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Escrow lifecycle. Status only ever moves forward; `Settled` and
/// `Refunded` are terminal and mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowStatus {
	Created,
	ResponseSubmitted,
	Settled,
	Refunded,
}

impl EscrowStatus {
	pub fn is_terminal(&self) -> bool {
		matches!(self, EscrowStatus::Settled | EscrowStatus::Refunded)
	}
}

/// The two ways an escrow can leave `ResponseSubmitted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettleOutcome {
	Paid,
	Refunded,
}

/// A conditional payment held for one provider. Never deleted: terminal
/// escrows stay on the ledger as the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Escrow {
	pub id: String,
	pub buyer: String,
	pub seller: String,
	pub token: String,
	pub amount: Decimal,
	pub deadline: DateTime<Utc>,
	pub request_hash: String,
	pub response_hash: Option<String>,
	pub status: EscrowStatus,
	/// Reference returned by the ledger for the creation call.
	pub reference: String,
	pub settlement_ref: Option<String>,
	pub created_at: DateTime<Utc>,
	pub settled_at: Option<DateTime<Utc>>,
}
