//! The externally observable result of a procurement run.
//!
//! The receipt shape is a stable contract: reporting and dashboard tooling
//! consume it as-is. Field removals or renames are breaking changes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::commitment::{CommitmentRecord, CommitmentStats};
use crate::escrow::SettleOutcome;
use crate::mandate::ChainRecord;
use crate::oracle::EncryptionDecision;

/// Everything that happened to one engaged provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResult {
	pub provider: String,
	/// Handle assigned by the identity service, when registration succeeded.
	pub handle: Option<u64>,
	pub cart_id: String,
	pub payment_id: String,
	pub escrow_id: String,
	pub score: f64,
	pub passed: bool,
	/// What the quality gate decided before settlement ran.
	pub decision: SettleOutcome,
	/// What the ledger actually did. Differs from `decision` only when a
	/// delivery-hash mismatch degraded a payout to a refund.
	pub outcome: SettleOutcome,
	pub settlement_ref: Option<String>,
	pub reputation_delta: i64,
	pub realized_cost: Option<Decimal>,
	pub protocol_used: bool,
	/// Why the selection oracle recommended this provider, when it did.
	pub selection_reason: Option<String>,
}

/// Commitments made at the run-level checkpoints. Per-escrow commitments
/// are counted in the totals but not itemized here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunCommitments {
	pub strategy: Option<CommitmentRecord>,
	pub query: Option<CommitmentRecord>,
	pub settlement: Option<CommitmentRecord>,
}

/// Aggregate accounting for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTotals {
	pub paid_amount: Decimal,
	pub refunded_amount: Decimal,
	pub providers_paid: u32,
	pub providers_refunded: u32,
	pub encryption_count: u64,
	pub commit_message_count: u64,
	pub protocol_usage_count: u32,
	pub escrows_created: u32,
}

/// Complete record of one procurement run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
	pub id: String,
	pub query: String,
	pub started_at: DateTime<Utc>,
	pub duration_ms: u64,
	pub encryption: EncryptionDecision,
	pub commitments: RunCommitments,
	pub commitment_stats: CommitmentStats,
	pub providers: Vec<ProviderResult>,
	pub synthesis: String,
	pub chain: ChainRecord,
	pub totals: RunTotals,
}
