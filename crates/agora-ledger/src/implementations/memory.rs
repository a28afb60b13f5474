//! In-memory ledger backend.
//!
//! Suitable for tests and single-process deployments. Transfers are
//! represented by settlement references only; no real funds move.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use sha3::{Digest, Keccak256};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use agora_types::{Escrow, EscrowStatus};

use crate::{LedgerError, LedgerInterface};

/// DashMap-backed ledger enforcing the escrow state machine.
pub struct InMemoryLedger {
	escrows: DashMap<String, Escrow>,
	/// Emergency refunds unlock after `grace_multiplier` times the
	/// escrow's own deadline window.
	grace_multiplier: i32,
	sequence: AtomicU64,
}

impl InMemoryLedger {
	pub fn new(grace_multiplier: i32) -> Self {
		Self {
			escrows: DashMap::new(),
			grace_multiplier: grace_multiplier.max(1),
			sequence: AtomicU64::new(0),
		}
	}

	fn reference(&self, escrow_id: &str, action: &str) -> String {
		let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
		let mut hasher = Keccak256::new();
		hasher.update(escrow_id.as_bytes());
		hasher.update(action.as_bytes());
		hasher.update(seq.to_be_bytes());
		format!("0x{}", hex::encode(hasher.finalize()))
	}

	fn refund_internal(
		&self,
		escrow_id: &str,
		action: &str,
	) -> Result<bool, LedgerError> {
		let mut escrow = self
			.escrows
			.get_mut(escrow_id)
			.ok_or_else(|| LedgerError::NotFound(escrow_id.to_string()))?;

		if escrow.status.is_terminal() {
			debug!(escrow_id, action, "Refund no-op on terminal escrow");
			return Ok(false);
		}

		let reference = self.reference(escrow_id, action);
		escrow.status = EscrowStatus::Refunded;
		escrow.settlement_ref = Some(reference);
		escrow.settled_at = Some(Utc::now());
		warn!(escrow_id, action, "Escrow refunded past deadline");
		Ok(true)
	}
}

impl Default for InMemoryLedger {
	fn default() -> Self {
		Self::new(2)
	}
}

#[async_trait]
impl LedgerInterface for InMemoryLedger {
	async fn create_escrow(&self, mut escrow: Escrow) -> Result<String, LedgerError> {
		if self.escrows.contains_key(&escrow.id) {
			return Err(LedgerError::Backend(format!(
				"Escrow id collision: {}",
				escrow.id
			)));
		}
		let reference = self.reference(&escrow.id, "create");
		escrow.reference = reference.clone();
		escrow.status = EscrowStatus::Created;
		info!(
			escrow_id = %escrow.id,
			seller = %escrow.seller,
			amount = %escrow.amount,
			"Escrow created"
		);
		self.escrows.insert(escrow.id.clone(), escrow);
		Ok(reference)
	}

	async fn submit_response(
		&self,
		escrow_id: &str,
		response_hash: &str,
	) -> Result<(), LedgerError> {
		let mut escrow = self
			.escrows
			.get_mut(escrow_id)
			.ok_or_else(|| LedgerError::NotFound(escrow_id.to_string()))?;

		if escrow.status != EscrowStatus::Created {
			return Err(LedgerError::InvalidState {
				id: escrow_id.to_string(),
				state: format!("{:?}", escrow.status),
				action: "submit response".to_string(),
			});
		}

		escrow.response_hash = Some(response_hash.to_string());
		escrow.status = EscrowStatus::ResponseSubmitted;
		debug!(escrow_id, "Delivery proof recorded");
		Ok(())
	}

	async fn settle(&self, escrow_id: &str, pay: bool) -> Result<String, LedgerError> {
		let mut escrow = self
			.escrows
			.get_mut(escrow_id)
			.ok_or_else(|| LedgerError::NotFound(escrow_id.to_string()))?;

		if escrow.status.is_terminal() {
			return Err(LedgerError::AlreadySettled(escrow_id.to_string()));
		}
		if escrow.status != EscrowStatus::ResponseSubmitted {
			return Err(LedgerError::InvalidState {
				id: escrow_id.to_string(),
				state: format!("{:?}", escrow.status),
				action: "settle".to_string(),
			});
		}

		let reference = self.reference(escrow_id, if pay { "pay" } else { "refund" });
		escrow.status = if pay {
			EscrowStatus::Settled
		} else {
			EscrowStatus::Refunded
		};
		escrow.settlement_ref = Some(reference.clone());
		escrow.settled_at = Some(Utc::now());
		info!(
			escrow_id,
			paid = pay,
			reference = %reference,
			"Escrow settled"
		);
		Ok(reference)
	}

	async fn claim_refund(&self, escrow_id: &str) -> Result<bool, LedgerError> {
		{
			let escrow = self
				.escrows
				.get(escrow_id)
				.ok_or_else(|| LedgerError::NotFound(escrow_id.to_string()))?;
			if !escrow.status.is_terminal() && Utc::now() <= escrow.deadline {
				return Err(LedgerError::DeadlineNotReached(escrow_id.to_string()));
			}
		}
		self.refund_internal(escrow_id, "claim-refund")
	}

	async fn emergency_refund(&self, escrow_id: &str) -> Result<bool, LedgerError> {
		{
			let escrow = self
				.escrows
				.get(escrow_id)
				.ok_or_else(|| LedgerError::NotFound(escrow_id.to_string()))?;
			if !escrow.status.is_terminal() {
				let window = escrow.deadline - escrow.created_at;
				let unlock = escrow.created_at
					+ Duration::seconds(
						window.num_seconds() * i64::from(self.grace_multiplier),
					);
				if Utc::now() <= unlock {
					return Err(LedgerError::DeadlineNotReached(escrow_id.to_string()));
				}
			}
		}
		self.refund_internal(escrow_id, "emergency-refund")
	}

	async fn fetch(&self, escrow_id: &str) -> Result<Escrow, LedgerError> {
		self.escrows
			.get(escrow_id)
			.map(|escrow| escrow.clone())
			.ok_or_else(|| LedgerError::NotFound(escrow_id.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal::Decimal;

	fn escrow(id: &str, deadline_secs: i64) -> Escrow {
		let now = Utc::now();
		Escrow {
			id: id.to_string(),
			buyer: "buyer".into(),
			seller: "seller".into(),
			token: "USDC".into(),
			amount: Decimal::new(100, 2),
			deadline: now + Duration::seconds(deadline_secs),
			request_hash: "0xreq".into(),
			response_hash: None,
			status: EscrowStatus::Created,
			reference: String::new(),
			settlement_ref: None,
			created_at: now,
			settled_at: None,
		}
	}

	#[tokio::test]
	async fn test_lifecycle_created_to_settled() {
		let ledger = InMemoryLedger::default();
		ledger.create_escrow(escrow("escrow-1", 600)).await.unwrap();

		ledger.submit_response("escrow-1", "0xdelivery").await.unwrap();
		let reference = ledger.settle("escrow-1", true).await.unwrap();
		assert!(reference.starts_with("0x"));

		let record = ledger.fetch("escrow-1").await.unwrap();
		assert_eq!(record.status, EscrowStatus::Settled);
		assert_eq!(record.settlement_ref, Some(reference));
	}

	#[tokio::test]
	async fn test_settle_requires_submitted_response() {
		let ledger = InMemoryLedger::default();
		ledger.create_escrow(escrow("escrow-1", 600)).await.unwrap();

		let err = ledger.settle("escrow-1", true).await.unwrap_err();
		assert!(matches!(err, LedgerError::InvalidState { .. }));
	}

	#[tokio::test]
	async fn test_double_settlement_is_refused() {
		let ledger = InMemoryLedger::default();
		ledger.create_escrow(escrow("escrow-1", 600)).await.unwrap();
		ledger.submit_response("escrow-1", "0xdelivery").await.unwrap();
		ledger.settle("escrow-1", true).await.unwrap();

		let err = ledger.settle("escrow-1", false).await.unwrap_err();
		assert!(matches!(err, LedgerError::AlreadySettled(_)));

		// The first settlement stands.
		let record = ledger.fetch("escrow-1").await.unwrap();
		assert_eq!(record.status, EscrowStatus::Settled);
	}

	#[tokio::test]
	async fn test_claim_refund_respects_deadline() {
		let ledger = InMemoryLedger::default();
		ledger.create_escrow(escrow("escrow-1", 600)).await.unwrap();

		let err = ledger.claim_refund("escrow-1").await.unwrap_err();
		assert!(matches!(err, LedgerError::DeadlineNotReached(_)));
	}

	#[tokio::test]
	async fn test_claim_refund_after_deadline_then_noop() {
		let ledger = InMemoryLedger::default();
		ledger.create_escrow(escrow("escrow-1", -5)).await.unwrap();

		assert!(ledger.claim_refund("escrow-1").await.unwrap());
		// Second claim is an idempotent no-op.
		assert!(!ledger.claim_refund("escrow-1").await.unwrap());

		let record = ledger.fetch("escrow-1").await.unwrap();
		assert_eq!(record.status, EscrowStatus::Refunded);
	}

	#[tokio::test]
	async fn test_emergency_refund_waits_for_grace_window() {
		let ledger = InMemoryLedger::new(3);
		// Deadline already passed, but the grace window (3x) has not.
		let mut record = escrow("escrow-1", 3600);
		record.created_at = Utc::now() - Duration::seconds(4000);
		record.deadline = record.created_at + Duration::seconds(3600);
		ledger.create_escrow(record).await.unwrap();

		let err = ledger.emergency_refund("escrow-1").await.unwrap_err();
		assert!(matches!(err, LedgerError::DeadlineNotReached(_)));
		// The payer path is already open.
		assert!(ledger.claim_refund("escrow-1").await.unwrap());
	}
}
