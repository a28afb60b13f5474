//! Escrow accessor for the agora system.
//!
//! Per-provider conditional-payment handle over the ledger primitive:
//! creates a pending escrow (optionally confidentially, through the
//! commitment layer), accepts the delivery proof, and settles to paid or
//! refunded exactly once.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use agora_commitment::{CommitmentError, CommitmentService};
use agora_ledger::{LedgerError, LedgerInterface};
use agora_types::{
	prefixed_id, EncryptionLayer, Escrow, EscrowEvent, EscrowStatus, EventLog, ProcurementEvent,
	SettleOutcome,
};

#[derive(Debug, Error)]
pub enum EscrowError {
	/// A second settlement was attempted; funds never move twice.
	#[error("Escrow {0} already settled")]
	AlreadySettled(String),

	#[error(transparent)]
	Ledger(LedgerError),

	#[error(transparent)]
	Commitment(#[from] CommitmentError),
}

impl From<LedgerError> for EscrowError {
	fn from(err: LedgerError) -> Self {
		match err {
			LedgerError::AlreadySettled(id) => EscrowError::AlreadySettled(id),
			other => EscrowError::Ledger(other),
		}
	}
}

/// What an escrow creation call commits when the escrow checkpoint is
/// encrypted. The commitment protects the call's confidentiality; no
/// decrypt round-trip runs on this path.
#[derive(Serialize)]
struct CreationPayload<'a> {
	escrow_id: &'a str,
	buyer: &'a str,
	seller: &'a str,
	token: &'a str,
	amount: Decimal,
	deadline_secs: i64,
	request_hash: &'a str,
}

pub struct EscrowAccessor {
	ledger: Arc<dyn LedgerInterface>,
	commitments: Arc<CommitmentService>,
	buyer: String,
	events: EventLog,
}

impl EscrowAccessor {
	pub fn new(
		ledger: Arc<dyn LedgerInterface>,
		commitments: Arc<CommitmentService>,
		buyer: impl Into<String>,
		events: EventLog,
	) -> Self {
		Self {
			ledger,
			commitments,
			buyer: buyer.into(),
			events,
		}
	}

	/// Creates a pending escrow for one provider. When `encrypted`, the
	/// creation payload goes through the commitment layer first.
	pub async fn create(
		&self,
		seller: &str,
		token: &str,
		amount: Decimal,
		deadline_secs: i64,
		request_hash: &str,
		encrypted: bool,
	) -> Result<(String, String), EscrowError> {
		let escrow_id = prefixed_id("escrow");

		if encrypted {
			let payload = CreationPayload {
				escrow_id: &escrow_id,
				buyer: &self.buyer,
				seller,
				token,
				amount,
				deadline_secs,
				request_hash,
			};
			let serialized = serde_json::to_string(&payload)
				.map_err(|e| EscrowError::Ledger(LedgerError::Backend(e.to_string())))?;
			self.commitments
				.commit(&serialized, EncryptionLayer::Escrow)
				.await?;
		}

		let now = Utc::now();
		let escrow = Escrow {
			id: escrow_id.clone(),
			buyer: self.buyer.clone(),
			seller: seller.to_string(),
			token: token.to_string(),
			amount,
			deadline: now + Duration::seconds(deadline_secs),
			request_hash: request_hash.to_string(),
			response_hash: None,
			status: EscrowStatus::Created,
			reference: String::new(),
			settlement_ref: None,
			created_at: now,
			settled_at: None,
		};

		let reference = self.ledger.create_escrow(escrow).await?;
		self.events
			.record(ProcurementEvent::Escrow(EscrowEvent::Created {
				escrow_id: escrow_id.clone(),
				seller: seller.to_string(),
				encrypted,
			}));
		Ok((escrow_id, reference))
	}

	/// Attaches the provider's delivery hash to its escrow.
	pub async fn submit_delivery(
		&self,
		escrow_id: &str,
		delivery_hash: &str,
	) -> Result<(), EscrowError> {
		self.ledger.submit_response(escrow_id, delivery_hash).await?;
		self.events
			.record(ProcurementEvent::Escrow(EscrowEvent::DeliverySubmitted {
				escrow_id: escrow_id.to_string(),
			}));
		Ok(())
	}

	/// Settles an escrow according to the quality-gate decision.
	///
	/// A payout requires the delivery hash presented now to match the one
	/// submitted earlier; a mismatch is an expected adversarial outcome and
	/// degrades to a refund instead of raising. Returns the realized
	/// outcome and the settlement reference.
	pub async fn settle(
		&self,
		escrow_id: &str,
		decision: SettleOutcome,
		delivery_hash: &str,
	) -> Result<(SettleOutcome, String), EscrowError> {
		let pay = match decision {
			SettleOutcome::Refunded => false,
			SettleOutcome::Paid => {
				let escrow = self.ledger.fetch(escrow_id).await?;
				let matches = escrow.response_hash.as_deref() == Some(delivery_hash);
				if !matches {
					warn!(
						escrow_id,
						"Delivery hash mismatch at settlement, degrading to refund"
					);
				}
				matches
			}
		};

		let reference = self.ledger.settle(escrow_id, pay).await?;
		let outcome = if pay {
			SettleOutcome::Paid
		} else {
			SettleOutcome::Refunded
		};

		info!(escrow_id, ?outcome, "Escrow settlement recorded");
		self.events
			.record(ProcurementEvent::Escrow(EscrowEvent::Settled {
				escrow_id: escrow_id.to_string(),
				outcome,
				reference: reference.clone(),
			}));
		Ok((outcome, reference))
	}

	/// Buyer-side refund of a past-deadline escrow. Idempotent on terminal
	/// escrows.
	pub async fn claim_refund(&self, escrow_id: &str) -> Result<bool, EscrowError> {
		let refunded = self.ledger.claim_refund(escrow_id).await?;
		if refunded {
			self.events
				.record(ProcurementEvent::Escrow(EscrowEvent::RefundClaimed {
					escrow_id: escrow_id.to_string(),
				}));
		}
		Ok(refunded)
	}

	/// Administrative refund after the grace window. Idempotent on terminal
	/// escrows.
	pub async fn emergency_refund(&self, escrow_id: &str) -> Result<bool, EscrowError> {
		let refunded = self.ledger.emergency_refund(escrow_id).await?;
		if refunded {
			self.events
				.record(ProcurementEvent::Escrow(EscrowEvent::RefundClaimed {
					escrow_id: escrow_id.to_string(),
				}));
		}
		Ok(refunded)
	}

	pub async fn fetch(&self, escrow_id: &str) -> Result<Escrow, EscrowError> {
		Ok(self.ledger.fetch(escrow_id).await?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use agora_commitment::implementations::memory::InMemoryVault;
	use agora_commitment::CommitmentTiming;
	use agora_ledger::implementations::memory::InMemoryLedger;
	use agora_types::keccak_hex;

	fn accessor() -> EscrowAccessor {
		let events = EventLog::new(64);
		let commitments = Arc::new(CommitmentService::new(
			Arc::new(InMemoryVault::new()),
			CommitmentTiming::default(),
			events.clone(),
		));
		EscrowAccessor::new(
			Arc::new(InMemoryLedger::default()),
			commitments,
			"buyer-agent",
			events,
		)
	}

	#[tokio::test]
	async fn test_paid_settlement_with_matching_hash() {
		let accessor = accessor();
		let delivery_hash = keccak_hex(b"analysis body");
		let (escrow_id, _) = accessor
			.create(
				"alpha",
				"USDC",
				Decimal::new(100, 2),
				600,
				&keccak_hex(b"request"),
				false,
			)
			.await
			.unwrap();

		accessor
			.submit_delivery(&escrow_id, &delivery_hash)
			.await
			.unwrap();
		let (outcome, reference) = accessor
			.settle(&escrow_id, SettleOutcome::Paid, &delivery_hash)
			.await
			.unwrap();

		assert_eq!(outcome, SettleOutcome::Paid);
		assert!(reference.starts_with("0x"));
		let escrow = accessor.fetch(&escrow_id).await.unwrap();
		assert_eq!(escrow.status, EscrowStatus::Settled);
	}

	#[tokio::test]
	async fn test_hash_mismatch_degrades_to_refund() {
		let accessor = accessor();
		let (escrow_id, _) = accessor
			.create(
				"alpha",
				"USDC",
				Decimal::new(100, 2),
				600,
				&keccak_hex(b"request"),
				false,
			)
			.await
			.unwrap();

		accessor
			.submit_delivery(&escrow_id, &keccak_hex(b"what was submitted"))
			.await
			.unwrap();
		let (outcome, _) = accessor
			.settle(&escrow_id, SettleOutcome::Paid, &keccak_hex(b"something else"))
			.await
			.unwrap();

		assert_eq!(outcome, SettleOutcome::Refunded);
		let escrow = accessor.fetch(&escrow_id).await.unwrap();
		assert_eq!(escrow.status, EscrowStatus::Refunded);
	}

	#[tokio::test]
	async fn test_second_settlement_is_refused() {
		let accessor = accessor();
		let delivery_hash = keccak_hex(b"analysis body");
		let (escrow_id, _) = accessor
			.create(
				"alpha",
				"USDC",
				Decimal::new(100, 2),
				600,
				&keccak_hex(b"request"),
				false,
			)
			.await
			.unwrap();
		accessor
			.submit_delivery(&escrow_id, &delivery_hash)
			.await
			.unwrap();
		accessor
			.settle(&escrow_id, SettleOutcome::Paid, &delivery_hash)
			.await
			.unwrap();

		let err = accessor
			.settle(&escrow_id, SettleOutcome::Refunded, &delivery_hash)
			.await
			.unwrap_err();
		assert!(matches!(err, EscrowError::AlreadySettled(_)));
	}

	#[tokio::test]
	async fn test_encrypted_creation_goes_through_commitment_layer() {
		let events = EventLog::new(64);
		let commitments = Arc::new(CommitmentService::new(
			Arc::new(InMemoryVault::new()),
			CommitmentTiming::default(),
			events.clone(),
		));
		let accessor = EscrowAccessor::new(
			Arc::new(InMemoryLedger::default()),
			commitments.clone(),
			"buyer-agent",
			events,
		);

		accessor
			.create(
				"alpha",
				"USDC",
				Decimal::new(100, 2),
				600,
				&keccak_hex(b"request"),
				true,
			)
			.await
			.unwrap();

		let stats = commitments.stats();
		assert_eq!(stats.count, 1);
		assert!(stats.layers.contains(&EncryptionLayer::Escrow));
	}

	#[tokio::test]
	async fn test_refund_decision_skips_hash_check() {
		let accessor = accessor();
		let (escrow_id, _) = accessor
			.create(
				"alpha",
				"USDC",
				Decimal::new(100, 2),
				600,
				&keccak_hex(b"request"),
				false,
			)
			.await
			.unwrap();
		accessor
			.submit_delivery(&escrow_id, &keccak_hex(b"delivery"))
			.await
			.unwrap();

		let (outcome, _) = accessor
			.settle(&escrow_id, SettleOutcome::Refunded, "")
			.await
			.unwrap();
		assert_eq!(outcome, SettleOutcome::Refunded);
	}
}
