//! Conditional-payment ledger for the agora system.
//!
//! This crate defines the contract the escrow accessor settles against.
//! The ledger holds escrowed funds and enforces the escrow state machine;
//! how it executes transfers atomically is its own concern. Escrows are
//! never deleted, terminal records remain readable as the audit trail.

use async_trait::async_trait;
use thiserror::Error;

use agora_types::Escrow;

/// Re-export implementations
pub mod implementations {
	pub mod memory;
}

#[derive(Debug, Error)]
pub enum LedgerError {
	#[error("Escrow not found: {0}")]
	NotFound(String),

	/// The requested transition is not legal from the escrow's current state.
	#[error("Escrow {id} is {state}, cannot {action}")]
	InvalidState {
		id: String,
		state: String,
		action: String,
	},

	/// A second settlement was attempted on a terminal escrow.
	#[error("Escrow {0} already settled")]
	AlreadySettled(String),

	#[error("Escrow {0} deadline has not passed")]
	DeadlineNotReached(String),

	#[error("Ledger backend error: {0}")]
	Backend(String),
}

/// Low-level interface every ledger backend must provide.
///
/// State machine enforced by implementations:
/// `Created --submit_response--> ResponseSubmitted --settle--> Settled | Refunded`.
/// `settle` is legal only from `ResponseSubmitted` and succeeds at most once
/// per escrow; funds never move twice.
#[async_trait]
pub trait LedgerInterface: Send + Sync {
	/// Records a new escrow and returns the creation reference.
	async fn create_escrow(&self, escrow: Escrow) -> Result<String, LedgerError>;

	/// Attaches the provider's delivery proof to a pending escrow.
	async fn submit_response(
		&self,
		escrow_id: &str,
		response_hash: &str,
	) -> Result<(), LedgerError>;

	/// Releases funds to the seller (`pay = true`) or back to the buyer
	/// (`pay = false`). Returns the settlement reference.
	async fn settle(&self, escrow_id: &str, pay: bool) -> Result<String, LedgerError>;

	/// Buyer-side unilateral refund of a past-deadline, unsettled escrow.
	/// Returns `false` as an idempotent no-op when the escrow is already
	/// terminal.
	async fn claim_refund(&self, escrow_id: &str) -> Result<bool, LedgerError>;

	/// Administrative refund, available only after a grace multiple of the
	/// deadline. Same idempotency as `claim_refund`.
	async fn emergency_refund(&self, escrow_id: &str) -> Result<bool, LedgerError>;

	/// Reads an escrow record.
	async fn fetch(&self, escrow_id: &str) -> Result<Escrow, LedgerError>;
}
