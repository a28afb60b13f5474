//! Procurement orchestrator for the agora system.
//!
//! Drives the end-to-end phase sequence: intent, encryption policy,
//! strategy/query commitments, provider registration and carts, purchases,
//! escrows with locked payments, the quality gate, the settlement-batch
//! commitment, per-escrow settlement with reputation updates, and finally
//! synthesis plus receipt assembly.

use thiserror::Error;

use agora_commitment::CommitmentError;
use agora_escrow::EscrowError;
use agora_mandate::MandateError;

pub mod builder;
pub mod engine;

pub use builder::EngineBuilder;
pub use engine::ProcurementEngine;

#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),

	#[error(transparent)]
	Mandate(#[from] MandateError),

	/// Commitment failures on a policy-selected layer are fatal: the
	/// caller asked for confidentiality and did not get it.
	#[error(transparent)]
	Commitment(#[from] CommitmentError),

	/// Escrow creation or settlement failures are fatal; partial state is
	/// left for out-of-band reconciliation, never rolled back.
	#[error(transparent)]
	Escrow(#[from] EscrowError),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}
