//! Encrypted-commitment layer for the agora system.
//!
//! Wraps an external commitment primitive: payloads are committed at a
//! logical checkpoint, then decrypted by the primitive's oracle some time
//! later and verified against what was committed. The primitive is opaque;
//! this crate only defines its contract and drives the commit/verify
//! choreography.

use async_trait::async_trait;
use thiserror::Error;

use agora_types::EncryptionLayer;

pub mod service;

/// Re-export implementations
pub mod implementations {
	pub mod memory;
}

pub use service::{CommitmentService, CommitmentTiming};

#[derive(Debug, Error)]
pub enum CommitmentError {
	/// The primitive reported non-success for a commit call. Callers must
	/// not proceed to decrypt on this path.
	#[error("Commit failed at {layer} layer: {reason}")]
	CommitFailed {
		layer: EncryptionLayer,
		reason: String,
	},

	/// No decryption arrived within the polling budget.
	#[error("Decryption of {reference} timed out after {attempts} attempts")]
	DecryptTimeout { reference: String, attempts: u32 },

	#[error("Commitment primitive error: {0}")]
	Primitive(String),
}

/// Contract of the external encrypted-commitment primitive.
#[async_trait]
pub trait CommitmentInterface: Send + Sync {
	/// Commits an opaque payload at the given checkpoint and returns the
	/// reference under which a decryption may later appear.
	async fn commit(
		&self,
		payload: &str,
		layer: EncryptionLayer,
	) -> Result<String, CommitmentError>;

	/// Polls for the decrypted payload. `None` until the primitive's
	/// decryption oracle has produced a result for this reference.
	async fn fetch_decrypted(&self, reference: &str) -> Result<Option<String>, CommitmentError>;
}
