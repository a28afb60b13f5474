//! In-memory commitment vault.
//!
//! Stand-in for the external threshold-encryption primitive, used by tests
//! and single-process deployments. Commits are held in a map keyed by a
//! digest reference and become "decryptable" after a configurable delay.

use async_trait::async_trait;
use dashmap::DashMap;
use sha3::{Digest, Keccak256};
use std::time::{Duration, Instant};

use agora_types::EncryptionLayer;

use crate::{CommitmentError, CommitmentInterface};

struct VaultCell {
	payload: String,
	committed_at: Instant,
}

pub struct InMemoryVault {
	cells: DashMap<String, VaultCell>,
	reveal_delay: Duration,
	/// Optional prefix/suffix wrapped around decryptions, mimicking oracle
	/// padding.
	decoration: Option<(String, String)>,
	fail_commits: bool,
}

impl InMemoryVault {
	pub fn new() -> Self {
		Self {
			cells: DashMap::new(),
			reveal_delay: Duration::ZERO,
			decoration: None,
			fail_commits: false,
		}
	}

	/// Vault whose decryptions only appear after `delay`.
	pub fn with_reveal_delay(mut self, delay: Duration) -> Self {
		self.reveal_delay = delay;
		self
	}

	/// Vault that pads decrypted payloads with the given prefix and suffix.
	pub fn with_decoration(mut self, prefix: &str, suffix: &str) -> Self {
		self.decoration = Some((prefix.to_string(), suffix.to_string()));
		self
	}

	/// Vault that refuses every commit.
	pub fn failing() -> Self {
		Self {
			fail_commits: true,
			..Self::new()
		}
	}
}

impl Default for InMemoryVault {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl CommitmentInterface for InMemoryVault {
	async fn commit(
		&self,
		payload: &str,
		layer: EncryptionLayer,
	) -> Result<String, CommitmentError> {
		if self.fail_commits {
			return Err(CommitmentError::CommitFailed {
				layer,
				reason: "vault rejected the commit".to_string(),
			});
		}

		let mut hasher = Keccak256::new();
		hasher.update(layer.to_string().as_bytes());
		hasher.update(payload.as_bytes());
		hasher.update(self.cells.len().to_be_bytes());
		let reference = format!("0x{}", hex::encode(hasher.finalize()));

		self.cells.insert(
			reference.clone(),
			VaultCell {
				payload: payload.to_string(),
				committed_at: Instant::now(),
			},
		);
		Ok(reference)
	}

	async fn fetch_decrypted(&self, reference: &str) -> Result<Option<String>, CommitmentError> {
		let Some(cell) = self.cells.get(reference) else {
			return Err(CommitmentError::Primitive(format!(
				"unknown reference: {}",
				reference
			)));
		};

		if cell.committed_at.elapsed() < self.reveal_delay {
			return Ok(None);
		}

		let payload = match &self.decoration {
			Some((prefix, suffix)) => format!("{}{}{}", prefix, cell.payload, suffix),
			None => cell.payload.clone(),
		};
		Ok(Some(payload))
	}
}
