//! Commitment service: commit, then asynchronously decrypt and verify.

use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use agora_types::{
	CommitmentEvent, CommitmentRecord, CommitmentStats, EncryptionLayer, EventLog,
	ProcurementEvent, Verification,
};

use crate::{CommitmentError, CommitmentInterface};

/// Polling parameters for decrypt-and-verify.
#[derive(Debug, Clone)]
pub struct CommitmentTiming {
	pub poll_interval: Duration,
	pub max_attempts: u32,
	pub timeout: Duration,
}

impl Default for CommitmentTiming {
	fn default() -> Self {
		Self {
			poll_interval: Duration::from_secs(1),
			max_attempts: 15,
			timeout: Duration::from_secs(20),
		}
	}
}

/// One instance per run: the encryption counters it owns are run-level
/// statistics and must not leak across runs.
pub struct CommitmentService {
	vault: Arc<dyn CommitmentInterface>,
	timing: CommitmentTiming,
	stats: Mutex<CommitmentStats>,
	events: EventLog,
}

impl CommitmentService {
	pub fn new(
		vault: Arc<dyn CommitmentInterface>,
		timing: CommitmentTiming,
		events: EventLog,
	) -> Self {
		Self {
			vault,
			timing,
			stats: Mutex::new(CommitmentStats::default()),
			events,
		}
	}

	/// Commits a payload at the given checkpoint.
	pub async fn commit(
		&self,
		payload: &str,
		layer: EncryptionLayer,
	) -> Result<CommitmentRecord, CommitmentError> {
		self.events
			.record(ProcurementEvent::Commitment(CommitmentEvent::Committing {
				layer,
			}));

		let sent_at = Utc::now();
		let reference = self.vault.commit(payload, layer).await?;
		let received_at = Utc::now();

		if let Ok(mut stats) = self.stats.lock() {
			stats.count += 1;
			stats.layers.insert(layer);
		}

		info!(%layer, reference = %reference, "Payload committed");
		self.events
			.record(ProcurementEvent::Commitment(CommitmentEvent::Committed {
				layer,
				reference: reference.clone(),
			}));

		Ok(CommitmentRecord {
			layer,
			reference,
			sent_at,
			received_at,
			decrypted_at: None,
			verified: None,
		})
	}

	/// Waits for the primitive's decryption oracle with bounded patience,
	/// then checks the observed payload against what was committed.
	pub async fn decrypt_and_verify(
		&self,
		record: &CommitmentRecord,
		expected: &str,
	) -> Result<Verification, CommitmentError> {
		let started = Instant::now();
		let mut attempts = 0u32;

		let observed = loop {
			if attempts >= self.timing.max_attempts || started.elapsed() >= self.timing.timeout
			{
				warn!(
					reference = %record.reference,
					attempts,
					"Decryption did not arrive within budget"
				);
				return Err(CommitmentError::DecryptTimeout {
					reference: record.reference.clone(),
					attempts,
				});
			}

			attempts += 1;
			match self.vault.fetch_decrypted(&record.reference).await? {
				Some(observed) => break observed,
				None => {
					debug!(
						reference = %record.reference,
						attempt = attempts,
						"Decryption pending"
					);
					sleep(self.timing.poll_interval).await;
				}
			}
		};

		let normalized_observed = normalize(&observed);
		let normalized_expected = normalize(expected);
		// Exact match, or the observed payload contains the expected one as
		// a substring: the decryption oracle may pad its output.
		let verified = normalized_observed == normalized_expected
			|| normalized_observed.contains(&normalized_expected);

		info!(
			layer = %record.layer,
			reference = %record.reference,
			verified,
			"Decryption verified"
		);
		self.events
			.record(ProcurementEvent::Commitment(CommitmentEvent::Verified {
				layer: record.layer,
				reference: record.reference.clone(),
				verified,
			}));

		Ok(Verification {
			verified,
			observed,
			decrypted_at: Utc::now(),
		})
	}

	/// Run-level encryption accounting.
	pub fn stats(&self) -> CommitmentStats {
		self.stats
			.lock()
			.map(|stats| stats.clone())
			.unwrap_or_default()
	}
}

fn normalize(payload: &str) -> String {
	let trimmed = payload.trim().to_ascii_lowercase();
	trimmed
		.strip_prefix("0x")
		.map(str::to_string)
		.unwrap_or(trimmed)
}
