//! Decision oracles consumed by the agora orchestrator.
//!
//! Four external capabilities live behind these traits: the encryption
//! policy, provider selection, quality scoring, and synthesis. The
//! [`OracleSuite`] wrapper owns the degradation rules — a failed or
//! malformed oracle answer is substituted with a safe default instead of
//! failing the run.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use agora_types::{
	Budget, CandidateProvider, Delivery, EncryptionDecision, QualityVerdict, SelectionChoice,
};

/// Re-export implementations
pub mod implementations {
	pub mod heuristic;
}

#[derive(Debug, Error)]
pub enum OracleError {
	#[error("Oracle unavailable: {0}")]
	Unavailable(String),

	#[error("Malformed oracle response: {0}")]
	Malformed(String),
}

/// Decides which checkpoints of the transaction must be encrypted.
#[async_trait]
pub trait EncryptionPolicyOracle: Send + Sync {
	async fn decide(&self, query: &str) -> Result<EncryptionDecision, OracleError>;
}

/// Recommends which candidates to engage. Advisory: recommendations are
/// recorded, not used to filter engagement.
#[async_trait]
pub trait ProviderSelectionOracle: Send + Sync {
	async fn select(
		&self,
		candidates: &[CandidateProvider],
		budget: &Budget,
		query: &str,
	) -> Result<Vec<SelectionChoice>, OracleError>;
}

/// Scores a delivered analysis on the 0-10 scale.
#[async_trait]
pub trait QualityOracle: Send + Sync {
	async fn score(
		&self,
		delivery: &str,
		provider: &str,
		threshold: f64,
		category: Option<&str>,
	) -> Result<QualityVerdict, OracleError>;
}

/// Combines passing deliveries into one narrative.
#[async_trait]
pub trait SynthesisOracle: Send + Sync {
	async fn synthesize(&self, passing: &[Delivery], query: &str)
		-> Result<String, OracleError>;
}

/// The orchestrator's single entry point to all four oracles, with the
/// degradation rules applied.
pub struct OracleSuite {
	policy: Arc<dyn EncryptionPolicyOracle>,
	selection: Arc<dyn ProviderSelectionOracle>,
	quality: Arc<dyn QualityOracle>,
	synthesis: Arc<dyn SynthesisOracle>,
}

impl OracleSuite {
	pub fn new(
		policy: Arc<dyn EncryptionPolicyOracle>,
		selection: Arc<dyn ProviderSelectionOracle>,
		quality: Arc<dyn QualityOracle>,
		synthesis: Arc<dyn SynthesisOracle>,
	) -> Self {
		Self {
			policy,
			selection,
			quality,
			synthesis,
		}
	}

	/// Asks the policy oracle which checkpoints to encrypt. An unavailable
	/// oracle or an empty layer list degrades to all four checkpoints:
	/// when in doubt, encrypt everything.
	pub async fn encryption_decision(&self, query: &str) -> EncryptionDecision {
		match self.policy.decide(query).await {
			Ok(decision) if !decision.layers.is_empty() => decision,
			Ok(_) => {
				warn!("Policy oracle returned no layers, defaulting to all checkpoints");
				EncryptionDecision::all_layers("empty policy answer, encrypting everything")
			}
			Err(err) => {
				warn!(error = %err, "Policy oracle unavailable, defaulting to all checkpoints");
				EncryptionDecision::all_layers("policy oracle unavailable, encrypting everything")
			}
		}
	}

	/// Collects advisory selection choices. A failed oracle yields no
	/// annotations; it never blocks engagement.
	pub async fn select_providers(
		&self,
		candidates: &[CandidateProvider],
		budget: &Budget,
		query: &str,
	) -> Vec<SelectionChoice> {
		match self.selection.select(candidates, budget, query).await {
			Ok(choices) => choices,
			Err(err) => {
				warn!(error = %err, "Selection oracle unavailable, engaging unannotated");
				Vec::new()
			}
		}
	}

	/// Scores a delivery, clamping the oracle's score into [0, 10] and
	/// re-deriving `passed` from the threshold so an inconsistent oracle
	/// flag cannot pay a failing provider.
	pub async fn score(
		&self,
		delivery: &str,
		provider: &str,
		threshold: f64,
		category: Option<&str>,
	) -> QualityVerdict {
		match self
			.quality
			.score(delivery, provider, threshold, category)
			.await
		{
			Ok(verdict) => {
				let score = verdict.score.clamp(0.0, 10.0);
				QualityVerdict {
					score,
					passed: score >= threshold,
					reasoning: verdict.reasoning,
				}
			}
			Err(err) => {
				warn!(
					provider,
					error = %err,
					"Quality oracle unavailable, scoring as failed"
				);
				QualityVerdict {
					score: 0.0,
					passed: false,
					reasoning: format!("scoring unavailable: {}", err),
				}
			}
		}
	}

	/// Produces the run narrative from the passing deliveries. With nothing
	/// passing, or a failed oracle, a plain default is used.
	pub async fn synthesize(&self, passing: &[Delivery], query: &str) -> String {
		if passing.is_empty() {
			return format!("No provider cleared the quality gate for: {}", query);
		}
		match self.synthesis.synthesize(passing, query).await {
			Ok(narrative) => narrative,
			Err(err) => {
				warn!(error = %err, "Synthesis oracle unavailable, using plain summary");
				format!(
					"{} provider(s) delivered passing analyses for: {}",
					passing.len(),
					query
				)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use agora_types::{EncryptionLayer, Sensitivity};
	use rust_decimal::Decimal;

	struct DownOracle;

	#[async_trait]
	impl EncryptionPolicyOracle for DownOracle {
		async fn decide(&self, _query: &str) -> Result<EncryptionDecision, OracleError> {
			Err(OracleError::Unavailable("connection refused".into()))
		}
	}

	#[async_trait]
	impl ProviderSelectionOracle for DownOracle {
		async fn select(
			&self,
			_candidates: &[CandidateProvider],
			_budget: &Budget,
			_query: &str,
		) -> Result<Vec<SelectionChoice>, OracleError> {
			Err(OracleError::Unavailable("connection refused".into()))
		}
	}

	#[async_trait]
	impl QualityOracle for DownOracle {
		async fn score(
			&self,
			_delivery: &str,
			_provider: &str,
			_threshold: f64,
			_category: Option<&str>,
		) -> Result<QualityVerdict, OracleError> {
			Err(OracleError::Unavailable("connection refused".into()))
		}
	}

	#[async_trait]
	impl SynthesisOracle for DownOracle {
		async fn synthesize(
			&self,
			_passing: &[Delivery],
			_query: &str,
		) -> Result<String, OracleError> {
			Err(OracleError::Unavailable("connection refused".into()))
		}
	}

	/// Reports wildly out-of-range scores with a flattering passed flag.
	struct GenerousOracle;

	#[async_trait]
	impl QualityOracle for GenerousOracle {
		async fn score(
			&self,
			_delivery: &str,
			_provider: &str,
			_threshold: f64,
			_category: Option<&str>,
		) -> Result<QualityVerdict, OracleError> {
			Ok(QualityVerdict {
				score: 42.0,
				passed: true,
				reasoning: "outstanding".into(),
			})
		}
	}

	/// Low score but an inconsistent passed=true flag.
	struct InconsistentOracle;

	#[async_trait]
	impl QualityOracle for InconsistentOracle {
		async fn score(
			&self,
			_delivery: &str,
			_provider: &str,
			_threshold: f64,
			_category: Option<&str>,
		) -> Result<QualityVerdict, OracleError> {
			Ok(QualityVerdict {
				score: 2.0,
				passed: true,
				reasoning: "trust me".into(),
			})
		}
	}

	struct EmptyPolicy;

	#[async_trait]
	impl EncryptionPolicyOracle for EmptyPolicy {
		async fn decide(&self, _query: &str) -> Result<EncryptionDecision, OracleError> {
			Ok(EncryptionDecision {
				layers: vec![],
				rationale: "nothing to hide".into(),
				sensitivity: Sensitivity::Low,
			})
		}
	}

	fn suite_with_quality(quality: Arc<dyn QualityOracle>) -> OracleSuite {
		OracleSuite::new(
			Arc::new(DownOracle),
			Arc::new(DownOracle),
			quality,
			Arc::new(DownOracle),
		)
	}

	#[tokio::test]
	async fn test_policy_outage_defaults_to_all_layers() {
		let suite = suite_with_quality(Arc::new(DownOracle));
		let decision = suite.encryption_decision("anything").await;
		assert_eq!(decision.layers.len(), 4);
	}

	#[tokio::test]
	async fn test_empty_policy_answer_defaults_to_all_layers() {
		let suite = OracleSuite::new(
			Arc::new(EmptyPolicy),
			Arc::new(DownOracle),
			Arc::new(DownOracle),
			Arc::new(DownOracle),
		);
		let decision = suite.encryption_decision("anything").await;
		assert_eq!(decision.layers.len(), 4);
		assert!(decision.applies_to(EncryptionLayer::Escrow));
	}

	#[tokio::test]
	async fn test_score_is_clamped_into_range() {
		let suite = suite_with_quality(Arc::new(GenerousOracle));
		let verdict = suite.score("analysis", "alpha", 5.0, None).await;
		assert_eq!(verdict.score, 10.0);
		assert!(verdict.passed);
	}

	#[tokio::test]
	async fn test_inconsistent_passed_flag_is_rederived() {
		let suite = suite_with_quality(Arc::new(InconsistentOracle));
		let verdict = suite.score("analysis", "alpha", 5.0, None).await;
		assert_eq!(verdict.score, 2.0);
		assert!(!verdict.passed);
	}

	#[tokio::test]
	async fn test_scoring_outage_fails_the_provider() {
		let suite = suite_with_quality(Arc::new(DownOracle));
		let verdict = suite.score("analysis", "alpha", 5.0, None).await;
		assert_eq!(verdict.score, 0.0);
		assert!(!verdict.passed);
	}

	#[tokio::test]
	async fn test_selection_outage_yields_no_annotations() {
		let suite = suite_with_quality(Arc::new(DownOracle));
		let choices = suite
			.select_providers(&[], &Budget::new(Decimal::new(500, 2), "USDC"), "q")
			.await;
		assert!(choices.is_empty());
	}
}
