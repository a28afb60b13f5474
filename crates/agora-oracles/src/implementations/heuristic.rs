//! Deterministic heuristic oracles.
//!
//! Local stand-ins for the external decision services: keyword-driven
//! policy, budget-aware selection, lexical quality scoring, and extractive
//! synthesis. Useful for tests, demos and air-gapped deployments.

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use agora_types::{
	Budget, CandidateProvider, Delivery, EncryptionDecision, EncryptionLayer, QualityVerdict,
	SelectionChoice, Sensitivity,
};

use crate::{
	EncryptionPolicyOracle, OracleError, ProviderSelectionOracle, QualityOracle, SynthesisOracle,
};

const SENSITIVE_TERMS: &[&str] = &[
	"merger",
	"acquisition",
	"confidential",
	"insider",
	"position",
	"treasury",
	"undisclosed",
];

const STRATEGIC_TERMS: &[&str] = &["strategy", "forecast", "allocation", "pricing"];

/// Policy from keyword sensitivity classes.
pub struct KeywordPolicy;

#[async_trait]
impl EncryptionPolicyOracle for KeywordPolicy {
	async fn decide(&self, query: &str) -> Result<EncryptionDecision, OracleError> {
		let lowered = query.to_ascii_lowercase();
		let sensitive = SENSITIVE_TERMS.iter().any(|term| lowered.contains(term));
		let strategic = STRATEGIC_TERMS.iter().any(|term| lowered.contains(term));

		let decision = if sensitive {
			EncryptionDecision {
				layers: EncryptionLayer::all(),
				rationale: "query touches non-public material".into(),
				sensitivity: Sensitivity::High,
			}
		} else if strategic {
			EncryptionDecision {
				layers: vec![
					EncryptionLayer::Strategy,
					EncryptionLayer::Query,
					EncryptionLayer::Settlement,
				],
				rationale: "strategic content, escrow terms left open".into(),
				sensitivity: Sensitivity::Moderate,
			}
		} else {
			EncryptionDecision {
				layers: vec![EncryptionLayer::Settlement],
				rationale: "routine query, settlement batch sealed only".into(),
				sensitivity: Sensitivity::Low,
			}
		};
		Ok(decision)
	}
}

/// Recommends as many candidates as the budget covers at the given unit
/// price, in listed order.
pub struct BudgetSelection {
	unit_price: Decimal,
}

impl BudgetSelection {
	pub fn new(unit_price: Decimal) -> Self {
		Self { unit_price }
	}
}

#[async_trait]
impl ProviderSelectionOracle for BudgetSelection {
	async fn select(
		&self,
		candidates: &[CandidateProvider],
		budget: &Budget,
		_query: &str,
	) -> Result<Vec<SelectionChoice>, OracleError> {
		let affordable = if self.unit_price.is_zero() {
			candidates.len()
		} else {
			(budget.amount / self.unit_price)
				.floor()
				.to_usize()
				.unwrap_or(0)
		};

		Ok(candidates
			.iter()
			.take(affordable)
			.map(|candidate| SelectionChoice {
				name: candidate.name.clone(),
				reason: format!(
					"{} fits within budget at {} per engagement",
					candidate.category, self.unit_price
				),
			})
			.collect())
	}
}

/// Scores by lexical richness: longer, more varied analyses rate higher.
pub struct LexicalQuality;

#[async_trait]
impl QualityOracle for LexicalQuality {
	async fn score(
		&self,
		delivery: &str,
		_provider: &str,
		_threshold: f64,
		category: Option<&str>,
	) -> Result<QualityVerdict, OracleError> {
		let words: Vec<&str> = delivery.split_whitespace().collect();
		if words.is_empty() {
			return Ok(QualityVerdict {
				score: 0.0,
				passed: false,
				reasoning: "empty delivery".into(),
			});
		}

		let distinct = words
			.iter()
			.map(|word| word.to_ascii_lowercase())
			.collect::<std::collections::HashSet<_>>()
			.len();
		let length_score = (words.len() as f64 / 20.0).min(6.0);
		let variety_score = (distinct as f64 / words.len() as f64) * 3.0;
		let on_topic = category
			.map(|cat| delivery.to_ascii_lowercase().contains(&cat.to_ascii_lowercase()))
			.unwrap_or(false);
		let topic_score = if on_topic { 1.0 } else { 0.0 };
		let score = length_score + variety_score + topic_score;

		Ok(QualityVerdict {
			score,
			passed: false, // re-derived by the suite against the threshold
			reasoning: format!(
				"{} words, {} distinct, on_topic={}",
				words.len(),
				distinct,
				on_topic
			),
		})
	}
}

/// Joins the first sentence of each passing delivery, attributed.
pub struct ExtractiveSynthesis;

#[async_trait]
impl SynthesisOracle for ExtractiveSynthesis {
	async fn synthesize(
		&self,
		passing: &[Delivery],
		query: &str,
	) -> Result<String, OracleError> {
		let mut lines = vec![format!("Synthesis for: {}", query)];
		for delivery in passing {
			let first_sentence = delivery
				.payload
				.split_terminator(['.', '!', '?'])
				.next()
				.unwrap_or(&delivery.payload)
				.trim();
			lines.push(format!("- {}: {}", delivery.provider, first_sentence));
		}
		Ok(lines.join("\n"))
	}
}
