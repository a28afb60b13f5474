//! Data exchanged with the external decision oracles.

use serde::{Deserialize, Serialize};

use crate::commitment::EncryptionLayer;

/// How sensitive the policy oracle judged the query to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
	Low,
	Moderate,
	High,
}

/// Which checkpoints the policy oracle selected for this run, and why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionDecision {
	pub layers: Vec<EncryptionLayer>,
	pub rationale: String,
	pub sensitivity: Sensitivity,
}

impl EncryptionDecision {
	/// The safe default: every checkpoint encrypted.
	pub fn all_layers(rationale: impl Into<String>) -> Self {
		Self {
			layers: EncryptionLayer::all(),
			rationale: rationale.into(),
			sensitivity: Sensitivity::High,
		}
	}

	pub fn applies_to(&self, layer: EncryptionLayer) -> bool {
		self.layers.contains(&layer)
	}
}

/// A provider eligible for engagement, as presented to the selection
/// oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateProvider {
	pub name: String,
	pub endpoint: String,
	pub category: String,
}

/// One provider the selection oracle recommended, with its reason.
///
/// Advisory only: recommendations annotate engagement, they do not
/// filter it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionChoice {
	pub name: String,
	pub reason: String,
}

/// Scored quality of one delivered analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityVerdict {
	/// Score on the 0-10 scale, already clamped into range.
	pub score: f64,
	pub passed: bool,
	pub reasoning: String,
}
