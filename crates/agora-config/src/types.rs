//! Configuration types for the broker.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Complete broker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcurementConfig {
	/// Broker identity and run-level settings
	pub broker: BrokerSettings,
	/// Commitment-layer polling parameters
	#[serde(default)]
	pub commitment: CommitmentSettings,
	/// Escrow terms applied per provider
	pub escrow: EscrowSettings,
	/// Candidate providers, engaged in listed order
	#[serde(default)]
	pub providers: Vec<ProviderEntry>,
}

/// Broker identity and run-level settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrokerSettings {
	/// Buyer identity used on escrows and mandates
	pub name: String,
	/// Total budget for one run
	pub budget_amount: Decimal,
	/// Asset the budget is denominated in
	pub budget_asset: String,
	/// Intent time-to-live in seconds
	#[serde(default = "default_ttl_secs")]
	pub ttl_secs: i64,
	/// Quality gate threshold on the 0-10 scale
	#[serde(default = "default_quality_threshold")]
	pub quality_threshold: f64,
	/// Whether to present a payer credential to providers that charge
	/// per call
	#[serde(default)]
	pub pay_per_call: bool,
	/// Payer account, required when pay_per_call is set
	#[serde(default)]
	pub payer_account: Option<String>,
	/// Payer key, required when pay_per_call is set
	#[serde(default)]
	pub payer_key: Option<String>,
}

/// Commitment-layer polling parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommitmentSettings {
	/// Interval between decryption polls, milliseconds
	#[serde(default = "default_poll_interval_ms")]
	pub poll_interval_ms: u64,
	/// Maximum decryption polls per verification
	#[serde(default = "default_max_attempts")]
	pub max_attempts: u32,
	/// Wall-clock budget per verification, seconds
	#[serde(default = "default_timeout_secs")]
	pub timeout_secs: u64,
}

impl Default for CommitmentSettings {
	fn default() -> Self {
		Self {
			poll_interval_ms: default_poll_interval_ms(),
			max_attempts: default_max_attempts(),
			timeout_secs: default_timeout_secs(),
		}
	}
}

/// Escrow terms applied to every provider in a run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EscrowSettings {
	/// Settlement token
	pub token: String,
	/// Escrowed amount per provider
	pub unit_amount: Decimal,
	/// Seconds until the buyer may claim a refund unilaterally
	#[serde(default = "default_deadline_secs")]
	pub deadline_secs: i64,
	/// Emergency refunds unlock after this multiple of the deadline
	#[serde(default = "default_grace_multiplier")]
	pub grace_multiplier: i32,
}

/// One candidate provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderEntry {
	pub name: String,
	pub endpoint: String,
	#[serde(default = "default_category")]
	pub category: String,
}

fn default_ttl_secs() -> i64 {
	600
}

fn default_quality_threshold() -> f64 {
	5.0
}

fn default_poll_interval_ms() -> u64 {
	1000
}

fn default_max_attempts() -> u32 {
	15
}

fn default_timeout_secs() -> u64 {
	20
}

fn default_deadline_secs() -> i64 {
	3600
}

fn default_grace_multiplier() -> i32 {
	2
}

fn default_category() -> String {
	"analysis".to_string()
}
