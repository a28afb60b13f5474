//! Data exchanged with the purchase capability.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Credential presented when a provider demands payment per call.
/// Opaque to the core: only the purchase implementation interprets it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayerCredential {
	pub account: String,
	pub key: String,
}

/// Requirements carried by a provider's payment-required response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequirements {
	pub scheme: String,
	pub network: String,
	pub amount: Decimal,
	pub pay_to: String,
	#[serde(default)]
	pub nonce: Option<String>,
}

/// A provider's delivered analysis plus payment metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
	pub provider: String,
	pub payload: String,
	/// What the purchase actually cost, when the provider charged per call.
	pub realized_cost: Option<Decimal>,
	/// Whether the payment challenge/response exchange was exercised.
	pub protocol_used: bool,
	pub received_at: DateTime<Utc>,
}
