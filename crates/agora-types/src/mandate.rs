//! Mandate records forming the intent -> cart -> payment accountability chain.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::{prefixed_id, Budget};

/// Root of the chain: what the buyer wants, under which budget, for how long.
///
/// Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentMandate {
	pub id: String,
	pub description: String,
	pub budget: Budget,
	pub ttl_secs: i64,
	pub created_at: DateTime<Utc>,
	pub expires_at: DateTime<Utc>,
}

impl IntentMandate {
	pub fn new(description: impl Into<String>, budget: Budget, ttl_secs: i64) -> Self {
		let created_at = Utc::now();
		Self {
			id: prefixed_id("intent"),
			description: description.into(),
			budget,
			ttl_secs,
			created_at,
			expires_at: created_at + Duration::seconds(ttl_secs),
		}
	}

	pub fn is_expired(&self, at: DateTime<Utc>) -> bool {
		at > self.expires_at
	}
}

/// A single priced service on a cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
	pub service: String,
	pub price: Decimal,
}

/// Agreement to purchase from one provider, bound to an intent.
///
/// Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartMandate {
	pub id: String,
	pub intent_id: String,
	pub provider: String,
	pub items: Vec<LineItem>,
	pub total_price: Decimal,
	pub endpoint: String,
	pub created_at: DateTime<Utc>,
}

impl CartMandate {
	pub fn new(
		intent_id: impl Into<String>,
		provider: impl Into<String>,
		items: Vec<LineItem>,
		endpoint: impl Into<String>,
	) -> Self {
		let total_price = items.iter().map(|item| item.price).sum();
		Self {
			id: prefixed_id("cart"),
			intent_id: intent_id.into(),
			provider: provider.into(),
			items,
			total_price,
			endpoint: endpoint.into(),
			created_at: Utc::now(),
		}
	}
}

/// Lifecycle of a payment mandate. Transitions exactly once,
/// from `Locked` to one of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
	Locked,
	Released,
	Refunded,
}

impl PaymentStatus {
	pub fn is_terminal(&self) -> bool {
		matches!(self, PaymentStatus::Released | PaymentStatus::Refunded)
	}
}

/// Funds locked against one cart, settled when the escrow settles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMandate {
	pub id: String,
	pub cart_id: String,
	pub escrow_id: String,
	pub amount: Decimal,
	pub status: PaymentStatus,
	pub settlement_ref: Option<String>,
	pub realized_cost: Option<Decimal>,
	pub created_at: DateTime<Utc>,
}

impl PaymentMandate {
	pub fn new(
		cart_id: impl Into<String>,
		escrow_id: impl Into<String>,
		amount: Decimal,
	) -> Self {
		Self {
			id: prefixed_id("payment"),
			cart_id: cart_id.into(),
			escrow_id: escrow_id.into(),
			amount,
			status: PaymentStatus::Locked,
			settlement_ref: None,
			realized_cost: None,
			created_at: Utc::now(),
		}
	}
}

/// Terminal disposition of a whole mandate chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainOutcome {
	Success,
	Failure,
	Expired,
}

/// Point-in-time view of a mandate chain, embedded in the run receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainRecord {
	pub intent: Option<IntentMandate>,
	pub carts: Vec<CartMandate>,
	pub payments: Vec<PaymentMandate>,
	pub outcome: Option<ChainOutcome>,
	pub completed_at: Option<DateTime<Utc>>,
}
