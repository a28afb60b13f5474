//! Mandate chain for the agora procurement system.
//!
//! The chain is the append-only accountability record of one run: one
//! intent, one cart per engaged provider, one payment per cart. Nothing is
//! ever deleted; the only permitted mutations are the single status
//! transition on each payment and the single completion write on the chain.

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::warn;

use agora_types::{
	Budget, CartMandate, ChainOutcome, ChainRecord, IntentMandate, LineItem, PaymentMandate,
	PaymentStatus, SettleOutcome,
};

#[derive(Debug, Error)]
pub enum MandateError {
	/// A cart was requested before any intent exists.
	#[error("No intent mandate exists for this chain")]
	NoIntent,

	#[error("Unknown intent mandate: {0}")]
	UnknownIntent(String),

	#[error("Unknown cart mandate: {0}")]
	UnknownCart(String),

	/// The chain holds exactly one intent.
	#[error("Intent mandate already exists: {0}")]
	IntentExists(String),

	#[error("Payment mandate {0} already settled")]
	AlreadySettled(String),

	#[error("Chain outcome already recorded")]
	AlreadyCompleted,

	/// Completion requires every payment to have reached a terminal status.
	#[error("{0} payment mandate(s) still locked")]
	PaymentsPending(usize),
}

/// Causally-linked record of intent, carts and payments for one run.
#[derive(Debug, Default)]
pub struct MandateChain {
	intent: Option<IntentMandate>,
	carts: Vec<CartMandate>,
	payments: Vec<PaymentMandate>,
	outcome: Option<ChainOutcome>,
	completed_at: Option<chrono::DateTime<Utc>>,
}

impl MandateChain {
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates the root intent mandate. Exactly one per chain.
	pub fn create_intent(
		&mut self,
		description: impl Into<String>,
		budget: Budget,
		ttl_secs: i64,
	) -> Result<IntentMandate, MandateError> {
		if let Some(existing) = &self.intent {
			return Err(MandateError::IntentExists(existing.id.clone()));
		}
		let intent = IntentMandate::new(description, budget, ttl_secs);
		self.intent = Some(intent.clone());
		Ok(intent)
	}

	/// Creates a cart bound to the chain's intent.
	pub fn create_cart(
		&mut self,
		intent_id: &str,
		provider: impl Into<String>,
		items: Vec<LineItem>,
		endpoint: impl Into<String>,
	) -> Result<CartMandate, MandateError> {
		let intent = self.intent.as_ref().ok_or(MandateError::NoIntent)?;
		if intent.id != intent_id {
			return Err(MandateError::UnknownIntent(intent_id.to_string()));
		}
		let cart = CartMandate::new(intent_id, provider, items, endpoint);
		self.carts.push(cart.clone());
		Ok(cart)
	}

	/// Locks a payment against an existing cart.
	pub fn create_payment(
		&mut self,
		cart_id: &str,
		escrow_id: impl Into<String>,
		amount: Decimal,
		realized_cost: Option<Decimal>,
	) -> Result<PaymentMandate, MandateError> {
		if !self.carts.iter().any(|cart| cart.id == cart_id) {
			return Err(MandateError::UnknownCart(cart_id.to_string()));
		}
		let mut payment = PaymentMandate::new(cart_id, escrow_id, amount);
		payment.realized_cost = realized_cost;
		self.payments.push(payment.clone());
		Ok(payment)
	}

	/// Moves a payment out of `Locked`. Settlement bookkeeping is
	/// best-effort: an unknown id is tolerated and reported as `false`
	/// rather than failing the caller, since the ledger is the source of
	/// truth. A second transition on the same payment is refused.
	pub fn settle_payment(
		&mut self,
		payment_id: &str,
		outcome: SettleOutcome,
		reference: Option<String>,
	) -> Result<bool, MandateError> {
		let Some(payment) = self
			.payments
			.iter_mut()
			.find(|payment| payment.id == payment_id)
		else {
			warn!(payment_id, "Ignoring settlement for unknown payment mandate");
			return Ok(false);
		};

		if payment.status.is_terminal() {
			return Err(MandateError::AlreadySettled(payment_id.to_string()));
		}

		payment.status = match outcome {
			SettleOutcome::Paid => PaymentStatus::Released,
			SettleOutcome::Refunded => PaymentStatus::Refunded,
		};
		payment.settlement_ref = reference;
		Ok(true)
	}

	/// Records the chain's terminal outcome. At most once, and only after
	/// every payment has left `Locked`.
	pub fn complete(&mut self, outcome: ChainOutcome) -> Result<(), MandateError> {
		if self.outcome.is_some() {
			return Err(MandateError::AlreadyCompleted);
		}
		let pending = self
			.payments
			.iter()
			.filter(|payment| !payment.status.is_terminal())
			.count();
		if pending > 0 {
			return Err(MandateError::PaymentsPending(pending));
		}
		self.outcome = Some(outcome);
		self.completed_at = Some(Utc::now());
		Ok(())
	}

	pub fn intent(&self) -> Option<&IntentMandate> {
		self.intent.as_ref()
	}

	pub fn carts(&self) -> &[CartMandate] {
		&self.carts
	}

	pub fn payments(&self) -> &[PaymentMandate] {
		&self.payments
	}

	pub fn cart(&self, id: &str) -> Option<&CartMandate> {
		self.carts.iter().find(|cart| cart.id == id)
	}

	pub fn payment(&self, id: &str) -> Option<&PaymentMandate> {
		self.payments.iter().find(|payment| payment.id == id)
	}

	pub fn outcome(&self) -> Option<ChainOutcome> {
		self.outcome
	}

	pub fn snapshot(&self) -> ChainRecord {
		ChainRecord {
			intent: self.intent.clone(),
			carts: self.carts.clone(),
			payments: self.payments.clone(),
			outcome: self.outcome,
			completed_at: self.completed_at,
		}
	}
}
