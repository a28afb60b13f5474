//! Scripted purchase backend for tests and demos.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;

use agora_types::{Delivery, PayerCredential};

use crate::{PurchaseError, PurchaseInterface};

enum Script {
	Deliver {
		payload: String,
		cost: Option<Decimal>,
		protocol_used: bool,
	},
	Fail(String),
}

/// Purchase backend answering from a per-provider script.
pub struct ScriptedMarket {
	scripts: DashMap<String, Script>,
}

impl ScriptedMarket {
	pub fn new() -> Self {
		Self {
			scripts: DashMap::new(),
		}
	}

	/// Provider answers with `payload`, free of charge.
	pub fn deliver(self, provider: &str, payload: &str) -> Self {
		self.scripts.insert(
			provider.to_string(),
			Script::Deliver {
				payload: payload.to_string(),
				cost: None,
				protocol_used: false,
			},
		);
		self
	}

	/// Provider demands payment, then answers with `payload`.
	pub fn deliver_paid(self, provider: &str, payload: &str, cost: Decimal) -> Self {
		self.scripts.insert(
			provider.to_string(),
			Script::Deliver {
				payload: payload.to_string(),
				cost: Some(cost),
				protocol_used: true,
			},
		);
		self
	}

	/// Provider fails with the given error.
	pub fn fail(self, provider: &str, reason: &str) -> Self {
		self.scripts
			.insert(provider.to_string(), Script::Fail(reason.to_string()));
		self
	}
}

impl Default for ScriptedMarket {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl PurchaseInterface for ScriptedMarket {
	async fn purchase(
		&self,
		provider: &str,
		_endpoint: &str,
		_query: &str,
		payer: Option<&PayerCredential>,
	) -> Result<Delivery, PurchaseError> {
		let Some(script) = self.scripts.get(provider) else {
			return Err(PurchaseError::Rejected {
				provider: provider.to_string(),
				reason: "no script for provider".to_string(),
			});
		};

		match &*script {
			Script::Fail(reason) => Err(PurchaseError::Rejected {
				provider: provider.to_string(),
				reason: reason.clone(),
			}),
			Script::Deliver {
				payload,
				cost,
				protocol_used,
			} => {
				if *protocol_used && payer.is_none() {
					return Err(PurchaseError::PaymentRequired(provider.to_string()));
				}
				Ok(Delivery {
					provider: provider.to_string(),
					payload: payload.clone(),
					realized_cost: *cost,
					protocol_used: *protocol_used,
					received_at: Utc::now(),
				})
			}
		}
	}
}
