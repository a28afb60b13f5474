//! Purchase capability for the agora system.
//!
//! One call per provider: send the query, get the analysis back. A
//! provider may demand payment per call; the HTTP implementation handles
//! that challenge/response exchange transparently, the core only sees the
//! delivery (or a failure) and the realized-cost annotation.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use agora_types::{Delivery, PayerCredential};

/// Re-export implementations
pub mod implementations {
	pub mod http;
	pub mod mock;
}

#[derive(Debug, Error)]
pub enum PurchaseError {
	/// The provider demanded payment and no payer credential was supplied.
	#[error("Provider {0} requires payment and no payer credential is configured")]
	PaymentRequired(String),

	#[error("Provider {provider} rejected the purchase: {reason}")]
	Rejected { provider: String, reason: String },

	#[error("Transport error for {provider}: {reason}")]
	Transport { provider: String, reason: String },

	#[error("Unparseable delivery from {provider}: {reason}")]
	BadDelivery { provider: String, reason: String },
}

/// Contract of the purchase capability.
#[async_trait]
pub trait PurchaseInterface: Send + Sync {
	async fn purchase(
		&self,
		provider: &str,
		endpoint: &str,
		query: &str,
		payer: Option<&PayerCredential>,
	) -> Result<Delivery, PurchaseError>;
}

/// Typed wrapper over the purchase backend.
pub struct PurchaseService {
	backend: Arc<dyn PurchaseInterface>,
}

impl PurchaseService {
	pub fn new(backend: Arc<dyn PurchaseInterface>) -> Self {
		Self { backend }
	}

	pub async fn purchase(
		&self,
		provider: &str,
		endpoint: &str,
		query: &str,
		payer: Option<&PayerCredential>,
	) -> Result<Delivery, PurchaseError> {
		match self.backend.purchase(provider, endpoint, query, payer).await {
			Ok(delivery) => {
				info!(
					provider,
					protocol_used = delivery.protocol_used,
					"Purchase delivered"
				);
				Ok(delivery)
			}
			Err(err) => {
				warn!(provider, error = %err, "Purchase failed");
				Err(err)
			}
		}
	}
}
