//! HTTP purchase backend speaking the pay-per-call protocol.
//!
//! Exchange: POST the query; a `402 Payment Required` response carries the
//! provider's payment requirements; retry once with a signed payment
//! header. How the signature is cryptographically constructed is the
//! payment scheme's concern, not the core's; here it is an opaque digest
//! over the credential and the requirements.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use sha3::{Digest, Keccak256};
use tracing::{debug, info};

use agora_types::{Delivery, PayerCredential, PaymentRequirements};

use crate::{PurchaseError, PurchaseInterface};

#[derive(Deserialize)]
struct AnalysisBody {
	analysis: String,
}

pub struct HttpPurchase {
	client: reqwest::Client,
}

impl HttpPurchase {
	pub fn new() -> Self {
		Self {
			client: reqwest::Client::new(),
		}
	}
}

impl Default for HttpPurchase {
	fn default() -> Self {
		Self::new()
	}
}

/// Digest binding the payer credential to the provider's requirements.
fn payment_signature(payer: &PayerCredential, requirements: &PaymentRequirements) -> String {
	let mut hasher = Keccak256::new();
	hasher.update(payer.account.as_bytes());
	hasher.update(payer.key.as_bytes());
	hasher.update(requirements.pay_to.as_bytes());
	hasher.update(requirements.amount.to_string().as_bytes());
	if let Some(nonce) = &requirements.nonce {
		hasher.update(nonce.as_bytes());
	}
	format!("0x{}", hex::encode(hasher.finalize()))
}

fn transport_error(provider: &str, err: reqwest::Error) -> PurchaseError {
	PurchaseError::Transport {
		provider: provider.to_string(),
		reason: err.to_string(),
	}
}

impl HttpPurchase {
	async fn parse_delivery(
		provider: &str,
		response: reqwest::Response,
		realized_cost: Option<rust_decimal::Decimal>,
		protocol_used: bool,
	) -> Result<Delivery, PurchaseError> {
		let text = response
			.text()
			.await
			.map_err(|e| transport_error(provider, e))?;
		// Providers answer either a JSON envelope or plain text.
		let payload = match serde_json::from_str::<AnalysisBody>(&text) {
			Ok(body) => body.analysis,
			Err(_) => text,
		};
		if payload.trim().is_empty() {
			return Err(PurchaseError::BadDelivery {
				provider: provider.to_string(),
				reason: "empty body".to_string(),
			});
		}
		Ok(Delivery {
			provider: provider.to_string(),
			payload,
			realized_cost,
			protocol_used,
			received_at: Utc::now(),
		})
	}
}

#[async_trait]
impl PurchaseInterface for HttpPurchase {
	async fn purchase(
		&self,
		provider: &str,
		endpoint: &str,
		query: &str,
		payer: Option<&PayerCredential>,
	) -> Result<Delivery, PurchaseError> {
		let request_body = json!({ "query": query });

		let response = self
			.client
			.post(endpoint)
			.json(&request_body)
			.send()
			.await
			.map_err(|e| transport_error(provider, e))?;

		match response.status() {
			status if status.is_success() => {
				Self::parse_delivery(provider, response, None, false).await
			}
			StatusCode::PAYMENT_REQUIRED => {
				let requirements: PaymentRequirements = response
					.json()
					.await
					.map_err(|e| transport_error(provider, e))?;
				let payer = payer.ok_or_else(|| {
					PurchaseError::PaymentRequired(provider.to_string())
				})?;

				debug!(
					provider,
					scheme = %requirements.scheme,
					amount = %requirements.amount,
					"Payment challenge received, retrying with signed header"
				);

				let header = json!({
					"account": payer.account,
					"scheme": requirements.scheme,
					"network": requirements.network,
					"signature": payment_signature(payer, &requirements),
				});
				let retry = self
					.client
					.post(endpoint)
					.header("X-Payment", header.to_string())
					.json(&request_body)
					.send()
					.await
					.map_err(|e| transport_error(provider, e))?;

				if !retry.status().is_success() {
					return Err(PurchaseError::Rejected {
						provider: provider.to_string(),
						reason: format!("payment retry answered {}", retry.status()),
					});
				}

				info!(provider, amount = %requirements.amount, "Paid purchase accepted");
				Self::parse_delivery(provider, retry, Some(requirements.amount), true).await
			}
			status => Err(PurchaseError::Rejected {
				provider: provider.to_string(),
				reason: format!("status {}", status),
			}),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal::Decimal;

	fn requirements(nonce: Option<&str>) -> PaymentRequirements {
		PaymentRequirements {
			scheme: "exact".into(),
			network: "base".into(),
			amount: Decimal::new(100, 2),
			pay_to: "0xseller".into(),
			nonce: nonce.map(str::to_string),
		}
	}

	#[test]
	fn test_signature_is_deterministic_per_challenge() {
		let payer = PayerCredential {
			account: "0xbuyer".into(),
			key: "k1".into(),
		};
		let a = payment_signature(&payer, &requirements(Some("n1")));
		let b = payment_signature(&payer, &requirements(Some("n1")));
		assert_eq!(a, b);
		assert!(a.starts_with("0x"));
	}

	#[test]
	fn test_signature_binds_nonce_and_credential() {
		let payer = PayerCredential {
			account: "0xbuyer".into(),
			key: "k1".into(),
		};
		let other = PayerCredential {
			account: "0xbuyer".into(),
			key: "k2".into(),
		};
		let base = payment_signature(&payer, &requirements(Some("n1")));
		assert_ne!(base, payment_signature(&payer, &requirements(Some("n2"))));
		assert_ne!(base, payment_signature(&other, &requirements(Some("n1"))));
	}
}
