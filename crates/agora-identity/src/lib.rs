//! Identity and reputation services for the agora system.
//!
//! Providers are registered with an external identity service to obtain a
//! numeric handle; settled runs feed signed reputation deltas back under
//! that handle.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use agora_types::CandidateProvider;

/// Re-export implementations
pub mod implementations {
	pub mod local;
}

#[derive(Debug, Error)]
pub enum IdentityError {
	#[error("Unknown handle: {0}")]
	UnknownHandle(u64),

	#[error("Identity service error: {0}")]
	Service(String),
}

/// Contract of the external identity/reputation service.
#[async_trait]
pub trait IdentityInterface: Send + Sync {
	/// Registers a provider and returns its numeric handle.
	async fn register(&self, provider: &CandidateProvider) -> Result<u64, IdentityError>;

	/// Submits a signed reputation delta for a registered provider.
	async fn submit_reputation(
		&self,
		handle: u64,
		delta: i64,
		tags: &[String],
	) -> Result<(), IdentityError>;
}

/// Typed wrapper over the identity backend.
pub struct IdentityService {
	backend: Arc<dyn IdentityInterface>,
}

impl IdentityService {
	pub fn new(backend: Arc<dyn IdentityInterface>) -> Self {
		Self { backend }
	}

	pub async fn register(&self, provider: &CandidateProvider) -> Result<u64, IdentityError> {
		let handle = self.backend.register(provider).await?;
		info!(provider = %provider.name, handle, "Provider registered");
		Ok(handle)
	}

	pub async fn submit_reputation(
		&self,
		handle: u64,
		delta: i64,
		tags: &[String],
	) -> Result<(), IdentityError> {
		self.backend.submit_reputation(handle, delta, tags).await?;
		info!(handle, delta, "Reputation delta submitted");
		Ok(())
	}
}
