//! In-process identity registry.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use agora_types::CandidateProvider;

use crate::{IdentityError, IdentityInterface};

#[derive(Debug, Clone)]
pub struct RegisteredProvider {
	pub provider: CandidateProvider,
	pub reputation: i64,
	pub tags: Vec<String>,
}

/// Registry assigning monotonically increasing handles and accumulating
/// reputation deltas in memory.
pub struct LocalRegistry {
	next_handle: AtomicU64,
	records: DashMap<u64, RegisteredProvider>,
}

impl LocalRegistry {
	pub fn new() -> Self {
		Self {
			next_handle: AtomicU64::new(1),
			records: DashMap::new(),
		}
	}

	/// Current standing of a registered provider.
	pub fn record(&self, handle: u64) -> Option<RegisteredProvider> {
		self.records.get(&handle).map(|record| record.clone())
	}
}

impl Default for LocalRegistry {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl IdentityInterface for LocalRegistry {
	async fn register(&self, provider: &CandidateProvider) -> Result<u64, IdentityError> {
		let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
		self.records.insert(
			handle,
			RegisteredProvider {
				provider: provider.clone(),
				reputation: 0,
				tags: Vec::new(),
			},
		);
		Ok(handle)
	}

	async fn submit_reputation(
		&self,
		handle: u64,
		delta: i64,
		tags: &[String],
	) -> Result<(), IdentityError> {
		let mut record = self
			.records
			.get_mut(&handle)
			.ok_or(IdentityError::UnknownHandle(handle))?;
		record.reputation += delta;
		record.tags.extend(tags.iter().cloned());
		Ok(())
	}
}
