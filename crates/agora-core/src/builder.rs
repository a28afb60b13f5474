//! Wires external capabilities into a procurement engine.

use std::sync::Arc;

use agora_commitment::CommitmentInterface;
use agora_config::ProcurementConfig;
use agora_identity::{IdentityInterface, IdentityService};
use agora_ledger::LedgerInterface;
use agora_oracles::OracleSuite;
use agora_purchase::{PurchaseInterface, PurchaseService};
use agora_types::EventLog;

use crate::{EngineError, ProcurementEngine};

/// Builder collecting the engine's external capabilities. Every capability
/// is required; `build` refuses a partial wiring.
pub struct EngineBuilder {
	config: ProcurementConfig,
	vault: Option<Arc<dyn CommitmentInterface>>,
	ledger: Option<Arc<dyn LedgerInterface>>,
	market: Option<Arc<dyn PurchaseInterface>>,
	identity: Option<Arc<dyn IdentityInterface>>,
	oracles: Option<OracleSuite>,
	events: EventLog,
}

impl EngineBuilder {
	pub fn new(config: ProcurementConfig) -> Self {
		Self {
			config,
			vault: None,
			ledger: None,
			market: None,
			identity: None,
			oracles: None,
			events: EventLog::new(1024),
		}
	}

	/// The encrypted-commitment primitive.
	pub fn with_vault(mut self, vault: Arc<dyn CommitmentInterface>) -> Self {
		self.vault = Some(vault);
		self
	}

	/// The conditional-payment ledger.
	pub fn with_ledger(mut self, ledger: Arc<dyn LedgerInterface>) -> Self {
		self.ledger = Some(ledger);
		self
	}

	/// The purchase capability.
	pub fn with_market(mut self, market: Arc<dyn PurchaseInterface>) -> Self {
		self.market = Some(market);
		self
	}

	/// The identity/reputation service.
	pub fn with_identity(mut self, identity: Arc<dyn IdentityInterface>) -> Self {
		self.identity = Some(identity);
		self
	}

	/// The four decision oracles.
	pub fn with_oracles(mut self, oracles: OracleSuite) -> Self {
		self.oracles = Some(oracles);
		self
	}

	/// Replaces the default event log, e.g. to share one with subscribers
	/// wired up before the engine exists.
	pub fn with_events(mut self, events: EventLog) -> Self {
		self.events = events;
		self
	}

	pub fn build(self) -> Result<ProcurementEngine, EngineError> {
		let vault = self
			.vault
			.ok_or_else(|| EngineError::Config("commitment primitive not provided".into()))?;
		let ledger = self
			.ledger
			.ok_or_else(|| EngineError::Config("ledger not provided".into()))?;
		let market = self
			.market
			.ok_or_else(|| EngineError::Config("purchase capability not provided".into()))?;
		let identity = self
			.identity
			.ok_or_else(|| EngineError::Config("identity service not provided".into()))?;
		let oracles = self
			.oracles
			.ok_or_else(|| EngineError::Config("oracles not provided".into()))?;

		Ok(ProcurementEngine::new(
			self.config,
			vault,
			ledger,
			Arc::new(PurchaseService::new(market)),
			Arc::new(oracles),
			Arc::new(IdentityService::new(identity)),
			self.events,
		))
	}
}
