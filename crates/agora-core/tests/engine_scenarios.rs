//! End-to-end procurement runs against the in-memory implementations.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

use agora_commitment::implementations::memory::InMemoryVault;
use agora_config::{
	BrokerSettings, CommitmentSettings, EscrowSettings, ProcurementConfig, ProviderEntry,
};
use agora_core::EngineBuilder;
use agora_identity::implementations::local::LocalRegistry;
use agora_ledger::implementations::memory::InMemoryLedger;
use agora_ledger::{LedgerError, LedgerInterface};
use agora_oracles::implementations::heuristic::{BudgetSelection, ExtractiveSynthesis};
use agora_oracles::{
	EncryptionPolicyOracle, OracleError, OracleSuite, ProviderSelectionOracle, QualityOracle,
};
use agora_purchase::implementations::mock::ScriptedMarket;
use agora_types::{
	Budget, CandidateProvider, ChainOutcome, CommitmentEvent, EncryptionDecision, EncryptionLayer,
	EscrowStatus, PaymentStatus, ProcurementEvent, QualityVerdict, SelectionChoice, Sensitivity,
};

/// Policy oracle that is down; the suite must fall back to all layers.
struct DownPolicy;

#[async_trait]
impl EncryptionPolicyOracle for DownPolicy {
	async fn decide(&self, _query: &str) -> Result<EncryptionDecision, OracleError> {
		Err(OracleError::Unavailable("policy endpoint down".into()))
	}
}

/// Policy oracle selecting only the settlement checkpoint.
struct SettlementOnlyPolicy;

#[async_trait]
impl EncryptionPolicyOracle for SettlementOnlyPolicy {
	async fn decide(&self, _query: &str) -> Result<EncryptionDecision, OracleError> {
		Ok(EncryptionDecision {
			layers: vec![EncryptionLayer::Settlement],
			rationale: "routine".into(),
			sensitivity: Sensitivity::Low,
		})
	}
}

/// Quality oracle with a fixed score per provider name.
struct FixedQuality {
	scores: HashMap<String, f64>,
}

impl FixedQuality {
	fn new(scores: &[(&str, f64)]) -> Self {
		Self {
			scores: scores
				.iter()
				.map(|(name, score)| (name.to_string(), *score))
				.collect(),
		}
	}
}

#[async_trait]
impl QualityOracle for FixedQuality {
	async fn score(
		&self,
		_delivery: &str,
		provider: &str,
		threshold: f64,
		_category: Option<&str>,
	) -> Result<QualityVerdict, OracleError> {
		let score = *self
			.scores
			.get(provider)
			.ok_or_else(|| OracleError::Malformed(format!("no score for {}", provider)))?;
		Ok(QualityVerdict {
			score,
			passed: score >= threshold,
			reasoning: format!("fixed score {}", score),
		})
	}
}

struct RecommendEveryone;

#[async_trait]
impl ProviderSelectionOracle for RecommendEveryone {
	async fn select(
		&self,
		candidates: &[CandidateProvider],
		_budget: &Budget,
		_query: &str,
	) -> Result<Vec<SelectionChoice>, OracleError> {
		Ok(candidates
			.iter()
			.map(|candidate| SelectionChoice {
				name: candidate.name.clone(),
				reason: "in roster".into(),
			})
			.collect())
	}
}

fn config(provider_names: &[&str], quality_threshold: f64) -> ProcurementConfig {
	ProcurementConfig {
		broker: BrokerSettings {
			name: "agora-broker".into(),
			budget_amount: Decimal::new(500, 2),
			budget_asset: "USDC".into(),
			ttl_secs: 600,
			quality_threshold,
			pay_per_call: false,
			payer_account: None,
			payer_key: None,
		},
		commitment: CommitmentSettings {
			poll_interval_ms: 5,
			max_attempts: 5,
			timeout_secs: 2,
		},
		escrow: EscrowSettings {
			token: "USDC".into(),
			unit_amount: Decimal::new(100, 2),
			deadline_secs: 3600,
			grace_multiplier: 2,
		},
		providers: provider_names
			.iter()
			.map(|name| ProviderEntry {
				name: name.to_string(),
				endpoint: format!("http://{}.test/analyze", name),
				category: "macro".into(),
			})
			.collect(),
	}
}

struct Harness {
	ledger: Arc<InMemoryLedger>,
	builder: EngineBuilder,
}

fn harness(
	provider_names: &[&str],
	threshold: f64,
	policy: Arc<dyn EncryptionPolicyOracle>,
	quality: Arc<dyn QualityOracle>,
	market: ScriptedMarket,
) -> Harness {
	let ledger = Arc::new(InMemoryLedger::default());
	let oracles = OracleSuite::new(
		policy,
		Arc::new(RecommendEveryone),
		quality,
		Arc::new(ExtractiveSynthesis),
	);
	let builder = EngineBuilder::new(config(provider_names, threshold))
		.with_vault(Arc::new(InMemoryVault::new()))
		.with_ledger(ledger.clone())
		.with_market(Arc::new(market))
		.with_identity(Arc::new(LocalRegistry::new()))
		.with_oracles(oracles);
	Harness { ledger, builder }
}

#[tokio::test]
async fn test_all_providers_pass() {
	let market = ScriptedMarket::new()
		.deliver("alpha", "Alpha sees growth ahead. Allocation favors equities.")
		.deliver("beta", "Beta expects rotation. Defensive sectors lead.")
		.deliver("gamma", "Gamma flags rates risk. Duration matters.");
	let harness = harness(
		&["alpha", "beta", "gamma"],
		5.0,
		Arc::new(SettlementOnlyPolicy),
		Arc::new(FixedQuality::new(&[("alpha", 8.0), ("beta", 8.0), ("gamma", 9.0)])),
		market,
	);
	let engine = harness.builder.build().unwrap();

	let receipt = engine.run("sector outlook").await.unwrap();

	assert_eq!(receipt.totals.providers_paid, 3);
	assert_eq!(receipt.totals.providers_refunded, 0);
	assert_eq!(receipt.totals.paid_amount, Decimal::new(300, 2));
	assert_eq!(receipt.totals.refunded_amount, Decimal::ZERO);
	assert_eq!(receipt.chain.outcome, Some(ChainOutcome::Success));
	assert!(receipt.synthesis.contains("alpha"));
}

#[tokio::test]
async fn test_mixed_quality_pays_and_refunds() {
	let market = ScriptedMarket::new()
		.deliver("HighQ", "Thorough analysis with depth.")
		.deliver("LowQ", "meh");
	let harness = harness(
		&["HighQ", "LowQ"],
		5.0,
		Arc::new(SettlementOnlyPolicy),
		Arc::new(FixedQuality::new(&[("HighQ", 9.0), ("LowQ", 3.0)])),
		market,
	);
	let engine = harness.builder.build().unwrap();

	let receipt = engine.run("credit outlook").await.unwrap();

	assert_eq!(receipt.totals.paid_amount, Decimal::new(100, 2));
	assert_eq!(receipt.totals.refunded_amount, Decimal::new(100, 2));

	let by_name: HashMap<_, _> = receipt
		.providers
		.iter()
		.map(|result| (result.provider.as_str(), result))
		.collect();
	assert!(by_name["HighQ"].passed);
	assert!(!by_name["LowQ"].passed);

	let payment_status = |payment_id: &str| {
		receipt
			.chain
			.payments
			.iter()
			.find(|payment| payment.id == payment_id)
			.unwrap()
			.status
	};
	assert_eq!(
		payment_status(&by_name["HighQ"].payment_id),
		PaymentStatus::Released
	);
	assert_eq!(
		payment_status(&by_name["LowQ"].payment_id),
		PaymentStatus::Refunded
	);
}

#[tokio::test]
async fn test_impossible_threshold_refunds_everyone() {
	let market = ScriptedMarket::new()
		.deliver("alpha", "Solid work.")
		.deliver("beta", "Also solid.");
	let harness = harness(
		&["alpha", "beta"],
		10.0,
		Arc::new(SettlementOnlyPolicy),
		Arc::new(FixedQuality::new(&[("alpha", 9.0), ("beta", 8.5)])),
		market,
	);
	let engine = harness.builder.build().unwrap();

	let receipt = engine.run("fx outlook").await.unwrap();

	assert_eq!(receipt.totals.providers_paid, 0);
	assert_eq!(receipt.totals.paid_amount, Decimal::ZERO);
	assert_eq!(receipt.chain.outcome, Some(ChainOutcome::Failure));
	assert!(receipt
		.providers
		.iter()
		.all(|result| !result.passed && result.reputation_delta < 0));
}

#[tokio::test]
async fn test_failed_purchase_excludes_provider_only() {
	let market = ScriptedMarket::new()
		.deliver("alpha", "Alpha delivers.")
		.fail("beta", "connection reset")
		.deliver("gamma", "Gamma delivers.");
	let harness = harness(
		&["alpha", "beta", "gamma"],
		5.0,
		Arc::new(SettlementOnlyPolicy),
		Arc::new(FixedQuality::new(&[("alpha", 7.0), ("gamma", 7.0)])),
		market,
	);
	let engine = harness.builder.build().unwrap();

	let receipt = engine.run("energy outlook").await.unwrap();

	// The failed provider is gone from results but its cart remains on
	// the chain.
	assert_eq!(receipt.providers.len(), 2);
	assert!(receipt.providers.iter().all(|result| result.provider != "beta"));
	assert_eq!(receipt.chain.carts.len(), 3);
	assert_eq!(receipt.totals.escrows_created, 2);
	assert_eq!(receipt.chain.outcome, Some(ChainOutcome::Success));
}

#[tokio::test]
async fn test_policy_outage_encrypts_every_checkpoint() {
	let market = ScriptedMarket::new().deliver("alpha", "Alpha delivers.");
	let harness = harness(
		&["alpha"],
		5.0,
		Arc::new(DownPolicy),
		Arc::new(FixedQuality::new(&[("alpha", 7.0)])),
		market,
	);
	let engine = harness.builder.build().unwrap();
	let events = engine.events().clone();

	let receipt = engine.run("confidential positions").await.unwrap();

	assert_eq!(receipt.encryption.layers.len(), 4);
	// strategy + query + settlement run-level commits, plus one escrow wrap.
	assert_eq!(receipt.commitment_stats.count, 4);
	assert_eq!(receipt.totals.commit_message_count, 3);
	assert!(receipt.commitments.strategy.as_ref().unwrap().verified.unwrap());
	assert!(receipt.commitments.query.as_ref().unwrap().verified.unwrap());
	assert!(receipt.commitments.settlement.as_ref().unwrap().verified.unwrap());

	let committed_layers: std::collections::BTreeSet<EncryptionLayer> = events
		.snapshot()
		.into_iter()
		.filter_map(|event| match event {
			ProcurementEvent::Commitment(CommitmentEvent::Committing { layer }) => Some(layer),
			_ => None,
		})
		.collect();
	assert_eq!(committed_layers.len(), 4);
}

#[tokio::test]
async fn test_settled_funds_are_conserved_and_final() {
	let market = ScriptedMarket::new()
		.deliver("alpha", "Alpha delivers.")
		.deliver("beta", "Beta delivers.")
		.deliver("gamma", "Gamma delivers.");
	let harness = harness(
		&["alpha", "beta", "gamma"],
		5.0,
		Arc::new(SettlementOnlyPolicy),
		Arc::new(FixedQuality::new(&[("alpha", 9.0), ("beta", 2.0), ("gamma", 6.0)])),
		market,
	);
	let ledger = harness.ledger.clone();
	let engine = harness.builder.build().unwrap();

	let receipt = engine.run("rates outlook").await.unwrap();

	// Conservation: every settled escrow's unit lands on exactly one side.
	let unit = Decimal::new(100, 2);
	assert_eq!(
		receipt.totals.paid_amount + receipt.totals.refunded_amount,
		unit * Decimal::from(receipt.totals.escrows_created),
	);

	// Every escrow is terminal and refuses a second settlement.
	for result in &receipt.providers {
		let escrow = ledger.fetch(&result.escrow_id).await.unwrap();
		assert!(matches!(
			escrow.status,
			EscrowStatus::Settled | EscrowStatus::Refunded
		));
		let err = ledger.settle(&result.escrow_id, true).await.unwrap_err();
		assert!(matches!(err, LedgerError::AlreadySettled(_)));
	}
}

#[tokio::test]
async fn test_chain_referential_integrity() {
	let market = ScriptedMarket::new()
		.deliver("alpha", "Alpha delivers.")
		.deliver("beta", "Beta delivers.");
	let harness = harness(
		&["alpha", "beta"],
		5.0,
		Arc::new(SettlementOnlyPolicy),
		Arc::new(FixedQuality::new(&[("alpha", 9.0), ("beta", 2.0)])),
		market,
	);
	let engine = harness.builder.build().unwrap();

	let receipt = engine.run("equities outlook").await.unwrap();

	let intent_id = receipt.chain.intent.as_ref().unwrap().id.clone();
	for cart in &receipt.chain.carts {
		assert_eq!(cart.intent_id, intent_id);
	}
	for payment in &receipt.chain.payments {
		assert!(receipt
			.chain
			.carts
			.iter()
			.any(|cart| cart.id == payment.cart_id));
		assert!(payment.status.is_terminal());
	}
	// Advisory selection annotates, it does not filter.
	assert!(receipt
		.providers
		.iter()
		.all(|result| result.selection_reason.as_deref() == Some("in roster")));
}

#[tokio::test]
async fn test_pay_per_call_costs_flow_into_receipt() {
	let market = ScriptedMarket::new()
		.deliver_paid("alpha", "Alpha delivers.", Decimal::new(25, 2))
		.deliver("beta", "Beta delivers.");
	let mut cfg = config(&["alpha", "beta"], 5.0);
	cfg.broker.pay_per_call = true;
	cfg.broker.payer_account = Some("0xbuyer".into());
	cfg.broker.payer_key = Some("k1".into());

	let oracles = OracleSuite::new(
		Arc::new(SettlementOnlyPolicy),
		Arc::new(BudgetSelection::new(Decimal::new(100, 2))),
		Arc::new(FixedQuality::new(&[("alpha", 8.0), ("beta", 8.0)])),
		Arc::new(ExtractiveSynthesis),
	);
	let engine = EngineBuilder::new(cfg)
		.with_vault(Arc::new(InMemoryVault::new()))
		.with_ledger(Arc::new(InMemoryLedger::default()))
		.with_market(Arc::new(market))
		.with_identity(Arc::new(LocalRegistry::new()))
		.with_oracles(oracles)
		.build()
		.unwrap();

	let receipt = engine.run("macro outlook").await.unwrap();

	assert_eq!(receipt.totals.protocol_usage_count, 1);
	let alpha = receipt
		.providers
		.iter()
		.find(|result| result.provider == "alpha")
		.unwrap();
	assert!(alpha.protocol_used);
	assert_eq!(alpha.realized_cost, Some(Decimal::new(25, 2)));
	let alpha_payment = receipt
		.chain
		.payments
		.iter()
		.find(|payment| payment.id == alpha.payment_id)
		.unwrap();
	assert_eq!(alpha_payment.realized_cost, Some(Decimal::new(25, 2)));
}
