//! The procurement engine: ten phases from intent to receipt.

use chrono::Utc;
use futures::future::join_all;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use agora_commitment::{CommitmentInterface, CommitmentService, CommitmentTiming};
use agora_config::ProcurementConfig;
use agora_escrow::EscrowAccessor;
use agora_identity::IdentityService;
use agora_ledger::LedgerInterface;
use agora_mandate::MandateChain;
use agora_oracles::OracleSuite;
use agora_purchase::PurchaseService;
use agora_types::{
	keccak_hex, prefixed_id, Budget, CandidateProvider, ChainOutcome, CommitmentRecord, Delivery,
	EncryptionLayer, EventLog, LineItem, MandateEvent, PayerCredential, ProcurementEvent,
	ProviderResult, PurchaseEvent, QualityVerdict, Receipt, RunCommitments, RunEvent, RunTotals,
	SettleOutcome,
};

use crate::EngineError;

/// What the strategy checkpoint commits before providers are engaged.
/// The provider list is a placeholder at commit time; engagement has not
/// happened yet.
#[derive(Serialize)]
struct ExecutionPlan<'a> {
	query: &'a str,
	budget: &'a Budget,
	providers: Vec<String>,
	planned_at: chrono::DateTime<Utc>,
}

/// One line of the settlement-batch commitment.
#[derive(Serialize)]
struct SettlementLine<'a> {
	escrow_id: &'a str,
	decision: SettleOutcome,
	score: f64,
}

struct Engaged {
	candidate: CandidateProvider,
	handle: Option<u64>,
	cart_id: String,
	selection_reason: Option<String>,
}

struct Purchased {
	engaged: Engaged,
	delivery: Delivery,
	delivery_hash: String,
}

struct Escrowed {
	purchased: Purchased,
	escrow_id: String,
	payment_id: String,
}

struct Judged {
	escrowed: Escrowed,
	verdict: QualityVerdict,
	decision: SettleOutcome,
}

pub struct ProcurementEngine {
	config: ProcurementConfig,
	vault: Arc<dyn CommitmentInterface>,
	ledger: Arc<dyn LedgerInterface>,
	purchases: Arc<PurchaseService>,
	oracles: Arc<OracleSuite>,
	identity: Arc<IdentityService>,
	events: EventLog,
}

impl ProcurementEngine {
	pub(crate) fn new(
		config: ProcurementConfig,
		vault: Arc<dyn CommitmentInterface>,
		ledger: Arc<dyn LedgerInterface>,
		purchases: Arc<PurchaseService>,
		oracles: Arc<OracleSuite>,
		identity: Arc<IdentityService>,
		events: EventLog,
	) -> Self {
		Self {
			config,
			vault,
			ledger,
			purchases,
			oracles,
			identity,
			events,
		}
	}

	pub fn events(&self) -> &EventLog {
		&self.events
	}

	pub fn config(&self) -> &ProcurementConfig {
		&self.config
	}

	/// Executes one procurement run. Returns the complete receipt, or the
	/// fatal error that aborted the run; there is no partial receipt.
	pub async fn run(&self, query: &str) -> Result<Receipt, EngineError> {
		let run_id = prefixed_id("run");
		let started_at = Utc::now();
		let clock = std::time::Instant::now();
		info!(run_id = %run_id, query, "Procurement run starting");
		self.events.record(ProcurementEvent::Run(RunEvent::Started {
			run_id: run_id.clone(),
			query: query.to_string(),
		}));

		// Run-scoped state: chain, commitment counters and escrow handle
		// all live and die with this run.
		let mut chain = MandateChain::new();
		let commitments = Arc::new(CommitmentService::new(
			self.vault.clone(),
			self.timing(),
			self.events.clone(),
		));
		let escrows = EscrowAccessor::new(
			self.ledger.clone(),
			commitments.clone(),
			self.config.broker.name.clone(),
			self.events.clone(),
		);

		// Phase 0: intent mandate.
		let budget = Budget::new(
			self.config.broker.budget_amount,
			self.config.broker.budget_asset.clone(),
		);
		let intent = chain.create_intent(query, budget.clone(), self.config.broker.ttl_secs)?;
		self.events
			.record(ProcurementEvent::Mandate(MandateEvent::IntentCreated {
				id: intent.id.clone(),
			}));

		// Phase 1: encryption policy, defaulting to all checkpoints.
		let encryption = self.oracles.encryption_decision(query).await;
		info!(layers = ?encryption.layers, "Encryption policy decided");
		self.events
			.record(ProcurementEvent::Run(RunEvent::PolicyDecided {
				run_id: run_id.clone(),
				layers: encryption.layers.clone(),
			}));

		let mut run_commitments = RunCommitments::default();

		// Phase 2: commit the execution plan.
		if encryption.applies_to(EncryptionLayer::Strategy) {
			let plan = ExecutionPlan {
				query,
				budget: &budget,
				providers: Vec::new(),
				planned_at: Utc::now(),
			};
			let serialized = serde_json::to_string(&plan)?;
			run_commitments.strategy = Some(
				self.commit_and_verify(&commitments, &serialized, EncryptionLayer::Strategy)
					.await?,
			);
		}

		// Phase 3: commit the raw query.
		if encryption.applies_to(EncryptionLayer::Query) {
			run_commitments.query = Some(
				self.commit_and_verify(&commitments, query, EncryptionLayer::Query)
					.await?,
			);
		}

		// Phase 4: registration, carts, advisory selection.
		let engaged = self.engage_providers(&mut chain, &intent.id, &budget, query).await?;

		// Phase 5: concurrent purchases; failing providers drop out here.
		let purchased = self.purchase_all(engaged, query).await;

		// Phase 6: escrows and locked payments.
		let escrowed = self
			.open_escrows(&mut chain, &escrows, &encryption, purchased, query)
			.await?;

		// Phase 7: delivery hashes and the quality gate.
		let judged = self.judge_deliveries(&escrows, escrowed).await?;

		// Phase 8: settlement-batch commitment, one call for all providers.
		if encryption.applies_to(EncryptionLayer::Settlement) {
			let batch: Vec<SettlementLine> = judged
				.iter()
				.map(|judged| SettlementLine {
					escrow_id: &judged.escrowed.escrow_id,
					decision: judged.decision,
					score: judged.verdict.score,
				})
				.collect();
			let serialized = serde_json::to_string(&batch)?;
			run_commitments.settlement = Some(
				self.commit_and_verify(&commitments, &serialized, EncryptionLayer::Settlement)
					.await?,
			);
		}

		// Phase 9: settlement and reputation.
		let providers = self.settle_all(&mut chain, &escrows, &run_id, judged).await?;

		// Phase 10: synthesis, chain outcome, receipt.
		let passing: Vec<Delivery> = providers
			.iter()
			.filter(|provider| provider.result.passed)
			.map(|provider| Delivery {
				provider: provider.result.provider.clone(),
				payload: provider.synthesis_input.clone(),
				realized_cost: provider.result.realized_cost,
				protocol_used: provider.result.protocol_used,
				received_at: started_at,
			})
			.collect();
		let synthesis = self.oracles.synthesize(&passing, query).await;
		self.events
			.record(ProcurementEvent::Run(RunEvent::SynthesisReady {
				run_id: run_id.clone(),
			}));

		let paid = providers
			.iter()
			.filter(|provider| provider.result.outcome == SettleOutcome::Paid)
			.count();
		let outcome = if paid > 0 {
			ChainOutcome::Success
		} else if intent.is_expired(Utc::now()) {
			ChainOutcome::Expired
		} else {
			ChainOutcome::Failure
		};
		chain.complete(outcome)?;
		self.events
			.record(ProcurementEvent::Mandate(MandateEvent::ChainCompleted {
				outcome,
			}));
		self.events
			.record(ProcurementEvent::Run(RunEvent::Completed {
				run_id: run_id.clone(),
				outcome,
			}));

		let stats = commitments.stats();
		let totals = self.totals(&providers, stats.count, &run_commitments);
		info!(
			run_id = %run_id,
			paid = totals.providers_paid,
			refunded = totals.providers_refunded,
			?outcome,
			"Procurement run complete"
		);

		Ok(Receipt {
			id: run_id,
			query: query.to_string(),
			started_at,
			duration_ms: clock.elapsed().as_millis() as u64,
			encryption,
			commitments: run_commitments,
			commitment_stats: stats,
			providers: providers.into_iter().map(|p| p.result).collect(),
			synthesis,
			chain: chain.snapshot(),
			totals,
		})
	}

	fn timing(&self) -> CommitmentTiming {
		CommitmentTiming {
			poll_interval: Duration::from_millis(self.config.commitment.poll_interval_ms),
			max_attempts: self.config.commitment.max_attempts,
			timeout: Duration::from_secs(self.config.commitment.timeout_secs),
		}
	}

	fn payer(&self) -> Option<PayerCredential> {
		if !self.config.broker.pay_per_call {
			return None;
		}
		match (
			&self.config.broker.payer_account,
			&self.config.broker.payer_key,
		) {
			(Some(account), Some(key)) => Some(PayerCredential {
				account: account.clone(),
				key: key.clone(),
			}),
			_ => None,
		}
	}

	/// Commit at a checkpoint, then immediately wait for decrypt-and-verify.
	/// Failures here abort the run: the policy selected this layer, so its
	/// confidentiality is a correctness precondition.
	async fn commit_and_verify(
		&self,
		commitments: &CommitmentService,
		payload: &str,
		layer: EncryptionLayer,
	) -> Result<CommitmentRecord, EngineError> {
		let mut record = commitments.commit(payload, layer).await?;
		let verification = commitments.decrypt_and_verify(&record, payload).await?;
		record.decrypted_at = Some(verification.decrypted_at);
		record.verified = Some(verification.verified);
		Ok(record)
	}

	async fn engage_providers(
		&self,
		chain: &mut MandateChain,
		intent_id: &str,
		budget: &Budget,
		query: &str,
	) -> Result<Vec<Engaged>, EngineError> {
		let candidates: Vec<CandidateProvider> = self
			.config
			.providers
			.iter()
			.map(|entry| CandidateProvider {
				name: entry.name.clone(),
				endpoint: entry.endpoint.clone(),
				category: entry.category.clone(),
			})
			.collect();

		let choices = self
			.oracles
			.select_providers(&candidates, budget, query)
			.await;

		let mut engaged = Vec::with_capacity(candidates.len());
		for candidate in candidates {
			// Registration is bookkeeping; a provider without a handle
			// still runs, it just skips the reputation update later.
			let handle = match self.identity.register(&candidate).await {
				Ok(handle) => Some(handle),
				Err(err) => {
					warn!(provider = %candidate.name, error = %err, "Registration failed");
					None
				}
			};

			let cart = chain.create_cart(
				intent_id,
				&candidate.name,
				vec![LineItem {
					service: candidate.category.clone(),
					price: self.config.escrow.unit_amount,
				}],
				&candidate.endpoint,
			)?;
			self.events
				.record(ProcurementEvent::Mandate(MandateEvent::CartCreated {
					id: cart.id.clone(),
					provider: candidate.name.clone(),
				}));

			let selection_reason = choices
				.iter()
				.find(|choice| choice.name == candidate.name)
				.map(|choice| choice.reason.clone());

			engaged.push(Engaged {
				candidate,
				handle,
				cart_id: cart.id,
				selection_reason,
			});
		}
		Ok(engaged)
	}

	/// Purchases run concurrently, one unit of work per provider. A failed
	/// purchase excludes that provider from every later phase; it never
	/// aborts the run. `join_all` preserves candidate order, so aggregation
	/// stays deterministic regardless of completion interleaving.
	async fn purchase_all(&self, engaged: Vec<Engaged>, query: &str) -> Vec<Purchased> {
		let payer = self.payer();
		let futures = engaged.into_iter().map(|engaged| {
			let payer = payer.clone();
			let events = self.events.clone();
			let purchases = self.purchases.clone();
			let query = query.to_string();
			async move {
				events.record(ProcurementEvent::Purchase(PurchaseEvent::Requested {
					provider: engaged.candidate.name.clone(),
				}));
				match purchases
					.purchase(
						&engaged.candidate.name,
						&engaged.candidate.endpoint,
						&query,
						payer.as_ref(),
					)
					.await
				{
					Ok(delivery) => {
						events.record(ProcurementEvent::Purchase(PurchaseEvent::Delivered {
							provider: engaged.candidate.name.clone(),
							protocol_used: delivery.protocol_used,
						}));
						let delivery_hash = keccak_hex(delivery.payload.as_bytes());
						Some(Purchased {
							engaged,
							delivery,
							delivery_hash,
						})
					}
					Err(err) => {
						events.record(ProcurementEvent::Purchase(PurchaseEvent::Failed {
							provider: engaged.candidate.name.clone(),
							error: err.to_string(),
						}));
						None
					}
				}
			}
		});

		join_all(futures).await.into_iter().flatten().collect()
	}

	async fn open_escrows(
		&self,
		chain: &mut MandateChain,
		escrows: &EscrowAccessor,
		encryption: &agora_types::EncryptionDecision,
		purchased: Vec<Purchased>,
		query: &str,
	) -> Result<Vec<Escrowed>, EngineError> {
		let encrypted = encryption.applies_to(EncryptionLayer::Escrow);
		let mut escrowed = Vec::with_capacity(purchased.len());
		for purchased in purchased {
			let request_hash = keccak_hex(
				format!("{}:{}", query, purchased.engaged.candidate.name).as_bytes(),
			);
			let (escrow_id, _) = escrows
				.create(
					&purchased.engaged.candidate.name,
					&self.config.escrow.token,
					self.config.escrow.unit_amount,
					self.config.escrow.deadline_secs,
					&request_hash,
					encrypted,
				)
				.await?;

			let payment = chain.create_payment(
				&purchased.engaged.cart_id,
				&escrow_id,
				self.config.escrow.unit_amount,
				purchased.delivery.realized_cost,
			)?;
			self.events
				.record(ProcurementEvent::Mandate(MandateEvent::PaymentCreated {
					id: payment.id.clone(),
					escrow_id: escrow_id.clone(),
				}));

			escrowed.push(Escrowed {
				purchased,
				escrow_id,
				payment_id: payment.id,
			});
		}
		Ok(escrowed)
	}

	async fn judge_deliveries(
		&self,
		escrows: &EscrowAccessor,
		escrowed: Vec<Escrowed>,
	) -> Result<Vec<Judged>, EngineError> {
		let threshold = self.config.broker.quality_threshold;
		let mut judged = Vec::with_capacity(escrowed.len());
		for escrowed in escrowed {
			escrows
				.submit_delivery(&escrowed.escrow_id, &escrowed.purchased.delivery_hash)
				.await?;

			let verdict = self
				.oracles
				.score(
					&escrowed.purchased.delivery.payload,
					&escrowed.purchased.engaged.candidate.name,
					threshold,
					Some(&escrowed.purchased.engaged.candidate.category),
				)
				.await;
			let decision = if verdict.passed {
				SettleOutcome::Paid
			} else {
				SettleOutcome::Refunded
			};
			info!(
				provider = %escrowed.purchased.engaged.candidate.name,
				score = verdict.score,
				passed = verdict.passed,
				"Quality gate decided"
			);

			judged.push(Judged {
				escrowed,
				verdict,
				decision,
			});
		}
		Ok(judged)
	}

	async fn settle_all(
		&self,
		chain: &mut MandateChain,
		escrows: &EscrowAccessor,
		run_id: &str,
		judged: Vec<Judged>,
	) -> Result<Vec<SettledProvider>, EngineError> {
		let mut settled = Vec::with_capacity(judged.len());
		for judged in judged {
			let (outcome, reference) = escrows
				.settle(
					&judged.escrowed.escrow_id,
					judged.decision,
					&judged.escrowed.purchased.delivery_hash,
				)
				.await?;

			chain.settle_payment(
				&judged.escrowed.payment_id,
				outcome,
				Some(reference.clone()),
			)?;
			let payment_status = chain
				.payment(&judged.escrowed.payment_id)
				.map(|payment| payment.status);
			if let Some(status) = payment_status {
				self.events
					.record(ProcurementEvent::Mandate(MandateEvent::PaymentSettled {
						id: judged.escrowed.payment_id.clone(),
						status,
					}));
			}

			let reputation_delta = match outcome {
				SettleOutcome::Paid => 1,
				SettleOutcome::Refunded => -1,
			};
			if let Some(handle) = judged.escrowed.purchased.engaged.handle {
				let tags = vec![
					format!("run:{}", run_id),
					match outcome {
						SettleOutcome::Paid => "paid".to_string(),
						SettleOutcome::Refunded => "refunded".to_string(),
					},
				];
				if let Err(err) = self
					.identity
					.submit_reputation(handle, reputation_delta, &tags)
					.await
				{
					warn!(handle, error = %err, "Reputation submission failed");
				}
			}

			let purchased = judged.escrowed.purchased;
			settled.push(SettledProvider {
				synthesis_input: purchased.delivery.payload.clone(),
				result: ProviderResult {
					provider: purchased.engaged.candidate.name.clone(),
					handle: purchased.engaged.handle,
					cart_id: purchased.engaged.cart_id,
					payment_id: judged.escrowed.payment_id,
					escrow_id: judged.escrowed.escrow_id,
					score: judged.verdict.score,
					passed: judged.verdict.passed,
					decision: judged.decision,
					outcome,
					settlement_ref: Some(reference),
					reputation_delta,
					realized_cost: purchased.delivery.realized_cost,
					protocol_used: purchased.delivery.protocol_used,
					selection_reason: purchased.engaged.selection_reason,
				},
			});
		}
		Ok(settled)
	}

	fn totals(
		&self,
		providers: &[SettledProvider],
		encryption_count: u64,
		run_commitments: &RunCommitments,
	) -> RunTotals {
		let unit = self.config.escrow.unit_amount;
		let paid = providers
			.iter()
			.filter(|p| p.result.outcome == SettleOutcome::Paid)
			.count();
		let refunded = providers.len() - paid;
		let commit_message_count = [
			run_commitments.strategy.is_some(),
			run_commitments.query.is_some(),
			run_commitments.settlement.is_some(),
		]
		.iter()
		.filter(|present| **present)
		.count() as u64;

		RunTotals {
			paid_amount: unit * Decimal::from(paid as u64),
			refunded_amount: unit * Decimal::from(refunded as u64),
			providers_paid: paid as u32,
			providers_refunded: refunded as u32,
			encryption_count,
			commit_message_count,
			protocol_usage_count: providers
				.iter()
				.filter(|p| p.result.protocol_used)
				.count() as u32,
			escrows_created: providers.len() as u32,
		}
	}
}

/// Provider result plus the payload synthesis needs, kept out of the
/// receipt itself.
struct SettledProvider {
	synthesis_input: String,
	result: ProviderResult,
}
