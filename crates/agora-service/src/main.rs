use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use agora_commitment::implementations::memory::InMemoryVault;
use agora_config::{ConfigLoader, ProcurementConfig};
use agora_core::EngineBuilder;
use agora_identity::implementations::local::LocalRegistry;
use agora_ledger::implementations::memory::InMemoryLedger;
use agora_oracles::implementations::heuristic::{
	BudgetSelection, ExtractiveSynthesis, KeywordPolicy, LexicalQuality,
};
use agora_oracles::OracleSuite;
use agora_purchase::implementations::http::HttpPurchase;

#[derive(Parser)]
#[command(name = "agora")]
#[command(about = "Agora procurement broker", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	#[arg(short, long, value_name = "FILE", default_value = "config/local.toml")]
	config: PathBuf,

	#[arg(long, env = "AGORA_LOG", default_value = "info")]
	log_level: String,
}

#[derive(Subcommand)]
enum Commands {
	/// Run one procurement for the given query
	Run {
		/// The analytical question to procure answers for
		query: String,
	},
	/// Validate the configuration file
	Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();
	setup_tracing(&cli.log_level);

	match cli.command {
		Commands::Run { query } => run(cli.config, &query).await,
		Commands::Validate => validate(cli.config).await,
	}
}

fn setup_tracing(level: &str) {
	let filter = tracing_subscriber::EnvFilter::try_new(level)
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
	tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(config_path: PathBuf, query: &str) -> Result<()> {
	let config = load(config_path).await?;
	let engine = build_engine(config)?;

	let receipt = engine
		.run(query)
		.await
		.context("Procurement run failed")?;

	println!("{}", serde_json::to_string_pretty(&receipt)?);
	Ok(())
}

async fn validate(config_path: PathBuf) -> Result<()> {
	let config = load(config_path).await?;
	info!(
		providers = config.providers.len(),
		budget = %config.broker.budget_amount,
		"Configuration is valid"
	);
	Ok(())
}

async fn load(config_path: PathBuf) -> Result<ProcurementConfig> {
	info!(path = %config_path.display(), "Loading configuration");
	ConfigLoader::new()
		.with_file(&config_path)
		.load()
		.await
		.context("Failed to load configuration")
}

fn build_engine(config: ProcurementConfig) -> Result<agora_core::ProcurementEngine> {
	let unit_amount = config.escrow.unit_amount;
	let grace = config.escrow.grace_multiplier;

	let oracles = OracleSuite::new(
		Arc::new(KeywordPolicy),
		Arc::new(BudgetSelection::new(unit_amount)),
		Arc::new(LexicalQuality),
		Arc::new(ExtractiveSynthesis),
	);

	EngineBuilder::new(config)
		.with_vault(Arc::new(InMemoryVault::new()))
		.with_ledger(Arc::new(InMemoryLedger::new(grace)))
		.with_market(Arc::new(HttpPurchase::new()))
		.with_identity(Arc::new(LocalRegistry::new()))
		.with_oracles(oracles)
		.build()
		.context("Failed to build procurement engine")
}
