//! Configuration loading and validation.

use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::types::ProcurementConfig;
use crate::ConfigError;

/// Loads broker configuration from a TOML file.
pub struct ConfigLoader {
	path: Option<PathBuf>,
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self { path: None }
	}

	pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
		self.path = Some(path.as_ref().to_path_buf());
		self
	}

	pub async fn load(self) -> Result<ProcurementConfig, ConfigError> {
		let path = self
			.path
			.ok_or_else(|| ConfigError::Invalid("no configuration file given".into()))?;

		let raw = tokio::fs::read_to_string(&path).await?;
		let config: ProcurementConfig = toml::from_str(&raw)?;
		validate(&config)?;
		info!(path = %path.display(), providers = config.providers.len(), "Configuration loaded");
		Ok(config)
	}
}

impl Default for ConfigLoader {
	fn default() -> Self {
		Self::new()
	}
}

fn validate(config: &ProcurementConfig) -> Result<(), ConfigError> {
	if config.providers.is_empty() {
		return Err(ConfigError::Invalid("no providers configured".into()));
	}
	if config.broker.budget_amount <= Decimal::ZERO {
		return Err(ConfigError::Invalid("budget_amount must be positive".into()));
	}
	if !(0.0..=10.0).contains(&config.broker.quality_threshold) {
		return Err(ConfigError::Invalid(
			"quality_threshold must lie in 0..=10".into(),
		));
	}
	if config.escrow.unit_amount <= Decimal::ZERO {
		return Err(ConfigError::Invalid("escrow unit_amount must be positive".into()));
	}
	if config.escrow.deadline_secs <= 0 {
		return Err(ConfigError::Invalid("escrow deadline_secs must be positive".into()));
	}
	if config.broker.pay_per_call
		&& (config.broker.payer_account.is_none() || config.broker.payer_key.is_none())
	{
		return Err(ConfigError::Invalid(
			"pay_per_call requires payer_account and payer_key".into(),
		));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	const VALID: &str = r#"
[broker]
name = "agora-broker"
budget_amount = "5.00"
budget_asset = "USDC"
quality_threshold = 5.0

[escrow]
token = "USDC"
unit_amount = "1.00"

[[providers]]
name = "alpha"
endpoint = "http://localhost:9001/analyze"
category = "macro"

[[providers]]
name = "beta"
endpoint = "http://localhost:9002/analyze"
"#;

	async fn load(contents: &str) -> Result<ProcurementConfig, ConfigError> {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(contents.as_bytes()).unwrap();
		ConfigLoader::new().with_file(file.path()).load().await
	}

	#[tokio::test]
	async fn test_valid_config_with_defaults() {
		let config = load(VALID).await.unwrap();
		assert_eq!(config.providers.len(), 2);
		assert_eq!(config.broker.ttl_secs, 600);
		assert_eq!(config.commitment.max_attempts, 15);
		assert_eq!(config.providers[1].category, "analysis");
	}

	#[tokio::test]
	async fn test_empty_providers_rejected() {
		let trimmed = VALID.split("[[providers]]").next().unwrap();
		let err = load(trimmed).await.unwrap_err();
		assert!(matches!(err, ConfigError::Invalid(_)));
	}

	#[tokio::test]
	async fn test_pay_per_call_requires_credential() {
		let contents = VALID.replace(
			"quality_threshold = 5.0",
			"quality_threshold = 5.0\npay_per_call = true",
		);
		let err = load(&contents).await.unwrap_err();
		assert!(matches!(err, ConfigError::Invalid(_)));
	}

	#[tokio::test]
	async fn test_out_of_range_threshold_rejected() {
		let contents = VALID.replace("quality_threshold = 5.0", "quality_threshold = 11.0");
		let err = load(&contents).await.unwrap_err();
		assert!(matches!(err, ConfigError::Invalid(_)));
	}
}
