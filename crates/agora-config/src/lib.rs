//! Configuration for the agora broker.

pub mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("Failed to read configuration file: {0}")]
	Io(#[from] std::io::Error),

	#[error("Failed to parse configuration: {0}")]
	Parse(#[from] toml::de::Error),

	#[error("Invalid configuration: {0}")]
	Invalid(String),
}
