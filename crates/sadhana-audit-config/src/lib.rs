// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for the Sadhana audit pipeline.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Validation of the numeric limits the pipeline relies on
//! - Consistent environment variable naming (`SADHANA_AUDIT_*`, `SADHANA_LOG_*`)
//!
//! # Usage
//!
//! ```ignore
//! use sadhana_audit_config::load_config;
//!
//! let config = load_config()?;
//! println!("audit files in {}", config.audit.logs_directory.display());
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::SadhanaConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use serde::Serialize;
use tracing::{debug, info};

/// Fully resolved configuration.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SadhanaConfig {
	pub audit: AuditConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`SADHANA_AUDIT_*`)
/// 2. Config file (`/etc/sadhana/audit.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<SadhanaConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<SadhanaConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<SadhanaConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = SadhanaConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: SadhanaConfigLayer) -> Result<SadhanaConfig, ConfigError> {
	let audit = layer.audit.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	audit.validate().map_err(ConfigError::Validation)?;

	info!(
		logs_directory = %audit.logs_directory.display(),
		max_queue_size = audit.max_queue_size,
		retention_days = audit.retention_days,
		console = audit.enable_console,
		file = audit.enable_file,
		database = audit.enable_database,
		"Audit configuration loaded"
	);

	Ok(SadhanaConfig { audit, logging })
}
