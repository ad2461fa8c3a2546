// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::SadhanaConfigLayer;
use crate::sections::{
	AuditConfigLayer, LogFormat, LoggingConfigLayer, QueueOverflowPolicy, SuspiciousActivityLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<SadhanaConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<SadhanaConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(SadhanaConfigLayer::default())
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/sadhana/audit.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<SadhanaConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(SadhanaConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: SadhanaConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: SADHANA_AUDIT_<FIELD>, thresholds under SADHANA_AUDIT_SUSPICIOUS_<FIELD>.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<SadhanaConfigLayer, ConfigError> {
		debug!("loading environment variables");
		let lookup = |name: &str| std::env::var(name).ok();
		Ok(SadhanaConfigLayer {
			audit: Some(load_audit_from(&lookup)?),
			logging: Some(load_logging_from(&lookup)?),
		})
	}
}

struct Env<'a> {
	lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Env<'_> {
	fn var(&self, name: &str) -> Option<String> {
		(self.lookup)(name).filter(|s| !s.is_empty())
	}

	fn bool(&self, name: &str) -> Option<bool> {
		self.var(name)
			.map(|v| v.eq_ignore_ascii_case("true") || v == "1")
	}

	fn parse<T: FromStr>(&self, name: &str, kind: &str) -> Result<Option<T>, ConfigError> {
		match self.var(name) {
			Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid {kind} value '{v}'"),
			}),
			None => Ok(None),
		}
	}
}

pub(crate) fn load_audit_from(
	lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<AuditConfigLayer, ConfigError> {
	let env = Env { lookup };

	let sink_overflow_policy = match env.var("SADHANA_AUDIT_SINK_OVERFLOW_POLICY") {
		Some(v) => Some(match v.to_ascii_lowercase().as_str() {
			"drop_newest" => QueueOverflowPolicy::DropNewest,
			"block" => QueueOverflowPolicy::Block,
			other => {
				return Err(ConfigError::InvalidValue {
					key: "SADHANA_AUDIT_SINK_OVERFLOW_POLICY".to_string(),
					message: format!("expected drop_newest or block, got '{other}'"),
				})
			}
		}),
		None => None,
	};

	Ok(AuditConfigLayer {
		logs_directory: env.var("SADHANA_AUDIT_LOGS_DIRECTORY").map(PathBuf::from),
		max_log_size: env.parse("SADHANA_AUDIT_MAX_LOG_SIZE", "u64")?,
		retention_days: env.parse("SADHANA_AUDIT_RETENTION_DAYS", "i64")?,
		enable_console: env.bool("SADHANA_AUDIT_ENABLE_CONSOLE"),
		enable_file: env.bool("SADHANA_AUDIT_ENABLE_FILE"),
		enable_database: env.bool("SADHANA_AUDIT_ENABLE_DATABASE"),
		max_queue_size: env.parse("SADHANA_AUDIT_MAX_QUEUE_SIZE", "usize")?,
		sink_queue_capacity: env.parse("SADHANA_AUDIT_SINK_QUEUE_CAPACITY", "usize")?,
		sink_overflow_policy,
		notify_capacity: env.parse("SADHANA_AUDIT_NOTIFY_CAPACITY", "usize")?,
		suspicious_activity: Some(SuspiciousActivityLayer {
			failed_login_attempts: env
				.parse("SADHANA_AUDIT_SUSPICIOUS_FAILED_LOGIN_ATTEMPTS", "usize")?,
			failed_login_window_secs: env
				.parse("SADHANA_AUDIT_SUSPICIOUS_FAILED_LOGIN_WINDOW_SECS", "u64")?,
			rapid_data_access: env.parse("SADHANA_AUDIT_SUSPICIOUS_RAPID_DATA_ACCESS", "usize")?,
			rapid_access_window_secs: env
				.parse("SADHANA_AUDIT_SUSPICIOUS_RAPID_ACCESS_WINDOW_SECS", "u64")?,
			unusual_time_access: env.bool("SADHANA_AUDIT_SUSPICIOUS_UNUSUAL_TIME_ACCESS"),
			unusual_hours_utc_offset_minutes: env
				.parse("SADHANA_AUDIT_SUSPICIOUS_UTC_OFFSET_MINUTES", "i32")?,
			max_tracked_keys: env.parse("SADHANA_AUDIT_SUSPICIOUS_MAX_TRACKED_KEYS", "usize")?,
		}),
	})
}

pub(crate) fn load_logging_from(
	lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<LoggingConfigLayer, ConfigError> {
	let env = Env { lookup };

	let format = match env.var("SADHANA_LOG_FORMAT") {
		Some(v) if v.eq_ignore_ascii_case("json") => Some(LogFormat::Json),
		Some(v) if v.eq_ignore_ascii_case("pretty") => Some(LogFormat::Pretty),
		Some(v) => {
			return Err(ConfigError::InvalidValue {
				key: "SADHANA_LOG_FORMAT".to_string(),
				message: format!("expected json or pretty, got '{v}'"),
			})
		}
		None => None,
	};

	Ok(LoggingConfigLayer {
		level: env.var("SADHANA_LOG_LEVEL"),
		format,
	})
}
