// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit pipeline configuration section.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

const DEFAULT_LOGS_DIRECTORY: &str = "logs/audit";
const DEFAULT_MAX_LOG_SIZE: u64 = 100 * 1024 * 1024;
const DEFAULT_RETENTION_DAYS: i64 = 365;
/// Upper bound on `retention_days`; keeps the retention cutoff representable.
pub const MAX_RETENTION_DAYS: i64 = 100 * 365;
const DEFAULT_MAX_QUEUE_SIZE: usize = 10_000;
const DEFAULT_SINK_QUEUE_CAPACITY: usize = 10_000;
const DEFAULT_NOTIFY_CAPACITY: usize = 1024;

const DEFAULT_FAILED_LOGIN_ATTEMPTS: usize = 5;
const DEFAULT_FAILED_LOGIN_WINDOW_SECS: u64 = 15 * 60;
const DEFAULT_RAPID_DATA_ACCESS: usize = 100;
const DEFAULT_RAPID_ACCESS_WINDOW_SECS: u64 = 60;
const DEFAULT_MAX_TRACKED_KEYS: usize = 10_000;

/// What a sink worker does when its queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueueOverflowPolicy {
	#[default]
	DropNewest,
	Block,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SuspiciousActivityLayer {
	pub failed_login_attempts: Option<usize>,
	pub failed_login_window_secs: Option<u64>,
	pub rapid_data_access: Option<usize>,
	pub rapid_access_window_secs: Option<u64>,
	pub unusual_time_access: Option<bool>,
	pub unusual_hours_utc_offset_minutes: Option<i32>,
	pub max_tracked_keys: Option<usize>,
}

impl SuspiciousActivityLayer {
	pub fn merge(&mut self, other: Self) {
		if other.failed_login_attempts.is_some() {
			self.failed_login_attempts = other.failed_login_attempts;
		}
		if other.failed_login_window_secs.is_some() {
			self.failed_login_window_secs = other.failed_login_window_secs;
		}
		if other.rapid_data_access.is_some() {
			self.rapid_data_access = other.rapid_data_access;
		}
		if other.rapid_access_window_secs.is_some() {
			self.rapid_access_window_secs = other.rapid_access_window_secs;
		}
		if other.unusual_time_access.is_some() {
			self.unusual_time_access = other.unusual_time_access;
		}
		if other.unusual_hours_utc_offset_minutes.is_some() {
			self.unusual_hours_utc_offset_minutes = other.unusual_hours_utc_offset_minutes;
		}
		if other.max_tracked_keys.is_some() {
			self.max_tracked_keys = other.max_tracked_keys;
		}
	}

	pub fn finalize(self) -> SuspiciousActivityConfig {
		let defaults = SuspiciousActivityConfig::default();
		SuspiciousActivityConfig {
			failed_login_attempts: self
				.failed_login_attempts
				.unwrap_or(defaults.failed_login_attempts),
			failed_login_window_secs: self
				.failed_login_window_secs
				.unwrap_or(defaults.failed_login_window_secs),
			rapid_data_access: self.rapid_data_access.unwrap_or(defaults.rapid_data_access),
			rapid_access_window_secs: self
				.rapid_access_window_secs
				.unwrap_or(defaults.rapid_access_window_secs),
			unusual_time_access: self
				.unusual_time_access
				.unwrap_or(defaults.unusual_time_access),
			unusual_hours_utc_offset_minutes: self.unusual_hours_utc_offset_minutes,
			max_tracked_keys: self.max_tracked_keys.unwrap_or(defaults.max_tracked_keys),
		}
	}
}

/// Thresholds for the sliding-window heuristics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuspiciousActivityConfig {
	pub failed_login_attempts: usize,
	pub failed_login_window_secs: u64,
	/// Reads per window above which access is considered rapid.
	pub rapid_data_access: usize,
	pub rapid_access_window_secs: u64,
	pub unusual_time_access: bool,
	/// Offset used to compute the "local" hour. `None` means the host offset.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub unusual_hours_utc_offset_minutes: Option<i32>,
	pub max_tracked_keys: usize,
}

impl Default for SuspiciousActivityConfig {
	fn default() -> Self {
		Self {
			failed_login_attempts: DEFAULT_FAILED_LOGIN_ATTEMPTS,
			failed_login_window_secs: DEFAULT_FAILED_LOGIN_WINDOW_SECS,
			rapid_data_access: DEFAULT_RAPID_DATA_ACCESS,
			rapid_access_window_secs: DEFAULT_RAPID_ACCESS_WINDOW_SECS,
			unusual_time_access: true,
			unusual_hours_utc_offset_minutes: None,
			max_tracked_keys: DEFAULT_MAX_TRACKED_KEYS,
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuditConfigLayer {
	pub logs_directory: Option<PathBuf>,
	pub max_log_size: Option<u64>,
	pub retention_days: Option<i64>,
	pub enable_console: Option<bool>,
	pub enable_file: Option<bool>,
	pub enable_database: Option<bool>,
	pub max_queue_size: Option<usize>,
	pub sink_queue_capacity: Option<usize>,
	pub sink_overflow_policy: Option<QueueOverflowPolicy>,
	pub notify_capacity: Option<usize>,
	pub suspicious_activity: Option<SuspiciousActivityLayer>,
}

impl AuditConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.logs_directory.is_some() {
			self.logs_directory = other.logs_directory;
		}
		if other.max_log_size.is_some() {
			self.max_log_size = other.max_log_size;
		}
		if other.retention_days.is_some() {
			self.retention_days = other.retention_days;
		}
		if other.enable_console.is_some() {
			self.enable_console = other.enable_console;
		}
		if other.enable_file.is_some() {
			self.enable_file = other.enable_file;
		}
		if other.enable_database.is_some() {
			self.enable_database = other.enable_database;
		}
		if other.max_queue_size.is_some() {
			self.max_queue_size = other.max_queue_size;
		}
		if other.sink_queue_capacity.is_some() {
			self.sink_queue_capacity = other.sink_queue_capacity;
		}
		if other.sink_overflow_policy.is_some() {
			self.sink_overflow_policy = other.sink_overflow_policy;
		}
		if other.notify_capacity.is_some() {
			self.notify_capacity = other.notify_capacity;
		}
		match (&mut self.suspicious_activity, other.suspicious_activity) {
			(Some(base), Some(overlay)) => base.merge(overlay),
			(slot @ None, Some(overlay)) => *slot = Some(overlay),
			(_, None) => {}
		}
	}

	pub fn finalize(self) -> AuditConfig {
		AuditConfig {
			logs_directory: self
				.logs_directory
				.unwrap_or_else(|| PathBuf::from(DEFAULT_LOGS_DIRECTORY)),
			max_log_size: self.max_log_size.unwrap_or(DEFAULT_MAX_LOG_SIZE),
			retention_days: self.retention_days.unwrap_or(DEFAULT_RETENTION_DAYS),
			enable_console: self.enable_console.unwrap_or(true),
			enable_file: self.enable_file.unwrap_or(true),
			enable_database: self.enable_database.unwrap_or(false),
			max_queue_size: self.max_queue_size.unwrap_or(DEFAULT_MAX_QUEUE_SIZE),
			sink_queue_capacity: self
				.sink_queue_capacity
				.unwrap_or(DEFAULT_SINK_QUEUE_CAPACITY),
			sink_overflow_policy: self.sink_overflow_policy.unwrap_or_default(),
			notify_capacity: self.notify_capacity.unwrap_or(DEFAULT_NOTIFY_CAPACITY),
			suspicious_activity: self.suspicious_activity.unwrap_or_default().finalize(),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditConfig {
	pub logs_directory: PathBuf,
	/// Size in bytes past which the current day file is rotated.
	pub max_log_size: u64,
	pub retention_days: i64,
	pub enable_console: bool,
	pub enable_file: bool,
	pub enable_database: bool,
	pub max_queue_size: usize,
	pub sink_queue_capacity: usize,
	pub sink_overflow_policy: QueueOverflowPolicy,
	pub notify_capacity: usize,
	pub suspicious_activity: SuspiciousActivityConfig,
}

impl Default for AuditConfig {
	fn default() -> Self {
		AuditConfigLayer::default().finalize()
	}
}

impl AuditConfig {
	/// Checks the numeric invariants the pipeline depends on.
	pub fn validate(&self) -> Result<(), String> {
		if self.max_queue_size == 0 {
			return Err("max_queue_size must be greater than zero".to_string());
		}
		if self.max_log_size == 0 {
			return Err("max_log_size must be greater than zero".to_string());
		}
		if self.retention_days <= 0 {
			return Err("retention_days must be greater than zero".to_string());
		}
		if self.retention_days > MAX_RETENTION_DAYS {
			return Err(format!(
				"retention_days must be at most {MAX_RETENTION_DAYS}, got {}",
				self.retention_days
			));
		}
		if self.sink_queue_capacity == 0 {
			return Err("sink_queue_capacity must be greater than zero".to_string());
		}
		if self.notify_capacity == 0 {
			return Err("notify_capacity must be greater than zero".to_string());
		}
		if self.suspicious_activity.failed_login_attempts == 0 {
			return Err("suspicious_activity.failed_login_attempts must be greater than zero".to_string());
		}
		if let Some(offset) = self.suspicious_activity.unusual_hours_utc_offset_minutes {
			if offset.abs() >= 24 * 60 {
				return Err(format!(
					"suspicious_activity.unusual_hours_utc_offset_minutes out of range: {offset}"
				));
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_values() {
		let config = AuditConfig::default();
		assert_eq!(config.logs_directory, PathBuf::from("logs/audit"));
		assert_eq!(config.max_log_size, 100 * 1024 * 1024);
		assert_eq!(config.retention_days, 365);
		assert!(config.enable_console);
		assert!(config.enable_file);
		assert!(!config.enable_database);
		assert_eq!(config.max_queue_size, 10_000);
		assert_eq!(config.sink_overflow_policy, QueueOverflowPolicy::DropNewest);
		assert_eq!(config.suspicious_activity.failed_login_attempts, 5);
		assert_eq!(config.suspicious_activity.failed_login_window_secs, 900);
		assert_eq!(config.suspicious_activity.rapid_data_access, 100);
		assert_eq!(config.suspicious_activity.rapid_access_window_secs, 60);
		assert!(config.suspicious_activity.unusual_time_access);
		assert!(config.validate().is_ok());
	}

	#[test]
	fn test_layer_finalize_with_values() {
		let layer = AuditConfigLayer {
			logs_directory: Some(PathBuf::from("/var/log/sadhana")),
			max_log_size: Some(4096),
			retention_days: Some(30),
			enable_console: Some(false),
			max_queue_size: Some(3),
			suspicious_activity: Some(SuspiciousActivityLayer {
				failed_login_attempts: Some(3),
				unusual_time_access: Some(false),
				..Default::default()
			}),
			..Default::default()
		};
		let config = layer.finalize();
		assert_eq!(config.logs_directory, PathBuf::from("/var/log/sadhana"));
		assert_eq!(config.max_log_size, 4096);
		assert_eq!(config.retention_days, 30);
		assert!(!config.enable_console);
		assert!(config.enable_file);
		assert_eq!(config.max_queue_size, 3);
		assert_eq!(config.suspicious_activity.failed_login_attempts, 3);
		assert_eq!(config.suspicious_activity.failed_login_window_secs, 900);
		assert!(!config.suspicious_activity.unusual_time_access);
	}

	#[test]
	fn test_merge_overwrites() {
		let mut base = AuditConfigLayer {
			retention_days: Some(90),
			enable_file: Some(true),
			suspicious_activity: Some(SuspiciousActivityLayer {
				failed_login_attempts: Some(10),
				..Default::default()
			}),
			..Default::default()
		};
		let overlay = AuditConfigLayer {
			enable_file: Some(false),
			max_queue_size: Some(500),
			suspicious_activity: Some(SuspiciousActivityLayer {
				rapid_data_access: Some(20),
				..Default::default()
			}),
			..Default::default()
		};
		base.merge(overlay);
		assert_eq!(base.retention_days, Some(90));
		assert_eq!(base.enable_file, Some(false));
		assert_eq!(base.max_queue_size, Some(500));
		let thresholds = base.suspicious_activity.unwrap();
		assert_eq!(thresholds.failed_login_attempts, Some(10));
		assert_eq!(thresholds.rapid_data_access, Some(20));
	}

	#[test]
	fn test_validate_rejects_zero_queue() {
		let config = AuditConfig {
			max_queue_size: 0,
			..Default::default()
		};
		assert!(config.validate().unwrap_err().contains("max_queue_size"));
	}

	#[test]
	fn test_validate_bounds_retention_days() {
		let config = AuditConfig {
			retention_days: i64::MAX / 2,
			..Default::default()
		};
		assert!(config.validate().unwrap_err().contains("retention_days"));

		let config = AuditConfig {
			retention_days: MAX_RETENTION_DAYS,
			..Default::default()
		};
		assert!(config.validate().is_ok());
	}

	#[test]
	fn test_validate_rejects_bad_offset() {
		let mut config = AuditConfig::default();
		config.suspicious_activity.unusual_hours_utc_offset_minutes = Some(24 * 60);
		assert!(config.validate().is_err());
	}

	#[test]
	fn test_overflow_policy_serde() {
		let drop_newest: QueueOverflowPolicy = serde_json::from_str(r#""drop_newest""#).unwrap();
		assert_eq!(drop_newest, QueueOverflowPolicy::DropNewest);

		let block: QueueOverflowPolicy = serde_json::from_str(r#""block""#).unwrap();
		assert_eq!(block, QueueOverflowPolicy::Block);
	}

	#[test]
	fn test_deserialize_layer_partial() {
		let toml_str = r#"
max_queue_size = 250

[suspicious_activity]
failed_login_attempts = 7
"#;
		let layer: AuditConfigLayer = toml::from_str(toml_str).unwrap();
		assert_eq!(layer.max_queue_size, Some(250));
		assert!(layer.logs_directory.is_none());
		let config = layer.finalize();
		assert_eq!(config.suspicious_activity.failed_login_attempts, 7);
		assert_eq!(config.suspicious_activity.rapid_data_access, 100);
	}

	#[test]
	fn test_toml_roundtrip() {
		let config = AuditConfig {
			retention_days: 60,
			max_queue_size: 5000,
			sink_overflow_policy: QueueOverflowPolicy::Block,
			..Default::default()
		};
		let toml_str = toml::to_string(&config).unwrap();
		let parsed: AuditConfig = toml::from_str(&toml_str).unwrap();
		assert_eq!(config, parsed);
	}
}
