// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration layer for merging from multiple sources.

use serde::Deserialize;

use crate::sections::{AuditConfigLayer, LoggingConfigLayer};

/// Top-level configuration layer - all fields are Option for merging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SadhanaConfigLayer {
	#[serde(default)]
	pub audit: Option<AuditConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl SadhanaConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: SadhanaConfigLayer) {
		merge_option(&mut self.audit, other.audit, AuditConfigLayer::merge);
		merge_option(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_option<T>(target: &mut Option<T>, source: Option<T>, merge_fn: fn(&mut T, T)) {
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_merge_fills_missing_sections() {
		let mut base = SadhanaConfigLayer::default();
		let overlay = SadhanaConfigLayer {
			audit: Some(AuditConfigLayer {
				max_queue_size: Some(42),
				..Default::default()
			}),
			logging: None,
		};
		base.merge(overlay);
		assert_eq!(base.audit.unwrap().max_queue_size, Some(42));
		assert!(base.logging.is_none());
	}

	#[test]
	fn test_deserialize_full_file() {
		let toml_str = r#"
[audit]
logs_directory = "/tmp/audit"
enable_database = true

[audit.suspicious_activity]
rapid_data_access = 50

[logging]
level = "debug"
"#;
		let layer: SadhanaConfigLayer = toml::from_str(toml_str).unwrap();
		let audit = layer.audit.unwrap();
		assert_eq!(audit.enable_database, Some(true));
		assert_eq!(
			audit.suspicious_activity.unwrap().rapid_data_access,
			Some(50)
		);
		assert_eq!(layer.logging.unwrap().level, Some("debug".to_string()));
	}
}
