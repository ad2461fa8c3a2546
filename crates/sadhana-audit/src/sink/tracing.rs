// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Console sink: renders each event as a `tracing` event.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::Level;

use crate::error::AuditSinkError;
use crate::event::{AuditEvent, AuditSeverity};
use crate::sink::AuditSink;

/// Target every audit event is emitted under, so subscribers can route the
/// trail separately from diagnostics.
pub const AUDIT_TARGET: &str = "sadhana_audit";

#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl TracingAuditSink {
	pub fn new() -> Self {
		Self
	}
}

pub fn level_for(severity: AuditSeverity) -> Level {
	match severity {
		AuditSeverity::Low | AuditSeverity::Medium => Level::INFO,
		AuditSeverity::High => Level::WARN,
		AuditSeverity::Critical => Level::ERROR,
	}
}

macro_rules! emit {
	($level:ident, $event:expr) => {
		tracing::$level!(
			target: AUDIT_TARGET,
			audit_id = %$event.id,
			event_type = %$event.event_type,
			severity = $event.severity.level(),
			status = %$event.status,
			user_id = $event.user_id.as_deref(),
			ip_address = $event.ip_address.as_deref(),
			resource = $event.resource.as_deref(),
			flagged = $event.flagged,
			suspicious_reason = $event.suspicious_reason.as_deref(),
			"{}",
			$event.description
		)
	};
}

#[async_trait]
impl AuditSink for TracingAuditSink {
	fn name(&self) -> &str {
		"console"
	}

	async fn publish(&self, event: Arc<AuditEvent>) -> Result<(), AuditSinkError> {
		match level_for(event.severity) {
			Level::ERROR => emit!(error, event),
			Level::WARN => emit!(warn, event),
			_ => emit!(info, event),
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::event::{normalize, AuditDetails, AuditEventType};
	use chrono::Utc;

	#[test]
	fn test_severity_level_mapping() {
		assert_eq!(level_for(AuditSeverity::Low), Level::INFO);
		assert_eq!(level_for(AuditSeverity::Medium), Level::INFO);
		assert_eq!(level_for(AuditSeverity::High), Level::WARN);
		assert_eq!(level_for(AuditSeverity::Critical), Level::ERROR);
	}

	#[tokio::test]
	async fn test_publish_never_fails() {
		let sink = TracingAuditSink::new();
		for severity in AuditSeverity::all() {
			let event = normalize(
				AuditEventType::SystemWarning,
				AuditDetails::new().severity(*severity).description("disk almost full"),
				Utc::now(),
			);
			assert!(sink.publish(Arc::new(event)).await.is_ok());
		}
		assert_eq!(sink.name(), "console");
	}
}
