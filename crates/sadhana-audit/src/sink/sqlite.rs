// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::error::AuditSinkError;
use crate::event::AuditEvent;
use crate::sink::AuditSink;

pub struct SqliteAuditSink {
	pool: SqlitePool,
	name: String,
}

impl SqliteAuditSink {
	pub fn new(pool: SqlitePool) -> Self {
		Self {
			pool,
			name: "sqlite".to_string(),
		}
	}

	/// Creates the `audit_events` table and its indexes if they are missing.
	pub async fn ensure_schema(&self) -> Result<(), AuditSinkError> {
		for statement in [
			r#"
			CREATE TABLE IF NOT EXISTS audit_events (
				id TEXT PRIMARY KEY,
				timestamp TEXT NOT NULL,
				event_type TEXT NOT NULL,
				severity INTEGER NOT NULL,
				user_id TEXT,
				username TEXT,
				ip_address TEXT,
				user_agent TEXT,
				session_id TEXT,
				resource TEXT,
				action TEXT,
				status TEXT NOT NULL,
				description TEXT NOT NULL,
				metadata TEXT NOT NULL,
				error TEXT,
				flagged INTEGER NOT NULL DEFAULT 0,
				suspicious_reason TEXT
			)
			"#,
			"CREATE INDEX IF NOT EXISTS idx_audit_events_timestamp ON audit_events (timestamp)",
			"CREATE INDEX IF NOT EXISTS idx_audit_events_user_id ON audit_events (user_id)",
		] {
			sqlx::query(statement)
				.execute(&self.pool)
				.await
				.map_err(|e| AuditSinkError::Permanent(format!("failed to create schema: {e}")))?;
		}
		Ok(())
	}
}

#[async_trait]
impl AuditSink for SqliteAuditSink {
	fn name(&self) -> &str {
		&self.name
	}

	async fn publish(&self, event: Arc<AuditEvent>) -> Result<(), AuditSinkError> {
		let metadata_json = serde_json::to_string(&event.metadata)
			.map_err(|e| AuditSinkError::Permanent(format!("failed to serialize metadata: {e}")))?;

		let error_json = event
			.error
			.as_ref()
			.map(serde_json::to_string)
			.transpose()
			.map_err(|e| AuditSinkError::Permanent(format!("failed to serialize error: {e}")))?;

		sqlx::query(
			r#"
			INSERT INTO audit_events (
				id, timestamp, event_type, severity, user_id, username,
				ip_address, user_agent, session_id, resource, action,
				status, description, metadata, error, flagged, suspicious_reason
			) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(event.id.to_string())
		.bind(event.timestamp.to_rfc3339())
		.bind(event.event_type.as_str())
		.bind(i64::from(event.severity.level()))
		.bind(&event.user_id)
		.bind(&event.username)
		.bind(&event.ip_address)
		.bind(&event.user_agent)
		.bind(&event.session_id)
		.bind(&event.resource)
		.bind(&event.action)
		.bind(event.status.to_string())
		.bind(&event.description)
		.bind(&metadata_json)
		.bind(&error_json)
		.bind(event.flagged)
		.bind(&event.suspicious_reason)
		.execute(&self.pool)
		.await
		.map_err(|e| {
			if is_transient_error(&e) {
				AuditSinkError::Transient(format!("database error: {e}"))
			} else {
				AuditSinkError::Permanent(format!("database error: {e}"))
			}
		})?;

		Ok(())
	}

	async fn health_check(&self) -> Result<(), AuditSinkError> {
		sqlx::query("SELECT 1")
			.execute(&self.pool)
			.await
			.map_err(|e| AuditSinkError::Transient(format!("health check failed: {e}")))?;
		Ok(())
	}
}

fn is_transient_error(e: &sqlx::Error) -> bool {
	match e {
		sqlx::Error::Io(_) => true,
		sqlx::Error::PoolTimedOut => true,
		sqlx::Error::PoolClosed => true,
		sqlx::Error::Database(db_err) => {
			let msg = db_err.message().to_lowercase();
			msg.contains("busy") || msg.contains("locked") || msg.contains("timeout")
		}
		_ => false,
	}
}
