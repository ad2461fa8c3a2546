// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit trail for Sadhana: normalizes application events, flags suspicious
//! patterns, keeps a bounded queue for live queries and writes a rotated
//! NDJSON trail to disk.
//!
//! ```no_run
//! # async fn run() -> Result<(), sadhana_audit::AuditError> {
//! use sadhana_audit::{AuditConfig, AuditDetails, AuditEventType, AuditQuery, AuditService};
//!
//! let service = AuditService::from_config(AuditConfig::default())?;
//! service.log(AuditEventType::AuthLogin, AuditDetails::new().user_id("u1"));
//! let page = service.get_logs(&AuditQuery::new().limit(10))?;
//! assert_eq!(page.total, 1);
//! service.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod detector;
pub mod error;
pub mod event;
pub mod export;
pub mod pipeline;
pub mod producers;
pub mod queue;
pub mod report;
pub mod retention;
pub mod sink;

pub use clock::{Clock, ManualClock, SystemClock};
pub use detector::SuspiciousActivityDetector;
pub use error::{AuditError, AuditResult, AuditSinkError};
pub use event::{
	normalize, AuditDetails, AuditEvent, AuditEventType, AuditSeverity, AuditStatus, ErrorInfo,
	Metadata,
};
pub use export::{ExportFormat, ExportOutput, EXPORT_LIMIT};
pub use pipeline::{AuditService, AuditServiceBuilder};
pub use producers::{classify_response, DataAction, RequestRecord};
pub use queue::{AuditQuery, AuditQueryParams, EventQueue, QueryPage, DEFAULT_QUERY_LIMIT};
pub use report::{DataOperations, StatsReport, SuspiciousActivities, UserActivityReport};
pub use retention::CleanupReport;
pub use sink::AuditSink;

pub use sadhana_audit_config::{AuditConfig, QueueOverflowPolicy, SuspiciousActivityConfig};

#[cfg(feature = "sink-file")]
pub use sink::file::FileAuditSink;

#[cfg(feature = "sink-sqlite")]
pub use sink::sqlite::SqliteAuditSink;

#[cfg(feature = "sink-tracing")]
pub use sink::tracing::TracingAuditSink;
