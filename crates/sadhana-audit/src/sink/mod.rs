// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Destinations that persist or display finalized audit events.

use std::sync::Arc;

use async_trait::async_trait;

pub use crate::error::AuditSinkError;
use crate::event::AuditEvent;

#[cfg(feature = "sink-file")]
pub mod file;
#[cfg(feature = "sink-sqlite")]
pub mod sqlite;
#[cfg(feature = "sink-tracing")]
pub mod tracing;

/// A destination for audit events.
///
/// Each sink is driven by its own worker task, so `publish` is never called
/// concurrently for the same sink. Errors are logged by the worker and the
/// event is dropped for that sink.
#[async_trait]
pub trait AuditSink: Send + Sync {
	fn name(&self) -> &str;

	async fn publish(&self, event: Arc<AuditEvent>) -> Result<(), AuditSinkError>;

	async fn health_check(&self) -> Result<(), AuditSinkError> {
		Ok(())
	}
}
