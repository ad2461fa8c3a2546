// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod audit;
mod logging;

pub use audit::{
	AuditConfig, AuditConfigLayer, QueueOverflowPolicy, SuspiciousActivityConfig,
	SuspiciousActivityLayer, MAX_RETENTION_DAYS,
};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
