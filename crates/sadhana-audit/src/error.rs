// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use thiserror::Error;

pub type AuditResult<T> = Result<T, AuditError>;

#[derive(Error, Debug)]
pub enum AuditError {
	#[error("invalid query parameter '{field}': {message}")]
	InvalidQuery { field: &'static str, message: String },

	#[error("configuration error: {0}")]
	ConfigError(String),

	#[error("logs directory {path} is not usable: {source}")]
	LogsDirectory {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("export failed: {0}")]
	Export(String),
}

impl AuditError {
	pub(crate) fn invalid_query(field: &'static str, message: impl Into<String>) -> Self {
		AuditError::InvalidQuery {
			field,
			message: message.into(),
		}
	}
}

#[derive(Error, Debug)]
pub enum AuditSinkError {
	#[error("transient error: {0}")]
	Transient(String),

	#[error("permanent error: {0}")]
	Permanent(String),
}
