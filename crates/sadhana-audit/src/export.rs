// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Download-friendly renderings of a filtered queue view.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::{AuditError, AuditResult};
use crate::pipeline::AuditService;
use crate::queue::AuditQuery;

/// Most records a single export returns.
pub const EXPORT_LIMIT: usize = 10_000;

const CSV_COLUMNS: &[&str] = &[
	"id",
	"timestamp",
	"eventType",
	"severity",
	"userId",
	"username",
	"ipAddress",
	"userAgent",
	"sessionId",
	"resource",
	"action",
	"status",
	"description",
	"metadata",
	"error",
	"flagged",
	"suspiciousReason",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
	#[default]
	Json,
	Csv,
}

impl ExportFormat {
	pub fn extension(&self) -> &'static str {
		match self {
			ExportFormat::Json => "json",
			ExportFormat::Csv => "csv",
		}
	}

	pub fn content_type(&self) -> &'static str {
		match self {
			ExportFormat::Json => "application/json",
			ExportFormat::Csv => "text/csv",
		}
	}
}

impl fmt::Display for ExportFormat {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.extension())
	}
}

impl FromStr for ExportFormat {
	type Err = AuditError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"json" => Ok(ExportFormat::Json),
			"csv" => Ok(ExportFormat::Csv),
			other => Err(AuditError::invalid_query(
				"format",
				format!("expected json or csv, got '{other}'"),
			)),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutput {
	pub content: String,
	pub content_type: &'static str,
	pub filename: String,
	pub records: usize,
}

fn csv_cell(value: Option<&Value>) -> String {
	let raw = match value {
		None | Some(Value::Null) => String::new(),
		Some(Value::String(s)) => s.clone(),
		Some(other) => other.to_string(),
	};
	format!("\"{}\"", raw.replace('"', "\"\""))
}

fn render_csv(records: &[Value]) -> String {
	let mut lines = Vec::with_capacity(records.len() + 1);
	lines.push(CSV_COLUMNS.join(","));
	for record in records {
		let row = CSV_COLUMNS
			.iter()
			.map(|column| csv_cell(record.get(*column)))
			.collect::<Vec<_>>()
			.join(",");
		lines.push(row);
	}
	lines.join("\n")
}

impl AuditService {
	/// Renders up to [`EXPORT_LIMIT`] matching events, newest first.
	///
	/// Pagination in `query` is ignored.
	pub fn export(&self, query: &AuditQuery, format: ExportFormat) -> AuditResult<ExportOutput> {
		let mut query = query.clone();
		query.limit = Some(EXPORT_LIMIT);
		query.offset = None;

		let page = self.queue.query(&query)?;
		let records = page
			.items
			.iter()
			.map(|event| serde_json::to_value(event.as_ref()))
			.collect::<Result<Vec<_>, _>>()
			.map_err(|e| AuditError::Export(format!("failed to serialize event: {e}")))?;

		let content = match format {
			ExportFormat::Json => serde_json::to_string_pretty(&records)
				.map_err(|e| AuditError::Export(format!("failed to render JSON: {e}")))?,
			ExportFormat::Csv => render_csv(&records),
		};

		Ok(ExportOutput {
			content,
			content_type: format.content_type(),
			filename: format!(
				"audit-logs-{}.{}",
				self.clock.now().format("%Y-%m-%d"),
				format.extension()
			),
			records: records.len(),
		})
	}
}
