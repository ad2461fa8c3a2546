// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bounded in-memory event store backing every live query.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{AuditError, AuditResult};
use crate::event::{AuditEvent, AuditEventType, AuditSeverity};

/// Default page size for queries.
pub const DEFAULT_QUERY_LIMIT: usize = 100;

/// Conjunctive filter over queued events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditQuery {
	pub user_id: Option<String>,
	pub event_type: Option<AuditEventType>,
	/// Matches events at or above this severity.
	pub min_severity: Option<AuditSeverity>,
	pub ip_address: Option<String>,
	pub flagged: Option<bool>,
	/// Inclusive lower bound on `timestamp`.
	pub start: Option<DateTime<Utc>>,
	/// Inclusive upper bound on `timestamp`.
	pub end: Option<DateTime<Utc>>,
	/// Page size. `None` or `Some(0)` means [`DEFAULT_QUERY_LIMIT`].
	pub limit: Option<usize>,
	pub offset: Option<usize>,
}

impl AuditQuery {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
		self.user_id = Some(user_id.into());
		self
	}

	pub fn event_type(mut self, event_type: AuditEventType) -> Self {
		self.event_type = Some(event_type);
		self
	}

	pub fn min_severity(mut self, severity: AuditSeverity) -> Self {
		self.min_severity = Some(severity);
		self
	}

	pub fn ip_address(mut self, ip: impl Into<String>) -> Self {
		self.ip_address = Some(ip.into());
		self
	}

	pub fn flagged(mut self, flagged: bool) -> Self {
		self.flagged = Some(flagged);
		self
	}

	pub fn between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
		self.start = Some(start);
		self.end = Some(end);
		self
	}

	pub fn limit(mut self, limit: usize) -> Self {
		self.limit = Some(limit);
		self
	}

	pub fn offset(mut self, offset: usize) -> Self {
		self.offset = Some(offset);
		self
	}

	pub fn validate(&self) -> AuditResult<()> {
		if let (Some(start), Some(end)) = (self.start, self.end) {
			if start > end {
				return Err(AuditError::invalid_query(
					"startDate",
					format!("start {start} is after end {end}"),
				));
			}
		}
		Ok(())
	}

	pub fn matches(&self, event: &AuditEvent) -> bool {
		if let Some(ref user_id) = self.user_id {
			if event.user_id.as_ref() != Some(user_id) {
				return false;
			}
		}
		if let Some(event_type) = self.event_type {
			if event.event_type != event_type {
				return false;
			}
		}
		if let Some(min) = self.min_severity {
			if event.severity < min {
				return false;
			}
		}
		if let Some(ref ip) = self.ip_address {
			if event.ip_address.as_ref() != Some(ip) {
				return false;
			}
		}
		if let Some(flagged) = self.flagged {
			if event.flagged != flagged {
				return false;
			}
		}
		if let Some(start) = self.start {
			if event.timestamp < start {
				return false;
			}
		}
		if let Some(end) = self.end {
			if event.timestamp > end {
				return false;
			}
		}
		true
	}
}

/// One page of query results. `total` counts every match before pagination.
#[derive(Debug, Clone, Serialize)]
pub struct QueryPage {
	pub total: usize,
	pub items: Vec<Arc<AuditEvent>>,
}

/// Raw filter values as they arrive from an HTTP query string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQueryParams {
	pub user_id: Option<String>,
	pub event_type: Option<String>,
	pub severity: Option<String>,
	pub ip_address: Option<String>,
	pub flagged: Option<String>,
	pub start_date: Option<String>,
	pub end_date: Option<String>,
	pub limit: Option<String>,
	pub offset: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
	value.filter(|v| !v.trim().is_empty())
}

fn parse_date(field: &'static str, value: Option<String>) -> AuditResult<Option<DateTime<Utc>>> {
	non_empty(value)
		.map(|v| {
			DateTime::parse_from_rfc3339(v.trim())
				.map(|d| d.with_timezone(&Utc))
				.map_err(|e| AuditError::invalid_query(field, format!("'{v}' is not RFC 3339: {e}")))
		})
		.transpose()
}

fn parse_count(field: &'static str, value: Option<String>) -> AuditResult<Option<usize>> {
	non_empty(value)
		.map(|v| {
			v.trim()
				.parse::<usize>()
				.map_err(|_| AuditError::invalid_query(field, format!("'{v}' is not a non-negative integer")))
		})
		.transpose()
}

impl AuditQueryParams {
	/// Parses into a typed query, rejecting values the queue can't interpret.
	pub fn parse(self) -> AuditResult<AuditQuery> {
		let event_type = non_empty(self.event_type)
			.map(|v| {
				v.trim()
					.parse::<AuditEventType>()
					.map_err(|e| AuditError::invalid_query("eventType", e.to_string()))
			})
			.transpose()?;

		let min_severity = non_empty(self.severity)
			.map(|v| {
				v.trim()
					.parse::<u8>()
					.map_err(|_| format!("'{v}' is not a number"))
					.and_then(AuditSeverity::try_from)
					.map_err(|message| AuditError::invalid_query("severity", message))
			})
			.transpose()?;

		let flagged = match non_empty(self.flagged).as_deref().map(str::trim) {
			None => None,
			Some("true") => Some(true),
			Some("false") => Some(false),
			Some(other) => {
				return Err(AuditError::invalid_query(
					"flagged",
					format!("expected true or false, got '{other}'"),
				))
			}
		};

		let query = AuditQuery {
			user_id: non_empty(self.user_id),
			event_type,
			min_severity,
			ip_address: non_empty(self.ip_address),
			flagged,
			start: parse_date("startDate", self.start_date)?,
			end: parse_date("endDate", self.end_date)?,
			limit: parse_count("limit", self.limit)?,
			offset: parse_count("offset", self.offset)?,
		};
		query.validate()?;
		Ok(query)
	}
}

/// Fixed-capacity, insertion-ordered store of finalized events.
///
/// When the queue is full the oldest entries are evicted first.
pub struct EventQueue {
	entries: RwLock<VecDeque<Arc<AuditEvent>>>,
	capacity: usize,
}

impl EventQueue {
	pub fn new(capacity: usize) -> Self {
		let capacity = capacity.max(1);
		Self {
			entries: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
			capacity,
		}
	}

	/// Appends an event, returning how many old entries were evicted.
	pub fn push(&self, event: Arc<AuditEvent>) -> usize {
		let mut entries = self.entries.write();
		entries.push_back(event);
		let mut evicted = 0;
		while entries.len() > self.capacity {
			entries.pop_front();
			evicted += 1;
		}
		evicted
	}

	/// All matching events, newest first. Events sharing a timestamp keep
	/// reverse insertion order.
	pub fn matching(&self, query: &AuditQuery) -> Vec<Arc<AuditEvent>> {
		let mut matches: Vec<Arc<AuditEvent>> = {
			let entries = self.entries.read();
			entries
				.iter()
				.rev()
				.filter(|e| query.matches(e))
				.cloned()
				.collect()
		};
		matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
		matches
	}

	pub fn query(&self, query: &AuditQuery) -> AuditResult<QueryPage> {
		query.validate()?;

		let matches = self.matching(query);
		let total = matches.len();
		let limit = query
			.limit
			.filter(|&limit| limit > 0)
			.unwrap_or(DEFAULT_QUERY_LIMIT);
		let offset = query.offset.unwrap_or(0);

		let items = matches.into_iter().skip(offset).take(limit).collect();
		Ok(QueryPage { total, items })
	}

	/// Drops entries older than `cutoff`. Returns how many were removed.
	pub fn retain_since(&self, cutoff: DateTime<Utc>) -> usize {
		let mut entries = self.entries.write();
		let before = entries.len();
		entries.retain(|e| e.timestamp >= cutoff);
		before - entries.len()
	}

	/// Insertion-ordered copy of the current contents.
	pub fn snapshot(&self) -> Vec<Arc<AuditEvent>> {
		self.entries.read().iter().cloned().collect()
	}

	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}
}
