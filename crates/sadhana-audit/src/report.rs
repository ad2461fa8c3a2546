// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Read-only aggregations over the queue.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::error::{AuditError, AuditResult};
use crate::event::{AuditEvent, AuditEventType, AuditSeverity};
use crate::pipeline::AuditService;
use crate::queue::AuditQuery;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
	pub period: String,
	pub total_events: usize,
	pub events_by_type: BTreeMap<AuditEventType, usize>,
	pub events_by_severity: BTreeMap<AuditSeverity, usize>,
	pub flagged_count: usize,
	pub failed_auth_count: usize,
	pub unique_users: usize,
	#[serde(rename = "uniqueIPs")]
	pub unique_ips: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DataOperations {
	pub create: usize,
	pub read: usize,
	pub update: usize,
	pub delete: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserActivityReport {
	pub user_id: String,
	pub period: String,
	pub total_events: usize,
	pub events_by_type: BTreeMap<AuditEventType, usize>,
	pub last_login: Option<DateTime<Utc>>,
	pub login_count: usize,
	pub failed_login_count: usize,
	pub data_operations: DataOperations,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuspiciousActivities {
	pub total: usize,
	pub activities: Vec<Arc<AuditEvent>>,
}

fn period(days: u32) -> String {
	format!("{days} days")
}

impl AuditService {
	fn window(&self, days: u32) -> AuditResult<AuditQuery> {
		let now = self.clock.now();
		let start = TimeDelta::try_days(i64::from(days))
			.and_then(|span| now.checked_sub_signed(span))
			.ok_or_else(|| AuditError::invalid_query("days", format!("{days} days is out of range")))?;
		Ok(AuditQuery::new().between(start, now))
	}

	/// Tallies queue entries from the last `days` days.
	pub fn statistics(&self, days: u32) -> AuditResult<StatsReport> {
		let events = self.queue.matching(&self.window(days)?);

		let mut report = StatsReport {
			period: period(days),
			total_events: events.len(),
			events_by_type: BTreeMap::new(),
			events_by_severity: BTreeMap::new(),
			flagged_count: 0,
			failed_auth_count: 0,
			unique_users: 0,
			unique_ips: 0,
		};
		let mut users = HashSet::new();
		let mut ips = HashSet::new();

		for event in &events {
			*report.events_by_type.entry(event.event_type).or_default() += 1;
			*report.events_by_severity.entry(event.severity).or_default() += 1;
			if event.flagged {
				report.flagged_count += 1;
			}
			if event.event_type == AuditEventType::AuthFailed {
				report.failed_auth_count += 1;
			}
			if let Some(ref user_id) = event.user_id {
				users.insert(user_id.as_str());
			}
			if let Some(ref ip) = event.ip_address {
				ips.insert(ip.as_str());
			}
		}

		report.unique_users = users.len();
		report.unique_ips = ips.len();
		Ok(report)
	}

	/// Activity summary for one user over the last `days` days.
	pub fn user_activity(&self, user_id: &str, days: u32) -> AuditResult<UserActivityReport> {
		let events = self.queue.matching(&self.window(days)?.user_id(user_id));

		let mut report = UserActivityReport {
			user_id: user_id.to_string(),
			period: period(days),
			total_events: events.len(),
			events_by_type: BTreeMap::new(),
			last_login: None,
			login_count: 0,
			failed_login_count: 0,
			data_operations: DataOperations::default(),
		};

		// `events` is newest first, so the first login seen is the latest.
		for event in &events {
			*report.events_by_type.entry(event.event_type).or_default() += 1;
			match event.event_type {
				AuditEventType::AuthLogin => {
					report.login_count += 1;
					report.last_login.get_or_insert(event.timestamp);
				}
				AuditEventType::AuthFailed => report.failed_login_count += 1,
				AuditEventType::DataCreate => report.data_operations.create += 1,
				AuditEventType::DataRead => report.data_operations.read += 1,
				AuditEventType::DataUpdate => report.data_operations.update += 1,
				AuditEventType::DataDelete => report.data_operations.delete += 1,
				_ => {}
			}
		}

		Ok(report)
	}

	/// Flagged events only. Severity defaults to at least MEDIUM unless the
	/// query sets its own minimum.
	pub fn suspicious_activities(&self, query: &AuditQuery) -> AuditResult<SuspiciousActivities> {
		let mut query = query.clone();
		query.flagged = Some(true);
		query.min_severity.get_or_insert(AuditSeverity::Medium);

		let page = self.queue.query(&query)?;
		Ok(SuspiciousActivities {
			total: page.total,
			activities: page.items,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::clock::ManualClock;
	use crate::event::AuditDetails;
	use chrono::{Duration, TimeZone};
	use sadhana_audit_config::{AuditConfig, SuspiciousActivityConfig};

	fn start() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2025, 5, 20, 12, 0, 0).unwrap()
	}

	fn service(clock: Arc<ManualClock>) -> AuditService {
		let config = AuditConfig {
			enable_console: false,
			enable_file: false,
			suspicious_activity: SuspiciousActivityConfig {
				failed_login_attempts: 2,
				unusual_hours_utc_offset_minutes: Some(0),
				..Default::default()
			},
			..Default::default()
		};
		AuditService::builder(config).clock(clock).build().unwrap()
	}

	#[tokio::test]
	async fn test_statistics_tallies_window() {
		let clock = Arc::new(ManualClock::new(start() - Duration::days(10)));
		let service = service(clock.clone());

		service.log(AuditEventType::AuthLogin, AuditDetails::new().user_id("old"));

		clock.set(start());
		service.log(
			AuditEventType::AuthLogin,
			AuditDetails::new().user_id("u1").ip_address("10.0.0.1"),
		);
		service.log(
			AuditEventType::AuthFailed,
			AuditDetails::new()
				.ip_address("10.0.0.2")
				.severity(AuditSeverity::Medium),
		);
		service.log(
			AuditEventType::AuthFailed,
			AuditDetails::new()
				.ip_address("10.0.0.2")
				.severity(AuditSeverity::Medium),
		);
		service.log(
			AuditEventType::DataRead,
			AuditDetails::new().user_id("u2").ip_address("10.0.0.1"),
		);

		let stats = service.statistics(7).unwrap();
		assert_eq!(stats.period, "7 days");
		assert_eq!(stats.total_events, 4);
		assert_eq!(stats.events_by_type[&AuditEventType::AuthFailed], 2);
		assert_eq!(stats.failed_auth_count, 2);
		assert_eq!(stats.flagged_count, 1);
		assert_eq!(stats.unique_users, 2);
		assert_eq!(stats.unique_ips, 2);
		assert_eq!(stats.events_by_severity[&AuditSeverity::Low], 2);
		assert_eq!(stats.events_by_severity[&AuditSeverity::Medium], 1);
		assert_eq!(stats.events_by_severity[&AuditSeverity::High], 1);

		assert_eq!(stats.events_by_type.values().sum::<usize>(), stats.total_events);
		assert_eq!(stats.events_by_severity.values().sum::<usize>(), stats.total_events);

		assert_eq!(service.statistics(30).unwrap().total_events, 5);
	}

	#[tokio::test]
	async fn test_statistics_serializes_like_report() {
		let clock = Arc::new(ManualClock::new(start()));
		let service = service(clock);
		service.log(AuditEventType::DataCreate, AuditDetails::new().ip_address("1.1.1.1"));

		let json = serde_json::to_value(service.statistics(1).unwrap()).unwrap();
		assert_eq!(json["totalEvents"], 1);
		assert_eq!(json["eventsByType"]["DATA_CREATE"], 1);
		assert_eq!(json["eventsBySeverity"]["1"], 1);
		assert_eq!(json["uniqueIPs"], 1);
	}

	#[tokio::test]
	async fn test_user_activity() {
		let clock = Arc::new(ManualClock::new(start()));
		let service = service(clock.clone());

		service.log(AuditEventType::AuthLogin, AuditDetails::new().user_id("u1"));
		clock.advance(Duration::minutes(5));
		service.log(AuditEventType::AuthFailed, AuditDetails::new().user_id("u1"));
		service.log(AuditEventType::DataCreate, AuditDetails::new().user_id("u1"));
		service.log(AuditEventType::DataRead, AuditDetails::new().user_id("u1"));
		service.log(AuditEventType::DataRead, AuditDetails::new().user_id("u1"));
		service.log(AuditEventType::DataRead, AuditDetails::new().user_id("other"));
		clock.advance(Duration::minutes(5));
		service.log(AuditEventType::AuthLogin, AuditDetails::new().user_id("u1"));

		let activity = service.user_activity("u1", 7).unwrap();
		assert_eq!(activity.total_events, 6);
		assert_eq!(activity.login_count, 2);
		assert_eq!(activity.failed_login_count, 1);
		assert_eq!(activity.last_login, Some(start() + Duration::minutes(10)));
		assert_eq!(
			activity.data_operations,
			DataOperations {
				create: 1,
				read: 2,
				update: 0,
				delete: 0,
			}
		);

		let nobody = service.user_activity("ghost", 7).unwrap();
		assert_eq!(nobody.total_events, 0);
		assert!(nobody.last_login.is_none());
	}

	#[tokio::test]
	async fn test_window_beyond_calendar_is_invalid_query() {
		let clock = Arc::new(ManualClock::new(start()));
		let service = service(clock);
		service.log(AuditEventType::AuthLogin, AuditDetails::new().user_id("u"));

		let err = service.statistics(u32::MAX).unwrap_err();
		assert!(matches!(err, AuditError::InvalidQuery { field: "days", .. }));

		let err = service.user_activity("u", 200_000_000).unwrap_err();
		assert!(matches!(err, AuditError::InvalidQuery { field: "days", .. }));

		// Large but representable windows still work.
		assert_eq!(service.statistics(36_500).unwrap().total_events, 1);
	}

	#[tokio::test]
	async fn test_suspicious_activities_forces_flagged() {
		let clock = Arc::new(ManualClock::new(start()));
		let service = service(clock);

		for _ in 0..3 {
			service.log(AuditEventType::AuthFailed, AuditDetails::new().ip_address("9.9.9.9"));
		}
		service.log(AuditEventType::DataRead, AuditDetails::new().ip_address("9.9.9.9"));

		let result = service
			.suspicious_activities(&AuditQuery::new().flagged(false))
			.unwrap();
		assert_eq!(result.total, 2);
		assert!(result.activities.iter().all(|e| e.flagged));

		let critical_only = service
			.suspicious_activities(&AuditQuery::new().min_severity(AuditSeverity::Critical))
			.unwrap();
		assert_eq!(critical_only.total, 0);
	}
}
