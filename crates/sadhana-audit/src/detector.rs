// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Sliding-window heuristics that flag suspicious events during ingestion.
//!
//! Three independent checks run against each event, keyed by the actor
//! (`user_id`, falling back to `ip_address`):
//!
//! - repeated `AUTH_FAILED` within the failed-login window
//! - `DATA_DELETE` outside 06:00..=22:59 in the configured local offset
//! - more than `rapid_data_access` `DATA_READ`s within the rapid-access window
//!
//! Per-key timestamp lists live behind a single mutex. They are bounded by an
//! idle sweep and by a key capacity with least-recently-active eviction. A
//! `(last_seen, key)` index keeps eviction logarithmic in the number of keys.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;

use chrono::{DateTime, Duration, FixedOffset, Local, Offset, Timelike, Utc};
use parking_lot::Mutex;
use tracing::debug;

use crate::event::{AuditEvent, AuditEventType};
use sadhana_audit_config::SuspiciousActivityConfig;

const MAX_WINDOW_SECS: u64 = 366 * 24 * 60 * 60;

pub const UNUSUAL_HOURS_DELETE_REASON: &str = "Data deletion during unusual hours";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum TrackerKey {
	FailedLogin(String),
	RapidAccess(String),
}

impl fmt::Display for TrackerKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TrackerKey::FailedLogin(key) => write!(f, "failed_login_{key}"),
			TrackerKey::RapidAccess(key) => write!(f, "rapid_access_{key}"),
		}
	}
}

#[derive(Debug)]
struct KeyWindow {
	hits: VecDeque<DateTime<Utc>>,
	last_seen: DateTime<Utc>,
}

#[derive(Debug)]
struct TrackerState {
	windows: HashMap<TrackerKey, KeyWindow>,
	by_recency: BTreeSet<(DateTime<Utc>, TrackerKey)>,
	last_sweep: Option<DateTime<Utc>>,
}

impl TrackerState {
	fn new() -> Self {
		Self {
			windows: HashMap::new(),
			by_recency: BTreeSet::new(),
			last_sweep: None,
		}
	}

	fn evict_least_recent(&mut self) {
		if let Some((_, oldest)) = self.by_recency.pop_first() {
			debug!(key = %oldest, "evicting least recently active detector key");
			self.windows.remove(&oldest);
		}
	}
}

pub struct SuspiciousActivityDetector {
	failed_login_attempts: usize,
	failed_login_window: Duration,
	rapid_data_access: usize,
	rapid_access_window: Duration,
	unusual_time_access: bool,
	local_offset: FixedOffset,
	max_tracked_keys: usize,
	state: Mutex<TrackerState>,
}

fn window(secs: u64) -> Duration {
	Duration::seconds(secs.min(MAX_WINDOW_SECS) as i64)
}

fn is_unusual_hour(hour: u32) -> bool {
	hour < 6 || hour > 22
}

impl SuspiciousActivityDetector {
	pub fn new(config: &SuspiciousActivityConfig) -> Self {
		let local_offset = config
			.unusual_hours_utc_offset_minutes
			.and_then(|minutes| FixedOffset::east_opt(minutes * 60))
			.unwrap_or_else(|| Local::now().offset().fix());

		Self {
			failed_login_attempts: config.failed_login_attempts,
			failed_login_window: window(config.failed_login_window_secs),
			rapid_data_access: config.rapid_data_access,
			rapid_access_window: window(config.rapid_access_window_secs),
			unusual_time_access: config.unusual_time_access,
			local_offset,
			max_tracked_keys: config.max_tracked_keys.max(1),
			state: Mutex::new(TrackerState::new()),
		}
	}

	/// Runs the heuristics and flags the event if one of them fires.
	///
	/// Returns the reason when the event was flagged.
	pub fn inspect(&self, event: &mut AuditEvent) -> Option<String> {
		let reason = self.evaluate(event)?;
		event.flag(reason.clone());
		Some(reason)
	}

	/// Records the event against its key's windows and returns the reason it
	/// is suspicious, if any. Events with neither user nor IP are ignored.
	pub fn evaluate(&self, event: &AuditEvent) -> Option<String> {
		let key = event.actor_key()?;
		let now = event.timestamp;

		let mut state = self.state.lock();
		self.maybe_sweep(&mut state, now);

		match event.event_type {
			AuditEventType::AuthFailed => {
				let count = self.record(
					&mut state,
					TrackerKey::FailedLogin(key.to_string()),
					now,
				);
				(count >= self.failed_login_attempts)
					.then(|| format!("{count} failed login attempts"))
			}
			AuditEventType::DataDelete => {
				let local_hour = now.with_timezone(&self.local_offset).hour();
				(self.unusual_time_access && is_unusual_hour(local_hour))
					.then(|| UNUSUAL_HOURS_DELETE_REASON.to_string())
			}
			AuditEventType::DataRead => {
				let count = self.record(
					&mut state,
					TrackerKey::RapidAccess(key.to_string()),
					now,
				);
				(count > self.rapid_data_access)
					.then(|| format!("Rapid data access: {count} reads per minute"))
			}
			_ => None,
		}
	}

	/// Evicts keys with no hits inside their window. Returns how many were removed.
	pub fn sweep(&self, now: DateTime<Utc>) -> usize {
		let mut state = self.state.lock();
		self.sweep_locked(&mut state, now)
	}

	pub fn tracked_keys(&self) -> usize {
		self.state.lock().windows.len()
	}

	fn window_for(&self, key: &TrackerKey) -> Duration {
		match key {
			TrackerKey::FailedLogin(_) => self.failed_login_window,
			TrackerKey::RapidAccess(_) => self.rapid_access_window,
		}
	}

	fn record(&self, state: &mut TrackerState, key: TrackerKey, now: DateTime<Utc>) -> usize {
		if !state.windows.contains_key(&key) && state.windows.len() >= self.max_tracked_keys {
			state.evict_least_recent();
		}

		let window = self.window_for(&key);
		match state.windows.get(&key).map(|entry| entry.last_seen) {
			Some(last_seen) if now > last_seen => {
				state.by_recency.remove(&(last_seen, key.clone()));
				state.by_recency.insert((now, key.clone()));
			}
			Some(_) => {}
			None => {
				state.by_recency.insert((now, key.clone()));
			}
		}

		let entry = state.windows.entry(key).or_insert_with(|| KeyWindow {
			hits: VecDeque::new(),
			last_seen: now,
		});
		entry.last_seen = entry.last_seen.max(now);

		entry.hits.retain(|t| now - *t < window);
		entry.hits.push_back(now);
		entry.hits.len()
	}

	fn maybe_sweep(&self, state: &mut TrackerState, now: DateTime<Utc>) {
		let interval = self.failed_login_window.min(self.rapid_access_window);
		match state.last_sweep {
			Some(last) if now - last < interval => {}
			_ => {
				self.sweep_locked(state, now);
			}
		}
	}

	fn sweep_locked(&self, state: &mut TrackerState, now: DateTime<Utc>) -> usize {
		let before = state.windows.len();
		let failed_login_window = self.failed_login_window;
		let rapid_access_window = self.rapid_access_window;
		let TrackerState {
			windows,
			by_recency,
			..
		} = &mut *state;
		windows.retain(|key, entry| {
			let window = match key {
				TrackerKey::FailedLogin(_) => failed_login_window,
				TrackerKey::RapidAccess(_) => rapid_access_window,
			};
			let keep = now - entry.last_seen < window;
			if !keep {
				by_recency.remove(&(entry.last_seen, key.clone()));
			}
			keep
		});
		state.last_sweep = Some(now);

		let removed = before - state.windows.len();
		if removed > 0 {
			debug!(removed, remaining = state.windows.len(), "swept idle detector keys");
		}
		removed
	}
}
