// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Retention cleanup for the queue and the on-disk trail.

use std::path::Path;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::fs;
use tracing::{info, warn};

use crate::pipeline::AuditService;

/// File names the cleanup may delete. Anything else in the logs directory is
/// left alone.
const AUDIT_FILE_PREFIX: &str = "audit-";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
	pub queue_removed: usize,
	pub files_removed: usize,
	pub trackers_swept: usize,
}

impl AuditService {
	/// Removes queue entries and trail files older than the retention horizon.
	///
	/// Idempotent. File errors are logged and skipped.
	pub async fn clean_old_logs(&self) -> CleanupReport {
		let now = self.clock.now();
		let cutoff = TimeDelta::try_days(self.config.retention_days)
			.and_then(|span| now.checked_sub_signed(span))
			.unwrap_or(DateTime::<Utc>::MIN_UTC);

		let queue_removed = self.queue.retain_since(cutoff);
		let files_removed = if self.config.enable_file {
			remove_files_older_than(&self.config.logs_directory, cutoff).await
		} else {
			0
		};
		let trackers_swept = self.detector.sweep(now);

		let report = CleanupReport {
			queue_removed,
			files_removed,
			trackers_swept,
		};
		info!(
			cutoff = %cutoff,
			queue_removed,
			files_removed,
			trackers_swept,
			"audit retention cleanup finished"
		);
		report
	}
}

async fn remove_files_older_than(dir: &Path, cutoff: DateTime<Utc>) -> usize {
	let mut entries = match fs::read_dir(dir).await {
		Ok(entries) => entries,
		Err(e) => {
			warn!(dir = %dir.display(), error = %e, "failed to read audit logs directory");
			return 0;
		}
	};

	let mut removed = 0;
	loop {
		let entry = match entries.next_entry().await {
			Ok(Some(entry)) => entry,
			Ok(None) => break,
			Err(e) => {
				warn!(dir = %dir.display(), error = %e, "failed to list audit logs directory");
				break;
			}
		};

		if !entry
			.file_name()
			.to_string_lossy()
			.starts_with(AUDIT_FILE_PREFIX)
		{
			continue;
		}

		let Ok(metadata) = entry.metadata().await else {
			continue;
		};
		if !metadata.is_file() {
			continue;
		}
		let modified = match metadata.modified() {
			Ok(t) => DateTime::<Utc>::from(t),
			Err(_) => continue,
		};

		if modified < cutoff {
			let path = entry.path();
			match fs::remove_file(&path).await {
				Ok(()) => {
					removed += 1;
					info!(path = %path.display(), "removed old audit log");
				}
				Err(e) => warn!(path = %path.display(), error = %e, "failed to remove old audit log"),
			}
		}
	}
	removed
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::clock::ManualClock;
	use crate::error::AuditError;
	use chrono::Duration;
	use sadhana_audit_config::MAX_RETENTION_DAYS;
	use crate::event::{AuditDetails, AuditEventType};
	use sadhana_audit_config::AuditConfig;
	use std::sync::Arc;
	use std::time::SystemTime;
	use tempfile::TempDir;

	fn touch(path: &Path, age: Duration) {
		std::fs::write(path, b"{}\n").unwrap();
		let mtime = SystemTime::from(Utc::now() - age);
		std::fs::File::options()
			.write(true)
			.open(path)
			.unwrap()
			.set_modified(mtime)
			.unwrap();
	}

	fn config(dir: &Path) -> AuditConfig {
		AuditConfig {
			logs_directory: dir.to_path_buf(),
			retention_days: 30,
			enable_console: false,
			..Default::default()
		}
	}

	#[tokio::test]
	async fn test_cleanup_removes_only_expired_entries_and_files() {
		let dir = TempDir::new().unwrap();
		let now = Utc::now();
		let clock = Arc::new(ManualClock::new(now - Duration::days(40)));
		let service = AuditService::builder(config(dir.path()))
			.clock(clock.clone())
			.build()
			.unwrap();

		service.log(AuditEventType::DataRead, AuditDetails::new().description("old"));
		clock.set(now - Duration::days(10));
		service.log(AuditEventType::DataRead, AuditDetails::new().description("recent"));
		clock.set(now);
		// Drain the file sink before planting fixtures.
		service.shutdown().await;
		for entry in std::fs::read_dir(dir.path()).unwrap() {
			std::fs::remove_file(entry.unwrap().path()).unwrap();
		}

		touch(&dir.path().join("audit-2025-01-01.log"), Duration::days(40));
		touch(&dir.path().join("audit-2025-01-01.log.1735700000000"), Duration::days(35));
		touch(&dir.path().join("audit-2025-03-01.log"), Duration::days(10));
		touch(&dir.path().join("notes.txt"), Duration::days(400));

		let report = service.clean_old_logs().await;
		assert_eq!(report.queue_removed, 1);
		assert_eq!(report.files_removed, 2);

		let mut left: Vec<String> = std::fs::read_dir(dir.path())
			.unwrap()
			.map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
			.collect();
		left.sort();
		assert_eq!(left, vec!["audit-2025-03-01.log", "notes.txt"]);

		let remaining: Vec<String> = service
			.queue
			.snapshot()
			.iter()
			.map(|e| e.description.clone())
			.collect();
		assert_eq!(remaining, vec!["recent"]);

		let again = service.clean_old_logs().await;
		assert_eq!(again.queue_removed, 0);
		assert_eq!(again.files_removed, 0);
	}

	#[tokio::test]
	async fn test_cleanup_skips_files_when_file_sink_disabled() {
		let dir = TempDir::new().unwrap();
		touch(&dir.path().join("audit-2020-01-01.log"), Duration::days(400));

		let service = AuditService::from_config(AuditConfig {
			enable_file: false,
			..config(dir.path())
		})
		.unwrap();

		let report = service.clean_old_logs().await;
		assert_eq!(report.files_removed, 0);
		assert!(dir.path().join("audit-2020-01-01.log").exists());
	}

	#[tokio::test]
	async fn test_missing_directory_is_not_an_error() {
		let dir = TempDir::new().unwrap();
		let removed = remove_files_older_than(&dir.path().join("gone"), Utc::now()).await;
		assert_eq!(removed, 0);
	}

	#[tokio::test]
	async fn test_retention_days_bounded_at_build() {
		let dir = TempDir::new().unwrap();
		let result = AuditService::from_config(AuditConfig {
			retention_days: i64::MAX / 2,
			..config(dir.path())
		});
		assert!(matches!(result, Err(AuditError::ConfigError(msg)) if msg.contains("retention_days")));
	}

	#[tokio::test]
	async fn test_cleanup_at_max_retention_keeps_everything() {
		let dir = TempDir::new().unwrap();
		let service = AuditService::from_config(AuditConfig {
			retention_days: MAX_RETENTION_DAYS,
			enable_file: false,
			..config(dir.path())
		})
		.unwrap();
		service.log(AuditEventType::SystemBackup, AuditDetails::new());

		let report = service.clean_old_logs().await;
		assert_eq!(report.queue_removed, 0);
		assert_eq!(service.queue_len(), 1);
	}
}
