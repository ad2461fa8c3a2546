// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Day-partitioned NDJSON trail with size-triggered rotation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::AuditSinkError;
use crate::event::AuditEvent;
use crate::sink::AuditSink;

/// Prefix shared by every file this sink creates, rotated ones included.
pub const LOG_FILE_PREFIX: &str = "audit-";

pub fn log_file_name(date: NaiveDate) -> String {
	format!("{LOG_FILE_PREFIX}{}.log", date.format("%Y-%m-%d"))
}

struct FileHandle {
	path: PathBuf,
	file: tokio::fs::File,
	size: u64,
}

/// Appends one JSON record per line to `audit-YYYY-MM-DD.log`, keyed by the
/// event's UTC date.
///
/// All writes go through one mutex, so append, size check and rotation for a
/// path never interleave.
pub struct FileAuditSink {
	directory: PathBuf,
	max_log_size: u64,
	handle: Mutex<Option<FileHandle>>,
}

impl FileAuditSink {
	pub fn new(directory: impl Into<PathBuf>, max_log_size: u64) -> Self {
		Self {
			directory: directory.into(),
			max_log_size,
			handle: Mutex::new(None),
		}
	}

	pub fn directory(&self) -> &Path {
		&self.directory
	}

	pub fn path_for(&self, event: &AuditEvent) -> PathBuf {
		self
			.directory
			.join(log_file_name(event.timestamp.date_naive()))
	}

	async fn open(&self, path: &Path) -> Result<FileHandle, AuditSinkError> {
		fs::create_dir_all(&self.directory).await.map_err(|e| {
			AuditSinkError::Transient(format!(
				"failed to create {}: {e}",
				self.directory.display()
			))
		})?;

		let file = OpenOptions::new()
			.create(true)
			.append(true)
			.open(path)
			.await
			.map_err(|e| AuditSinkError::Transient(format!("failed to open file: {e}")))?;

		let size = file
			.metadata()
			.await
			.map_err(|e| AuditSinkError::Transient(format!("failed to stat file: {e}")))?
			.len();

		Ok(FileHandle {
			path: path.to_path_buf(),
			file,
			size,
		})
	}
}

/// Picks `{path}.{epoch_millis}`, bumping the suffix until it is unused.
async fn rotation_target(path: &Path) -> PathBuf {
	let mut millis = Utc::now().timestamp_millis();
	loop {
		let mut name = path.as_os_str().to_os_string();
		name.push(format!(".{millis}"));
		let candidate = PathBuf::from(name);
		if !fs::try_exists(&candidate).await.unwrap_or(false) {
			return candidate;
		}
		millis += 1;
	}
}

async fn rotate(path: &Path) -> Result<PathBuf, AuditSinkError> {
	let target = rotation_target(path).await;
	fs::rename(path, &target)
		.await
		.map_err(|e| AuditSinkError::Transient(format!("failed to rotate {}: {e}", path.display())))?;
	Ok(target)
}

#[async_trait]
impl AuditSink for FileAuditSink {
	fn name(&self) -> &str {
		"file"
	}

	async fn publish(&self, event: Arc<AuditEvent>) -> Result<(), AuditSinkError> {
		let path = self.path_for(&event);
		let line = format_json_line(&event)?;

		let mut guard = self.handle.lock().await;

		let needs_reopen = match &*guard {
			Some(handle) => handle.path != path,
			None => true,
		};
		if needs_reopen {
			*guard = Some(self.open(&path).await?);
		}

		let handle = guard
			.as_mut()
			.ok_or_else(|| AuditSinkError::Permanent("file handle not initialized".to_string()))?;

		handle
			.file
			.write_all(line.as_bytes())
			.await
			.map_err(|e| AuditSinkError::Transient(format!("failed to write to file: {e}")))?;

		handle
			.file
			.flush()
			.await
			.map_err(|e| AuditSinkError::Transient(format!("failed to flush file: {e}")))?;

		handle.size += line.len() as u64;

		if handle.size > self.max_log_size {
			let size = handle.size;
			// Close before renaming; the next write for this day reopens a fresh file.
			*guard = None;
			let rotated = rotate(&path).await?;
			info!(
				from = %path.display(),
				to = %rotated.display(),
				size,
				"rotated audit log"
			);
		}

		Ok(())
	}

	async fn health_check(&self) -> Result<(), AuditSinkError> {
		let metadata = fs::metadata(&self.directory)
			.await
			.map_err(|e| AuditSinkError::Transient(format!("logs directory unavailable: {e}")))?;
		if metadata.permissions().readonly() {
			return Err(AuditSinkError::Permanent(format!(
				"logs directory {} is read-only",
				self.directory.display()
			)));
		}
		Ok(())
	}
}

pub fn format_json_line(event: &AuditEvent) -> Result<String, AuditSinkError> {
	let json = serde_json::to_string(event)
		.map_err(|e| AuditSinkError::Permanent(format!("JSON serialization failed: {e}")))?;
	Ok(format!("{json}\n"))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::event::{normalize, AuditDetails, AuditEventType};
	use chrono::{DateTime, TimeZone};
	use tempfile::TempDir;

	fn event_at(at: DateTime<Utc>) -> Arc<AuditEvent> {
		Arc::new(normalize(
			AuditEventType::DataCreate,
			AuditDetails::new()
				.user_id("user-1")
				.description("created sadhana"),
			at,
		))
	}

	fn day(d: u32) -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2025, 6, d, 12, 0, 0).unwrap()
	}

	fn list(dir: &Path) -> Vec<(String, u64)> {
		let mut entries: Vec<(String, u64)> = std::fs::read_dir(dir)
			.unwrap()
			.map(|e| {
				let e = e.unwrap();
				(
					e.file_name().to_string_lossy().into_owned(),
					e.metadata().unwrap().len(),
				)
			})
			.collect();
		entries.sort();
		entries
	}

	#[test]
	fn test_log_file_name() {
		let date = NaiveDate::from_ymd_opt(2025, 1, 7).unwrap();
		assert_eq!(log_file_name(date), "audit-2025-01-07.log");
	}

	#[test]
	fn test_format_json_line_is_single_line() {
		let line = format_json_line(&event_at(day(1))).unwrap();
		assert!(line.ends_with('\n'));
		assert!(!line.trim_end_matches('\n').contains('\n'));
		let json: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
		assert_eq!(json["eventType"], "DATA_CREATE");
		assert_eq!(json["userId"], "user-1");
	}

	#[tokio::test]
	async fn test_appends_lines_to_day_file() {
		let dir = TempDir::new().unwrap();
		let logs = dir.path().join("logs").join("audit");
		let sink = FileAuditSink::new(&logs, 1024 * 1024);

		sink.publish(event_at(day(1))).await.unwrap();
		sink.publish(event_at(day(1))).await.unwrap();

		let content = std::fs::read_to_string(logs.join("audit-2025-06-01.log")).unwrap();
		let lines: Vec<_> = content.lines().collect();
		assert_eq!(lines.len(), 2);
		for line in lines {
			let parsed: AuditEvent = serde_json::from_str(line).unwrap();
			assert_eq!(parsed.event_type, AuditEventType::DataCreate);
		}
	}

	#[tokio::test]
	async fn test_events_land_in_their_own_day_file() {
		let dir = TempDir::new().unwrap();
		let sink = FileAuditSink::new(dir.path(), 1024 * 1024);

		sink.publish(event_at(day(1))).await.unwrap();
		sink.publish(event_at(day(2))).await.unwrap();
		sink.publish(event_at(day(1))).await.unwrap();

		let names: Vec<String> = list(dir.path()).into_iter().map(|(n, _)| n).collect();
		assert_eq!(names, vec!["audit-2025-06-01.log", "audit-2025-06-02.log"]);

		let first = std::fs::read_to_string(dir.path().join("audit-2025-06-01.log")).unwrap();
		assert_eq!(first.lines().count(), 2);
	}

	#[tokio::test]
	async fn test_exceeding_max_size_rotates_exactly_once() {
		let dir = TempDir::new().unwrap();
		let line_len = format_json_line(&event_at(day(3))).unwrap().len() as u64;
		let sink = FileAuditSink::new(dir.path(), line_len * 5 / 2);

		for _ in 0..5 {
			sink.publish(event_at(day(3))).await.unwrap();
		}

		let entries = list(dir.path());
		assert_eq!(entries.len(), 2, "expected current + one rotated file: {entries:?}");

		let (current, rotated): (Vec<_>, Vec<_>) = entries
			.iter()
			.partition(|(name, _)| name == "audit-2025-06-03.log");
		assert_eq!(current.len(), 1);
		assert_eq!(rotated.len(), 1);
		assert!(rotated[0].0.starts_with("audit-2025-06-03.log."));
		let suffix = &rotated[0].0["audit-2025-06-03.log.".len()..];
		assert!(suffix.parse::<i64>().is_ok(), "suffix {suffix} is not epoch millis");

		assert_eq!(rotated[0].1, line_len * 3);
		assert_eq!(current[0].1, line_len * 2);
		let total: u64 = entries.iter().map(|(_, size)| size).sum();
		assert_eq!(total, line_len * 5);
	}

	#[tokio::test]
	async fn test_reopened_file_counts_existing_bytes() {
		let dir = TempDir::new().unwrap();
		let line_len = format_json_line(&event_at(day(4))).unwrap().len() as u64;

		{
			let sink = FileAuditSink::new(dir.path(), line_len * 3 / 2);
			sink.publish(event_at(day(4))).await.unwrap();
		}

		let sink = FileAuditSink::new(dir.path(), line_len * 3 / 2);
		sink.publish(event_at(day(4))).await.unwrap();

		let entries = list(dir.path());
		assert_eq!(entries.len(), 1);
		assert!(entries[0].0.starts_with("audit-2025-06-04.log."));
		assert_eq!(entries[0].1, line_len * 2);
	}

	#[tokio::test]
	async fn test_concurrent_publishes_do_not_interleave() {
		let dir = TempDir::new().unwrap();
		let sink = Arc::new(FileAuditSink::new(dir.path(), u64::MAX));

		let mut tasks = Vec::new();
		for _ in 0..32 {
			let sink = Arc::clone(&sink);
			tasks.push(tokio::spawn(async move {
				sink.publish(event_at(day(5))).await.unwrap();
			}));
		}
		for task in tasks {
			task.await.unwrap();
		}

		let content = std::fs::read_to_string(dir.path().join("audit-2025-06-05.log")).unwrap();
		assert_eq!(content.lines().count(), 32);
		for line in content.lines() {
			serde_json::from_str::<AuditEvent>(line).unwrap();
		}
	}

	#[tokio::test]
	async fn test_health_check_reports_missing_directory() {
		let dir = TempDir::new().unwrap();
		let sink = FileAuditSink::new(dir.path().join("missing"), 1024);
		assert!(sink.health_check().await.is_err());

		let sink = FileAuditSink::new(dir.path(), 1024);
		assert!(sink.health_check().await.is_ok());
	}
}
