// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The ingestion pipeline: normalize, inspect, enqueue, fan out, notify.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::detector::SuspiciousActivityDetector;
use crate::error::{AuditError, AuditResult, AuditSinkError};
use crate::event::{normalize, AuditDetails, AuditEvent, AuditEventType};
use crate::queue::{AuditQuery, EventQueue, QueryPage};
use crate::sink::AuditSink;
use sadhana_audit_config::{AuditConfig, QueueOverflowPolicy};

struct SinkWorker {
	sink: Arc<dyn AuditSink>,
	tx: mpsc::Sender<Arc<AuditEvent>>,
	handle: JoinHandle<()>,
}

/// Owns the queue, detector and sink workers for one process.
///
/// Construct once at startup and share by reference (or `Arc`). Must be built
/// inside a Tokio runtime since each sink gets its own worker task.
pub struct AuditService {
	pub(crate) config: AuditConfig,
	pub(crate) clock: Arc<dyn Clock>,
	pub(crate) detector: SuspiciousActivityDetector,
	pub(crate) queue: EventQueue,
	workers: Mutex<Vec<SinkWorker>>,
	notify: broadcast::Sender<Arc<AuditEvent>>,
}

/// Checks that `dir` exists (creating it if needed) and accepts writes.
pub fn prepare_logs_directory(dir: &Path) -> AuditResult<()> {
	let to_error = |source| AuditError::LogsDirectory {
		path: dir.to_path_buf(),
		source,
	};

	std::fs::create_dir_all(dir).map_err(to_error)?;

	let check_file = dir.join(".sadhana-audit-write-check");
	std::fs::write(&check_file, b"").map_err(to_error)?;
	std::fs::remove_file(&check_file).map_err(to_error)?;
	Ok(())
}

pub struct AuditServiceBuilder {
	config: AuditConfig,
	clock: Arc<dyn Clock>,
	database_sink: Option<Arc<dyn AuditSink>>,
	extra_sinks: Vec<Arc<dyn AuditSink>>,
}

impl AuditServiceBuilder {
	pub fn new(config: AuditConfig) -> Self {
		Self {
			config,
			clock: Arc::new(SystemClock),
			database_sink: None,
			extra_sinks: Vec::new(),
		}
	}

	pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	/// Sink used when `enable_database` is set.
	pub fn database_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
		self.database_sink = Some(sink);
		self
	}

	/// Attaches an additional sink regardless of the enable flags.
	pub fn sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
		self.extra_sinks.push(sink);
		self
	}

	pub fn build(self) -> AuditResult<AuditService> {
		let config = self.config;
		config.validate().map_err(AuditError::ConfigError)?;

		let mut sinks: Vec<Arc<dyn AuditSink>> = Vec::new();

		if config.enable_console {
			#[cfg(feature = "sink-tracing")]
			sinks.push(Arc::new(crate::sink::tracing::TracingAuditSink::new()));
			#[cfg(not(feature = "sink-tracing"))]
			warn!("enable_console is set but the sink-tracing feature is disabled");
		}

		if config.enable_file {
			prepare_logs_directory(&config.logs_directory)?;
			#[cfg(feature = "sink-file")]
			sinks.push(Arc::new(crate::sink::file::FileAuditSink::new(
				&config.logs_directory,
				config.max_log_size,
			)));
			#[cfg(not(feature = "sink-file"))]
			warn!("enable_file is set but the sink-file feature is disabled");
		}

		if config.enable_database {
			let sink = self.database_sink.ok_or_else(|| {
				AuditError::ConfigError(
					"enable_database is set but no database sink was supplied".to_string(),
				)
			})?;
			sinks.push(sink);
		}

		sinks.extend(self.extra_sinks);

		let workers = sinks
			.into_iter()
			.map(|sink| spawn_worker(sink, config.sink_queue_capacity))
			.collect::<Vec<_>>();

		let (notify, _) = broadcast::channel(config.notify_capacity.max(1));

		info!(
			sinks = ?workers.iter().map(|w| w.sink.name().to_string()).collect::<Vec<_>>(),
			max_queue_size = config.max_queue_size,
			logs_directory = %config.logs_directory.display(),
			"audit service started"
		);

		Ok(AuditService {
			detector: SuspiciousActivityDetector::new(&config.suspicious_activity),
			queue: EventQueue::new(config.max_queue_size),
			clock: self.clock,
			workers: Mutex::new(workers),
			notify,
			config,
		})
	}
}

fn spawn_worker(sink: Arc<dyn AuditSink>, capacity: usize) -> SinkWorker {
	let (tx, rx) = mpsc::channel(capacity.max(1));
	let handle = tokio::spawn(run_sink(Arc::clone(&sink), rx));
	SinkWorker { sink, tx, handle }
}

async fn run_sink(sink: Arc<dyn AuditSink>, mut rx: mpsc::Receiver<Arc<AuditEvent>>) {
	while let Some(event) = rx.recv().await {
		if let Err(e) = sink.publish(event).await {
			warn!(sink = sink.name(), error = %e, "audit sink publish failed");
		}
	}
	debug!(sink = sink.name(), "audit sink worker drained");
}

impl AuditService {
	pub fn builder(config: AuditConfig) -> AuditServiceBuilder {
		AuditServiceBuilder::new(config)
	}

	/// Builds a service with the sinks the configuration enables.
	///
	/// Fails when the configuration is invalid or the logs directory can't be
	/// written, so a misconfigured process never starts unaudited.
	pub fn from_config(config: AuditConfig) -> AuditResult<Self> {
		AuditServiceBuilder::new(config).build()
	}

	pub fn config(&self) -> &AuditConfig {
		&self.config
	}

	/// Records an event and returns it in its final form.
	///
	/// Never fails and never waits on sink I/O; persistence happens on the
	/// sink workers.
	///
	/// Under [`QueueOverflowPolicy::Block`] every send runs on its own spawned
	/// task. Those tasks are unbounded and may reach a sink out of order.
	/// Spawning needs a Tokio runtime context, so call from runtime threads (or
	/// `spawn_blocking`) when that policy is set.
	#[instrument(skip_all, fields(event_type = %event_type))]
	pub fn log(&self, event_type: AuditEventType, details: AuditDetails) -> Arc<AuditEvent> {
		let mut event = normalize(event_type, details, self.clock.now());

		if let Some(reason) = self.detector.inspect(&mut event) {
			debug!(audit_id = %event.id, reason = %reason, "event flagged as suspicious");
		}

		let event = Arc::new(event);

		let evicted = self.queue.push(Arc::clone(&event));
		if evicted > 0 {
			debug!(evicted, "audit queue at capacity, evicted oldest entries");
		}

		self.dispatch(&event);

		// Err only means there are no subscribers right now.
		let _ = self.notify.send(Arc::clone(&event));

		event
	}

	fn dispatch(&self, event: &Arc<AuditEvent>) {
		let workers = self.workers.lock();
		for worker in workers.iter() {
			match self.config.sink_overflow_policy {
				QueueOverflowPolicy::Block => {
					let tx = worker.tx.clone();
					let event = Arc::clone(event);
					tokio::spawn(async move {
						let _ = tx.send(event).await;
					});
				}
				QueueOverflowPolicy::DropNewest => {
					if let Err(e) = worker.tx.try_send(Arc::clone(event)) {
						match e {
							mpsc::error::TrySendError::Full(dropped) => warn!(
								sink = worker.sink.name(),
								audit_id = %dropped.id,
								"audit sink queue full, dropping event"
							),
							mpsc::error::TrySendError::Closed(_) => {
								debug!(sink = worker.sink.name(), "audit sink worker closed")
							}
						}
					}
				}
			}
		}
	}

	/// Filtered, newest-first view of the queue.
	pub fn get_logs(&self, query: &AuditQuery) -> AuditResult<QueryPage> {
		self.queue.query(query)
	}

	/// Live feed of every accepted event. Dropping the receiver unsubscribes.
	pub fn subscribe(&self) -> broadcast::Receiver<Arc<AuditEvent>> {
		self.notify.subscribe()
	}

	pub fn queue_len(&self) -> usize {
		self.queue.len()
	}

	/// Evicts detector keys that have been idle for longer than their window.
	pub fn sweep_trackers(&self) -> usize {
		self.detector.sweep(self.clock.now())
	}

	pub fn sink_names(&self) -> Vec<String> {
		self
			.workers
			.lock()
			.iter()
			.map(|w| w.sink.name().to_string())
			.collect()
	}

	/// Runs every sink's health check.
	pub async fn health_check(&self) -> Vec<(String, Result<(), AuditSinkError>)> {
		let sinks: Vec<Arc<dyn AuditSink>> = self
			.workers
			.lock()
			.iter()
			.map(|w| Arc::clone(&w.sink))
			.collect();

		let mut results = Vec::with_capacity(sinks.len());
		for sink in sinks {
			let result = sink.health_check().await;
			results.push((sink.name().to_string(), result));
		}
		results
	}

	/// Closes every sink queue and waits for pending writes to finish.
	///
	/// Events logged afterwards still reach the queue and subscribers but no
	/// sink.
	pub async fn shutdown(&self) {
		let workers = std::mem::take(&mut *self.workers.lock());
		for worker in workers {
			let SinkWorker { sink, tx, handle } = worker;
			drop(tx);
			if let Err(e) = handle.await {
				warn!(sink = sink.name(), error = %e, "audit sink worker panicked");
			}
		}
		info!("audit service shut down");
	}
}
