// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sadhana_audit::{AuditEventType, AuditService, AuditSeverity, Metadata};
use sadhana_audit_config::{load_config, load_config_with_file, LogFormat, LoggingConfig, SadhanaConfig};

/// Sadhana audit trail maintenance
#[derive(Parser, Debug)]
#[command(name = "sadhana-audit", version)]
struct Args {
	/// Config file (defaults to /etc/sadhana/audit.toml)
	#[arg(long, short, env = "SADHANA_AUDIT_CONFIG", global = true)]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Delete audit files older than the retention horizon
	Cleanup,

	/// Print the resolved configuration as TOML
	ShowConfig,

	/// Verify the logs directory and every configured sink
	Check,

	/// Record a single system event, e.g. from a backup job
	Log {
		/// Event type, e.g. SYSTEM_BACKUP
		#[arg(long, default_value = "SYSTEM_BACKUP")]
		event_type: String,

		/// Severity from 1 (low) to 4 (critical)
		#[arg(long, default_value_t = 1)]
		severity: u8,

		/// Human-readable description
		description: String,

		/// Metadata as a JSON object
		#[arg(long)]
		metadata: Option<String>,
	},
}

fn init_tracing(logging: &LoggingConfig) {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
	let registry = tracing_subscriber::registry().with(filter);

	match logging.format {
		LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
		LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer().pretty()).init(),
	}
}

fn load(path: Option<PathBuf>) -> Result<SadhanaConfig> {
	let config = match path {
		Some(path) => load_config_with_file(path),
		None => load_config(),
	};
	config.context("failed to load audit configuration")
}

fn parse_metadata(raw: Option<&str>) -> Result<Metadata> {
	let Some(raw) = raw else {
		return Ok(Metadata::new());
	};
	match serde_json::from_str::<serde_json::Value>(raw).context("--metadata is not valid JSON")? {
		serde_json::Value::Object(map) => Ok(map),
		other => bail!("--metadata must be a JSON object, got {other}"),
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse();
	let config = load(args.config)?;
	init_tracing(&config.logging);

	match args.command {
		Command::ShowConfig => {
			let rendered =
				toml::to_string_pretty(&config).context("failed to render configuration")?;
			println!("{rendered}");
		}
		Command::Cleanup => {
			let service = AuditService::from_config(config.audit)?;
			let report = service.clean_old_logs().await;
			service.shutdown().await;
			println!("{}", serde_json::to_string_pretty(&report)?);
		}
		Command::Check => {
			let service = AuditService::from_config(config.audit)?;
			let mut failed = 0;
			for (sink, result) in service.health_check().await {
				match result {
					Ok(()) => info!(sink = %sink, "sink healthy"),
					Err(e) => {
						failed += 1;
						warn!(sink = %sink, error = %e, "sink unhealthy");
					}
				}
			}
			service.shutdown().await;
			if failed > 0 {
				bail!("{failed} audit sink(s) failed their health check");
			}
		}
		Command::Log {
			event_type,
			severity,
			description,
			metadata,
		} => {
			let event_type: AuditEventType = event_type.parse()?;
			let severity = AuditSeverity::try_from(severity).map_err(anyhow::Error::msg)?;
			let metadata = parse_metadata(metadata.as_deref())?;

			let service = AuditService::from_config(config.audit)?;
			let event = service.log_system_event(event_type, severity, description, metadata);
			service.shutdown().await;
			println!("{}", serde_json::to_string(event.as_ref())?);
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_args_parse_subcommands() {
		let args = Args::parse_from(["sadhana-audit", "--config", "/tmp/a.toml", "cleanup"]);
		assert_eq!(args.config, Some(PathBuf::from("/tmp/a.toml")));
		assert!(matches!(args.command, Command::Cleanup));

		let args = Args::parse_from([
			"sadhana-audit",
			"log",
			"--severity",
			"3",
			"nightly backup done",
		]);
		match args.command {
			Command::Log {
				event_type,
				severity,
				description,
				metadata,
			} => {
				assert_eq!(event_type, "SYSTEM_BACKUP");
				assert_eq!(severity, 3);
				assert_eq!(description, "nightly backup done");
				assert!(metadata.is_none());
			}
			other => panic!("unexpected command {other:?}"),
		}
	}

	#[test]
	fn test_parse_metadata() {
		assert!(parse_metadata(None).unwrap().is_empty());
		let map = parse_metadata(Some(r#"{"sizeBytes": 42}"#)).unwrap();
		assert_eq!(map["sizeBytes"], 42);
		assert!(parse_metadata(Some("[1,2]")).is_err());
		assert!(parse_metadata(Some("{nope")).is_err());
	}
}
