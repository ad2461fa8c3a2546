// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Convenience wrappers that map common application events onto [`AuditService::log`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::event::{AuditDetails, AuditEvent, AuditEventType, AuditSeverity, AuditStatus, Metadata};
use crate::pipeline::AuditService;

/// Kind of data operation recorded by [`AuditService::log_data_access`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataAction {
	Read,
	Create,
	Update,
	Delete,
	Export,
}

impl DataAction {
	pub fn as_str(&self) -> &'static str {
		match self {
			DataAction::Read => "read",
			DataAction::Create => "create",
			DataAction::Update => "update",
			DataAction::Delete => "delete",
			DataAction::Export => "export",
		}
	}

	pub fn event_type(&self) -> AuditEventType {
		match self {
			DataAction::Read => AuditEventType::DataRead,
			DataAction::Create => AuditEventType::DataCreate,
			DataAction::Update => AuditEventType::DataUpdate,
			DataAction::Delete => AuditEventType::DataDelete,
			DataAction::Export => AuditEventType::DataExport,
		}
	}

	/// Mutating action implied by an HTTP method, if any.
	pub fn from_http_method(method: &str) -> Option<Self> {
		match method.to_ascii_uppercase().as_str() {
			"POST" => Some(DataAction::Create),
			"PUT" | "PATCH" => Some(DataAction::Update),
			"DELETE" => Some(DataAction::Delete),
			_ => None,
		}
	}
}

impl fmt::Display for DataAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for DataAction {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"read" => Ok(DataAction::Read),
			"create" => Ok(DataAction::Create),
			"update" => Ok(DataAction::Update),
			"delete" => Ok(DataAction::Delete),
			"export" => Ok(DataAction::Export),
			other => Err(format!("unknown data action '{other}'")),
		}
	}
}

/// Event type and severity for a finished HTTP response.
pub fn classify_response(status_code: u16) -> (AuditEventType, AuditSeverity) {
	match status_code {
		403 => (AuditEventType::SecurityPermissionDenied, AuditSeverity::Medium),
		401 => (AuditEventType::AuthFailed, AuditSeverity::Medium),
		500.. => (AuditEventType::SystemError, AuditSeverity::High),
		_ => (AuditEventType::Request, AuditSeverity::Low),
	}
}

/// What request middleware knows about a completed request.
#[derive(Debug, Clone, Default)]
pub struct RequestRecord {
	pub method: String,
	pub path: String,
	pub status_code: u16,
	pub duration: Duration,
	pub user_id: Option<String>,
	pub username: Option<String>,
	pub ip_address: Option<String>,
	pub user_agent: Option<String>,
	pub session_id: Option<String>,
}

fn owned(value: Option<&str>) -> Option<String> {
	value.map(str::to_string)
}

impl AuditService {
	pub fn log_auth_attempt(
		&self,
		user_id: Option<&str>,
		username: Option<&str>,
		ip_address: Option<&str>,
		success: bool,
		reason: Option<&str>,
	) -> Arc<AuditEvent> {
		let (event_type, severity, status, description) = if success {
			(
				AuditEventType::AuthLogin,
				AuditSeverity::Low,
				AuditStatus::Success,
				"User login".to_string(),
			)
		} else {
			(
				AuditEventType::AuthFailed,
				AuditSeverity::Medium,
				AuditStatus::Failed,
				format!("Login failed: {}", reason.unwrap_or("unknown")),
			)
		};

		let details = AuditDetails {
			user_id: owned(user_id),
			username: owned(username),
			ip_address: owned(ip_address),
			..Default::default()
		}
		.severity(severity)
		.status(status)
		.description(description)
		.meta("reason", reason);

		self.log(event_type, details)
	}

	pub fn log_data_access(
		&self,
		user_id: Option<&str>,
		action: DataAction,
		resource: &str,
		resource_id: Option<&str>,
		ip_address: Option<&str>,
		details: Metadata,
	) -> Arc<AuditEvent> {
		let severity = if action == DataAction::Delete {
			AuditSeverity::High
		} else {
			AuditSeverity::Low
		};

		let mut metadata = Metadata::new();
		metadata.insert("resourceId".to_string(), json!(resource_id));
		metadata.extend(details);

		let details = AuditDetails {
			user_id: owned(user_id),
			ip_address: owned(ip_address),
			..Default::default()
		}
		.resource(resource)
		.action(action.as_str())
		.status(AuditStatus::Success)
		.severity(severity)
		.description(format!("{action} operation on {resource}"))
		.metadata(metadata);

		self.log(action.event_type(), details)
	}

	pub fn log_permission_denial(
		&self,
		user_id: Option<&str>,
		ip_address: Option<&str>,
		action: &str,
		resource: &str,
	) -> Arc<AuditEvent> {
		let details = AuditDetails {
			user_id: owned(user_id),
			ip_address: owned(ip_address),
			..Default::default()
		}
		.action(action)
		.resource(resource)
		.severity(AuditSeverity::Medium)
		.status(AuditStatus::Denied)
		.description(format!("Permission denied for {action} on {resource}"));

		self.log(AuditEventType::SecurityPermissionDenied, details)
	}

	pub fn log_rate_limit(
		&self,
		user_id: Option<&str>,
		ip_address: Option<&str>,
		endpoint: &str,
		limit: u32,
		window: &str,
	) -> Arc<AuditEvent> {
		let details = AuditDetails {
			user_id: owned(user_id),
			ip_address: owned(ip_address),
			..Default::default()
		}
		.resource(endpoint)
		.severity(AuditSeverity::Medium)
		.status(AuditStatus::RateLimited)
		.description(format!("Rate limit exceeded: {limit} requests per {window}"))
		.meta("limit", limit)
		.meta("window", window);

		self.log(AuditEventType::SecurityRateLimit, details)
	}

	/// Records a blocked security event. Fields set in `details` win over the
	/// HIGH/`blocked` defaults.
	pub fn log_security_event(
		&self,
		event_type: AuditEventType,
		user_id: Option<&str>,
		ip_address: Option<&str>,
		mut details: AuditDetails,
	) -> Arc<AuditEvent> {
		details.user_id = details.user_id.or_else(|| owned(user_id));
		details.ip_address = details.ip_address.or_else(|| owned(ip_address));
		details.severity.get_or_insert(AuditSeverity::High);
		details.status.get_or_insert(AuditStatus::Blocked);
		details
			.description
			.get_or_insert_with(|| event_type.to_string());

		self.log(event_type, details)
	}

	pub fn log_system_event(
		&self,
		event_type: AuditEventType,
		severity: AuditSeverity,
		description: impl Into<String>,
		metadata: Metadata,
	) -> Arc<AuditEvent> {
		let details = AuditDetails::new()
			.severity(severity)
			.status(AuditStatus::Info)
			.description(description)
			.metadata(metadata);

		self.log(event_type, details)
	}

	/// Records a completed HTTP request, classified by its status code.
	pub fn log_request(&self, request: RequestRecord) -> Arc<AuditEvent> {
		let (event_type, severity) = classify_response(request.status_code);
		let status = if request.status_code >= 400 {
			AuditStatus::Failed
		} else {
			AuditStatus::Success
		};

		let details = AuditDetails {
			user_id: request.user_id,
			username: request.username,
			ip_address: request.ip_address,
			user_agent: request.user_agent,
			session_id: request.session_id,
			..Default::default()
		}
		.resource(request.path.as_str())
		.action(request.method.as_str())
		.status(status)
		.severity(severity)
		.description(format!("{} {}", request.method, request.path))
		.meta("method", request.method.as_str())
		.meta("path", request.path.as_str())
		.meta("statusCode", request.status_code)
		.meta("duration", format!("{}ms", request.duration.as_millis()));

		self.log(event_type, details)
	}
}
