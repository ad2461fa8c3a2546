// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core event types for audit logging.
//!
//! This module provides the foundational types for the audit system:
//!
//! - [`AuditEventType`]: Closed taxonomy of auditable events
//! - [`AuditSeverity`]: Ordinal urgency, serialized as 1..=4
//! - [`AuditDetails`]: Loosely-populated producer input
//! - [`AuditEvent`]: Canonical record produced by [`normalize`]

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Types of events that can be recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
	// Authentication events
	AuthLogin,
	AuthLogout,
	AuthFailed,
	AuthTokenRefresh,
	AuthPasswordChange,
	#[serde(rename = "AUTH_2FA_ENABLE")]
	Auth2faEnable,
	#[serde(rename = "AUTH_2FA_DISABLE")]
	Auth2faDisable,

	// User management events
	UserCreate,
	UserUpdate,
	UserDelete,
	UserRoleChange,
	UserSuspend,
	UserActivate,

	// Data access events
	DataRead,
	DataCreate,
	DataUpdate,
	DataDelete,
	DataExport,

	// Security events
	SecurityPermissionDenied,
	SecurityRateLimit,
	SecuritySuspiciousActivity,
	SecurityApiKeyUsed,

	// System events
	SystemError,
	SystemWarning,
	SystemConfigChange,
	SystemBackup,

	// Generic request record written by HTTP middleware
	Request,
}

impl AuditEventType {
	pub fn as_str(&self) -> &'static str {
		match self {
			AuditEventType::AuthLogin => "AUTH_LOGIN",
			AuditEventType::AuthLogout => "AUTH_LOGOUT",
			AuditEventType::AuthFailed => "AUTH_FAILED",
			AuditEventType::AuthTokenRefresh => "AUTH_TOKEN_REFRESH",
			AuditEventType::AuthPasswordChange => "AUTH_PASSWORD_CHANGE",
			AuditEventType::Auth2faEnable => "AUTH_2FA_ENABLE",
			AuditEventType::Auth2faDisable => "AUTH_2FA_DISABLE",

			AuditEventType::UserCreate => "USER_CREATE",
			AuditEventType::UserUpdate => "USER_UPDATE",
			AuditEventType::UserDelete => "USER_DELETE",
			AuditEventType::UserRoleChange => "USER_ROLE_CHANGE",
			AuditEventType::UserSuspend => "USER_SUSPEND",
			AuditEventType::UserActivate => "USER_ACTIVATE",

			AuditEventType::DataRead => "DATA_READ",
			AuditEventType::DataCreate => "DATA_CREATE",
			AuditEventType::DataUpdate => "DATA_UPDATE",
			AuditEventType::DataDelete => "DATA_DELETE",
			AuditEventType::DataExport => "DATA_EXPORT",

			AuditEventType::SecurityPermissionDenied => "SECURITY_PERMISSION_DENIED",
			AuditEventType::SecurityRateLimit => "SECURITY_RATE_LIMIT",
			AuditEventType::SecuritySuspiciousActivity => "SECURITY_SUSPICIOUS_ACTIVITY",
			AuditEventType::SecurityApiKeyUsed => "SECURITY_API_KEY_USED",

			AuditEventType::SystemError => "SYSTEM_ERROR",
			AuditEventType::SystemWarning => "SYSTEM_WARNING",
			AuditEventType::SystemConfigChange => "SYSTEM_CONFIG_CHANGE",
			AuditEventType::SystemBackup => "SYSTEM_BACKUP",

			AuditEventType::Request => "REQUEST",
		}
	}

	pub fn all() -> &'static [AuditEventType] {
		&[
			AuditEventType::AuthLogin,
			AuditEventType::AuthLogout,
			AuditEventType::AuthFailed,
			AuditEventType::AuthTokenRefresh,
			AuditEventType::AuthPasswordChange,
			AuditEventType::Auth2faEnable,
			AuditEventType::Auth2faDisable,
			AuditEventType::UserCreate,
			AuditEventType::UserUpdate,
			AuditEventType::UserDelete,
			AuditEventType::UserRoleChange,
			AuditEventType::UserSuspend,
			AuditEventType::UserActivate,
			AuditEventType::DataRead,
			AuditEventType::DataCreate,
			AuditEventType::DataUpdate,
			AuditEventType::DataDelete,
			AuditEventType::DataExport,
			AuditEventType::SecurityPermissionDenied,
			AuditEventType::SecurityRateLimit,
			AuditEventType::SecuritySuspiciousActivity,
			AuditEventType::SecurityApiKeyUsed,
			AuditEventType::SystemError,
			AuditEventType::SystemWarning,
			AuditEventType::SystemConfigChange,
			AuditEventType::SystemBackup,
			AuditEventType::Request,
		]
	}
}

impl fmt::Display for AuditEventType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventType(pub String);

impl fmt::Display for UnknownEventType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "unknown event type '{}'", self.0)
	}
}

impl std::error::Error for UnknownEventType {}

impl FromStr for AuditEventType {
	type Err = UnknownEventType;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		AuditEventType::all()
			.iter()
			.copied()
			.find(|t| t.as_str() == s)
			.ok_or_else(|| UnknownEventType(s.to_string()))
	}
}

/// Ordinal urgency of an audit event.
///
/// Serialized as its numeric level so file trails stay compatible with
/// consumers that compare severities numerically.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum AuditSeverity {
	#[default]
	Low = 1,
	Medium = 2,
	High = 3,
	Critical = 4,
}

impl AuditSeverity {
	pub fn level(&self) -> u8 {
		*self as u8
	}

	pub fn all() -> &'static [AuditSeverity] {
		&[
			AuditSeverity::Low,
			AuditSeverity::Medium,
			AuditSeverity::High,
			AuditSeverity::Critical,
		]
	}
}

impl From<AuditSeverity> for u8 {
	fn from(severity: AuditSeverity) -> Self {
		severity.level()
	}
}

impl TryFrom<u8> for AuditSeverity {
	type Error = String;

	fn try_from(value: u8) -> Result<Self, Self::Error> {
		match value {
			1 => Ok(AuditSeverity::Low),
			2 => Ok(AuditSeverity::Medium),
			3 => Ok(AuditSeverity::High),
			4 => Ok(AuditSeverity::Critical),
			other => Err(format!("severity must be between 1 and 4, got {other}")),
		}
	}
}

impl fmt::Display for AuditSeverity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			AuditSeverity::Low => "LOW",
			AuditSeverity::Medium => "MEDIUM",
			AuditSeverity::High => "HIGH",
			AuditSeverity::Critical => "CRITICAL",
		};
		write!(f, "{s}")
	}
}

/// Outcome recorded with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
	#[default]
	Success,
	Failed,
	Denied,
	Blocked,
	RateLimited,
	Info,
	Error,
}

impl fmt::Display for AuditStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			AuditStatus::Success => "success",
			AuditStatus::Failed => "failed",
			AuditStatus::Denied => "denied",
			AuditStatus::Blocked => "blocked",
			AuditStatus::RateLimited => "rate_limited",
			AuditStatus::Info => "info",
			AuditStatus::Error => "error",
		};
		write!(f, "{s}")
	}
}

/// Structured error information attached to failure events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub code: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status_code: Option<u16>,
}

/// Opaque producer-defined payload.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Canonical audit record.
///
/// Built once by [`normalize`], finalized by the detector, and shared as
/// `Arc<AuditEvent>` from then on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
	pub id: Uuid,
	pub timestamp: DateTime<Utc>,
	pub event_type: AuditEventType,
	pub user_id: Option<String>,
	pub username: Option<String>,
	pub ip_address: Option<String>,
	pub user_agent: Option<String>,
	pub session_id: Option<String>,
	pub severity: AuditSeverity,
	pub resource: Option<String>,
	pub action: Option<String>,
	pub status: AuditStatus,
	pub description: String,
	pub metadata: Metadata,
	pub error: Option<ErrorInfo>,
	#[serde(default)]
	pub flagged: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub suspicious_reason: Option<String>,
}

impl AuditEvent {
	/// Key the detector tracks this event under.
	pub fn actor_key(&self) -> Option<&str> {
		self.user_id.as_deref().or(self.ip_address.as_deref())
	}

	pub(crate) fn flag(&mut self, reason: String) {
		self.flagged = true;
		self.suspicious_reason = Some(reason);
		self.severity = self.severity.max(AuditSeverity::High);
	}
}

/// Producer-supplied fields for an event. Anything left unset gets a default.
#[derive(Debug, Clone, Default)]
pub struct AuditDetails {
	pub user_id: Option<String>,
	pub username: Option<String>,
	pub ip_address: Option<String>,
	pub user_agent: Option<String>,
	pub session_id: Option<String>,
	pub severity: Option<AuditSeverity>,
	pub resource: Option<String>,
	pub action: Option<String>,
	pub status: Option<AuditStatus>,
	pub description: Option<String>,
	pub metadata: Option<Metadata>,
	pub error: Option<ErrorInfo>,
}

impl AuditDetails {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
		self.user_id = Some(user_id.into());
		self
	}

	pub fn username(mut self, username: impl Into<String>) -> Self {
		self.username = Some(username.into());
		self
	}

	pub fn ip_address(mut self, ip: impl Into<String>) -> Self {
		self.ip_address = Some(ip.into());
		self
	}

	pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
		self.user_agent = Some(ua.into());
		self
	}

	pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
		self.session_id = Some(session_id.into());
		self
	}

	pub fn severity(mut self, severity: AuditSeverity) -> Self {
		self.severity = Some(severity);
		self
	}

	pub fn resource(mut self, resource: impl Into<String>) -> Self {
		self.resource = Some(resource.into());
		self
	}

	pub fn action(mut self, action: impl Into<String>) -> Self {
		self.action = Some(action.into());
		self
	}

	pub fn status(mut self, status: AuditStatus) -> Self {
		self.status = Some(status);
		self
	}

	pub fn description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());
		self
	}

	pub fn metadata(mut self, metadata: Metadata) -> Self {
		self.metadata = Some(metadata);
		self
	}

	/// Adds a single metadata entry, creating the map if needed.
	pub fn meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
		self
			.metadata
			.get_or_insert_with(Metadata::new)
			.insert(key.into(), value.into());
		self
	}

	pub fn error(mut self, error: ErrorInfo) -> Self {
		self.error = Some(error);
		self
	}
}

/// Builds the canonical record. Never fails; unset fields take their defaults
/// and supplied values pass through untouched.
pub fn normalize(
	event_type: AuditEventType,
	details: AuditDetails,
	timestamp: DateTime<Utc>,
) -> AuditEvent {
	AuditEvent {
		id: Uuid::new_v4(),
		timestamp,
		event_type,
		user_id: details.user_id,
		username: details.username,
		ip_address: details.ip_address,
		user_agent: details.user_agent,
		session_id: details.session_id,
		severity: details.severity.unwrap_or_default(),
		resource: details.resource,
		action: details.action,
		status: details.status.unwrap_or_default(),
		description: details.description.unwrap_or_default(),
		metadata: details.metadata.unwrap_or_default(),
		error: details.error,
		flagged: false,
		suspicious_reason: None,
	}
}
