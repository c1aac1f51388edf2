// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Custom events: explicit application signals that share the report
//! delivery path.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::CoreError;
use crate::session::SessionContext;

/// Discriminates payloads for routing and queue storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
	Exception,
	Log,
	Track,
}

impl fmt::Display for PayloadKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Exception => write!(f, "exception"),
			Self::Log => write!(f, "log"),
			Self::Track => write!(f, "track"),
		}
	}
}

impl FromStr for PayloadKind {
	type Err = CoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"exception" => Ok(Self::Exception),
			"log" => Ok(Self::Log),
			"track" => Ok(Self::Track),
			_ => Err(CoreError::InvalidPayloadKind(s.to_string())),
		}
	}
}

/// Severity of a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
	Debug,
	Info,
	Warn,
	Error,
}

impl fmt::Display for LogLevel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Debug => write!(f, "debug"),
			Self::Info => write!(f, "info"),
			Self::Warn => write!(f, "warn"),
			Self::Error => write!(f, "error"),
		}
	}
}

impl FromStr for LogLevel {
	type Err = CoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"debug" => Ok(Self::Debug),
			"info" | "log" => Ok(Self::Info),
			"warn" => Ok(Self::Warn),
			"error" => Ok(Self::Error),
			_ => Err(CoreError::InvalidLogLevel(s.to_string())),
		}
	}
}

/// Which kind of custom event was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
	Log(LogLevel),
	Track,
}

impl EventKind {
	pub fn payload_kind(self) -> PayloadKind {
		match self {
			Self::Log(_) => PayloadKind::Log,
			Self::Track => PayloadKind::Track,
		}
	}
}

/// An application-emitted event.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomEvent {
	pub occurred_on: DateTime<Utc>,
	pub kind: EventKind,
	pub message: String,
	/// Comma-joined tags, with the session user and version appended.
	pub tags: String,
	pub data: serde_json::Value,
}

impl CustomEvent {
	/// Builds an event, or `None` when the message is empty.
	pub fn build(
		kind: EventKind,
		message: &str,
		tags: &[String],
		data: serde_json::Value,
		session: &SessionContext,
		occurred_on: DateTime<Utc>,
	) -> Option<Self> {
		if message.is_empty() {
			return None;
		}

		Some(Self {
			occurred_on,
			kind,
			message: message.to_string(),
			tags: join_tags(tags, session),
			data,
		})
	}
}

/// Joins tags with commas, appending the session user identifier and version.
pub fn join_tags(tags: &[String], session: &SessionContext) -> String {
	let mut parts: Vec<&str> = tags.iter().map(String::as_str).collect();
	if let Some(user) = &session.user {
		parts.push(&user.identifier);
	}
	if let Some(version) = &session.version {
		parts.push(version);
	}
	parts.join(",")
}

impl Serialize for CustomEvent {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let level = match self.kind {
			EventKind::Log(level) => Some(level),
			EventKind::Track => None,
		};
		EventWire {
			occurred_on: &self.occurred_on,
			message: &self.message,
			tags: &self.tags,
			metadata: &self.data,
			level,
		}
		.serialize(serializer)
	}
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct EventWire<'a> {
	occurred_on: &'a DateTime<Utc>,
	message: &'a str,
	#[serde(skip_serializing_if = "str::is_empty")]
	tags: &'a str,
	metadata: &'a serde_json::Value,
	#[serde(rename = "Type", skip_serializing_if = "Option::is_none")]
	level: Option<LogLevel>,
}
