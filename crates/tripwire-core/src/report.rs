// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error reports: assembly from a collector trace plus context, and the wire
//! encoding expected by the ingestion endpoint.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::context::{EnvironmentSnapshot, UserIdentity};
use crate::frame::{normalize_frames, RawStackTrace, StackFrame};
use crate::session::{CustomData, SessionContext};

/// Client name sent with every report.
pub const CLIENT_NAME: &str = "tripwire-rust";
/// Client version sent with every report.
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prefix some runtimes add to uncaught error messages.
pub const UNCAUGHT_PREFIX: &str = "Uncaught ";
/// Message used when the collector supplied none.
pub const DEFAULT_MESSAGE: &str = "Script error";
/// Class name used when the collector supplied none.
pub const DEFAULT_CLASS_NAME: &str = "Error";
/// Version sent when the application never set one.
pub const VERSION_NOT_SUPPLIED: &str = "Not supplied";

/// Identifies the reporting client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClientInfo {
	pub name: String,
	pub version: String,
}

impl Default for ClientInfo {
	fn default() -> Self {
		Self {
			name: CLIENT_NAME.to_string(),
			version: CLIENT_VERSION.to_string(),
		}
	}
}

/// Per-call additions to a report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportOptions {
	pub custom_data: Option<CustomData>,
	pub tags: Option<Vec<String>>,
}

impl ReportOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn custom_data(mut self, data: CustomData) -> Self {
		self.custom_data = Some(data);
		self
	}

	pub fn tags<I, S>(mut self, tags: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.tags = Some(tags.into_iter().map(Into::into).collect());
		self
	}
}

/// A captured exception with its context, immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorReport {
	pub occurred_on: DateTime<Utc>,
	pub error_class_name: String,
	pub message: String,
	pub stack_frames: Vec<StackFrame>,
	pub environment: EnvironmentSnapshot,
	pub client_info: ClientInfo,
	pub user_custom_data: CustomData,
	pub tags: Vec<String>,
	pub user_identity: Option<UserIdentity>,
	pub version: Option<String>,
}

impl ErrorReport {
	/// Builds a report. Performs no I/O; the environment is read by the caller.
	pub fn build(
		trace: &RawStackTrace,
		options: &ReportOptions,
		session: &SessionContext,
		environment: EnvironmentSnapshot,
		occurred_on: DateTime<Utc>,
	) -> Self {
		Self {
			occurred_on,
			error_class_name: trace
				.name
				.clone()
				.filter(|n| !n.is_empty())
				.unwrap_or_else(|| DEFAULT_CLASS_NAME.to_string()),
			message: normalize_message(trace.message.as_deref()),
			stack_frames: normalize_frames(&trace.stack),
			environment,
			client_info: ClientInfo::default(),
			user_custom_data: session.merge_custom_data(options.custom_data.as_ref()),
			tags: session.merge_tags(options.tags.as_deref()),
			user_identity: session.user.clone(),
			version: session.version.clone(),
		}
	}
}

/// Defaults an absent message and strips the runtime's "Uncaught " prefix.
pub fn normalize_message(message: Option<&str>) -> String {
	match message {
		None | Some("") => DEFAULT_MESSAGE.to_string(),
		Some(message) => message
			.strip_prefix(UNCAUGHT_PREFIX)
			.unwrap_or(message)
			.to_string(),
	}
}

impl Serialize for ErrorReport {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let env = &self.environment;
		ReportWire {
			occurred_on: &self.occurred_on,
			details: DetailsWire {
				error: ErrorWire {
					class_name: &self.error_class_name,
					message: &self.message,
					stack_trace: &self.stack_frames,
				},
				environment: EnvironmentWire {
					utc_offset: env.utc_offset_hours,
					user_language: env.language.as_deref(),
					browser_width: env.viewport.width,
					browser_height: env.viewport.height,
					screen_width: env.screen.width,
					screen_height: env.screen.height,
					color_depth: env.color_depth,
					browser_name: env.browser.name.as_deref(),
					browser_version: env.browser.version.as_deref(),
					platform: env.platform.as_deref(),
				},
				client: &self.client_info,
				user_custom_data: &self.user_custom_data,
				tags: &self.tags,
				request: RequestWire {
					url: &env.url,
					query_string: &env.query_string,
					headers: HeadersWire {
						user_agent: &env.user_agent,
						referer: env.referrer.as_deref(),
						host: env.host.as_deref(),
					},
				},
				version: self.version.as_deref().unwrap_or(VERSION_NOT_SUPPLIED),
				user: self.user_identity.as_ref(),
			},
		}
		.serialize(serializer)
	}
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ReportWire<'a> {
	occurred_on: &'a DateTime<Utc>,
	details: DetailsWire<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DetailsWire<'a> {
	error: ErrorWire<'a>,
	environment: EnvironmentWire<'a>,
	client: &'a ClientInfo,
	user_custom_data: &'a CustomData,
	tags: &'a [String],
	request: RequestWire<'a>,
	version: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	user: Option<&'a UserIdentity>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorWire<'a> {
	class_name: &'a str,
	message: &'a str,
	stack_trace: &'a [StackFrame],
}

#[derive(Serialize)]
struct EnvironmentWire<'a> {
	#[serde(rename = "UtcOffset")]
	utc_offset: f64,
	#[serde(rename = "User-Language", skip_serializing_if = "Option::is_none")]
	user_language: Option<&'a str>,
	#[serde(rename = "Browser-Width")]
	browser_width: u32,
	#[serde(rename = "Browser-Height")]
	browser_height: u32,
	#[serde(rename = "Screen-Width")]
	screen_width: u32,
	#[serde(rename = "Screen-Height")]
	screen_height: u32,
	#[serde(rename = "Color-Depth")]
	color_depth: u32,
	#[serde(rename = "Browser-Name", skip_serializing_if = "Option::is_none")]
	browser_name: Option<&'a str>,
	#[serde(rename = "Browser-Version", skip_serializing_if = "Option::is_none")]
	browser_version: Option<&'a str>,
	#[serde(rename = "Platform", skip_serializing_if = "Option::is_none")]
	platform: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RequestWire<'a> {
	url: &'a str,
	query_string: &'a BTreeMap<String, String>,
	headers: HeadersWire<'a>,
}

#[derive(Serialize)]
struct HeadersWire<'a> {
	#[serde(rename = "User-Agent")]
	user_agent: &'a str,
	#[serde(rename = "Referer", skip_serializing_if = "Option::is_none")]
	referer: Option<&'a str>,
	#[serde(rename = "Host", skip_serializing_if = "Option::is_none")]
	host: Option<&'a str>,
}
