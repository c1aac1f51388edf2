// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Context types attached to reports (user identity, environment snapshot).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity of the user the report is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserIdentity {
	pub identifier: String,
}

impl UserIdentity {
	pub fn new(identifier: impl Into<String>) -> Self {
		Self {
			identifier: identifier.into(),
		}
	}
}

impl From<&str> for UserIdentity {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

impl From<String> for UserIdentity {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

/// Width and height in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
	pub width: u32,
	pub height: u32,
}

impl Dimensions {
	pub fn new(width: u32, height: u32) -> Self {
		Self { width, height }
	}
}

/// Browser name and version parsed from a user agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserContext {
	/// "Chrome", "Firefox", "Safari", "Edge", "Opera", "Internet Explorer"
	pub name: Option<String>,
	pub version: Option<String>,
}

/// Point-in-time read of the host environment, taken once per report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
	/// Offset from UTC in hours, e.g. `10.0` or `-3.5`.
	pub utc_offset_hours: f64,
	pub language: Option<String>,
	pub viewport: Dimensions,
	pub screen: Dimensions,
	pub color_depth: u32,
	pub platform: Option<String>,
	pub user_agent: String,
	pub browser: BrowserContext,
	pub url: String,
	pub referrer: Option<String>,
	pub host: Option<String>,
	pub query_string: BTreeMap<String, String>,
}

/// Parses the browser name and version out of a user agent string.
///
/// Order matters: Edge and Opera advertise Chrome, and Chrome advertises Safari.
pub fn parse_user_agent(user_agent: &str) -> BrowserContext {
	const TOKENS: &[(&str, &str)] = &[
		("Edg/", "Edge"),
		("Edge/", "Edge"),
		("OPR/", "Opera"),
		("Opera/", "Opera"),
		("Firefox/", "Firefox"),
		("Chrome/", "Chrome"),
		("MSIE ", "Internet Explorer"),
	];

	for (token, name) in TOKENS {
		if let Some(version) = version_after(user_agent, token) {
			return BrowserContext {
				name: Some((*name).to_string()),
				version: Some(version),
			};
		}
	}

	if user_agent.contains("Trident/") {
		return BrowserContext {
			name: Some("Internet Explorer".to_string()),
			version: version_after(user_agent, "rv:"),
		};
	}

	if user_agent.contains("Safari/") {
		return BrowserContext {
			name: Some("Safari".to_string()),
			version: version_after(user_agent, "Version/"),
		};
	}

	BrowserContext::default()
}

fn version_after(haystack: &str, token: &str) -> Option<String> {
	let start = haystack.find(token)? + token.len();
	let version: String = haystack[start..]
		.chars()
		.take_while(|c| c.is_ascii_digit() || *c == '.')
		.collect();
	if version.is_empty() {
		None
	} else {
		Some(version)
	}
}

/// Parses a query string (with or without the leading `?`) into a map.
///
/// Keys are percent-decoded, values are kept as they appear. Segments that
/// do not split into exactly one key and one value are skipped.
pub fn parse_query_string(query: &str) -> BTreeMap<String, String> {
	let query = query.strip_prefix('?').unwrap_or(query);
	let mut map = BTreeMap::new();

	for segment in query.split('&') {
		let parts: Vec<&str> = segment.split('=').collect();
		if let [key, value] = parts.as_slice() {
			let key = urlencoding::decode(key)
				.map(|k| k.into_owned())
				.unwrap_or_else(|_| (*key).to_string());
			map.insert(key, (*value).to_string());
		}
	}

	map
}
