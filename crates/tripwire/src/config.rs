// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client configuration: options accepted by `initialize` and the resolved
//! configuration held by the context store.

use std::fmt;

use serde::Deserialize;
use tripwire_core::PayloadKind;
use url::Url;

/// Ingestion endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "https://api.tripwire.dev";

/// How the POST path is formed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStyle {
	/// `{endpoint}/api/entries`
	#[default]
	Unified,
	/// `{endpoint}/api/entries/{kind}`
	PerKind,
}

/// Options passed to `initialize`. Unset fields take their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientOptions {
	pub endpoint: Option<String>,
	pub allow_insecure_transport: Option<bool>,
	pub debug: Option<bool>,
	pub offline_save_enabled: Option<bool>,
	pub route: Option<RouteStyle>,
	/// Must be a JSON array of strings to take effect.
	pub allowed_domains: Option<serde_json::Value>,
}

impl ClientOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
		self.endpoint = Some(endpoint.into());
		self
	}

	pub fn allow_insecure_transport(mut self, allow: bool) -> Self {
		self.allow_insecure_transport = Some(allow);
		self
	}

	pub fn debug(mut self, debug: bool) -> Self {
		self.debug = Some(debug);
		self
	}

	pub fn offline_save(mut self, enabled: bool) -> Self {
		self.offline_save_enabled = Some(enabled);
		self
	}

	pub fn route(mut self, route: RouteStyle) -> Self {
		self.route = Some(route);
		self
	}

	/// Loads options from `TRIPWIRE_*` environment variables.
	///
	/// - `TRIPWIRE_ENDPOINT`
	/// - `TRIPWIRE_DEBUG`, `TRIPWIRE_OFFLINE_SAVE`, `TRIPWIRE_ALLOW_INSECURE` (`1`/`true`)
	/// - `TRIPWIRE_ALLOWED_DOMAINS` (comma separated)
	pub fn from_env() -> Self {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
		let flag = |name: &str| {
			lookup(name).map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
		};

		let allowed_domains = lookup("TRIPWIRE_ALLOWED_DOMAINS").map(|raw| {
			serde_json::Value::Array(
				raw.split(',')
					.map(str::trim)
					.filter(|d| !d.is_empty())
					.map(|d| serde_json::Value::String(d.to_string()))
					.collect(),
			)
		});

		Self {
			endpoint: lookup("TRIPWIRE_ENDPOINT"),
			allow_insecure_transport: flag("TRIPWIRE_ALLOW_INSECURE"),
			debug: flag("TRIPWIRE_DEBUG"),
			offline_save_enabled: flag("TRIPWIRE_OFFLINE_SAVE"),
			route: None,
			allowed_domains,
		}
	}
}

/// Resolved configuration. Replaced wholesale by `initialize`.
#[derive(Clone, PartialEq, Eq)]
pub struct Configuration {
	pub api_key: String,
	pub endpoint: String,
	pub allow_insecure_transport: bool,
	pub debug: bool,
	pub offline_save_enabled: bool,
	pub route: RouteStyle,
}

impl Default for Configuration {
	fn default() -> Self {
		Self {
			api_key: String::new(),
			endpoint: DEFAULT_ENDPOINT.to_string(),
			allow_insecure_transport: false,
			debug: false,
			offline_save_enabled: false,
			route: RouteStyle::Unified,
		}
	}
}

impl fmt::Debug for Configuration {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Configuration")
			.field("api_key", &if self.api_key.is_empty() { "" } else { "[REDACTED]" })
			.field("endpoint", &self.endpoint)
			.field("allow_insecure_transport", &self.allow_insecure_transport)
			.field("debug", &self.debug)
			.field("offline_save_enabled", &self.offline_save_enabled)
			.field("route", &self.route)
			.finish()
	}
}

impl Configuration {
	/// Resolves options on top of the defaults.
	pub fn from_options(api_key: impl Into<String>, options: &ClientOptions) -> Self {
		let defaults = Self::default();
		Self {
			api_key: api_key.into(),
			endpoint: options
				.endpoint
				.as_deref()
				.map(|e| e.trim_end_matches('/').to_string())
				.unwrap_or(defaults.endpoint),
			allow_insecure_transport: options
				.allow_insecure_transport
				.unwrap_or(defaults.allow_insecure_transport),
			debug: options.debug.unwrap_or(defaults.debug),
			offline_save_enabled: options
				.offline_save_enabled
				.unwrap_or(defaults.offline_save_enabled),
			route: options.route.unwrap_or(defaults.route),
		}
	}

	pub fn has_api_key(&self) -> bool {
		!self.api_key.is_empty()
	}

	/// Builds the POST URL with the URL-encoded `apikey` query parameter.
	pub fn entries_url(&self, kind: PayloadKind) -> Result<Url, url::ParseError> {
		let path = match self.route {
			RouteStyle::Unified => "api/entries".to_string(),
			RouteStyle::PerKind => format!("api/entries/{kind}"),
		};
		let mut url = Url::parse(&format!("{}/{}", self.endpoint, path))?;
		url.query_pairs_mut().append_pair("apikey", &self.api_key);
		Ok(url)
	}

	/// Plain HTTP endpoints are only used when explicitly allowed.
	pub fn permits(&self, url: &Url) -> bool {
		url.scheme() == "https" || self.allow_insecure_transport
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	#[test]
	fn test_defaults() {
		let config = Configuration::from_options("KEY", &ClientOptions::default());
		assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
		assert!(!config.offline_save_enabled);
		assert!(!config.debug);
		assert_eq!(config.route, RouteStyle::Unified);
		assert!(config.has_api_key());
	}

	#[test]
	fn test_empty_key() {
		let config = Configuration::from_options("", &ClientOptions::default());
		assert!(!config.has_api_key());
	}

	#[test]
	fn test_unified_url_encodes_key() {
		let config = Configuration::from_options(
			"a key&b",
			&ClientOptions::new().endpoint("https://ingest.example.com/"),
		);
		let url = config.entries_url(PayloadKind::Exception).unwrap();
		assert_eq!(url.path(), "/api/entries");
		assert_eq!(url.query(), Some("apikey=a+key%26b"));
		let pairs: Vec<_> = url.query_pairs().collect();
		assert_eq!(pairs[0].1, "a key&b");
	}

	#[test]
	fn test_per_kind_url() {
		let config = Configuration::from_options(
			"KEY",
			&ClientOptions::new()
				.endpoint("https://ingest.example.com")
				.route(RouteStyle::PerKind),
		);
		let url = config.entries_url(PayloadKind::Track).unwrap();
		assert_eq!(url.path(), "/api/entries/track");
	}

	#[test]
	fn test_insecure_endpoint_requires_opt_in() {
		let mut config =
			Configuration::from_options("KEY", &ClientOptions::new().endpoint("http://localhost:9000"));
		let url = config.entries_url(PayloadKind::Log).unwrap();
		assert!(!config.permits(&url));

		config.allow_insecure_transport = true;
		assert!(config.permits(&url));
	}

	#[test]
	fn test_debug_redacts_api_key() {
		let config = Configuration::from_options("super-secret", &ClientOptions::default());
		let printed = format!("{config:?}");
		assert!(!printed.contains("super-secret"));
		assert!(printed.contains("[REDACTED]"));
	}

	#[test]
	fn test_options_from_json() {
		let options: ClientOptions = serde_json::from_str(
			r#"{"endpoint":"https://e.example.com","offlineSaveEnabled":true,"route":"per_kind","allowedDomains":["a.com"]}"#,
		)
		.unwrap();
		assert_eq!(options.offline_save_enabled, Some(true));
		assert_eq!(options.route, Some(RouteStyle::PerKind));
		assert!(options.allowed_domains.unwrap().is_array());
	}

	#[test]
	fn test_options_from_env_lookup() {
		let vars: HashMap<&str, &str> = HashMap::from([
			("TRIPWIRE_ENDPOINT", "https://e.example.com"),
			("TRIPWIRE_DEBUG", "true"),
			("TRIPWIRE_OFFLINE_SAVE", "0"),
			("TRIPWIRE_ALLOWED_DOMAINS", "a.com, b.com,"),
		]);
		let options = ClientOptions::from_lookup(|name| vars.get(name).map(|v| v.to_string()));

		assert_eq!(options.endpoint.as_deref(), Some("https://e.example.com"));
		assert_eq!(options.debug, Some(true));
		assert_eq!(options.offline_save_enabled, Some(false));
		assert_eq!(options.allow_insecure_transport, None);
		assert_eq!(
			options.allowed_domains,
			Some(serde_json::json!(["a.com", "b.com"]))
		);
	}
}
