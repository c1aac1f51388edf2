// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Access to ambient host state (page URL, viewport, user agent, ...).

use tripwire_core::{parse_query_string, parse_user_agent, Dimensions, EnvironmentSnapshot};
use url::Url;

/// Source of environment facts for reports and the domain gate.
pub trait HostEnvironment: Send + Sync {
	/// Reads the current environment once.
	fn snapshot(&self) -> EnvironmentSnapshot;

	/// The host name the application is running under, if any.
	fn current_host(&self) -> Option<String> {
		self.snapshot().host
	}
}

/// A host whose facts are fixed values.
///
/// Suitable for native applications, servers and tests; browser bindings
/// implement [`HostEnvironment`] over the live window instead.
#[derive(Debug, Clone)]
pub struct StaticHost {
	pub url: String,
	pub referrer: Option<String>,
	pub user_agent: String,
	pub language: Option<String>,
	pub viewport: Dimensions,
	pub screen: Dimensions,
	pub color_depth: u32,
	pub platform: Option<String>,
	pub utc_offset_hours: f64,
}

impl Default for StaticHost {
	fn default() -> Self {
		Self {
			url: String::new(),
			referrer: None,
			user_agent: format!(
				"{}/{}",
				tripwire_core::report::CLIENT_NAME,
				tripwire_core::report::CLIENT_VERSION
			),
			language: std::env::var("LANG")
				.ok()
				.and_then(|l| l.split('.').next().map(|s| s.replace('_', "-")))
				.filter(|l| !l.is_empty()),
			viewport: Dimensions::default(),
			screen: Dimensions::default(),
			color_depth: 24,
			platform: Some(format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)),
			utc_offset_hours: chrono::Local::now().offset().local_minus_utc() as f64 / 3600.0,
		}
	}
}

impl StaticHost {
	pub fn new(url: impl Into<String>) -> Self {
		Self {
			url: url.into(),
			..Default::default()
		}
	}

	pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = user_agent.into();
		self
	}

	pub fn referrer(mut self, referrer: impl Into<String>) -> Self {
		self.referrer = Some(referrer.into());
		self
	}

	pub fn viewport(mut self, width: u32, height: u32) -> Self {
		self.viewport = Dimensions::new(width, height);
		self
	}

	/// Sets the screen size. Unset screens report the viewport size.
	pub fn screen(mut self, width: u32, height: u32) -> Self {
		self.screen = Dimensions::new(width, height);
		self
	}

	pub fn language(mut self, language: impl Into<String>) -> Self {
		self.language = Some(language.into());
		self
	}
}

impl HostEnvironment for StaticHost {
	fn snapshot(&self) -> EnvironmentSnapshot {
		let parsed = Url::parse(&self.url).ok();
		let screen = if self.screen == Dimensions::default() {
			self.viewport
		} else {
			self.screen
		};

		EnvironmentSnapshot {
			utc_offset_hours: self.utc_offset_hours,
			language: self.language.clone(),
			viewport: self.viewport,
			screen,
			color_depth: self.color_depth,
			platform: self.platform.clone(),
			user_agent: self.user_agent.clone(),
			browser: parse_user_agent(&self.user_agent),
			url: self.url.clone(),
			referrer: self.referrer.clone(),
			host: parsed
				.as_ref()
				.and_then(|u| u.host_str().map(str::to_string)),
			query_string: parsed
				.as_ref()
				.and_then(|u| u.query().map(parse_query_string))
				.unwrap_or_default(),
		}
	}

	fn current_host(&self) -> Option<String> {
		Url::parse(&self.url)
			.ok()
			.and_then(|u| u.host_str().map(str::to_string))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_snapshot_reads_url_parts() {
		let host = StaticHost::new("https://shop.example.com/cart?item=42&ref%20id=x")
			.referrer("https://google.com")
			.viewport(1280, 720);
		let snapshot = host.snapshot();

		assert_eq!(snapshot.host.as_deref(), Some("shop.example.com"));
		assert_eq!(snapshot.query_string.get("item").map(String::as_str), Some("42"));
		assert_eq!(snapshot.query_string.get("ref id").map(String::as_str), Some("x"));
		assert_eq!(snapshot.referrer.as_deref(), Some("https://google.com"));
		assert_eq!(snapshot.screen, Dimensions::new(1280, 720));
	}

	#[test]
	fn test_user_agent_is_parsed() {
		let host = StaticHost::new("https://a.com")
			.user_agent("Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0");
		assert_eq!(host.snapshot().browser.name.as_deref(), Some("Firefox"));
	}

	#[test]
	fn test_no_url_means_no_host() {
		let host = StaticHost::default();
		assert_eq!(host.current_host(), None);
		assert!(host.snapshot().query_string.is_empty());
	}
}
