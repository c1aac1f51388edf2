// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The context store: configuration and session context for one client.

use std::collections::BTreeSet;

use parking_lot::RwLock;
use tripwire_core::{CustomData, SessionContext, UserIdentity};

use crate::config::{ClientOptions, Configuration};

/// Holds configuration and session context. Reads hand out snapshots.
#[derive(Debug, Default)]
pub struct ContextStore {
	config: RwLock<Configuration>,
	session: RwLock<SessionContext>,
}

impl ContextStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Replaces the configuration. Session context is kept.
	pub fn initialize(&self, api_key: impl Into<String>, options: &ClientOptions) {
		*self.config.write() = Configuration::from_options(api_key, options);
		if let Some(domains) = &options.allowed_domains {
			self.set_allowed_domains_value(domains);
		}
	}

	pub fn config(&self) -> Configuration {
		self.config.read().clone()
	}

	pub fn session(&self) -> SessionContext {
		self.session.read().clone()
	}

	pub fn set_user(&self, user: Option<UserIdentity>) {
		self.session.write().user = user;
	}

	pub fn set_version(&self, version: Option<String>) {
		self.session.write().version = version;
	}

	pub fn set_custom_data(&self, data: CustomData) {
		self.session.write().custom_data = data;
	}

	pub fn set_tags(&self, tags: Vec<String>) {
		self.session.write().tags = tags;
	}

	pub fn set_allowed_domains(&self, domains: Option<BTreeSet<String>>) {
		self.session.write().allowed_domains = domains;
	}

	/// Accepts only an array; anything else leaves the allow-list untouched.
	/// Non-string array elements are skipped.
	pub fn set_allowed_domains_value(&self, value: &serde_json::Value) {
		let serde_json::Value::Array(items) = value else {
			return;
		};
		let domains = items
			.iter()
			.filter_map(|item| item.as_str().map(str::to_string))
			.collect();
		self.set_allowed_domains(Some(domains));
	}

	pub fn set_offline_save(&self, enabled: bool) {
		self.config.write().offline_save_enabled = enabled;
	}
}
