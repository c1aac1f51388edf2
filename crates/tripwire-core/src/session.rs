// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session-scoped context and the rules for merging it with per-call values.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::context::UserIdentity;

/// Custom data attached to reports.
pub type CustomData = serde_json::Map<String, serde_json::Value>;

/// Context set by the application for the lifetime of the session.
///
/// Report builders take a clone of this, so later mutations never reach an
/// already-built report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
	pub user: Option<UserIdentity>,
	pub version: Option<String>,
	#[serde(default)]
	pub custom_data: CustomData,
	#[serde(default)]
	pub tags: Vec<String>,
	pub allowed_domains: Option<BTreeSet<String>>,
}

impl SessionContext {
	/// Shallow merge: per-call keys override session keys.
	pub fn merge_custom_data(&self, call: Option<&CustomData>) -> CustomData {
		let mut merged = self.custom_data.clone();
		if let Some(call) = call {
			for (key, value) in call {
				merged.insert(key.clone(), value.clone());
			}
		}
		merged
	}

	/// Session tags first, then per-call tags.
	pub fn merge_tags(&self, call: Option<&[String]>) -> Vec<String> {
		let mut merged = self.tags.clone();
		if let Some(call) = call {
			merged.extend(call.iter().cloned());
		}
		merged
	}

	/// Whether delivery is permitted for the given host.
	///
	/// No allow-list means every host is allowed; an unknown host is only
	/// allowed when there is no allow-list.
	pub fn is_domain_allowed(&self, host: Option<&str>) -> bool {
		match (&self.allowed_domains, host) {
			(None, _) => true,
			(Some(domains), Some(host)) => domains.contains(host),
			(Some(_), None) => false,
		}
	}
}
