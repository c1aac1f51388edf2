// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Durable queue of payloads that could not be delivered.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use tripwire_core::PayloadKind;

use crate::error::StorageError;
use crate::storage::Storage;

/// Key namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "tripwire";

/// Attempts at finding an unused key before giving up.
const MAX_KEY_ATTEMPTS: usize = 8;

/// A stored, already-serialized payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedPayload {
	pub kind: PayloadKind,
	/// The exact request body that was originally attempted.
	pub body: String,
	/// Sends tried so far, including the one that caused queueing.
	#[serde(default)]
	pub attempts: u32,
}

impl QueuedPayload {
	/// A payload whose first send just failed.
	pub fn new(kind: PayloadKind, body: impl Into<String>) -> Self {
		Self {
			kind,
			body: body.into(),
			attempts: 1,
		}
	}
}

/// An entry read back from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
	pub key: String,
	pub payload: QueuedPayload,
}

/// Persists undelivered payloads under `{namespace}={timestamp}={random}` keys.
///
/// Only keys under the namespace are read or removed.
#[derive(Clone)]
pub struct DurableQueue {
	storage: Arc<dyn Storage>,
	namespace: String,
}

impl DurableQueue {
	pub fn new(storage: Arc<dyn Storage>, namespace: impl Into<String>) -> Self {
		Self {
			storage,
			namespace: namespace.into(),
		}
	}

	pub fn namespace(&self) -> &str {
		&self.namespace
	}

	fn prefix(&self) -> String {
		format!("{}=", self.namespace)
	}

	/// Stores a payload. Failures are logged and swallowed.
	///
	/// Returns the key on success.
	pub fn save(&self, payload: &QueuedPayload) -> Option<String> {
		match self.try_save(payload) {
			Ok(key) => {
				debug!(key = %key, kind = %payload.kind, "Queued payload for later delivery");
				Some(key)
			}
			Err(e) => {
				warn!(error = %e, kind = %payload.kind, "Failed to queue payload");
				None
			}
		}
	}

	fn try_save(&self, payload: &QueuedPayload) -> Result<String, StorageError> {
		let value = serde_json::to_string(payload)?;
		for _ in 0..MAX_KEY_ATTEMPTS {
			let key = self.generate_key();
			if self.storage.insert_new(&key, &value)? {
				return Ok(key);
			}
		}
		Err(StorageError::Io(std::io::Error::new(
			std::io::ErrorKind::AlreadyExists,
			"no unused queue key available",
		)))
	}

	/// Rewrites an entry in place, e.g. after another failed attempt.
	/// Failures are logged and swallowed.
	pub fn update(&self, key: &str, payload: &QueuedPayload) {
		let result = serde_json::to_string(payload)
			.map_err(StorageError::from)
			.and_then(|value| self.storage.set(key, &value));
		if let Err(e) = result {
			warn!(error = %e, key = %key, "Failed to update queued payload");
		}
	}

	fn generate_key(&self) -> String {
		format!(
			"{}{}={}",
			self.prefix(),
			Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
			rand::random::<u32>()
		)
	}

	/// Lists entries under the namespace, oldest first.
	///
	/// Entries that cannot be decoded are removed, since no drain could ever
	/// deliver them.
	pub fn entries(&self) -> Vec<QueueEntry> {
		let keys = match self.keys() {
			Ok(keys) => keys,
			Err(e) => {
				warn!(error = %e, "Failed to list queued payloads");
				return Vec::new();
			}
		};

		let mut entries = Vec::with_capacity(keys.len());
		for key in keys {
			let raw = match self.storage.get(&key) {
				Ok(Some(raw)) => raw,
				Ok(None) => continue,
				Err(e) => {
					warn!(error = %e, key = %key, "Failed to read queued payload");
					continue;
				}
			};

			match serde_json::from_str::<QueuedPayload>(&raw) {
				Ok(payload) => entries.push(QueueEntry { key, payload }),
				Err(e) => {
					warn!(error = %e, key = %key, "Discarding undecodable queued payload");
					self.remove(&key);
				}
			}
		}
		entries
	}

	fn keys(&self) -> Result<Vec<String>, StorageError> {
		let prefix = self.prefix();
		let mut keys: Vec<String> = self
			.storage
			.keys()?
			.into_iter()
			.filter(|k| k.starts_with(&prefix))
			.collect();
		keys.sort();
		Ok(keys)
	}

	/// Removes an entry. Failures are logged and swallowed.
	pub fn remove(&self, key: &str) {
		if let Err(e) = self.storage.remove(key) {
			warn!(error = %e, key = %key, "Failed to remove queued payload");
		}
	}

	/// Number of entries under the namespace.
	pub fn len(&self) -> usize {
		self.keys().map(|k| k.len()).unwrap_or(0)
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
