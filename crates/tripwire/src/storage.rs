// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Local key/value storage backing the durable queue.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tempfile::NamedTempFile;

use crate::error::StorageError;

/// Byte budget the client gives its default on-disk queue.
pub const DEFAULT_FILE_QUOTA: usize = 5 * 1024 * 1024;

const ENTRY_EXTENSION: &str = ".json";

/// A synchronous string key/value store, shaped like browser local storage.
pub trait Storage: Send + Sync {
	fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
	fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
	/// Writes `value` only if `key` is absent, atomically with respect to
	/// other writers. Returns `false` when the key already exists.
	fn insert_new(&self, key: &str, value: &str) -> Result<bool, StorageError>;
	fn remove(&self, key: &str) -> Result<(), StorageError>;
	/// All keys, in ascending order.
	fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// Checks that writing `key` with `value` on top of `used` bytes stays within `quota`.
fn check_quota(
	used: usize,
	quota: Option<usize>,
	key: &str,
	value: &str,
) -> Result<(), StorageError> {
	let Some(quota) = quota else {
		return Ok(());
	};

	let needed = key.len() + value.len();
	let available = quota.saturating_sub(used);

	if needed > available {
		return Err(StorageError::QuotaExceeded { needed, available });
	}
	Ok(())
}

/// In-process storage. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStorage {
	entries: Mutex<BTreeMap<String, String>>,
	quota: Option<usize>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}

	/// Limits total key + value bytes.
	pub fn with_quota(quota: usize) -> Self {
		Self {
			entries: Mutex::new(BTreeMap::new()),
			quota: Some(quota),
		}
	}

	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}

	fn used_except(entries: &BTreeMap<String, String>, key: &str) -> usize {
		entries
			.iter()
			.filter(|(k, _)| k.as_str() != key)
			.map(|(k, v)| k.len() + v.len())
			.sum()
	}
}

impl Storage for MemoryStorage {
	fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
		Ok(self.entries.lock().get(key).cloned())
	}

	fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
		let mut entries = self.entries.lock();
		check_quota(Self::used_except(&entries, key), self.quota, key, value)?;
		entries.insert(key.to_string(), value.to_string());
		Ok(())
	}

	fn insert_new(&self, key: &str, value: &str) -> Result<bool, StorageError> {
		let mut entries = self.entries.lock();
		if entries.contains_key(key) {
			return Ok(false);
		}
		check_quota(Self::used_except(&entries, key), self.quota, key, value)?;
		entries.insert(key.to_string(), value.to_string());
		Ok(true)
	}

	fn remove(&self, key: &str) -> Result<(), StorageError> {
		self.entries.lock().remove(key);
		Ok(())
	}

	fn keys(&self) -> Result<Vec<String>, StorageError> {
		Ok(self.entries.lock().keys().cloned().collect())
	}
}

/// Storage persisted as one file per key in a directory.
///
/// File names are the percent-encoded key plus `.json`. Each write goes to a
/// uniquely named temporary file in the same directory and is renamed into
/// place, so concurrent writers (other clients, other processes) never see
/// or clobber a partial entry. Temporary files are not listed as keys.
#[derive(Debug, Clone)]
pub struct FileStorage {
	dir: PathBuf,
	quota: Option<usize>,
}

impl FileStorage {
	/// Opens (or lazily creates) the store in `dir`.
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self {
			dir: dir.into(),
			quota: None,
		}
	}

	/// Limits total key + value bytes across the directory.
	pub fn with_quota(mut self, quota: usize) -> Self {
		self.quota = Some(quota);
		self
	}

	/// Default location: `{data_dir}/tripwire/queue`.
	pub fn default_dir() -> Option<PathBuf> {
		dirs::data_dir().map(|p| p.join("tripwire").join("queue"))
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	fn entry_path(&self, key: &str) -> PathBuf {
		self.dir
			.join(format!("{}{ENTRY_EXTENSION}", urlencoding::encode(key)))
	}

	/// Bytes used by every entry except `key`.
	fn used_except(&self, key: &str) -> Result<usize, StorageError> {
		let mut used = 0;
		for entry_key in self.keys()? {
			if entry_key == key {
				continue;
			}
			match fs::metadata(self.entry_path(&entry_key)) {
				Ok(meta) => used += entry_key.len() + meta.len() as usize,
				Err(e) if e.kind() == ErrorKind::NotFound => {}
				Err(e) => return Err(e.into()),
			}
		}
		Ok(used)
	}

	fn stage(&self, key: &str, value: &str) -> Result<NamedTempFile, StorageError> {
		fs::create_dir_all(&self.dir)?;
		if self.quota.is_some() {
			check_quota(self.used_except(key)?, self.quota, key, value)?;
		}

		let mut tmp = NamedTempFile::new_in(&self.dir)?;
		tmp.write_all(value.as_bytes())?;
		tmp.as_file().sync_all()?;
		Ok(tmp)
	}
}

impl Storage for FileStorage {
	fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
		match fs::read_to_string(self.entry_path(key)) {
			Ok(contents) => Ok(Some(contents)),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
			Err(e) => Err(e.into()),
		}
	}

	fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
		let tmp = self.stage(key, value)?;
		tmp.persist(self.entry_path(key)).map_err(|e| e.error)?;
		Ok(())
	}

	fn insert_new(&self, key: &str, value: &str) -> Result<bool, StorageError> {
		let path = self.entry_path(key);
		if path.exists() {
			return Ok(false);
		}

		let tmp = self.stage(key, value)?;
		match tmp.persist_noclobber(&path) {
			Ok(_) => Ok(true),
			Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(false),
			Err(e) => Err(e.error.into()),
		}
	}

	fn remove(&self, key: &str) -> Result<(), StorageError> {
		match fs::remove_file(self.entry_path(key)) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
			Err(e) => Err(e.into()),
		}
	}

	fn keys(&self) -> Result<Vec<String>, StorageError> {
		let read_dir = match fs::read_dir(&self.dir) {
			Ok(read_dir) => read_dir,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(e.into()),
		};

		let mut keys = Vec::new();
		for entry in read_dir {
			let name = entry?.file_name();
			let Some(encoded) = name.to_str().and_then(|n| n.strip_suffix(ENTRY_EXTENSION)) else {
				continue;
			};
			if let Ok(key) = urlencoding::decode(encoded) {
				keys.push(key.into_owned());
			}
		}
		keys.sort();
		Ok(keys)
	}
}
