// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the tripwire client.

use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, TripwireError>;

/// Errors that can occur in the client.
///
/// Delivery never returns these to the monitored application; they surface
/// only from construction and from stack-trace collection.
#[derive(Debug, Error)]
pub enum TripwireError {
	/// Building the HTTP client failed.
	#[error("failed to build HTTP client: {0}")]
	HttpClient(#[from] reqwest::Error),

	/// The endpoint base URL could not be parsed.
	#[error("invalid endpoint URL: {0}")]
	InvalidEndpoint(#[from] url::ParseError),

	/// The stack-trace collector failed with an error other than the one
	/// being reported.
	#[error("stack trace collection failed: {0}")]
	Collector(#[source] Box<dyn std::error::Error + Send + Sync>),

	/// The payload could not be encoded.
	#[error("serialization error: {0}")]
	Serialization(#[from] tripwire_core::CoreError),

	/// Queue storage failed.
	#[error("storage error: {0}")]
	Storage(#[from] StorageError),
}

/// Errors from a queue storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Writing would exceed the configured quota.
	#[error("storage quota exceeded: {needed} bytes needed, {available} available")]
	QuotaExceeded { needed: usize, available: usize },

	#[error("storage I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("failed to encode queued payload: {0}")]
	Encoding(#[from] serde_json::Error),
}

/// Errors from a transport. Any HTTP status is a response, not an error.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
	/// The request did not complete within the configured timeout.
	#[error("request timed out")]
	Timeout,

	/// The request could not be sent or the connection failed.
	#[error("network error: {0}")]
	Network(String),
}

impl From<reqwest::Error> for TransportError {
	fn from(err: reqwest::Error) -> Self {
		if err.is_timeout() {
			TransportError::Timeout
		} else {
			TransportError::Network(err.to_string())
		}
	}
}
