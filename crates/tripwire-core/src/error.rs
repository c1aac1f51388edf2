// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for tripwire core types.

use thiserror::Error;

/// Errors raised while parsing core types.
#[derive(Debug, Error)]
pub enum CoreError {
	#[error("invalid payload kind: {0}")]
	InvalidPayloadKind(String),

	#[error("invalid log level: {0}")]
	InvalidLogLevel(String),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
