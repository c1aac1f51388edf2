// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Stack-trace collection for Rust errors.

use std::backtrace::Backtrace;

use rustc_demangle::demangle;
use thiserror::Error;
use tripwire_core::{RawFrame, RawStackTrace};

/// Failure modes of a collector.
#[derive(Debug, Error)]
pub enum CollectError {
	/// The collector raised the error it was asked to describe. Reporting
	/// it again would recurse, so the client drops it.
	#[error("collector re-raised the reported error")]
	Rethrown,

	/// Any other failure; propagated to the caller.
	#[error("{0}")]
	Failed(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Produces a normalized trace for an error.
pub trait StackTraceCollector: Send + Sync {
	fn collect(&self, error: &(dyn std::error::Error + 'static)) -> Result<RawStackTrace, CollectError>;
}

/// Collects the current thread's backtrace.
///
/// The error's message becomes the trace message; callers set the name.
#[derive(Debug, Clone, Copy, Default)]
pub struct BacktraceCollector;

impl StackTraceCollector for BacktraceCollector {
	fn collect(&self, error: &(dyn std::error::Error + 'static)) -> Result<RawStackTrace, CollectError> {
		let backtrace = Backtrace::force_capture();
		Ok(RawStackTrace {
			name: None,
			message: Some(error.to_string()),
			stack: parse_backtrace(&backtrace.to_string()),
		})
	}
}

/// Parses `std::backtrace::Backtrace` display output into frames.
///
/// The format is a `N: symbol` line per frame, optionally followed by an
/// `at path:line:col` line.
pub fn parse_backtrace(text: &str) -> Vec<RawFrame> {
	let mut frames: Vec<RawFrame> = Vec::new();

	for line in text.lines() {
		let line = line.trim();
		if line.is_empty() {
			continue;
		}

		if let Some(location) = line.strip_prefix("at ") {
			if let Some(frame) = frames.last_mut() {
				apply_location(frame, location);
			}
			continue;
		}

		if let Some(symbol) = strip_frame_number(line) {
			frames.push(RawFrame {
				func: Some(demangle(symbol).to_string()).filter(|f| !f.is_empty()),
				..Default::default()
			});
		}
	}

	frames
}

fn strip_frame_number(line: &str) -> Option<&str> {
	let (number, rest) = line.split_once(':')?;
	number.trim().parse::<u32>().ok()?;
	Some(rest.trim())
}

/// Splits `path:line:col` from the right so Windows drive letters survive.
fn apply_location(frame: &mut RawFrame, location: &str) {
	let mut parts = location.rsplitn(3, ':');
	let last = parts.next();
	let middle = parts.next();
	let rest = parts.next();

	match (rest, middle, last) {
		(Some(path), Some(line), Some(column)) if line.parse::<u32>().is_ok() => {
			frame.url = Some(path.to_string());
			frame.line = line.parse().ok();
			frame.column = column.parse().ok();
		}
		(_, Some(path), Some(line)) if line.parse::<u32>().is_ok() => {
			let path = match rest {
				Some(prefix) => format!("{prefix}:{path}"),
				None => path.to_string(),
			};
			frame.url = Some(path);
			frame.line = line.parse().ok();
		}
		_ => frame.url = Some(location.to_string()),
	}
}
