// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Stack trace types as supplied by a collector, and their normalized form.

use serde::{Deserialize, Serialize};

/// File name used when a collector frame has no URL.
pub const ANONYMOUS_FILE: &str = "anonymous";
/// Method name used when a collector frame has no function name.
pub const ANONYMOUS_METHOD: &str = "[anonymous]";

/// A single frame as produced by a stack-trace collector.
///
/// Every field is optional; collectors routinely lose information for
/// eval'd code, native frames and cross-origin scripts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFrame {
	pub line: Option<u32>,
	pub column: Option<u32>,
	pub url: Option<String>,
	pub func: Option<String>,
}

/// A captured exception as produced by a stack-trace collector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStackTrace {
	pub name: Option<String>,
	pub message: Option<String>,
	#[serde(default)]
	pub stack: Vec<RawFrame>,
}

impl RawStackTrace {
	/// Creates a trace with a name and message and no frames.
	pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			name: Some(name.into()),
			message: Some(message.into()),
			stack: Vec::new(),
		}
	}

	/// Appends a frame, keeping collector order.
	pub fn with_frame(mut self, frame: RawFrame) -> Self {
		self.stack.push(frame);
		self
	}
}

/// A normalized stack frame as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackFrame {
	pub line_number: u32,
	pub column_number: u32,
	/// Human-readable location, e.g. `line 12, column 4`.
	pub class_name: String,
	pub file_name: String,
	pub method_name: String,
}

impl StackFrame {
	/// Normalizes a collector frame, substituting defaults for missing fields.
	pub fn from_raw(frame: &RawFrame) -> Self {
		let line_number = frame.line.unwrap_or(0);
		let column_number = frame.column.unwrap_or(0);

		Self {
			line_number,
			column_number,
			class_name: format!("line {line_number}, column {column_number}"),
			file_name: non_empty(frame.url.as_deref())
				.unwrap_or(ANONYMOUS_FILE)
				.to_string(),
			method_name: non_empty(frame.func.as_deref())
				.unwrap_or(ANONYMOUS_METHOD)
				.to_string(),
		}
	}
}

/// Normalizes every frame of a trace, preserving collector order.
pub fn normalize_frames(stack: &[RawFrame]) -> Vec<StackFrame> {
	stack.iter().map(StackFrame::from_raw).collect()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
	value.filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn test_missing_fields_get_defaults() {
		let frame = StackFrame::from_raw(&RawFrame::default());
		assert_eq!(frame.line_number, 0);
		assert_eq!(frame.column_number, 0);
		assert_eq!(frame.file_name, ANONYMOUS_FILE);
		assert_eq!(frame.method_name, ANONYMOUS_METHOD);
		assert_eq!(frame.class_name, "line 0, column 0");
	}

	#[test]
	fn test_present_fields_are_kept() {
		let frame = StackFrame::from_raw(&RawFrame {
			line: Some(42),
			column: Some(7),
			url: Some("https://example.com/app.js".to_string()),
			func: Some("handleClick".to_string()),
		});
		assert_eq!(frame.line_number, 42);
		assert_eq!(frame.column_number, 7);
		assert_eq!(frame.file_name, "https://example.com/app.js");
		assert_eq!(frame.method_name, "handleClick");
	}

	#[test]
	fn test_empty_strings_count_as_missing() {
		let frame = StackFrame::from_raw(&RawFrame {
			url: Some(String::new()),
			func: Some(String::new()),
			..Default::default()
		});
		assert_eq!(frame.file_name, ANONYMOUS_FILE);
		assert_eq!(frame.method_name, ANONYMOUS_METHOD);
	}

	#[test]
	fn test_wire_field_names() {
		let frame = StackFrame::from_raw(&RawFrame::default());
		let json = serde_json::to_value(&frame).unwrap();
		assert!(json.get("LineNumber").is_some());
		assert!(json.get("ColumnNumber").is_some());
		assert!(json.get("FileName").is_some());
		assert!(json.get("MethodName").is_some());
	}

	proptest! {
		#[test]
		fn defaults_substituted_exactly_where_absent(
			line in proptest::option::of(any::<u32>()),
			url in proptest::option::of("[a-z]{1,12}\\.js"),
			func in proptest::option::of("[a-zA-Z_]{1,12}"),
		) {
			let raw = RawFrame { line, column: None, url: url.clone(), func: func.clone() };
			let frame = StackFrame::from_raw(&raw);

			prop_assert_eq!(frame.line_number, line.unwrap_or(0));
			prop_assert_eq!(frame.file_name, url.unwrap_or_else(|| ANONYMOUS_FILE.to_string()));
			prop_assert_eq!(frame.method_name, func.unwrap_or_else(|| ANONYMOUS_METHOD.to_string()));
		}

		#[test]
		fn normalization_preserves_order(lines in proptest::collection::vec(1u32..10_000, 0..20)) {
			let raw: Vec<RawFrame> = lines
				.iter()
				.map(|l| RawFrame { line: Some(*l), ..Default::default() })
				.collect();
			let frames = normalize_frames(&raw);
			let out: Vec<u32> = frames.iter().map(|f| f.line_number).collect();
			prop_assert_eq!(out, lines);
		}
	}
}
