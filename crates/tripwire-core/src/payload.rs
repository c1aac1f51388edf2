// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The unit handed to the delivery engine.

use crate::error::Result;
use crate::event::{CustomEvent, PayloadKind};
use crate::report::ErrorReport;

/// A built report or event, ready for serialization.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
	Exception(Box<ErrorReport>),
	Event(CustomEvent),
}

impl Payload {
	pub fn kind(&self) -> PayloadKind {
		match self {
			Self::Exception(_) => PayloadKind::Exception,
			Self::Event(event) => event.kind.payload_kind(),
		}
	}

	/// Encodes the payload as the JSON request body.
	pub fn to_json(&self) -> Result<String> {
		let body = match self {
			Self::Exception(report) => serde_json::to_string(report)?,
			Self::Event(event) => serde_json::to_string(event)?,
		};
		Ok(body)
	}
}

impl From<ErrorReport> for Payload {
	fn from(report: ErrorReport) -> Self {
		Self::Exception(Box::new(report))
	}
}

impl From<CustomEvent> for Payload {
	fn from(event: CustomEvent) -> Self {
		Self::Event(event)
	}
}
