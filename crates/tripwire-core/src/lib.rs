// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the tripwire error and event telemetry client.
//!
//! This crate holds everything that can be computed without I/O: stack frame
//! normalization, report and event assembly, session context merge rules and
//! the JSON wire encoding. The `tripwire` crate adds delivery, the durable
//! queue and host integration on top.
//!
//! # Overview
//!
//! - [`RawStackTrace`] is what a stack-trace collector hands over
//! - [`ErrorReport`] is a normalized exception with its environment and context
//! - [`CustomEvent`] is an application signal (log line or tracked event)
//! - [`Payload`] wraps either for delivery

pub mod context;
pub mod error;
pub mod event;
pub mod frame;
pub mod payload;
pub mod report;
pub mod session;

pub use context::{
	parse_query_string, parse_user_agent, BrowserContext, Dimensions, EnvironmentSnapshot,
	UserIdentity,
};
pub use error::{CoreError, Result};
pub use event::{join_tags, CustomEvent, EventKind, LogLevel, PayloadKind};
pub use frame::{normalize_frames, RawFrame, RawStackTrace, StackFrame};
pub use payload::Payload;
pub use report::{normalize_message, ClientInfo, ErrorReport, ReportOptions};
pub use session::{CustomData, SessionContext};
