// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error and event telemetry client.
//!
//! Captures errors and application events, enriches them with session context
//! and environment facts, and POSTs them as JSON to an ingestion endpoint.
//! Payloads that fail with a transient error are kept in a durable queue and
//! re-sent after the next successful delivery.
//!
//! # Example
//!
//! ```ignore
//! use tripwire::{ClientOptions, ReportOptions, TripwireClient};
//!
//! let client = TripwireClient::builder().build()?;
//! client
//!     .initialize("your_api_key", ClientOptions::from_env())
//!     .await
//!     .set_user("user_123")
//!     .with_tags(["web"]);
//!
//! // Report an error with extra context
//! client
//!     .report_error(&err, ReportOptions::new().tags(["checkout"]))
//!     .await?;
//!
//! // Log and track
//! client.warn("cart is stale", serde_json::json!({ "age_s": 900 })).await;
//! client.track("signup", serde_json::json!({ "plan": "pro" })).await;
//! ```

pub mod client;
pub mod collector;
pub mod config;
pub mod delivery;
pub mod error;
pub mod host;
pub mod queue;
pub mod storage;
pub mod store;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use client::{HttpFailure, TripwireClient, TripwireClientBuilder};
pub use collector::{BacktraceCollector, CollectError, StackTraceCollector};
pub use config::{ClientOptions, Configuration, RouteStyle, DEFAULT_ENDPOINT};
pub use delivery::{
	DeliveryOutcome, DrainSummary, SkipReason, MAX_DELIVERY_ATTEMPTS, MAX_DRAIN_ENTRIES,
};
pub use error::{Result, StorageError, TransportError, TripwireError};
pub use host::{HostEnvironment, StaticHost};
pub use queue::{DurableQueue, QueueEntry, QueuedPayload, DEFAULT_NAMESPACE};
pub use storage::{FileStorage, MemoryStorage, Storage, DEFAULT_FILE_QUOTA};
pub use transport::{HttpTransport, Transport};

// Re-export core types for convenience
pub use tripwire_core::{
	CustomData, CustomEvent, Dimensions, EnvironmentSnapshot, ErrorReport, EventKind, LogLevel,
	Payload, PayloadKind, RawFrame, RawStackTrace, ReportOptions, SessionContext, StackFrame,
	UserIdentity,
};
