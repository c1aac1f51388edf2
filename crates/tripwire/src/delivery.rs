// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Delivery engine: gating, serialization, transmission and fallback to the
//! durable queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};
use tripwire_core::{Payload, PayloadKind};

use crate::config::Configuration;
use crate::error::TransportError;
use crate::queue::{DurableQueue, QueueEntry, QueuedPayload};
use crate::transport::{ResponseClass, Transport};

/// Why a payload was not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
	/// An allow-list is configured and the current host is not on it.
	DomainNotAllowed,
	/// No API key has been configured.
	MissingApiKey,
	/// The endpoint is plain HTTP and insecure transport is not allowed.
	InsecureEndpoint,
	/// An event was requested with an empty message or name.
	EmptyMessage,
	/// The unhandled-error adapter is not attached.
	Detached,
	/// The error being reported was raised again while collecting its trace.
	Reentrant,
}

/// What happened to a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
	/// The endpoint accepted it.
	Delivered,
	/// It was written to the durable queue for a later drain.
	Queued,
	/// It was discarded: rejected by the endpoint, unserializable, or failed
	/// with offline saving disabled.
	Dropped,
	/// It was never sent.
	Skipped(SkipReason),
}

/// Totals from one drain of the durable queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
	pub sent: usize,
	pub dropped: usize,
	pub retained: usize,
}

/// Sends a queued entry gets before it is dropped, counting the first.
pub const MAX_DELIVERY_ATTEMPTS: u32 = 5;

/// Entries a single drain re-sends at most; the rest wait for the next one.
pub const MAX_DRAIN_ENTRIES: usize = 50;

/// Emits a configuration diagnostic, visible only when debug mode is on.
pub(crate) fn diagnostic(config: &Configuration, message: &str) {
	if config.debug {
		warn!("{message}");
	} else {
		debug!("{message}");
	}
}

/// Clears the draining flag when dropped, including when the drain future is
/// cancelled mid-way.
struct DrainGuard<'a>(&'a AtomicBool);

impl<'a> DrainGuard<'a> {
	fn acquire(flag: &'a AtomicBool) -> Option<Self> {
		if flag.swap(true, Ordering::SeqCst) {
			None
		} else {
			Some(Self(flag))
		}
	}
}

impl Drop for DrainGuard<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::SeqCst);
	}
}

/// Sends payloads and replays the durable queue.
pub struct DeliveryEngine {
	transport: Arc<dyn Transport>,
	queue: DurableQueue,
	draining: AtomicBool,
}

impl DeliveryEngine {
	pub fn new(transport: Arc<dyn Transport>, queue: DurableQueue) -> Self {
		Self {
			transport,
			queue,
			draining: AtomicBool::new(false),
		}
	}

	pub fn queue(&self) -> &DurableQueue {
		&self.queue
	}

	/// Gates, serializes and sends a payload.
	///
	/// A successful send is followed by a drain of the durable queue.
	pub async fn deliver(
		&self,
		config: &Configuration,
		domain_allowed: bool,
		payload: &Payload,
	) -> DeliveryOutcome {
		if !domain_allowed {
			debug!(kind = %payload.kind(), "Current host is not in the allowed domains, skipping delivery");
			return DeliveryOutcome::Skipped(SkipReason::DomainNotAllowed);
		}

		if !config.has_api_key() {
			diagnostic(
				config,
				"API key has not been configured, make sure initialize is called with a key",
			);
			return DeliveryOutcome::Skipped(SkipReason::MissingApiKey);
		}

		let body = match payload.to_json() {
			Ok(body) => body,
			Err(e) => {
				warn!(error = %e, kind = %payload.kind(), "Failed to serialize payload");
				return DeliveryOutcome::Dropped;
			}
		};

		let outcome = self.send(config, payload.kind(), body).await;
		if outcome == DeliveryOutcome::Delivered {
			self.drain(config).await;
		}
		outcome
	}

	async fn send(&self, config: &Configuration, kind: PayloadKind, body: String) -> DeliveryOutcome {
		let url = match config.entries_url(kind) {
			Ok(url) => url,
			Err(e) => {
				diagnostic(config, &format!("Invalid endpoint {}: {e}", config.endpoint));
				return DeliveryOutcome::Dropped;
			}
		};

		if !config.permits(&url) {
			warn!(
				endpoint = %config.endpoint,
				"Endpoint uses plain HTTP and insecure transport is not allowed, skipping delivery"
			);
			return DeliveryOutcome::Skipped(SkipReason::InsecureEndpoint);
		}

		if config.debug {
			info!(kind = %kind, bytes = body.len(), "Sending payload");
		}

		let failure = match self.transport.post(&url, body.clone()).await {
			Ok(status) => match ResponseClass::from_status(status) {
				ResponseClass::Accepted => {
					debug!(kind = %kind, status, "Payload delivered");
					return DeliveryOutcome::Delivered;
				}
				ResponseClass::Rejected => {
					warn!(kind = %kind, status, "Payload rejected by endpoint, dropping");
					return DeliveryOutcome::Dropped;
				}
				ResponseClass::Transient => format!("status {status}"),
			},
			Err(TransportError::Timeout) => "timeout".to_string(),
			Err(TransportError::Network(e)) => e,
		};

		if !config.offline_save_enabled {
			debug!(kind = %kind, failure = %failure, "Delivery failed and offline save is disabled, dropping");
			return DeliveryOutcome::Dropped;
		}

		match self.queue.save(&QueuedPayload::new(kind, body)) {
			Some(_) => {
				debug!(kind = %kind, failure = %failure, "Delivery failed, payload queued");
				DeliveryOutcome::Queued
			}
			None => DeliveryOutcome::Dropped,
		}
	}

	/// Re-sends queued payloads, oldest first, at most [`MAX_DRAIN_ENTRIES`]
	/// per call.
	///
	/// An entry is removed once the endpoint accepts or permanently rejects
	/// it. A transient status keeps it for the next drain until it has used
	/// [`MAX_DELIVERY_ATTEMPTS`]. A timeout or network error ends the drain.
	/// A drain already in progress is not re-entered.
	pub async fn drain(&self, config: &Configuration) -> DrainSummary {
		let mut summary = DrainSummary::default();

		if !config.has_api_key() {
			return summary;
		}

		let Some(_guard) = DrainGuard::acquire(&self.draining) else {
			return summary;
		};

		let entries = self.queue.entries();
		let total = entries.len();

		for entry in entries.into_iter().take(MAX_DRAIN_ENTRIES) {
			let url = match config.entries_url(entry.payload.kind) {
				Ok(url) if config.permits(&url) => url,
				_ => break,
			};

			match self.transport.post(&url, entry.payload.body.clone()).await {
				Ok(status) => match ResponseClass::from_status(status) {
					ResponseClass::Accepted => {
						self.queue.remove(&entry.key);
						summary.sent += 1;
					}
					ResponseClass::Rejected => {
						self.queue.remove(&entry.key);
						summary.dropped += 1;
					}
					ResponseClass::Transient => {
						if self.record_failure(entry, &format!("status {status}")) {
							summary.dropped += 1;
						}
					}
				},
				Err(e) => {
					let failure = e.to_string();
					if self.record_failure(entry, &failure) {
						summary.dropped += 1;
					}
					break;
				}
			}
		}

		summary.retained = total - summary.sent - summary.dropped;

		if summary.sent > 0 || summary.dropped > 0 {
			info!(
				sent = summary.sent,
				dropped = summary.dropped,
				retained = summary.retained,
				"Drained offline queue"
			);
		}
		summary
	}

	/// Counts a failed re-send. Returns `true` if the entry ran out of
	/// attempts and was removed.
	fn record_failure(&self, entry: QueueEntry, failure: &str) -> bool {
		let attempts = entry.payload.attempts.saturating_add(1);
		if attempts >= MAX_DELIVERY_ATTEMPTS {
			warn!(key = %entry.key, attempts, failure = %failure, "Queued payload exhausted its attempts, dropping");
			self.queue.remove(&entry.key);
			return true;
		}

		debug!(key = %entry.key, attempts, failure = %failure, "Queued payload still undeliverable");
		self.queue.update(
			&entry.key,
			&QueuedPayload {
				attempts,
				..entry.payload
			},
		);
		false
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::ClientOptions;
	use crate::queue::DEFAULT_NAMESPACE;
	use crate::storage::MemoryStorage;
	use chrono::Utc;
	use parking_lot::Mutex;
	use std::collections::VecDeque;
	use tripwire_core::{CustomEvent, EventKind, LogLevel, SessionContext};
	use url::Url;

	/// Replies from a script; defaults to 202 once the script runs out.
	struct ScriptedTransport {
		replies: Mutex<VecDeque<Result<u16, TransportError>>>,
		sent: Mutex<Vec<(Url, String)>>,
	}

	impl ScriptedTransport {
		fn new(replies: Vec<Result<u16, TransportError>>) -> Self {
			Self {
				replies: Mutex::new(replies.into()),
				sent: Mutex::new(Vec::new()),
			}
		}

		fn sent(&self) -> Vec<(Url, String)> {
			self.sent.lock().clone()
		}
	}

	#[async_trait::async_trait]
	impl Transport for ScriptedTransport {
		async fn post(&self, url: &Url, body: String) -> Result<u16, TransportError> {
			self.sent.lock().push((url.clone(), body));
			self.replies.lock().pop_front().unwrap_or(Ok(202))
		}
	}

	fn engine(transport: Arc<ScriptedTransport>) -> (DeliveryEngine, Arc<MemoryStorage>) {
		let storage = Arc::new(MemoryStorage::new());
		let queue = DurableQueue::new(storage.clone(), DEFAULT_NAMESPACE);
		(DeliveryEngine::new(transport, queue), storage)
	}

	fn config(offline: bool) -> Configuration {
		Configuration::from_options(
			"KEY",
			&ClientOptions::new()
				.endpoint("https://ingest.example.com")
				.offline_save(offline),
		)
	}

	fn event(message: &str) -> Payload {
		CustomEvent::build(
			EventKind::Log(LogLevel::Info),
			message,
			&[],
			serde_json::json!({}),
			&SessionContext::default(),
			Utc::now(),
		)
		.unwrap()
		.into()
	}

	#[tokio::test]
	async fn test_domain_gate_sends_and_queues_nothing() {
		let transport = Arc::new(ScriptedTransport::new(vec![]));
		let (engine, storage) = engine(transport.clone());

		let outcome = engine.deliver(&config(true), false, &event("x")).await;

		assert_eq!(outcome, DeliveryOutcome::Skipped(SkipReason::DomainNotAllowed));
		assert!(transport.sent().is_empty());
		assert!(storage.is_empty());
	}

	#[tokio::test]
	async fn test_missing_key_sends_nothing() {
		let transport = Arc::new(ScriptedTransport::new(vec![]));
		let (engine, _) = engine(transport.clone());
		let config = Configuration::from_options("", &ClientOptions::default());

		let outcome = engine.deliver(&config, true, &event("x")).await;

		assert_eq!(outcome, DeliveryOutcome::Skipped(SkipReason::MissingApiKey));
		assert!(transport.sent().is_empty());
	}

	#[tokio::test]
	async fn test_insecure_endpoint_is_skipped() {
		let transport = Arc::new(ScriptedTransport::new(vec![]));
		let (engine, _) = engine(transport.clone());
		let config =
			Configuration::from_options("KEY", &ClientOptions::new().endpoint("http://ingest.local"));

		let outcome = engine.deliver(&config, true, &event("x")).await;

		assert_eq!(outcome, DeliveryOutcome::Skipped(SkipReason::InsecureEndpoint));
		assert!(transport.sent().is_empty());
	}

	#[tokio::test]
	async fn test_insecure_endpoint_warns_without_debug() {
		let (logs, _guard) = crate::test_support::CapturedLogs::install();
		let transport = Arc::new(ScriptedTransport::new(vec![]));
		let (engine, _) = engine(transport);
		let config =
			Configuration::from_options("KEY", &ClientOptions::new().endpoint("http://ingest.local"));
		assert!(!config.debug);

		engine.deliver(&config, true, &event("x")).await;

		let output = logs.contents();
		assert!(output.contains("WARN"), "{output}");
		assert!(output.contains("insecure transport is not allowed"), "{output}");
	}

	#[tokio::test]
	async fn test_success_posts_to_entries_with_key() {
		let transport = Arc::new(ScriptedTransport::new(vec![Ok(202)]));
		let (engine, _) = engine(transport.clone());

		let outcome = engine.deliver(&config(false), true, &event("hello")).await;

		assert_eq!(outcome, DeliveryOutcome::Delivered);
		let sent = transport.sent();
		assert_eq!(sent.len(), 1);
		assert_eq!(sent[0].0.as_str(), "https://ingest.example.com/api/entries?apikey=KEY");
		let body: serde_json::Value = serde_json::from_str(&sent[0].1).unwrap();
		assert_eq!(body["Message"], "hello");
	}

	#[tokio::test]
	async fn test_timeout_with_offline_save_queues() {
		let transport = Arc::new(ScriptedTransport::new(vec![Err(TransportError::Timeout)]));
		let (engine, storage) = engine(transport.clone());

		let outcome = engine.deliver(&config(true), true, &event("x")).await;

		assert_eq!(outcome, DeliveryOutcome::Queued);
		assert_eq!(storage.len(), 1);
	}

	#[tokio::test]
	async fn test_timeout_without_offline_save_drops() {
		let transport = Arc::new(ScriptedTransport::new(vec![Err(TransportError::Timeout)]));
		let (engine, storage) = engine(transport.clone());

		let outcome = engine.deliver(&config(false), true, &event("x")).await;

		assert_eq!(outcome, DeliveryOutcome::Dropped);
		assert!(storage.is_empty());
	}

	#[tokio::test]
	async fn test_forbidden_and_bad_request_are_dropped() {
		for status in [400, 403] {
			let transport = Arc::new(ScriptedTransport::new(vec![Ok(status)]));
			let (engine, storage) = engine(transport.clone());

			let outcome = engine.deliver(&config(true), true, &event("x")).await;

			assert_eq!(outcome, DeliveryOutcome::Dropped, "status {status}");
			assert!(storage.is_empty(), "status {status}");
		}
	}

	#[tokio::test]
	async fn test_server_error_queues() {
		let transport = Arc::new(ScriptedTransport::new(vec![Ok(503)]));
		let (engine, storage) = engine(transport.clone());

		let outcome = engine.deliver(&config(true), true, &event("x")).await;

		assert_eq!(outcome, DeliveryOutcome::Queued);
		assert_eq!(storage.len(), 1);
	}

	#[tokio::test]
	async fn test_network_error_queues() {
		let transport = Arc::new(ScriptedTransport::new(vec![Err(TransportError::Network(
			"connection refused".to_string(),
		))]));
		let (engine, storage) = engine(transport.clone());

		let outcome = engine.deliver(&config(true), true, &event("x")).await;

		assert_eq!(outcome, DeliveryOutcome::Queued);
		assert_eq!(storage.len(), 1);
	}

	#[tokio::test]
	async fn test_success_drains_queue_with_identical_body() {
		let transport = Arc::new(ScriptedTransport::new(vec![
			Err(TransportError::Timeout),
			Ok(202),
			Ok(202),
		]));
		let (engine, storage) = engine(transport.clone());
		let config = config(true);

		assert_eq!(
			engine.deliver(&config, true, &event("first")).await,
			DeliveryOutcome::Queued
		);
		assert_eq!(
			engine.deliver(&config, true, &event("second")).await,
			DeliveryOutcome::Delivered
		);

		let sent = transport.sent();
		assert_eq!(sent.len(), 3);
		assert_eq!(sent[2].1, sent[0].1);
		assert!(storage.is_empty());
	}

	#[tokio::test]
	async fn test_drain_keeps_transient_failures() {
		let transport = Arc::new(ScriptedTransport::new(vec![
			Err(TransportError::Timeout),
			Err(TransportError::Timeout),
			Ok(500),
		]));
		let (engine, storage) = engine(transport.clone());
		let config = config(true);

		engine.deliver(&config, true, &event("a")).await;
		engine.deliver(&config, true, &event("b")).await;
		assert_eq!(storage.len(), 2);

		let summary = engine.drain(&config).await;
		assert_eq!(
			summary,
			DrainSummary {
				sent: 1,
				dropped: 0,
				retained: 1
			}
		);
		assert_eq!(storage.len(), 1);
	}

	#[tokio::test]
	async fn test_drain_drops_rejected_entries() {
		let transport = Arc::new(ScriptedTransport::new(vec![Ok(503), Ok(403)]));
		let (engine, storage) = engine(transport.clone());
		let config = config(true);

		engine.deliver(&config, true, &event("a")).await;
		let summary = engine.drain(&config).await;

		assert_eq!(summary.dropped, 1);
		assert!(storage.is_empty());
	}

	#[tokio::test]
	async fn test_drain_without_key_does_nothing() {
		let transport = Arc::new(ScriptedTransport::new(vec![Ok(503)]));
		let (engine, storage) = engine(transport.clone());
		engine.deliver(&config(true), true, &event("a")).await;

		let empty = Configuration::from_options("", &ClientOptions::default());
		assert_eq!(engine.drain(&empty).await, DrainSummary::default());
		assert_eq!(storage.len(), 1);
	}

	#[tokio::test]
	async fn test_storage_full_drops() {
		let transport = Arc::new(ScriptedTransport::new(vec![Err(TransportError::Timeout)]));
		let storage = Arc::new(MemoryStorage::with_quota(8));
		let queue = DurableQueue::new(storage.clone(), DEFAULT_NAMESPACE);
		let engine = DeliveryEngine::new(transport, queue);

		let outcome = engine.deliver(&config(true), true, &event("x")).await;

		assert_eq!(outcome, DeliveryOutcome::Dropped);
		assert!(storage.is_empty());
	}

	#[tokio::test]
	async fn test_persistent_transient_entry_is_eventually_dropped() {
		let transport = Arc::new(ScriptedTransport::new(vec![Ok(413); 10]));
		let (engine, storage) = engine(transport.clone());
		let config = config(true);

		assert_eq!(
			engine.deliver(&config, true, &event("too big")).await,
			DeliveryOutcome::Queued
		);

		for _ in 0..MAX_DELIVERY_ATTEMPTS - 2 {
			let summary = engine.drain(&config).await;
			assert_eq!(summary.retained, 1);
			assert_eq!(storage.len(), 1);
		}

		let summary = engine.drain(&config).await;
		assert_eq!(
			summary,
			DrainSummary {
				sent: 0,
				dropped: 1,
				retained: 0
			}
		);
		assert!(storage.is_empty());
		assert_eq!(transport.sent().len(), MAX_DELIVERY_ATTEMPTS as usize);
	}

	#[tokio::test]
	async fn test_drain_stops_at_first_transport_error() {
		let transport = Arc::new(ScriptedTransport::new(vec![Err(TransportError::Network(
			"connection reset".to_string(),
		))]));
		let (engine, storage) = engine(transport.clone());
		for body in ["a", "b", "c"] {
			engine
				.queue()
				.save(&QueuedPayload::new(PayloadKind::Log, body));
		}

		let summary = engine.drain(&config(true)).await;

		assert_eq!(summary.retained, 3);
		assert_eq!(transport.sent().len(), 1);
		assert_eq!(storage.len(), 3);
		assert_eq!(engine.queue().entries()[0].payload.attempts, 2);
	}

	#[tokio::test]
	async fn test_drain_is_capped_per_call() {
		let transport = Arc::new(ScriptedTransport::new(vec![]));
		let (engine, storage) = engine(transport.clone());
		for i in 0..MAX_DRAIN_ENTRIES + 10 {
			engine
				.queue()
				.save(&QueuedPayload::new(PayloadKind::Log, format!("{{\"n\":{i}}}")));
		}

		let summary = engine.drain(&config(true)).await;
		assert_eq!(summary.sent, MAX_DRAIN_ENTRIES);
		assert_eq!(summary.retained, 10);
		assert_eq!(storage.len(), 10);

		let summary = engine.drain(&config(true)).await;
		assert_eq!(summary.sent, 10);
		assert!(storage.is_empty());
	}
}
