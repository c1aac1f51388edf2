// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The tripwire client: configuration, report and event entry points.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use tripwire_core::{
	CustomData, CustomEvent, ErrorReport, EventKind, LogLevel, Payload, RawStackTrace,
	ReportOptions, SessionContext, UserIdentity,
};

use crate::collector::{BacktraceCollector, CollectError, StackTraceCollector};
use crate::config::{ClientOptions, Configuration};
use crate::delivery::{diagnostic, DeliveryEngine, DeliveryOutcome, DrainSummary, SkipReason};
use crate::error::{Result, TripwireError};
use crate::host::{HostEnvironment, StaticHost};
use crate::queue::{DurableQueue, DEFAULT_NAMESPACE};
use crate::storage::{FileStorage, MemoryStorage, Storage, DEFAULT_FILE_QUOTA};
use crate::store::ContextStore;
use crate::transport::{HttpTransport, Transport, DEFAULT_REQUEST_TIMEOUT};

/// Builder for constructing a [`TripwireClient`].
pub struct TripwireClientBuilder {
	host: Option<Arc<dyn HostEnvironment>>,
	storage: Option<Arc<dyn Storage>>,
	transport: Option<Arc<dyn Transport>>,
	collector: Option<Arc<dyn StackTraceCollector>>,
	namespace: String,
	request_timeout: Duration,
}

impl TripwireClientBuilder {
	/// Creates a new builder with default settings.
	pub fn new() -> Self {
		Self {
			host: None,
			storage: None,
			transport: None,
			collector: None,
			namespace: DEFAULT_NAMESPACE.to_string(),
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
		}
	}

	/// Sets the source of environment facts. Defaults to [`StaticHost::default`].
	pub fn host(mut self, host: Arc<dyn HostEnvironment>) -> Self {
		self.host = Some(host);
		self
	}

	/// Sets the durable queue's storage.
	///
	/// Defaults to a [`FileStorage`] in the user data directory, limited to
	/// [`DEFAULT_FILE_QUOTA`] bytes, or to memory when there is none.
	pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
		self.storage = Some(storage);
		self
	}

	/// Replaces the HTTP transport.
	pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
		self.transport = Some(transport);
		self
	}

	/// Replaces the stack-trace collector used by `report_error`.
	pub fn collector(mut self, collector: Arc<dyn StackTraceCollector>) -> Self {
		self.collector = Some(collector);
		self
	}

	/// Sets the queue key namespace. Defaults to `tripwire`.
	pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
		self.namespace = namespace.into();
		self
	}

	/// Sets the bound on each delivery request. Defaults to 10 seconds.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;
		self
	}

	/// Builds the client. It delivers nothing until `initialize` supplies a key.
	pub fn build(self) -> Result<TripwireClient> {
		let transport: Arc<dyn Transport> = match self.transport {
			Some(transport) => transport,
			None => Arc::new(HttpTransport::new(self.request_timeout)?),
		};

		let storage: Arc<dyn Storage> = match self.storage {
			Some(storage) => storage,
			None => match FileStorage::default_dir() {
				Some(dir) => Arc::new(FileStorage::new(dir).with_quota(DEFAULT_FILE_QUOTA)),
				None => Arc::new(MemoryStorage::new()),
			},
		};

		let queue = DurableQueue::new(storage, self.namespace);

		let inner = Arc::new(ClientInner {
			store: ContextStore::new(),
			host: self.host.unwrap_or_else(|| Arc::new(StaticHost::default())),
			collector: self
				.collector
				.unwrap_or_else(|| Arc::new(BacktraceCollector)),
			engine: DeliveryEngine::new(transport, queue),
			attached: AtomicBool::new(false),
		});

		Ok(TripwireClient { inner })
	}
}

impl Default for TripwireClientBuilder {
	fn default() -> Self {
		Self::new()
	}
}

struct ClientInner {
	store: ContextStore,
	host: Arc<dyn HostEnvironment>,
	collector: Arc<dyn StackTraceCollector>,
	engine: DeliveryEngine,
	attached: AtomicBool,
}

/// A failed HTTP request observed by the application, reported as an error.
#[derive(Debug, Clone, Default)]
pub struct HttpFailure {
	/// The error text raised by the HTTP library, if any.
	pub thrown_error: Option<String>,
	/// Name of the failure event, used when there is no error text.
	pub event_type: String,
	pub status: u16,
	pub status_text: String,
	pub method: String,
	pub url: String,
	pub content_type: Option<String>,
}

/// Client for reporting errors and events.
///
/// Cloning is cheap; clones share configuration, session context and queue.
///
/// # Example
///
/// ```ignore
/// use tripwire::{ClientOptions, ReportOptions, TripwireClient};
///
/// let client = TripwireClient::builder().build()?;
/// client
///     .initialize("your_api_key", ClientOptions::new().offline_save(true))
///     .await
///     .set_user("user_123")
///     .set_version(env!("CARGO_PKG_VERSION"));
///
/// if let Err(e) = do_something() {
///     client.report_error(&e, ReportOptions::new().tags(["checkout"])).await?;
/// }
///
/// client.track("signup", serde_json::json!({ "plan": "pro" })).await;
/// ```
#[derive(Clone)]
pub struct TripwireClient {
	inner: Arc<ClientInner>,
}

impl TripwireClient {
	/// Creates a new builder for constructing a client.
	pub fn builder() -> TripwireClientBuilder {
		TripwireClientBuilder::new()
	}

	/// Sets the API key and options, then drains the offline queue.
	///
	/// Calling again replaces the configuration. An empty key disables
	/// delivery.
	pub async fn initialize(&self, api_key: impl Into<String>, options: ClientOptions) -> &Self {
		self.inner.store.initialize(api_key, &options);
		let config = self.inner.store.config();

		if config.has_api_key() {
			info!(endpoint = %config.endpoint, offline_save = config.offline_save_enabled, "Tripwire client initialized");
			self.inner.engine.drain(&config).await;
		} else {
			debug!("Tripwire client initialized without an API key, delivery disabled");
		}
		self
	}

	/// Returns a snapshot of the current configuration.
	pub fn config(&self) -> Configuration {
		self.inner.store.config()
	}

	/// Returns a snapshot of the current session context.
	pub fn session(&self) -> SessionContext {
		self.inner.store.session()
	}

	pub fn set_user(&self, user: impl Into<UserIdentity>) -> &Self {
		self.inner.store.set_user(Some(user.into()));
		self
	}

	pub fn clear_user(&self) -> &Self {
		self.inner.store.set_user(None);
		self
	}

	pub fn set_version(&self, version: impl Into<String>) -> &Self {
		self.inner.store.set_version(Some(version.into()));
		self
	}

	/// Replaces the session custom data attached to every report.
	pub fn with_custom_data(&self, data: CustomData) -> &Self {
		self.inner.store.set_custom_data(data);
		self
	}

	/// Replaces the session tags attached to every report.
	pub fn with_tags<I, S>(&self, tags: I) -> &Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.inner
			.store
			.set_tags(tags.into_iter().map(Into::into).collect());
		self
	}

	/// Restricts delivery to the given hosts.
	pub fn set_allowed_domains<I, S>(&self, domains: I) -> &Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let domains: BTreeSet<String> = domains.into_iter().map(Into::into).collect();
		self.inner.store.set_allowed_domains(Some(domains));
		self
	}

	/// Restricts delivery using a dynamic value. Anything but an array is
	/// ignored.
	pub fn set_allowed_domains_value(&self, domains: &serde_json::Value) -> &Self {
		self.inner.store.set_allowed_domains_value(domains);
		self
	}

	/// Enables or disables queueing of payloads that fail to send.
	pub fn save_if_offline(&self, enabled: bool) -> &Self {
		self.inner.store.set_offline_save(enabled);
		self
	}

	/// Starts accepting unhandled errors from host adapters.
	///
	/// Refused (returns `false`) while no API key is configured.
	pub fn attach(&self) -> bool {
		let config = self.inner.store.config();
		if !config.has_api_key() {
			diagnostic(&config, "Cannot attach before an API key is configured");
			return false;
		}
		self.inner.attached.store(true, Ordering::SeqCst);
		true
	}

	/// Stops accepting unhandled errors from host adapters.
	pub fn detach(&self) -> &Self {
		self.inner.attached.store(false, Ordering::SeqCst);
		self
	}

	pub fn is_attached(&self) -> bool {
		self.inner.attached.load(Ordering::SeqCst)
	}

	/// Callback for host adapters that observed an unhandled error.
	pub async fn handle_unhandled(&self, trace: RawStackTrace) -> DeliveryOutcome {
		if !self.is_attached() {
			return DeliveryOutcome::Skipped(SkipReason::Detached);
		}
		self.report(trace, ReportOptions::default()).await
	}

	/// Reports a collector-supplied stack trace.
	pub async fn report(&self, trace: RawStackTrace, options: ReportOptions) -> DeliveryOutcome {
		let config = self.inner.store.config();
		let session = self.inner.store.session();
		let environment = self.inner.host.snapshot();
		let domain_allowed = session.is_domain_allowed(environment.host.as_deref());

		let report = ErrorReport::build(&trace, &options, &session, environment, Utc::now());
		self.inner
			.engine
			.deliver(&config, domain_allowed, &Payload::from(report))
			.await
	}

	/// Collects a stack trace for `error` and reports it.
	///
	/// If the collector re-raises the same error, the report is dropped to
	/// avoid recursion. Any other collector failure is returned.
	pub async fn report_error<E>(&self, error: &E, options: ReportOptions) -> Result<DeliveryOutcome>
	where
		E: std::error::Error + 'static,
	{
		let mut trace = match self.inner.collector.collect(error) {
			Ok(trace) => trace,
			Err(CollectError::Rethrown) => {
				debug!("Collector re-raised the reported error, not reporting it again");
				return Ok(DeliveryOutcome::Skipped(SkipReason::Reentrant));
			}
			Err(CollectError::Failed(source)) => return Err(TripwireError::Collector(source)),
		};

		if trace.name.is_none() {
			trace.name = Some(std::any::type_name::<E>().to_string());
		}

		Ok(self.report(trace, options).await)
	}

	/// Reports a failed HTTP request made by the application.
	pub async fn report_http_failure(&self, failure: HttpFailure) -> DeliveryOutcome {
		let message = failure
			.thrown_error
			.filter(|e| !e.is_empty())
			.unwrap_or(failure.event_type);

		let mut data = CustomData::new();
		data.insert("status".to_string(), failure.status.into());
		data.insert("statusText".to_string(), failure.status_text.into());
		data.insert("type".to_string(), failure.method.into());
		data.insert("url".to_string(), failure.url.into());
		data.insert(
			"contentType".to_string(),
			failure
				.content_type
				.map(serde_json::Value::String)
				.unwrap_or(serde_json::Value::Null),
		);

		let trace = RawStackTrace {
			name: None,
			message: Some(message),
			stack: Vec::new(),
		};
		self.report(trace, ReportOptions::new().custom_data(data))
			.await
	}

	/// Sends a custom event. Empty messages are ignored.
	pub async fn capture_event<I, S>(
		&self,
		message: &str,
		tags: I,
		data: serde_json::Value,
	) -> DeliveryOutcome
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let tags: Vec<String> = tags.into_iter().map(Into::into).collect();
		self.send_event(EventKind::Log(LogLevel::Info), message, &tags, data)
			.await
	}

	/// Tracks a named event with properties. Empty names are ignored.
	pub async fn track(&self, name: &str, properties: serde_json::Value) -> DeliveryOutcome {
		self.send_event(EventKind::Track, name, &[], properties).await
	}

	/// Sends a log line at `info`.
	pub async fn log(&self, message: &str, metadata: serde_json::Value) -> DeliveryOutcome {
		self.info(message, metadata).await
	}

	pub async fn info(&self, message: &str, metadata: serde_json::Value) -> DeliveryOutcome {
		self.send_event(EventKind::Log(LogLevel::Info), message, &[], metadata)
			.await
	}

	pub async fn debug(&self, message: &str, metadata: serde_json::Value) -> DeliveryOutcome {
		self.send_event(EventKind::Log(LogLevel::Debug), message, &[], metadata)
			.await
	}

	pub async fn warn(&self, message: &str, metadata: serde_json::Value) -> DeliveryOutcome {
		self.send_event(EventKind::Log(LogLevel::Warn), message, &[], metadata)
			.await
	}

	pub async fn error(&self, message: &str, metadata: serde_json::Value) -> DeliveryOutcome {
		self.send_event(EventKind::Log(LogLevel::Error), message, &[], metadata)
			.await
	}

	async fn send_event(
		&self,
		kind: EventKind,
		message: &str,
		tags: &[String],
		data: serde_json::Value,
	) -> DeliveryOutcome {
		let session = self.inner.store.session();
		let Some(event) = CustomEvent::build(kind, message, tags, data, &session, Utc::now()) else {
			return DeliveryOutcome::Skipped(SkipReason::EmptyMessage);
		};

		let config = self.inner.store.config();
		let domain_allowed = session.is_domain_allowed(self.inner.host.current_host().as_deref());
		self.inner
			.engine
			.deliver(&config, domain_allowed, &Payload::from(event))
			.await
	}

	/// Re-sends queued payloads now.
	pub async fn drain_queue(&self) -> DrainSummary {
		let config = self.inner.store.config();
		self.inner.engine.drain(&config).await
	}

	/// Re-sends queued payloads on a spawned task.
	///
	/// Must be called from within a Tokio runtime.
	pub fn drain_in_background(&self) -> JoinHandle<DrainSummary> {
		let client = self.clone();
		tokio::spawn(async move { client.drain_queue().await })
	}

	/// Number of payloads waiting in the durable queue.
	pub fn queued_len(&self) -> usize {
		self.inner.engine.queue().len()
	}
}
