// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP transport for payload delivery.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, ClientBuilder};
use tracing::debug;
use url::Url;

use crate::error::{TransportError, TripwireError};

/// Default bound on a single delivery request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How the endpoint answered a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
	/// 2xx.
	Accepted,
	/// 400 or 403: retrying cannot help.
	Rejected,
	/// Any other status: worth keeping for later.
	Transient,
}

impl ResponseClass {
	pub fn from_status(status: u16) -> Self {
		match status {
			200..=299 => Self::Accepted,
			400 | 403 => Self::Rejected,
			_ => Self::Transient,
		}
	}
}

/// Sends a serialized payload as a single POST.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
	/// Posts `body` and returns the HTTP status.
	async fn post(&self, url: &Url, body: String) -> Result<u16, TransportError>;
}

/// Creates a client builder with the standard tripwire User-Agent.
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Returns the User-Agent sent with every delivery.
///
/// Format: `tripwire-rust/{version}`
pub fn user_agent() -> String {
	format!(
		"{}/{}",
		tripwire_core::report::CLIENT_NAME,
		tripwire_core::report::CLIENT_VERSION
	)
}

/// [`Transport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
	client: Client,
}

impl HttpTransport {
	pub fn new(timeout: Duration) -> Result<Self, TripwireError> {
		let client = builder().timeout(timeout).build()?;
		Ok(Self { client })
	}
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
	async fn post(&self, url: &Url, body: String) -> Result<u16, TransportError> {
		let response = self
			.client
			.post(url.clone())
			.header(CONTENT_TYPE, "application/json")
			.body(body)
			.send()
			.await?;

		let status = response.status().as_u16();
		debug!(status, "Delivery request completed");
		Ok(status)
	}
}
