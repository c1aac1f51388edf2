// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Example: report an error and a few events with the tripwire client.
//!
//! Run with:
//!   TRIPWIRE_API_KEY=... cargo run --example capture -p tripwire

use std::sync::Arc;

use serde_json::json;
use tracing_subscriber::EnvFilter;
use tripwire::{ClientOptions, ReportOptions, StaticHost, TripwireClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tripwire=debug")))
		.init();

	let api_key =
		std::env::var("TRIPWIRE_API_KEY").expect("TRIPWIRE_API_KEY environment variable required");
	let options = ClientOptions::from_env().debug(true).offline_save(true);

	println!("Initializing tripwire client...");

	let client = TripwireClient::builder()
		.host(Arc::new(
			StaticHost::new("https://example.com/checkout?step=2").viewport(1280, 800),
		))
		.build()?;

	client
		.initialize(api_key, options)
		.await
		.set_user("user_example_123")
		.set_version("0.1.0-example")
		.with_tags(["example"]);

	println!("  Queued from a previous run: {}", client.queued_len());

	println!("\nReporting an error...");
	let err = std::fs::read_to_string("/definitely/not/here").unwrap_err();
	let outcome = client
		.report_error(&err, ReportOptions::new().tags(["io"]))
		.await?;
	println!("  Outcome: {:?}", outcome);

	println!("\nSending events...");
	let outcome = client.track("example_run", json!({ "source": "capture" })).await;
	println!("  track: {:?}", outcome);
	let outcome = client.warn("Example warning", json!({ "retries": 3 })).await;
	println!("  warn: {:?}", outcome);

	let summary = client.drain_queue().await;
	println!(
		"\nQueue: {} sent, {} dropped, {} retained",
		summary.sent, summary.dropped, summary.retained
	);

	Ok(())
}
