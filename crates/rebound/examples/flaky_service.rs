// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Retries a simulated HTTP service that is briefly unavailable and then rate limits the caller.
//!
//! Run with `cargo run -p rebound --example flaky_service --features http`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use http::{Response, StatusCode};
use rebound::{Failure, RetryConfiguration, RetryExecutor, RetryOverrides, Telemetry};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry().with(tracing_subscriber::fmt::layer()).init();

    // environment variables such as MAX_RETRIES still apply to fields not set here
    let config = RetryConfiguration::resolve(&RetryOverrides::new().base_interval(Duration::from_millis(200)))?;

    let executor = RetryExecutor::builder(config)
        .telemetry(Telemetry::new("flaky_service").use_logs())
        .build();

    let calls = &AtomicU32::new(0);

    let completed = executor
        .execute(|| async move {
            let response = call_service(calls.fetch_add(1, Ordering::Relaxed));

            if response.status().is_success() {
                Ok(response.into_body())
            } else {
                let (parts, _body) = response.into_parts();
                Err(Failure::from_response(&parts))
            }
        })
        .await?;

    println!("received '{}' after {} attempts", completed.value(), completed.attempts().len());

    for attempt in completed.attempts() {
        println!(
            "attempt {} started at {:?} after waiting {:?} ({})",
            attempt.index(),
            attempt.elapsed(),
            attempt.wait().unwrap_or_default(),
            attempt.classification().map_or("first attempt", rebound::Classification::as_str),
        );
    }

    Ok(())
}

/// Unavailable on the first call, rate limited with a one second hint on the second, healthy afterwards.
fn call_service(call: u32) -> Response<&'static str> {
    let builder = Response::builder();

    let builder = match call {
        0 => builder.status(StatusCode::SERVICE_UNAVAILABLE),
        1 => builder.status(StatusCode::TOO_MANY_REQUESTS).header(http::header::RETRY_AFTER, "1"),
        _ => builder.status(StatusCode::OK),
    };

    builder.body("inventory").unwrap_or_else(|_invalid| Response::new("inventory"))
}
