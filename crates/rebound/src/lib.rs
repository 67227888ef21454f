// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Retry, backoff and failure classification for calls to remote services.
//!
//! Calls to a remote service fail for reasons that go away on their own: a dropped connection,
//! a server restarting behind a load balancer, a rate limiter asking the caller to slow down.
//! This crate retries those failures automatically with exponential backoff and jitter, and
//! surfaces permanent failures immediately.
//!
//! # Overview
//!
//! - [`RetryConfiguration`] is the retry policy, resolved once from compiled defaults,
//!   environment variables and explicit [`RetryOverrides`].
//! - [`ErrorClassifier`] decides whether a [`Failure`] is worth retrying.
//! - [`BackoffCalculator`] computes the wait before the next attempt.
//! - [`RetryExecutor`] runs an operation in a loop until it succeeds or the policy gives up,
//!   returning the value with its [`AttemptRecord`] history or a typed [`RetryError`].
//! - [`Clock`] and [`JitterSource`] are injectable so retry sequences can be tested
//!   deterministically and without waiting.
//! - [`Telemetry`] reports attempts as `tracing` events and OpenTelemetry metrics.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use rebound::{Failure, RetryConfiguration, RetryError, RetryExecutor, RetryOverrides};
//! use tick::ClockControl;
//!
//! # futures::executor::block_on(async {
//! let config = RetryConfiguration::from_overrides(&RetryOverrides::new().max_retries(2).jitter_fraction(0.0))?;
//! let executor = RetryExecutor::builder(config)
//!     .clock(ClockControl::new().auto_advance_timers(true))
//!     .build();
//!
//! let error = executor
//!     .execute(|| async { Err::<(), _>(Failure::status(503)) })
//!     .await
//!     .unwrap_err();
//!
//! assert!(matches!(error, RetryError::Exhausted(_)));
//!
//! let waits: Vec<_> = error.attempts().iter().filter_map(|a| a.wait()).collect();
//! assert_eq!(waits, [Duration::from_secs(1), Duration::from_secs(2)]);
//! # Ok::<(), rebound::ConfigurationError>(())
//! # }).unwrap();
//! ```
//!
//! # Configuration
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `MAX_RETRIES` | retries after the first attempt | 3 |
//! | `RETRY_INTERVAL` | base wait in milliseconds | 1000 |
//! | `BACKOFF_MULTIPLIER` | growth per retry | 2.0 |
//! | `JITTER_FRACTION` | symmetric jitter ratio | 0.2 |
//! | `TIMEOUT` | overall budget in seconds | 300 |
//!
//! # Features
//!
//! - `http`: Builds a [`Failure`] from an `http` response head, honouring `Retry-After`.
//! - `metrics`: Enables [`Telemetry::use_metrics`].
//! - `test-util`: Re-exports `tick::ClockControl` so tests can drive the executor's clock.

mod backoff;
mod classify;
mod config;
mod constants;
mod executor;
mod failure;
mod fn_wrapper;
mod jitter;

pub mod telemetry;

pub use backoff::BackoffCalculator;
pub use classify::{Classification, ClassifiedFailure, ErrorClassifier};
pub use config::{ConfigurationError, RetryConfiguration, RetryOverrides};
pub use constants::{ENV_BACKOFF_MULTIPLIER, ENV_JITTER_FRACTION, ENV_MAX_RETRIES, ENV_RETRY_INTERVAL, ENV_TIMEOUT};
pub use executor::{
    AttemptEvent, AttemptEventKind, AttemptRecord, CancelledError, Completed, NonRetryableError, RetryError, RetryExecutor,
    RetryExecutorBuilder, RetryExhaustedError, TimeoutExceededError,
};
pub use failure::{BoxError, Failure, FailureKind};
pub use jitter::JitterSource;
pub use telemetry::Telemetry;
#[doc(no_inline)]
pub use tick::Clock;
#[cfg(feature = "test-util")]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
#[doc(no_inline)]
pub use tick::ClockControl;
#[doc(no_inline)]
pub use tokio_util::sync::CancellationToken;

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
pub(crate) mod testing;
