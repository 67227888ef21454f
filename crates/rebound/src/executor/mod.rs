// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The attempt loop.
//!
//! A [`RetryExecutor`] runs an operation until it succeeds, fails with a non-retryable
//! failure, runs out of retries, would overrun its overall timeout, or is cancelled:
//!
//! 1. Each attempt invokes the operation once.
//! 2. A failure is classified by the [`ErrorClassifier`]. Non-retryable failures end the loop.
//! 3. Once `max_retries` retries have been made, the next retryable failure ends the loop.
//! 4. The wait is computed by the [`BackoffCalculator`]. A wait that would overrun the overall
//!    timeout ends the loop without waiting.
//! 5. The executor waits on its [`Clock`], then starts the next attempt.
//!
//! Cancellation is checked before every attempt and interrupts waits.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{BackoffCalculator, Clock, ErrorClassifier, Failure, RetryConfiguration};

mod builder;
mod event;
mod outcome;
mod run;

pub use builder::RetryExecutorBuilder;
pub use event::{AttemptEvent, AttemptEventKind};
pub(crate) use event::OnAttempt;
pub use outcome::{AttemptRecord, CancelledError, Completed, NonRetryableError, RetryError, RetryExhaustedError, TimeoutExceededError};

/// Runs operations against a remote service, retrying transient failures.
///
/// The executor is cheap to clone and can be shared by any number of concurrent callers;
/// attempts of a single call are strictly sequential. It spawns no tasks and never logs on its
/// own. Attach [`Telemetry`][crate::Telemetry] or an observer to see what it does.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicU32, Ordering};
///
/// use rebound::{Failure, RetryConfiguration, RetryExecutor};
/// use tick::ClockControl;
///
/// # futures::executor::block_on(async {
/// let executor = RetryExecutor::builder(RetryConfiguration::default())
///     .clock(ClockControl::new().auto_advance_timers(true))
///     .build();
///
/// let calls = &AtomicU32::new(0);
/// let completed = executor
///     .execute(|| async move {
///         match calls.fetch_add(1, Ordering::Relaxed) {
///             0 | 1 => Err(Failure::status(503)),
///             _ => Ok("done"),
///         }
///     })
///     .await?;
///
/// assert_eq!(*completed.value(), "done");
/// assert_eq!(completed.attempts().len(), 3);
/// # Ok::<(), rebound::RetryError>(())
/// # }).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    config: RetryConfiguration,
    clock: Clock,
    classifier: ErrorClassifier,
    backoff: BackoffCalculator,
    observers: Vec<OnAttempt>,
    cancellation: Option<CancellationToken>,
}

impl RetryExecutor {
    /// Creates an executor with the given configuration and all other settings at their
    /// defaults, using the Tokio clock.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    #[must_use]
    pub fn new(config: RetryConfiguration) -> Self {
        Self::builder(config).build()
    }

    /// Starts building an executor with the given configuration.
    pub fn builder(config: RetryConfiguration) -> RetryExecutorBuilder {
        RetryExecutorBuilder::new(config)
    }

    /// The configuration the executor was built with.
    #[must_use]
    pub fn configuration(&self) -> &RetryConfiguration {
        &self.shared.config
    }

    /// Runs `operation` until it succeeds or the retry policy gives up.
    ///
    /// `operation` is invoked once per attempt and must produce a fresh future every time.
    ///
    /// # Errors
    ///
    /// Returns a [`RetryError`] describing why the operation did not succeed.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<Completed<T>, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Failure>>,
    {
        self.shared.run(self.shared.cancellation.as_ref(), operation).await
    }

    /// Like [`execute`][Self::execute], but cancelled by `token` instead of the token the
    /// executor was built with.
    ///
    /// Cancellation is observed before every attempt and interrupts a wait between attempts.
    /// An attempt already in flight is not interrupted.
    ///
    /// # Errors
    ///
    /// Returns a [`RetryError`] describing why the operation did not succeed.
    pub async fn execute_cancellable<T, F, Fut>(&self, token: &CancellationToken, operation: F) -> Result<Completed<T>, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Failure>>,
    {
        self.shared.run(Some(token), operation).await
    }
}
