// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{AttemptEvent, OnAttempt, RetryExecutor, Shared};
use crate::{BackoffCalculator, Clock, ErrorClassifier, JitterSource, RetryConfiguration, Telemetry};

/// Builder for [`RetryExecutor`].
///
/// Created by [`RetryExecutor::builder`]. Everything except the configuration is optional:
///
/// | Setting | Default |
/// |---|---|
/// | [`clock`][Self::clock] | [`Clock::new_tokio`] |
/// | [`classifier`][Self::classifier] | [`ErrorClassifier::new`] (built-in rules only) |
/// | [`jitter`][Self::jitter] | [`JitterSource::thread_local`] |
/// | [`on_attempt`][Self::on_attempt] | no observers |
/// | [`telemetry`][Self::telemetry] | none |
/// | [`cancellation`][Self::cancellation] | never cancelled |
#[derive(Debug)]
#[must_use]
pub struct RetryExecutorBuilder {
    config: RetryConfiguration,
    clock: Option<Clock>,
    classifier: ErrorClassifier,
    jitter: JitterSource,
    observers: Vec<OnAttempt>,
    cancellation: Option<CancellationToken>,
}

impl RetryExecutorBuilder {
    pub(super) fn new(config: RetryConfiguration) -> Self {
        Self {
            config,
            clock: None,
            classifier: ErrorClassifier::default(),
            jitter: JitterSource::default(),
            observers: Vec::new(),
            cancellation: None,
        }
    }

    /// Sets the clock used for measuring elapsed time and waiting between attempts.
    ///
    /// Tests pass a `tick::ClockControl` here to run retry sequences without waiting.
    pub fn clock(mut self, clock: impl Into<Clock>) -> Self {
        self.clock = Some(clock.into());
        self
    }

    /// Sets the classifier that decides which failures are retried.
    pub fn classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Sets the source of randomness used for jitter.
    pub fn jitter(mut self, jitter: JitterSource) -> Self {
        self.jitter = jitter;
        self
    }

    /// Registers an observer that is invoked for every [`AttemptEvent`].
    ///
    /// Observers run synchronously in the task that executes the operation, in the order they
    /// were registered. Can be called multiple times.
    pub fn on_attempt(mut self, observer: impl Fn(&AttemptEvent) + Send + Sync + 'static) -> Self {
        self.observers.push(OnAttempt::new(observer));
        self
    }

    /// Reports attempt events through the given [`Telemetry`].
    pub fn telemetry(self, telemetry: Telemetry) -> Self {
        self.on_attempt(move |event| telemetry.observe(event))
    }

    /// Sets a token that cancels every operation run by the executor.
    ///
    /// Use [`RetryExecutor::execute_cancellable`] to cancel a single operation instead.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Builds the executor.
    ///
    /// # Panics
    ///
    /// Panics if no [`clock`][Self::clock] was set and this is called outside of a Tokio
    /// runtime, since the default clock is driven by one.
    #[must_use]
    pub fn build(self) -> RetryExecutor {
        RetryExecutor {
            shared: Arc::new(Shared {
                backoff: BackoffCalculator::new(self.jitter),
                clock: self.clock.unwrap_or_else(Clock::new_tokio),
                config: self.config,
                classifier: self.classifier,
                observers: self.observers,
                cancellation: self.cancellation,
            }),
        }
    }
}
