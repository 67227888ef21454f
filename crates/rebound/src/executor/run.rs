// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::future::Future;
use std::mem;
use std::ops::ControlFlow;
use std::pin::pin;
use std::time::Duration;

use futures_util::future::{Either, select};
use tick::Stopwatch;
use tokio_util::sync::CancellationToken;

use super::{
    AttemptEvent, AttemptEventKind, AttemptRecord, CancelledError, Completed, NonRetryableError, RetryError, RetryExhaustedError,
    Shared, TimeoutExceededError,
};
use crate::{ClassifiedFailure, Failure};

/// The failure that caused the current retry and the wait that preceded it.
struct Retrying {
    last_failure: ClassifiedFailure,
    wait: Duration,
}

impl Shared {
    #[cfg_attr(test, mutants::skip)] // causes test timeout
    pub(super) async fn run<T, F, Fut>(&self, token: Option<&CancellationToken>, mut operation: F) -> Result<Completed<T>, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Failure>>,
    {
        let stopwatch = self.clock.stopwatch();
        let mut attempts = Vec::new();
        let mut retrying: Option<Retrying> = None;
        let mut index: u32 = 1;

        loop {
            if is_cancelled(token) {
                let last_failure = retrying.map(|r| r.last_failure);
                return Err(self.cancelled(last_failure, attempts, index, &stopwatch));
            }

            let elapsed = stopwatch.elapsed();

            match &retrying {
                None => attempts.push(AttemptRecord::first(elapsed)),
                Some(r) => {
                    let classification = r.last_failure.classification();
                    attempts.push(AttemptRecord::retry(index, elapsed, classification, r.wait));
                    self.notify(&AttemptEvent::new(
                        AttemptEventKind::Retry,
                        index,
                        elapsed,
                        Some(classification),
                        Some(r.wait),
                    ));
                }
            }

            let failure = match operation().await {
                Ok(value) => {
                    self.notify(&AttemptEvent::new(AttemptEventKind::Succeeded, index, stopwatch.elapsed(), None, None));
                    return Ok(Completed::new(value, attempts));
                }
                Err(failure) => failure,
            };

            let (last_failure, wait) = match self.evaluate_failure(failure, index, &mut attempts, &stopwatch) {
                ControlFlow::Continue(next) => next,
                ControlFlow::Break(error) => return Err(error),
            };

            if !self.wait(wait, token).await {
                return Err(self.cancelled(Some(last_failure), attempts, index, &stopwatch));
            }

            retrying = Some(Retrying { last_failure, wait });
            index = index.saturating_add(1);
        }
    }

    /// Decides whether a failed attempt is followed by another one, and after what wait.
    fn evaluate_failure(
        &self,
        failure: Failure,
        index: u32,
        attempts: &mut Vec<AttemptRecord>,
        stopwatch: &Stopwatch,
    ) -> ControlFlow<RetryError, (ClassifiedFailure, Duration)> {
        let classification = self.classifier.classify(&failure);
        let elapsed = stopwatch.elapsed();

        if !classification.is_retryable() {
            self.notify(&AttemptEvent::new(
                AttemptEventKind::NonRetryable,
                index,
                elapsed,
                Some(classification),
                None,
            ));
            return ControlFlow::Break(NonRetryableError::new(failure, mem::take(attempts)).into());
        }

        let rate_limit_hint = failure.retry_after();
        let failure = ClassifiedFailure::new(failure, classification);

        if index > self.config.max_retries() {
            self.notify(&AttemptEvent::new(AttemptEventKind::Exhausted, index, elapsed, Some(classification), None));
            return ControlFlow::Break(RetryExhaustedError::new(failure, mem::take(attempts)).into());
        }

        let wait = self.backoff.compute(index, classification, &self.config, rate_limit_hint);
        let budget = self.config.overall_timeout();

        if elapsed.saturating_add(wait) > budget {
            self.notify(&AttemptEvent::new(
                AttemptEventKind::TimeoutExceeded,
                index,
                elapsed,
                Some(classification),
                Some(wait),
            ));
            return ControlFlow::Break(TimeoutExceededError::new(failure, mem::take(attempts), budget, wait).into());
        }

        ControlFlow::Continue((failure, wait))
    }

    /// Waits on the clock. Returns `false` if cancelled first.
    async fn wait(&self, wait: Duration, token: Option<&CancellationToken>) -> bool {
        let delay = pin!(self.clock.delay(wait));

        let Some(token) = token else {
            delay.await;
            return true;
        };

        if token.is_cancelled() {
            return false;
        }

        let cancelled = pin!(token.cancelled());

        matches!(select(delay, cancelled).await, Either::Left(_))
    }

    fn cancelled(&self, last_failure: Option<ClassifiedFailure>, attempts: Vec<AttemptRecord>, index: u32, stopwatch: &Stopwatch) -> RetryError {
        let classification = last_failure.as_ref().map(ClassifiedFailure::classification);

        self.notify(&AttemptEvent::new(
            AttemptEventKind::Cancelled,
            index,
            stopwatch.elapsed(),
            classification,
            None,
        ));

        CancelledError::new(last_failure, attempts).into()
    }

    fn notify(&self, event: &AttemptEvent) {
        for observer in &self.observers {
            observer.call(event);
        }
    }
}

fn is_cancelled(token: Option<&CancellationToken>) -> bool {
    token.is_some_and(CancellationToken::is_cancelled)
}
