// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use crate::{Classification, ClassifiedFailure, Failure};

/// One attempt of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptRecord {
    index: u32,
    elapsed: Duration,
    classification: Option<Classification>,
    wait: Option<Duration>,
}

impl AttemptRecord {
    pub(crate) fn first(elapsed: Duration) -> Self {
        Self {
            index: 1,
            elapsed,
            classification: None,
            wait: None,
        }
    }

    pub(crate) fn retry(index: u32, elapsed: Duration, classification: Classification, wait: Duration) -> Self {
        Self {
            index,
            elapsed,
            classification: Some(classification),
            wait: Some(wait),
        }
    }

    /// The 1-based index of the attempt.
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Time elapsed since the operation started, measured when the attempt started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Classification of the failure that caused this attempt. `None` for the first attempt.
    #[must_use]
    pub fn classification(&self) -> Option<Classification> {
        self.classification
    }

    /// The wait before this attempt. `None` for the first attempt.
    #[must_use]
    pub fn wait(&self) -> Option<Duration> {
        self.wait
    }
}

/// The result of an operation that eventually succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completed<T> {
    value: T,
    attempts: Vec<AttemptRecord>,
}

impl<T> Completed<T> {
    pub(crate) fn new(value: T, attempts: Vec<AttemptRecord>) -> Self {
        Self { value, attempts }
    }

    /// The value returned by the successful attempt.
    #[must_use]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Every attempt made, in order. The last one succeeded.
    #[must_use]
    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    /// Unwraps the value, discarding the attempt history.
    #[must_use]
    pub fn into_value(self) -> T {
        self.value
    }

    /// Splits into the value and the attempt history.
    #[must_use]
    pub fn into_parts(self) -> (T, Vec<AttemptRecord>) {
        (self.value, self.attempts)
    }
}

/// A non-retryable failure, surfaced without further attempts.
#[derive(Debug, thiserror::Error)]
#[error("non-retryable failure on attempt {}", .attempts.len())]
pub struct NonRetryableError {
    #[source]
    failure: Failure,
    attempts: Vec<AttemptRecord>,
}

impl NonRetryableError {
    pub(crate) fn new(failure: Failure, attempts: Vec<AttemptRecord>) -> Self {
        Self { failure, attempts }
    }

    /// The failure of the last attempt.
    #[must_use]
    pub fn failure(&self) -> &Failure {
        &self.failure
    }

    /// Every attempt made, in order.
    #[must_use]
    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    /// Unwraps the failure of the last attempt.
    #[must_use]
    pub fn into_failure(self) -> Failure {
        self.failure
    }
}

/// Retryable failures persisted past the configured maximum number of retries.
#[derive(Debug, thiserror::Error)]
#[error("retries exhausted after {} attempts", .attempts.len())]
pub struct RetryExhaustedError {
    #[source]
    last_failure: ClassifiedFailure,
    attempts: Vec<AttemptRecord>,
}

impl RetryExhaustedError {
    pub(crate) fn new(last_failure: ClassifiedFailure, attempts: Vec<AttemptRecord>) -> Self {
        Self { last_failure, attempts }
    }

    /// The failure of the last attempt.
    #[must_use]
    pub fn last_failure(&self) -> &ClassifiedFailure {
        &self.last_failure
    }

    /// Every attempt made, in order.
    #[must_use]
    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }
}

/// The next wait would have pushed the operation past its overall timeout.
///
/// The executor gives up without waiting once it knows the budget cannot be honoured.
#[derive(Debug, thiserror::Error)]
#[error(
    "overall timeout of {budget:?} would be exceeded by a wait of {rejected_wait:?} after {} attempts",
    .attempts.len()
)]
pub struct TimeoutExceededError {
    #[source]
    last_failure: ClassifiedFailure,
    attempts: Vec<AttemptRecord>,
    budget: Duration,
    rejected_wait: Duration,
}

impl TimeoutExceededError {
    pub(crate) fn new(last_failure: ClassifiedFailure, attempts: Vec<AttemptRecord>, budget: Duration, rejected_wait: Duration) -> Self {
        Self {
            last_failure,
            attempts,
            budget,
            rejected_wait,
        }
    }

    /// The failure of the last attempt.
    #[must_use]
    pub fn last_failure(&self) -> &ClassifiedFailure {
        &self.last_failure
    }

    /// Every attempt made, in order.
    #[must_use]
    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    /// The configured overall timeout.
    #[must_use]
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// The wait that would have exceeded the budget.
    #[must_use]
    pub fn rejected_wait(&self) -> Duration {
        self.rejected_wait
    }
}

/// The operation was cancelled before an attempt or during a wait.
#[derive(Debug, thiserror::Error)]
#[error("operation cancelled after {} attempts", .attempts.len())]
pub struct CancelledError {
    #[source]
    last_failure: Option<ClassifiedFailure>,
    attempts: Vec<AttemptRecord>,
}

impl CancelledError {
    pub(crate) fn new(last_failure: Option<ClassifiedFailure>, attempts: Vec<AttemptRecord>) -> Self {
        Self { last_failure, attempts }
    }

    /// The most recent failure, if any attempt was made.
    #[must_use]
    pub fn last_failure(&self) -> Option<&ClassifiedFailure> {
        self.last_failure.as_ref()
    }

    /// Every attempt made, in order. Empty if the operation was cancelled before it started.
    #[must_use]
    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }
}

/// Why an operation did not succeed.
///
/// Every variant carries the ordered attempt history. The error chain
/// ([`std::error::Error::source`]) leads to the [`Failure`] of the last attempt and from there
/// to the error raised by the transport.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RetryError {
    /// A non-retryable failure.
    #[error(transparent)]
    NonRetryable(#[from] NonRetryableError),

    /// Retries were exhausted.
    #[error(transparent)]
    Exhausted(#[from] RetryExhaustedError),

    /// The overall timeout would have been exceeded.
    #[error(transparent)]
    TimeoutExceeded(#[from] TimeoutExceededError),

    /// The operation was cancelled.
    #[error(transparent)]
    Cancelled(#[from] CancelledError),
}

impl RetryError {
    /// Every attempt made, in order.
    #[must_use]
    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            Self::NonRetryable(e) => e.attempts(),
            Self::Exhausted(e) => e.attempts(),
            Self::TimeoutExceeded(e) => e.attempts(),
            Self::Cancelled(e) => e.attempts(),
        }
    }

    /// The failure of the last attempt, if any attempt was made.
    #[must_use]
    pub fn last_failure(&self) -> Option<&Failure> {
        match self {
            Self::NonRetryable(e) => Some(e.failure()),
            Self::Exhausted(e) => Some(e.last_failure().failure()),
            Self::TimeoutExceeded(e) => Some(e.last_failure().failure()),
            Self::Cancelled(e) => e.last_failure().map(ClassifiedFailure::failure),
        }
    }

    /// Returns `true` if the operation was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    fn history(len: u32) -> Vec<AttemptRecord> {
        std::iter::once(AttemptRecord::first(Duration::ZERO))
            .chain((2..=len).map(|index| {
                AttemptRecord::retry(index, Duration::from_secs(u64::from(index)), Classification::Retryable, Duration::from_secs(1))
            }))
            .collect()
    }

    #[test]
    fn first_record_has_no_cause() {
        let record = AttemptRecord::first(Duration::from_millis(5));

        assert_eq!(record.index(), 1);
        assert_eq!(record.elapsed(), Duration::from_millis(5));
        assert_eq!(record.classification(), None);
        assert_eq!(record.wait(), None);
    }

    #[test]
    fn completed_parts() {
        let completed = Completed::new("ok", history(2));

        assert_eq!(*completed.value(), "ok");
        assert_eq!(completed.attempts().len(), 2);

        let (value, attempts) = completed.into_parts();
        assert_eq!(value, "ok");
        assert_eq!(attempts[1].index(), 2);
    }

    #[test]
    fn display_messages() {
        let failure = || ClassifiedFailure::new(Failure::status(503), Classification::Retryable);

        assert_eq!(
            RetryError::from(NonRetryableError::new(Failure::status(401), history(1))).to_string(),
            "non-retryable failure on attempt 1"
        );
        assert_eq!(
            RetryError::from(RetryExhaustedError::new(failure(), history(4))).to_string(),
            "retries exhausted after 4 attempts"
        );
        assert_eq!(
            RetryError::from(TimeoutExceededError::new(
                failure(),
                history(2),
                Duration::from_secs(2),
                Duration::from_secs(2)
            ))
            .to_string(),
            "overall timeout of 2s would be exceeded by a wait of 2s after 2 attempts"
        );
        assert_eq!(
            RetryError::from(CancelledError::new(None, Vec::new())).to_string(),
            "operation cancelled after 0 attempts"
        );
    }

    #[test]
    fn source_chain_reaches_transport_error() {
        let failure = Failure::connect(std::io::Error::other("connection refused"));
        let error = RetryError::from(RetryExhaustedError::new(
            ClassifiedFailure::new(failure, Classification::Retryable),
            history(1),
        ));

        let classified = error.source().unwrap();
        let failure = classified.source().unwrap();
        let transport = failure.source().unwrap();

        assert_eq!(transport.to_string(), "connection refused");
    }

    #[test]
    fn accessors_on_enum() {
        let error = RetryError::from(NonRetryableError::new(Failure::status(404), history(1)));

        assert_eq!(error.attempts().len(), 1);
        assert_eq!(error.last_failure().and_then(Failure::status_code), Some(404));
        assert!(!error.is_cancelled());

        let error = RetryError::from(CancelledError::new(None, Vec::new()));

        assert!(error.last_failure().is_none());
        assert!(error.is_cancelled());
        assert!(error.source().is_none());
    }

    #[test]
    fn static_assertions() {
        static_assertions::assert_impl_all!(RetryError: Error, Send, Sync);
        static_assertions::assert_impl_all!(Completed<String>: Send, Sync);
        static_assertions::assert_impl_all!(AttemptRecord: Copy, Send, Sync);
    }
}
