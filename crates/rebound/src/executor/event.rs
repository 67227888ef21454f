// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Display};
use std::time::Duration;

use crate::Classification;
use crate::fn_wrapper::define_fn_wrapper;

define_fn_wrapper!(OnAttempt(Fn(event: &AttemptEvent)));

/// What happened in the attempt loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum AttemptEventKind {
    /// A retry attempt is about to start after waiting.
    Retry,

    /// The operation succeeded.
    Succeeded,

    /// The operation failed with a non-retryable failure.
    NonRetryable,

    /// Retryable failures persisted past the maximum number of retries.
    Exhausted,

    /// The next wait would overrun the overall timeout.
    TimeoutExceeded,

    /// The operation was cancelled.
    Cancelled,
}

impl AttemptEventKind {
    /// Returns `true` if the event ends the operation.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Retry)
    }

    /// Short `snake_case` label used in telemetry.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Retry => "retry",
            Self::Succeeded => "succeeded",
            Self::NonRetryable => "non_retryable",
            Self::Exhausted => "exhausted",
            Self::TimeoutExceeded => "timeout_exceeded",
            Self::Cancelled => "cancelled",
        }
    }
}

impl Display for AttemptEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reported to observers registered with
/// [`RetryExecutorBuilder::on_attempt`][crate::RetryExecutorBuilder::on_attempt].
///
/// A [`Retry`][AttemptEventKind::Retry] event is reported before every attempt except the
/// first, carrying the classification of the failure that caused the retry and the wait that
/// preceded it. Exactly one terminal event is reported per operation.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptEvent {
    kind: AttemptEventKind,
    attempt_index: u32,
    elapsed: Duration,
    classification: Option<Classification>,
    wait: Option<Duration>,
}

impl AttemptEvent {
    pub(crate) fn new(
        kind: AttemptEventKind,
        attempt_index: u32,
        elapsed: Duration,
        classification: Option<Classification>,
        wait: Option<Duration>,
    ) -> Self {
        Self {
            kind,
            attempt_index,
            elapsed,
            classification,
            wait,
        }
    }

    /// What happened.
    #[must_use]
    pub fn kind(&self) -> AttemptEventKind {
        self.kind
    }

    /// The 1-based index of the attempt the event refers to.
    #[must_use]
    pub fn attempt_index(&self) -> u32 {
        self.attempt_index
    }

    /// Time elapsed since the operation started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Classification of the failure behind the event.
    ///
    /// `None` for [`Succeeded`][AttemptEventKind::Succeeded] and for cancellations that
    /// happened before any failure.
    #[must_use]
    pub fn classification(&self) -> Option<Classification> {
        self.classification
    }

    /// For [`Retry`][AttemptEventKind::Retry], the wait that preceded the attempt. For
    /// [`TimeoutExceeded`][AttemptEventKind::TimeoutExceeded], the wait that was rejected.
    #[must_use]
    pub fn wait(&self) -> Option<Duration> {
        self.wait
    }
}
