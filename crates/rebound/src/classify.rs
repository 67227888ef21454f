// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Display};

use crate::fn_wrapper::define_fn_wrapper;
use crate::{Failure, FailureKind};

/// Whether a failure is worth retrying, and how.
///
/// The classification is produced fresh for every failed attempt and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// A transient failure; retry with the regular backoff.
    Retryable,

    /// The remote service is throttling the caller; retry, but honour any server-supplied wait.
    RetryableRateLimited,

    /// A permanent failure; retrying will not change the outcome.
    NonRetryable,
}

impl Classification {
    /// Returns `true` for [`Retryable`][Self::Retryable] and
    /// [`RetryableRateLimited`][Self::RetryableRateLimited].
    #[must_use]
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::NonRetryable)
    }

    /// Short `snake_case` label used in telemetry.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Retryable => "retryable",
            Self::RetryableRateLimited => "rate_limited",
            Self::NonRetryable => "non_retryable",
        }
    }
}

impl Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status codes with a dedicated classification. Statuses not listed here fall through to the
/// generic client-error rule and then to the fail-fast default.
const STATUS_TABLE: &[(u16, Classification)] = &[
    (429, Classification::RetryableRateLimited),
    (500, Classification::Retryable),
    (502, Classification::Retryable),
    (503, Classification::Retryable),
    (504, Classification::Retryable),
];

define_fn_wrapper!(Rule(Fn(failure: &Failure) -> Option<Classification>));

/// Maps failures to a [`Classification`].
///
/// The built-in rules are evaluated in this order:
///
/// 1. Connection and timeout failures are [`Retryable`][Classification::Retryable].
/// 2. Status 500, 502, 503 and 504 are [`Retryable`][Classification::Retryable].
/// 3. Status 429 is [`RetryableRateLimited`][Classification::RetryableRateLimited].
/// 4. Any other 4xx status is [`NonRetryable`][Classification::NonRetryable].
/// 5. Anything else is [`NonRetryable`][Classification::NonRetryable].
///
/// Unknown failures never retry silently. Callers that know better can add their own rules with
/// [`with_rule`][Self::with_rule]; custom rules run before the built-in ones and the first rule
/// that returns `Some` decides.
///
/// # Examples
///
/// ```
/// use rebound::{Classification, ErrorClassifier, Failure, FailureKind};
///
/// let classifier = ErrorClassifier::new()
///     // 408 Request Timeout is worth another try for this service
///     .with_rule(|failure| (failure.status_code() == Some(408)).then_some(Classification::Retryable));
///
/// assert_eq!(classifier.classify(&Failure::status(408)), Classification::Retryable);
/// assert_eq!(classifier.classify(&Failure::status(404)), Classification::NonRetryable);
/// assert_eq!(classifier.classify(&Failure::status(429)), Classification::RetryableRateLimited);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ErrorClassifier {
    rules: Vec<Rule>,
}

impl ErrorClassifier {
    /// Creates a classifier with only the built-in rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a custom rule that runs before the built-in rules.
    ///
    /// Custom rules are evaluated in the order they were added. A rule returns `None` to defer to
    /// the next rule.
    #[must_use]
    pub fn with_rule(mut self, rule: impl Fn(&Failure) -> Option<Classification> + Send + Sync + 'static) -> Self {
        self.rules.push(Rule::new(rule));
        self
    }

    /// Classifies a single failure.
    #[must_use]
    pub fn classify(&self, failure: &Failure) -> Classification {
        self.rules
            .iter()
            .find_map(|rule| rule.call(failure))
            .unwrap_or_else(|| classify_builtin(failure))
    }
}

fn classify_builtin(failure: &Failure) -> Classification {
    match failure.kind() {
        FailureKind::Connect | FailureKind::Timeout => Classification::Retryable,
        FailureKind::Status(status) => STATUS_TABLE
            .iter()
            .find(|(code, _)| *code == status)
            .map_or(Classification::NonRetryable, |(_, classification)| *classification),
        FailureKind::Other => Classification::NonRetryable,
    }
}

/// A failure of a single attempt together with its classification.
///
/// Used by the executor to carry the most recent cause into the terminal error.
#[derive(Debug)]
pub struct ClassifiedFailure {
    failure: Failure,
    classification: Classification,
}

impl ClassifiedFailure {
    /// Pairs a failure with its classification.
    #[must_use]
    pub fn new(failure: Failure, classification: Classification) -> Self {
        Self { failure, classification }
    }

    /// The underlying failure.
    #[must_use]
    pub fn failure(&self) -> &Failure {
        &self.failure
    }

    /// The classification of the failure.
    #[must_use]
    pub fn classification(&self) -> Classification {
        self.classification
    }

    /// Unwraps the underlying failure.
    #[must_use]
    pub fn into_failure(self) -> Failure {
        self.failure
    }
}

impl Display for ClassifiedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.failure, self.classification)
    }
}

impl std::error::Error for ClassifiedFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.failure)
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(500, Classification::Retryable)]
    #[case(502, Classification::Retryable)]
    #[case(503, Classification::Retryable)]
    #[case(504, Classification::Retryable)]
    #[case(429, Classification::RetryableRateLimited)]
    #[case(400, Classification::NonRetryable)]
    #[case(401, Classification::NonRetryable)]
    #[case(403, Classification::NonRetryable)]
    #[case(404, Classification::NonRetryable)]
    #[case(408, Classification::NonRetryable)]
    #[case(422, Classification::NonRetryable)]
    #[case(451, Classification::NonRetryable)]
    #[case(501, Classification::NonRetryable)]
    #[case(505, Classification::NonRetryable)]
    #[case(302, Classification::NonRetryable)]
    fn builtin_status_table(#[case] status: u16, #[case] expected: Classification) {
        assert_eq!(ErrorClassifier::new().classify(&Failure::status(status)), expected);
    }

    #[test]
    fn transport_failures_are_retryable() {
        let classifier = ErrorClassifier::new();

        assert_eq!(classifier.classify(&Failure::connect("refused")), Classification::Retryable);
        assert_eq!(classifier.classify(&Failure::timeout("read timed out")), Classification::Retryable);
    }

    #[test]
    fn unknown_failures_fail_fast() {
        assert_eq!(
            ErrorClassifier::new().classify(&Failure::other("unexpected")),
            Classification::NonRetryable
        );
    }

    #[test]
    fn custom_rules_run_first_in_order() {
        let classifier = ErrorClassifier::new()
            .with_rule(|failure| (failure.status_code() == Some(503)).then_some(Classification::NonRetryable))
            .with_rule(|failure| (failure.status_code() == Some(503)).then_some(Classification::RetryableRateLimited))
            .with_rule(|failure| (failure.kind() == FailureKind::Other).then_some(Classification::Retryable));

        assert_eq!(classifier.classify(&Failure::status(503)), Classification::NonRetryable);
        assert_eq!(classifier.classify(&Failure::other("flaky")), Classification::Retryable);
        assert_eq!(classifier.classify(&Failure::status(502)), Classification::Retryable);
    }

    #[test]
    fn is_retryable() {
        assert!(Classification::Retryable.is_retryable());
        assert!(Classification::RetryableRateLimited.is_retryable());
        assert!(!Classification::NonRetryable.is_retryable());
    }

    #[test]
    fn display() {
        assert_eq!(Classification::RetryableRateLimited.to_string(), "rate_limited");

        let classified = ClassifiedFailure::new(Failure::status(503), Classification::Retryable);
        assert_eq!(classified.to_string(), "status 503 (retryable)");
    }

    #[test]
    fn classified_failure_accessors() {
        let classified = ClassifiedFailure::new(Failure::status(429), Classification::RetryableRateLimited);

        assert_eq!(classified.classification(), Classification::RetryableRateLimited);
        assert_eq!(classified.failure().status_code(), Some(429));
        assert!(std::error::Error::source(&classified).is_some());
        assert_eq!(classified.into_failure().status_code(), Some(429));
    }

    #[test]
    fn static_assertions() {
        static_assertions::assert_impl_all!(ErrorClassifier: Send, Sync, Clone, std::fmt::Debug);
    }
}
