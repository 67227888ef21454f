// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::error::Error;
use std::fmt::{self, Display};
use std::time::Duration;

/// A boxed error that can cross thread boundaries.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// What went wrong during a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum FailureKind {
    /// The connection could not be established or was lost.
    Connect,

    /// Establishing the connection or reading the response timed out.
    Timeout,

    /// The remote service answered with a non-success status code.
    Status(u16),

    /// Any other failure raised by the request adapter.
    Other,
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => f.write_str("connection failure"),
            Self::Timeout => f.write_str("timeout"),
            Self::Status(status) => write!(f, "status {status}"),
            Self::Other => f.write_str("failure"),
        }
    }
}

/// The failure of a single attempt, as raised by the request adapter.
///
/// A `Failure` describes *what* happened; whether it is worth retrying is decided by the
/// [`ErrorClassifier`][crate::ErrorClassifier]. The request adapter creates failures with one
/// of the constructors below and can attach a server-supplied retry hint and the underlying
/// error.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use rebound::{Failure, FailureKind};
///
/// let failure = Failure::status(429).with_retry_after(Duration::from_secs(3));
///
/// assert_eq!(failure.kind(), FailureKind::Status(429));
/// assert_eq!(failure.retry_after(), Some(Duration::from_secs(3)));
/// ```
#[derive(Debug)]
pub struct Failure {
    kind: FailureKind,
    message: Option<Cow<'static, str>>,
    retry_after: Option<Duration>,
    source: Option<BoxError>,
}

impl Failure {
    /// Creates a failure of the given kind.
    #[must_use]
    pub fn new(kind: FailureKind) -> Self {
        Self {
            kind,
            message: None,
            retry_after: None,
            source: None,
        }
    }

    /// A connection could not be established or was lost.
    #[must_use]
    pub fn connect(source: impl Into<BoxError>) -> Self {
        Self::new(FailureKind::Connect).with_source(source)
    }

    /// Establishing a connection or reading the response timed out.
    #[must_use]
    pub fn timeout(source: impl Into<BoxError>) -> Self {
        Self::new(FailureKind::Timeout).with_source(source)
    }

    /// The remote service answered with the given status code.
    #[must_use]
    pub fn status(status: u16) -> Self {
        Self::new(FailureKind::Status(status))
    }

    /// Any other failure.
    #[must_use]
    pub fn other(source: impl Into<BoxError>) -> Self {
        Self::new(FailureKind::Other).with_source(source)
    }

    /// Attaches the wait the remote service asked for, e.g. from a `Retry-After` header.
    #[must_use]
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    /// Attaches the underlying error.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attaches a human-readable description, e.g. the response body summary.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<Cow<'static, str>>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// What went wrong.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// The status code, if the remote service answered.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self.kind {
            FailureKind::Status(status) => Some(status),
            _ => None,
        }
    }

    /// The wait the remote service asked for, if any.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    /// The human-readable description, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.kind, f)?;

        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        } else if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }

        Ok(())
    }
}

impl Error for Failure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn Error + 'static))
    }
}

impl From<std::io::Error> for Failure {
    fn from(error: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let kind = match error.kind() {
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof => FailureKind::Connect,
            ErrorKind::TimedOut | ErrorKind::WouldBlock => FailureKind::Timeout,
            _ => FailureKind::Other,
        };

        Self::new(kind).with_source(error)
    }
}

#[cfg(any(feature = "http", test))]
mod http_glue {
    use std::time::Duration;

    use http::header::RETRY_AFTER;
    use http::response::Parts;
    use http::{HeaderMap, StatusCode};

    use super::Failure;

    impl Failure {
        /// Creates a failure from the head of an unsuccessful HTTP response.
        ///
        /// The `Retry-After` header is honoured in its delta-seconds form; the HTTP-date form
        /// is ignored because it depends on clock agreement with the server.
        #[must_use]
        pub fn from_response(parts: &Parts) -> Self {
            let failure = Self::from(parts.status);

            match retry_after(&parts.headers) {
                Some(delay) => failure.with_retry_after(delay),
                None => failure,
            }
        }
    }

    impl From<StatusCode> for Failure {
        fn from(status: StatusCode) -> Self {
            let failure = Self::status(status.as_u16());

            match status.canonical_reason() {
                Some(reason) => failure.with_message(reason),
                None => failure,
            }
        }
    }

    fn retry_after(headers: &HeaderMap) -> Option<Duration> {
        let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
        value.trim().parse::<u64>().ok().map(Duration::from_secs)
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::io;

    use rstest::rstest;

    use super::*;

    #[test]
    fn constructors_set_kind() {
        assert_eq!(Failure::connect("refused").kind(), FailureKind::Connect);
        assert_eq!(Failure::timeout("slow").kind(), FailureKind::Timeout);
        assert_eq!(Failure::status(503).kind(), FailureKind::Status(503));
        assert_eq!(Failure::other("boom").kind(), FailureKind::Other);
    }

    #[test]
    fn status_code_only_for_status() {
        assert_eq!(Failure::status(404).status_code(), Some(404));
        assert_eq!(Failure::timeout("slow").status_code(), None);
    }

    #[test]
    fn display_prefers_message_over_source() {
        let failure = Failure::status(503).with_message("Service Unavailable");
        assert_eq!(failure.to_string(), "status 503: Service Unavailable");

        let failure = Failure::connect("connection refused");
        assert_eq!(failure.to_string(), "connection failure: connection refused");

        assert_eq!(Failure::new(FailureKind::Other).to_string(), "failure");
    }

    #[test]
    fn source_is_exposed() {
        let failure = Failure::other(io::Error::other("disk on fire"));

        let source = failure.source().unwrap();
        assert_eq!(source.to_string(), "disk on fire");
        assert!(Failure::status(500).source().is_none());
    }

    #[rstest]
    #[case(io::ErrorKind::ConnectionRefused, FailureKind::Connect)]
    #[case(io::ErrorKind::ConnectionReset, FailureKind::Connect)]
    #[case(io::ErrorKind::BrokenPipe, FailureKind::Connect)]
    #[case(io::ErrorKind::TimedOut, FailureKind::Timeout)]
    #[case(io::ErrorKind::WouldBlock, FailureKind::Timeout)]
    #[case(io::ErrorKind::PermissionDenied, FailureKind::Other)]
    fn from_io_error(#[case] io_kind: io::ErrorKind, #[case] expected: FailureKind) {
        let failure = Failure::from(io::Error::new(io_kind, "io"));

        assert_eq!(failure.kind(), expected);
        assert!(failure.source().is_some());
    }

    #[test]
    fn from_status_code_uses_canonical_reason() {
        let failure = Failure::from(http::StatusCode::TOO_MANY_REQUESTS);

        assert_eq!(failure.kind(), FailureKind::Status(429));
        assert_eq!(failure.message(), Some("Too Many Requests"));
    }

    #[test]
    fn from_response_reads_retry_after_seconds() {
        let (parts, ()) = http::Response::builder()
            .status(429)
            .header("retry-after", "3")
            .body(())
            .unwrap()
            .into_parts();

        let failure = Failure::from_response(&parts);

        assert_eq!(failure.status_code(), Some(429));
        assert_eq!(failure.retry_after(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn from_response_ignores_http_date_retry_after() {
        let (parts, ()) = http::Response::builder()
            .status(503)
            .header("retry-after", "Wed, 21 Oct 2015 07:28:00 GMT")
            .body(())
            .unwrap()
            .into_parts();

        let failure = Failure::from_response(&parts);

        assert_eq!(failure.status_code(), Some(503));
        assert_eq!(failure.retry_after(), None);
    }

    #[test]
    fn static_assertions() {
        static_assertions::assert_impl_all!(Failure: Error, Send, Sync);
    }
}
