// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! # Retry telemetry
//!
//! [`Telemetry`] is a ready-made attempt observer. Register it with
//! [`RetryExecutorBuilder::telemetry`][crate::RetryExecutorBuilder::telemetry] to turn
//! [`AttemptEvent`]s into `tracing` events and, with the `metrics` feature, into increments of
//! an OpenTelemetry counter.
//!
//! The constants in this module are the keys attached to both.
//!
//! # Conventions
//!
//! Names follow the [OpenTelemetry naming guidelines](https://opentelemetry.io/docs/specs/semconv/general/naming/#general-naming-considerations).
//! Keys are dot-separated; values are short and `snake_case`.

use std::borrow::Cow;

use crate::{AttemptEvent, AttemptEventKind, Classification};

#[cfg(any(feature = "metrics", test))]
mod metrics;

/// Key used to annotate the name of the pipeline, i.e. the remote service being called.
pub const PIPELINE_NAME: &str = "resilience.pipeline.name";

/// Key used to annotate the name of the resilience strategy. Defaults to `retry`.
pub const STRATEGY_NAME: &str = "resilience.strategy.name";

/// Key used to annotate the kind of attempt event, e.g. `retry` or `exhausted`.
pub const EVENT_NAME: &str = "resilience.event.name";

/// Key used to annotate the 1-based attempt index.
pub const ATTEMPT_INDEX: &str = "resilience.attempt.index";

/// Key used to annotate the classification of the failure behind the event.
pub const CLASSIFICATION: &str = "resilience.classification";

const DEFAULT_STRATEGY_NAME: &str = "retry";

/// Reports attempt events through `tracing` and OpenTelemetry.
///
/// Nothing is reported until logs or metrics are enabled.
///
/// Logs are emitted as `tracing` events named `rebound.retry`:
///
/// | Event | Level |
/// |---|---|
/// | retry | `WARN` |
/// | succeeded | `DEBUG` |
/// | non-retryable, exhausted, timeout exceeded, cancelled | `ERROR` |
///
/// # Examples
///
/// ```
/// use rebound::{RetryConfiguration, RetryExecutor, Telemetry};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let executor = RetryExecutor::builder(RetryConfiguration::default())
///     .telemetry(Telemetry::new("inventory_api").use_logs())
///     .build();
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Telemetry {
    pipeline_name: Cow<'static, str>,
    strategy_name: Cow<'static, str>,
    logs_enabled: bool,
    #[cfg(any(feature = "metrics", test))]
    event_reporter: Option<opentelemetry::metrics::Counter<u64>>,
}

impl Telemetry {
    /// Creates telemetry for the named pipeline with logs and metrics disabled.
    #[must_use]
    pub fn new(pipeline_name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            pipeline_name: pipeline_name.into(),
            strategy_name: Cow::Borrowed(DEFAULT_STRATEGY_NAME),
            logs_enabled: false,
            #[cfg(any(feature = "metrics", test))]
            event_reporter: None,
        }
    }

    /// Overrides the strategy name reported with every event.
    #[must_use]
    pub fn strategy_name(mut self, strategy_name: impl Into<Cow<'static, str>>) -> Self {
        self.strategy_name = strategy_name.into();
        self
    }

    /// Enables `tracing` events.
    #[must_use]
    pub fn use_logs(mut self) -> Self {
        self.logs_enabled = true;
        self
    }

    /// Enables the `resilience.event` counter on a meter created from `meter_provider`.
    #[cfg(any(feature = "metrics", test))]
    #[must_use]
    pub fn use_metrics(mut self, meter_provider: &dyn opentelemetry::metrics::MeterProvider) -> Self {
        let meter = metrics::create_meter(meter_provider);
        self.event_reporter = Some(metrics::create_attempt_event_counter(&meter));
        self
    }

    /// The pipeline name reported with every event.
    #[must_use]
    pub fn pipeline_name(&self) -> &str {
        &self.pipeline_name
    }

    /// Reports a single attempt event.
    pub fn observe(&self, event: &AttemptEvent) {
        if self.logs_enabled {
            self.emit_log(event);
        }

        #[cfg(any(feature = "metrics", test))]
        if let Some(reporter) = &self.event_reporter {
            reporter.add(1, &self.metric_attributes(event));
        }
    }

    fn emit_log(&self, event: &AttemptEvent) {
        let classification = event.classification().map(Classification::as_str);
        let delay = event.wait().map(|wait| wait.as_secs_f32());
        let elapsed = event.elapsed().as_secs_f32();

        match event.kind() {
            AttemptEventKind::Retry => tracing::event!(
                name: "rebound.retry",
                tracing::Level::WARN,
                resilience.pipeline.name = %self.pipeline_name,
                resilience.strategy.name = %self.strategy_name,
                resilience.event.name = event.kind().as_str(),
                resilience.attempt.index = event.attempt_index(),
                resilience.retry.delay = delay,
                resilience.classification = classification,
                resilience.elapsed = elapsed,
            ),
            AttemptEventKind::Succeeded => tracing::event!(
                name: "rebound.retry",
                tracing::Level::DEBUG,
                resilience.pipeline.name = %self.pipeline_name,
                resilience.strategy.name = %self.strategy_name,
                resilience.event.name = event.kind().as_str(),
                resilience.attempt.index = event.attempt_index(),
                resilience.elapsed = elapsed,
            ),
            AttemptEventKind::NonRetryable
            | AttemptEventKind::Exhausted
            | AttemptEventKind::TimeoutExceeded
            | AttemptEventKind::Cancelled => tracing::event!(
                name: "rebound.retry",
                tracing::Level::ERROR,
                resilience.pipeline.name = %self.pipeline_name,
                resilience.strategy.name = %self.strategy_name,
                resilience.event.name = event.kind().as_str(),
                resilience.attempt.index = event.attempt_index(),
                resilience.retry.delay = delay,
                resilience.classification = classification,
                resilience.elapsed = elapsed,
            ),
        }
    }

    #[cfg(any(feature = "metrics", test))]
    fn metric_attributes(&self, event: &AttemptEvent) -> Vec<opentelemetry::KeyValue> {
        use opentelemetry::KeyValue;

        let mut attributes = vec![
            KeyValue::new(PIPELINE_NAME, self.pipeline_name.clone()),
            KeyValue::new(STRATEGY_NAME, self.strategy_name.clone()),
            KeyValue::new(EVENT_NAME, event.kind().as_str()),
            KeyValue::new(ATTEMPT_INDEX, i64::from(event.attempt_index())),
        ];

        if let Some(classification) = event.classification() {
            attributes.push(KeyValue::new(CLASSIFICATION, classification.as_str()));
        }

        attributes
    }
}
