// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::cmp::min;
use std::time::Duration;

use crate::{Classification, JitterSource, RetryConfiguration};

/// Computes the wait before the next retry.
///
/// For the `n`-th retry (`n ≥ 1`, the first attempt is not a retry) the delay is:
///
/// 1. `base_interval × backoff_multiplier^(n - 1)`,
/// 2. multiplied by `1 + u` where `u` is uniform in `[-jitter_fraction, +jitter_fraction]`,
/// 3. clamped to `max_interval` when one is configured.
///
/// When the failure is [`RetryableRateLimited`][Classification::RetryableRateLimited] and the
/// server supplied a retry hint, the wait is the larger of the computed delay and the hint. The
/// hint itself is neither jittered nor capped. Rate-limited failures without a hint use the
/// regular formula.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use rebound::{BackoffCalculator, Classification, JitterSource, RetryConfiguration, RetryOverrides};
///
/// let config = RetryConfiguration::from_overrides(&RetryOverrides::new().jitter_fraction(0.0))?;
/// let calculator = BackoffCalculator::new(JitterSource::default());
///
/// let delays: Vec<_> = (1..=3)
///     .map(|retry| calculator.compute(retry, Classification::Retryable, &config, None))
///     .collect();
///
/// assert_eq!(
///     delays,
///     [Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)]
/// );
/// # Ok::<(), rebound::ConfigurationError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct BackoffCalculator {
    jitter: JitterSource,
}

impl BackoffCalculator {
    /// Creates a calculator drawing jitter from the given source.
    #[must_use]
    pub fn new(jitter: JitterSource) -> Self {
        Self { jitter }
    }

    /// Computes the wait before the `retry`-th retry. `retry` is 1-based; `0` is treated as `1`.
    #[must_use]
    pub fn compute(
        &self,
        retry: u32,
        classification: Classification,
        config: &RetryConfiguration,
        rate_limit_hint: Option<Duration>,
    ) -> Duration {
        let delay = exponential_delay(retry, config);
        let delay = apply_jitter(delay, config.jitter_fraction(), &self.jitter);
        let delay = clamp_to_max(delay, config.max_interval());

        match (classification, rate_limit_hint) {
            (Classification::RetryableRateLimited, Some(hint)) => delay.max(hint),
            _ => delay,
        }
    }
}

fn exponential_delay(retry: u32, config: &RetryConfiguration) -> Duration {
    let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
    let factor = config.backoff_multiplier().powi(exponent);

    secs_to_duration_saturating(config.base_interval().as_secs_f64() * factor)
}

/// Scales `delay` by `1 + u` with `u` uniform in `[-fraction, +fraction]`.
///
/// No random number is drawn when `fraction` is zero, so unjittered sequences are exact.
fn apply_jitter(delay: Duration, fraction: f64, jitter: &JitterSource) -> Duration {
    if fraction <= 0.0 || delay.is_zero() || delay == Duration::MAX {
        return delay;
    }

    let offset = fraction.mul_add(2.0 * jitter.next_f64(), -fraction);
    secs_to_duration_saturating(delay.as_secs_f64() * (1.0 + offset))
}

fn clamp_to_max(delay: Duration, max: Option<Duration>) -> Duration {
    max.map_or(delay, |m| min(delay, m))
}

fn secs_to_duration_saturating(secs: f64) -> Duration {
    if secs <= 0.0 || secs.is_nan() {
        return Duration::ZERO;
    }

    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
