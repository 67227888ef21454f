// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Resolution of the retry policy from defaults, environment and explicit overrides.

use std::time::Duration;

use crate::constants::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_BASE_INTERVAL, DEFAULT_JITTER_FRACTION, DEFAULT_MAX_RETRIES, DEFAULT_OVERALL_TIMEOUT,
    ENV_BACKOFF_MULTIPLIER, ENV_JITTER_FRACTION, ENV_MAX_RETRIES, ENV_RETRY_INTERVAL, ENV_TIMEOUT,
};

/// Immutable retry policy shared by every call made through a [`RetryExecutor`][crate::RetryExecutor].
///
/// A configuration is resolved once, typically when the API client is constructed, and is never
/// mutated afterwards. Every value is validated during resolution, so a `RetryConfiguration`
/// that exists is always usable by the retry loop.
///
/// Each field is resolved independently with the following precedence:
///
/// 1. The explicit value in [`RetryOverrides`].
/// 2. The environment variable listed in the table below.
/// 3. The compiled-in default.
///
/// | Field | Variable | Unit | Default |
/// |---|---|---|---|
/// | `max_retries` | `MAX_RETRIES` | count | 3 |
/// | `base_interval` | `RETRY_INTERVAL` | milliseconds | 1000 |
/// | `backoff_multiplier` | `BACKOFF_MULTIPLIER` | factor | 2.0 |
/// | `jitter_fraction` | `JITTER_FRACTION` | ratio | 0.2 |
/// | `overall_timeout` | `TIMEOUT` | seconds | 300 |
///
/// `max_interval` has no environment variable and is unset by default.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use rebound::{RetryConfiguration, RetryOverrides};
///
/// let config = RetryConfiguration::from_overrides(
///     &RetryOverrides::new()
///         .max_retries(5)
///         .base_interval(Duration::from_millis(250)),
/// )?;
///
/// assert_eq!(config.max_retries(), 5);
/// assert_eq!(config.base_interval(), Duration::from_millis(250));
/// assert_eq!(config.backoff_multiplier(), 2.0);
/// # Ok::<(), rebound::ConfigurationError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfiguration {
    max_retries: u32,
    base_interval: Duration,
    backoff_multiplier: f64,
    jitter_fraction: f64,
    overall_timeout: Duration,
    max_interval: Option<Duration>,
}

impl Default for RetryConfiguration {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_interval: DEFAULT_BASE_INTERVAL,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter_fraction: DEFAULT_JITTER_FRACTION,
            overall_timeout: DEFAULT_OVERALL_TIMEOUT,
            max_interval: None,
        }
    }
}

impl RetryConfiguration {
    /// Resolves the configuration from overrides, the process environment and the defaults.
    ///
    /// The process environment is read once, here. Nothing else in this crate reads it.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if an environment value cannot be parsed or if any
    /// resolved value is out of range.
    pub fn resolve(overrides: &RetryOverrides) -> Result<Self, ConfigurationError> {
        Self::resolve_with_env(overrides, |variable| std::env::var(variable).ok())
    }

    /// Resolves the configuration from overrides and the defaults, ignoring the environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if any value is out of range.
    pub fn from_overrides(overrides: &RetryOverrides) -> Result<Self, ConfigurationError> {
        Self::resolve_with_env(overrides, |_| None)
    }

    /// Resolves the configuration using a custom environment lookup.
    ///
    /// The lookup receives a variable name and returns its value, if any. Values are trimmed and
    /// empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if an environment value cannot be parsed or if any
    /// resolved value is out of range.
    pub fn resolve_with_env(overrides: &RetryOverrides, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigurationError> {
        let env = EnvSource { lookup };

        let max_retries = match overrides.max_retries {
            Some(value) => i64::from(value),
            None => env.parse::<i64>(ENV_MAX_RETRIES)?.unwrap_or_else(|| i64::from(DEFAULT_MAX_RETRIES)),
        };

        let base_interval = match overrides.base_interval {
            Some(value) => value,
            None => env.duration(ENV_RETRY_INTERVAL, MILLIS)?.unwrap_or(DEFAULT_BASE_INTERVAL),
        };

        let backoff_multiplier = match overrides.backoff_multiplier {
            Some(value) => value,
            None => env.parse::<f64>(ENV_BACKOFF_MULTIPLIER)?.unwrap_or(DEFAULT_BACKOFF_MULTIPLIER),
        };

        let jitter_fraction = match overrides.jitter_fraction {
            Some(value) => value,
            None => env.parse::<f64>(ENV_JITTER_FRACTION)?.unwrap_or(DEFAULT_JITTER_FRACTION),
        };

        let overall_timeout = match overrides.overall_timeout {
            Some(value) => value,
            None => env.duration(ENV_TIMEOUT, SECONDS)?.unwrap_or(DEFAULT_OVERALL_TIMEOUT),
        };

        let max_retries = u32::try_from(max_retries).map_err(|_out_of_range| {
            if max_retries < 0 {
                ConfigurationError::NegativeMaxRetries(max_retries)
            } else {
                ConfigurationError::Unparsable {
                    variable: ENV_MAX_RETRIES,
                    value: max_retries.to_string(),
                }
            }
        })?;

        let config = Self {
            max_retries,
            base_interval,
            backoff_multiplier,
            jitter_fraction,
            overall_timeout,
            max_interval: overrides.max_interval,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.base_interval.is_zero() {
            return Err(ConfigurationError::NonPositiveBaseInterval);
        }

        if self.backoff_multiplier.is_nan() || self.backoff_multiplier < 1.0 || self.backoff_multiplier.is_infinite() {
            return Err(ConfigurationError::BackoffMultiplier(self.backoff_multiplier));
        }

        if !(0.0..1.0).contains(&self.jitter_fraction) {
            return Err(ConfigurationError::JitterFraction(self.jitter_fraction));
        }

        if self.overall_timeout.is_zero() {
            return Err(ConfigurationError::NonPositiveOverallTimeout);
        }

        if self.max_interval.is_some_and(|max| max.is_zero()) {
            return Err(ConfigurationError::NonPositiveMaxInterval);
        }

        Ok(())
    }

    /// Number of retries allowed after the first attempt.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Total number of attempts allowed, i.e. the first attempt plus [`max_retries`][Self::max_retries].
    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait before the first retry, before jitter is applied.
    #[must_use]
    pub fn base_interval(&self) -> Duration {
        self.base_interval
    }

    /// Multiplicative growth of the wait for each subsequent retry.
    #[must_use]
    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    /// Symmetric jitter ratio in `[0, 1)`.
    #[must_use]
    pub fn jitter_fraction(&self) -> f64 {
        self.jitter_fraction
    }

    /// Wall-clock budget for all attempts of one operation.
    #[must_use]
    pub fn overall_timeout(&self) -> Duration {
        self.overall_timeout
    }

    /// Upper bound for the computed backoff, if any. Server-supplied retry hints are not capped.
    #[must_use]
    pub fn max_interval(&self) -> Option<Duration> {
        self.max_interval
    }
}

/// Explicit configuration values that take precedence over the environment.
///
/// Every field is optional; unset fields fall back to the environment and then to the
/// compiled-in defaults. See [`RetryConfiguration`] for the resolution rules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryOverrides {
    max_retries: Option<u32>,
    base_interval: Option<Duration>,
    backoff_multiplier: Option<f64>,
    jitter_fraction: Option<f64>,
    overall_timeout: Option<Duration>,
    max_interval: Option<Duration>,
}

impl RetryOverrides {
    /// Creates an empty set of overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of retries after the first attempt.
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets the wait before the first retry.
    #[must_use]
    pub fn base_interval(mut self, base_interval: Duration) -> Self {
        self.base_interval = Some(base_interval);
        self
    }

    /// Sets the multiplicative growth per retry. Must be at least `1.0`.
    #[must_use]
    pub fn backoff_multiplier(mut self, backoff_multiplier: f64) -> Self {
        self.backoff_multiplier = Some(backoff_multiplier);
        self
    }

    /// Sets the symmetric jitter ratio. Must be within `[0, 1)`.
    #[must_use]
    pub fn jitter_fraction(mut self, jitter_fraction: f64) -> Self {
        self.jitter_fraction = Some(jitter_fraction);
        self
    }

    /// Sets the wall-clock budget for all attempts of one operation.
    #[must_use]
    pub fn overall_timeout(mut self, overall_timeout: Duration) -> Self {
        self.overall_timeout = Some(overall_timeout);
        self
    }

    /// Caps the computed backoff. Server-supplied retry hints are not capped.
    #[must_use]
    pub fn max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = Some(max_interval);
        self
    }
}

/// An invalid retry policy, detected while resolving a [`RetryConfiguration`].
///
/// Configuration errors are fatal: they are reported at construction time and are never
/// retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// An environment variable holds a value that cannot be parsed.
    #[error("environment variable {variable} has an unparsable value '{value}'")]
    Unparsable {
        /// Name of the offending variable.
        variable: &'static str,
        /// The raw value.
        value: String,
    },

    /// `max_retries` is negative.
    #[error("max_retries must not be negative, got {0}")]
    NegativeMaxRetries(i64),

    /// `base_interval` is zero or negative.
    #[error("base_interval must be greater than zero")]
    NonPositiveBaseInterval,

    /// `backoff_multiplier` is below `1.0` or not a finite number.
    #[error("backoff_multiplier must be a finite number of at least 1.0, got {0}")]
    BackoffMultiplier(f64),

    /// `jitter_fraction` is outside `[0, 1)`.
    #[error("jitter_fraction must be within [0, 1), got {0}")]
    JitterFraction(f64),

    /// `overall_timeout` is zero or negative.
    #[error("overall_timeout must be greater than zero")]
    NonPositiveOverallTimeout,

    /// `max_interval` is zero.
    #[error("max_interval must be greater than zero")]
    NonPositiveMaxInterval,
}

const MILLIS: f64 = 1000.0;
const SECONDS: f64 = 1.0;

struct EnvSource<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvSource<F> {
    fn read(&self, variable: &'static str) -> Option<String> {
        let raw = (self.lookup)(variable)?;
        let value = raw.trim();

        if value.is_empty() {
            return None;
        }

        tracing::debug!(variable, value, "retry setting taken from environment");
        Some(value.to_owned())
    }

    fn parse<T: std::str::FromStr>(&self, variable: &'static str) -> Result<Option<T>, ConfigurationError> {
        self.read(variable)
            .map(|value| value.parse::<T>().map_err(|_parse_error| ConfigurationError::Unparsable { variable, value }))
            .transpose()
    }

    /// Reads a duration expressed as a number of `units_per_second` units.
    ///
    /// Zero and negative values map to [`Duration::ZERO`] so that validation reports them.
    fn duration(&self, variable: &'static str, units_per_second: f64) -> Result<Option<Duration>, ConfigurationError> {
        let Some(value) = self.read(variable) else {
            return Ok(None);
        };

        let unparsable = || ConfigurationError::Unparsable {
            variable,
            value: value.clone(),
        };

        let number = value.parse::<f64>().map_err(|_parse_error| unparsable())?;

        if number.is_nan() {
            return Err(unparsable());
        }

        if number <= 0.0 {
            return Ok(Some(Duration::ZERO));
        }

        Duration::try_from_secs_f64(number / units_per_second)
            .map(Some)
            .map_err(|_out_of_range| unparsable())
    }
}
