// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Default number of retries after the first attempt: 3.
///
/// Together with the default 2x growth this spreads four attempts over roughly seven seconds,
/// which covers the typical restart window of a remote service.
pub(crate) const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delay before the first retry: one second.
pub(crate) const DEFAULT_BASE_INTERVAL: Duration = Duration::from_secs(1);

/// Growth factor applied to the delay for each subsequent retry.
pub(crate) const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Symmetric jitter ratio; delays land in `[0.8 × delay, 1.2 × delay]`.
///
/// See [Exponential Backoff and Jitter](https://aws.amazon.com/blogs/architecture/exponential-backoff-and-jitter) for details.
pub(crate) const DEFAULT_JITTER_FRACTION: f64 = 0.2;

/// Wall-clock budget for all attempts of one operation: five minutes.
pub(crate) const DEFAULT_OVERALL_TIMEOUT: Duration = Duration::from_secs(300);

/// Environment variable holding the number of retries after the first attempt.
pub const ENV_MAX_RETRIES: &str = "MAX_RETRIES";

/// Environment variable holding the base retry interval in milliseconds.
pub const ENV_RETRY_INTERVAL: &str = "RETRY_INTERVAL";

/// Environment variable holding the multiplicative growth per retry.
pub const ENV_BACKOFF_MULTIPLIER: &str = "BACKOFF_MULTIPLIER";

/// Environment variable holding the symmetric jitter ratio.
pub const ENV_JITTER_FRACTION: &str = "JITTER_FRACTION";

/// Environment variable holding the overall wall-clock budget in seconds.
pub const ENV_TIMEOUT: &str = "TIMEOUT";
