// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Resolving the retry policy from the real process environment.
//!
//! This binary holds a single test so no other test can observe or race on the variables it sets.

use std::time::Duration;

use rebound::{
    ConfigurationError, ENV_BACKOFF_MULTIPLIER, ENV_JITTER_FRACTION, ENV_MAX_RETRIES, ENV_RETRY_INTERVAL, ENV_TIMEOUT,
    RetryConfiguration, RetryOverrides,
};

fn set(variable: &str, value: &str) {
    // SAFETY: this is the only test in the binary, so no other thread reads the environment.
    unsafe {
        std::env::set_var(variable, value);
    }
}

fn remove(variable: &str) {
    // SAFETY: this is the only test in the binary, so no other thread reads the environment.
    unsafe {
        std::env::remove_var(variable);
    }
}

#[test]
fn resolve_reads_process_environment() {
    let all = [ENV_MAX_RETRIES, ENV_RETRY_INTERVAL, ENV_BACKOFF_MULTIPLIER, ENV_JITTER_FRACTION, ENV_TIMEOUT];
    for variable in all {
        remove(variable);
    }

    let defaults = RetryConfiguration::resolve(&RetryOverrides::new()).unwrap();
    assert_eq!(defaults, RetryConfiguration::default());

    set(ENV_MAX_RETRIES, "6");
    set(ENV_RETRY_INTERVAL, " 250 ");
    set(ENV_BACKOFF_MULTIPLIER, "3");
    set(ENV_JITTER_FRACTION, "0.1");
    set(ENV_TIMEOUT, "30");

    let config = RetryConfiguration::resolve(&RetryOverrides::new().max_retries(1)).unwrap();

    // explicit overrides beat the environment
    assert_eq!(config.max_retries(), 1);
    assert_eq!(config.base_interval(), Duration::from_millis(250));
    assert!((config.backoff_multiplier() - 3.0).abs() < f64::EPSILON);
    assert!((config.jitter_fraction() - 0.1).abs() < f64::EPSILON);
    assert_eq!(config.overall_timeout(), Duration::from_secs(30));

    set(ENV_TIMEOUT, "soon");

    assert_eq!(
        RetryConfiguration::resolve(&RetryOverrides::new()).unwrap_err(),
        ConfigurationError::Unparsable {
            variable: ENV_TIMEOUT,
            value: "soon".to_owned(),
        }
    );

    for variable in all {
        remove(variable);
    }
}
