// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use opentelemetry::InstrumentationScope;
use opentelemetry::metrics::{Counter, Meter, MeterProvider};

const METER_NAME: &str = "rebound";
const VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));
const SCHEMA_URL: &str = "https://opentelemetry.io/schemas/1.47.0";

const ATTEMPT_EVENT_COUNTER: &str = "resilience.event";
const ATTEMPT_EVENT_DESCRIPTION: &str = "Attempt events of the retry executor: one per retry started plus one for how each operation ended.";

pub(super) fn create_meter(meter_provider: &dyn MeterProvider) -> Meter {
    meter_provider.meter_with_scope(
        InstrumentationScope::builder(METER_NAME)
            .with_version(VERSION)
            .with_schema_url(SCHEMA_URL)
            .build(),
    )
}

/// Counter incremented once per [`AttemptEvent`][crate::AttemptEvent], tagged with its kind.
pub(super) fn create_attempt_event_counter(meter: &Meter) -> Counter<u64> {
    meter
        .u64_counter(ATTEMPT_EVENT_COUNTER)
        .with_description(ATTEMPT_EVENT_DESCRIPTION)
        .with_unit("{event}")
        .build()
}
