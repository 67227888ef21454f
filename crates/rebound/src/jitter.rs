// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};

/// Source of the random numbers used to jitter retry delays.
///
/// The generator is **NOT cryptographically secure**; jitter only needs to desynchronize
/// callers. Every value produced lies within `[0, 1]`.
///
/// The source is injected into the [`RetryExecutor`][crate::RetryExecutor] instead of being a
/// hidden global so that tests can produce deterministic delay sequences:
///
/// ```
/// use rebound::JitterSource;
///
/// let a = JitterSource::seeded(7);
/// let b = JitterSource::seeded(7);
///
/// assert_eq!(a.next_f64(), b.next_f64());
/// ```
#[derive(Clone, Default)]
pub struct JitterSource(Source);

#[derive(Clone, Default)]
enum Source {
    #[default]
    ThreadLocal,
    Seeded(Arc<Mutex<fastrand::Rng>>),
    Function(Arc<dyn Fn() -> f64 + Send + Sync>),
}

impl Debug for JitterSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Source::ThreadLocal => write!(f, "ThreadLocal"),
            Source::Seeded(_) => write!(f, "Seeded"),
            Source::Function(_) => write!(f, "Function"),
        }
    }
}

impl JitterSource {
    /// Uses the thread-local generator of the `fastrand` crate. This is the default.
    #[must_use]
    pub fn thread_local() -> Self {
        Self(Source::ThreadLocal)
    }

    /// Uses a dedicated generator with a fixed seed; the produced sequence is reproducible.
    ///
    /// Clones share the same generator, so concurrent calls interleave their draws.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self(Source::Seeded(Arc::new(Mutex::new(fastrand::Rng::with_seed(seed)))))
    }

    /// Always produces the same value.
    #[must_use]
    pub fn fixed(value: f64) -> Self {
        Self::from_fn(move || value)
    }

    /// Produces values from the given function.
    #[must_use]
    pub fn from_fn(f: impl Fn() -> f64 + Send + Sync + 'static) -> Self {
        Self(Source::Function(Arc::new(f)))
    }

    /// Draws the next value in `[0, 1]`.
    #[must_use]
    pub fn next_f64(&self) -> f64 {
        let value = match &self.0 {
            Source::ThreadLocal => fastrand::f64(),
            Source::Seeded(rng) => rng.lock().unwrap_or_else(PoisonError::into_inner).f64(),
            Source::Function(f) => f(),
        };

        if value.is_nan() { 0.5 } else { value.clamp(0.0, 1.0) }
    }
}
