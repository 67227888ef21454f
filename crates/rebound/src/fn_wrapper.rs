// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// Generates a cloneable, thread-safe wrapper around a user-provided callback.
///
/// The generated type stores the callback in an `Arc<dyn Fn ...>` and provides `new`, `call`,
/// `Clone` and `Debug`. Callbacks handed to the executor (classification rules, attempt
/// observers) are stored this way so that the executor itself stays `Clone + Send + Sync`.
///
/// ```rust,ignore
/// define_fn_wrapper!(OnAttempt(Fn(event: &AttemptEvent)));
/// define_fn_wrapper!(Rule(Fn(failure: &Failure) -> Option<Classification>));
/// ```
macro_rules! define_fn_wrapper {
    ($name:ident(Fn($($param_name:ident: $param_ty:ty),*) -> $return_ty:ty)) => {
        pub(crate) struct $name(std::sync::Arc<dyn Fn($($param_ty),*) -> $return_ty + Send + Sync>);

        impl $name {
            pub(crate) fn new<F>(callback: F) -> Self
            where
                F: Fn($($param_ty),*) -> $return_ty + Send + Sync + 'static,
            {
                Self(std::sync::Arc::new(callback))
            }

            pub(crate) fn call(&self, $($param_name: $param_ty),*) -> $return_ty {
                (self.0)($($param_name),*)
            }
        }

        impl Clone for $name {
            fn clone(&self) -> Self {
                Self(std::sync::Arc::clone(&self.0))
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name)).finish()
            }
        }
    };

    ($name:ident(Fn($($param_name:ident: $param_ty:ty),*))) => {
        $crate::fn_wrapper::define_fn_wrapper!($name(Fn($($param_name: $param_ty),*) -> ()));
    };
}

pub(crate) use define_fn_wrapper;

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::fmt::Debug;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    define_fn_wrapper!(Doubler(Fn(value: u32) -> u32));
    define_fn_wrapper!(Counter(Fn(value: u32)));

    #[test]
    fn static_assertions() {
        static_assertions::assert_impl_all!(Doubler: Send, Sync, Debug, Clone);
    }

    #[test]
    fn call_ok() {
        let wrapper = Doubler::new(|v| v * 2);
        assert_eq!(wrapper.call(21), 42);

        let cloned = wrapper.clone();
        assert_eq!(cloned.call(4), 8);
    }

    #[test]
    fn unit_return_ok() {
        let total = Arc::new(AtomicU32::new(0));
        let total_clone = Arc::clone(&total);
        let wrapper = Counter::new(move |v| {
            total_clone.fetch_add(v, Ordering::SeqCst);
        });

        wrapper.call(3);
        wrapper.call(4);

        assert_eq!(total.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn debug_ok() {
        let wrapper = Doubler::new(|v| v);
        assert_eq!(format!("{wrapper:?}"), "Doubler");
    }
}
