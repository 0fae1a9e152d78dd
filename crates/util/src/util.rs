//! Shared utilities for pdesk.

use std::fmt::Display;

/// Panic in debug builds, log error with backtrace in release.
///
/// Use for "this shouldn't happen" invariants that shouldn't take the
/// whole session manager down in production.
#[macro_export]
macro_rules! debug_panic {
    ( $($fmt_arg:tt)* ) => {
        if cfg!(debug_assertions) {
            panic!( $($fmt_arg)* );
        } else {
            let backtrace = std::backtrace::Backtrace::capture();
            tracing::error!("{}\n{:?}", format_args!($($fmt_arg)*), backtrace);
        }
    };
}

/// Log-and-swallow helpers for fire-and-forget call sites.
pub trait ResultExt<T> {
    /// Log the error at `warn` level and convert to `Option`.
    fn log_err(self) -> Option<T>;

    /// Log the error at `debug` level and convert to `Option`.
    ///
    /// For failures that are expected during normal operation, e.g. writing
    /// to a shell that is shutting down.
    fn log_debug(self) -> Option<T>;
}

impl<T, E: Display> ResultExt<T> for Result<T, E> {
    #[track_caller]
    fn log_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                tracing::warn!(
                    file = caller.file(),
                    line = caller.line(),
                    "{error}"
                );
                None
            }
        }
    }

    #[track_caller]
    fn log_debug(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::debug!("{error}");
                None
            }
        }
    }
}
