//! Result type definition and extension traits.
//!
//! Provides tap-style combinators so call sites can log or observe a value
//! without breaking a `?` chain.

use std::fmt::Display;

use crate::error::Error;

/// The standard Result type for settle configuration and setup.
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for any Result whose error can be displayed.
pub trait ResultExt<T, E> {
    /// Perform a side effect on the Ok value without consuming the Result.
    fn tap_ok<F: FnOnce(&T)>(self, f: F) -> Self;

    /// Perform a side effect on the Err value without consuming the Result.
    fn tap_err<F: FnOnce(&E)>(self, f: F) -> Self;

    /// Emit a `warn` event with `context` when the Result is an error.
    fn warn_err(self, context: &str) -> Self;

    /// Convert to an Option, logging the error if present.
    fn into_option_logged(self, context: &str) -> Option<T>;
}

impl<T, E: Display> ResultExt<T, E> for std::result::Result<T, E> {
    fn tap_ok<F: FnOnce(&T)>(self, f: F) -> Self {
        if let Ok(ref v) = self {
            f(v);
        }
        self
    }

    fn tap_err<F: FnOnce(&E)>(self, f: F) -> Self {
        if let Err(ref e) = self {
            f(e);
        }
        self
    }

    fn warn_err(self, context: &str) -> Self {
        self.tap_err(|e| tracing::warn!(error = %e, "{context}"))
    }

    fn into_option_logged(self, context: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, "{context}");
                None
            }
        }
    }
}
