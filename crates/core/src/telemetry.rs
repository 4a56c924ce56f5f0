//! Tracing subscriber setup for binaries and test harnesses embedding settle.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::Error;
use crate::result::Result;

/// Install a global subscriber with an environment filter.
///
/// `RUST_LOG` wins when set; otherwise `default_directive` (e.g. `"info"`)
/// is used.
///
/// # Errors
///
/// Returns [`Error::TracingInit`] if a global subscriber is already installed.
pub fn init_tracing(default_directive: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| Error::TracingInit {
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        let _ = init_tracing("debug");
        let second = init_tracing("debug");
        assert!(matches!(second, Err(Error::TracingInit { .. })));
    }
}
