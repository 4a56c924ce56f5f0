//! Core types for settle: errors, configuration, and tracing setup.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::arithmetic_side_effects)]

pub mod config;
pub mod error;
pub mod result;
pub mod telemetry;

pub use config::SettleConfig;
pub use error::Error;
pub use result::{Result, ResultExt};
pub use telemetry::init_tracing;
