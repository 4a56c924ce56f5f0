//! Configuration for waits and scaling.
//!
//! Settings come from a TOML (or JSON) file, from `SETTLE_*` environment
//! variables, or from the builder methods below. Durations are whole seconds
//! on the wire.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::result::{Result, ResultExt};

/// Environment variable overriding [`SettleConfig::poll_interval`].
pub const ENV_POLL_INTERVAL: &str = "SETTLE_POLL_INTERVAL_SECS";
/// Environment variable overriding [`SettleConfig::condition_timeout`].
pub const ENV_CONDITION_TIMEOUT: &str = "SETTLE_CONDITION_TIMEOUT_SECS";
/// Environment variable overriding [`SettleConfig::setup_timeout`].
pub const ENV_SETUP_TIMEOUT: &str = "SETTLE_SETUP_TIMEOUT_SECS";

/// Longest accepted duration for any setting (one year).
pub const MAX_DURATION: Duration = Duration::from_secs(31_536_000);

/// Timing configuration shared by the condition watcher and the scaler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettleConfig {
    /// Pause between two probe attempts.
    #[serde(with = "duration_secs", default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Deadline for a condition wait when the caller does not bring one.
    #[serde(with = "duration_secs", default = "default_condition_timeout")]
    pub condition_timeout: Duration,

    /// Bound applied to each read, write, and verify segment of a scale.
    #[serde(with = "duration_secs", default = "default_setup_timeout")]
    pub setup_timeout: Duration,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            condition_timeout: default_condition_timeout(),
            setup_timeout: default_setup_timeout(),
        }
    }
}

impl SettleConfig {
    /// Set the poll interval.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the condition timeout.
    #[must_use]
    pub const fn condition_timeout(mut self, timeout: Duration) -> Self {
        self.condition_timeout = timeout;
        self
    }

    /// Set the setup timeout.
    #[must_use]
    pub const fn setup_timeout(mut self, timeout: Duration) -> Self {
        self.setup_timeout = timeout;
        self
    }

    /// Load configuration from a file.
    ///
    /// Files ending in `.json` are parsed as JSON, everything else as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse, or fails
    /// [`SettleConfig::validate`].
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config_read_failed(path, e.to_string()))?;

        let config: Self = if path.extension().is_some_and(|e| e == "json") {
            serde_json::from_str(&content)?
        } else {
            toml::from_str(&content)?
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables on top of the defaults.
    ///
    /// Unparseable values are logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSetting`] if the result fails
    /// [`SettleConfig::validate`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`SettleConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secs = |key: &str| {
            lookup(key).and_then(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .into_option_logged(key)
            })
        };

        let mut config = Self::default();
        if let Some(interval) = secs(ENV_POLL_INTERVAL) {
            config.poll_interval = interval;
        }
        if let Some(timeout) = secs(ENV_CONDITION_TIMEOUT) {
            config.condition_timeout = timeout;
        }
        if let Some(timeout) = secs(ENV_SETUP_TIMEOUT) {
            config.setup_timeout = timeout;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make a wait meaningless.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSetting`] if any duration is zero or longer
    /// than [`MAX_DURATION`].
    pub fn validate(&self) -> Result<()> {
        [
            ("poll_interval", self.poll_interval),
            ("condition_timeout", self.condition_timeout),
            ("setup_timeout", self.setup_timeout),
        ]
        .into_iter()
        .try_for_each(|(field, value)| {
            if value.is_zero() {
                Err(Error::invalid_setting(field, "must be greater than zero"))
            } else if value > MAX_DURATION {
                Err(Error::invalid_setting(
                    field,
                    format!("must not exceed {} seconds", MAX_DURATION.as_secs()),
                ))
            } else {
                Ok(())
            }
        })
    }
}

const fn default_poll_interval() -> Duration {
    Duration::from_secs(2)
}

const fn default_condition_timeout() -> Duration {
    Duration::from_secs(600)
}

const fn default_setup_timeout() -> Duration {
    Duration::from_secs(300)
}

/// Serialization helper for Duration as seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
