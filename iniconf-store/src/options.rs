//! Construction options for [`ConfigStore`](crate::ConfigStore).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use iniconf_core::error::{ConfError, Result};

/// Environment variable read by [`ConfigOptions::from_env`], in milliseconds.
pub const TTL_ENV_VAR: &str = "INICONF_TTL_MS";

/// Store options, validated once at construction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigOptions {
    /// How long a loaded section stays fresh. `None` keeps it until the
    /// store is invalidated or closed.
    pub ttl: Option<Duration>,
}

impl ConfigOptions {
    /// Sets the time-to-live. Must be non-zero.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Reads the TTL from `INICONF_TTL_MS`. Unset means no expiry.
    pub fn from_env() -> Result<Self> {
        match std::env::var(TTL_ENV_VAR) {
            Ok(value) => Self::from_ttl_ms(&value),
            Err(_) => Ok(Self::default()),
        }
    }

    fn from_ttl_ms(value: &str) -> Result<Self> {
        let ms: u64 = value.trim().parse().map_err(|_| {
            ConfError::InvalidConfig(format!("{TTL_ENV_VAR} must be an integer, got {value:?}"))
        })?;
        let options = Self::default().with_ttl(Duration::from_millis(ms));
        options.validate()?;
        Ok(options)
    }

    /// Checks the options.
    ///
    /// # Errors
    ///
    /// `ConfError::InvalidConfig` if the TTL is zero.
    pub fn validate(&self) -> Result<()> {
        if self.ttl == Some(Duration::ZERO) {
            return Err(ConfError::InvalidConfig("ttl must be greater than 0".into()));
        }
        Ok(())
    }
}
