//! Sync client configuration
//!
//! Loaded from a TOML file; every key is optional and falls back to the
//! defaults below.
//!
//! ```toml
//! relay_url = "http://localhost:8080"
//! poll_interval_ms = 1000
//! non_combat_zones = [504]
//! error_log_path = "errors.log"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Relay used when none is configured
pub const DEFAULT_RELAY_URL: &str = "http://mhwsync.herokuapp.com";

/// Training area: no session is ever attempted there
pub const TRAINING_AREA_ZONE: u32 = 504;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub relay_url: String,
    pub poll_interval_ms: u64,
    /// Leader pushes a monster's part health only if it changed this recently
    pub health_debounce_ms: u64,
    pub startup_attempts: u32,
    pub startup_retry_delay_ms: u64,
    /// When set, the relay's `/version` must match before any session logic runs
    pub expected_protocol_version: Option<u32>,
    pub request_timeout_ms: u64,
    /// Wait before evaluating a transition so the host can settle
    pub settle_delay_ms: u64,
    pub stop_timeout_ms: u64,
    pub non_combat_zones: Vec<u32>,
    pub detailed_logging: bool,
    pub error_log_path: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            poll_interval_ms: 2000,
            health_debounce_ms: 3000,
            startup_attempts: 5,
            startup_retry_delay_ms: 500,
            expected_protocol_version: None,
            request_timeout_ms: 5000,
            settle_delay_ms: 1000,
            stop_timeout_ms: 3000,
            non_combat_zones: vec![TRAINING_AREA_ZONE],
            detailed_logging: false,
            error_log_path: None,
        }
    }
}

impl SyncConfig {
    /// Load from a TOML file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        let config = match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                Self::default()
            }
            Err(e) => return Err(e.into()),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let mut config: SyncConfig = toml::from_str(contents)?;
        config.relay_url = config.relay_url.trim_end_matches('/').to_string();
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Platform config location (`<config dir>/huntsync/config.toml`)
    pub fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "huntsync", "huntsync")
            .ok_or_else(|| Error::Config("Could not determine config directory".into()))?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.relay_url.trim().is_empty() {
            return Err(Error::Config("relay_url must not be empty".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be positive".into()));
        }
        if self.startup_attempts == 0 {
            return Err(Error::Config("startup_attempts must be at least 1".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn health_debounce(&self) -> Duration {
        Duration::from_millis(self.health_debounce_ms)
    }

    pub fn startup_retry_delay(&self) -> Duration {
        Duration::from_millis(self.startup_retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Zones where synchronization has no meaning
    pub fn is_non_combat_zone(&self, zone_id: u32) -> bool {
        self.non_combat_zones.contains(&zone_id)
    }
}
