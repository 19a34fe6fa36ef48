//! Session configuration.
//!
//! Loaded from a TOML file named by the `TERN_DEBUG_CONFIG` environment
//! variable. Every field has a default and a missing or broken file never
//! aborts the session; it logs and falls back.

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use tern_jdwp::SuspendPolicy;

pub const CONFIG_ENV_VAR: &str = "TERN_DEBUG_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Suspend policy applied to requests registered without an explicit one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DefaultSuspendPolicy {
    None,
    EventThread,
    #[default]
    All,
}

impl DefaultSuspendPolicy {
    pub fn as_wire(self) -> SuspendPolicy {
        match self {
            DefaultSuspendPolicy::None => SuspendPolicy::None,
            DefaultSuspendPolicy::EventThread => SuspendPolicy::EventThread,
            DefaultSuspendPolicy::All => SuspendPolicy::All,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct SessionConfig {
    pub default_suspend_policy: DefaultSuspendPolicy,
    /// Hold-queue length above which dispatch starts warning.
    pub hold_queue_warn_len: usize,
    /// Sweep the identifier registry every this many observed events;
    /// `0` disables periodic sweeping.
    pub sweep_interval_events: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_suspend_policy: DefaultSuspendPolicy::All,
            hold_queue_warn_len: 256,
            sweep_interval_events: 1024,
        }
    }
}

impl SessionConfig {
    pub fn load_from_path(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Loads the file named by [`CONFIG_ENV_VAR`], or defaults when the
    /// variable is unset. A file that cannot be read or parsed logs a warning
    /// and also yields the defaults.
    pub fn load() -> Self {
        let Ok(path) = std::env::var(CONFIG_ENV_VAR) else {
            return Self::default();
        };
        match Self::load_from_path(std::path::Path::new(&path)) {
            Ok(config) => config,
            Err(error) => {
                warn!(target: "tern.debug", %path, %error, "ignoring bad config file");
                Self::default()
            }
        }
    }
}
