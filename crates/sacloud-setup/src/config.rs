//! Retry and polling policy for the provisioning orchestrator

use crate::error::{Result, SetupError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_PROVISIONING_RETRY_COUNT: u32 = 1;
pub const DEFAULT_PROVISIONING_RETRY_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_DELETE_RETRY_COUNT: u32 = 10;
pub const DEFAULT_DELETE_RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// Which waiter implementation drives the copy and up phases
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitStrategy {
    /// Sleep-and-read loop on the caller's task
    #[default]
    Polling,
    /// Background notifier feeding completion/progress/error channels
    Notify,
}

impl std::str::FromStr for WaitStrategy {
    type Err = SetupError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "polling" | "poll" => Ok(WaitStrategy::Polling),
            "notify" | "push" => Ok(WaitStrategy::Notify),
            other => Err(SetupError::InvalidConfig(format!(
                "unknown wait strategy: {}",
                other
            ))),
        }
    }
}

/// Orchestrator configuration
///
/// Zero counts and zero durations are replaced by the documented defaults
/// in [`SetupConfig::normalized`]. The polling interval has no universal
/// default and must be supplied whenever a wait phase is enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupConfig {
    /// Maximum number of create attempts
    pub retry_count: u32,

    /// Attempts of the provisioning hook before its error becomes fatal
    pub provisioning_retry_count: u32,

    #[serde(with = "secs")]
    pub provisioning_retry_interval: Duration,

    /// Delete calls per failed attempt before cleanup is abandoned
    pub delete_retry_count: u32,

    #[serde(with = "secs")]
    pub delete_retry_interval: Duration,

    #[serde(with = "opt_secs")]
    pub polling_interval: Option<Duration>,

    /// Upper bound for a single copy wait
    #[serde(with = "opt_secs")]
    pub copy_timeout: Option<Duration>,

    /// Upper bound for the wait-for-up phase
    #[serde(with = "opt_secs")]
    pub up_timeout: Option<Duration>,

    pub wait_for_copy: bool,

    pub wait_for_up: bool,

    pub wait_strategy: WaitStrategy,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            retry_count: DEFAULT_RETRY_COUNT,
            provisioning_retry_count: DEFAULT_PROVISIONING_RETRY_COUNT,
            provisioning_retry_interval: DEFAULT_PROVISIONING_RETRY_INTERVAL,
            delete_retry_count: DEFAULT_DELETE_RETRY_COUNT,
            delete_retry_interval: DEFAULT_DELETE_RETRY_INTERVAL,
            polling_interval: None,
            copy_timeout: None,
            up_timeout: None,
            wait_for_copy: false,
            wait_for_up: false,
            wait_strategy: WaitStrategy::Polling,
        }
    }
}

impl SetupConfig {
    pub fn retry_count(mut self, count: u32) -> Self {
        self.retry_count = count;
        self
    }

    pub fn provisioning_retry(mut self, count: u32, interval: Duration) -> Self {
        self.provisioning_retry_count = count;
        self.provisioning_retry_interval = interval;
        self
    }

    pub fn delete_retry(mut self, count: u32, interval: Duration) -> Self {
        self.delete_retry_count = count;
        self.delete_retry_interval = interval;
        self
    }

    pub fn polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = Some(interval);
        self
    }

    pub fn copy_timeout(mut self, timeout: Duration) -> Self {
        self.copy_timeout = Some(timeout);
        self
    }

    pub fn up_timeout(mut self, timeout: Duration) -> Self {
        self.up_timeout = Some(timeout);
        self
    }

    pub fn wait_for_copy(mut self, enabled: bool) -> Self {
        self.wait_for_copy = enabled;
        self
    }

    pub fn wait_for_up(mut self, enabled: bool) -> Self {
        self.wait_for_up = enabled;
        self
    }

    pub fn wait_strategy(mut self, strategy: WaitStrategy) -> Self {
        self.wait_strategy = strategy;
        self
    }

    /// Replace zero values with defaults
    pub fn normalized(mut self) -> Self {
        if self.retry_count == 0 {
            self.retry_count = DEFAULT_RETRY_COUNT;
        }
        if self.provisioning_retry_count == 0 {
            self.provisioning_retry_count = DEFAULT_PROVISIONING_RETRY_COUNT;
        }
        if self.provisioning_retry_interval.is_zero() {
            self.provisioning_retry_interval = DEFAULT_PROVISIONING_RETRY_INTERVAL;
        }
        if self.delete_retry_count == 0 {
            self.delete_retry_count = DEFAULT_DELETE_RETRY_COUNT;
        }
        if self.delete_retry_interval.is_zero() {
            self.delete_retry_interval = DEFAULT_DELETE_RETRY_INTERVAL;
        }
        if self.copy_timeout.is_some_and(|t| t.is_zero()) {
            self.copy_timeout = None;
        }
        if self.up_timeout.is_some_and(|t| t.is_zero()) {
            self.up_timeout = None;
        }
        self
    }

    /// Check the configuration before the first attempt
    pub fn validate(&self) -> Result<()> {
        self.validate_for(false)
    }

    /// A custom waiter brings its own interval, so none is required here
    pub(crate) fn validate_for(&self, custom_waiter: bool) -> Result<()> {
        if !custom_waiter && (self.wait_for_copy || self.wait_for_up) {
            match self.polling_interval {
                None => {
                    return Err(SetupError::InvalidConfig(
                        "polling_interval is required when a wait phase is enabled".to_string(),
                    ));
                }
                Some(interval) if interval.is_zero() => {
                    return Err(SetupError::InvalidConfig(
                        "polling_interval must be greater than zero".to_string(),
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Build a configuration from defaults overlaid with `SACLOUD_*` variables
    pub fn from_env() -> Result<Self> {
        Self::default().apply_env()
    }

    /// Overlay `SACLOUD_*` environment variables on top of this configuration
    pub fn apply_env(mut self) -> Result<Self> {
        if let Some(v) = env_u32("SACLOUD_RETRY_COUNT")? {
            self.retry_count = v;
        }
        if let Some(v) = env_u32("SACLOUD_PROVISIONING_RETRY_COUNT")? {
            self.provisioning_retry_count = v;
        }
        if let Some(v) = env_secs("SACLOUD_PROVISIONING_RETRY_INTERVAL")? {
            self.provisioning_retry_interval = v;
        }
        if let Some(v) = env_u32("SACLOUD_DELETE_RETRY_COUNT")? {
            self.delete_retry_count = v;
        }
        if let Some(v) = env_secs("SACLOUD_DELETE_RETRY_INTERVAL")? {
            self.delete_retry_interval = v;
        }
        if let Some(v) = env_secs("SACLOUD_POLLING_INTERVAL")? {
            self.polling_interval = Some(v);
        }
        if let Some(v) = env_secs("SACLOUD_COPY_TIMEOUT")? {
            self.copy_timeout = Some(v);
        }
        if let Some(v) = env_secs("SACLOUD_UP_TIMEOUT")? {
            self.up_timeout = Some(v);
        }
        if let Ok(v) = std::env::var("SACLOUD_WAIT_STRATEGY") {
            self.wait_strategy = v.parse()?;
        }
        Ok(self)
    }
}

fn env_u32(key: &str) -> Result<Option<u32>> {
    match std::env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|e| SetupError::InvalidConfig(format!("{}={}: {}", key, v, e))),
        Err(_) => Ok(None),
    }
}

fn env_secs(key: &str) -> Result<Option<Duration>> {
    match std::env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<u64>()
            .map(|s| Some(Duration::from_secs(s)))
            .map_err(|e| SetupError::InvalidConfig(format!("{}={}: {}", key, v, e))),
        Err(_) => Ok(None),
    }
}

/// Durations serialized as whole seconds
mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

mod opt_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(d).map(|v| v.map(Duration::from_secs))
    }
}
