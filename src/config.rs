//! # Bridge configuration.
//!
//! [`BridgeConfig`] defines how the in-process host scheduler behaves:
//! which platform it imitates, the platform minimums applied to requests,
//! concurrency, quota, the host execution time limit and retry shaping.
//!
//! Sentinel `0` means "unlimited" / "none" for every count and duration field.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use taskbridge::{BridgeConfig, PlatformProfile};
//!
//! let mut cfg = BridgeConfig::for_profile(PlatformProfile::Apple);
//! cfg.max_concurrent = 2;
//! cfg.execution_limit = Duration::from_secs(30);
//!
//! assert_eq!(cfg.concurrency_limit(), Some(2));
//! assert!(!cfg.profile.supports_cancel_by_tag());
//! ```
//!
//! # TOML
//! ```toml
//! profile = "android"
//! max_concurrent = 4
//! max_scheduled = 100
//! execution_limit_secs = 600
//! retry_jitter = "equal"
//! max_attempts = 0
//! constraint_recheck_ms = 1000
//!
//! [limits]
//! min_backoff_ms = 10000
//! min_periodic_secs = 900
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::platform::local::JitterPolicy;

/// Host platform imitated by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformProfile {
    /// Job-scheduler style host: tags, flex windows, expedited work; no processing tasks.
    #[default]
    Android,
    /// Background-task style host: processing tasks; no tags, flex or expedited work.
    Apple,
}

impl PlatformProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformProfile::Android => "android",
            PlatformProfile::Apple => "apple",
        }
    }

    /// Default minimums for this platform.
    pub fn limits(&self) -> PlatformLimits {
        match self {
            PlatformProfile::Android => PlatformLimits::android(),
            PlatformProfile::Apple => PlatformLimits::apple(),
        }
    }

    pub fn supports_processing(&self) -> bool {
        matches!(self, PlatformProfile::Apple)
    }

    pub fn supports_cancel_by_tag(&self) -> bool {
        matches!(self, PlatformProfile::Android)
    }

    /// Whether periodic flex windows are honored (ignored otherwise).
    pub fn honors_flex(&self) -> bool {
        matches!(self, PlatformProfile::Android)
    }

    /// Whether expedited hints are honored (ignored otherwise).
    pub fn honors_expedited(&self) -> bool {
        matches!(self, PlatformProfile::Android)
    }
}

/// Platform minimums and defaults applied while normalizing requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformLimits {
    /// Lower bound for a requested backoff delay.
    pub min_backoff: Duration,
    /// Backoff delay used when a type is given without a delay.
    pub default_backoff: Duration,
    /// Upper bound for any backoff delay.
    pub max_backoff: Duration,
    /// Lower bound for a periodic frequency.
    pub min_periodic_interval: Duration,
    /// Lower bound for a periodic flex window.
    pub min_flex_interval: Duration,
}

impl PlatformLimits {
    /// 10 s / 30 s / 5 h backoff, 15 min period, 5 min flex.
    pub const fn android() -> Self {
        Self {
            min_backoff: Duration::from_secs(10),
            default_backoff: Duration::from_secs(30),
            max_backoff: Duration::from_secs(5 * 60 * 60),
            min_periodic_interval: Duration::from_secs(15 * 60),
            min_flex_interval: Duration::from_secs(5 * 60),
        }
    }

    /// Same bounds as Android; flex is accepted but never honored.
    pub const fn apple() -> Self {
        Self::android()
    }
}

impl Default for PlatformLimits {
    fn default() -> Self {
        Self::android()
    }
}

/// Configuration for the bridge and its in-process host scheduler.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// Imitated host platform.
    pub profile: PlatformProfile,
    /// Minimums applied to every request.
    pub limits: PlatformLimits,
    /// Maximum number of executions running at once (0 = unlimited).
    pub max_concurrent: usize,
    /// Maximum number of scheduled entries (0 = unlimited).
    pub max_scheduled: usize,
    /// Host execution time limit, delivered as cancellation (0 = none).
    pub execution_limit: Duration,
    /// Randomization applied to retry delays.
    pub retry_jitter: JitterPolicy,
    /// Maximum attempts per run before giving up (0 = unlimited).
    pub max_attempts: u32,
    /// How often unmet constraints are re-checked.
    pub constraint_recheck: Duration,
}

impl Default for BridgeConfig {
    /// Provides a default configuration:
    /// - `profile = Android` with its limits
    /// - `max_concurrent = 0`, `max_scheduled = 0` (unlimited)
    /// - `execution_limit = 10min`
    /// - `retry_jitter = None`, `max_attempts = 0`
    /// - `constraint_recheck = 1s`
    fn default() -> Self {
        Self::for_profile(PlatformProfile::Android)
    }
}

impl BridgeConfig {
    /// Default configuration for a given platform.
    pub fn for_profile(profile: PlatformProfile) -> Self {
        Self {
            profile,
            limits: profile.limits(),
            max_concurrent: 0,
            max_scheduled: 0,
            execution_limit: Duration::from_secs(10 * 60),
            retry_jitter: JitterPolicy::None,
            max_attempts: 0,
            constraint_recheck: Duration::from_secs(1),
        }
    }

    /// Returns the concurrency limit, or `None` if unlimited.
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        (self.max_concurrent > 0).then_some(self.max_concurrent)
    }

    /// Returns the scheduled-entry quota, or `None` if unlimited.
    #[inline]
    pub fn scheduled_limit(&self) -> Option<usize> {
        (self.max_scheduled > 0).then_some(self.max_scheduled)
    }

    /// Returns the host execution time limit, or `None` if disabled.
    #[inline]
    pub fn time_limit(&self) -> Option<Duration> {
        (!self.execution_limit.is_zero()).then_some(self.execution_limit)
    }

    /// Returns the attempt limit, or `None` if unlimited.
    #[inline]
    pub fn attempt_limit(&self) -> Option<u32> {
        (self.max_attempts > 0).then_some(self.max_attempts)
    }

    /// Parses a TOML document; absent keys keep the profile's defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(text)?;
        Ok(file.into_config())
    }

    /// Reads and parses a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    profile: PlatformProfile,
    max_concurrent: Option<usize>,
    max_scheduled: Option<usize>,
    execution_limit_secs: Option<u64>,
    retry_jitter: Option<JitterPolicy>,
    max_attempts: Option<u32>,
    constraint_recheck_ms: Option<u64>,
    limits: LimitsFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LimitsFile {
    min_backoff_ms: Option<u64>,
    default_backoff_ms: Option<u64>,
    max_backoff_secs: Option<u64>,
    min_periodic_secs: Option<u64>,
    min_flex_secs: Option<u64>,
}

impl ConfigFile {
    fn into_config(self) -> BridgeConfig {
        let mut cfg = BridgeConfig::for_profile(self.profile);
        let limits = &mut cfg.limits;

        if let Some(ms) = self.limits.min_backoff_ms {
            limits.min_backoff = Duration::from_millis(ms);
        }
        if let Some(ms) = self.limits.default_backoff_ms {
            limits.default_backoff = Duration::from_millis(ms);
        }
        if let Some(secs) = self.limits.max_backoff_secs {
            limits.max_backoff = Duration::from_secs(secs);
        }
        if let Some(secs) = self.limits.min_periodic_secs {
            limits.min_periodic_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.limits.min_flex_secs {
            limits.min_flex_interval = Duration::from_secs(secs);
        }

        cfg.max_concurrent = self.max_concurrent.unwrap_or(cfg.max_concurrent);
        cfg.max_scheduled = self.max_scheduled.unwrap_or(cfg.max_scheduled);
        cfg.max_attempts = self.max_attempts.unwrap_or(cfg.max_attempts);
        cfg.retry_jitter = self.retry_jitter.unwrap_or(cfg.retry_jitter);
        if let Some(secs) = self.execution_limit_secs {
            cfg.execution_limit = Duration::from_secs(secs);
        }
        if let Some(ms) = self.constraint_recheck_ms {
            cfg.constraint_recheck = Duration::from_millis(ms);
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn zero_sentinels_mean_unlimited() {
        let mut cfg = BridgeConfig::default();
        cfg.execution_limit = Duration::ZERO;
        assert_eq!(cfg.concurrency_limit(), None);
        assert_eq!(cfg.scheduled_limit(), None);
        assert_eq!(cfg.time_limit(), None);
        assert_eq!(cfg.attempt_limit(), None);
    }

    #[test]
    fn profiles_expose_capabilities() {
        assert!(!PlatformProfile::Android.supports_processing());
        assert!(PlatformProfile::Android.supports_cancel_by_tag());
        assert!(PlatformProfile::Apple.supports_processing());
        assert!(!PlatformProfile::Apple.supports_cancel_by_tag());
        assert!(!PlatformProfile::Apple.honors_flex());
    }

    #[test]
    fn toml_overrides_only_given_keys() {
        let cfg = BridgeConfig::from_toml_str(
            r#"
            profile = "apple"
            max_concurrent = 3
            retry_jitter = "equal"
            execution_limit_secs = 0

            [limits]
            min_periodic_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(cfg.profile, PlatformProfile::Apple);
        assert_eq!(cfg.concurrency_limit(), Some(3));
        assert_eq!(cfg.retry_jitter, JitterPolicy::Equal);
        assert_eq!(cfg.time_limit(), None);
        assert_eq!(cfg.limits.min_periodic_interval, Duration::from_secs(60));
        assert_eq!(cfg.limits.min_backoff, Duration::from_secs(10));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = BridgeConfig::from_toml_str("max_threads = 4").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_scheduled = 12").unwrap();
        let cfg = BridgeConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(cfg.scheduled_limit(), Some(12));

        let missing = BridgeConfig::from_toml_file(file.path().with_extension("absent"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
