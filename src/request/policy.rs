//! # Scheduling vocabularies.
//!
//! Enumerations carried by a [`TaskRequest`](crate::TaskRequest) plus the
//! grouped [`Constraints`] and [`BackoffConfig`].
//!
//! ## Parsing
//! Every vocabulary parses leniently through [`Vocabulary`]: case is ignored
//! and `_`, `-` and spaces are stripped, so `"not_required"`, `"NOT_REQUIRED"`
//! and `"notRequired"` are the same token. Unrecognized tokens fall back to the
//! vocabulary's default instead of failing the call.
//!
//! | Vocabulary                   | Default        |
//! |------------------------------|----------------|
//! | [`NetworkType`]              | `NotRequired`  |
//! | [`ExistingWorkPolicy`]       | `Keep`         |
//! | [`ExistingPeriodicPolicy`]   | `Update`       |
//! | [`BackoffKind`]              | `Exponential`  |
//! | [`ExpeditedPolicy`]          | none (absent)  |

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::PlatformLimits;

/// Lenient token parsing shared by all scheduling vocabularies.
pub trait Vocabulary: Sized + Copy + 'static {
    /// Accepted normalized tokens and their values.
    const TOKENS: &'static [(&'static str, Self)];

    /// Parses a token, ignoring case and separators.
    fn parse(raw: &str) -> Option<Self> {
        let key = normalize(raw);
        Self::TOKENS
            .iter()
            .find(|(token, _)| *token == key)
            .map(|(_, value)| *value)
    }

    /// Parses an optional token, falling back to `Default`.
    fn parse_or_default(raw: Option<&str>) -> Self
    where
        Self: Default,
    {
        raw.and_then(Self::parse).unwrap_or_default()
    }
}

fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Network condition a task requires before running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkType {
    /// Any working connection.
    Connected,
    /// A metered connection.
    Metered,
    /// No network needed.
    #[default]
    NotRequired,
    /// A non-roaming connection.
    NotRoaming,
    /// An unmetered connection.
    Unmetered,
    /// A connection that is unmetered for now.
    TemporarilyUnmetered,
}

impl Vocabulary for NetworkType {
    const TOKENS: &'static [(&'static str, Self)] = &[
        ("connected", NetworkType::Connected),
        ("metered", NetworkType::Metered),
        ("notrequired", NetworkType::NotRequired),
        ("notroaming", NetworkType::NotRoaming),
        ("unmetered", NetworkType::Unmetered),
        ("temporarilyunmetered", NetworkType::TemporarilyUnmetered),
    ];
}

/// What to do when a one-off or processing task with the same unique name
/// is already scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExistingWorkPolicy {
    /// Leave the existing task alone; the new request is a no-op.
    #[default]
    Keep,
    /// Cancel the existing task and schedule the new one.
    Replace,
    /// Run the new task after the existing one; dropped if the existing one fails.
    Append,
    /// Run the new task after the existing one, regardless of its outcome.
    AppendOrReplace,
}

impl Vocabulary for ExistingWorkPolicy {
    const TOKENS: &'static [(&'static str, Self)] = &[
        ("keep", ExistingWorkPolicy::Keep),
        ("replace", ExistingWorkPolicy::Replace),
        ("append", ExistingWorkPolicy::Append),
        ("appendorreplace", ExistingWorkPolicy::AppendOrReplace),
        ("update", ExistingWorkPolicy::AppendOrReplace),
    ];
}

/// What to do when a periodic task with the same unique name is already scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExistingPeriodicPolicy {
    /// Leave the existing schedule alone.
    Keep,
    /// Swap the definition in place; the running cadence is preserved.
    #[default]
    Update,
    /// Cancel the existing schedule and start over.
    Replace,
}

impl Vocabulary for ExistingPeriodicPolicy {
    const TOKENS: &'static [(&'static str, Self)] = &[
        ("keep", ExistingPeriodicPolicy::Keep),
        ("update", ExistingPeriodicPolicy::Update),
        ("replace", ExistingPeriodicPolicy::Replace),
        ("cancelandreenqueue", ExistingPeriodicPolicy::Replace),
    ];
}

/// Growth shape of retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    /// `delay × attempt`.
    Linear,
    /// `delay × 2^(attempt-1)`.
    #[default]
    Exponential,
}

impl Vocabulary for BackoffKind {
    const TOKENS: &'static [(&'static str, Self)] = &[
        ("linear", BackoffKind::Linear),
        ("exponential", BackoffKind::Exponential),
    ];
}

/// Behavior of an expedited request once the expedited quota is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpeditedPolicy {
    /// Run as regular (non-expedited) work.
    RunAsNonExpedited,
    /// Drop the request.
    Drop,
}

impl Vocabulary for ExpeditedPolicy {
    const TOKENS: &'static [(&'static str, Self)] = &[
        ("runasnonexpedited", ExpeditedPolicy::RunAsNonExpedited),
        ("runasnonexpeditedworkrequest", ExpeditedPolicy::RunAsNonExpedited),
        ("drop", ExpeditedPolicy::Drop),
        ("dropworkrequest", ExpeditedPolicy::Drop),
    ];
}

/// Device conditions that must hold before a task may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Constraints {
    pub network_type: NetworkType,
    pub requires_charging: bool,
    pub requires_battery_not_low: bool,
    pub requires_device_idle: bool,
    pub requires_storage_not_low: bool,
}

impl Constraints {
    /// True when nothing is required.
    pub fn is_unconstrained(&self) -> bool {
        *self == Constraints::default()
    }

    #[must_use]
    pub fn with_network(mut self, network_type: NetworkType) -> Self {
        self.network_type = network_type;
        self
    }

    #[must_use]
    pub fn with_charging(mut self, required: bool) -> Self {
        self.requires_charging = required;
        self
    }

    #[must_use]
    pub fn with_battery_not_low(mut self, required: bool) -> Self {
        self.requires_battery_not_low = required;
        self
    }

    #[must_use]
    pub fn with_device_idle(mut self, required: bool) -> Self {
        self.requires_device_idle = required;
        self
    }

    #[must_use]
    pub fn with_storage_not_low(mut self, required: bool) -> Self {
        self.requires_storage_not_low = required;
        self
    }
}

/// Retry backoff requested for a task.
///
/// The delay is the base unit of the growth formula (see [`BackoffKind`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    pub kind: BackoffKind,
    pub delay: Duration,
}

impl BackoffConfig {
    pub fn new(kind: BackoffKind, delay: Duration) -> Self {
        Self { kind, delay }
    }

    /// Returns a copy with `delay` clamped into `[min_backoff, max_backoff]`.
    #[must_use]
    pub fn clamped(self, limits: &PlatformLimits) -> Self {
        Self {
            kind: self.kind,
            delay: self.delay.max(limits.min_backoff).min(limits.max_backoff),
        }
    }

    /// Delay before retry number `attempt` (1-based), capped at `max`.
    ///
    /// Linear: `delay × attempt`. Exponential: `delay × 2^(attempt-1)`.
    pub fn delay_for(&self, attempt: u32, max: Duration) -> Duration {
        let attempt = attempt.max(1);
        let factor = match self.kind {
            BackoffKind::Linear => f64::from(attempt),
            BackoffKind::Exponential => 2f64.powi(attempt.saturating_sub(1).min(i32::MAX as u32) as i32),
        };
        let secs = self.delay.as_secs_f64() * factor;
        if !secs.is_finite() || secs > max.as_secs_f64() {
            max
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}
