//! # Typed scheduling requests.
//!
//! A [`TaskRequest`] is one of three variants sharing a common [`TaskBase`]:
//!
//! ```text
//! TaskRequest
//!  ├─ OneOff(OneOffTask)         base + ExistingWorkPolicy
//!  ├─ Periodic(PeriodicTask)     base + ExistingPeriodicPolicy + frequency + flex
//!  └─ Processing(ProcessingTask) base + ExistingWorkPolicy (long-running work)
//! ```
//!
//! ## Rules
//! - `unique_name` and `task_name` are non-empty ([`TaskRequest::validate`]).
//! - [`TaskRequest::normalized`] applies platform minimums: backoff delay within
//!   `[min_backoff, max_backoff]`, frequency ≥ `min_periodic_interval`, flex within
//!   `[min_flex_interval, frequency]`.
//! - Requests are immutable once handed to a scheduler.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use taskbridge::{OneOffTask, TaskBase, TaskRequest, ExistingWorkPolicy};
//!
//! let req: TaskRequest = OneOffTask::new(
//!     TaskBase::new("nightly-sync", "sync")
//!         .with_tag("sync")
//!         .with_initial_delay(Duration::from_secs(30)),
//! )
//! .with_policy(ExistingWorkPolicy::Replace)
//! .into();
//!
//! assert_eq!(req.unique_name(), "nightly-sync");
//! assert!(req.validate().is_ok());
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::PlatformLimits;
use crate::error::ValidationError;
use crate::request::payload::Payload;
use crate::request::policy::{
    BackoffConfig, Constraints, ExistingPeriodicPolicy, ExistingWorkPolicy, ExpeditedPolicy,
};

/// Fields shared by every request variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskBase {
    /// Deduplication key within the host scheduler.
    pub unique_name: String,
    /// Logical name handed to the callback.
    pub task_name: String,
    /// Optional group label for bulk cancellation.
    pub tag: Option<String>,
    pub payload: Payload,
    pub initial_delay: Duration,
    pub constraints: Constraints,
    /// Retry backoff; `None` means the host default.
    pub backoff: Option<BackoffConfig>,
    pub expedited: Option<ExpeditedPolicy>,
}

impl TaskBase {
    pub fn new(unique_name: impl Into<String>, task_name: impl Into<String>) -> Self {
        Self {
            unique_name: unique_name.into(),
            task_name: task_name.into(),
            tag: None,
            payload: Payload::default(),
            initial_delay: Duration::ZERO,
            constraints: Constraints::default(),
            backoff: None,
            expedited: None,
        }
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    #[must_use]
    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = Some(backoff);
        self
    }

    #[must_use]
    pub fn with_expedited(mut self, policy: ExpeditedPolicy) -> Self {
        self.expedited = Some(policy);
        self
    }
}

/// Runs once, after the initial delay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneOffTask {
    pub base: TaskBase,
    pub existing_work_policy: ExistingWorkPolicy,
}

impl OneOffTask {
    pub fn new(base: TaskBase) -> Self {
        Self {
            base,
            existing_work_policy: ExistingWorkPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ExistingWorkPolicy) -> Self {
        self.existing_work_policy = policy;
        self
    }
}

/// Runs repeatedly every `frequency`, optionally within a trailing flex window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodicTask {
    pub base: TaskBase,
    pub existing_work_policy: ExistingPeriodicPolicy,
    pub frequency: Duration,
    /// Window at the end of each period in which the run may happen.
    pub flex_interval: Option<Duration>,
}

impl PeriodicTask {
    pub fn new(base: TaskBase, frequency: Duration) -> Self {
        Self {
            base,
            existing_work_policy: ExistingPeriodicPolicy::default(),
            frequency,
            flex_interval: None,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ExistingPeriodicPolicy) -> Self {
        self.existing_work_policy = policy;
        self
    }

    #[must_use]
    pub fn with_flex(mut self, flex: Duration) -> Self {
        self.flex_interval = Some(flex);
        self
    }
}

/// Long-running background processing (one run, usually while idle/charging).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingTask {
    pub base: TaskBase,
    pub existing_work_policy: ExistingWorkPolicy,
}

impl ProcessingTask {
    pub fn new(base: TaskBase) -> Self {
        Self {
            base,
            existing_work_policy: ExistingWorkPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ExistingWorkPolicy) -> Self {
        self.existing_work_policy = policy;
        self
    }
}

/// Request variant discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    OneOff,
    Periodic,
    Processing,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::OneOff => "one_off",
            TaskKind::Periodic => "periodic",
            TaskKind::Processing => "processing",
        }
    }
}

/// A validated scheduling request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskRequest {
    OneOff(OneOffTask),
    Periodic(PeriodicTask),
    Processing(ProcessingTask),
}

impl TaskRequest {
    pub fn base(&self) -> &TaskBase {
        match self {
            TaskRequest::OneOff(t) => &t.base,
            TaskRequest::Periodic(t) => &t.base,
            TaskRequest::Processing(t) => &t.base,
        }
    }

    pub(crate) fn base_mut(&mut self) -> &mut TaskBase {
        match self {
            TaskRequest::OneOff(t) => &mut t.base,
            TaskRequest::Periodic(t) => &mut t.base,
            TaskRequest::Processing(t) => &mut t.base,
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            TaskRequest::OneOff(_) => TaskKind::OneOff,
            TaskRequest::Periodic(_) => TaskKind::Periodic,
            TaskRequest::Processing(_) => TaskKind::Processing,
        }
    }

    #[inline]
    pub fn unique_name(&self) -> &str {
        &self.base().unique_name
    }

    #[inline]
    pub fn task_name(&self) -> &str {
        &self.base().task_name
    }

    #[inline]
    pub fn tag(&self) -> Option<&str> {
        self.base().tag.as_deref()
    }

    /// True when the request's existing-work policy is "keep".
    pub fn keeps_existing(&self) -> bool {
        match self {
            TaskRequest::OneOff(t) => t.existing_work_policy == ExistingWorkPolicy::Keep,
            TaskRequest::Processing(t) => t.existing_work_policy == ExistingWorkPolicy::Keep,
            TaskRequest::Periodic(t) => t.existing_work_policy == ExistingPeriodicPolicy::Keep,
        }
    }

    /// Checks that the identifying names are present.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let base = self.base();
        if base.unique_name.is_empty() {
            return Err(ValidationError::EmptyField {
                field: "uniqueName",
            });
        }
        if base.task_name.is_empty() {
            return Err(ValidationError::EmptyField { field: "taskName" });
        }
        Ok(())
    }

    /// Returns the request with platform minimums applied.
    #[must_use]
    pub fn normalized(mut self, limits: &PlatformLimits) -> Self {
        let base = self.base_mut();
        base.backoff = base.backoff.map(|b| b.clamped(limits));

        if let TaskRequest::Periodic(task) = &mut self {
            task.frequency = task.frequency.max(limits.min_periodic_interval);
            let frequency = task.frequency;
            task.flex_interval = task
                .flex_interval
                .map(|flex| flex.max(limits.min_flex_interval).min(frequency));
        }
        self
    }
}

impl From<OneOffTask> for TaskRequest {
    fn from(task: OneOffTask) -> Self {
        TaskRequest::OneOff(task)
    }
}

impl From<PeriodicTask> for TaskRequest {
    fn from(task: PeriodicTask) -> Self {
        TaskRequest::Periodic(task)
    }
}

impl From<ProcessingTask> for TaskRequest {
    fn from(task: ProcessingTask) -> Self {
        TaskRequest::Processing(task)
    }
}
