//! # Platform scheduling adapters.
//!
//! [`PlatformScheduler`] is the boundary between the bridge and a host OS
//! scheduler. The bridge only enqueues, cancels and queries; translating
//! constraints, backoff and existing-work policies into host primitives is
//! the adapter's job.
//!
//! [`LocalScheduler`] is an in-process host built on `tokio` that honors the
//! full request model and runs due tasks through a [`Worker`](crate::Worker).

pub mod local;

pub use local::{
    ConstraintProbe, DeviceProbe, DeviceSnapshot, JitterPolicy, LocalScheduler, RetryBackoff,
    Satisfied,
};

use crate::error::SchedulingError;
use crate::request::{OneOffTask, PeriodicTask, ProcessingTask, TaskRequest};

/// Answer of [`PlatformScheduler::query_scheduled_state`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduledState {
    Scheduled,
    NotScheduled,
    /// The host could not answer.
    Error(String),
}

impl ScheduledState {
    pub fn is_scheduled(&self) -> bool {
        matches!(self, ScheduledState::Scheduled)
    }
}

/// Host scheduler operations consumed by the bridge.
///
/// All methods are synchronous and must not block on task execution.
pub trait PlatformScheduler: Send + Sync + 'static {
    fn enqueue_one_off(&self, task: &OneOffTask) -> Result<(), SchedulingError>;

    fn enqueue_periodic(&self, task: &PeriodicTask) -> Result<(), SchedulingError>;

    fn enqueue_processing(&self, task: &ProcessingTask) -> Result<(), SchedulingError>;

    /// Dispatches on the request variant.
    fn enqueue(&self, request: &TaskRequest) -> Result<(), SchedulingError> {
        match request {
            TaskRequest::OneOff(task) => self.enqueue_one_off(task),
            TaskRequest::Periodic(task) => self.enqueue_periodic(task),
            TaskRequest::Processing(task) => self.enqueue_processing(task),
        }
    }

    /// Cancels the entry named `unique_name`; unknown names are not an error.
    fn cancel_by_unique_name(&self, unique_name: &str) -> Result<(), SchedulingError>;

    fn cancel_by_tag(&self, tag: &str) -> Result<(), SchedulingError>;

    fn cancel_all(&self) -> Result<(), SchedulingError>;

    fn query_scheduled_state(&self, unique_name: &str) -> ScheduledState;

    /// Human-readable listing of scheduled entries, one per line.
    fn describe_scheduled(&self) -> String {
        String::new()
    }
}
