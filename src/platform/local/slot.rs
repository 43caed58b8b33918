//! # Scheduled entries.
//!
//! One [`Slot`] per unique name. A slot owns the request currently driven by
//! its actor, a queue of appended requests, and the token that cancels the
//! whole chain.
//!
//! ```text
//! enqueue(name) ──► policy vs existing slot ──► Admission
//!
//!   Start    no slot: quota check, new slot, spawn actor
//!   Keep     existing slot untouched
//!   Replace  cancel old chain, new slot (new generation), spawn actor
//!   Append   push to queue; dropped when the predecessor fails
//!   Update   swap the periodic request in place; timing is preserved
//! ```
//!
//! Generations guard against a cancelled actor touching a slot that has
//! since been replaced under the same name.

use std::collections::VecDeque;

use tokio_util::sync::CancellationToken;

use crate::error::SchedulingError;
use crate::request::{ExistingPeriodicPolicy, ExistingWorkPolicy, TaskRequest};

/// What the actor of a slot is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotPhase {
    /// Waiting for delay, constraints, backoff or a permit.
    Pending,
    Running,
}

impl SlotPhase {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            SlotPhase::Pending => "pending",
            SlotPhase::Running => "running",
        }
    }
}

/// Request waiting behind the current one.
#[derive(Debug, Clone)]
pub(crate) struct Queued {
    pub request: TaskRequest,
    /// Dropped when the predecessor ends in failure.
    pub requires_success: bool,
}

#[derive(Debug)]
pub(crate) struct Slot {
    pub generation: u64,
    pub token: CancellationToken,
    pub current: TaskRequest,
    pub queue: VecDeque<Queued>,
    pub phase: SlotPhase,
    /// Completed periodic runs (or finished chain links).
    pub runs: u32,
}

impl Slot {
    pub(crate) fn new(generation: u64, token: CancellationToken, request: TaskRequest) -> Self {
        Self {
            generation,
            token,
            current: request,
            queue: VecDeque::new(),
            phase: SlotPhase::Pending,
            runs: 0,
        }
    }

    pub(crate) fn has_tag(&self, tag: &str) -> bool {
        self.current.tag() == Some(tag)
    }
}

/// Decision for an incoming request with the same unique name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Start,
    Keep,
    Replace,
    Append { requires_success: bool },
    Update,
}

impl Admission {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Admission::Start => "start",
            Admission::Keep => "keep",
            Admission::Replace => "replace",
            Admission::Append { .. } => "append",
            Admission::Update => "update",
        }
    }

    /// Resolves the incoming request's policy against the existing slot.
    pub(crate) fn decide(
        incoming: &TaskRequest,
        existing: Option<&Slot>,
    ) -> Result<Self, SchedulingError> {
        let Some(existing) = existing else {
            return Ok(Admission::Start);
        };
        let periodic_existing = matches!(existing.current, TaskRequest::Periodic(_));

        let work_policy = |policy: ExistingWorkPolicy| match policy {
            ExistingWorkPolicy::Keep => Ok(Admission::Keep),
            ExistingWorkPolicy::Replace => Ok(Admission::Replace),
            ExistingWorkPolicy::Append if periodic_existing => Err(SchedulingError::Rejected {
                unique_name: incoming.unique_name().to_string(),
                reason: "cannot append to periodic work".to_string(),
            }),
            ExistingWorkPolicy::Append => Ok(Admission::Append {
                requires_success: true,
            }),
            ExistingWorkPolicy::AppendOrReplace if periodic_existing => Ok(Admission::Replace),
            ExistingWorkPolicy::AppendOrReplace => Ok(Admission::Append {
                requires_success: false,
            }),
        };

        match incoming {
            TaskRequest::OneOff(task) => work_policy(task.existing_work_policy),
            TaskRequest::Processing(task) => work_policy(task.existing_work_policy),
            TaskRequest::Periodic(task) => Ok(match task.existing_work_policy {
                ExistingPeriodicPolicy::Keep => Admission::Keep,
                ExistingPeriodicPolicy::Replace => Admission::Replace,
                ExistingPeriodicPolicy::Update if periodic_existing => Admission::Update,
                ExistingPeriodicPolicy::Update => Admission::Replace,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{OneOffTask, PeriodicTask, TaskBase};
    use std::time::Duration;

    fn one_off(policy: ExistingWorkPolicy) -> TaskRequest {
        OneOffTask::new(TaskBase::new("n", "t"))
            .with_policy(policy)
            .into()
    }

    fn periodic(policy: ExistingPeriodicPolicy) -> TaskRequest {
        PeriodicTask::new(TaskBase::new("n", "t"), Duration::from_secs(900))
            .with_policy(policy)
            .into()
    }

    fn slot(request: TaskRequest) -> Slot {
        Slot::new(1, CancellationToken::new(), request)
    }

    #[test]
    fn no_existing_slot_starts() {
        let got = Admission::decide(&one_off(ExistingWorkPolicy::Keep), None).unwrap();
        assert_eq!(got, Admission::Start);
    }

    #[test]
    fn one_off_policies_against_one_off() {
        let existing = slot(one_off(ExistingWorkPolicy::Keep));
        let decide = |p| Admission::decide(&one_off(p), Some(&existing)).unwrap();

        assert_eq!(decide(ExistingWorkPolicy::Keep), Admission::Keep);
        assert_eq!(decide(ExistingWorkPolicy::Replace), Admission::Replace);
        assert_eq!(
            decide(ExistingWorkPolicy::Append),
            Admission::Append {
                requires_success: true
            }
        );
        assert_eq!(
            decide(ExistingWorkPolicy::AppendOrReplace),
            Admission::Append {
                requires_success: false
            }
        );
    }

    #[test]
    fn appending_to_periodic_work() {
        let existing = slot(periodic(ExistingPeriodicPolicy::Keep));
        assert!(matches!(
            Admission::decide(&one_off(ExistingWorkPolicy::Append), Some(&existing)),
            Err(SchedulingError::Rejected { .. })
        ));
        assert_eq!(
            Admission::decide(&one_off(ExistingWorkPolicy::AppendOrReplace), Some(&existing))
                .unwrap(),
            Admission::Replace
        );
    }

    #[test]
    fn periodic_update_swaps_only_periodic_work() {
        let p = slot(periodic(ExistingPeriodicPolicy::Keep));
        let o = slot(one_off(ExistingWorkPolicy::Keep));
        let update = periodic(ExistingPeriodicPolicy::Update);

        assert_eq!(Admission::decide(&update, Some(&p)).unwrap(), Admission::Update);
        assert_eq!(Admission::decide(&update, Some(&o)).unwrap(), Admission::Replace);
    }
}
