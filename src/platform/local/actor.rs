//! # Slot actor: drives one scheduled chain.
//!
//! ```text
//! drive(slot)
//!  loop {
//!    ├─► OneOff / Processing:
//!    │     initial delay (skipped when expedited) ─► attempts ─► RunEnd
//!    ├─► Periodic:
//!    │     loop { wait (initial delay, then period) ─► attempts ─► Rescheduled }
//!    └─► next queued request, or remove the slot
//!  }
//!
//! attempts
//!  loop {
//!    ├─► wait for constraints (recheck interval)
//!    ├─► acquire permit (expedited + Drop: try once)
//!    ├─► Worker execution on a blocking thread
//!    │     raced against slot cancellation and the host time limit
//!    ├─► Success → Succeeded        Failure → Failed
//!    └─► Retry (or time limit hit) → attempt limit? → backoff sleep
//!  }
//! ```
//!
//! ## Rules
//! - Attempts of one chain run sequentially.
//! - Every wait is cancellable through the slot token.
//! - A cancelled actor never mutates a slot of a newer generation.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::OwnedSemaphorePermit;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::debug::{TaskDebugInfo, TaskStatus};
use crate::error::ExecutionError;
use crate::platform::local::Inner;
use crate::platform::local::retry::RetryBackoff;
use crate::platform::local::slot::SlotPhase;
use crate::request::{Constraints, ExpeditedPolicy, PeriodicTask, TaskRequest};
use crate::worker::{ExecutionReport, ScheduledTask, TerminalStatus};

/// How one request of a chain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunEnd {
    Succeeded,
    Failed,
    Cancelled,
}

struct Ctx<'a> {
    inner: &'a Inner,
    name: &'a str,
    generation: u64,
    token: &'a CancellationToken,
}

pub(crate) async fn drive(
    inner: Arc<Inner>,
    name: String,
    generation: u64,
    token: CancellationToken,
) {
    let ctx = Ctx {
        inner: &inner,
        name: &name,
        generation,
        token: &token,
    };
    let Some(mut request) = inner.current(&name, generation) else {
        return;
    };

    loop {
        let end = match &request {
            TaskRequest::Periodic(_) => run_periodic(&ctx).await,
            other => run_single(&ctx, other).await,
        };
        if end == RunEnd::Cancelled {
            debug!(task = %name, generation, "slot actor cancelled");
            return;
        }
        match inner.advance(&name, generation, end) {
            Some(next) => request = next,
            None => return,
        }
    }
}

async fn run_single(ctx: &Ctx<'_>, request: &TaskRequest) -> RunEnd {
    let base = request.base();
    let expedited = base
        .expedited
        .filter(|_| ctx.inner.config.profile.honors_expedited());

    if expedited.is_none() && !sleep_or_cancel(base.initial_delay, ctx.token).await {
        return RunEnd::Cancelled;
    }
    run_attempts(ctx, request, expedited).await
}

async fn run_periodic(ctx: &Ctx<'_>) -> RunEnd {
    let mut first = true;
    loop {
        let Some(request) = ctx.inner.current(ctx.name, ctx.generation) else {
            return RunEnd::Cancelled;
        };
        let TaskRequest::Periodic(task) = &request else {
            return run_single(ctx, &request).await;
        };

        let wait = if first {
            task.base.initial_delay
        } else {
            period_wait(ctx, task)
        };
        if !sleep_or_cancel(wait, ctx.token).await {
            return RunEnd::Cancelled;
        }

        let end = run_attempts(ctx, &request, None).await;
        if end == RunEnd::Cancelled {
            return end;
        }
        first = false;
        ctx.inner.note_run(ctx.name, ctx.generation);

        let next = period_wait(ctx, task);
        info!(task = %ctx.name, outcome = ?end, next_in = ?next, "periodic task rescheduled");
        let info = TaskDebugInfo::new(&task.base.unique_name, &task.base.task_name)
            .with_tag(task.base.tag.clone())
            .with_payload(task.base.payload.clone());
        ctx.inner
            .worker
            .hook()
            .status(&info, TaskStatus::Rescheduled, None);
    }
}

/// Time until the next periodic run; the flex window is honored when the
/// platform supports it.
fn period_wait(ctx: &Ctx<'_>, task: &PeriodicTask) -> Duration {
    match task.flex_interval {
        Some(flex) if ctx.inner.config.profile.honors_flex() && !flex.is_zero() => {
            let flex = flex.min(task.frequency);
            let window_ms = u64::try_from(flex.as_millis()).unwrap_or(u64::MAX);
            let offset = Duration::from_millis(rand::rng().random_range(0..=window_ms));
            task.frequency.saturating_sub(offset)
        }
        _ => task.frequency,
    }
}

async fn run_attempts(
    ctx: &Ctx<'_>,
    request: &TaskRequest,
    expedited: Option<ExpeditedPolicy>,
) -> RunEnd {
    let inner = ctx.inner;
    let base = request.base();
    let backoff = RetryBackoff::new(base.backoff, &inner.config.limits, inner.config.retry_jitter);
    let mut attempt: u32 = 0;

    loop {
        if !wait_constraints(ctx, &base.constraints).await {
            return RunEnd::Cancelled;
        }
        let permit = match acquire(ctx, expedited).await {
            Permit::Granted(permit) => permit,
            Permit::Cancelled => return RunEnd::Cancelled,
            Permit::Dropped => {
                warn!(task = %ctx.name, "expedited task dropped: no execution slot available");
                return RunEnd::Failed;
            }
        };

        attempt += 1;
        let task = ScheduledTask::from_request(request).with_attempt(attempt);
        inner.set_phase(ctx.name, ctx.generation, SlotPhase::Running);
        let report = execute(ctx, task).await;
        inner.set_phase(ctx.name, ctx.generation, SlotPhase::Pending);
        drop(permit);

        match report.status {
            TerminalStatus::Success => return RunEnd::Succeeded,
            TerminalStatus::Failure if report.is_cancelled() => {
                if ctx.token.is_cancelled() {
                    return RunEnd::Cancelled;
                }
                // stopped by the host time limit: the host runs it again
            }
            TerminalStatus::Failure => return RunEnd::Failed,
            TerminalStatus::Retry => {}
        }

        if inner.config.attempt_limit().is_some_and(|max| attempt >= max) {
            warn!(task = %ctx.name, attempt, "attempt limit reached, giving up");
            return RunEnd::Failed;
        }
        let delay = backoff.next(attempt);
        debug!(task = %ctx.name, attempt, delay = ?delay, "retry scheduled");
        if !sleep_or_cancel(delay, ctx.token).await {
            return RunEnd::Cancelled;
        }
    }
}

async fn wait_constraints(ctx: &Ctx<'_>, constraints: &Constraints) -> bool {
    if constraints.is_unconstrained() {
        return !ctx.token.is_cancelled();
    }
    let recheck = ctx.inner.config.constraint_recheck.max(Duration::from_millis(1));
    let mut logged = false;
    loop {
        if ctx.token.is_cancelled() {
            return false;
        }
        if ctx.inner.probe.satisfied(constraints) {
            return true;
        }
        if !logged {
            debug!(task = %ctx.name, ?constraints, "waiting for constraints");
            logged = true;
        }
        if !sleep_or_cancel(recheck, ctx.token).await {
            return false;
        }
    }
}

enum Permit {
    Granted(Option<OwnedSemaphorePermit>),
    Cancelled,
    Dropped,
}

async fn acquire(ctx: &Ctx<'_>, expedited: Option<ExpeditedPolicy>) -> Permit {
    let Some(sem) = &ctx.inner.permits else {
        return Permit::Granted(None);
    };
    if expedited == Some(ExpeditedPolicy::Drop) {
        return match Arc::clone(sem).try_acquire_owned() {
            Ok(permit) => Permit::Granted(Some(permit)),
            Err(_) => Permit::Dropped,
        };
    }

    let permit_future = Arc::clone(sem).acquire_owned();
    tokio::pin!(permit_future);
    select! {
        res = &mut permit_future => match res {
            Ok(permit) => Permit::Granted(Some(permit)),
            Err(_closed) => Permit::Cancelled,
        },
        _ = ctx.token.cancelled() => Permit::Cancelled,
    }
}

/// Runs one attempt on a blocking thread.
async fn execute(ctx: &Ctx<'_>, task: ScheduledTask) -> ExecutionReport {
    let attempt = task.attempt;
    let execution = ctx.inner.worker.prepare(task);
    let cancel = execution.cancel_handle();
    let mut join = tokio::task::spawn_blocking(move || execution.run_blocking());

    let joined = select! {
        res = &mut join => res,
        _ = ctx.token.cancelled() => {
            cancel.cancel();
            join.await
        }
        _ = expire(ctx.inner.config.time_limit()) => {
            warn!(task = %ctx.name, attempt, "execution time limit reached");
            cancel.cancel();
            join.await
        }
    };

    joined.unwrap_or_else(|e| {
        warn!(task = %ctx.name, attempt, error = %e, "execution thread lost");
        ExecutionReport {
            status: TerminalStatus::Failure,
            cause: Some(ExecutionError::RuntimeLost),
            elapsed: Duration::ZERO,
            attempt,
        }
    })
}

async fn expire(limit: Option<Duration>) {
    match limit {
        Some(limit) => time::sleep(limit).await,
        None => std::future::pending().await,
    }
}

/// Sleeps for `delay`; returns `false` if the token fired first.
async fn sleep_or_cancel(delay: Duration, token: &CancellationToken) -> bool {
    if delay.is_zero() {
        return !token.is_cancelled();
    }
    let sleep = time::sleep(delay);
    tokio::pin!(sleep);
    select! {
        _ = &mut sleep => true,
        _ = token.cancelled() => false,
    }
}
