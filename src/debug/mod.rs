//! # Debug instrumentation.
//!
//! A [`DebugHandler`] observes lifecycle transitions of scheduled tasks.
//! Exactly one handler is active per [`DebugHook`]; the hook is injected into
//! the bridge and the worker, and can be swapped at any time.
//!
//! ```text
//! TaskBridge ──Scheduled──┐
//!                         ├─► DebugHook ──► Emitter ──► handler.on_task_status_update()
//! Worker ─Started/Completed/Retrying/Failed/Cancelled─┘  └─► panic caught, logged, ignored
//! LocalScheduler ──Rescheduled───────────┘
//! ```
//!
//! ## Rules
//! - No handler installed means [`NoopDebugHandler`]: a true no-op.
//! - Handler panics are caught and logged; they never change a task's terminal status.
//! - Handlers are synchronous and called inline; keep them cheap.

mod log;

pub use log::LoggingDebugHandler;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::RwLock;
use tracing::warn;

use crate::error::ExecutionError;
use crate::request::Payload;

/// Lifecycle status reported to a [`DebugHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Accepted by the host scheduler.
    Scheduled,
    /// The callback runtime is about to run the task.
    Started,
    Completed,
    Failed,
    Cancelled,
    /// Finished with a retry request; the host will run it again.
    Retrying,
    /// A periodic task finished a run and is waiting for the next period.
    Rescheduled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Scheduled => "scheduled",
            TaskStatus::Started => "started",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Retrying => "retrying",
            TaskStatus::Rescheduled => "rescheduled",
        }
    }
}

/// Identity of the task a status refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDebugInfo {
    pub unique_name: String,
    pub task_name: String,
    pub tag: Option<String>,
    pub payload: Payload,
    pub callback_handle: Option<i64>,
    /// 1-based attempt number; 0 before the first execution.
    pub attempt: u32,
    pub start_time: SystemTime,
}

impl TaskDebugInfo {
    pub fn new(unique_name: impl Into<String>, task_name: impl Into<String>) -> Self {
        Self {
            unique_name: unique_name.into(),
            task_name: task_name.into(),
            tag: None,
            payload: Payload::default(),
            callback_handle: None,
            attempt: 0,
            start_time: SystemTime::now(),
        }
    }

    #[must_use]
    pub fn with_tag(mut self, tag: Option<String>) -> Self {
        self.tag = tag;
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    #[must_use]
    pub fn with_callback_handle(mut self, handle: i64) -> Self {
        self.callback_handle = Some(handle);
        self
    }

    #[must_use]
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }
}

/// Result attached to terminal statuses.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult {
    pub success: bool,
    pub duration: Duration,
    pub error: Option<String>,
}

/// Observer of task lifecycle transitions.
///
/// ### Implementation requirements
/// - Do not block; calls happen inline on worker threads.
/// - Panics are caught and logged, never propagated.
pub trait DebugHandler: Send + Sync + 'static {
    fn on_task_status_update(
        &self,
        info: &TaskDebugInfo,
        status: TaskStatus,
        result: Option<&TaskResult>,
    );

    /// Called for execution errors; `info` is absent when the task identity is unknown.
    fn on_exception_encountered(&self, info: Option<&TaskDebugInfo>, error: &ExecutionError);

    /// True only for [`NoopDebugHandler`].
    fn is_noop(&self) -> bool {
        false
    }
}

/// Handler that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDebugHandler;

impl DebugHandler for NoopDebugHandler {
    fn on_task_status_update(&self, _: &TaskDebugInfo, _: TaskStatus, _: Option<&TaskResult>) {}

    fn on_exception_encountered(&self, _: Option<&TaskDebugInfo>, _: &ExecutionError) {}

    fn is_noop(&self) -> bool {
        true
    }
}

/// Swappable slot holding the active [`DebugHandler`]. Clones share the slot.
#[derive(Clone)]
pub struct DebugHook {
    slot: Arc<RwLock<Arc<dyn DebugHandler>>>,
}

impl Default for DebugHook {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DebugHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugHook")
            .field("noop", &self.is_noop())
            .finish()
    }
}

impl DebugHook {
    /// Creates a hook holding [`NoopDebugHandler`].
    pub fn new() -> Self {
        Self::with_handler(NoopDebugHandler)
    }

    pub fn with_handler(handler: impl DebugHandler) -> Self {
        Self {
            slot: Arc::new(RwLock::new(Arc::new(handler))),
        }
    }

    /// Replaces the active handler for every clone of this hook.
    pub fn set(&self, handler: Arc<dyn DebugHandler>) {
        *self.slot.write() = handler;
    }

    /// Restores the no-op handler.
    pub fn clear(&self) {
        self.set(Arc::new(NoopDebugHandler));
    }

    pub fn is_noop(&self) -> bool {
        self.slot.read().is_noop()
    }

    /// Snapshot of the active handler for one execution.
    ///
    /// With `debug_enabled` and no handler installed, reports go to
    /// [`LoggingDebugHandler`].
    pub fn emitter(&self, debug_enabled: bool) -> Emitter {
        let handler = Arc::clone(&*self.slot.read());
        let handler: Arc<dyn DebugHandler> = if debug_enabled && handler.is_noop() {
            Arc::new(LoggingDebugHandler::new())
        } else {
            handler
        };
        Emitter { handler }
    }

    /// Reports a status to the active handler.
    pub fn status(&self, info: &TaskDebugInfo, status: TaskStatus, result: Option<&TaskResult>) {
        self.emitter(false).status(info, status, result);
    }
}

/// Handler snapshot with panic isolation.
#[derive(Clone)]
pub struct Emitter {
    handler: Arc<dyn DebugHandler>,
}

impl Emitter {
    pub fn status(&self, info: &TaskDebugInfo, status: TaskStatus, result: Option<&TaskResult>) {
        let handler = &self.handler;
        let caught = catch_unwind(AssertUnwindSafe(|| {
            handler.on_task_status_update(info, status, result)
        }));
        if caught.is_err() {
            warn!(task = %info.unique_name, status = status.as_str(), "debug handler panicked");
        }
    }

    pub fn exception(&self, info: Option<&TaskDebugInfo>, error: &ExecutionError) {
        let handler = &self.handler;
        let caught = catch_unwind(AssertUnwindSafe(|| {
            handler.on_exception_encountered(info, error)
        }));
        if caught.is_err() {
            warn!(error = error.as_label(), "debug handler panicked");
        }
    }
}
