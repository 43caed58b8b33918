//! # One task execution.
//!
//! [`WorkerExecution`] drives a single due task from `Idle` to `Terminated`.
//! Every exit path, fatal or not, goes through the same completion signal and
//! the same teardown:
//!
//! ```text
//! dispatch ─┬─ no config ───────────────► resolve(Failure(NotInitialized))
//!           ├─ cancelled before start ──► (already resolved by CancelHandle)
//!           ├─ acquire fails ───────────► resolve(Failure(RuntimeStart))
//!           ├─ bind fails ──────────────► resolve(Failure(CallbackResolution))
//!           └─ invoke ──► runtime ──────► resolve(outcome)
//!                                              │
//!                        CancelHandle::cancel ─┤ (first resolution wins)
//!                                              ▼
//!                              wait / wait_blocking  (single suspension point)
//!                                              ▼
//!                          Completing: teardown runtime → Terminated → report + hook
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::debug::{DebugHook, Emitter, TaskDebugInfo, TaskResult, TaskStatus};
use crate::error::ExecutionError;
use crate::runtime::{CallbackRuntime, Invocation, RuntimeLauncher, Settlement};
use crate::store::{CallbackConfiguration, ConfigStore};
use crate::sync::{Resolver, Waiter, completion};
use crate::worker::state::{StateCell, WorkerState};
use crate::worker::{ExecutionReport, ScheduledTask, TerminalStatus};

struct Shared {
    state: StateCell,
    resolver: Resolver<Settlement>,
    token: CancellationToken,
}

/// Host-side cancellation signal for one execution.
#[derive(Clone)]
pub struct CancelHandle {
    shared: Arc<Shared>,
}

impl CancelHandle {
    /// Requests cancellation.
    ///
    /// Returns `true` when this call decided the outcome (`Failure`, cancelled).
    /// After termination, or once the callback has already reported, it is a no-op.
    pub fn cancel(&self) -> bool {
        let state = self.shared.state.lock();
        if *state == WorkerState::Terminated {
            return false;
        }
        self.shared.token.cancel();
        let won = self.shared.resolver.resolve(Settlement::cancelled());
        if won {
            debug!(state = state.as_str(), "cancellation resolved execution");
        }
        won
    }

    pub fn state(&self) -> WorkerState {
        self.shared.state.get()
    }

    pub fn is_terminated(&self) -> bool {
        self.state() == WorkerState::Terminated
    }
}

pub(crate) enum ConfigSource {
    Store(Arc<dyn ConfigStore>),
    Snapshot(Option<CallbackConfiguration>),
}

/// Scoped runtime: torn down when dropped.
struct RuntimeGuard(Box<dyn CallbackRuntime>);

impl Drop for RuntimeGuard {
    fn drop(&mut self) {
        self.0.teardown();
    }
}

struct Dispatched {
    emitter: Emitter,
    info: TaskDebugInfo,
    runtime: Option<RuntimeGuard>,
}

/// A prepared execution; run it once with [`run`](Self::run) or
/// [`run_blocking`](Self::run_blocking).
pub struct WorkerExecution {
    task: ScheduledTask,
    source: ConfigSource,
    launcher: Arc<dyn RuntimeLauncher>,
    hook: DebugHook,
    shared: Arc<Shared>,
    waiter: Option<Waiter<Settlement>>,
}

impl WorkerExecution {
    pub(crate) fn new(
        task: ScheduledTask,
        source: ConfigSource,
        launcher: Arc<dyn RuntimeLauncher>,
        hook: DebugHook,
    ) -> Self {
        let (resolver, waiter) = completion();
        Self {
            task,
            source,
            launcher,
            hook,
            shared: Arc::new(Shared {
                state: StateCell::new(),
                resolver,
                token: CancellationToken::new(),
            }),
            waiter: Some(waiter),
        }
    }

    /// Handle the host uses to request cancellation; valid before and during the run.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn task(&self) -> &ScheduledTask {
        &self.task
    }

    /// Runs to completion, blocking the calling thread on the completion signal.
    ///
    /// Call from a thread the host owns (or `spawn_blocking`), never from an async task.
    pub fn run_blocking(mut self) -> ExecutionReport {
        let started = Instant::now();
        let dispatched = self.dispatch();
        let settlement = self.waiter.take().and_then(Waiter::wait_blocking);
        self.finish(dispatched, settlement, started.elapsed())
    }

    /// Runs to completion, suspending on the completion signal.
    pub async fn run(mut self) -> ExecutionReport {
        let started = Instant::now();
        let dispatched = self.dispatch();
        let settlement = match self.waiter.take() {
            Some(waiter) => waiter.wait().await,
            None => None,
        };
        self.finish(dispatched, settlement, started.elapsed())
    }

    fn dispatch(&self) -> Dispatched {
        let resolver = &self.shared.resolver;
        let mut info = TaskDebugInfo::new(&self.task.unique_name, &self.task.task_name)
            .with_tag(self.task.tag.clone())
            .with_payload(self.task.payload.clone())
            .with_attempt(self.task.attempt);

        self.shared.state.advance(WorkerState::RuntimeStarting);

        let config = match self.load_config() {
            Ok(Some(config)) => config,
            Ok(None) => {
                resolver.resolve(Settlement::failure(ExecutionError::NotInitialized));
                return self.without_runtime(info);
            }
            Err(cause) => {
                resolver.resolve(Settlement::failure(cause));
                return self.without_runtime(info);
            }
        };
        info = info.with_callback_handle(config.callback_handle);
        let emitter = self.hook.emitter(config.debug_enabled);

        if resolver.is_resolved() {
            debug!(task = %self.task.unique_name, "cancelled before runtime start");
            return Dispatched {
                emitter,
                info,
                runtime: None,
            };
        }

        let mut runtime = match self.launcher.acquire(&self.task.unique_name) {
            Ok(rt) => RuntimeGuard(rt),
            Err(cause) => {
                resolver.resolve(Settlement::failure(cause));
                return Dispatched {
                    emitter,
                    info,
                    runtime: None,
                };
            }
        };

        if let Err(cause) = runtime.0.bind(config.callback_handle) {
            resolver.resolve(Settlement::failure(cause));
            return Dispatched {
                emitter,
                info,
                runtime: Some(runtime),
            };
        }
        self.shared.state.advance(WorkerState::RuntimeReady);

        if !resolver.is_resolved() {
            emitter.status(&info, TaskStatus::Started, None);
            runtime.0.invoke(
                Invocation {
                    task_name: self.task.task_name.clone(),
                    unique_name: self.task.unique_name.clone(),
                    payload: self.task.payload.clone(),
                    attempt: self.task.attempt,
                    cancel: self.shared.token.child_token(),
                },
                resolver.clone(),
            );
            self.shared.state.advance(WorkerState::CallbackInvoked);
        }

        Dispatched {
            emitter,
            info,
            runtime: Some(runtime),
        }
    }

    fn without_runtime(&self, info: TaskDebugInfo) -> Dispatched {
        Dispatched {
            emitter: self.hook.emitter(false),
            info,
            runtime: None,
        }
    }

    fn load_config(&self) -> Result<Option<CallbackConfiguration>, ExecutionError> {
        match &self.source {
            ConfigSource::Snapshot(snapshot) => Ok(*snapshot),
            ConfigSource::Store(store) => store.load().map_err(|e| ExecutionError::Store {
                reason: e.to_string(),
            }),
        }
    }

    fn finish(
        self,
        dispatched: Dispatched,
        settlement: Option<Settlement>,
        elapsed: Duration,
    ) -> ExecutionReport {
        self.shared.state.advance(WorkerState::Completing);
        drop(dispatched.runtime);

        let settlement =
            settlement.unwrap_or_else(|| Settlement::failure(ExecutionError::RuntimeLost));
        self.shared.state.advance(WorkerState::Terminated);

        let report = ExecutionReport {
            status: TerminalStatus::from(settlement.outcome),
            cause: settlement.cause,
            elapsed,
            attempt: self.task.attempt,
        };
        self.report(&dispatched.emitter, &dispatched.info, &report);
        report
    }

    fn report(&self, emitter: &Emitter, info: &TaskDebugInfo, report: &ExecutionReport) {
        let task = &self.task.unique_name;
        let error = report.cause.as_ref().map(ToString::to_string);
        let result = TaskResult {
            success: report.status == TerminalStatus::Success,
            duration: report.elapsed,
            error: error.clone(),
        };

        let status = match report.status {
            TerminalStatus::Success => {
                info!(task = %task, attempt = report.attempt, elapsed = ?report.elapsed, "task completed");
                TaskStatus::Completed
            }
            TerminalStatus::Retry => {
                info!(task = %task, attempt = report.attempt, error = ?error, "task asked for retry");
                TaskStatus::Retrying
            }
            TerminalStatus::Failure if report.is_cancelled() => {
                warn!(task = %task, attempt = report.attempt, "task cancelled");
                TaskStatus::Cancelled
            }
            TerminalStatus::Failure => {
                let label = report.cause.as_ref().map(ExecutionError::as_label);
                error!(task = %task, attempt = report.attempt, label = ?label, error = ?error, "task failed");
                TaskStatus::Failed
            }
        };

        emitter.status(info, status, Some(&result));
        if let Some(cause) = report
            .cause
            .as_ref()
            .filter(|c| c.is_fatal() && !matches!(c, ExecutionError::Cancelled))
        {
            emitter.exception(Some(info), cause);
        }
    }
}
