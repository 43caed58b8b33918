//! # Worker lifecycle controller.
//!
//! The host scheduler calls into a [`Worker`] when a previously enqueued task
//! becomes due. The worker reads the persisted [`CallbackConfiguration`],
//! starts an isolated runtime, invokes the callback, waits for the single
//! completion signal, tears the runtime down and returns a [`TerminalStatus`].
//!
//! ## Rules
//! - Exactly one suspension point per execution: the wait on the completion signal.
//! - Every acquired runtime is torn down exactly once, on every exit path.
//! - Execution errors never escape; they become `ExecutionReport::cause`.
//! - Cancellation and normal completion race; exactly one terminal status wins.
//!
//! # Example
//! ```rust
//! use std::sync::Arc;
//! use taskbridge::{
//!     CallbackConfiguration, DebugHook, EntryFn, EntryPointRegistry, Invocation,
//!     IsolateLauncher, MemoryConfigStore, ScheduledTask, TerminalStatus, Worker,
//! };
//!
//! let registry = EntryPointRegistry::new();
//! let handle = registry.register(EntryFn::arc(|_inv: Invocation| async { Ok(true) }));
//!
//! let worker = Worker::new(
//!     Arc::new(MemoryConfigStore::with(CallbackConfiguration::new(handle, false))),
//!     Arc::new(IsolateLauncher::new(registry)),
//!     DebugHook::new(),
//! );
//!
//! let report = worker.prepare(ScheduledTask::new("sync", "upload")).run_blocking();
//! assert_eq!(report.status, TerminalStatus::Success);
//! ```

mod execution;
mod state;

pub use execution::{CancelHandle, WorkerExecution};
pub use state::WorkerState;

use std::sync::Arc;
use std::time::Duration;

use crate::debug::DebugHook;
use crate::error::ExecutionError;
use crate::request::{Payload, TaskRequest};
use crate::runtime::RuntimeLauncher;
use crate::store::{CallbackConfiguration, ConfigStore};
use crate::sync::Outcome;
use execution::ConfigSource;

/// Status handed back to the host scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalStatus {
    Success,
    /// The host reschedules per the task's backoff policy.
    Retry,
    Failure,
}

impl TerminalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalStatus::Success => "success",
            TerminalStatus::Retry => "retry",
            TerminalStatus::Failure => "failure",
        }
    }
}

impl From<Outcome> for TerminalStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => TerminalStatus::Success,
            Outcome::Retry => TerminalStatus::Retry,
            Outcome::Failure => TerminalStatus::Failure,
        }
    }
}

/// Result of one execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub status: TerminalStatus,
    /// Error behind a non-success status, if any.
    pub cause: Option<ExecutionError>,
    pub elapsed: Duration,
    pub attempt: u32,
}

impl ExecutionReport {
    /// True when host cancellation decided the outcome.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.cause, Some(ExecutionError::Cancelled))
    }
}

/// Identity and arguments of a due task.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledTask {
    pub unique_name: String,
    pub task_name: String,
    pub tag: Option<String>,
    pub payload: Payload,
    /// 1-based attempt number.
    pub attempt: u32,
}

impl ScheduledTask {
    pub fn new(unique_name: impl Into<String>, task_name: impl Into<String>) -> Self {
        Self {
            unique_name: unique_name.into(),
            task_name: task_name.into(),
            tag: None,
            payload: Payload::default(),
            attempt: 1,
        }
    }

    /// First attempt of a scheduled request.
    pub fn from_request(request: &TaskRequest) -> Self {
        let base = request.base();
        Self {
            unique_name: base.unique_name.clone(),
            task_name: base.task_name.clone(),
            tag: base.tag.clone(),
            payload: base.payload.clone(),
            attempt: 1,
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    #[must_use]
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt.max(1);
        self
    }
}

/// Entry point the host scheduler calls for due tasks.
#[derive(Clone)]
pub struct Worker {
    store: Arc<dyn ConfigStore>,
    launcher: Arc<dyn RuntimeLauncher>,
    hook: DebugHook,
}

impl Worker {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        launcher: Arc<dyn RuntimeLauncher>,
        hook: DebugHook,
    ) -> Self {
        Self {
            store,
            launcher,
            hook,
        }
    }

    pub fn hook(&self) -> &DebugHook {
        &self.hook
    }

    /// Prepares an execution that reads the configuration store when it runs.
    pub fn prepare(&self, task: ScheduledTask) -> WorkerExecution {
        WorkerExecution::new(
            task,
            ConfigSource::Store(Arc::clone(&self.store)),
            Arc::clone(&self.launcher),
            self.hook.clone(),
        )
    }

    /// Prepares an execution against a configuration snapshot taken by the host.
    pub fn prepare_with_snapshot(
        &self,
        task: ScheduledTask,
        snapshot: Option<CallbackConfiguration>,
    ) -> WorkerExecution {
        WorkerExecution::new(
            task,
            ConfigSource::Snapshot(snapshot),
            Arc::clone(&self.launcher),
            self.hook.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug::TaskStatus;
    use crate::debug::tests::Recorder;
    use crate::error::CallbackError;
    use crate::request::PayloadValue;
    use crate::runtime::{
        CallbackRuntime, EntryFn, EntryPointRegistry, Invocation, IsolateLauncher, Settlement,
    };
    use crate::store::MemoryConfigStore;
    use crate::sync::Resolver;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    struct Fixture {
        launcher: Arc<IsolateLauncher>,
        store: Arc<MemoryConfigStore>,
        recorder: Arc<Recorder>,
        worker: Worker,
        handle: i64,
        seen: Arc<Mutex<Vec<Invocation>>>,
    }

    fn fixture() -> Fixture {
        let registry = EntryPointRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let handle = registry.register(EntryFn::arc(move |inv: Invocation| {
            log.lock().push(inv.clone());
            async move {
                match inv.task_name.as_str() {
                    "upload" => Ok(true),
                    "later" => Ok(false),
                    "broken" => Err(CallbackError::Failed("disk full".into())),
                    _ => {
                        inv.cancel.cancelled().await;
                        Ok(true)
                    }
                }
            }
        }));

        let launcher = Arc::new(IsolateLauncher::new(registry));
        let store = Arc::new(MemoryConfigStore::with(CallbackConfiguration::new(handle, false)));
        let recorder = Arc::new(Recorder::default());
        let hook = DebugHook::new();
        hook.set(recorder.clone());
        let worker = Worker::new(store.clone(), launcher.clone(), hook);
        Fixture {
            launcher,
            store,
            recorder,
            worker,
            handle,
            seen,
        }
    }

    #[test]
    fn success_reports_completed_with_result() {
        let fx = fixture();
        let report = fx.worker.prepare(ScheduledTask::new("sync", "upload")).run_blocking();

        assert_eq!(report.status, TerminalStatus::Success);
        assert!(report.cause.is_none());
        assert_eq!(
            fx.recorder.statuses(),
            vec![TaskStatus::Started, TaskStatus::Completed]
        );
        let statuses = fx.recorder.statuses.lock();
        let result = statuses[1].2.as_ref().unwrap();
        assert!(result.success);
        assert_eq!(fx.launcher.live_runtimes(), 0);
    }

    #[test]
    fn false_maps_to_retry_and_error_to_failure() {
        let fx = fixture();
        let retry = fx.worker.prepare(ScheduledTask::new("a", "later")).run_blocking();
        let fail = fx.worker.prepare(ScheduledTask::new("b", "broken")).run_blocking();

        assert_eq!(retry.status, TerminalStatus::Retry);
        assert_eq!(fail.status, TerminalStatus::Failure);
        assert_eq!(
            fail.cause,
            Some(ExecutionError::RuntimeInvocation {
                reason: "disk full".into(),
                retryable: false
            })
        );
        assert_eq!(
            fx.recorder.statuses(),
            vec![
                TaskStatus::Started,
                TaskStatus::Retrying,
                TaskStatus::Started,
                TaskStatus::Failed
            ]
        );
        assert_eq!(fx.recorder.errors.lock().len(), 1);
    }

    #[test]
    fn missing_configuration_fails_without_runtime() {
        let fx = fixture();
        fx.store.clear().unwrap();

        let report = fx.worker.prepare(ScheduledTask::new("sync", "upload")).run_blocking();

        assert_eq!(report.status, TerminalStatus::Failure);
        assert_eq!(report.cause, Some(ExecutionError::NotInitialized));
        assert_eq!(fx.launcher.acquired_runtimes(), 0);
        assert_eq!(fx.recorder.errors.lock().as_slice(), &[ExecutionError::NotInitialized]);
    }

    #[test]
    fn stale_handle_fails_and_tears_down() {
        let fx = fixture();
        let stale = fx.handle + 7;
        let report = fx
            .worker
            .prepare_with_snapshot(
                ScheduledTask::new("sync", "upload"),
                Some(CallbackConfiguration::new(stale, false)),
            )
            .run_blocking();

        assert_eq!(report.cause, Some(ExecutionError::CallbackResolution { handle: stale }));
        assert_eq!(fx.launcher.acquired_runtimes(), 1);
        assert_eq!(fx.launcher.live_runtimes(), 0);
        assert!(fx.seen.lock().is_empty());
    }

    #[test]
    fn payload_reaches_the_callback_unchanged() {
        let fx = fixture();
        let payload = Payload::new()
            .with("count", 3.14f64)
            .with("flag", true)
            .with("tags", vec!["a".to_string(), "b".to_string()]);

        fx.worker
            .prepare(ScheduledTask::new("sync", "upload").with_payload(payload.clone()))
            .run_blocking();

        let seen = fx.seen.lock();
        assert_eq!(seen[0].payload, payload);
        assert_eq!(seen[0].payload.get("count"), Some(&PayloadValue::Double(3.14)));
    }

    #[test]
    fn cancellation_unblocks_a_silent_runtime() {
        let fx = fixture();
        let exec = fx.worker.prepare(ScheduledTask::new("sync", "hang"));
        let cancel = exec.cancel_handle();
        let runner = thread::spawn(move || exec.run_blocking());

        thread::sleep(Duration::from_millis(50));
        assert!(cancel.cancel());
        let report = runner.join().unwrap();

        assert_eq!(report.status, TerminalStatus::Failure);
        assert!(report.is_cancelled());
        assert!(cancel.is_terminated());
        assert!(!cancel.cancel());
        assert_eq!(fx.launcher.live_runtimes(), 0);
        assert_eq!(
            fx.recorder.statuses(),
            vec![TaskStatus::Started, TaskStatus::Cancelled]
        );
        assert!(fx.recorder.errors.lock().is_empty());
    }

    #[test]
    fn cancellation_before_run_skips_the_runtime() {
        let fx = fixture();
        let exec = fx.worker.prepare(ScheduledTask::new("sync", "upload"));
        assert!(exec.cancel_handle().cancel());

        let report = exec.run_blocking();
        assert!(report.is_cancelled());
        assert_eq!(fx.launcher.acquired_runtimes(), 0);
    }

    #[test]
    fn cancellation_racing_completion_yields_one_status() {
        let fx = fixture();
        for i in 0..20 {
            let exec = fx.worker.prepare(ScheduledTask::new(format!("race-{i}"), "upload"));
            let cancel = exec.cancel_handle();
            let canceller = thread::spawn(move || cancel.cancel());
            let report = exec.run_blocking();
            let cancel_won = canceller.join().unwrap();

            assert_eq!(cancel_won, report.is_cancelled());
            let expected = if cancel_won {
                TerminalStatus::Failure
            } else {
                TerminalStatus::Success
            };
            assert_eq!(report.status, expected);
        }
        assert_eq!(fx.launcher.live_runtimes(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn async_run_matches_blocking_run() {
        let fx = fixture();
        let report = fx.worker.prepare(ScheduledTask::new("sync", "upload")).run().await;
        assert_eq!(report.status, TerminalStatus::Success);
        assert_eq!(fx.launcher.live_runtimes(), 0);
    }

    /// Launcher counting acquire/teardown pairs, with a runtime that never answers.
    #[derive(Default)]
    struct CountingLauncher {
        acquired: AtomicUsize,
        torn_down: Arc<AtomicUsize>,
        fail_bind: bool,
    }

    struct SilentRuntime {
        torn_down: Arc<AtomicUsize>,
        done: bool,
        fail_bind: bool,
        pending: Option<Resolver<Settlement>>,
    }

    impl RuntimeLauncher for CountingLauncher {
        fn acquire(&self, _label: &str) -> Result<Box<dyn CallbackRuntime>, ExecutionError> {
            self.acquired.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(SilentRuntime {
                torn_down: Arc::clone(&self.torn_down),
                done: false,
                fail_bind: self.fail_bind,
                pending: None,
            }))
        }
    }

    impl CallbackRuntime for SilentRuntime {
        fn bind(&mut self, handle: i64) -> Result<(), ExecutionError> {
            if self.fail_bind {
                Err(ExecutionError::CallbackResolution { handle })
            } else {
                Ok(())
            }
        }

        fn invoke(&mut self, _invocation: Invocation, reply: Resolver<Settlement>) {
            self.pending = Some(reply);
        }

        fn teardown(&mut self) {
            if !self.done {
                self.done = true;
                self.torn_down.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn every_acquired_runtime_is_torn_down_once() {
        for fail_bind in [false, true] {
            let launcher = Arc::new(CountingLauncher {
                fail_bind,
                ..Default::default()
            });
            let worker = Worker::new(
                Arc::new(MemoryConfigStore::with(CallbackConfiguration::new(1, false))),
                launcher.clone(),
                DebugHook::new(),
            );

            let exec = worker.prepare(ScheduledTask::new("u", "t"));
            let cancel = exec.cancel_handle();
            let runner = thread::spawn(move || exec.run_blocking());
            thread::sleep(Duration::from_millis(20));
            cancel.cancel();
            runner.join().unwrap();

            assert_eq!(launcher.acquired.load(Ordering::SeqCst), 1);
            assert_eq!(launcher.torn_down.load(Ordering::SeqCst), 1);
        }
    }
}
