//! # Caller-facing bridge.
//!
//! [`TaskBridge`] is what application code talks to. It persists the
//! callback configuration, validates and normalizes requests, and forwards
//! them to a [`PlatformScheduler`].
//!
//! ```text
//! RawCall ──► Extractor ──► BridgeCall ─┐
//!                                       ▼
//! typed API ───────────────────► TaskBridge ──► ConfigStore  (initialize)
//!                                       │
//!                                       ├─► validate ─► normalize ─► initialized?
//!                                       │        ─► keep & already scheduled? (no-op)
//!                                       │        ─► PlatformScheduler::enqueue ─► Scheduled
//!                                       └─► cancel / query / describe
//! ```
//!
//! ## Rules
//! - Registration errors are returned synchronously and never enqueue anything.
//! - Registering before [`initialize`](TaskBridge::initialize) fails with
//!   [`BridgeError::NotInitialized`].
//! - A request with a "keep" policy whose unique name is already scheduled
//!   never reaches the scheduler.
//!
//! # Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use taskbridge::{
//!     BridgeConfig, DebugHook, EntryFn, EntryPointRegistry, Invocation, IsolateLauncher,
//!     MemoryConfigStore, OneOffTask, TaskBase, TaskBridge,
//! };
//!
//! #[tokio::main(flavor = "multi_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = EntryPointRegistry::new();
//!     let handle = registry.register(EntryFn::arc(|inv: Invocation| async move {
//!         println!("running {}", inv.task_name);
//!         Ok(true)
//!     }));
//!
//!     let bridge = TaskBridge::local(
//!         BridgeConfig::default(),
//!         Arc::new(MemoryConfigStore::new()),
//!         Arc::new(IsolateLauncher::new(registry)),
//!         DebugHook::new(),
//!         tokio::runtime::Handle::current(),
//!     );
//!     bridge.initialize(handle, false)?;
//!     let task = TaskBase::new("sync", "upload").with_initial_delay(Duration::from_secs(60));
//!     bridge.register_one_off_task(OneOffTask::new(task))?;
//!     assert!(bridge.is_scheduled("sync")?);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::config::BridgeConfig;
use crate::debug::{DebugHook, TaskDebugInfo, TaskStatus};
use crate::error::{BridgeError, SchedulingError};
use crate::platform::{LocalScheduler, PlatformScheduler, ScheduledState};
use crate::request::{
    BridgeCall, Extractor, OneOffTask, PeriodicTask, ProcessingTask, RawCall, TaskRequest,
};
use crate::runtime::RuntimeLauncher;
use crate::store::{CallbackConfiguration, ConfigStore};
use crate::worker::Worker;

/// Reply to a [`RawCall`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallReply {
    /// The call succeeded and has nothing to return.
    None,
    Bool(bool),
    Text(String),
}

/// Caller-facing facade over a configuration store and a host scheduler.
pub struct TaskBridge {
    store: Arc<dyn ConfigStore>,
    scheduler: Arc<dyn PlatformScheduler>,
    hook: DebugHook,
    extractor: Extractor,
    init: Mutex<()>,
}

impl TaskBridge {
    /// Creates a bridge over an existing scheduler, using default platform limits.
    pub fn new(
        store: Arc<dyn ConfigStore>,
        scheduler: Arc<dyn PlatformScheduler>,
        hook: DebugHook,
    ) -> Self {
        Self {
            store,
            scheduler,
            hook,
            extractor: Extractor::default(),
            init: Mutex::new(()),
        }
    }

    /// Wires a bridge to an in-process [`LocalScheduler`] running on `runtime`.
    pub fn local(
        config: BridgeConfig,
        store: Arc<dyn ConfigStore>,
        launcher: Arc<dyn RuntimeLauncher>,
        hook: DebugHook,
        runtime: Handle,
    ) -> Self {
        let limits = config.limits;
        let worker = Worker::new(Arc::clone(&store), launcher, hook.clone());
        let scheduler = LocalScheduler::new(config, worker, runtime);
        Self::new(store, Arc::new(scheduler), hook).with_extractor(Extractor::new(limits))
    }

    #[must_use]
    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn hook(&self) -> &DebugHook {
        &self.hook
    }

    pub fn scheduler(&self) -> &Arc<dyn PlatformScheduler> {
        &self.scheduler
    }

    /// Persists the callback configuration. Re-initialization overwrites it.
    pub fn initialize(&self, callback_handle: i64, debug_enabled: bool) -> Result<(), BridgeError> {
        let _writer = self.init.lock();
        self.store
            .save(&CallbackConfiguration::new(callback_handle, debug_enabled))?;
        info!(callback_handle, debug_enabled, "task bridge initialized");
        Ok(())
    }

    pub fn callback_configuration(&self) -> Result<Option<CallbackConfiguration>, BridgeError> {
        Ok(self.store.load()?)
    }

    pub fn register_one_off_task(&self, task: OneOffTask) -> Result<(), BridgeError> {
        self.register(task.into())
    }

    pub fn register_periodic_task(&self, task: PeriodicTask) -> Result<(), BridgeError> {
        self.register(task.into())
    }

    pub fn register_processing_task(&self, task: ProcessingTask) -> Result<(), BridgeError> {
        self.register(task.into())
    }

    /// Validates, normalizes and enqueues a request.
    pub fn register(&self, request: TaskRequest) -> Result<(), BridgeError> {
        request.validate()?;
        let request = request.normalized(self.extractor.limits());
        let config = self.store.load()?.ok_or(BridgeError::NotInitialized)?;
        let name = request.unique_name();

        if request.keeps_existing() && self.scheduled_state(name)? {
            debug!(task = %name, "already scheduled, keeping existing work");
            return Ok(());
        }

        self.scheduler.enqueue(&request)?;
        info!(task = %name, kind = request.kind().as_str(), "task scheduled");

        let base = request.base();
        let info = TaskDebugInfo::new(&base.unique_name, &base.task_name)
            .with_tag(base.tag.clone())
            .with_payload(base.payload.clone())
            .with_callback_handle(config.callback_handle);
        self.hook
            .emitter(config.debug_enabled)
            .status(&info, TaskStatus::Scheduled, None);
        Ok(())
    }

    pub fn cancel_by_unique_name(&self, unique_name: &str) -> Result<(), BridgeError> {
        self.scheduler.cancel_by_unique_name(unique_name)?;
        info!(task = %unique_name, "task cancelled");
        Ok(())
    }

    pub fn cancel_by_tag(&self, tag: &str) -> Result<(), BridgeError> {
        self.scheduler.cancel_by_tag(tag)?;
        info!(tag, "tasks cancelled by tag");
        Ok(())
    }

    pub fn cancel_all(&self) -> Result<(), BridgeError> {
        self.scheduler.cancel_all()?;
        info!("all tasks cancelled");
        Ok(())
    }

    pub fn is_scheduled(&self, unique_name: &str) -> Result<bool, BridgeError> {
        Ok(self.scheduled_state(unique_name)?)
    }

    pub fn describe_scheduled(&self) -> String {
        self.scheduler.describe_scheduled()
    }

    /// Dispatches a raw call by method name.
    pub fn handle_call(&self, call: &RawCall) -> Result<CallReply, BridgeError> {
        match self.extractor.extract(call)? {
            BridgeCall::Initialize(cfg) => self
                .initialize(cfg.callback_handle, cfg.debug_enabled)
                .map(|()| CallReply::None),
            BridgeCall::Register(request) => self.register(request).map(|()| CallReply::None),
            BridgeCall::CancelByUniqueName(name) => self
                .cancel_by_unique_name(&name)
                .map(|()| CallReply::None),
            BridgeCall::CancelByTag(tag) => self.cancel_by_tag(&tag).map(|()| CallReply::None),
            BridgeCall::CancelAll => self.cancel_all().map(|()| CallReply::None),
            BridgeCall::IsScheduled(name) => self.is_scheduled(&name).map(CallReply::Bool),
            BridgeCall::PrintScheduled => {
                let listing = self.describe_scheduled();
                info!(%listing, "scheduled tasks");
                Ok(CallReply::Text(listing))
            }
        }
    }

    fn scheduled_state(&self, unique_name: &str) -> Result<bool, SchedulingError> {
        match self.scheduler.query_scheduled_state(unique_name) {
            ScheduledState::Scheduled => Ok(true),
            ScheduledState::NotScheduled => Ok(false),
            ScheduledState::Error(reason) => Err(SchedulingError::QueryFailed { reason }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug::tests::Recorder;
    use crate::error::ValidationError;
    use crate::request::{ExistingWorkPolicy, RawValue, TaskBase};
    use crate::store::MemoryConfigStore;
    use std::collections::HashSet;
    use std::time::Duration;

    /// Scheduler double recording every call.
    #[derive(Default)]
    struct FakeScheduler {
        enqueued: Mutex<Vec<TaskRequest>>,
        scheduled: Mutex<HashSet<String>>,
        cancelled: Mutex<Vec<String>>,
        broken: bool,
    }

    impl PlatformScheduler for FakeScheduler {
        fn enqueue_one_off(&self, task: &OneOffTask) -> Result<(), SchedulingError> {
            self.enqueue(&TaskRequest::OneOff(task.clone()))
        }

        fn enqueue_periodic(&self, task: &PeriodicTask) -> Result<(), SchedulingError> {
            self.enqueue(&TaskRequest::Periodic(task.clone()))
        }

        fn enqueue_processing(&self, _: &ProcessingTask) -> Result<(), SchedulingError> {
            Err(SchedulingError::Unsupported {
                operation: "processing tasks",
                platform: "fake",
            })
        }

        fn enqueue(&self, request: &TaskRequest) -> Result<(), SchedulingError> {
            if let TaskRequest::Processing(task) = request {
                return self.enqueue_processing(task);
            }
            self.scheduled
                .lock()
                .insert(request.unique_name().to_string());
            self.enqueued.lock().push(request.clone());
            Ok(())
        }

        fn cancel_by_unique_name(&self, unique_name: &str) -> Result<(), SchedulingError> {
            self.scheduled.lock().remove(unique_name);
            self.cancelled.lock().push(unique_name.to_string());
            Ok(())
        }

        fn cancel_by_tag(&self, tag: &str) -> Result<(), SchedulingError> {
            self.cancelled.lock().push(format!("tag:{tag}"));
            Ok(())
        }

        fn cancel_all(&self) -> Result<(), SchedulingError> {
            self.scheduled.lock().clear();
            Ok(())
        }

        fn query_scheduled_state(&self, unique_name: &str) -> ScheduledState {
            if self.broken {
                return ScheduledState::Error("host unavailable".into());
            }
            if self.scheduled.lock().contains(unique_name) {
                ScheduledState::Scheduled
            } else {
                ScheduledState::NotScheduled
            }
        }

        fn describe_scheduled(&self) -> String {
            let mut names: Vec<String> = self.scheduled.lock().iter().cloned().collect();
            names.sort();
            names.join("\n")
        }
    }

    fn bridge(scheduler: Arc<FakeScheduler>) -> (TaskBridge, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let hook = DebugHook::new();
        hook.set(recorder.clone());
        let bridge = TaskBridge::new(Arc::new(MemoryConfigStore::new()), scheduler, hook);
        (bridge, recorder)
    }

    fn call(method: &str) -> RawCall {
        RawCall::new(method)
    }

    #[test]
    fn register_before_initialize_is_rejected() {
        let scheduler = Arc::new(FakeScheduler::default());
        let (bridge, _) = bridge(scheduler.clone());
        let err = bridge
            .register_one_off_task(OneOffTask::new(TaskBase::new("a", "t")))
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotInitialized));
        assert!(scheduler.enqueued.lock().is_empty());
    }

    #[test]
    fn keep_twice_enqueues_once() {
        let scheduler = Arc::new(FakeScheduler::default());
        let (bridge, recorder) = bridge(scheduler.clone());
        bridge.initialize(42, false).unwrap();

        let task = OneOffTask::new(TaskBase::new("sync", "upload"))
            .with_policy(ExistingWorkPolicy::Keep);
        bridge.register_one_off_task(task.clone()).unwrap();
        bridge.register_one_off_task(task).unwrap();

        assert_eq!(scheduler.enqueued.lock().len(), 1);
        assert_eq!(recorder.statuses(), vec![TaskStatus::Scheduled]);
    }

    #[test]
    fn replace_always_reaches_the_scheduler() {
        let scheduler = Arc::new(FakeScheduler::default());
        let (bridge, _) = bridge(scheduler.clone());
        bridge.initialize(1, false).unwrap();

        let task = OneOffTask::new(TaskBase::new("sync", "upload"))
            .with_policy(ExistingWorkPolicy::Replace);
        bridge.register_one_off_task(task.clone()).unwrap();
        bridge.register_one_off_task(task).unwrap();
        assert_eq!(scheduler.enqueued.lock().len(), 2);
    }

    #[test]
    fn registration_normalizes_requests() {
        let scheduler = Arc::new(FakeScheduler::default());
        let (bridge, _) = bridge(scheduler.clone());
        bridge.initialize(1, false).unwrap();

        let task = PeriodicTask::new(TaskBase::new("p", "t"), Duration::from_secs(60));
        bridge.register_periodic_task(task).unwrap();

        let enqueued = scheduler.enqueued.lock();
        let TaskRequest::Periodic(p) = &enqueued[0] else {
            panic!("expected periodic request");
        };
        assert_eq!(p.frequency, Duration::from_secs(15 * 60));
    }

    #[test]
    fn invalid_requests_never_enqueue() {
        let scheduler = Arc::new(FakeScheduler::default());
        let (bridge, _) = bridge(scheduler.clone());
        bridge.initialize(1, false).unwrap();

        let err = bridge
            .register_one_off_task(OneOffTask::new(TaskBase::new("", "t")))
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Validation(ValidationError::EmptyField { .. })
        ));
        assert!(scheduler.enqueued.lock().is_empty());
    }

    #[test]
    fn unsupported_capability_is_distinguishable() {
        let scheduler = Arc::new(FakeScheduler::default());
        let (bridge, recorder) = bridge(scheduler);
        bridge.initialize(1, false).unwrap();

        let err = bridge
            .register_processing_task(ProcessingTask::new(TaskBase::new("p", "t")))
            .unwrap_err();
        assert!(err.is_unsupported());
        assert!(recorder.statuses().is_empty());
    }

    #[test]
    fn query_errors_surface_as_scheduling_errors() {
        let scheduler = Arc::new(FakeScheduler {
            broken: true,
            ..Default::default()
        });
        let (bridge, _) = bridge(scheduler);
        let err = bridge.is_scheduled("x").unwrap_err();
        assert_eq!(err.as_label(), "scheduling_query_failed");
    }

    #[test]
    fn handle_call_dispatches_every_method() {
        let scheduler = Arc::new(FakeScheduler::default());
        let (bridge, _) = bridge(scheduler.clone());

        let init = call("initialize")
            .with_arg("callbackHandle", 9i64)
            .with_arg("isInDebugMode", true);
        assert_eq!(bridge.handle_call(&init).unwrap(), CallReply::None);
        assert_eq!(
            bridge.callback_configuration().unwrap(),
            Some(CallbackConfiguration::new(9, true))
        );

        let register = call("registerOneOffTask")
            .with_arg("uniqueName", "sync")
            .with_arg("taskName", "upload")
            .with_arg("tag", "net");
        bridge.handle_call(&register).unwrap();

        let query = call("isScheduledByUniqueName").with_arg("uniqueName", "sync");
        assert_eq!(bridge.handle_call(&query).unwrap(), CallReply::Bool(true));
        assert_eq!(
            bridge.handle_call(&call("printScheduledTasks")).unwrap(),
            CallReply::Text("sync".into())
        );

        bridge
            .handle_call(&call("cancelTaskByTag").with_arg("tag", "net"))
            .unwrap();
        bridge
            .handle_call(&call("cancelTaskByUniqueName").with_arg("uniqueName", "sync"))
            .unwrap();
        bridge.handle_call(&call("cancelAllTasks")).unwrap();
        assert_eq!(
            *scheduler.cancelled.lock(),
            vec!["tag:net".to_string(), "sync".to_string()]
        );
        assert_eq!(bridge.handle_call(&query).unwrap(), CallReply::Bool(false));
    }

    #[test]
    fn handle_call_rejects_unknown_methods_and_bad_args() {
        let scheduler = Arc::new(FakeScheduler::default());
        let (bridge, _) = bridge(scheduler);

        let err = bridge.handle_call(&call("launchRockets")).unwrap_err();
        assert_eq!(err.as_label(), "validation_unknown_method");

        let bad = call("initialize").with_arg("callbackHandle", RawValue::from("nope"));
        let err = bridge.handle_call(&bad).unwrap_err();
        assert_eq!(err.as_label(), "validation_invalid_field");
    }
}
