//! # In-process host scheduler.
//!
//! [`LocalScheduler`] implements [`PlatformScheduler`] on top of a `tokio`
//! runtime. Each unique name owns a slot driven by one actor task; due
//! executions go through the [`Worker`] on blocking threads.
//!
//! ```text
//! enqueue ──► capability check ──► Admission ──► slots[unique_name]
//!                                                   │
//!                                                   ▼
//!                                     actor (delay, constraints, permit)
//!                                                   │
//!                                                   ▼
//!                              spawn_blocking(Worker execution) ──► report
//!                                                   │
//!                      Retry ──► backoff ───────────┤
//!                      Periodic ──► Rescheduled ────┘
//! ```
//!
//! ## Rules
//! - At most `max_scheduled` slots exist at once; appended requests share their slot.
//! - At most `max_concurrent` executions run at once.
//! - Cancelling a slot cancels its pending waits and any running execution.
//! - After [`shutdown`](LocalScheduler::shutdown) every operation fails with `Closed`.

mod actor;
mod jitter;
mod probe;
mod retry;
mod slot;

pub use jitter::JitterPolicy;
pub use probe::{ConstraintProbe, DeviceProbe, DeviceSnapshot, Satisfied};
pub use retry::RetryBackoff;

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::BridgeConfig;
use crate::error::SchedulingError;
use crate::platform::local::actor::RunEnd;
use crate::platform::local::slot::{Admission, Queued, Slot, SlotPhase};
use crate::platform::{PlatformScheduler, ScheduledState};
use crate::request::{OneOffTask, PeriodicTask, ProcessingTask, TaskRequest};
use crate::worker::Worker;

pub(crate) struct Inner {
    config: BridgeConfig,
    worker: Worker,
    probe: Arc<dyn ConstraintProbe>,
    permits: Option<Arc<Semaphore>>,
    slots: Mutex<HashMap<String, Slot>>,
    root: CancellationToken,
    generation: AtomicU64,
}

impl Inner {
    fn current(&self, name: &str, generation: u64) -> Option<TaskRequest> {
        self.slots
            .lock()
            .get(name)
            .filter(|slot| slot.generation == generation)
            .map(|slot| slot.current.clone())
    }

    fn set_phase(&self, name: &str, generation: u64, phase: SlotPhase) {
        if let Some(slot) = self.slots.lock().get_mut(name) {
            if slot.generation == generation {
                slot.phase = phase;
            }
        }
    }

    fn note_run(&self, name: &str, generation: u64) {
        if let Some(slot) = self.slots.lock().get_mut(name) {
            if slot.generation == generation {
                slot.runs += 1;
            }
        }
    }

    /// Moves a finished chain link to the next queued request, or removes the slot.
    fn advance(&self, name: &str, generation: u64, end: RunEnd) -> Option<TaskRequest> {
        let mut slots = self.slots.lock();
        let slot = slots.get_mut(name).filter(|s| s.generation == generation)?;
        slot.runs += 1;

        let mut failed = end == RunEnd::Failed;
        while let Some(Queued {
            request,
            requires_success,
        }) = slot.queue.pop_front()
        {
            if failed && requires_success {
                debug!(task = %name, "appended request dropped after predecessor failure");
                continue;
            }
            failed = false;
            slot.current = request.clone();
            slot.phase = SlotPhase::Pending;
            return Some(request);
        }

        slots.remove(name);
        debug!(task = %name, outcome = ?end, "slot finished");
        None
    }
}

/// In-process [`PlatformScheduler`]. Clones share the same slots.
#[derive(Clone)]
pub struct LocalScheduler {
    inner: Arc<Inner>,
    runtime: Handle,
}

impl LocalScheduler {
    /// Creates a scheduler whose constraints are always satisfied.
    pub fn new(config: BridgeConfig, worker: Worker, runtime: Handle) -> Self {
        Self::with_probe(config, worker, runtime, Arc::new(Satisfied))
    }

    pub fn with_probe(
        config: BridgeConfig,
        worker: Worker,
        runtime: Handle,
        probe: Arc<dyn ConstraintProbe>,
    ) -> Self {
        let permits = config
            .concurrency_limit()
            .map(|n| Arc::new(Semaphore::new(n)));
        Self {
            inner: Arc::new(Inner {
                config,
                worker,
                probe,
                permits,
                slots: Mutex::new(HashMap::new()),
                root: CancellationToken::new(),
                generation: AtomicU64::new(0),
            }),
            runtime,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn worker(&self) -> &Worker {
        &self.inner.worker
    }

    /// Number of scheduled entries (slots).
    pub fn scheduled_count(&self) -> usize {
        self.inner.slots.lock().len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.root.is_cancelled()
    }

    /// Cancels every slot and refuses further operations.
    pub fn shutdown(&self) {
        self.inner.root.cancel();
        if let Some(permits) = &self.inner.permits {
            permits.close();
        }
        let drained = self.inner.slots.lock().drain().count();
        info!(drained, "local scheduler shut down");
    }

    fn ensure_open(&self) -> Result<(), SchedulingError> {
        if self.is_closed() {
            return Err(SchedulingError::Closed);
        }
        Ok(())
    }

    /// Drops hints the platform does not honor.
    fn adapt(&self, mut request: TaskRequest) -> TaskRequest {
        let profile = self.inner.config.profile;
        if let TaskRequest::Periodic(task) = &mut request {
            if !profile.honors_flex() && task.flex_interval.take().is_some() {
                debug!(task = %task.base.unique_name, platform = profile.as_str(), "flex interval ignored");
            }
        }
        if !profile.honors_expedited() {
            let base = request.base_mut();
            if base.expedited.take().is_some() {
                debug!(task = %base.unique_name, platform = profile.as_str(), "expedited hint ignored");
            }
        }
        request
    }

    fn admit(&self, request: TaskRequest) -> Result<(), SchedulingError> {
        self.ensure_open()?;
        let request = self.adapt(request);
        let name = request.unique_name().to_string();

        let mut slots = self.inner.slots.lock();
        let admission = Admission::decide(&request, slots.get(&name))?;
        debug!(task = %name, kind = request.kind().as_str(), admission = admission.as_str(), "enqueue");

        match admission {
            Admission::Keep => Ok(()),
            Admission::Update => {
                if let Some(slot) = slots.get_mut(&name) {
                    slot.current = request;
                }
                Ok(())
            }
            Admission::Append { requires_success } => {
                if let Some(slot) = slots.get_mut(&name) {
                    slot.queue.push_back(Queued {
                        request,
                        requires_success,
                    });
                }
                Ok(())
            }
            Admission::Replace => {
                if let Some(old) = slots.remove(&name) {
                    old.token.cancel();
                }
                self.start(&mut slots, name, request);
                Ok(())
            }
            Admission::Start => {
                if let Some(limit) = self.inner.config.scheduled_limit() {
                    if slots.len() >= limit {
                        return Err(SchedulingError::QuotaExceeded { limit });
                    }
                }
                self.start(&mut slots, name, request);
                Ok(())
            }
        }
    }

    fn start(&self, slots: &mut HashMap<String, Slot>, name: String, request: TaskRequest) {
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let token = self.inner.root.child_token();
        slots.insert(
            name.clone(),
            Slot::new(generation, token.clone(), request),
        );
        self.runtime.spawn(actor::drive(
            Arc::clone(&self.inner),
            name,
            generation,
            token,
        ));
    }
}

impl PlatformScheduler for LocalScheduler {
    fn enqueue_one_off(&self, task: &OneOffTask) -> Result<(), SchedulingError> {
        self.admit(TaskRequest::OneOff(task.clone()))
    }

    fn enqueue_periodic(&self, task: &PeriodicTask) -> Result<(), SchedulingError> {
        self.admit(TaskRequest::Periodic(task.clone()))
    }

    fn enqueue_processing(&self, task: &ProcessingTask) -> Result<(), SchedulingError> {
        let profile = self.inner.config.profile;
        if !profile.supports_processing() {
            return Err(SchedulingError::Unsupported {
                operation: "processing tasks",
                platform: profile.as_str(),
            });
        }
        self.admit(TaskRequest::Processing(task.clone()))
    }

    fn cancel_by_unique_name(&self, unique_name: &str) -> Result<(), SchedulingError> {
        self.ensure_open()?;
        if let Some(slot) = self.inner.slots.lock().remove(unique_name) {
            slot.token.cancel();
            debug!(task = %unique_name, "cancelled");
        }
        Ok(())
    }

    fn cancel_by_tag(&self, tag: &str) -> Result<(), SchedulingError> {
        self.ensure_open()?;
        let profile = self.inner.config.profile;
        if !profile.supports_cancel_by_tag() {
            return Err(SchedulingError::Unsupported {
                operation: "cancel by tag",
                platform: profile.as_str(),
            });
        }

        let mut slots = self.inner.slots.lock();
        let mut cancelled = 0usize;
        slots.retain(|_, slot| {
            if slot.has_tag(tag) {
                slot.token.cancel();
                cancelled += 1;
                return false;
            }
            slot.queue.retain(|q| q.request.tag() != Some(tag));
            true
        });
        debug!(tag, cancelled, "cancelled by tag");
        Ok(())
    }

    fn cancel_all(&self) -> Result<(), SchedulingError> {
        self.ensure_open()?;
        let mut slots = self.inner.slots.lock();
        for slot in slots.values() {
            slot.token.cancel();
        }
        let cancelled = slots.len();
        slots.clear();
        debug!(cancelled, "cancelled all");
        Ok(())
    }

    fn query_scheduled_state(&self, unique_name: &str) -> ScheduledState {
        if self.is_closed() {
            return ScheduledState::Error(SchedulingError::Closed.to_string());
        }
        if self.inner.slots.lock().contains_key(unique_name) {
            ScheduledState::Scheduled
        } else {
            ScheduledState::NotScheduled
        }
    }

    fn describe_scheduled(&self) -> String {
        let slots = self.inner.slots.lock();
        if slots.is_empty() {
            return "no scheduled tasks".to_string();
        }
        let mut names: Vec<&String> = slots.keys().collect();
        names.sort();

        let mut out = String::new();
        for name in names {
            let slot = &slots[name];
            let _ = writeln!(
                out,
                "{name} kind={} task={} tag={} phase={} runs={} queued={}",
                slot.current.kind().as_str(),
                slot.current.task_name(),
                slot.current.tag().unwrap_or("-"),
                slot.phase.as_str(),
                slot.runs,
                slot.queue.len(),
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PlatformLimits, PlatformProfile};
    use crate::debug::TaskStatus;
    use crate::debug::tests::Recorder;
    use crate::error::CallbackError;
    use crate::request::{
        BackoffConfig, BackoffKind, Constraints, ExistingPeriodicPolicy, ExistingWorkPolicy,
        ExpeditedPolicy, Payload, PayloadValue, TaskBase,
    };
    use crate::runtime::{EntryFn, EntryPointRegistry, Invocation, IsolateLauncher};
    use crate::debug::DebugHook;
    use crate::store::{CallbackConfiguration, ConfigStore, MemoryConfigStore};
    use std::time::Duration;

    struct Fixture {
        scheduler: LocalScheduler,
        launcher: Arc<IsolateLauncher>,
        recorder: Arc<Recorder>,
        runs: Arc<Mutex<Vec<(String, u32, Payload)>>>,
    }

    fn fast_limits() -> PlatformLimits {
        PlatformLimits {
            min_backoff: Duration::from_millis(5),
            default_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(50),
            min_periodic_interval: Duration::from_millis(20),
            min_flex_interval: Duration::from_millis(5),
        }
    }

    fn fast_config(profile: PlatformProfile) -> BridgeConfig {
        let mut cfg = BridgeConfig::for_profile(profile);
        cfg.limits = fast_limits();
        cfg.constraint_recheck = Duration::from_millis(5);
        cfg
    }

    fn fixture_with(cfg: BridgeConfig, probe: Arc<dyn ConstraintProbe>) -> Fixture {
        let registry = EntryPointRegistry::new();
        let runs = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&runs);
        let handle = registry.register(EntryFn::arc(move |inv: Invocation| {
            let log = Arc::clone(&log);
            async move {
                log.lock()
                    .push((inv.task_name.clone(), inv.attempt, inv.payload.clone()));
                match inv.task_name.as_str() {
                    "ok" => Ok(true),
                    "flaky" => Ok(inv.attempt >= 3),
                    "retry" => Err(CallbackError::Retry("busy".into())),
                    "fail" => Err(CallbackError::Failed("boom".into())),
                    _ => {
                        inv.cancel.cancelled().await;
                        Ok(true)
                    }
                }
            }
        }));

        let store = Arc::new(MemoryConfigStore::new());
        store
            .save(&CallbackConfiguration::new(handle, false))
            .unwrap();
        let launcher = Arc::new(IsolateLauncher::new(registry));
        let recorder = Arc::new(Recorder::default());
        let hook = DebugHook::new();
        hook.set(recorder.clone());
        let worker = Worker::new(store, launcher.clone(), hook);

        Fixture {
            scheduler: LocalScheduler::with_probe(cfg, worker, Handle::current(), probe),
            launcher,
            recorder,
            runs,
        }
    }

    fn fixture(profile: PlatformProfile) -> Fixture {
        fixture_with(fast_config(profile), Arc::new(Satisfied))
    }

    fn one_off(name: &str, task: &str) -> OneOffTask {
        OneOffTask::new(TaskBase::new(name, task))
    }

    async fn eventually(mut check: impl FnMut() -> bool) {
        for _ in 0..400 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn one_off_runs_once_and_leaves() {
        let f = fixture(PlatformProfile::Android);
        let payload = Payload::new().with("n", PayloadValue::Int(7));
        let task = OneOffTask::new(TaskBase::new("a", "ok").with_payload(payload.clone()));
        f.scheduler.enqueue_one_off(&task).unwrap();
        assert!(f.scheduler.query_scheduled_state("a").is_scheduled());

        eventually(|| f.scheduler.scheduled_count() == 0).await;
        let runs = f.runs.lock().clone();
        assert_eq!(runs, vec![("ok".to_string(), 1, payload)]);
        assert_eq!(
            f.scheduler.query_scheduled_state("a"),
            ScheduledState::NotScheduled
        );
        eventually(|| f.launcher.live_runtimes() == 0).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn retries_with_backoff_until_success() {
        let f = fixture(PlatformProfile::Android);
        let task = OneOffTask::new(
            TaskBase::new("f", "flaky")
                .with_backoff(BackoffConfig::new(BackoffKind::Linear, Duration::from_millis(5))),
        );
        f.scheduler.enqueue_one_off(&task).unwrap();

        eventually(|| f.scheduler.scheduled_count() == 0).await;
        let attempts: Vec<u32> = f.runs.lock().iter().map(|r| r.1).collect();
        assert_eq!(attempts, vec![1, 2, 3]);
        let statuses = f.recorder.statuses();
        assert_eq!(
            statuses
                .iter()
                .filter(|s| **s == TaskStatus::Retrying)
                .count(),
            2
        );
        assert_eq!(statuses.last(), Some(&TaskStatus::Completed));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn attempt_limit_stops_retries() {
        let mut cfg = fast_config(PlatformProfile::Android);
        cfg.max_attempts = 2;
        let f = fixture_with(cfg, Arc::new(Satisfied));
        f.scheduler.enqueue_one_off(&one_off("r", "retry")).unwrap();

        eventually(|| f.scheduler.scheduled_count() == 0).await;
        assert_eq!(f.runs.lock().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn keep_ignores_and_replace_restarts() {
        let f = fixture(PlatformProfile::Android);
        f.scheduler.enqueue_one_off(&one_off("h", "hang")).unwrap();
        eventually(|| f.runs.lock().len() == 1).await;

        let keep = one_off("h", "ok").with_policy(ExistingWorkPolicy::Keep);
        f.scheduler.enqueue_one_off(&keep).unwrap();
        assert!(f.scheduler.describe_scheduled().contains("task=hang"));

        let replace = one_off("h", "ok").with_policy(ExistingWorkPolicy::Replace);
        f.scheduler.enqueue_one_off(&replace).unwrap();

        eventually(|| f.scheduler.scheduled_count() == 0).await;
        let names: Vec<String> = f.runs.lock().iter().map(|r| r.0.clone()).collect();
        assert_eq!(names, vec!["hang", "ok"]);
        eventually(|| {
            f.recorder
                .statuses()
                .contains(&TaskStatus::Cancelled)
        })
        .await;
        eventually(|| f.launcher.live_runtimes() == 0).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn append_runs_after_and_is_dropped_on_failure() {
        let f = fixture(PlatformProfile::Android);
        let mut first = one_off("c", "fail");
        first.base.initial_delay = Duration::from_millis(30);
        f.scheduler.enqueue_one_off(&first).unwrap();
        f.scheduler
            .enqueue_one_off(&one_off("c", "ok").with_policy(ExistingWorkPolicy::Append))
            .unwrap();
        f.scheduler
            .enqueue_one_off(&one_off("c", "ok").with_policy(ExistingWorkPolicy::AppendOrReplace))
            .unwrap();
        assert_eq!(f.scheduler.scheduled_count(), 1);

        eventually(|| f.scheduler.scheduled_count() == 0).await;
        let names: Vec<String> = f.runs.lock().iter().map(|r| r.0.clone()).collect();
        assert_eq!(names, vec!["fail", "ok"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn periodic_reschedules_and_update_swaps_request() {
        let f = fixture(PlatformProfile::Android);
        let task = PeriodicTask::new(TaskBase::new("p", "ok"), Duration::from_millis(20));
        f.scheduler.enqueue_periodic(&task).unwrap();

        eventually(|| {
            f.recorder
                .statuses()
                .iter()
                .filter(|s| **s == TaskStatus::Rescheduled)
                .count()
                >= 2
        })
        .await;

        let payload = Payload::new().with("v", PayloadValue::Int(2));
        let updated = PeriodicTask::new(
            TaskBase::new("p", "ok").with_payload(payload.clone()),
            Duration::from_millis(20),
        )
        .with_policy(ExistingPeriodicPolicy::Update);
        f.scheduler.enqueue_periodic(&updated).unwrap();

        eventually(|| f.runs.lock().iter().any(|r| r.2 == payload)).await;
        assert!(f.scheduler.query_scheduled_state("p").is_scheduled());

        f.scheduler.cancel_by_unique_name("p").unwrap();
        assert_eq!(f.scheduler.scheduled_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn quota_and_capabilities() {
        let mut cfg = fast_config(PlatformProfile::Apple);
        cfg.max_scheduled = 1;
        let f = fixture_with(cfg, Arc::new(Satisfied));

        f.scheduler.enqueue_one_off(&one_off("a", "hang")).unwrap();
        assert_eq!(
            f.scheduler.enqueue_one_off(&one_off("b", "ok")),
            Err(SchedulingError::QuotaExceeded { limit: 1 })
        );
        assert!(matches!(
            f.scheduler.cancel_by_tag("x"),
            Err(SchedulingError::Unsupported { .. })
        ));
        f.scheduler.cancel_all().unwrap();
        f.scheduler
            .enqueue_processing(&ProcessingTask::new(TaskBase::new("b", "ok")))
            .unwrap();
        f.scheduler.cancel_all().unwrap();

        let android = fixture(PlatformProfile::Android);
        assert!(matches!(
            android
                .scheduler
                .enqueue_processing(&ProcessingTask::new(TaskBase::new("b", "ok"))),
            Err(SchedulingError::Unsupported { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancel_by_tag_removes_tagged_slots() {
        let f = fixture(PlatformProfile::Android);
        let tagged = OneOffTask::new(TaskBase::new("a", "hang").with_tag("sync"));
        let other = OneOffTask::new(TaskBase::new("b", "hang").with_tag("upload"));
        f.scheduler.enqueue_one_off(&tagged).unwrap();
        f.scheduler.enqueue_one_off(&other).unwrap();

        f.scheduler.cancel_by_tag("sync").unwrap();
        assert_eq!(f.scheduler.query_scheduled_state("a"), ScheduledState::NotScheduled);
        assert!(f.scheduler.query_scheduled_state("b").is_scheduled());
        f.scheduler.cancel_all().unwrap();
        assert_eq!(f.scheduler.describe_scheduled(), "no scheduled tasks");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn constraints_hold_execution_until_met() {
        let probe = Arc::new(DeviceProbe::new(DeviceSnapshot {
            charging: false,
            ..Default::default()
        }));
        let f = fixture_with(fast_config(PlatformProfile::Android), probe.clone());
        let task = OneOffTask::new(
            TaskBase::new("c", "ok").with_constraints(Constraints::default().with_charging(true)),
        );
        f.scheduler.enqueue_one_off(&task).unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(f.runs.lock().is_empty());

        probe.update(|s| s.charging = true);
        eventually(|| f.scheduler.scheduled_count() == 0).await;
        assert_eq!(f.runs.lock().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn time_limit_stops_and_reschedules() {
        let mut cfg = fast_config(PlatformProfile::Android);
        cfg.execution_limit = Duration::from_millis(20);
        cfg.max_attempts = 2;
        let f = fixture_with(cfg, Arc::new(Satisfied));
        f.scheduler.enqueue_one_off(&one_off("t", "hang")).unwrap();

        eventually(|| f.scheduler.scheduled_count() == 0).await;
        assert_eq!(f.runs.lock().len(), 2);
        eventually(|| f.launcher.live_runtimes() == 0).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrency_limit_and_expedited_drop() {
        let mut cfg = fast_config(PlatformProfile::Android);
        cfg.max_concurrent = 1;
        let f = fixture_with(cfg, Arc::new(Satisfied));
        f.scheduler.enqueue_one_off(&one_off("busy", "hang")).unwrap();
        eventually(|| f.runs.lock().len() == 1).await;

        let dropped = OneOffTask::new(
            TaskBase::new("x", "ok").with_expedited(ExpeditedPolicy::Drop),
        );
        f.scheduler.enqueue_one_off(&dropped).unwrap();
        eventually(|| f.scheduler.query_scheduled_state("x") == ScheduledState::NotScheduled)
            .await;

        f.scheduler.enqueue_one_off(&one_off("queued", "ok")).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(f.runs.lock().len(), 1);

        f.scheduler.cancel_by_unique_name("busy").unwrap();
        eventually(|| f.scheduler.scheduled_count() == 0).await;
        let names: Vec<String> = f.runs.lock().iter().map(|r| r.0.clone()).collect();
        assert_eq!(names, vec!["hang", "ok"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_closes_the_scheduler() {
        let f = fixture(PlatformProfile::Android);
        f.scheduler.enqueue_one_off(&one_off("a", "hang")).unwrap();
        f.scheduler.shutdown();

        assert_eq!(
            f.scheduler.enqueue_one_off(&one_off("b", "ok")),
            Err(SchedulingError::Closed)
        );
        assert!(matches!(
            f.scheduler.query_scheduled_state("a"),
            ScheduledState::Error(_)
        ));
        eventually(|| f.launcher.live_runtimes() == 0).await;
    }

    #[tokio::test]
    async fn apple_strips_unsupported_hints() {
        let f = fixture(PlatformProfile::Apple);
        let task: TaskRequest = PeriodicTask::new(
            TaskBase::new("p", "ok").with_expedited(ExpeditedPolicy::Drop),
            Duration::from_secs(900),
        )
        .with_flex(Duration::from_secs(300))
        .into();

        let adapted = f.scheduler.adapt(task);
        let TaskRequest::Periodic(p) = adapted else {
            panic!("variant changed");
        };
        assert_eq!(p.flex_interval, None);
        assert_eq!(p.base.expedited, None);
    }
}
