//! # taskbridge
//!
//! **Taskbridge** schedules deferred background work through a host
//! scheduler and runs it, when due, inside an isolated callback runtime.
//!
//! Application code registers typed task requests; the host scheduler decides
//! when they are due; the worker boots a fresh runtime, hands the task to the
//! registered entry point and waits for exactly one outcome.
//!
//! ## Architecture
//! ```text
//!  application                     host scheduler                  callback runtime
//!  ───────────                     ──────────────                  ────────────────
//!  RawCall / typed API
//!        │
//!        ▼
//!  ┌────────────┐ enqueue/cancel ┌─────────────────────┐
//!  │ TaskBridge │───────────────►│  PlatformScheduler  │
//!  │ (validate, │   query        │  (LocalScheduler:   │
//!  │ normalize) │◄───────────────│  slots, policies,   │
//!  └─────┬──────┘                │  backoff, limits)   │
//!        │ initialize            └──────────┬──────────┘
//!        ▼                                  │ task due
//!  ┌─────────────┐   load config   ┌────────▼─────────┐  bind/invoke   ┌───────────────┐
//!  │ ConfigStore │◄────────────────│      Worker      │───────────────►│    isolate    │
//!  └─────────────┘                 │ (state machine)  │                │ (own thread + │
//!                                  └────────┬─────────┘                │  event loop)  │
//!                                           │ wait (exactly once)      └───────┬───────┘
//!                                           ▼                                  │
//!                                  Completion signal ◄──── resolve(outcome) ───┘
//!                                           │
//!                                           ▼
//!                             TerminalStatus + DebugHook report
//! ```
//!
//! ### Lifecycle of one execution
//! ```text
//! Idle ─► RuntimeStarting ─► RuntimeReady ─► CallbackInvoked ─► Completing ─► Terminated
//!              │                   │                                 ▲
//!              └── no config ──────┴── resolution failure ───────────┘
//! ```
//!
//! ## Features
//! | Area | Description | Key types |
//! |------|-------------|-----------|
//! | **Requests** | Typed one-off, periodic and processing requests with platform clamping | [`TaskRequest`], [`Extractor`] |
//! | **Bridge** | Initialization, registration, cancellation, raw call dispatch | [`TaskBridge`], [`RawCall`] |
//! | **Scheduling** | In-process host with existing-work policies, backoff and constraints | [`LocalScheduler`], [`PlatformScheduler`] |
//! | **Execution** | Isolated runtimes and exactly-once completion | [`Worker`], [`IsolateLauncher`], [`CancelHandle`] |
//! | **Debug** | Swappable lifecycle hook with panic isolation | [`DebugHook`], [`DebugHandler`] |
//! | **Persistence** | Callback configuration store | [`ConfigStore`], [`FileConfigStore`] |
//!
//! ## Optional features
//! - `logging`: exports [`telemetry::init_tracing`], a `tracing-subscriber` setup honoring `RUST_LOG`.

mod bridge;
mod config;
mod debug;
mod error;
mod platform;
mod request;
mod runtime;
mod store;
pub mod sync;
mod worker;

#[cfg(feature = "logging")]
pub mod telemetry;

// ---- Public re-exports ----

pub use bridge::{CallReply, TaskBridge};
pub use config::{BridgeConfig, PlatformLimits, PlatformProfile};
pub use debug::{
    DebugHandler, DebugHook, Emitter, LoggingDebugHandler, NoopDebugHandler, TaskDebugInfo,
    TaskResult, TaskStatus,
};
pub use error::{
    BridgeError, CallbackError, ConfigError, ExecutionError, SchedulingError, StoreError,
    ValidationError,
};
pub use platform::{
    ConstraintProbe, DeviceProbe, DeviceSnapshot, JitterPolicy, LocalScheduler,
    PlatformScheduler, RetryBackoff, Satisfied, ScheduledState,
};
pub use request::{
    BackoffConfig, BackoffKind, BridgeCall, Constraints, ExistingPeriodicPolicy,
    ExistingWorkPolicy, ExpeditedPolicy, Extractor, NetworkType, OneOffTask, Payload,
    PayloadValue, PeriodicTask, ProcessingTask, RawCall, RawValue, TaskBase, TaskKind,
    TaskRequest, Vocabulary, method,
};
pub use runtime::{
    CallbackRuntime, EntryFn, EntryPoint, EntryPointRegistry, Invocation, IsolateLauncher,
    RuntimeLauncher, Settlement,
};
pub use store::{CallbackConfiguration, ConfigStore, FileConfigStore, MemoryConfigStore};
pub use worker::{
    CancelHandle, ExecutionReport, ScheduledTask, TerminalStatus, Worker, WorkerExecution,
    WorkerState,
};
