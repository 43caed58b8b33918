//! # Callback runtimes.
//!
//! A callback runtime is a short-lived, isolated execution context that runs
//! one registered [`EntryPoint`] for one due task. The worker talks to it only
//! through [`CallbackRuntime`] and a completion [`Resolver`].
//!
//! ```text
//! Worker ──acquire──► RuntimeLauncher ──► Box<dyn CallbackRuntime>
//!   │                                         │ bind(handle)   (registry lookup)
//!   │                                         │ invoke(inv, resolver) ──► isolate event loop
//!   │                                         │                              └─► EntryPoint::execute
//!   └──────────── wait on Waiter ◄──────────── resolver.resolve(Settlement) ◄──┘
//!                                             │ teardown()
//! ```
//!
//! ## Rules
//! - `bind` and `invoke` never block the caller.
//! - Every `invoke` resolves its resolver exactly once, even if the runtime dies.
//! - `teardown` is idempotent and stops the isolate.

mod entry;
mod isolate;

pub use entry::{EntryFn, EntryPoint, EntryPointRegistry};
pub use isolate::IsolateLauncher;

use tokio_util::sync::CancellationToken;

use crate::error::ExecutionError;
use crate::request::Payload;
use crate::sync::{Outcome, Resolver};

/// Arguments handed to an entry point.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub task_name: String,
    pub unique_name: String,
    pub payload: Payload,
    /// 1-based attempt number.
    pub attempt: u32,
    /// Cancelled when the host requests cancellation.
    pub cancel: CancellationToken,
}

/// Resolved value of an execution: outcome plus the error behind it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub outcome: Outcome,
    pub cause: Option<ExecutionError>,
}

impl Settlement {
    pub fn success() -> Self {
        Self {
            outcome: Outcome::Success,
            cause: None,
        }
    }

    pub fn retry(cause: Option<ExecutionError>) -> Self {
        Self {
            outcome: Outcome::Retry,
            cause,
        }
    }

    pub fn failure(cause: ExecutionError) -> Self {
        Self {
            outcome: Outcome::Failure,
            cause: Some(cause),
        }
    }

    /// Failure caused by host cancellation.
    pub fn cancelled() -> Self {
        Self::failure(ExecutionError::Cancelled)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.cause, Some(ExecutionError::Cancelled))
    }
}

/// Produces fresh runtimes, one per execution.
pub trait RuntimeLauncher: Send + Sync + 'static {
    /// Starts an isolated runtime; `label` names it in logs.
    fn acquire(&self, label: &str) -> Result<Box<dyn CallbackRuntime>, ExecutionError>;
}

/// One isolated runtime, exclusively owned by one execution.
pub trait CallbackRuntime: Send {
    /// Binds the runtime to the entry point registered under `handle`.
    fn bind(&mut self, handle: i64) -> Result<(), ExecutionError>;

    /// Dispatches the invocation; the outcome arrives through `reply`.
    fn invoke(&mut self, invocation: Invocation, reply: Resolver<Settlement>);

    /// Stops the runtime. Idempotent.
    fn teardown(&mut self);
}
