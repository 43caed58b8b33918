//! Forward-only worker state machine.

use parking_lot::{Mutex, MutexGuard};

/// Lifecycle state of one execution.
///
/// ```text
/// Idle → RuntimeStarting → RuntimeReady → CallbackInvoked → Completing → Terminated
///   └──────────────────────────────(fatal paths)──────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WorkerState {
    Idle,
    RuntimeStarting,
    RuntimeReady,
    CallbackInvoked,
    Completing,
    Terminated,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Idle => "idle",
            WorkerState::RuntimeStarting => "runtime_starting",
            WorkerState::RuntimeReady => "runtime_ready",
            WorkerState::CallbackInvoked => "callback_invoked",
            WorkerState::Completing => "completing",
            WorkerState::Terminated => "terminated",
        }
    }
}

/// Shared state cell; transitions only move forward.
#[derive(Debug)]
pub(crate) struct StateCell {
    state: Mutex<WorkerState>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(WorkerState::Idle),
        }
    }

    pub(crate) fn get(&self) -> WorkerState {
        *self.state.lock()
    }

    /// Moves to `next` if it is ahead of the current state.
    pub(crate) fn advance(&self, next: WorkerState) -> bool {
        let mut state = self.state.lock();
        if next > *state {
            *state = next;
            true
        } else {
            false
        }
    }

    /// Locks the cell; used to make "check then act" atomic against termination.
    pub(crate) fn lock(&self) -> MutexGuard<'_, WorkerState> {
        self.state.lock()
    }
}
