//! # Isolate runtimes.
//!
//! [`IsolateLauncher`] starts one dedicated OS thread per execution. The thread
//! owns a current-thread `tokio` runtime (its own event loop) and receives
//! commands over an unbounded channel:
//!
//! ```text
//! worker thread                         isolate thread (own event loop)
//! ─────────────                         ───────────────────────────────
//! bind(handle)    ── Install(entry) ──►  entry = Some(..)
//! invoke(inv, r)  ── Invoke(inv, r) ──►  spawn: catch_unwind(entry.execute(inv)) ─► r.resolve(..)
//! teardown()      ── Shutdown ────────►  loop ends, runtime dropped
//! ```
//!
//! ## Rules
//! - Each pending reply travels inside a [`PendingReply`]; if it is dropped
//!   without an answer (runtime died, command never processed, task aborted by
//!   shutdown) it resolves `Failure(RuntimeLost)`. A waiter can never hang on
//!   a dead isolate.
//! - Entry point panics are caught and reported as `Failure`.
//! - If the event loop cannot be built, every command is answered with
//!   `Failure(RuntimeStart)`.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, error, trace};

use crate::error::ExecutionError;
use crate::runtime::entry::{EntryPoint, EntryPointRegistry};
use crate::runtime::{CallbackRuntime, Invocation, RuntimeLauncher, Settlement};
use crate::sync::Resolver;

/// Resolver that answers `RuntimeLost` if dropped unanswered.
struct PendingReply(Option<Resolver<Settlement>>);

impl PendingReply {
    fn new(resolver: Resolver<Settlement>) -> Self {
        Self(Some(resolver))
    }

    fn resolve(mut self, settlement: Settlement) {
        if let Some(resolver) = self.0.take() {
            resolver.resolve(settlement);
        }
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        if let Some(resolver) = self.0.take() {
            resolver.resolve(Settlement::failure(ExecutionError::RuntimeLost));
        }
    }
}

enum Command {
    Install(Arc<dyn EntryPoint>),
    Invoke(Invocation, PendingReply),
    Shutdown,
}

#[derive(Default)]
struct Counters {
    acquired: AtomicUsize,
    released: AtomicUsize,
}

/// Launches one isolate thread per execution.
#[derive(Clone)]
pub struct IsolateLauncher {
    registry: EntryPointRegistry,
    counters: Arc<Counters>,
}

impl IsolateLauncher {
    pub fn new(registry: EntryPointRegistry) -> Self {
        Self {
            registry,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn registry(&self) -> &EntryPointRegistry {
        &self.registry
    }

    /// Runtimes acquired and not yet torn down.
    pub fn live_runtimes(&self) -> usize {
        let acquired = self.counters.acquired.load(Ordering::SeqCst);
        acquired.saturating_sub(self.counters.released.load(Ordering::SeqCst))
    }

    /// Total runtimes ever acquired.
    pub fn acquired_runtimes(&self) -> usize {
        self.counters.acquired.load(Ordering::SeqCst)
    }
}

impl RuntimeLauncher for IsolateLauncher {
    fn acquire(&self, label: &str) -> Result<Box<dyn CallbackRuntime>, ExecutionError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let name = format!("isolate-{label}");

        thread::Builder::new()
            .name(name.clone())
            .spawn(move || isolate_main(rx))
            .map_err(|e| ExecutionError::RuntimeStart {
                reason: e.to_string(),
            })?;

        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        debug!(runtime = %name, "isolate started");
        Ok(Box::new(IsolateRuntime {
            name,
            tx: Some(tx),
            registry: self.registry.clone(),
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct IsolateRuntime {
    name: String,
    tx: Option<mpsc::UnboundedSender<Command>>,
    registry: EntryPointRegistry,
    counters: Arc<Counters>,
}

impl CallbackRuntime for IsolateRuntime {
    fn bind(&mut self, handle: i64) -> Result<(), ExecutionError> {
        let entry = self
            .registry
            .resolve(handle)
            .ok_or(ExecutionError::CallbackResolution { handle })?;
        let tx = self.tx.as_ref().ok_or(ExecutionError::RuntimeLost)?;
        tx.send(Command::Install(entry))
            .map_err(|_| ExecutionError::RuntimeLost)
    }

    fn invoke(&mut self, invocation: Invocation, reply: Resolver<Settlement>) {
        let reply = PendingReply::new(reply);
        match &self.tx {
            // a failed send drops the command, answering RuntimeLost
            Some(tx) => {
                let _ = tx.send(Command::Invoke(invocation, reply));
            }
            None => drop(reply),
        }
    }

    fn teardown(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Command::Shutdown);
            self.counters.released.fetch_add(1, Ordering::SeqCst);
            debug!(runtime = %self.name, "isolate torn down");
        }
    }
}

impl Drop for IsolateRuntime {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn isolate_main(mut rx: mpsc::UnboundedReceiver<Command>) {
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "isolate event loop failed to start");
            let reason = e.to_string();
            while let Some(cmd) = rx.blocking_recv() {
                match cmd {
                    Command::Invoke(_, reply) => reply.resolve(Settlement::failure(
                        ExecutionError::RuntimeStart {
                            reason: reason.clone(),
                        },
                    )),
                    Command::Install(_) => {}
                    Command::Shutdown => break,
                }
            }
            return;
        }
    };

    rt.block_on(async move {
        let mut entry: Option<Arc<dyn EntryPoint>> = None;
        while let Some(cmd) = rx.recv().await {
            match cmd {
                Command::Install(e) => entry = Some(e),
                Command::Invoke(invocation, reply) => match entry.clone() {
                    Some(entry) => {
                        tokio::spawn(run_entry(entry, invocation, reply));
                    }
                    None => reply.resolve(Settlement::failure(ExecutionError::RuntimeStart {
                        reason: "no entry point bound".to_string(),
                    })),
                },
                Command::Shutdown => break,
            }
        }
    });
    // dropping `rt` aborts unfinished entries; their replies answer RuntimeLost
}

async fn run_entry(entry: Arc<dyn EntryPoint>, invocation: Invocation, reply: PendingReply) {
    trace!(task = %invocation.unique_name, name = %invocation.task_name, "entry point running");
    let result = AssertUnwindSafe(entry.execute(&invocation))
        .catch_unwind()
        .await;

    let settlement = match result {
        Ok(Ok(true)) => Settlement::success(),
        Ok(Ok(false)) => Settlement::retry(None),
        Ok(Err(e)) => {
            let cause = e.into_execution();
            if cause.is_fatal() {
                Settlement::failure(cause)
            } else {
                Settlement::retry(Some(cause))
            }
        }
        Err(panic) => Settlement::failure(ExecutionError::RuntimeInvocation {
            reason: panic_message(panic.as_ref()),
            retryable: false,
        }),
    };
    reply.resolve(settlement);
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic: unknown payload".to_string()
    }
}
