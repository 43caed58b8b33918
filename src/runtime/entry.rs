//! # Callback entry points.
//!
//! An [`EntryPoint`] is the user logic a runtime runs for a due task. Entry
//! points are registered in an [`EntryPointRegistry`] under opaque `i64`
//! handles; the bridge persists only the handle.
//!
//! | Entry point returns              | Outcome   |
//! |----------------------------------|-----------|
//! | `Ok(true)`                       | `Success` |
//! | `Ok(false)`                      | `Retry`   |
//! | `Err(CallbackError::Retry(_))`   | `Retry`   |
//! | `Err(CallbackError::Failed(_))`  | `Failure` |
//! | panic                            | `Failure` |
//!
//! # Example
//! ```rust
//! use taskbridge::{EntryFn, EntryPointRegistry, Invocation, CallbackError};
//!
//! let registry = EntryPointRegistry::new();
//! let handle = registry.register(EntryFn::arc(|inv: Invocation| async move {
//!     match inv.task_name.as_str() {
//!         "upload" => Ok(true),
//!         other => Err(CallbackError::Failed(format!("unknown task {other}"))),
//!     }
//! }));
//!
//! assert!(registry.resolve(handle).is_some());
//! assert!(registry.resolve(handle + 1).is_none());
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::CallbackError;
use crate::runtime::Invocation;

/// User logic executed inside a callback runtime.
#[async_trait]
pub trait EntryPoint: Send + Sync + 'static {
    /// Runs one task. `Ok(true)` means done, `Ok(false)` asks for a retry.
    async fn execute(&self, invocation: &Invocation) -> Result<bool, CallbackError>;
}

/// Closure-backed entry point; builds a fresh future per invocation.
pub struct EntryFn<F> {
    f: F,
}

impl<F> EntryFn<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the entry point as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> EntryPoint for EntryFn<F>
where
    F: Fn(Invocation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool, CallbackError>> + Send + 'static,
{
    async fn execute(&self, invocation: &Invocation) -> Result<bool, CallbackError> {
        (self.f)(invocation.clone()).await
    }
}

#[derive(Default)]
struct Entries {
    next: i64,
    by_handle: HashMap<i64, Arc<dyn EntryPoint>>,
}

/// Handle → entry point table. Clones share the table.
#[derive(Clone, Default)]
pub struct EntryPointRegistry {
    inner: Arc<RwLock<Entries>>,
}

impl EntryPointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entry point under a fresh handle (handles start at 1).
    pub fn register(&self, entry: Arc<dyn EntryPoint>) -> i64 {
        let mut inner = self.inner.write();
        let mut handle = inner.next.max(0) + 1;
        while inner.by_handle.contains_key(&handle) {
            handle += 1;
        }
        inner.next = handle;
        inner.by_handle.insert(handle, entry);
        handle
    }

    /// Registers an entry point under a caller-chosen handle, replacing any previous one.
    pub fn register_with_handle(&self, handle: i64, entry: Arc<dyn EntryPoint>) {
        self.inner.write().by_handle.insert(handle, entry);
    }

    /// Removes a handle; later resolutions of it fail.
    pub fn unregister(&self, handle: i64) -> bool {
        self.inner.write().by_handle.remove(&handle).is_some()
    }

    pub fn resolve(&self, handle: i64) -> Option<Arc<dyn EntryPoint>> {
        self.inner.read().by_handle.get(&handle).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
