//! # Callback configuration persistence.
//!
//! The bridge persists exactly one record: the registered callback handle and
//! the debug flag. It is written by `initialize` and read by the worker each
//! time a task becomes due.
//!
//! ```text
//! initialize ──save──► [ConfigStore] ◄──load── Worker (per execution)
//! ```
//!
//! ## Rules
//! - `save` replaces the record; concurrent writers are serialized (last writer wins).
//! - `load` returns `Ok(None)` when nothing was ever saved.
//! - Implementations are `Send + Sync` and never block on async work.

mod file;
mod memory;

pub use file::FileConfigStore;
pub use memory::MemoryConfigStore;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// The persisted `{callbackHandle, debugEnabled}` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackConfiguration {
    /// Opaque handle of the registered entry point.
    pub callback_handle: i64,
    pub debug_enabled: bool,
}

impl CallbackConfiguration {
    pub fn new(callback_handle: i64, debug_enabled: bool) -> Self {
        Self {
            callback_handle,
            debug_enabled,
        }
    }
}

/// Scoped persistence for the [`CallbackConfiguration`].
pub trait ConfigStore: Send + Sync + 'static {
    /// Reads the current record.
    fn load(&self) -> Result<Option<CallbackConfiguration>, StoreError>;

    /// Replaces the current record.
    fn save(&self, config: &CallbackConfiguration) -> Result<(), StoreError>;

    /// Removes the record.
    fn clear(&self) -> Result<(), StoreError>;
}
