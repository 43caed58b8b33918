use parking_lot::RwLock;

use crate::error::StoreError;
use crate::store::{CallbackConfiguration, ConfigStore};

/// Process-local store; the record lives as long as the value.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    record: RwLock<Option<CallbackConfiguration>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `config`.
    pub fn with(config: CallbackConfiguration) -> Self {
        Self {
            record: RwLock::new(Some(config)),
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<Option<CallbackConfiguration>, StoreError> {
        Ok(*self.record.read())
    }

    fn save(&self, config: &CallbackConfiguration) -> Result<(), StoreError> {
        *self.record.write() = Some(*config);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.record.write().take();
        Ok(())
    }
}
