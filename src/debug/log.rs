//! # LoggingDebugHandler: lifecycle reports through `tracing`.
//!
//! ## Example output
//! ```text
//! INFO  task status task="sync" name="upload" status="started" attempt=1
//! INFO  task status task="sync" name="upload" status="completed" attempt=1 elapsed=12ms
//! WARN  task status task="sync" name="upload" status="failed" attempt=1 elapsed=3ms error="boom"
//! ERROR task exception task="sync" error="callback failed: boom"
//! ```

use tracing::{error, info, warn};

use crate::debug::{DebugHandler, TaskDebugInfo, TaskResult, TaskStatus};
use crate::error::ExecutionError;

/// Handler that writes every report as a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingDebugHandler;

impl LoggingDebugHandler {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl DebugHandler for LoggingDebugHandler {
    fn on_task_status_update(
        &self,
        info: &TaskDebugInfo,
        status: TaskStatus,
        result: Option<&TaskResult>,
    ) {
        let elapsed = result.map(|r| r.duration);
        let err = result.and_then(|r| r.error.as_deref());
        match status {
            TaskStatus::Failed | TaskStatus::Cancelled => warn!(
                task = %info.unique_name,
                name = %info.task_name,
                status = status.as_str(),
                attempt = info.attempt,
                ?elapsed,
                error = err.unwrap_or(""),
                "task status"
            ),
            _ => info!(
                task = %info.unique_name,
                name = %info.task_name,
                status = status.as_str(),
                attempt = info.attempt,
                ?elapsed,
                "task status"
            ),
        }
    }

    fn on_exception_encountered(&self, info: Option<&TaskDebugInfo>, err: &ExecutionError) {
        error!(
            task = info.map(|i| i.unique_name.as_str()).unwrap_or("unknown"),
            label = err.as_label(),
            error = %err,
            "task exception"
        );
    }
}
