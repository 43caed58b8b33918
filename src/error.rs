//! Error types used by the bridge.
//!
//! Errors are split by the moment they surface:
//!
//! - [`ValidationError`]: a scheduling call could not be turned into a typed request;
//! - [`SchedulingError`]: the host scheduler refused an enqueue/cancel/query;
//! - [`ExecutionError`]: a due task could not run to a clean outcome;
//! - [`CallbackError`]: what a callback entry point returns instead of an outcome;
//! - [`StoreError`] / [`ConfigError`]: persistence and configuration loading;
//! - [`BridgeError`]: the caller-facing aggregate returned by [`TaskBridge`](crate::TaskBridge).
//!
//! Registration-time errors are returned synchronously and never enqueue anything.
//! Execution-time errors never escape the worker: they are folded into a
//! [`TerminalStatus`](crate::TerminalStatus) and carried as a diagnostic.
//!
//! Every enum provides `as_label` (stable snake_case label for logs/metrics).

use thiserror::Error;

/// # Errors produced while extracting a typed request from a raw call.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required argument is absent (or explicitly null).
    #[error("missing required field '{field}'")]
    MissingField {
        /// Wire name of the argument.
        field: &'static str,
    },

    /// A required argument is present but empty.
    #[error("field '{field}' must not be empty")]
    EmptyField {
        /// Wire name of the argument.
        field: &'static str,
    },

    /// A required argument has the wrong value kind.
    #[error("field '{field}' has kind {found}, expected {expected}")]
    InvalidField {
        /// Wire name of the argument.
        field: &'static str,
        /// Kind that was expected.
        expected: &'static str,
        /// Kind that was received.
        found: &'static str,
    },

    /// A payload entry holds a value kind outside the supported set.
    #[error(
        "unsupported payload type for key '{key}': {kind}; supported kinds are string, bool, int, float, double, bytes and string list"
    )]
    UnsupportedPayloadType {
        /// Offending payload key.
        key: String,
        /// Kind that was received.
        kind: &'static str,
    },

    /// The raw call names a method the bridge does not know.
    #[error("unknown method '{method}'")]
    UnknownMethod {
        /// Raw method name.
        method: String,
    },
}

impl ValidationError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskbridge::ValidationError;
    ///
    /// let err = ValidationError::MissingField { field: "uniqueName" };
    /// assert_eq!(err.as_label(), "validation_missing_field");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ValidationError::MissingField { .. } => "validation_missing_field",
            ValidationError::EmptyField { .. } => "validation_empty_field",
            ValidationError::InvalidField { .. } => "validation_invalid_field",
            ValidationError::UnsupportedPayloadType { .. } => "validation_unsupported_payload",
            ValidationError::UnknownMethod { .. } => "validation_unknown_method",
        }
    }
}

/// # Errors produced by a platform scheduling adapter.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulingError {
    /// The requested capability does not exist on this host platform.
    #[error("{operation} is not supported on {platform}")]
    Unsupported {
        /// Operation that was requested.
        operation: &'static str,
        /// Platform profile name.
        platform: &'static str,
    },

    /// The host scheduler refuses more entries.
    #[error("scheduling quota exceeded ({limit} entries)")]
    QuotaExceeded {
        /// Configured maximum of scheduled entries.
        limit: usize,
    },

    /// The host scheduler rejected the request for another reason.
    #[error("host scheduler rejected '{unique_name}': {reason}")]
    Rejected {
        /// Unique name of the rejected request.
        unique_name: String,
        /// Reason given by the host.
        reason: String,
    },

    /// The host scheduler could not report the state of an entry.
    #[error("host scheduler query failed: {reason}")]
    QueryFailed {
        /// Reason given by the host.
        reason: String,
    },

    /// The host scheduler has been shut down.
    #[error("host scheduler is shut down")]
    Closed,
}

impl SchedulingError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SchedulingError::Unsupported { .. } => "scheduling_unsupported",
            SchedulingError::QuotaExceeded { .. } => "scheduling_quota_exceeded",
            SchedulingError::Rejected { .. } => "scheduling_rejected",
            SchedulingError::QueryFailed { .. } => "scheduling_query_failed",
            SchedulingError::Closed => "scheduling_closed",
        }
    }
}

/// # Errors produced while executing a due task.
///
/// None of these escape the worker; they are attached to the
/// [`ExecutionReport`](crate::ExecutionReport) and forwarded to the debug hook.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// No callback configuration has been persisted.
    #[error(
        "the task bridge is not initialized: call `initialize(callback_handle, debug_enabled)` before any task becomes due"
    )]
    NotInitialized,

    /// The persisted callback handle does not resolve to an entry point.
    #[error("failed to resolve callback entry point for handle {handle}")]
    CallbackResolution {
        /// Handle that could not be resolved.
        handle: i64,
    },

    /// The isolated runtime could not be started.
    #[error("failed to start callback runtime: {reason}")]
    RuntimeStart {
        /// Underlying reason.
        reason: String,
    },

    /// The callback reported an error instead of an outcome.
    #[error("callback failed: {reason}")]
    RuntimeInvocation {
        /// Message reported by the callback.
        reason: String,
        /// Whether the callback asked for a retry.
        retryable: bool,
    },

    /// The runtime went away without ever reporting completion.
    #[error("callback runtime terminated without reporting completion")]
    RuntimeLost,

    /// The host scheduler requested cancellation before completion.
    #[error("execution cancelled by host scheduler")]
    Cancelled,

    /// The configuration store could not be read.
    #[error("configuration store unavailable: {reason}")]
    Store {
        /// Underlying reason.
        reason: String,
    },
}

impl ExecutionError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskbridge::ExecutionError;
    ///
    /// assert_eq!(ExecutionError::NotInitialized.as_label(), "execution_not_initialized");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ExecutionError::NotInitialized => "execution_not_initialized",
            ExecutionError::CallbackResolution { .. } => "execution_callback_resolution",
            ExecutionError::RuntimeStart { .. } => "execution_runtime_start",
            ExecutionError::RuntimeInvocation { .. } => "execution_runtime_invocation",
            ExecutionError::RuntimeLost => "execution_runtime_lost",
            ExecutionError::Cancelled => "execution_cancelled",
            ExecutionError::Store { .. } => "execution_store",
        }
    }

    /// Indicates whether the condition is fatal for this task (no retry by the bridge).
    ///
    /// Only a callback that explicitly asked for a retry is non-fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ExecutionError::RuntimeInvocation {
                retryable: true,
                ..
            }
        )
    }
}

/// # Errors a callback entry point may return instead of a boolean outcome.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallbackError {
    /// Unrecoverable failure; the task is not retried.
    #[error("{0}")]
    Failed(String),

    /// Transient failure; the host should run the task again.
    #[error("{0}")]
    Retry(String),
}

impl CallbackError {
    /// Maps the callback error into an [`ExecutionError::RuntimeInvocation`].
    pub fn into_execution(self) -> ExecutionError {
        match self {
            CallbackError::Failed(reason) => ExecutionError::RuntimeInvocation {
                reason,
                retryable: false,
            },
            CallbackError::Retry(reason) => ExecutionError::RuntimeInvocation {
                reason,
                retryable: true,
            },
        }
    }
}

/// # Errors produced by a [`ConfigStore`](crate::ConfigStore).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("store i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted record could not be encoded or decoded.
    #[error("store record is malformed: {0}")]
    Codec(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::Io(_) => "store_io",
            StoreError::Codec(_) => "store_codec",
        }
    }
}

/// # Errors produced while loading a [`BridgeConfig`](crate::BridgeConfig).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration text is not valid TOML for this schema.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// # Errors returned to application code by [`TaskBridge`](crate::TaskBridge).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The call could not be extracted into a typed request.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A task was registered before `initialize`.
    #[error(
        "the task bridge is not initialized: call `initialize(callback_handle, debug_enabled)` before registering tasks"
    )]
    NotInitialized,

    /// The host scheduler rejected the operation.
    #[error(transparent)]
    Scheduling(#[from] SchedulingError),

    /// The callback configuration could not be persisted or read.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BridgeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            BridgeError::Validation(e) => e.as_label(),
            BridgeError::NotInitialized => "bridge_not_initialized",
            BridgeError::Scheduling(e) => e.as_label(),
            BridgeError::Store(e) => e.as_label(),
        }
    }

    /// True when the host platform lacks the requested capability.
    ///
    /// # Example
    /// ```
    /// use taskbridge::{BridgeError, SchedulingError};
    ///
    /// let err = BridgeError::from(SchedulingError::Unsupported {
    ///     operation: "cancel by tag",
    ///     platform: "apple",
    /// });
    /// assert!(err.is_unsupported());
    /// ```
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            BridgeError::Scheduling(SchedulingError::Unsupported { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_retryable_invocation_errors_are_not_fatal() {
        let retry = ExecutionError::RuntimeInvocation {
            reason: "busy".into(),
            retryable: true,
        };
        let fail = ExecutionError::RuntimeInvocation {
            reason: "boom".into(),
            retryable: false,
        };
        assert!(!retry.is_fatal());
        assert!(fail.is_fatal());
        assert!(ExecutionError::NotInitialized.is_fatal());
        assert!(ExecutionError::CallbackResolution { handle: 7 }.is_fatal());
    }

    #[test]
    fn unsupported_payload_message_names_the_key() {
        let err = ValidationError::UnsupportedPayloadType {
            key: "nested".into(),
            kind: "map",
        };
        assert!(err.to_string().contains("'nested'"));
        assert_eq!(err.as_label(), "validation_unsupported_payload");
    }

    #[test]
    fn not_initialized_diagnostic_points_at_initialize() {
        assert!(
            ExecutionError::NotInitialized
                .to_string()
                .contains("initialize")
        );
        assert!(BridgeError::NotInitialized.to_string().contains("initialize"));
    }
}
