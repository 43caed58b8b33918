//! # Request extraction.
//!
//! [`Extractor`] turns a [`RawCall`] into a [`BridgeCall`], the typed form of
//! every operation the bridge accepts.
//!
//! ## Rules
//! - `uniqueName` / `taskName` are required: absent ⇒ `MissingField`,
//!   wrong kind ⇒ `InvalidField`, empty ⇒ `EmptyField`.
//! - Vocabulary fields never fail; unknown tokens resolve to their default.
//! - Boolean constraint flags of the wrong kind read as `false`.
//! - Numbers are clamped, never rejected: negative delays become zero,
//!   frequency/flex/backoff are raised to platform minimums.
//! - `inputData` is strict: any unsupported value kind fails the call.
//!
//! ## Wire keys
//! ```text
//! uniqueName taskName tag existingWorkPolicy initialDelaySeconds
//! networkType requiresCharging requiresBatteryNotLow requiresDeviceIdle requiresStorageNotLow
//! backoffPolicyType backoffDelayInMilliseconds outOfQuotaPolicy
//! frequency flexInterval (seconds)  inputData  callbackHandle isInDebugMode
//! ```

use std::time::Duration;

use crate::config::PlatformLimits;
use crate::error::ValidationError;
use crate::request::payload::Payload;
use crate::request::policy::{
    BackoffConfig, BackoffKind, Constraints, ExistingPeriodicPolicy, ExistingWorkPolicy,
    ExpeditedPolicy, NetworkType, Vocabulary,
};
use crate::request::raw::{RawCall, RawValue};
use crate::request::task::{OneOffTask, PeriodicTask, ProcessingTask, TaskBase, TaskRequest};
use crate::store::CallbackConfiguration;

/// Method names understood by [`Extractor::extract`].
pub mod method {
    pub const INITIALIZE: &str = "initialize";
    pub const REGISTER_ONE_OFF: &str = "registerOneOffTask";
    pub const REGISTER_PERIODIC: &str = "registerPeriodicTask";
    pub const REGISTER_PROCESSING: &str = "registerProcessingTask";
    pub const CANCEL_BY_UNIQUE_NAME: &str = "cancelTaskByUniqueName";
    pub const CANCEL_BY_TAG: &str = "cancelTaskByTag";
    pub const CANCEL_ALL: &str = "cancelAllTasks";
    pub const IS_SCHEDULED: &str = "isScheduledByUniqueName";
    pub const PRINT_SCHEDULED: &str = "printScheduledTasks";
}

mod key {
    pub const UNIQUE_NAME: &str = "uniqueName";
    pub const TASK_NAME: &str = "taskName";
    pub const TAG: &str = "tag";
    pub const EXISTING_WORK_POLICY: &str = "existingWorkPolicy";
    pub const INITIAL_DELAY_SECONDS: &str = "initialDelaySeconds";
    pub const NETWORK_TYPE: &str = "networkType";
    pub const REQUIRES_CHARGING: &str = "requiresCharging";
    pub const REQUIRES_BATTERY_NOT_LOW: &str = "requiresBatteryNotLow";
    pub const REQUIRES_DEVICE_IDLE: &str = "requiresDeviceIdle";
    pub const REQUIRES_STORAGE_NOT_LOW: &str = "requiresStorageNotLow";
    pub const BACKOFF_POLICY_TYPE: &str = "backoffPolicyType";
    pub const BACKOFF_DELAY_MS: &str = "backoffDelayInMilliseconds";
    pub const OUT_OF_QUOTA_POLICY: &str = "outOfQuotaPolicy";
    pub const FREQUENCY: &str = "frequency";
    pub const FLEX_INTERVAL: &str = "flexInterval";
    pub const INPUT_DATA: &str = "inputData";
    pub const CALLBACK_HANDLE: &str = "callbackHandle";
    pub const IS_IN_DEBUG_MODE: &str = "isInDebugMode";
}

/// Typed form of a raw call.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeCall {
    Initialize(CallbackConfiguration),
    Register(TaskRequest),
    CancelByUniqueName(String),
    CancelByTag(String),
    CancelAll,
    IsScheduled(String),
    PrintScheduled,
}

/// Parses raw calls against a set of platform limits.
#[derive(Debug, Clone, Copy, Default)]
pub struct Extractor {
    limits: PlatformLimits,
}

impl Extractor {
    pub fn new(limits: PlatformLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &PlatformLimits {
        &self.limits
    }

    /// Dispatches on the method name.
    pub fn extract(&self, call: &RawCall) -> Result<BridgeCall, ValidationError> {
        match call.method() {
            method::INITIALIZE => self.initialize(call).map(BridgeCall::Initialize),
            method::REGISTER_ONE_OFF => self.one_off(call).map(BridgeCall::Register),
            method::REGISTER_PERIODIC => self.periodic(call).map(BridgeCall::Register),
            method::REGISTER_PROCESSING => self.processing(call).map(BridgeCall::Register),
            method::CANCEL_BY_UNIQUE_NAME => {
                required_str(call, key::UNIQUE_NAME).map(BridgeCall::CancelByUniqueName)
            }
            method::CANCEL_BY_TAG => required_str(call, key::TAG).map(BridgeCall::CancelByTag),
            method::CANCEL_ALL => Ok(BridgeCall::CancelAll),
            method::IS_SCHEDULED => {
                required_str(call, key::UNIQUE_NAME).map(BridgeCall::IsScheduled)
            }
            method::PRINT_SCHEDULED => Ok(BridgeCall::PrintScheduled),
            other => Err(ValidationError::UnknownMethod {
                method: other.to_string(),
            }),
        }
    }

    /// Extracts the `{callbackHandle, isInDebugMode}` pair.
    pub fn initialize(&self, call: &RawCall) -> Result<CallbackConfiguration, ValidationError> {
        let handle = match call.arg(key::CALLBACK_HANDLE) {
            None => {
                return Err(ValidationError::MissingField {
                    field: key::CALLBACK_HANDLE,
                });
            }
            Some(RawValue::Int(n)) => *n,
            Some(other) => {
                return Err(ValidationError::InvalidField {
                    field: key::CALLBACK_HANDLE,
                    expected: "int",
                    found: other.kind(),
                });
            }
        };
        Ok(CallbackConfiguration::new(
            handle,
            flag(call, key::IS_IN_DEBUG_MODE),
        ))
    }

    pub fn one_off(&self, call: &RawCall) -> Result<TaskRequest, ValidationError> {
        let task = OneOffTask::new(self.base(call)?).with_policy(ExistingWorkPolicy::parse_or_default(
            optional_str(call, key::EXISTING_WORK_POLICY),
        ));
        Ok(TaskRequest::from(task).normalized(&self.limits))
    }

    /// Missing `frequency` resolves to the platform minimum interval.
    pub fn periodic(&self, call: &RawCall) -> Result<TaskRequest, ValidationError> {
        let mut task = PeriodicTask::new(self.base(call)?, seconds(call, key::FREQUENCY))
            .with_policy(ExistingPeriodicPolicy::parse_or_default(optional_str(
                call,
                key::EXISTING_WORK_POLICY,
            )));
        if call.arg(key::FLEX_INTERVAL).is_some() {
            task = task.with_flex(seconds(call, key::FLEX_INTERVAL));
        }
        Ok(TaskRequest::from(task).normalized(&self.limits))
    }

    pub fn processing(&self, call: &RawCall) -> Result<TaskRequest, ValidationError> {
        let task = ProcessingTask::new(self.base(call)?).with_policy(
            ExistingWorkPolicy::parse_or_default(optional_str(call, key::EXISTING_WORK_POLICY)),
        );
        Ok(TaskRequest::from(task).normalized(&self.limits))
    }

    fn base(&self, call: &RawCall) -> Result<TaskBase, ValidationError> {
        let unique_name = required_str(call, key::UNIQUE_NAME)?;
        let task_name = required_str(call, key::TASK_NAME)?;

        let mut base = TaskBase::new(unique_name, task_name)
            .with_payload(payload(call)?)
            .with_initial_delay(seconds(call, key::INITIAL_DELAY_SECONDS))
            .with_constraints(constraints(call));

        if let Some(tag) = optional_str(call, key::TAG).filter(|t| !t.is_empty()) {
            base = base.with_tag(tag);
        }
        if let Some(backoff) = self.backoff(call) {
            base = base.with_backoff(backoff);
        }
        if let Some(policy) = optional_str(call, key::OUT_OF_QUOTA_POLICY).and_then(ExpeditedPolicy::parse) {
            base = base.with_expedited(policy);
        }
        Ok(base)
    }

    /// Backoff is present only when a type is given; a missing delay uses the
    /// platform default.
    fn backoff(&self, call: &RawCall) -> Option<BackoffConfig> {
        call.arg(key::BACKOFF_POLICY_TYPE)?;
        let kind = BackoffKind::parse_or_default(optional_str(call, key::BACKOFF_POLICY_TYPE));
        let delay = call
            .arg(key::BACKOFF_DELAY_MS)
            .and_then(RawValue::as_i64)
            .map(|ms| Duration::from_millis(ms.max(0) as u64))
            .unwrap_or(self.limits.default_backoff);
        Some(BackoffConfig::new(kind, delay))
    }
}

fn required_str(call: &RawCall, field: &'static str) -> Result<String, ValidationError> {
    match call.arg(field) {
        None => Err(ValidationError::MissingField { field }),
        Some(RawValue::String(s)) if s.is_empty() => Err(ValidationError::EmptyField { field }),
        Some(RawValue::String(s)) => Ok(s.clone()),
        Some(other) => Err(ValidationError::InvalidField {
            field,
            expected: "string",
            found: other.kind(),
        }),
    }
}

fn optional_str<'a>(call: &'a RawCall, field: &str) -> Option<&'a str> {
    call.arg(field).and_then(RawValue::as_str)
}

fn flag(call: &RawCall, field: &str) -> bool {
    call.arg(field).and_then(RawValue::as_bool).unwrap_or(false)
}

/// Whole seconds; absent, negative or non-numeric values read as zero.
fn seconds(call: &RawCall, field: &str) -> Duration {
    let secs = call.arg(field).and_then(RawValue::as_i64).unwrap_or(0);
    Duration::from_secs(secs.max(0) as u64)
}

fn constraints(call: &RawCall) -> Constraints {
    Constraints::default()
        .with_network(NetworkType::parse_or_default(optional_str(
            call,
            key::NETWORK_TYPE,
        )))
        .with_charging(flag(call, key::REQUIRES_CHARGING))
        .with_battery_not_low(flag(call, key::REQUIRES_BATTERY_NOT_LOW))
        .with_device_idle(flag(call, key::REQUIRES_DEVICE_IDLE))
        .with_storage_not_low(flag(call, key::REQUIRES_STORAGE_NOT_LOW))
}

fn payload(call: &RawCall) -> Result<Payload, ValidationError> {
    match call.arg(key::INPUT_DATA) {
        None => Ok(Payload::default()),
        Some(RawValue::Map(map)) => Payload::from_raw(map),
        Some(other) => Err(ValidationError::InvalidField {
            field: key::INPUT_DATA,
            expected: "map",
            found: other.kind(),
        }),
    }
}
