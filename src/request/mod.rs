//! # Scheduling requests.
//!
//! ```text
//! RawCall ──► Extractor ──► BridgeCall::Register(TaskRequest)
//!   (untyped)   (defaults,      (OneOff | Periodic | Processing)
//!                clamping)
//! ```
//!
//! - [`raw`]: untyped calls and values.
//! - [`payload`]: restricted key/value data forwarded to callbacks.
//! - [`policy`]: scheduling vocabularies, constraints and backoff.
//! - [`task`]: the typed request union.
//! - [`extract`]: raw → typed conversion.

pub mod extract;
pub mod payload;
pub mod policy;
pub mod raw;
pub mod task;

pub use extract::{BridgeCall, Extractor, method};
pub use payload::{Payload, PayloadValue};
pub use policy::{
    BackoffConfig, BackoffKind, Constraints, ExistingPeriodicPolicy, ExistingWorkPolicy,
    ExpeditedPolicy, NetworkType, Vocabulary,
};
pub use raw::{RawCall, RawValue};
pub use task::{OneOffTask, PeriodicTask, ProcessingTask, TaskBase, TaskKind, TaskRequest};
