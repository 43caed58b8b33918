//! Synchronization primitives shared by the worker and the callback runtime.

mod completion;

pub use completion::{Outcome, Resolver, Waiter, completion};
