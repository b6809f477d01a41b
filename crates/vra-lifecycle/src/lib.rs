//! Resource lifecycle client for the vRA automation API.
//!
//! Every resource type delegates its create, read, update and delete calls to
//! [`LifecycleClient`]. The client serializes calls that target the same
//! remote object through a keyed [`LockRegistry`], classifies each response
//! into an [`Outcome`], and keeps retrying deletes that the server rejects
//! until the object stops being referenced or the convergence deadline
//! passes.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod diagnostics;
pub mod handle;
pub mod lock;
pub mod outcome;
pub mod retry;

pub use client::{DeleteReport, Fetched, LifecycleClient};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use handle::{Operation, ResourceHandle, StaticHandle};
pub use lock::{LockGuard, LockRegistry};
pub use outcome::Outcome;
pub use retry::RetryState;

/// Convenient result alias that reuses the shared error type.
pub type Result<T> = vra_core::Result<T>;
