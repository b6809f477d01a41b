//! Orchestrator (vRO) resources for the vRA lifecycle client.
//!
//! Provides [`ResourceHandle`](vra_lifecycle::ResourceHandle) implementations
//! and decode models for actions, workflows and configuration elements, plus a
//! typed [`VcoClient`] over the shared lifecycle layer.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod handles;
pub mod models;

pub use client::{VcoClient, VcoResource};
pub use handles::{ActionHandle, ConfigurationHandle, WorkflowHandle};
pub use models::{Action, Attribute, ConfigurationElement, Parameter, Workflow};

/// Convenient result alias that reuses the shared error type.
pub type Result<T> = vra_core::Result<T>;
