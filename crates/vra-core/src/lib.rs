//! # vra-core
//!
//! Core types and utilities for talking to the vRA automation API.
//!
//! This crate provides the shared error taxonomy, provider configuration and
//! the HTTP transport that the lifecycle layer drives.
//!
//! ## Modules
//!
//! - [`error`] - Error taxonomy shared by every crate in the workspace
//! - [`uuid`] - Strongly-typed identifiers for remote objects
//! - [`config`] - Provider configuration with validation
//! - [`client`] - HTTP transport, token sources and delete convergence policy
//! - [`cancel`] - Cancellation tokens for lifecycle calls
//! - [`query`] - Query parameter builder

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cancel;
pub mod client;
pub mod config;
pub mod error;
pub mod query;
pub mod uuid;

// Re-export commonly used types
pub use cancel::{deadline_after, CancelHandle, CancelToken};
pub use error::{Error, Result};
