//! csvrelay Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared plumbing for the csvrelay workspace:
//!
//! - **Logging**: `tracing` subscriber setup driven by [`logging::LogConfig`]
//! - **Environment**: typed lookups of required and optional variables

pub mod env;
pub mod error;
pub mod logging;

pub use error::{EnvError, Result};
