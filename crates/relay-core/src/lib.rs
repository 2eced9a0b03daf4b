//! Relay CI Core
//!
//! Core domain types, traits, and error handling for Relay CI.
//! This crate has minimal dependencies and defines the shared vocabulary
//! used by the scheduler and the command-line interface.

pub mod dispatch;
pub mod error;
pub mod ids;
pub mod ports;
pub mod task;

pub use error::{Error, Result};
pub use ids::*;
