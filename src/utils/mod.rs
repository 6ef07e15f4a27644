//! Utilities
//!
//! Error types and path helpers shared across the crate.

pub mod error;
pub mod paths;

pub use error::*;
pub use paths::*;
