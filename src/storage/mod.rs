//! Storage Layer
//!
//! Handles persistence: the JSON settings file and the key-value storage
//! area holding session state and the action log.

pub mod config;
pub mod kv;

pub use config::*;
pub use kv::*;
