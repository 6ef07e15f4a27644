//! Data Models
//!
//! Plain data structures used by the agent services.

pub mod command;
pub mod session;
pub mod settings;

pub use command::*;
pub use session::*;
pub use settings::*;
