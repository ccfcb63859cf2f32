//! Standard host library

pub mod builtins;
pub mod math;

pub use builtins::HostRegistry;
