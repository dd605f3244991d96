//! Configuration system for the tabshell session shell.
//!
//! This crate provides configuration loading, saving, validation, and default
//! values for the window lifecycle controller and the session host:
//!
//! - UI update coalescing window
//! - Caller-side unload deadline for unresponsive tabs
//! - Quit-on-last-window policy
//! - Active-transfer close guard
//! - Log verbosity

pub mod config;
pub mod defaults;
pub mod error;
mod types;

pub use config::Config;
pub use error::ConfigError;
pub use types::LogLevel;
