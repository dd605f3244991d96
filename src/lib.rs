// Library exports for the tabshell binary and its integration tests.

/// Application version (root crate version, for use by sub-crates).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[macro_use]
pub mod debug;

pub mod app;
pub mod cli;
pub mod scenario;
pub mod session;

pub use app::{App, Summary};
pub use scenario::Scenario;
