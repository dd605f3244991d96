//! Typed errors for registry misuse.
//!
//! None of these are fatal: the registry leaves its state untouched and the
//! caller logs and carries on.

use crate::ids::WindowId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// `add` was called for a window that is already registered.
    #[error("{0} is already registered")]
    AlreadyRegistered(WindowId),

    /// `remove` was called for a window that is not registered, typically a
    /// second removal of the same window.
    #[error("{0} is not registered")]
    UnknownWindow(WindowId),

    /// `end_keep_alive` was called more often than `start_keep_alive`.
    #[error("keep-alive count is already zero")]
    KeepAliveUnderflow,
}
