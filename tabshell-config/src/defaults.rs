//! Default values for configuration fields.
//!
//! Referenced from `#[serde(default = "...")]` attributes so a partial YAML
//! file only overrides what it names.

/// Coalescing window for batched tab UI updates.
pub fn ui_update_coalesce_ms() -> u64 {
    200
}

/// Deadline before an unresponsive tab is force-removed from a close attempt.
pub fn unload_timeout_ms() -> Option<u64> {
    Some(5000)
}

pub fn bool_true() -> bool {
    true
}
