//! Simulated content and view layer.
//!
//! [`SessionWindow`] implements the lifecycle host traits over a list of
//! [`SessionTab`]s. Content-layer answers (beforeunload replies, unload
//! completion, caller-side deadlines) are posted to the process loop with
//! the delays declared in the scenario.

mod tab;
mod window;

pub use tab::SessionTab;
pub use window::SessionWindow;

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use tabshell_config::Config;
use tabshell_lifecycle::TabId;

/// Host-side settings taken from the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostSettings {
    pub unload_timeout: Option<Duration>,
    pub block_close_with_active_transfers: bool,
}

impl HostSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            unload_timeout: config.unload_timeout(),
            block_close_with_active_transfers: config.block_close_with_active_transfers,
        }
    }
}

/// Hands out process-unique tab ids.
#[derive(Debug, Clone, Default)]
pub struct TabIdAllocator {
    next: Rc<Cell<u64>>,
}

impl TabIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&self) -> TabId {
        let id = self.next.get() + 1;
        self.next.set(id);
        TabId(id)
    }
}

/// Counters shared by every window, reported in the run summary.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionStats {
    pub before_unload_fired: usize,
    pub unload_fired: usize,
    pub vetoes_sent: usize,
    pub deadlines_armed: usize,
    pub close_cancelled: usize,
    pub close_refused: usize,
    pub windows_destroyed: usize,
    pub immediate_updates: usize,
    pub tab_updates: usize,
    pub active_tab_updates: usize,
}

pub type SharedStats = Rc<RefCell<SessionStats>>;
