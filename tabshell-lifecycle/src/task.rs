//! Messages carried by the process event loop.

use crate::ids::{TabId, WindowId};

/// A unit of deferred work addressed to one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Task {
    pub window: WindowId,
    pub kind: WindowTask,
}

impl Task {
    pub fn new(window: WindowId, kind: WindowTask) -> Self {
        Self { window, kind }
    }
}

/// What a [`Task`] asks its window to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowTask {
    /// Coalesced UI update tick.
    FlushUiUpdates,
    /// Advance the close handshake after a deferred tab removal.
    ProcessPendingTabs,
    /// The content layer answered a beforeunload request.
    BeforeUnloadReply { tab: TabId, proceed: bool },
    /// The content layer finished tearing down a tab.
    TabClosed { tab: TabId },
    /// The caller's deadline for a tab expired; drop it from the close
    /// attempt and advance synchronously.
    ForceTabClosed { tab: TabId },
}
