//! A single simulated tab.

use std::time::Duration;

use tabshell_lifecycle::TabId;

use crate::scenario::{BeforeUnloadPolicy, TabSpec};

/// Content-side state of one tab.
#[derive(Debug, Clone)]
pub struct SessionTab {
    pub id: TabId,
    pub title: String,
    pub url: String,
    pub before_unload: BeforeUnloadPolicy,
    pub reply_delay: Duration,
    pub unload_delay: Duration,
    pub active_transfers: u32,
    pub loading: bool,
    /// Set once unload has been fired; the tab is on its way out.
    pub unloading: bool,
}

impl SessionTab {
    pub fn from_spec(id: TabId, spec: &TabSpec) -> Self {
        Self {
            id,
            title: spec.title.clone(),
            url: spec.url.clone(),
            before_unload: spec.before_unload,
            reply_delay: Duration::from_millis(spec.reply_delay_ms),
            unload_delay: Duration::from_millis(spec.unload_delay_ms),
            active_transfers: spec.active_transfers,
            loading: spec.loading,
            unloading: false,
        }
    }

    /// A blank tab opened by a `NewTab` command.
    pub fn blank(id: TabId) -> Self {
        Self::from_spec(id, &TabSpec::titled("New Tab"))
    }

    pub fn has_before_unload(&self) -> bool {
        self.before_unload != BeforeUnloadPolicy::None
    }
}
