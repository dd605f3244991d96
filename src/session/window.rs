//! Simulated browser window backing a scenario window.

use tabshell_lifecycle::{
    InvalidateFlags, LoopHandle, TabId, TabStrip, Task, UiUpdateTarget, UnloadHandler, WindowHost,
    WindowId, WindowOpenDisposition, WindowTask,
};

use super::{HostSettings, SessionTab, SharedStats, TabIdAllocator};
use crate::scenario::{BeforeUnloadPolicy, TabSpec};

/// One simulated browser window.
pub struct SessionWindow {
    id: WindowId,
    name: String,
    loop_handle: LoopHandle<Task>,
    tabs: Vec<SessionTab>,
    selected: Option<TabId>,
    settings: HostSettings,
    tab_ids: TabIdAllocator,
    stats: SharedStats,
}

impl SessionWindow {
    pub fn new(
        id: WindowId,
        name: impl Into<String>,
        loop_handle: LoopHandle<Task>,
        specs: &[TabSpec],
        settings: HostSettings,
        tab_ids: TabIdAllocator,
        stats: SharedStats,
    ) -> Self {
        let tabs: Vec<SessionTab> = specs
            .iter()
            .map(|spec| SessionTab::from_spec(tab_ids.allocate(), spec))
            .collect();
        Self {
            id,
            name: name.into(),
            loop_handle,
            selected: tabs.first().map(|tab| tab.id),
            tabs,
            settings,
            tab_ids,
            stats,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tabs(&self) -> &[SessionTab] {
        &self.tabs
    }

    pub fn tab(&self, tab: TabId) -> Option<&SessionTab> {
        self.tabs.iter().find(|t| t.id == tab)
    }

    /// Id of the tab at strip position `index`.
    pub fn tab_at(&self, index: usize) -> Option<TabId> {
        self.tabs.get(index).map(|tab| tab.id)
    }

    pub fn set_loading(&mut self, tab: TabId, loading: bool) {
        if let Some(t) = self.tabs.iter_mut().find(|t| t.id == tab) {
            t.loading = loading;
        }
    }

    /// Mark every download in this window as finished.
    pub fn finish_transfers(&mut self) {
        for tab in &mut self.tabs {
            tab.active_transfers = 0;
        }
    }

    pub fn active_transfers(&self) -> u32 {
        self.tabs.iter().map(|tab| tab.active_transfers).sum()
    }

    fn post_after(&self, kind: WindowTask, delay: std::time::Duration) {
        self.loop_handle.post_delayed(Task::new(self.id, kind), delay);
    }

    /// Post the caller-side deadline for `tab`, if one is configured.
    fn arm_deadline(&self, tab: TabId) {
        if let Some(timeout) = self.settings.unload_timeout {
            self.post_after(WindowTask::ForceTabClosed { tab }, timeout);
            self.stats.borrow_mut().deadlines_armed += 1;
        }
    }
}

impl TabStrip for SessionWindow {
    fn tab_ids(&self) -> Vec<TabId> {
        self.tabs.iter().map(|tab| tab.id).collect()
    }

    fn tab_exists(&self, tab: TabId) -> bool {
        self.tabs.iter().any(|t| t.id == tab)
    }

    fn selected_tab(&self) -> Option<TabId> {
        self.selected
    }

    fn is_loading(&self, tab: TabId) -> bool {
        self.tab(tab).is_some_and(|t| t.loading)
    }
}

impl UnloadHandler for SessionWindow {
    fn needs_before_unload(&self, tab: TabId) -> bool {
        self.tab(tab).is_some_and(SessionTab::has_before_unload)
    }

    fn fire_before_unload(&mut self, tab: TabId) {
        let Some(t) = self.tab(tab) else {
            return;
        };
        let (policy, delay) = (t.before_unload, t.reply_delay);
        self.stats.borrow_mut().before_unload_fired += 1;

        match policy {
            BeforeUnloadPolicy::None | BeforeUnloadPolicy::Accept => {
                self.post_after(WindowTask::BeforeUnloadReply { tab, proceed: true }, delay);
            }
            BeforeUnloadPolicy::Veto => {
                self.stats.borrow_mut().vetoes_sent += 1;
                self.post_after(WindowTask::BeforeUnloadReply { tab, proceed: false }, delay);
            }
            BeforeUnloadPolicy::Hang => {
                log::debug!(
                    "{} '{}': {} will not answer beforeunload",
                    self.id,
                    self.name,
                    tab
                );
            }
        }
        self.arm_deadline(tab);
    }

    fn fire_unload(&mut self, tab: TabId) {
        let Some(t) = self.tabs.iter_mut().find(|t| t.id == tab) else {
            return;
        };
        t.unloading = true;
        let delay = t.unload_delay;
        self.stats.borrow_mut().unload_fired += 1;
        self.post_after(WindowTask::TabClosed { tab }, delay);
        self.arm_deadline(tab);
    }
}

impl UiUpdateTarget for SessionWindow {
    fn apply_immediate(&mut self, tab: TabId, flags: InvalidateFlags) {
        self.stats.borrow_mut().immediate_updates += 1;
        log::trace!("{}: immediate {:?} for {}", self.id, flags, tab);
    }

    fn apply_tab_update(&mut self, tab: TabId, flags: InvalidateFlags) {
        self.stats.borrow_mut().tab_updates += 1;
        log::trace!("{}: strip {:?} for {}", self.id, flags, tab);
    }

    fn apply_active_tab_update(&mut self, tab: TabId, flags: InvalidateFlags) {
        self.stats.borrow_mut().active_tab_updates += 1;
        log::trace!("{}: chrome {:?} for {}", self.id, flags, tab);
    }
}

impl WindowHost for SessionWindow {
    fn add_tab(&mut self, disposition: WindowOpenDisposition) -> Option<TabId> {
        if disposition == WindowOpenDisposition::NewWindow {
            log::debug!("{}: new windows are opened by the process, not by a tab strip", self.id);
            return None;
        }
        let tab = SessionTab::blank(self.tab_ids.allocate());
        let id = tab.id;
        self.tabs.push(tab);
        if disposition != WindowOpenDisposition::NewBackgroundTab {
            self.selected = Some(id);
        }
        Some(id)
    }

    fn select_tab_at(&mut self, index: usize) -> Option<TabId> {
        let tab = self.tab_at(index)?;
        self.selected = Some(tab);
        Some(tab)
    }

    fn remove_tab(&mut self, tab: TabId) -> bool {
        let Some(index) = self.tabs.iter().position(|t| t.id == tab) else {
            return false;
        };
        self.tabs.remove(index);
        if self.selected == Some(tab) {
            // Select the right neighbour, or the new last tab.
            let next = index.min(self.tabs.len().saturating_sub(1));
            self.selected = self.tab_at(next);
        }
        true
    }

    fn can_close(&self) -> bool {
        if !self.settings.block_close_with_active_transfers {
            return true;
        }
        let transfers = self.active_transfers();
        if transfers > 0 {
            log::info!(
                "{} '{}': {} transfer(s) still active, keeping window open",
                self.id,
                self.name,
                transfers
            );
            self.stats.borrow_mut().close_refused += 1;
            return false;
        }
        true
    }

    fn close_cancelled(&mut self) {
        self.stats.borrow_mut().close_cancelled += 1;
        log::info!("{} '{}': close cancelled, window stays open", self.id, self.name);
    }

    fn destroy(&mut self) {
        self.stats.borrow_mut().windows_destroyed += 1;
        self.tabs.clear();
        self.selected = None;
    }
}
