//! Shared integration test helpers for tabshell-lifecycle.
//!
//! [`ScriptedHost`] is a window whose content layer never answers on its
//! own: tests post the answers (`BeforeUnloadReply`, `TabClosed`) through
//! the process loop handle, which makes every interleaving explicit. Calls
//! made by the controller are recorded in a shared [`HostLog`] so they stay
//! inspectable after the window has been destroyed and dropped.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;

use tabshell_config::Config;
use tabshell_lifecycle::{
    BrowserProcess, InvalidateFlags, RegistryObserver, TabId, TabStrip, Task, UiUpdateTarget,
    UnloadHandler, WindowHost, WindowId, WindowOpenDisposition, WindowTask,
};

/// Everything the controller did to one window.
#[derive(Debug, Default)]
pub struct HostLog {
    pub before_unload_fired: Vec<TabId>,
    pub unload_fired: Vec<TabId>,
    pub immediate: Vec<(TabId, InvalidateFlags)>,
    pub tab_updates: Vec<(TabId, InvalidateFlags)>,
    pub active_updates: Vec<(TabId, InvalidateFlags)>,
    pub close_cancelled: usize,
    pub destroyed: usize,
}

pub type SharedLog = Rc<RefCell<HostLog>>;

pub struct ScriptedHost {
    tabs: Vec<TabId>,
    selected: Option<TabId>,
    hooked: HashSet<TabId>,
    loading: HashSet<TabId>,
    next_tab: u64,
    pub allow_close: bool,
    pub log: SharedLog,
}

impl ScriptedHost {
    /// A window with tabs `1..=count`, the first one selected, where the
    /// tabs listed in `hooked` have a beforeunload hook.
    pub fn new(count: u64, hooked: &[u64]) -> Self {
        let tabs: Vec<TabId> = (1..=count).map(TabId).collect();
        Self {
            selected: tabs.first().copied(),
            tabs,
            hooked: hooked.iter().copied().map(TabId).collect(),
            loading: HashSet::new(),
            next_tab: count + 1,
            allow_close: true,
            log: SharedLog::default(),
        }
    }

    pub fn set_loading(&mut self, tab: TabId, loading: bool) {
        if loading {
            self.loading.insert(tab);
        } else {
            self.loading.remove(&tab);
        }
    }
}

impl TabStrip for ScriptedHost {
    fn tab_ids(&self) -> Vec<TabId> {
        self.tabs.clone()
    }

    fn tab_exists(&self, tab: TabId) -> bool {
        self.tabs.contains(&tab)
    }

    fn selected_tab(&self) -> Option<TabId> {
        self.selected
    }

    fn is_loading(&self, tab: TabId) -> bool {
        self.loading.contains(&tab)
    }
}

impl UnloadHandler for ScriptedHost {
    fn needs_before_unload(&self, tab: TabId) -> bool {
        self.hooked.contains(&tab)
    }

    fn fire_before_unload(&mut self, tab: TabId) {
        self.log.borrow_mut().before_unload_fired.push(tab);
    }

    fn fire_unload(&mut self, tab: TabId) {
        self.log.borrow_mut().unload_fired.push(tab);
    }
}

impl UiUpdateTarget for ScriptedHost {
    fn apply_immediate(&mut self, tab: TabId, flags: InvalidateFlags) {
        self.log.borrow_mut().immediate.push((tab, flags));
    }

    fn apply_tab_update(&mut self, tab: TabId, flags: InvalidateFlags) {
        self.log.borrow_mut().tab_updates.push((tab, flags));
    }

    fn apply_active_tab_update(&mut self, tab: TabId, flags: InvalidateFlags) {
        self.log.borrow_mut().active_updates.push((tab, flags));
    }
}

impl WindowHost for ScriptedHost {
    fn add_tab(&mut self, disposition: WindowOpenDisposition) -> Option<TabId> {
        let tab = TabId(self.next_tab);
        self.next_tab += 1;
        self.tabs.push(tab);
        if disposition != WindowOpenDisposition::NewBackgroundTab {
            self.selected = Some(tab);
        }
        Some(tab)
    }

    fn select_tab_at(&mut self, index: usize) -> Option<TabId> {
        let tab = *self.tabs.get(index)?;
        self.selected = Some(tab);
        Some(tab)
    }

    fn remove_tab(&mut self, tab: TabId) -> bool {
        let Some(index) = self.tabs.iter().position(|t| *t == tab) else {
            return false;
        };
        self.tabs.remove(index);
        if self.selected == Some(tab) {
            self.selected = self
                .tabs
                .get(index.min(self.tabs.len().saturating_sub(1)))
                .copied();
        }
        true
    }

    fn can_close(&self) -> bool {
        self.allow_close
    }

    fn close_cancelled(&mut self) {
        self.log.borrow_mut().close_cancelled += 1;
    }

    fn destroy(&mut self) {
        self.log.borrow_mut().destroyed += 1;
    }
}

/// Counts registry notifications.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub added: RefCell<Vec<WindowId>>,
    pub removed: RefCell<Vec<WindowId>>,
    pub activated: RefCell<Vec<WindowId>>,
    pub terminating: RefCell<usize>,
}

impl RegistryObserver for RecordingObserver {
    fn on_window_added(&self, window: WindowId) {
        self.added.borrow_mut().push(window);
    }

    fn on_window_removed(&self, window: WindowId) {
        self.removed.borrow_mut().push(window);
    }

    fn on_window_activated(&self, window: WindowId) {
        self.activated.borrow_mut().push(window);
    }

    fn on_app_terminating(&self) {
        *self.terminating.borrow_mut() += 1;
    }
}

/// A process with default config and a registered [`RecordingObserver`].
pub fn process_with_observer() -> (BrowserProcess<ScriptedHost>, Rc<RecordingObserver>) {
    let mut process = BrowserProcess::new(Config::default());
    let observer = Rc::new(RecordingObserver::default());
    process.registry_mut().add_observer(observer.clone());
    (process, observer)
}

/// Open a window from `host` and return its id and call log.
pub fn open(
    process: &mut BrowserProcess<ScriptedHost>,
    host: ScriptedHost,
) -> (WindowId, SharedLog) {
    let log = Rc::clone(&host.log);
    let id = process.open_window(|_, _| host);
    (id, log)
}

/// Deliver a beforeunload answer on the next loop turn.
pub fn reply(process: &BrowserProcess<ScriptedHost>, window: WindowId, tab: u64, proceed: bool) {
    process.loop_handle().post(Task::new(
        window,
        WindowTask::BeforeUnloadReply {
            tab: TabId(tab),
            proceed,
        },
    ));
}

/// Report that a tab's unload finished on the next loop turn.
pub fn closed(process: &BrowserProcess<ScriptedHost>, window: WindowId, tab: u64) {
    process
        .loop_handle()
        .post(Task::new(window, WindowTask::TabClosed { tab: TabId(tab) }));
}

/// Arm a caller-side deadline that forces `tab` out after `after`.
pub fn deadline(
    process: &BrowserProcess<ScriptedHost>,
    window: WindowId,
    tab: u64,
    after: Duration,
) {
    process.loop_handle().post_delayed(
        Task::new(window, WindowTask::ForceTabClosed { tab: TabId(tab) }),
        after,
    );
}

pub fn tabs(ids: &[u64]) -> Vec<TabId> {
    ids.iter().copied().map(TabId).collect()
}
