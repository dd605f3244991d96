//! Coalescing of per-tab UI invalidations.
//!
//! Tabs report changes far more often than the window needs to repaint.
//! [`UiUpdateScheduler`] applies a small fixed subset right away so the
//! window feels responsive, and ORs the rest into a per-tab pending mask
//! that is applied by a single delayed flush.
//!
//! Applied at schedule time:
//! - `URL` for the selected tab (location field)
//! - `LOAD` (loading indicator), which is also kept for the batched pass
//! - `TITLE` while the tab is not loading
//!
//! At most one flush task is outstanding per window. A flush that finds its
//! entries cancelled simply does nothing.

use std::time::Duration;

use crate::event_loop::LoopHandle;
use crate::flags::InvalidateFlags;
use crate::host::UiUpdateTarget;
use crate::ids::{TabId, WindowId};
use crate::task::{Task, WindowTask};

/// Per-window coalescing scheduler for tab UI updates.
pub struct UiUpdateScheduler {
    window: WindowId,
    loop_handle: LoopHandle<Task>,
    coalesce_interval: Duration,
    /// Outstanding batched flags in first-scheduled order.
    pending: Vec<(TabId, InvalidateFlags)>,
    flush_scheduled: bool,
}

impl UiUpdateScheduler {
    pub fn new(
        window: WindowId,
        loop_handle: LoopHandle<Task>,
        coalesce_interval: Duration,
    ) -> Self {
        Self {
            window,
            loop_handle,
            coalesce_interval,
            pending: Vec::new(),
            flush_scheduled: false,
        }
    }

    /// Record that `flags` changed for `tab`.
    pub fn schedule_update(
        &mut self,
        target: &mut impl UiUpdateTarget,
        tab: TabId,
        flags: InvalidateFlags,
    ) {
        let mut batched = flags;
        let mut immediate = InvalidateFlags::empty();

        if batched.contains(InvalidateFlags::URL) && target.selected_tab() == Some(tab) {
            immediate |= InvalidateFlags::URL;
            batched.remove(InvalidateFlags::URL);
        }
        if batched.contains(InvalidateFlags::LOAD) {
            immediate |= InvalidateFlags::LOAD;
        }
        if batched.contains(InvalidateFlags::TITLE) && !target.is_loading(tab) {
            // Whether the title changed while idle is only knowable now.
            immediate |= InvalidateFlags::TITLE;
            batched.remove(InvalidateFlags::TITLE);
        }

        if !immediate.is_empty() {
            target.apply_immediate(tab, immediate);
        }

        if batched.is_empty() {
            return;
        }

        match self.pending.iter_mut().find(|(t, _)| *t == tab) {
            Some((_, pending)) => *pending |= batched,
            None => self.pending.push((tab, batched)),
        }

        if !self.flush_scheduled {
            self.flush_scheduled = true;
            self.loop_handle.post_delayed(
                Task::new(self.window, WindowTask::FlushUiUpdates),
                self.coalesce_interval,
            );
            log::trace!(
                "{}: UI flush scheduled in {:?}",
                self.window,
                self.coalesce_interval
            );
        }
    }

    /// Apply every pending update. Runs once per posted flush task.
    ///
    /// Returns the number of entries that reached the target.
    pub fn flush(&mut self, target: &mut impl UiUpdateTarget) -> usize {
        self.flush_scheduled = false;
        let updates = std::mem::take(&mut self.pending);
        let selected = target.selected_tab();
        let mut applied = 0;

        for (tab, flags) in updates {
            if !target.tab_exists(tab) {
                log::trace!("{}: dropping UI update for closed {}", self.window, tab);
                continue;
            }
            let tab_flags = flags.tab_scoped();
            if !tab_flags.is_empty() {
                target.apply_tab_update(tab, tab_flags);
            }
            if selected == Some(tab) {
                let active_flags = flags.active_scoped();
                if !active_flags.is_empty() {
                    target.apply_active_tab_update(tab, active_flags);
                }
            }
            applied += 1;
        }
        applied
    }

    /// Drop any pending update for `tab` without flushing early.
    pub fn cancel(&mut self, tab: TabId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|(t, _)| *t != tab);
        before != self.pending.len()
    }

    /// Batched flags waiting for `tab`, if any.
    pub fn pending_flags(&self, tab: TabId) -> Option<InvalidateFlags> {
        self.pending
            .iter()
            .find(|(t, _)| *t == tab)
            .map(|(_, flags)| *flags)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_flush_scheduled(&self) -> bool {
        self.flush_scheduled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_loop::EventLoop;
    use crate::host::TabStrip;

    #[derive(Default)]
    struct RecordingView {
        tabs: Vec<TabId>,
        selected: Option<TabId>,
        loading: Vec<TabId>,
        immediate: Vec<(TabId, InvalidateFlags)>,
        tab_updates: Vec<(TabId, InvalidateFlags)>,
        active_updates: Vec<(TabId, InvalidateFlags)>,
    }

    impl TabStrip for RecordingView {
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

    impl UiUpdateTarget for RecordingView {
        fn apply_immediate(&mut self, tab: TabId, flags: InvalidateFlags) {
            self.immediate.push((tab, flags));
        }
        fn apply_tab_update(&mut self, tab: TabId, flags: InvalidateFlags) {
            self.tab_updates.push((tab, flags));
        }
        fn apply_active_tab_update(&mut self, tab: TabId, flags: InvalidateFlags) {
            self.active_updates.push((tab, flags));
        }
    }

    fn setup() -> (UiUpdateScheduler, EventLoop<Task>, RecordingView) {
        let event_loop = EventLoop::new();
        let scheduler =
            UiUpdateScheduler::new(WindowId(7), event_loop.handle(), Duration::from_millis(200));
        let view = RecordingView {
            tabs: vec![TabId(1), TabId(2)],
            selected: Some(TabId(1)),
            ..RecordingView::default()
        };
        (scheduler, event_loop, view)
    }

    #[test]
    fn test_selected_url_is_applied_immediately_and_not_batched() {
        let (mut scheduler, event_loop, mut view) = setup();
        scheduler.schedule_update(&mut view, TabId(1), InvalidateFlags::URL);

        assert_eq!(view.immediate, vec![(TabId(1), InvalidateFlags::URL)]);
        assert_eq!(scheduler.pending_flags(TabId(1)), None);
        assert!(!scheduler.is_flush_scheduled());
        assert!(event_loop.is_empty());
    }

    #[test]
    fn test_background_url_is_batched() {
        let (mut scheduler, _loop, mut view) = setup();
        scheduler.schedule_update(&mut view, TabId(2), InvalidateFlags::URL);

        assert!(view.immediate.is_empty());
        assert_eq!(scheduler.pending_flags(TabId(2)), Some(InvalidateFlags::URL));
    }

    #[test]
    fn test_load_is_applied_now_and_kept() {
        let (mut scheduler, _loop, mut view) = setup();
        scheduler.schedule_update(&mut view, TabId(2), InvalidateFlags::LOAD);

        assert_eq!(view.immediate, vec![(TabId(2), InvalidateFlags::LOAD)]);
        assert_eq!(scheduler.pending_flags(TabId(2)), Some(InvalidateFlags::LOAD));
    }

    #[test]
    fn test_title_while_loading_is_batched() {
        let (mut scheduler, _loop, mut view) = setup();
        view.loading.push(TabId(2));
        scheduler.schedule_update(&mut view, TabId(2), InvalidateFlags::TITLE);

        assert!(view.immediate.is_empty());
        assert_eq!(scheduler.pending_flags(TabId(2)), Some(InvalidateFlags::TITLE));

        view.loading.clear();
        scheduler.schedule_update(&mut view, TabId(1), InvalidateFlags::TITLE);
        assert_eq!(view.immediate, vec![(TabId(1), InvalidateFlags::TITLE)]);
        assert_eq!(scheduler.pending_flags(TabId(1)), None);
    }

    #[test]
    fn test_single_flush_task_for_many_updates() {
        let (mut scheduler, event_loop, mut view) = setup();
        scheduler.schedule_update(&mut view, TabId(2), InvalidateFlags::TAB);
        scheduler.schedule_update(&mut view, TabId(1), InvalidateFlags::PAGE_ACTIONS);
        scheduler.schedule_update(&mut view, TabId(2), InvalidateFlags::URL);

        assert_eq!(event_loop.len(), 1);
        assert_eq!(
            scheduler.pending_flags(TabId(2)),
            Some(InvalidateFlags::TAB | InvalidateFlags::URL)
        );
    }

    #[test]
    fn test_flush_scopes_updates_to_selection() {
        let (mut scheduler, _loop, mut view) = setup();
        scheduler.schedule_update(
            &mut view,
            TabId(1),
            InvalidateFlags::PAGE_ACTIONS | InvalidateFlags::TAB,
        );
        scheduler.schedule_update(&mut view, TabId(2), InvalidateFlags::URL | InvalidateFlags::TAB);

        assert_eq!(scheduler.flush(&mut view), 2);
        assert_eq!(
            view.tab_updates,
            vec![(TabId(1), InvalidateFlags::TAB), (TabId(2), InvalidateFlags::TAB)]
        );
        assert_eq!(
            view.active_updates,
            vec![(TabId(1), InvalidateFlags::PAGE_ACTIONS | InvalidateFlags::TAB)]
        );
        assert_eq!(scheduler.pending_count(), 0);
        assert!(!scheduler.is_flush_scheduled());
    }

    #[test]
    fn test_flush_skips_closed_tabs() {
        let (mut scheduler, _loop, mut view) = setup();
        scheduler.schedule_update(&mut view, TabId(2), InvalidateFlags::TAB);
        view.tabs.retain(|t| *t != TabId(2));

        assert_eq!(scheduler.flush(&mut view), 0);
        assert!(view.tab_updates.is_empty());
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn test_cancel_removes_entry_without_flushing() {
        let (mut scheduler, event_loop, mut view) = setup();
        scheduler.schedule_update(&mut view, TabId(2), InvalidateFlags::TAB);

        assert!(scheduler.cancel(TabId(2)));
        assert!(!scheduler.cancel(TabId(2)));
        assert!(view.tab_updates.is_empty());
        // The task still runs and is a no-op.
        assert_eq!(event_loop.len(), 1);
        assert_eq!(scheduler.flush(&mut view), 0);
    }

    #[test]
    fn test_new_flush_scheduled_after_previous_ran() {
        let (mut scheduler, event_loop, mut view) = setup();
        scheduler.schedule_update(&mut view, TabId(2), InvalidateFlags::TAB);
        event_loop.advance_by(Duration::from_millis(200));
        assert!(event_loop.pop_ready().is_some());
        scheduler.flush(&mut view);

        scheduler.schedule_update(&mut view, TabId(2), InvalidateFlags::TAB);
        assert!(scheduler.is_flush_scheduled());
        assert_eq!(event_loop.len(), 1);
        assert_eq!(
            event_loop.next_deadline(),
            Some(Duration::from_millis(400))
        );
    }
}
