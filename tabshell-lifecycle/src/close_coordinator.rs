//! Window close negotiation.
//!
//! Before a window may be torn down every tab with a beforeunload hook gets
//! a chance to veto. A tab that agrees moves on to its unload teardown. The
//! coordinator keeps at most one beforeunload and at most one unload request
//! in flight per window, so tabs progress through both phases one at a time
//! while the two phases overlap across tabs.
//!
//! ```text
//!   request_close ──► before_unload set ──(proceed)──► unload set ──(closed)──► gone
//!                          │
//!                          └──(veto)──► both sets cleared, Idle
//! ```
//!
//! Nothing here times out. If the content layer never answers, the close
//! stays pending until the caller forces the tab out with
//! [`TabCloseCoordinator::on_tab_removed`] and `immediate = true`.

use std::collections::VecDeque;

use crate::event_loop::LoopHandle;
use crate::host::UnloadHandler;
use crate::ids::{TabId, WindowId};
use crate::task::{Task, WindowTask};

/// Answer to a close request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    /// No tab needs to be asked; the window may close right away.
    ProceedNow,
    /// The handshake is running; completion or cancellation comes later.
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CloseState {
    #[default]
    Idle,
    Closing,
}

/// Where a close attempt stands after an event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseProgress {
    /// No close attempt is running.
    NotClosing,
    /// Still waiting on the content layer.
    Pending,
    /// The attempt was vetoed by this event. Reported once per attempt.
    Cancelled,
    /// Every tab has been handled; the window may close. Reported once per
    /// attempt.
    ReadyToClose,
}

/// Result of [`TabCloseCoordinator::on_before_unload_result`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeforeUnloadOutcome {
    /// Whether the caller should go on to fire unload itself. Always `false`
    /// while a close attempt is running, because the coordinator schedules
    /// every unload of the attempt.
    pub proceed_to_fire_unload: bool,
    pub progress: CloseProgress,
}

/// Per-window beforeunload/unload state machine.
pub struct TabCloseCoordinator {
    window: WindowId,
    loop_handle: LoopHandle<Task>,
    state: CloseState,
    /// Tabs still to be asked (or being asked) whether they may close.
    before_unload: VecDeque<TabId>,
    /// Tabs that agreed and still need their unload run.
    unload: VecDeque<TabId>,
    before_unload_in_flight: Option<TabId>,
    unload_in_flight: Option<TabId>,
    /// Latch so `ReadyToClose` is reported once per attempt.
    completion_reported: bool,
}

impl TabCloseCoordinator {
    pub fn new(window: WindowId, loop_handle: LoopHandle<Task>) -> Self {
        Self {
            window,
            loop_handle,
            state: CloseState::Idle,
            before_unload: VecDeque::new(),
            unload: VecDeque::new(),
            before_unload_in_flight: None,
            unload_in_flight: None,
            completion_reported: false,
        }
    }

    pub fn state(&self) -> CloseState {
        self.state
    }

    pub fn is_closing(&self) -> bool {
        self.state == CloseState::Closing
    }

    /// Tabs waiting on beforeunload, head first.
    pub fn pending_before_unload(&self) -> impl Iterator<Item = TabId> + '_ {
        self.before_unload.iter().copied()
    }

    /// Tabs waiting on unload, head first.
    pub fn pending_unload(&self) -> impl Iterator<Item = TabId> + '_ {
        self.unload.iter().copied()
    }

    /// Whether `tab` is part of the running close attempt.
    pub fn is_tracking(&self, tab: TabId) -> bool {
        self.before_unload.contains(&tab) || self.unload.contains(&tab)
    }

    /// Begin a close attempt.
    ///
    /// Repeated requests while one is running return `Pending` and leave the
    /// attempt untouched.
    pub fn request_close(&mut self, host: &mut impl UnloadHandler) -> CloseDecision {
        if self.is_closing() {
            log::debug!(
                "{}: close already in progress ({} awaiting beforeunload, {} awaiting unload)",
                self.window,
                self.before_unload.len(),
                self.unload.len()
            );
            return CloseDecision::Pending;
        }

        let needs_before_unload: VecDeque<TabId> = host
            .tab_ids()
            .into_iter()
            .filter(|tab| host.needs_before_unload(*tab))
            .collect();

        if needs_before_unload.is_empty() {
            log::debug!("{}: no tab needs beforeunload, closing now", self.window);
            return CloseDecision::ProceedNow;
        }

        log::info!(
            "{}: starting close handshake with {} tab(s)",
            self.window,
            needs_before_unload.len()
        );
        self.state = CloseState::Closing;
        self.before_unload = needs_before_unload;
        self.unload.clear();
        self.before_unload_in_flight = None;
        self.unload_in_flight = None;
        self.completion_reported = false;

        match self.process_pending_tabs(host) {
            CloseProgress::ReadyToClose => CloseDecision::ProceedNow,
            _ => CloseDecision::Pending,
        }
    }

    /// Handle a tab's beforeunload answer.
    ///
    /// Outside a close attempt the answer passes through unchanged. An answer
    /// from a tab the running attempt is not waiting on is ignored.
    pub fn on_before_unload_result(
        &mut self,
        host: &mut impl UnloadHandler,
        tab: TabId,
        proceed: bool,
    ) -> BeforeUnloadOutcome {
        if !self.is_closing() {
            return BeforeUnloadOutcome {
                proceed_to_fire_unload: proceed,
                progress: CloseProgress::NotClosing,
            };
        }

        let Some(position) = self.before_unload.iter().position(|t| *t == tab) else {
            log::debug!(
                "{}: beforeunload answer from {} which is not awaiting one, ignoring",
                self.window,
                tab
            );
            return BeforeUnloadOutcome {
                proceed_to_fire_unload: false,
                progress: CloseProgress::Pending,
            };
        };

        if !proceed {
            log::info!("{}: {} vetoed close, cancelling", self.window, tab);
            self.reset();
            return BeforeUnloadOutcome {
                proceed_to_fire_unload: false,
                progress: CloseProgress::Cancelled,
            };
        }

        self.before_unload.remove(position);
        if self.before_unload_in_flight == Some(tab) {
            self.before_unload_in_flight = None;
        }
        self.unload.push_back(tab);
        log::debug!("{}: {} agreed to close", self.window, tab);

        BeforeUnloadOutcome {
            proceed_to_fire_unload: false,
            progress: self.process_pending_tabs(host),
        }
    }

    /// Forget `tab`, which has left the window.
    ///
    /// With `immediate` the attempt advances inside this call and may
    /// complete. Otherwise the advance is posted to the next loop turn so a
    /// caller iterating its own tab list is not re-entered.
    pub fn on_tab_removed(
        &mut self,
        host: &mut impl UnloadHandler,
        tab: TabId,
        immediate: bool,
    ) -> CloseProgress {
        self.before_unload.retain(|t| *t != tab);
        self.unload.retain(|t| *t != tab);
        if self.before_unload_in_flight == Some(tab) {
            self.before_unload_in_flight = None;
        }
        if self.unload_in_flight == Some(tab) {
            self.unload_in_flight = None;
        }

        if !self.is_closing() {
            return CloseProgress::NotClosing;
        }

        if immediate {
            self.process_pending_tabs(host)
        } else {
            self.loop_handle
                .post(Task::new(self.window, WindowTask::ProcessPendingTabs));
            CloseProgress::Pending
        }
    }

    /// Abandon the attempt, e.g. because an external policy refused the
    /// close after every tab agreed.
    pub fn cancel_close(&mut self) {
        if self.is_closing() {
            log::info!("{}: close cancelled", self.window);
        }
        self.reset();
    }

    /// True iff an attempt is running and no tab is left to handle.
    pub fn has_completed_unload_processing(&self) -> bool {
        self.is_closing() && self.before_unload.is_empty() && self.unload.is_empty()
    }

    /// Fire the next beforeunload and the next unload if none is in flight,
    /// or report completion.
    pub fn process_pending_tabs(&mut self, host: &mut impl UnloadHandler) -> CloseProgress {
        if !self.is_closing() {
            return CloseProgress::NotClosing;
        }

        if self.before_unload_in_flight.is_none() {
            while let Some(&tab) = self.before_unload.front() {
                if host.tab_exists(tab) {
                    self.before_unload_in_flight = Some(tab);
                    log::debug!("{}: firing beforeunload on {}", self.window, tab);
                    host.fire_before_unload(tab);
                    break;
                }
                // Already gone counts as done.
                self.before_unload.pop_front();
            }
        }

        if self.unload_in_flight.is_none() {
            while let Some(&tab) = self.unload.front() {
                if host.tab_exists(tab) {
                    self.unload_in_flight = Some(tab);
                    log::debug!("{}: firing unload on {}", self.window, tab);
                    host.fire_unload(tab);
                    break;
                }
                self.unload.pop_front();
            }
        }

        if self.has_completed_unload_processing() {
            if self.completion_reported {
                return CloseProgress::Pending;
            }
            self.completion_reported = true;
            log::info!("{}: all tabs handled, window may close", self.window);
            return CloseProgress::ReadyToClose;
        }
        CloseProgress::Pending
    }

    fn reset(&mut self) {
        self.state = CloseState::Idle;
        self.before_unload.clear();
        self.unload.clear();
        self.before_unload_in_flight = None;
        self.unload_in_flight = None;
        self.completion_reported = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_loop::EventLoop;
    use crate::host::TabStrip;
    use std::collections::HashSet;

    #[derive(Default)]
    struct FakeContent {
        tabs: Vec<TabId>,
        with_hook: HashSet<TabId>,
        before_unload_fired: Vec<TabId>,
        unload_fired: Vec<TabId>,
    }

    impl FakeContent {
        fn with_tabs(count: u64, hooked: &[u64]) -> Self {
            Self {
                tabs: (1..=count).map(TabId).collect(),
                with_hook: hooked.iter().copied().map(TabId).collect(),
                ..Self::default()
            }
        }
    }

    impl TabStrip for FakeContent {
        fn tab_ids(&self) -> Vec<TabId> {
            self.tabs.clone()
        }
        fn tab_exists(&self, tab: TabId) -> bool {
            self.tabs.contains(&tab)
        }
        fn selected_tab(&self) -> Option<TabId> {
            self.tabs.first().copied()
        }
        fn is_loading(&self, _tab: TabId) -> bool {
            false
        }
    }

    impl UnloadHandler for FakeContent {
        fn needs_before_unload(&self, tab: TabId) -> bool {
            self.with_hook.contains(&tab)
        }
        fn fire_before_unload(&mut self, tab: TabId) {
            self.before_unload_fired.push(tab);
        }
        fn fire_unload(&mut self, tab: TabId) {
            self.unload_fired.push(tab);
        }
    }

    fn coordinator() -> (TabCloseCoordinator, EventLoop<Task>) {
        let event_loop = EventLoop::new();
        (
            TabCloseCoordinator::new(WindowId(1), event_loop.handle()),
            event_loop,
        )
    }

    #[test]
    fn test_no_hooks_proceeds_without_closing() {
        let (mut coord, _loop) = coordinator();
        let mut content = FakeContent::with_tabs(3, &[]);

        assert_eq!(coord.request_close(&mut content), CloseDecision::ProceedNow);
        assert_eq!(coord.state(), CloseState::Idle);
        assert_eq!(coord.pending_before_unload().count(), 0);
        assert_eq!(coord.pending_unload().count(), 0);
        assert!(content.before_unload_fired.is_empty());
    }

    #[test]
    fn test_only_hooked_tabs_are_asked_and_one_at_a_time() {
        let (mut coord, _loop) = coordinator();
        let mut content = FakeContent::with_tabs(3, &[1, 3]);

        assert_eq!(coord.request_close(&mut content), CloseDecision::Pending);
        assert_eq!(content.before_unload_fired, vec![TabId(1)]);
        assert_eq!(
            coord.pending_before_unload().collect::<Vec<_>>(),
            vec![TabId(1), TabId(3)]
        );
    }

    #[test]
    fn test_duplicate_request_does_not_restart() {
        let (mut coord, _loop) = coordinator();
        let mut content = FakeContent::with_tabs(2, &[1, 2]);

        coord.request_close(&mut content);
        let before = coord.pending_before_unload().count();
        assert_eq!(coord.request_close(&mut content), CloseDecision::Pending);
        assert_eq!(coord.pending_before_unload().count(), before);
        assert_eq!(content.before_unload_fired.len(), 1);
    }

    #[test]
    fn test_answer_outside_close_passes_through() {
        let (mut coord, _loop) = coordinator();
        let mut content = FakeContent::with_tabs(1, &[1]);

        let outcome = coord.on_before_unload_result(&mut content, TabId(1), true);
        assert!(outcome.proceed_to_fire_unload);
        assert_eq!(outcome.progress, CloseProgress::NotClosing);

        let outcome = coord.on_before_unload_result(&mut content, TabId(1), false);
        assert!(!outcome.proceed_to_fire_unload);
    }

    #[test]
    fn test_untracked_answer_while_closing_is_ignored() {
        let (mut coord, _loop) = coordinator();
        let mut content = FakeContent::with_tabs(2, &[1]);
        coord.request_close(&mut content);

        let outcome = coord.on_before_unload_result(&mut content, TabId(2), false);
        assert!(!outcome.proceed_to_fire_unload);
        assert_eq!(outcome.progress, CloseProgress::Pending);
        assert!(coord.is_closing());
        assert_eq!(coord.pending_before_unload().count(), 1);

        let outcome = coord.on_before_unload_result(&mut content, TabId(2), true);
        assert!(!outcome.proceed_to_fire_unload);
        assert_eq!(coord.pending_unload().count(), 0);
        assert!(content.unload_fired.is_empty());
    }

    #[test]
    fn test_proceed_moves_tab_between_sets_atomically() {
        let (mut coord, _loop) = coordinator();
        let mut content = FakeContent::with_tabs(2, &[1, 2]);
        coord.request_close(&mut content);

        let outcome = coord.on_before_unload_result(&mut content, TabId(1), true);
        assert!(!outcome.proceed_to_fire_unload);
        assert!(!coord.pending_before_unload().any(|t| t == TabId(1)));
        assert_eq!(coord.pending_unload().collect::<Vec<_>>(), vec![TabId(1)]);
        assert_eq!(content.before_unload_fired, vec![TabId(1), TabId(2)]);
        assert_eq!(content.unload_fired, vec![TabId(1)]);
    }

    #[test]
    fn test_veto_clears_everything() {
        let (mut coord, _loop) = coordinator();
        let mut content = FakeContent::with_tabs(2, &[1, 2]);
        coord.request_close(&mut content);
        coord.on_before_unload_result(&mut content, TabId(1), true);

        let outcome = coord.on_before_unload_result(&mut content, TabId(2), false);
        assert_eq!(outcome.progress, CloseProgress::Cancelled);
        assert_eq!(coord.state(), CloseState::Idle);
        assert_eq!(coord.pending_before_unload().count(), 0);
        assert_eq!(coord.pending_unload().count(), 0);
        assert!(!coord.has_completed_unload_processing());
    }

    #[test]
    fn test_veto_then_retry_rescans_all_tabs() {
        let (mut coord, _loop) = coordinator();
        let mut content = FakeContent::with_tabs(2, &[1, 2]);
        coord.request_close(&mut content);
        coord.on_before_unload_result(&mut content, TabId(1), true);
        coord.on_before_unload_result(&mut content, TabId(2), false);

        assert_eq!(coord.request_close(&mut content), CloseDecision::Pending);
        assert_eq!(
            coord.pending_before_unload().collect::<Vec<_>>(),
            vec![TabId(1), TabId(2)]
        );
    }

    #[test]
    fn test_deferred_removal_posts_advance() {
        let (mut coord, event_loop) = coordinator();
        let mut content = FakeContent::with_tabs(1, &[1]);
        coord.request_close(&mut content);
        coord.on_before_unload_result(&mut content, TabId(1), true);

        content.tabs.clear();
        let progress = coord.on_tab_removed(&mut content, TabId(1), false);
        assert_eq!(progress, CloseProgress::Pending);
        assert!(coord.has_completed_unload_processing());
        assert_eq!(
            event_loop.pop_ready(),
            Some(Task::new(WindowId(1), WindowTask::ProcessPendingTabs))
        );

        assert_eq!(
            coord.process_pending_tabs(&mut content),
            CloseProgress::ReadyToClose
        );
        // Reported once.
        assert_eq!(coord.process_pending_tabs(&mut content), CloseProgress::Pending);
    }

    #[test]
    fn test_immediate_removal_completes_in_call() {
        let (mut coord, event_loop) = coordinator();
        let mut content = FakeContent::with_tabs(1, &[1]);
        coord.request_close(&mut content);

        content.tabs.clear();
        let progress = coord.on_tab_removed(&mut content, TabId(1), true);
        assert_eq!(progress, CloseProgress::ReadyToClose);
        assert!(event_loop.is_empty());
    }

    #[test]
    fn test_vanished_head_is_skipped() {
        let (mut coord, _loop) = coordinator();
        let mut content = FakeContent::with_tabs(2, &[1, 2]);
        coord.request_close(&mut content);

        // Tab 2 disappears without a removal notification; tab 1 agrees.
        content.tabs.retain(|t| *t != TabId(2));
        coord.on_before_unload_result(&mut content, TabId(1), true);
        assert_eq!(coord.pending_before_unload().count(), 0);
        assert_eq!(content.before_unload_fired, vec![TabId(1)]);
    }

    #[test]
    fn test_cancel_close_restores_idle() {
        let (mut coord, _loop) = coordinator();
        let mut content = FakeContent::with_tabs(1, &[1]);
        coord.request_close(&mut content);
        coord.on_before_unload_result(&mut content, TabId(1), true);

        coord.cancel_close();
        assert_eq!(coord.state(), CloseState::Idle);
        assert!(!coord.is_tracking(TabId(1)));
        assert!(!coord.has_completed_unload_processing());
    }
}
