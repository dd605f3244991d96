//! Per-window lifecycle controller.
//!
//! [`BrowserLifecycleController`] owns a window's host together with its
//! [`TabCloseCoordinator`], [`UiUpdateScheduler`] and [`CommandGate`]. Every
//! command that closes the window goes through `request_close`, and every
//! command that changes tabs or the selection invalidates through
//! `schedule_update`, so the invariants of both leaves hold no matter which
//! entry point the window layer uses.
//!
//! Results that need process-wide action (destroying the window, aborting a
//! quit) are handed back as [`WindowSignal`]s for [`crate::BrowserProcess`]
//! to act on.

use tabshell_config::Config;

use crate::close_coordinator::{CloseDecision, CloseProgress, CloseState, TabCloseCoordinator};
use crate::command::{Command, CommandGate, GateOutcome, WindowOpenDisposition};
use crate::event_loop::LoopHandle;
use crate::flags::InvalidateFlags;
use crate::host::WindowHost;
use crate::ids::{TabId, WindowId};
use crate::task::{Task, WindowTask};
use crate::update_scheduler::UiUpdateScheduler;

/// Something the process has to act on after a window handled an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSignal {
    None,
    /// A close attempt was vetoed; the window stays open.
    CloseCancelled,
    /// The window has nothing left to wait for and may be destroyed.
    ReadyToClose,
}

/// Result of [`BrowserLifecycleController::execute_command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Executed,
    /// The command had nothing to act on (no tab at that index, ...).
    Ignored,
    /// Execution is blocked; the command was remembered.
    Blocked,
    /// Execution is blocked and a command is already remembered; this one
    /// was discarded.
    Dropped,
    /// `CloseWindow` ran; carries the close decision.
    Close(CloseDecision),
    /// `Exit` ran; the process should close every window.
    ExitRequested,
}

/// Flags invalidated on the newly selected tab.
const SELECTION_FLAGS: InvalidateFlags = InvalidateFlags::URL
    .union(InvalidateFlags::TITLE)
    .union(InvalidateFlags::LOAD)
    .union(InvalidateFlags::PAGE_ACTIONS);

/// Flags invalidated on a freshly opened tab.
const NEW_TAB_FLAGS: InvalidateFlags = InvalidateFlags::TAB
    .union(InvalidateFlags::TITLE)
    .union(InvalidateFlags::URL);

pub struct BrowserLifecycleController<H: WindowHost> {
    window: WindowId,
    host: H,
    loop_handle: LoopHandle<Task>,
    close: TabCloseCoordinator,
    updates: UiUpdateScheduler,
    gate: CommandGate,
}

impl<H: WindowHost> BrowserLifecycleController<H> {
    pub fn new(window: WindowId, host: H, loop_handle: LoopHandle<Task>, config: &Config) -> Self {
        Self {
            window,
            host,
            close: TabCloseCoordinator::new(window, loop_handle.clone()),
            updates: UiUpdateScheduler::new(
                window,
                loop_handle.clone(),
                config.ui_update_coalesce_interval(),
            ),
            loop_handle,
            gate: CommandGate::new(),
        }
    }

    pub fn window_id(&self) -> WindowId {
        self.window
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn close_coordinator(&self) -> &TabCloseCoordinator {
        &self.close
    }

    pub fn update_scheduler(&self) -> &UiUpdateScheduler {
        &self.updates
    }

    pub fn close_state(&self) -> CloseState {
        self.close.state()
    }

    pub fn has_completed_unload_processing(&self) -> bool {
        self.close.has_completed_unload_processing()
    }

    // ── Close contract ──────────────────────────────────────────────────────

    /// Ask the window to close. `ProceedNow` means the caller may run
    /// [`Self::finish_close`] right away.
    pub fn request_close(&mut self) -> CloseDecision {
        self.close.request_close(&mut self.host)
    }

    /// Abandon a running close attempt.
    pub fn cancel_close(&mut self) {
        self.close.cancel_close();
        self.drop_deadlines(None);
    }

    /// Apply the host's close policy once nothing is left to wait for.
    ///
    /// Returns `true` if the window was torn down. On refusal the close
    /// attempt is cancelled and the window stays fully open.
    pub fn finish_close(&mut self) -> bool {
        if !self.host.can_close() {
            log::info!("{}: close refused by host policy", self.window);
            self.cancel_close();
            self.host.close_cancelled();
            return false;
        }
        self.host.destroy();
        true
    }

    /// Tear the window down without asking any tab, for session end.
    pub fn force_close(&mut self) {
        self.close.cancel_close();
        self.host.destroy();
    }

    // ── UI updates ──────────────────────────────────────────────────────────

    pub fn schedule_update(&mut self, tab: TabId, flags: InvalidateFlags) {
        self.updates.schedule_update(&mut self.host, tab, flags);
    }

    // ── Commands ────────────────────────────────────────────────────────────

    pub fn set_block_command_execution(&mut self, block: bool) {
        self.gate.set_blocked(block);
    }

    pub fn last_blocked_command(&self) -> Option<(Command, WindowOpenDisposition)> {
        self.gate.last_blocked_command()
    }

    pub fn execute_command(
        &mut self,
        command: Command,
        disposition: WindowOpenDisposition,
    ) -> CommandOutcome {
        match self.gate.admit(command, disposition) {
            GateOutcome::Run => {}
            GateOutcome::Retained => return CommandOutcome::Blocked,
            GateOutcome::Dropped => return CommandOutcome::Dropped,
        }
        log::debug!("{}: executing {} ({:?})", self.window, command, disposition);

        match command {
            Command::NewTab => match self.host.add_tab(disposition) {
                Some(tab) => {
                    self.schedule_update(tab, NEW_TAB_FLAGS);
                    CommandOutcome::Executed
                }
                None => CommandOutcome::Ignored,
            },
            Command::CloseTab => {
                let selected = self.host.selected_tab();
                if selected.is_some_and(|tab| self.close_tab(tab)) {
                    CommandOutcome::Executed
                } else {
                    CommandOutcome::Ignored
                }
            }
            Command::SelectNextTab => self.select_relative(1),
            Command::SelectPreviousTab => self.select_relative(-1),
            Command::SelectTab(index) => self.select_index(index),
            Command::CloseWindow => CommandOutcome::Close(self.request_close()),
            Command::Exit => CommandOutcome::ExitRequested,
        }
    }

    /// Close a single tab, asking it first if it has a beforeunload hook.
    ///
    /// Returns `false` if nothing was fired. While the window is closing the
    /// running attempt already owns every tab's beforeunload and unload.
    pub fn close_tab(&mut self, tab: TabId) -> bool {
        if !self.host.tab_exists(tab) {
            return false;
        }
        if self.close.is_closing() {
            log::debug!("{}: window is closing, not closing {} on its own", self.window, tab);
            return false;
        }
        if self.host.needs_before_unload(tab) {
            self.host.fire_before_unload(tab);
        } else {
            self.host.fire_unload(tab);
        }
        true
    }

    fn select_relative(&mut self, step: isize) -> CommandOutcome {
        let tabs = self.host.tab_ids();
        if tabs.is_empty() {
            return CommandOutcome::Ignored;
        }
        let current = self
            .host
            .selected_tab()
            .and_then(|selected| tabs.iter().position(|t| *t == selected))
            .unwrap_or(0);
        let count = tabs.len() as isize;
        let index = (current as isize + step).rem_euclid(count) as usize;
        self.select_index(index)
    }

    fn select_index(&mut self, index: usize) -> CommandOutcome {
        let previous = self.host.selected_tab();
        let Some(selected) = self.host.select_tab_at(index) else {
            return CommandOutcome::Ignored;
        };
        if previous == Some(selected) {
            return CommandOutcome::Executed;
        }
        if let Some(previous) = previous {
            self.schedule_update(previous, InvalidateFlags::TAB);
        }
        self.schedule_update(selected, SELECTION_FLAGS);
        CommandOutcome::Executed
    }

    // ── Posted tasks ────────────────────────────────────────────────────────

    /// Run a task posted for this window.
    pub fn handle_task(&mut self, task: WindowTask) -> WindowSignal {
        match task {
            WindowTask::FlushUiUpdates => {
                self.updates.flush(&mut self.host);
                WindowSignal::None
            }
            WindowTask::ProcessPendingTabs => {
                let progress = self.close.process_pending_tabs(&mut self.host);
                self.signal_for(progress)
            }
            WindowTask::BeforeUnloadReply { tab, proceed } => {
                // The answer settles the pending deadline. An unload fired
                // below arms a fresh one.
                self.drop_deadlines(Some(tab));
                let outcome = self
                    .close
                    .on_before_unload_result(&mut self.host, tab, proceed);
                if outcome.progress == CloseProgress::NotClosing
                    && outcome.proceed_to_fire_unload
                    && self.host.tab_exists(tab)
                {
                    // A single-tab close outside a window close attempt.
                    self.host.fire_unload(tab);
                }
                self.signal_for(outcome.progress)
            }
            WindowTask::TabClosed { tab } => {
                self.drop_deadlines(Some(tab));
                self.detach_tab(tab, false)
            }
            WindowTask::ForceTabClosed { tab } => {
                if !self.close.is_tracking(tab) {
                    return WindowSignal::None;
                }
                log::warn!(
                    "{}: {} did not answer before the deadline, forcing it out",
                    self.window,
                    tab
                );
                self.detach_tab(tab, true)
            }
        }
    }

    fn detach_tab(&mut self, tab: TabId, immediate: bool) -> WindowSignal {
        let removed = self.host.remove_tab(tab);
        if !removed && !self.close.is_tracking(tab) {
            // Late completion for a tab that was already forced out.
            return WindowSignal::None;
        }
        self.updates.cancel(tab);
        let progress = self.close.on_tab_removed(&mut self.host, tab, immediate);

        if progress == CloseProgress::NotClosing && self.host.tab_ids().is_empty() {
            log::info!("{}: last tab closed", self.window);
            return match self.request_close() {
                CloseDecision::ProceedNow => WindowSignal::ReadyToClose,
                CloseDecision::Pending => WindowSignal::None,
            };
        }
        self.signal_for(progress)
    }

    /// Drop queued `ForceTabClosed` deadlines for `tab`, or for every tab of
    /// this window.
    fn drop_deadlines(&self, tab: Option<TabId>) {
        let window = self.window;
        let dropped = self.loop_handle.discard(|task| match task.kind {
            WindowTask::ForceTabClosed { tab: t } if task.window == window => {
                tab.is_none_or(|tab| tab == t)
            }
            _ => false,
        });
        if dropped > 0 {
            log::trace!("{}: dropped {} stale deadline(s)", self.window, dropped);
        }
    }

    fn signal_for(&mut self, progress: CloseProgress) -> WindowSignal {
        match progress {
            CloseProgress::Cancelled => {
                self.drop_deadlines(None);
                self.host.close_cancelled();
                WindowSignal::CloseCancelled
            }
            CloseProgress::ReadyToClose => WindowSignal::ReadyToClose,
            CloseProgress::NotClosing | CloseProgress::Pending => WindowSignal::None,
        }
    }
}
