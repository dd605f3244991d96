//! The process-scoped owner of every window.
//!
//! [`BrowserProcess`] holds the [`WindowRegistry`], one
//! [`BrowserLifecycleController`] per open window, and the [`EventLoop`]
//! they all post to. It is built once at startup and dropped at shutdown;
//! nothing in this crate is reachable through statics.

use std::collections::HashMap;
use std::time::Duration;

use tabshell_config::Config;

use crate::close_coordinator::CloseDecision;
use crate::command::{Command, WindowOpenDisposition};
use crate::controller::{BrowserLifecycleController, CommandOutcome, WindowSignal};
use crate::event_loop::{EventLoop, LoopHandle};
use crate::flags::InvalidateFlags;
use crate::host::WindowHost;
use crate::ids::{TabId, WindowId};
use crate::registry::WindowRegistry;
use crate::task::Task;

/// Manages all windows of the process and the loop driving them.
pub struct BrowserProcess<H: WindowHost> {
    config: Config,
    registry: WindowRegistry,
    event_loop: EventLoop<Task>,
    windows: HashMap<WindowId, BrowserLifecycleController<H>>,
    next_window_id: u64,
}

impl<H: WindowHost> BrowserProcess<H> {
    pub fn new(config: Config) -> Self {
        Self {
            registry: WindowRegistry::from_config(&config),
            config,
            event_loop: EventLoop::new(),
            windows: HashMap::new(),
            next_window_id: 1,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &WindowRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut WindowRegistry {
        &mut self.registry
    }

    pub fn event_loop(&self) -> &EventLoop<Task> {
        &self.event_loop
    }

    pub fn loop_handle(&self) -> LoopHandle<Task> {
        self.event_loop.handle()
    }

    pub fn is_terminating(&self) -> bool {
        self.registry.is_terminating()
    }

    // ── Windows ─────────────────────────────────────────────────────────────

    /// Create a window. `make_host` builds the window's host from its id and
    /// a handle for posting content-layer answers.
    pub fn open_window(
        &mut self,
        make_host: impl FnOnce(WindowId, LoopHandle<Task>) -> H,
    ) -> WindowId {
        let id = WindowId(self.next_window_id);
        self.next_window_id += 1;

        let handle = self.event_loop.handle();
        let host = make_host(id, handle.clone());
        let controller = BrowserLifecycleController::new(id, host, handle, &self.config);
        self.windows.insert(id, controller);
        if let Err(e) = self.registry.add(id) {
            log::error!("Failed to register new window: {}", e);
        }
        log::info!("Opened {} (total: {})", id, self.windows.len());
        id
    }

    pub fn window(&self, id: WindowId) -> Option<&BrowserLifecycleController<H>> {
        self.windows.get(&id)
    }

    pub fn window_mut(&mut self, id: WindowId) -> Option<&mut BrowserLifecycleController<H>> {
        self.windows.get_mut(&id)
    }

    /// Open windows in creation order.
    pub fn window_ids(&self) -> Vec<WindowId> {
        self.registry.windows().to_vec()
    }

    pub fn activate_window(&mut self, id: WindowId) {
        self.registry.set_last_active(id);
    }

    /// Most recently active window whose controller satisfies `predicate`.
    pub fn find_window(
        &self,
        predicate: impl Fn(&BrowserLifecycleController<H>) -> bool,
    ) -> Option<WindowId> {
        self.registry
            .find_matching(|id| self.windows.get(&id).is_some_and(&predicate))
    }

    // ── Close paths ─────────────────────────────────────────────────────────

    /// Ask a window to close, destroying it right away if no tab needs to be
    /// asked.
    pub fn request_close(&mut self, id: WindowId) -> Option<CloseDecision> {
        let decision = self.windows.get_mut(&id)?.request_close();
        if decision == CloseDecision::ProceedNow {
            self.finish_close(id);
        }
        Some(decision)
    }

    /// Ask every window to close without waiting for any of them.
    pub fn close_all(&mut self) {
        for id in self.registry.begin_close_all() {
            self.request_close(id);
        }
    }

    /// Destroy every window synchronously, without asking tabs. Used when
    /// the OS session ends and the process may be killed before the loop
    /// runs again.
    pub fn end_session(&mut self) {
        let Some(ids) = self.registry.begin_session_end() else {
            return;
        };
        for id in ids {
            if let Some(controller) = self.windows.get_mut(&id) {
                controller.force_close();
            }
            self.destroy_window(id);
        }
    }

    fn finish_close(&mut self, id: WindowId) {
        let Some(controller) = self.windows.get_mut(&id) else {
            return;
        };
        if controller.finish_close() {
            self.destroy_window(id);
        } else {
            self.registry.cancel_quit();
        }
    }

    fn destroy_window(&mut self, id: WindowId) {
        self.windows.remove(&id);
        let dropped = self.event_loop.discard(|task| task.window == id);
        if dropped > 0 {
            log::debug!("Discarded {} pending task(s) for {}", dropped, id);
        }
        if let Err(e) = self.registry.remove(id) {
            log::warn!("Window teardown: {}", e);
        }
        log::info!("Closed {} (remaining: {})", id, self.windows.len());
    }

    // ── Commands and updates ────────────────────────────────────────────────

    pub fn execute_command(
        &mut self,
        id: WindowId,
        command: Command,
        disposition: WindowOpenDisposition,
    ) -> Option<CommandOutcome> {
        let outcome = self
            .windows
            .get_mut(&id)?
            .execute_command(command, disposition);
        match outcome {
            CommandOutcome::Close(CloseDecision::ProceedNow) => self.finish_close(id),
            CommandOutcome::ExitRequested => self.close_all(),
            _ => {}
        }
        Some(outcome)
    }

    pub fn schedule_update(&mut self, id: WindowId, tab: TabId, flags: InvalidateFlags) {
        if let Some(controller) = self.windows.get_mut(&id) {
            controller.schedule_update(tab, flags);
        }
    }

    // ── Loop ────────────────────────────────────────────────────────────────

    /// Run every task that is due. Tasks posted meanwhile with zero delay
    /// are due too and run in the same call, each on its own turn.
    pub fn run_ready_tasks(&mut self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.event_loop.pop_ready() {
            self.dispatch(task);
            ran += 1;
        }
        ran
    }

    /// Move the loop clock forward and run what became due.
    pub fn advance_by(&mut self, by: Duration) -> usize {
        self.event_loop.advance_by(by);
        self.run_ready_tasks()
    }

    /// Move the loop clock to `to` and run what became due.
    pub fn advance_to(&mut self, to: Duration) -> usize {
        self.event_loop.advance_to(to);
        self.run_ready_tasks()
    }

    /// Jump from deadline to deadline until nothing is queued.
    pub fn run_until_idle(&mut self) -> usize {
        let mut ran = self.run_ready_tasks();
        while let Some(deadline) = self.event_loop.next_deadline() {
            ran += self.advance_to(deadline);
        }
        ran
    }

    fn dispatch(&mut self, task: Task) {
        let Some(controller) = self.windows.get_mut(&task.window) else {
            log::trace!("Dropping {:?} for closed {}", task.kind, task.window);
            return;
        };
        match controller.handle_task(task.kind) {
            WindowSignal::None => {}
            WindowSignal::CloseCancelled => self.registry.cancel_quit(),
            WindowSignal::ReadyToClose => self.finish_close(task.window),
        }
    }
}
