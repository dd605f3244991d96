//! Process-wide window bookkeeping.
//!
//! [`WindowRegistry`] tracks which windows exist (in creation order), which
//! was most recently activated, who wants to hear about it, and whether the
//! process should keep running once the last window is gone.
//!
//! The registry is an ordinary value owned by [`crate::BrowserProcess`] and
//! lent to whoever needs it, so tests can build as many independent
//! registries as they like.
//!
//! Observer fan-out works on a snapshot of the observer list. Observers only
//! receive `&self`, so they cannot reach back into the registry while it is
//! notifying; a registry shared through `RefCell` would panic on such an
//! attempt rather than mutate mid-iteration.

use std::rc::Rc;

use tabshell_config::Config;

use crate::error::RegistryError;
use crate::ids::WindowId;

/// Receives registry events. Every method has an empty default.
pub trait RegistryObserver {
    fn on_window_added(&self, _window: WindowId) {}
    fn on_window_removed(&self, _window: WindowId) {}
    fn on_window_activated(&self, _window: WindowId) {}
    /// The process is about to exit. Sent at most once per registry.
    fn on_app_terminating(&self) {}
}

pub struct WindowRegistry {
    /// Open windows in creation order.
    windows: Vec<WindowId>,
    /// Activation order, most recent at the tail.
    last_active: Vec<WindowId>,
    observers: Vec<Rc<dyn RegistryObserver>>,
    keep_alive_count: usize,
    /// Set `trying_to_quit` when the last window goes away.
    quit_on_last_window_closed: bool,
    trying_to_quit: bool,
    /// Latch: termination has been signalled.
    terminating: bool,
    /// Latch: the OS session is ending and windows were force-closed.
    session_ended: bool,
}

impl WindowRegistry {
    pub fn new(quit_on_last_window_closed: bool) -> Self {
        Self {
            windows: Vec::new(),
            last_active: Vec::new(),
            observers: Vec::new(),
            keep_alive_count: 0,
            quit_on_last_window_closed,
            trying_to_quit: false,
            terminating: false,
            session_ended: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.quit_on_last_window_closed)
    }

    // ── Windows ─────────────────────────────────────────────────────────────

    /// Register a freshly created window. It also becomes the most recently
    /// active one.
    pub fn add(&mut self, window: WindowId) -> Result<(), RegistryError> {
        if self.windows.contains(&window) {
            return Err(RegistryError::AlreadyRegistered(window));
        }
        self.windows.push(window);
        self.last_active.push(window);
        log::debug!("Registered {} (total: {})", window, self.windows.len());

        for observer in self.observer_snapshot() {
            observer.on_window_added(window);
        }
        Ok(())
    }

    /// Unregister a destroyed window.
    ///
    /// Removing the last window may signal termination. Removing a window
    /// twice is reported and changes nothing.
    pub fn remove(&mut self, window: WindowId) -> Result<(), RegistryError> {
        let Some(index) = self.windows.iter().position(|w| *w == window) else {
            return Err(RegistryError::UnknownWindow(window));
        };
        self.windows.remove(index);
        self.last_active.retain(|w| *w != window);
        log::debug!("Unregistered {} (remaining: {})", window, self.windows.len());

        for observer in self.observer_snapshot() {
            observer.on_window_removed(window);
        }

        if self.windows.is_empty() && self.quit_on_last_window_closed {
            self.trying_to_quit = true;
        }
        self.maybe_terminate();
        Ok(())
    }

    /// Move `window` to the tail of the activation order.
    pub fn set_last_active(&mut self, window: WindowId) {
        if !self.windows.contains(&window) {
            log::warn!("Ignoring activation of unregistered {}", window);
            return;
        }
        self.last_active.retain(|w| *w != window);
        self.last_active.push(window);

        for observer in self.observer_snapshot() {
            observer.on_window_activated(window);
        }
    }

    /// Most recently activated window.
    pub fn last_active(&self) -> Option<WindowId> {
        self.last_active.last().copied()
    }

    /// First window matching `predicate`, searching most recently active
    /// first and falling back to creation order.
    pub fn find_matching(&self, predicate: impl Fn(WindowId) -> bool) -> Option<WindowId> {
        self.last_active
            .iter()
            .rev()
            .copied()
            .find(|w| predicate(*w))
            .or_else(|| self.windows.iter().copied().find(|w| predicate(*w)))
    }

    /// Open windows in creation order.
    pub fn windows(&self) -> &[WindowId] {
        &self.windows
    }

    /// Open windows, most recently active first.
    pub fn windows_by_activation(&self) -> impl Iterator<Item = WindowId> + '_ {
        self.last_active.iter().rev().copied()
    }

    pub fn contains(&self, window: WindowId) -> bool {
        self.windows.contains(&window)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    // ── Observers ───────────────────────────────────────────────────────────

    pub fn add_observer(&mut self, observer: Rc<dyn RegistryObserver>) {
        self.observers.push(observer);
    }

    pub fn remove_observer(&mut self, observer: &Rc<dyn RegistryObserver>) -> bool {
        let before = self.observers.len();
        self.observers.retain(|o| !Rc::ptr_eq(o, observer));
        before != self.observers.len()
    }

    fn observer_snapshot(&self) -> Vec<Rc<dyn RegistryObserver>> {
        self.observers.clone()
    }

    // ── Keep-alive and quitting ─────────────────────────────────────────────

    /// Keep the process running even with no windows open.
    pub fn start_keep_alive(&mut self) {
        self.keep_alive_count += 1;
        log::debug!("Keep-alive started (count: {})", self.keep_alive_count);
    }

    /// Release one keep-alive. Dropping the last one while quitting with no
    /// windows left signals termination.
    pub fn end_keep_alive(&mut self) -> Result<(), RegistryError> {
        if self.keep_alive_count == 0 {
            return Err(RegistryError::KeepAliveUnderflow);
        }
        self.keep_alive_count -= 1;
        log::debug!("Keep-alive ended (count: {})", self.keep_alive_count);
        if self.keep_alive_count == 0 {
            self.maybe_terminate();
        }
        Ok(())
    }

    pub fn keep_alive_count(&self) -> usize {
        self.keep_alive_count
    }

    pub fn will_keep_alive(&self) -> bool {
        self.keep_alive_count > 0
    }

    /// Mark the process as trying to quit.
    pub fn request_quit(&mut self) {
        self.trying_to_quit = true;
        self.maybe_terminate();
    }

    /// A window refused to close; stop trying to quit.
    pub fn cancel_quit(&mut self) {
        if self.trying_to_quit {
            log::info!("Quit aborted");
        }
        self.trying_to_quit = false;
    }

    pub fn is_trying_to_quit(&self) -> bool {
        self.trying_to_quit
    }

    /// Whether termination has been signalled.
    pub fn is_terminating(&self) -> bool {
        self.terminating
    }

    /// Start closing every window.
    ///
    /// With no windows open, termination is signalled right away and the
    /// returned list is empty. Otherwise the caller asks each returned window
    /// to close without waiting; termination follows once the last one is
    /// removed.
    pub fn begin_close_all(&mut self) -> Vec<WindowId> {
        self.trying_to_quit = true;
        if self.windows.is_empty() {
            self.signal_termination();
            return Vec::new();
        }
        log::info!("Closing all {} window(s)", self.windows.len());
        self.windows.clone()
    }

    /// Start the forced shutdown used when the OS session ends.
    ///
    /// Returns the windows the caller must destroy synchronously, or `None`
    /// if the session already ended.
    pub fn begin_session_end(&mut self) -> Option<Vec<WindowId>> {
        if self.session_ended {
            return None;
        }
        self.session_ended = true;
        self.trying_to_quit = true;
        log::info!(
            "Session ending, force-closing {} window(s)",
            self.windows.len()
        );
        Some(self.windows.clone())
    }

    pub fn has_session_ended(&self) -> bool {
        self.session_ended
    }

    fn maybe_terminate(&mut self) {
        if self.windows.is_empty() && self.keep_alive_count == 0 && self.trying_to_quit {
            self.signal_termination();
        }
    }

    fn signal_termination(&mut self) {
        if self.terminating {
            return;
        }
        self.terminating = true;
        log::info!("All windows closed, terminating");
        for observer in self.observer_snapshot() {
            observer.on_app_terminating();
        }
    }
}
