//! Scenario runner.
//!
//! [`App`] owns the [`BrowserProcess`], opens the scenario's windows, and
//! drives the process event loop together with the scenario timeline. The
//! loop clock can follow wall time on a tokio runtime ([`App::run_realtime`])
//! or jump straight from deadline to deadline ([`App::run_virtual`]).

use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use tabshell_config::Config;
use tabshell_lifecycle::{
    BrowserProcess, Command, RegistryObserver, WindowId, WindowOpenDisposition,
};

use crate::scenario::{Action, Scenario, Step, flags_from_names};
use crate::session::{HostSettings, SessionStats, SessionWindow, SharedStats, TabIdAllocator};

/// Counts registry notifications for the run summary.
#[derive(Debug, Default)]
struct SummaryObserver {
    opened: Cell<usize>,
    closed: Cell<usize>,
    terminated: Cell<bool>,
}

impl RegistryObserver for SummaryObserver {
    fn on_window_added(&self, _window: WindowId) {
        self.opened.set(self.opened.get() + 1);
    }

    fn on_window_removed(&self, window: WindowId) {
        self.closed.set(self.closed.get() + 1);
        crate::debug_info!("APP", "{} removed from registry", window);
    }

    fn on_app_terminating(&self) {
        self.terminated.set(true);
    }
}

/// What happened during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub elapsed: Duration,
    pub windows_opened: usize,
    pub windows_closed: usize,
    /// Names of windows still open, in creation order.
    pub still_open: Vec<String>,
    pub steps_skipped: usize,
    pub terminated: bool,
    pub stats: SessionStats,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = &self.stats;
        writeln!(f, "Scenario finished after {:.3}s", self.elapsed.as_secs_f64())?;
        writeln!(f, "  windows opened:     {}", self.windows_opened)?;
        writeln!(f, "  windows closed:     {}", self.windows_closed)?;
        if !self.still_open.is_empty() {
            writeln!(f, "  still open:         {}", self.still_open.join(", "))?;
        }
        writeln!(
            f,
            "  close cancelled:    {} (vetoes: {}, refused by transfers: {})",
            stats.close_cancelled, stats.vetoes_sent, stats.close_refused
        )?;
        writeln!(
            f,
            "  beforeunload fired: {}, unload fired: {}, deadlines armed: {}",
            stats.before_unload_fired, stats.unload_fired, stats.deadlines_armed
        )?;
        writeln!(
            f,
            "  ui updates:         {} immediate, {} strip, {} chrome",
            stats.immediate_updates, stats.tab_updates, stats.active_tab_updates
        )?;
        if self.steps_skipped > 0 {
            writeln!(f, "  steps skipped:      {}", self.steps_skipped)?;
        }
        write!(
            f,
            "  terminated:         {}",
            if self.terminated { "yes" } else { "no" }
        )
    }
}

pub struct App {
    process: BrowserProcess<SessionWindow>,
    /// Scenario window names in creation order.
    windows: Vec<(String, WindowId)>,
    by_name: HashMap<String, WindowId>,
    steps: VecDeque<Step>,
    run_for: Option<Duration>,
    steps_skipped: usize,
    stats: SharedStats,
    observer: Rc<SummaryObserver>,
}

impl App {
    pub fn new(config: Config, scenario: Scenario) -> Result<Self> {
        config.validate().context("Invalid configuration")?;
        scenario.validate()?;

        let settings = HostSettings::from_config(&config);
        let mut process = BrowserProcess::new(config);
        let observer = Rc::new(SummaryObserver::default());
        process.registry_mut().add_observer(observer.clone());

        let stats = SharedStats::default();
        let tab_ids = TabIdAllocator::new();
        let mut windows = Vec::new();
        let mut by_name = HashMap::new();

        for spec in &scenario.windows {
            let id = process.open_window(|id, handle| {
                SessionWindow::new(
                    id,
                    spec.name.clone(),
                    handle,
                    &spec.tabs,
                    settings,
                    tab_ids.clone(),
                    Rc::clone(&stats),
                )
            });
            windows.push((spec.name.clone(), id));
            by_name.insert(spec.name.clone(), id);
        }
        log::info!(
            "Scenario loaded: {} window(s), {} step(s)",
            windows.len(),
            scenario.steps.len()
        );

        Ok(Self {
            process,
            windows,
            by_name,
            steps: scenario.steps.into(),
            run_for: scenario.run_for_ms.map(Duration::from_millis),
            steps_skipped: 0,
            stats,
            observer,
        })
    }

    pub fn process(&self) -> &BrowserProcess<SessionWindow> {
        &self.process
    }

    /// Current loop time.
    pub fn now(&self) -> Duration {
        self.process.event_loop().now()
    }

    /// Next loop time at which something is due, or `None` once the run is
    /// over.
    pub fn next_wake(&self) -> Option<Duration> {
        if self.process.is_terminating() {
            return None;
        }
        let step = self.steps.front().map(|step| Duration::from_millis(step.at_ms));
        let task = self.process.event_loop().next_deadline();
        let next = match (step, task) {
            (Some(a), Some(b)) => a.min(b),
            (a, b) => a.or(b)?,
        };
        match self.run_for {
            Some(limit) if next > limit => None,
            _ => Some(next),
        }
    }

    /// Run everything due up to `target`, interleaving timeline steps with
    /// loop tasks in deadline order. Tasks win ties.
    pub fn advance_to(&mut self, target: Duration) {
        while !self.process.is_terminating() {
            let step_due = self
                .steps
                .front()
                .map(|step| Duration::from_millis(step.at_ms))
                .filter(|at| *at <= target);
            let task_due = self
                .process
                .event_loop()
                .next_deadline()
                .filter(|due| *due <= target);

            match (step_due, task_due) {
                (None, None) => break,
                (Some(at), Some(due)) if due <= at => {
                    self.process.advance_to(due);
                }
                (Some(at), _) => {
                    self.process.advance_to(at);
                    if let Some(step) = self.steps.pop_front() {
                        self.apply(step);
                    }
                }
                (None, Some(due)) => {
                    self.process.advance_to(due);
                }
            }
        }
        self.process.event_loop().advance_to(target);
    }

    /// Run the scenario without waiting on the wall clock.
    pub fn run_virtual(&mut self) -> Summary {
        while let Some(next) = self.next_wake() {
            self.advance_to(next);
        }
        self.summary()
    }

    /// Run the scenario with the loop clock following wall time.
    pub async fn run_realtime(&mut self) -> Summary {
        let start = tokio::time::Instant::now();
        while let Some(next) = self.next_wake() {
            tokio::time::sleep_until(start + next).await;
            self.advance_to(next);
        }
        self.summary()
    }

    pub fn summary(&self) -> Summary {
        Summary {
            elapsed: self.now(),
            windows_opened: self.observer.opened.get(),
            windows_closed: self.observer.closed.get(),
            still_open: self
                .windows
                .iter()
                .filter(|(_, id)| self.process.window(*id).is_some())
                .map(|(name, _)| name.clone())
                .collect(),
            steps_skipped: self.steps_skipped,
            terminated: self.observer.terminated.get(),
            stats: self.stats.borrow().clone(),
        }
    }

    /// Resolve a scenario window name to a window that is still open.
    fn live_window(&mut self, name: &str) -> Option<WindowId> {
        let id = self
            .by_name
            .get(name)
            .copied()
            .filter(|id| self.process.window(*id).is_some());
        if id.is_none() {
            log::warn!("Skipping step for window '{}': it is no longer open", name);
            self.steps_skipped += 1;
        }
        id
    }

    fn command(&mut self, name: &str, command: Command, disposition: WindowOpenDisposition) {
        let Some(id) = self.live_window(name) else {
            return;
        };
        if let Some(outcome) = self.process.execute_command(id, command, disposition) {
            log::debug!("'{}': {} -> {:?}", name, command, outcome);
        }
    }

    fn apply(&mut self, step: Step) {
        crate::debug_log!("APP", "t={}ms {:?}", step.at_ms, step.action);
        let current = WindowOpenDisposition::CurrentTab;

        match step.action {
            Action::NewTab { window, background } => {
                let disposition = if background {
                    WindowOpenDisposition::NewBackgroundTab
                } else {
                    WindowOpenDisposition::NewForegroundTab
                };
                self.command(&window, Command::NewTab, disposition);
            }
            Action::CloseTab { window } => self.command(&window, Command::CloseTab, current),
            Action::SelectTab { window, index } => {
                self.command(&window, Command::SelectTab(index), current)
            }
            Action::SelectNextTab { window } => {
                self.command(&window, Command::SelectNextTab, current)
            }
            Action::SelectPreviousTab { window } => {
                self.command(&window, Command::SelectPreviousTab, current)
            }
            Action::CloseWindow { window } => self.command(&window, Command::CloseWindow, current),
            Action::Exit { window } => self.command(&window, Command::Exit, current),
            Action::Activate { window } => {
                if let Some(id) = self.live_window(&window) {
                    self.process.activate_window(id);
                }
            }
            Action::Update { window, tab, flags } => {
                let Some(id) = self.live_window(&window) else {
                    return;
                };
                let tab_id = self
                    .process
                    .window(id)
                    .and_then(|controller| controller.host().tab_at(tab));
                match tab_id {
                    Some(tab_id) => {
                        self.process
                            .schedule_update(id, tab_id, flags_from_names(&flags))
                    }
                    None => {
                        log::warn!("'{}' has no tab at index {}", window, tab);
                        self.steps_skipped += 1;
                    }
                }
            }
            Action::SetLoading {
                window,
                tab,
                loading,
            } => {
                let Some(id) = self.live_window(&window) else {
                    return;
                };
                if let Some(controller) = self.process.window_mut(id) {
                    let host = controller.host_mut();
                    if let Some(tab_id) = host.tab_at(tab) {
                        host.set_loading(tab_id, loading);
                    }
                }
            }
            Action::FinishTransfers { window } => {
                if let Some(id) = self.live_window(&window)
                    && let Some(controller) = self.process.window_mut(id)
                {
                    controller.host_mut().finish_transfers();
                }
            }
            Action::BlockCommands { window, blocked } => {
                if let Some(id) = self.live_window(&window)
                    && let Some(controller) = self.process.window_mut(id)
                {
                    controller.set_block_command_execution(blocked);
                }
            }
            Action::CloseAll => self.process.close_all(),
            Action::EndSession => self.process.end_session(),
            Action::StartKeepAlive => self.process.registry_mut().start_keep_alive(),
            Action::EndKeepAlive => {
                if let Err(e) = self.process.registry_mut().end_keep_alive() {
                    log::warn!("Ignoring end_keep_alive: {}", e);
                }
            }
        }
    }
}
