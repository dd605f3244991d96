//! Window commands and the command-execution gate.
//!
//! While execution is blocked (for example while a modal prompt owns the
//! window) commands are not run. The gate remembers the first blocked
//! command so the blocker can decide whether to replay it; any further
//! command attempted while blocked is dropped, not queued.

use std::fmt;

/// Commands a window understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    NewTab,
    /// Close the selected tab.
    CloseTab,
    SelectNextTab,
    SelectPreviousTab,
    /// Select the tab at a zero-based strip index.
    SelectTab(usize),
    CloseWindow,
    /// Close every window and quit.
    Exit,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::NewTab => write!(f, "new-tab"),
            Command::CloseTab => write!(f, "close-tab"),
            Command::SelectNextTab => write!(f, "select-next-tab"),
            Command::SelectPreviousTab => write!(f, "select-previous-tab"),
            Command::SelectTab(index) => write!(f, "select-tab-{}", index),
            Command::CloseWindow => write!(f, "close-window"),
            Command::Exit => write!(f, "exit"),
        }
    }
}

/// Where the result of a command should open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WindowOpenDisposition {
    #[default]
    CurrentTab,
    NewForegroundTab,
    NewBackgroundTab,
    NewWindow,
}

/// What the gate did with a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Not blocked; run it.
    Run,
    /// Blocked and remembered.
    Retained,
    /// Blocked while another command is already remembered; dropped.
    Dropped,
}

/// Blocks command execution and remembers at most one blocked command.
#[derive(Debug, Default)]
pub struct CommandGate {
    blocked: bool,
    last_blocked: Option<(Command, WindowOpenDisposition)>,
}

impl CommandGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start or stop blocking. Starting to block forgets any previously
    /// remembered command; stopping keeps it available for
    /// [`CommandGate::last_blocked_command`].
    pub fn set_blocked(&mut self, block: bool) {
        self.blocked = block;
        if block {
            self.last_blocked = None;
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// Decide what happens to `command`.
    pub fn admit(&mut self, command: Command, disposition: WindowOpenDisposition) -> GateOutcome {
        if !self.blocked {
            return GateOutcome::Run;
        }
        if self.last_blocked.is_some() {
            log::debug!("Command {} dropped: another command is already held", command);
            return GateOutcome::Dropped;
        }
        self.last_blocked = Some((command, disposition));
        GateOutcome::Retained
    }

    /// The remembered blocked command, if any.
    pub fn last_blocked_command(&self) -> Option<(Command, WindowOpenDisposition)> {
        self.last_blocked
    }
}
