//! YAML scenario files.
//!
//! A scenario declares the windows to open, how each tab behaves when asked
//! to close, and a timeline of actions to run against them:
//!
//! ```yaml
//! windows:
//!   - name: main
//!     tabs:
//!       - title: Docs
//!       - title: Draft
//!         before_unload: veto
//!         reply_delay_ms: 300
//! steps:
//!   - at_ms: 100
//!     action: { type: close_window, window: main }
//! ```

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tabshell_lifecycle::InvalidateFlags;

/// How a tab answers beforeunload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BeforeUnloadPolicy {
    /// No beforeunload hook; the tab is never asked.
    #[default]
    None,
    /// Agrees to close after the reply delay.
    Accept,
    /// Refuses to close after the reply delay.
    Veto,
    /// Never answers.
    Hang,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabSpec {
    pub title: String,

    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub before_unload: BeforeUnloadPolicy,

    /// Delay before the beforeunload answer is delivered.
    #[serde(default)]
    pub reply_delay_ms: u64,

    /// Time the unload teardown takes.
    #[serde(default)]
    pub unload_delay_ms: u64,

    /// Downloads in flight; a non-zero count may block closing the window.
    #[serde(default)]
    pub active_transfers: u32,

    #[serde(default)]
    pub loading: bool,
}

impl TabSpec {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: String::new(),
            before_unload: BeforeUnloadPolicy::None,
            reply_delay_ms: 0,
            unload_delay_ms: 0,
            active_transfers: 0,
            loading: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub name: String,
    #[serde(default)]
    pub tabs: Vec<TabSpec>,
}

/// Invalidation flag names accepted in `update` steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagName {
    Url,
    Tab,
    Load,
    PageActions,
    Title,
}

impl FlagName {
    pub fn to_flags(self) -> InvalidateFlags {
        match self {
            FlagName::Url => InvalidateFlags::URL,
            FlagName::Tab => InvalidateFlags::TAB,
            FlagName::Load => InvalidateFlags::LOAD,
            FlagName::PageActions => InvalidateFlags::PAGE_ACTIONS,
            FlagName::Title => InvalidateFlags::TITLE,
        }
    }
}

pub fn flags_from_names(names: &[FlagName]) -> InvalidateFlags {
    names
        .iter()
        .fold(InvalidateFlags::empty(), |acc, name| acc | name.to_flags())
}

/// One timeline action. Tabs are addressed by their current strip index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    NewTab {
        window: String,
        #[serde(default)]
        background: bool,
    },
    CloseTab {
        window: String,
    },
    SelectTab {
        window: String,
        index: usize,
    },
    SelectNextTab {
        window: String,
    },
    SelectPreviousTab {
        window: String,
    },
    CloseWindow {
        window: String,
    },
    Exit {
        window: String,
    },
    Activate {
        window: String,
    },
    Update {
        window: String,
        tab: usize,
        flags: Vec<FlagName>,
    },
    SetLoading {
        window: String,
        tab: usize,
        loading: bool,
    },
    FinishTransfers {
        window: String,
    },
    BlockCommands {
        window: String,
        blocked: bool,
    },
    CloseAll,
    EndSession,
    StartKeepAlive,
    EndKeepAlive,
}

impl Action {
    /// The window this action targets, if any.
    pub fn window(&self) -> Option<&str> {
        match self {
            Action::NewTab { window, .. }
            | Action::CloseTab { window }
            | Action::SelectTab { window, .. }
            | Action::SelectNextTab { window }
            | Action::SelectPreviousTab { window }
            | Action::CloseWindow { window }
            | Action::Exit { window }
            | Action::Activate { window }
            | Action::Update { window, .. }
            | Action::SetLoading { window, .. }
            | Action::FinishTransfers { window }
            | Action::BlockCommands { window, .. } => Some(window),
            Action::CloseAll
            | Action::EndSession
            | Action::StartKeepAlive
            | Action::EndKeepAlive => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub at_ms: u64,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub windows: Vec<WindowSpec>,

    #[serde(default)]
    pub steps: Vec<Step>,

    /// Stop after this much loop time even if work is still queued.
    #[serde(default)]
    pub run_for_ms: Option<u64>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::from_yaml(&contents)
            .with_context(|| format!("Invalid scenario {}", path.display()))
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let mut scenario: Scenario = serde_yaml_ng::from_str(contents)?;
        scenario.validate()?;
        // Same-time steps keep their file order.
        scenario.steps.sort_by_key(|step| step.at_ms);
        Ok(scenario)
    }

    /// Reject duplicate window names and steps naming unknown windows.
    pub fn validate(&self) -> Result<()> {
        if self.windows.is_empty() {
            bail!("scenario declares no windows");
        }
        let mut names = HashSet::new();
        for window in &self.windows {
            if !names.insert(window.name.as_str()) {
                bail!("duplicate window name '{}'", window.name);
            }
        }
        for step in &self.steps {
            if let Some(window) = step.action.window()
                && !names.contains(window)
            {
                bail!("step at {}ms targets unknown window '{}'", step.at_ms, window);
            }
        }
        Ok(())
    }
}
