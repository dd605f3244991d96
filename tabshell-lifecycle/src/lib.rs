//! Window lifecycle controller for tabshell.
//!
//! This crate owns the parts of a tabbed window that have real state-machine
//! structure:
//!
//! - [`TabCloseCoordinator`]: per-window beforeunload/unload handshake run
//!   before a window may be torn down, with veto and cancellation
//! - [`UiUpdateScheduler`]: per-window coalescing of per-tab invalidation
//!   flags into bounded-latency flushes
//! - [`WindowRegistry`]: process-wide window bookkeeping, last-active order,
//!   observer fan-out, and the keep-alive count deciding process survival
//! - [`BrowserLifecycleController`]: composes the per-window pieces and
//!   exposes the close/command contract
//! - [`BrowserProcess`]: owns the registry, the controllers and the
//!   deferred [`EventLoop`], and dispatches posted tasks
//!
//! Everything runs on a single thread. "Asynchronous" means posted to the
//! [`EventLoop`] and run on a later turn.

pub mod close_coordinator;
pub mod command;
pub mod controller;
pub mod error;
pub mod event_loop;
pub mod flags;
pub mod host;
pub mod ids;
pub mod process;
pub mod registry;
pub mod task;
pub mod update_scheduler;

pub use close_coordinator::{CloseDecision, CloseProgress, CloseState, TabCloseCoordinator};
pub use command::{Command, CommandGate, GateOutcome, WindowOpenDisposition};
pub use controller::{BrowserLifecycleController, CommandOutcome, WindowSignal};
pub use error::RegistryError;
pub use event_loop::{EventLoop, LoopHandle};
pub use flags::InvalidateFlags;
pub use host::{TabStrip, UiUpdateTarget, UnloadHandler, WindowHost};
pub use ids::{TabId, WindowId};
pub use process::BrowserProcess;
pub use registry::{RegistryObserver, WindowRegistry};
pub use task::{Task, WindowTask};
pub use update_scheduler::UiUpdateScheduler;
