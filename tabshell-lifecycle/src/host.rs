//! Contracts between the lifecycle controller and the window it manages.
//!
//! The controller never owns tabs, content, or views. Everything it needs
//! from them goes through these traits, which the session layer implements
//! (and tests implement with recording mocks).

use crate::command::WindowOpenDisposition;
use crate::flags::InvalidateFlags;
use crate::ids::TabId;

/// Read-only view of a window's tabs.
pub trait TabStrip {
    /// Open tabs in strip order.
    fn tab_ids(&self) -> Vec<TabId>;

    /// Whether `tab` still exists in this window.
    fn tab_exists(&self, tab: TabId) -> bool;

    /// The currently selected tab, if any.
    fn selected_tab(&self) -> Option<TabId>;

    /// Whether `tab` is loading.
    fn is_loading(&self, tab: TabId) -> bool;
}

/// The content layer's half of the close handshake.
///
/// `fire_before_unload` and `fire_unload` must not answer re-entrantly: the
/// answer arrives later as a posted [`crate::WindowTask`].
pub trait UnloadHandler: TabStrip {
    /// Whether `tab` has a beforeunload hook that may veto closing.
    fn needs_before_unload(&self, tab: TabId) -> bool;

    /// Ask `tab` whether it may close. Must eventually be answered with
    /// [`crate::WindowTask::BeforeUnloadReply`].
    fn fire_before_unload(&mut self, tab: TabId);

    /// Run `tab`'s final teardown. Must eventually be answered with
    /// [`crate::WindowTask::TabClosed`].
    fn fire_unload(&mut self, tab: TabId);
}

/// The view layer's half of UI update coalescing.
pub trait UiUpdateTarget: TabStrip {
    /// Reflect `flags` for `tab` right now, at schedule time.
    fn apply_immediate(&mut self, tab: TabId, flags: InvalidateFlags);

    /// Refresh `tab`'s own strip entry.
    fn apply_tab_update(&mut self, tab: TabId, flags: InvalidateFlags);

    /// Refresh window chrome driven by the selected tab.
    fn apply_active_tab_update(&mut self, tab: TabId, flags: InvalidateFlags);
}

/// Everything a window offers its lifecycle controller.
pub trait WindowHost: UnloadHandler + UiUpdateTarget {
    /// Open a new tab. Returns the new tab's id.
    fn add_tab(&mut self, disposition: WindowOpenDisposition) -> Option<TabId>;

    /// Make the tab at `index` the selected one. Returns the selected tab.
    fn select_tab_at(&mut self, index: usize) -> Option<TabId>;

    /// Drop `tab` from the strip once its content is gone.
    fn remove_tab(&mut self, tab: TabId) -> bool;

    /// External close policy applied once the handshake has succeeded,
    /// e.g. refusing while transfers are in flight.
    fn can_close(&self) -> bool {
        true
    }

    /// A close attempt was abandoned; the window stays open.
    fn close_cancelled(&mut self) {}

    /// Tear down whatever is left of the window.
    fn destroy(&mut self) {}
}
