//! Tab invalidation flags.
//!
//! The set is open: hosts may define further bits above the named ones and
//! they travel through the batched path untouched. Which bits are applied
//! synchronously is internal policy of [`crate::UiUpdateScheduler`].

bitflags::bitflags! {
    /// What about a tab changed and needs to be reflected in the window.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InvalidateFlags: u32 {
        /// The session address shown in the location field.
        const URL = 1 << 0;
        /// Tab strip decoration: icon, crash state, app icon.
        const TAB = 1 << 1;
        /// Loading state.
        const LOAD = 1 << 2;
        /// Per-page action indicators.
        const PAGE_ACTIONS = 1 << 3;
        /// Tab title.
        const TITLE = 1 << 4;

        // Open bit-set: unknown bits from hosts are carried, not dropped.
        const _ = !0;
    }
}

impl InvalidateFlags {
    /// Flags that only matter for window chrome driven by the selected tab.
    pub const ACTIVE_ONLY: Self = Self::URL.union(Self::PAGE_ACTIONS);

    /// Named flags that affect window chrome when their tab is selected.
    pub const ACTIVE_TAB_SCOPED: Self = Self::ACTIVE_ONLY
        .union(Self::LOAD)
        .union(Self::TITLE)
        .union(Self::TAB);

    /// The part of `self` applied to the tab's own strip entry whether or
    /// not it is selected. Unknown bits go here.
    pub fn tab_scoped(self) -> Self {
        self.difference(Self::ACTIVE_ONLY)
    }

    /// The part of `self` applied only while the tab is selected.
    pub fn active_scoped(self) -> Self {
        self.intersection(Self::ACTIVE_TAB_SCOPED)
    }
}
