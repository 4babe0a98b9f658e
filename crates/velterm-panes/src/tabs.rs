//! Tab lifecycle over pane trees.
//!
//! A tab owns one [`PaneTree`] and remembers its active pane across
//! resizes. The manager keeps tabs ordered; closing a tab selects the
//! right neighbor when one exists, and closing the last tab signals
//! application exit.

use crate::pane::{PaneContent, PaneId, PaneTree, Rect, SplitDirection};

/// One tab: a pane tree plus the active-pane marker.
pub struct Tab<T> {
    tree: PaneTree<T>,
    active: PaneId,
}

impl<T> Tab<T> {
    /// A tab with a single pane.
    pub fn new(content: T) -> Self {
        let (tree, root) = PaneTree::new(content);
        Self { tree, active: root }
    }

    #[must_use]
    pub fn tree(&self) -> &PaneTree<T> {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut PaneTree<T> {
        &mut self.tree
    }

    /// The active pane id. Stable across resizes; revalidated after closes.
    #[must_use]
    pub fn active_pane(&self) -> PaneId {
        self.active
    }

    /// Focus a pane (ignored when the id is not in this tab).
    pub fn set_active_pane(&mut self, pane: PaneId) {
        if self.tree.get(pane).is_some() {
            self.active = pane;
        }
    }

    /// Split the active pane; the new pane takes focus.
    pub fn split_active(&mut self, direction: SplitDirection, content: T) -> Option<PaneId> {
        let new_pane = self.tree.split(self.active, direction, content)?;
        self.active = new_pane;
        Some(new_pane)
    }

    /// Close the active pane. Returns the removed content; `None` when the
    /// tree is already empty. Focus moves to the first surviving leaf.
    pub fn close_active(&mut self) -> Option<T> {
        let removed = self.tree.close(self.active)?;
        if let Some(first) = self.tree.pane_ids().first() {
            self.active = *first;
        }
        Some(removed)
    }

    /// Whether the tab still holds any panes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

impl<T: PaneContent> Tab<T> {
    /// Relayout the tree; the active pane persists.
    pub fn update_layout(&mut self, area: Rect, cell_w: f32, cell_h: f32) {
        self.tree.update_layout(area, cell_w, cell_h);
    }
}

/// Result of closing a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabCloseOutcome {
    /// The tab closed; a neighbor was selected.
    Closed,
    /// The last tab closed; the application should exit.
    LastClosed,
}

/// Ordered tab list with an active index.
pub struct TabManager<T> {
    tabs: Vec<Tab<T>>,
    active_index: usize,
}

impl<T> Default for TabManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TabManager<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tabs: Vec::new(),
            active_index: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    #[must_use]
    pub fn active_index(&self) -> usize {
        self.active_index
    }

    #[must_use]
    pub fn active_tab(&self) -> Option<&Tab<T>> {
        self.tabs.get(self.active_index)
    }

    pub fn active_tab_mut(&mut self) -> Option<&mut Tab<T>> {
        self.tabs.get_mut(self.active_index)
    }

    #[must_use]
    pub fn tab(&self, index: usize) -> Option<&Tab<T>> {
        self.tabs.get(index)
    }

    /// Append a tab and select it.
    pub fn new_tab(&mut self, content: T) -> usize {
        self.tabs.push(Tab::new(content));
        self.active_index = self.tabs.len() - 1;
        self.active_index
    }

    /// Close the tab at `index`. Selection moves to the right neighbor
    /// when one exists, else the left.
    pub fn close_tab(&mut self, index: usize) -> TabCloseOutcome {
        if index < self.tabs.len() {
            self.tabs.remove(index);
        }
        if self.tabs.is_empty() {
            self.active_index = 0;
            return TabCloseOutcome::LastClosed;
        }
        if self.active_index > index || self.active_index >= self.tabs.len() {
            self.active_index = self.active_index.saturating_sub(1).min(self.tabs.len() - 1);
        }
        TabCloseOutcome::Closed
    }

    /// Close the active tab.
    pub fn close_active_tab(&mut self) -> TabCloseOutcome {
        self.close_tab(self.active_index)
    }

    /// Cycle to the next tab (wraps).
    pub fn next_tab(&mut self) {
        if !self.tabs.is_empty() {
            self.active_index = (self.active_index + 1) % self.tabs.len();
        }
    }

    /// Cycle to the previous tab (wraps).
    pub fn prev_tab(&mut self) {
        if !self.tabs.is_empty() {
            self.active_index = (self.active_index + self.tabs.len() - 1) % self.tabs.len();
        }
    }

    /// Select a tab by index (ignored when out of range).
    pub fn select(&mut self, index: usize) {
        if index < self.tabs.len() {
            self.active_index = index;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakePane;

    impl PaneContent for FakePane {
        fn resize_grid(&mut self, _cols: u16, _rows: u16) {}
    }

    #[test]
    fn new_tab_appends_and_selects() {
        let mut mgr = TabManager::new();
        mgr.new_tab(FakePane);
        mgr.new_tab(FakePane);
        assert_eq!(mgr.len(), 2);
        assert_eq!(mgr.active_index(), 1);
        mgr.new_tab(FakePane);
        assert_eq!(mgr.active_index(), 2);
    }

    #[test]
    fn close_selects_right_neighbor() {
        let mut mgr = TabManager::new();
        mgr.new_tab(FakePane);
        mgr.new_tab(FakePane);
        mgr.new_tab(FakePane);
        mgr.select(1);
        assert_eq!(mgr.close_tab(1), TabCloseOutcome::Closed);
        // The former right neighbor now occupies index 1.
        assert_eq!(mgr.active_index(), 1);
        assert_eq!(mgr.len(), 2);
    }

    #[test]
    fn close_rightmost_falls_back_left() {
        let mut mgr = TabManager::new();
        mgr.new_tab(FakePane);
        mgr.new_tab(FakePane);
        assert_eq!(mgr.close_tab(1), TabCloseOutcome::Closed);
        assert_eq!(mgr.active_index(), 0);
    }

    #[test]
    fn closing_last_tab_signals_exit() {
        let mut mgr = TabManager::new();
        mgr.new_tab(FakePane);
        assert_eq!(mgr.close_active_tab(), TabCloseOutcome::LastClosed);
        assert!(mgr.is_empty());
    }

    #[test]
    fn close_before_active_shifts_selection() {
        let mut mgr = TabManager::new();
        mgr.new_tab(FakePane);
        mgr.new_tab(FakePane);
        mgr.new_tab(FakePane);
        assert_eq!(mgr.active_index(), 2);
        mgr.close_tab(0);
        // Same tab stays selected at its shifted index.
        assert_eq!(mgr.active_index(), 1);
    }

    #[test]
    fn tab_cycling_wraps() {
        let mut mgr = TabManager::new();
        mgr.new_tab(FakePane);
        mgr.new_tab(FakePane);
        mgr.new_tab(FakePane);
        mgr.select(2);
        mgr.next_tab();
        assert_eq!(mgr.active_index(), 0);
        mgr.prev_tab();
        assert_eq!(mgr.active_index(), 2);
    }

    #[test]
    fn active_pane_tracks_splits_and_closes() {
        let mut tab = Tab::new(FakePane);
        let first = tab.active_pane();
        let second = tab
            .split_active(SplitDirection::Horizontal, FakePane)
            .unwrap();
        assert_eq!(tab.active_pane(), second);

        tab.set_active_pane(first);
        assert_eq!(tab.active_pane(), first);

        tab.close_active();
        assert_eq!(tab.active_pane(), second);
        assert!(!tab.is_empty());

        tab.close_active();
        assert!(tab.is_empty());
    }
}
