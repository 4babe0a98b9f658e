#![forbid(unsafe_code)]

//! Split-pane tree and tab lifecycle for the terminal shell.
//!
//! A tab owns a [`PaneTree`]: a binary tree whose leaves hold terminals and
//! whose inner nodes carry a split direction and ratio. Leaves are
//! addressed by stable [`PaneId`]s; parent links are implicit in traversal.

pub mod pane;
pub mod tabs;

pub use pane::{PaneContent, PaneId, PaneTree, Rect, SplitDirection};
pub use tabs::{Tab, TabCloseOutcome, TabManager};

use velterm_core::Terminal;

impl PaneContent for Terminal {
    fn resize_grid(&mut self, cols: u16, rows: u16) {
        self.resize(cols, rows);
    }
}
