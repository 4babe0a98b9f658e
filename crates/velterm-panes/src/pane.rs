//! The recursive split-pane tree.
//!
//! The tree is an owning tagged variant: leaves hold pane content (a
//! terminal, in the application), inner nodes hold `{direction, ratio}`.
//! Closing a leaf collapses its parent into the surviving sibling. Layout
//! walks the tree allocating pixel rectangles proportional to each split
//! ratio, then converts them to grid sizes for the contained terminals.

use std::collections::HashMap;

/// What a leaf holds. The application implements this for `Terminal`; tests
/// use lightweight fakes.
pub trait PaneContent {
    /// Issued when layout assigns the pane a different grid size.
    fn resize_grid(&mut self, cols: u16, rows: u16);
}

/// Stable identifier for a leaf pane. Ids are never reused within a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PaneId(u64);

/// Split orientation: `Horizontal` lays children side by side (vertical
/// divider); `Vertical` stacks them (horizontal divider).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitDirection {
    Horizontal,
    Vertical,
}

/// Pixel rectangle assigned to a pane by layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    #[must_use]
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.x + self.w && y >= self.y && y < self.y + self.h
    }
}

/// Ratio clamp bounds: a pane never shrinks past 5% of its split.
const MIN_RATIO: f32 = 0.05;
const MAX_RATIO: f32 = 0.95;

enum PaneNode<T> {
    Leaf {
        id: PaneId,
        content: T,
        cols: u16,
        rows: u16,
    },
    Split {
        direction: SplitDirection,
        ratio: f32,
        left: Box<PaneNode<T>>,
        right: Box<PaneNode<T>>,
    },
}

/// Binary tree of panes with stable leaf ids and cached layout rectangles.
pub struct PaneTree<T> {
    root: Option<PaneNode<T>>,
    next_id: u64,
    layout: HashMap<PaneId, Rect>,
}

impl<T> PaneTree<T> {
    /// A tree with a single leaf. Returns the tree and the leaf's id.
    pub fn new(content: T) -> (Self, PaneId) {
        let id = PaneId(0);
        let tree = Self {
            root: Some(PaneNode::Leaf {
                id,
                content,
                cols: 0,
                rows: 0,
            }),
            next_id: 1,
            layout: HashMap::new(),
        };
        (tree, id)
    }

    /// Number of leaves.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pane_ids().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// All leaf ids, left-to-right in tree order.
    #[must_use]
    pub fn pane_ids(&self) -> Vec<PaneId> {
        let mut ids = Vec::new();
        if let Some(root) = &self.root {
            collect_ids(root, &mut ids);
        }
        ids
    }

    /// Borrow a pane's content.
    #[must_use]
    pub fn get(&self, id: PaneId) -> Option<&T> {
        self.root.as_ref().and_then(|node| find(node, id))
    }

    /// Mutably borrow a pane's content.
    pub fn get_mut(&mut self, id: PaneId) -> Option<&mut T> {
        self.root.as_mut().and_then(|node| find_mut(node, id))
    }

    /// Replace the leaf `pane` with a split holding the old pane on the
    /// left/top and `content` on the right/bottom at ratio 0.5.
    ///
    /// Returns the new pane's id, or `None` when `pane` does not exist.
    pub fn split(
        &mut self,
        pane: PaneId,
        direction: SplitDirection,
        content: T,
    ) -> Option<PaneId> {
        let new_id = PaneId(self.next_id);
        let root = self.root.take()?;
        let mut pending = Some(content);
        let root = split_node(root, pane, direction, &mut pending, new_id);
        self.root = Some(root);
        if pending.is_none() {
            self.next_id += 1;
            Some(new_id)
        } else {
            None
        }
    }

    /// Remove a leaf; its parent collapses into the surviving sibling.
    /// Returns the removed content. Removing the last leaf empties the
    /// tree (the owning tab closes).
    pub fn close(&mut self, pane: PaneId) -> Option<T> {
        let root = self.root.take()?;
        match close_node(root, pane) {
            CloseResult::Removed { survivor, content } => {
                self.root = survivor;
                self.layout.remove(&pane);
                Some(content)
            }
            CloseResult::NotFound(root) => {
                self.root = Some(root);
                None
            }
        }
    }

    /// The rectangle last assigned to a pane by [`PaneTree::update_layout`].
    #[must_use]
    pub fn rect(&self, id: PaneId) -> Option<Rect> {
        self.layout.get(&id).copied()
    }

    /// Point-locate the leaf under a pixel position.
    #[must_use]
    pub fn find_pane_at(&self, x: f32, y: f32) -> Option<PaneId> {
        self.layout
            .iter()
            .find(|(_, rect)| rect.contains(x, y))
            .map(|(id, _)| *id)
    }

    /// Adjust the ratio of the split directly containing `pane`, clamped
    /// to keep both sides visible. No-op for a lone root leaf.
    pub fn adjust_ratio(&mut self, pane: PaneId, delta: f32) {
        if let Some(root) = self.root.as_mut() {
            adjust_ratio_node(root, pane, delta);
        }
    }
}

impl<T: PaneContent> PaneTree<T> {
    /// Recompute pane rectangles for the given content area and issue grid
    /// resizes to panes whose cell dimensions changed.
    pub fn update_layout(&mut self, area: Rect, cell_w: f32, cell_h: f32) {
        self.layout.clear();
        let Some(root) = self.root.as_mut() else {
            return;
        };
        layout_node(root, area, cell_w, cell_h, &mut self.layout);
    }
}

fn collect_ids<T>(node: &PaneNode<T>, out: &mut Vec<PaneId>) {
    match node {
        PaneNode::Leaf { id, .. } => out.push(*id),
        PaneNode::Split { left, right, .. } => {
            collect_ids(left, out);
            collect_ids(right, out);
        }
    }
}

fn find<T>(node: &PaneNode<T>, target: PaneId) -> Option<&T> {
    match node {
        PaneNode::Leaf { id, content, .. } if *id == target => Some(content),
        PaneNode::Leaf { .. } => None,
        PaneNode::Split { left, right, .. } => {
            find(left, target).or_else(|| find(right, target))
        }
    }
}

fn find_mut<T>(node: &mut PaneNode<T>, target: PaneId) -> Option<&mut T> {
    match node {
        PaneNode::Leaf { id, content, .. } if *id == target => Some(content),
        PaneNode::Leaf { .. } => None,
        PaneNode::Split { left, right, .. } => {
            if let Some(found) = find_mut(left, target) {
                Some(found)
            } else {
                find_mut(right, target)
            }
        }
    }
}

/// Rebuild the tree with `pane` replaced by a split. `pending` holds the
/// new pane's content and is taken exactly when the target leaf is found.
fn split_node<T>(
    node: PaneNode<T>,
    target: PaneId,
    direction: SplitDirection,
    pending: &mut Option<T>,
    new_id: PaneId,
) -> PaneNode<T> {
    match node {
        PaneNode::Leaf {
            id,
            content,
            cols,
            rows,
        } => {
            let leaf = PaneNode::Leaf {
                id,
                content,
                cols,
                rows,
            };
            if id == target {
                if let Some(new_content) = pending.take() {
                    return PaneNode::Split {
                        direction,
                        ratio: 0.5,
                        left: Box::new(leaf),
                        right: Box::new(PaneNode::Leaf {
                            id: new_id,
                            content: new_content,
                            cols: 0,
                            rows: 0,
                        }),
                    };
                }
            }
            leaf
        }
        PaneNode::Split {
            direction: dir,
            ratio,
            left,
            right,
        } => {
            let left = split_node(*left, target, direction, pending, new_id);
            let right = if pending.is_some() {
                split_node(*right, target, direction, pending, new_id)
            } else {
                *right
            };
            PaneNode::Split {
                direction: dir,
                ratio,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
    }
}

enum CloseResult<T> {
    Removed {
        survivor: Option<PaneNode<T>>,
        content: T,
    },
    NotFound(PaneNode<T>),
}

fn close_node<T>(node: PaneNode<T>, target: PaneId) -> CloseResult<T> {
    match node {
        PaneNode::Leaf { id, content, .. } if id == target => CloseResult::Removed {
            survivor: None,
            content,
        },
        PaneNode::Leaf { .. } => CloseResult::NotFound(node),
        PaneNode::Split {
            direction,
            ratio,
            left,
            right,
        } => match close_node(*left, target) {
            CloseResult::Removed {
                survivor: None,
                content,
            } => CloseResult::Removed {
                survivor: Some(*right),
                content,
            },
            CloseResult::Removed {
                survivor: Some(left),
                content,
            } => CloseResult::Removed {
                survivor: Some(PaneNode::Split {
                    direction,
                    ratio,
                    left: Box::new(left),
                    right,
                }),
                content,
            },
            CloseResult::NotFound(left) => match close_node(*right, target) {
                CloseResult::Removed {
                    survivor: None,
                    content,
                } => CloseResult::Removed {
                    survivor: Some(left),
                    content,
                },
                CloseResult::Removed {
                    survivor: Some(right),
                    content,
                } => CloseResult::Removed {
                    survivor: Some(PaneNode::Split {
                        direction,
                        ratio,
                        left: Box::new(left),
                        right: Box::new(right),
                    }),
                    content,
                },
                CloseResult::NotFound(right) => CloseResult::NotFound(PaneNode::Split {
                    direction,
                    ratio,
                    left: Box::new(left),
                    right: Box::new(right),
                }),
            },
        },
    }
}

fn adjust_ratio_node<T>(node: &mut PaneNode<T>, target: PaneId, delta: f32) -> bool {
    match node {
        PaneNode::Leaf { id, .. } => *id == target,
        PaneNode::Split {
            ratio, left, right, ..
        } => {
            let in_left = adjust_ratio_node(left, target, delta);
            let in_right = !in_left && adjust_ratio_node(right, target, delta);
            if in_left || in_right {
                // The nearest enclosing split absorbs the adjustment.
                *ratio = (*ratio + delta).clamp(MIN_RATIO, MAX_RATIO);
                false
            } else {
                false
            }
        }
    }
}

fn layout_node<T: PaneContent>(
    node: &mut PaneNode<T>,
    area: Rect,
    cell_w: f32,
    cell_h: f32,
    out: &mut HashMap<PaneId, Rect>,
) {
    match node {
        PaneNode::Leaf {
            id,
            content,
            cols,
            rows,
        } => {
            out.insert(*id, area);
            let new_cols = ((area.w / cell_w).floor() as u16).max(1);
            let new_rows = ((area.h / cell_h).floor() as u16).max(1);
            if new_cols != *cols || new_rows != *rows {
                *cols = new_cols;
                *rows = new_rows;
                content.resize_grid(new_cols, new_rows);
            }
        }
        PaneNode::Split {
            direction,
            ratio,
            left,
            right,
        } => {
            let (first, second) = match direction {
                SplitDirection::Horizontal => {
                    let left_w = (area.w * *ratio).floor();
                    (
                        Rect {
                            w: left_w,
                            ..area
                        },
                        Rect {
                            x: area.x + left_w,
                            w: area.w - left_w,
                            ..area
                        },
                    )
                }
                SplitDirection::Vertical => {
                    let top_h = (area.h * *ratio).floor();
                    (
                        Rect {
                            h: top_h,
                            ..area
                        },
                        Rect {
                            y: area.y + top_h,
                            h: area.h - top_h,
                            ..area
                        },
                    )
                }
            };
            layout_node(left, first, cell_w, cell_h, out);
            layout_node(right, second, cell_w, cell_h, out);
        }
    }
}
