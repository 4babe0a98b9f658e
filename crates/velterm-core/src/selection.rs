//! Text selection over the screen buffer.
//!
//! Coordinates are absolute (scrollback-inclusive) so a selection survives
//! scrolling: `(col, abs_row)` where `abs_row` 0 is the oldest retained
//! row. The selection lifecycle is `Idle -> Selecting -> Selected`, driven
//! by mouse events from the host shell.

use crate::screen::ScreenBuffer;

/// Selection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionState {
    #[default]
    Idle,
    /// Mouse button held, endpoint tracking the pointer.
    Selecting,
    /// Finished, non-empty range.
    Selected,
}

/// Linear (stream) or rectangular (Alt-drag) selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    #[default]
    Linear,
    Rectangular,
}

/// An endpoint in absolute coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionPoint {
    pub col: u16,
    pub abs_row: usize,
}

/// Extra characters treated as word constituents by [`Selection::select_word`]
/// beyond letters, digits, and underscore.
pub const DEFAULT_WORD_CHARS: &str = "-./:@";

/// Mouse-driven text selection.
#[derive(Debug, Clone)]
pub struct Selection {
    state: SelectionState,
    mode: SelectionMode,
    anchor: SelectionPoint,
    active: SelectionPoint,
    extra_word_chars: Vec<char>,
}

impl Default for Selection {
    fn default() -> Self {
        Self::new()
    }
}

impl Selection {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SelectionState::Idle,
            mode: SelectionMode::Linear,
            anchor: SelectionPoint { col: 0, abs_row: 0 },
            active: SelectionPoint { col: 0, abs_row: 0 },
            extra_word_chars: DEFAULT_WORD_CHARS.chars().collect(),
        }
    }

    /// Override the extra word-character set used by word selection.
    pub fn set_extra_word_chars(&mut self, chars: &str) {
        self.extra_word_chars = chars.chars().collect();
    }

    #[must_use]
    pub fn state(&self) -> SelectionState {
        self.state
    }

    #[must_use]
    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    /// Toggle rectangular mode (Alt-drag). Takes effect on the current
    /// selection immediately.
    pub fn set_mode(&mut self, mode: SelectionMode) {
        self.mode = mode;
    }

    /// Begin a selection at an absolute position (from any state).
    pub fn start(&mut self, col: u16, abs_row: usize) {
        let point = SelectionPoint { col, abs_row };
        self.anchor = point;
        self.active = point;
        self.state = SelectionState::Selecting;
    }

    /// Move the active endpoint while selecting.
    pub fn update(&mut self, col: u16, abs_row: usize) {
        if self.state == SelectionState::Selecting {
            self.active = SelectionPoint { col, abs_row };
        }
    }

    /// Finish the drag. Collapses to `Idle` when the range is empty.
    pub fn end(&mut self) {
        if self.state == SelectionState::Selecting {
            self.state = if self.anchor == self.active {
                SelectionState::Idle
            } else {
                SelectionState::Selected
            };
        }
    }

    /// Drop the selection.
    pub fn clear(&mut self) {
        self.state = SelectionState::Idle;
    }

    /// Select the maximal run of word characters around `(col, abs_row)`.
    /// No-op (clears) when the position holds a non-word character.
    pub fn select_word(&mut self, col: u16, abs_row: usize, buffer: &ScreenBuffer) {
        let at = |c: u16| -> Option<char> { buffer.at_absolute(c, abs_row).map(|cell| cell.ch) };
        let Some(ch) = at(col) else {
            self.clear();
            return;
        };
        if !self.is_word_char(ch) {
            self.clear();
            return;
        }

        let mut start = col;
        while start > 0 {
            match at(start - 1) {
                Some(ch) if self.is_word_char(ch) => start -= 1,
                _ => break,
            }
        }
        let mut end = col;
        while end + 1 < buffer.cols() {
            match at(end + 1) {
                Some(ch) if self.is_word_char(ch) => end += 1,
                _ => break,
            }
        }

        self.anchor = SelectionPoint {
            col: start,
            abs_row,
        };
        self.active = SelectionPoint { col: end, abs_row };
        self.state = SelectionState::Selected;
    }

    fn is_word_char(&self, ch: char) -> bool {
        ch.is_alphanumeric() || ch == '_' || self.extra_word_chars.contains(&ch)
    }

    /// The normalized `(start, end)` endpoints in row-major order, when a
    /// selection is active or in progress.
    #[must_use]
    pub fn range(&self) -> Option<(SelectionPoint, SelectionPoint)> {
        if self.state == SelectionState::Idle {
            return None;
        }
        let (a, b) = (self.anchor, self.active);
        let ordered = if (a.abs_row, a.col) <= (b.abs_row, b.col) {
            (a, b)
        } else {
            (b, a)
        };
        Some(ordered)
    }

    /// Whether an absolute position falls inside the selection.
    #[must_use]
    pub fn is_selected(&self, col: u16, abs_row: usize) -> bool {
        let Some((start, end)) = self.range() else {
            return false;
        };
        match self.mode {
            SelectionMode::Linear => {
                if abs_row < start.abs_row || abs_row > end.abs_row {
                    return false;
                }
                if start.abs_row == end.abs_row {
                    return col >= start.col && col <= end.col;
                }
                if abs_row == start.abs_row {
                    col >= start.col
                } else if abs_row == end.abs_row {
                    col <= end.col
                } else {
                    true
                }
            }
            SelectionMode::Rectangular => {
                let (lo, hi) = (start.col.min(end.col), start.col.max(end.col));
                abs_row >= start.abs_row && abs_row <= end.abs_row && col >= lo && col <= hi
            }
        }
    }

    /// Extract the selected text.
    ///
    /// Walks the range row by row, strips trailing spaces, and joins rows
    /// with `\n` — except across soft-wrapped rows, which concatenate
    /// directly so a wrapped logical line copies as one line.
    #[must_use]
    pub fn selected_text(&self, buffer: &ScreenBuffer) -> String {
        let Some((start, end)) = self.range() else {
            return String::new();
        };
        let mut out = String::new();
        for abs_row in start.abs_row..=end.abs_row {
            let (from, to) = match self.mode {
                SelectionMode::Linear => {
                    let from = if abs_row == start.abs_row { start.col } else { 0 };
                    let to = if abs_row == end.abs_row {
                        end.col
                    } else {
                        buffer.cols().saturating_sub(1)
                    };
                    (from, to)
                }
                SelectionMode::Rectangular => {
                    (start.col.min(end.col), start.col.max(end.col))
                }
            };

            let mut line = String::new();
            for col in from..=to {
                match buffer.at_absolute(col, abs_row) {
                    Some(cell) if cell.is_wide_continuation() => {}
                    Some(cell) => line.push(cell.ch),
                    None => {}
                }
            }
            let trimmed = line.trim_end_matches(' ');

            if abs_row > start.abs_row {
                let joined_by_wrap = self.mode == SelectionMode::Linear
                    && buffer.wrapped_at_absolute(abs_row);
                if !joined_by_wrap {
                    out.push('\n');
                }
            }
            out.push_str(trimmed);
        }
        out
    }
}
