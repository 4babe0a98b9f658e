//! Screen buffer: the grid + scrollback data model.
//!
//! Owns the live cell grid, the alternate screen, the scrollback ring, the
//! cursor, and the mode state. All parser actions that mutate terminal
//! content are applied here; the terminal layer handles only host-visible
//! side effects (title, bell, query replies).
//!
//! # Invariants
//!
//! 1. The cursor lies in `[0, cols) x [0, rows)` after every operation.
//! 2. Rows shifted off the top go to scrollback iff the scroll region is
//!    full-height and the alternate screen is inactive.
//! 3. The alternate screen has no scrollback and its content is preserved
//!    across toggles.
//! 4. `viewport_offset` is in `[0, scrollback_len]`; 0 = pinned to bottom.

use crate::cell::{Cell, CellAttrs, HyperlinkId, Rgba};
use crate::cursor::{translate_charset, Cursor, SavedCursor};
use crate::modes::Modes;
use crate::palette::Palette;
use crate::parser::{Action, DynamicColor, EraseMode, LineEraseMode};
use crate::scrollback::Scrollback;
use crate::width::WidthPolicy;

/// Scroll state published for the renderer's scrollbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportMetrics {
    /// Scrollback lines plus live rows.
    pub total_rows: usize,
    /// Rows above the live view currently scrolled into view (0 = bottom).
    pub viewport_offset: usize,
    /// Maximum legal offset (= scrollback length).
    pub max_offset: usize,
    pub rows: u16,
    pub cols: u16,
}

impl ViewportMetrics {
    /// Whether there is any scrollback to reveal.
    #[must_use]
    pub fn has_scrollback(&self) -> bool {
        self.max_offset > 0
    }
}

/// The stashed half of the main/alternate screen pair.
#[derive(Debug, Clone)]
struct InactiveScreen {
    grid: Vec<Cell>,
    row_wrapped: Vec<bool>,
}

/// Grid + scrollback screen model for one terminal.
#[derive(Debug, Clone)]
pub struct ScreenBuffer {
    cols: u16,
    rows: u16,
    grid: Vec<Cell>,
    /// `row_wrapped[r]` is true when live row `r` is a soft-wrap
    /// continuation of the row above it.
    row_wrapped: Vec<bool>,
    inactive: Option<InactiveScreen>,
    alt_active: bool,
    cursor: Cursor,
    saved_cursor: SavedCursor,
    /// Cursor stashed by DECSET 1049 on alt-screen entry.
    alt_saved_cursor: Option<SavedCursor>,
    modes: Modes,
    scrollback: Scrollback,
    viewport_offset: usize,
    palette: Palette,
    width_policy: WidthPolicy,
    /// OSC 8 URI registry; ids are 1-based indices into this list.
    hyperlinks: Vec<String>,
    active_hyperlink: HyperlinkId,
    last_printed: Option<char>,
}

impl ScreenBuffer {
    /// Create a screen buffer.
    ///
    /// # Panics
    ///
    /// Panics if `cols == 0` or `rows == 0`.
    #[must_use]
    pub fn new(
        cols: u16,
        rows: u16,
        scrollback_max: usize,
        palette: Palette,
        width_policy: WidthPolicy,
    ) -> Self {
        assert!(cols > 0, "cols must be > 0");
        assert!(rows > 0, "rows must be > 0");
        let blank = Cell::blank(palette.foreground, palette.background);
        Self {
            cols,
            rows,
            grid: vec![blank; usize::from(cols) * usize::from(rows)],
            row_wrapped: vec![false; usize::from(rows)],
            inactive: None,
            alt_active: false,
            cursor: Cursor::new(cols, rows),
            saved_cursor: SavedCursor::default(),
            alt_saved_cursor: None,
            modes: Modes::new(),
            scrollback: Scrollback::new(scrollback_max),
            viewport_offset: 0,
            palette,
            width_policy,
            hyperlinks: Vec::new(),
            active_hyperlink: 0,
            last_printed: None,
        }
    }

    // ── Inspection ──────────────────────────────────────────────────

    #[must_use]
    pub fn cols(&self) -> u16 {
        self.cols
    }

    #[must_use]
    pub fn rows(&self) -> u16 {
        self.rows
    }

    #[must_use]
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    #[must_use]
    pub fn modes(&self) -> &Modes {
        &self.modes
    }

    #[must_use]
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    #[must_use]
    pub fn alt_screen_active(&self) -> bool {
        self.alt_active
    }

    /// Cell in the live grid.
    #[must_use]
    pub fn cell(&self, row: u16, col: u16) -> Option<&Cell> {
        if row < self.rows && col < self.cols {
            self.grid.get(self.idx(row, col))
        } else {
            None
        }
    }

    /// Number of lines currently in scrollback.
    #[must_use]
    pub fn scrollback_len(&self) -> usize {
        self.scrollback.len()
    }

    /// Scrollback lines plus live rows.
    #[must_use]
    pub fn total_rows(&self) -> usize {
        self.scrollback.len() + usize::from(self.rows)
    }

    /// Cell addressed in absolute (scrollback-inclusive) coordinates.
    /// `abs_row` 0 is the oldest retained row. Returns `None` outside the
    /// populated area (callers treat that as a blank).
    #[must_use]
    pub fn at_absolute(&self, col: u16, abs_row: usize) -> Option<&Cell> {
        let sb_len = self.scrollback.len();
        if abs_row < sb_len {
            self.scrollback.line(abs_row)?.cells.get(usize::from(col))
        } else {
            let row = abs_row - sb_len;
            if row < usize::from(self.rows) {
                self.cell(row as u16, col)
            } else {
                None
            }
        }
    }

    /// Whether the absolute row is a soft-wrap continuation of the previous.
    #[must_use]
    pub fn wrapped_at_absolute(&self, abs_row: usize) -> bool {
        let sb_len = self.scrollback.len();
        if abs_row < sb_len {
            self.scrollback
                .line(abs_row)
                .map(|line| line.wrapped)
                .unwrap_or(false)
        } else {
            let row = abs_row - sb_len;
            self.row_wrapped.get(row).copied().unwrap_or(false)
        }
    }

    /// Viewport scroll state for the renderer.
    #[must_use]
    pub fn viewport_metrics(&self) -> ViewportMetrics {
        ViewportMetrics {
            total_rows: self.total_rows(),
            viewport_offset: self.viewport_offset,
            max_offset: self.scrollback.len(),
            rows: self.rows,
            cols: self.cols,
        }
    }

    #[must_use]
    pub fn viewport_offset(&self) -> usize {
        self.viewport_offset
    }

    /// Set the viewport offset (rows above the live view), clamped.
    /// Scrolling is disabled while the alternate screen is active.
    pub fn set_viewport_offset(&mut self, offset: usize) {
        self.viewport_offset = if self.alt_active {
            0
        } else {
            offset.min(self.scrollback.len())
        };
    }

    /// Adjust the viewport offset by a signed delta.
    pub fn scroll_viewport(&mut self, delta: isize) {
        let current = self.viewport_offset as isize;
        self.set_viewport_offset(current.saturating_add(delta).max(0) as usize);
    }

    /// URI for a hyperlink id written into cells, if still registered.
    #[must_use]
    pub fn hyperlink_uri(&self, id: HyperlinkId) -> Option<&str> {
        if id == 0 {
            None
        } else {
            self.hyperlinks.get(usize::from(id) - 1).map(String::as_str)
        }
    }

    /// The characters of a live row (test/diagnostic helper).
    #[must_use]
    pub fn row_text(&self, row: u16) -> String {
        let mut out = String::with_capacity(usize::from(self.cols));
        for col in 0..self.cols {
            if let Some(cell) = self.cell(row, col) {
                if !cell.is_wide_continuation() {
                    out.push(cell.ch);
                }
            }
        }
        while out.ends_with(' ') {
            out.pop();
        }
        out
    }

    /// All live rows joined with newlines (test/diagnostic helper).
    #[must_use]
    pub fn screen_text(&self) -> String {
        (0..self.rows)
            .map(|r| self.row_text(r))
            .collect::<Vec<_>>()
            .join("\n")
    }

    // ── Action application ──────────────────────────────────────────

    /// Apply a parser action that targets screen content or modes.
    ///
    /// Terminal-level actions (title, bell, device queries) are no-ops
    /// here; the terminal layer intercepts them.
    pub fn apply_action(&mut self, action: &Action) {
        match action {
            Action::Print(ch) => self.put(*ch),
            Action::Bell => {}
            Action::Backspace => self.backspace(),
            Action::Tab => self.tab(),
            Action::LineFeed => self.line_feed(),
            Action::CarriageReturn => self.carriage_return(),
            Action::SaveCursor => self.saved_cursor = SavedCursor::save(&self.cursor),
            Action::RestoreCursor => {
                let saved = self.saved_cursor.clone();
                saved.restore(&mut self.cursor, self.cols, self.rows);
            }
            Action::Index => self.index(),
            Action::ReverseIndex => self.reverse_index(),
            Action::NextLine => {
                self.cursor.carriage_return();
                self.index();
            }
            Action::FullReset => self.full_reset(),
            Action::DesignateCharset { slot, charset } => {
                self.cursor.designate_charset(*slot, *charset);
            }
            Action::SetTabStop => self.cursor.set_tab_stop(),
            Action::ScreenAlignment => self.screen_alignment(),
            Action::CursorUp(n) => self.cursor.move_up(*n),
            Action::CursorDown(n) => self.cursor.move_down(*n, self.rows),
            Action::CursorRight(n) => self.cursor.move_right(*n, self.cols),
            Action::CursorLeft(n) => self.cursor.move_left(*n),
            Action::CursorNextLine(n) => {
                self.cursor.move_down(*n, self.rows);
                self.cursor.carriage_return();
            }
            Action::CursorPrevLine(n) => {
                self.cursor.move_up(*n);
                self.cursor.carriage_return();
            }
            Action::CursorColumn(col) => {
                let row = self.cursor.row;
                self.cursor.move_to(row, *col, self.cols, self.rows);
            }
            Action::CursorRow(row) => self.move_cursor_origin_aware(*row, self.cursor.col),
            Action::CursorPosition { row, col } => self.move_cursor_origin_aware(*row, *col),
            Action::EraseInDisplay(mode) => self.erase_in_display(*mode),
            Action::EraseInLine(mode) => self.erase_in_line(*mode),
            Action::ScrollUp(n) => self.scroll_up(*n),
            Action::ScrollDown(n) => self.scroll_down(*n),
            Action::InsertLines(n) => self.insert_lines(*n),
            Action::DeleteLines(n) => self.delete_lines(*n),
            Action::InsertChars(n) => self.insert_chars(*n),
            Action::DeleteChars(n) => self.delete_chars(*n),
            Action::EraseChars(n) => self.erase_chars(*n),
            Action::BackTab(n) => {
                for _ in 0..*n {
                    self.cursor.col = self.cursor.prev_tab_stop();
                }
                self.cursor.pending_wrap = false;
            }
            Action::RepeatChar(n) => {
                if let Some(ch) = self.last_printed {
                    for _ in 0..*n {
                        self.put(ch);
                    }
                }
            }
            Action::ClearTabStops(mode) => match mode {
                0 => self.cursor.clear_tab_stop(),
                3 | 5 => self.cursor.clear_all_tab_stops(),
                _ => {}
            },
            Action::SetScrollRegion { top, bottom } => self.set_scroll_region(*top, *bottom),
            Action::Sgr(params) => self.cursor.pen.apply_sgr(params),
            Action::SetMode { private, modes } => self.apply_modes(*private, modes, true),
            Action::ResetMode { private, modes } => self.apply_modes(*private, modes, false),
            Action::DeviceAttributes
            | Action::DeviceStatusReport
            | Action::CursorPositionReport
            | Action::SetTitle(_) => {}
            Action::HyperlinkStart(uri) => self.active_hyperlink = self.intern_hyperlink(uri),
            Action::HyperlinkEnd => self.active_hyperlink = 0,
            Action::SetPaletteColor { index, color } => self.palette.set_ansi(*index, *color),
            Action::SetDynamicColor { target, color } => match target {
                DynamicColor::Foreground => self.palette.foreground = *color,
                DynamicColor::Background => self.palette.background = *color,
                DynamicColor::Cursor => self.palette.cursor = *color,
            },
        }
    }

    fn apply_modes(&mut self, private: bool, modes: &[u16], enabled: bool) {
        for &mode in modes {
            if private {
                self.modes.set_dec_mode(mode, enabled);
                match mode {
                    6 => {
                        let top = self.cursor.scroll_top();
                        let origin_row = if enabled { top } else { 0 };
                        self.cursor.move_to(origin_row, 0, self.cols, self.rows);
                    }
                    25 => self.cursor.visible = enabled,
                    47 | 1047 => self.switch_alternate(enabled, false),
                    1049 => self.switch_alternate(enabled, true),
                    _ => {}
                }
            } else {
                self.modes.set_ansi_mode(mode, enabled);
            }
        }
    }

    // ── Printing ────────────────────────────────────────────────────

    /// Write one character at the cursor, honoring deferred wrap, wide
    /// characters, insert mode, charset translation, and the active
    /// hyperlink.
    pub fn put(&mut self, ch: char) {
        let ch = translate_charset(ch, self.cursor.effective_charset());
        let width = self.width_policy.char_width(ch);
        if width == 0 {
            // Zero-width scalars (combining marks, ZWJ) are dropped: the
            // grid stores one scalar per cell.
            return;
        }
        self.last_printed = Some(ch);

        if self.cursor.pending_wrap {
            if self.modes.autowrap() {
                self.wrap_line();
            } else {
                self.cursor.pending_wrap = false;
            }
        }

        if width == 2 && self.cursor.col + 1 >= self.cols {
            // A wide char that cannot fit at the margin wraps (or is
            // dropped with autowrap off).
            if self.modes.autowrap() {
                self.wrap_line();
            } else {
                self.cursor.pending_wrap = false;
                return;
            }
            if self.cursor.col + 1 >= self.cols {
                // The grid itself is narrower than the glyph.
                return;
            }
        }

        if self.modes.insert_mode() {
            self.insert_chars(u16::from(width));
        }

        let row = self.cursor.row;
        let col = self.cursor.col;
        let mut attrs = self.cursor.pen.flags;
        let hyperlink = self.active_hyperlink;
        if hyperlink != 0 {
            attrs.insert(CellAttrs::HYPERLINK);
        }
        let fg = self.palette.resolve_fg(self.cursor.pen.fg);
        let bg = self.palette.resolve_bg(self.cursor.pen.bg);

        self.clear_wide_pair(row, col);
        if width == 2 {
            self.clear_wide_pair(row, col + 1);
            let lead_idx = self.idx(row, col);
            self.grid[lead_idx] = Cell {
                ch,
                fg,
                bg,
                attrs: attrs | CellAttrs::WIDE_CHAR,
                hyperlink,
            };
            let cont_idx = self.idx(row, col + 1);
            self.grid[cont_idx] = Cell {
                ch: ' ',
                fg,
                bg,
                attrs: attrs | CellAttrs::WIDE_CONTINUATION,
                hyperlink,
            };
        } else {
            let idx = self.idx(row, col);
            self.grid[idx] = Cell {
                ch,
                fg,
                bg,
                attrs,
                hyperlink,
            };
        }

        if col + u16::from(width) >= self.cols {
            self.cursor.pending_wrap = true;
        } else {
            self.cursor.col = col + u16::from(width);
            self.cursor.pending_wrap = false;
        }
    }

    fn wrap_line(&mut self) {
        self.cursor.carriage_return();
        self.index();
        let row = usize::from(self.cursor.row);
        self.row_wrapped[row] = true;
    }

    /// IND: move down one row, scrolling the region when at its bottom.
    pub fn index(&mut self) {
        if self.cursor.row + 1 == self.cursor.scroll_bottom() {
            self.scroll_region_up(1);
        } else if self.cursor.row + 1 < self.rows {
            self.cursor.row += 1;
        }
        self.cursor.pending_wrap = false;
    }

    /// RI: move up one row, scrolling the region down when at its top.
    pub fn reverse_index(&mut self) {
        if self.cursor.row == self.cursor.scroll_top() {
            self.scroll_region_down(1);
        } else {
            self.cursor.move_up(1);
        }
        self.cursor.pending_wrap = false;
    }

    /// LF (honoring linefeed/newline mode).
    pub fn line_feed(&mut self) {
        if self
            .modes
            .ansi
            .contains(crate::modes::AnsiModes::LINEFEED_NEWLINE)
        {
            self.cursor.carriage_return();
        }
        self.index();
    }

    pub fn carriage_return(&mut self) {
        self.cursor.carriage_return();
    }

    /// BS: move left one column; does not erase.
    pub fn backspace(&mut self) {
        self.cursor.move_left(1);
    }

    /// HT: advance to the next tab stop, clamped to the last column.
    pub fn tab(&mut self) {
        self.cursor.col = self.cursor.next_tab_stop(self.cols);
        self.cursor.pending_wrap = false;
    }

    // ── Scrolling ───────────────────────────────────────────────────

    /// SU: scroll the region up by `n`.
    pub fn scroll_up(&mut self, n: u16) {
        self.scroll_region_up(n);
    }

    /// SD: scroll the region down by `n`.
    pub fn scroll_down(&mut self, n: u16) {
        self.scroll_region_down(n);
    }

    fn scroll_region_up(&mut self, n: u16) {
        let top = usize::from(self.cursor.scroll_top());
        let bottom = usize::from(self.cursor.scroll_bottom());
        let n = usize::from(n).min(bottom - top);
        if n == 0 {
            return;
        }

        let to_scrollback =
            !self.alt_active && self.cursor.full_height_region(self.rows);
        for _ in 0..n {
            if to_scrollback {
                let cells = self.take_row(top);
                let wrapped = self.row_wrapped[top];
                self.scrollback.push(cells, wrapped);
                if self.viewport_offset > 0 {
                    // Keep the scrolled-back view anchored on the same rows.
                    self.viewport_offset =
                        (self.viewport_offset + 1).min(self.scrollback.len());
                }
            }
            for row in top..bottom - 1 {
                self.copy_row(row + 1, row);
            }
            self.blank_row(bottom - 1);
        }
    }

    fn scroll_region_down(&mut self, n: u16) {
        let top = usize::from(self.cursor.scroll_top());
        let bottom = usize::from(self.cursor.scroll_bottom());
        let n = usize::from(n).min(bottom - top);
        for _ in 0..n {
            for row in (top + 1..bottom).rev() {
                self.copy_row(row - 1, row);
            }
            self.blank_row(top);
        }
    }

    /// DECSTBM. `top` is 0-indexed inclusive; `bottom` is exclusive with 0
    /// meaning full height. The cursor homes (origin-aware).
    pub fn set_scroll_region(&mut self, top: u16, bottom: u16) {
        let bottom = if bottom == 0 {
            self.rows
        } else {
            bottom.min(self.rows)
        };
        self.cursor.set_scroll_region(top, bottom, self.rows);
        if self.modes.origin_mode() {
            let home = self.cursor.scroll_top();
            self.cursor.move_to(home, 0, self.cols, self.rows);
        } else {
            self.cursor.move_to(0, 0, self.cols, self.rows);
        }
    }

    // ── Erase / edit ────────────────────────────────────────────────

    /// ED.
    pub fn erase_in_display(&mut self, mode: EraseMode) {
        match mode {
            EraseMode::ToEnd => {
                self.erase_in_line(LineEraseMode::ToEnd);
                for row in self.cursor.row + 1..self.rows {
                    self.blank_row(usize::from(row));
                }
            }
            EraseMode::ToBegin => {
                for row in 0..self.cursor.row {
                    self.blank_row(usize::from(row));
                }
                self.erase_in_line(LineEraseMode::ToBegin);
            }
            EraseMode::All => {
                for row in 0..self.rows {
                    self.blank_row(usize::from(row));
                }
            }
            EraseMode::ScrollbackOnly => {
                self.scrollback.clear();
                self.viewport_offset = 0;
            }
        }
    }

    /// EL.
    pub fn erase_in_line(&mut self, mode: LineEraseMode) {
        let row = self.cursor.row;
        let (start, end) = match mode {
            LineEraseMode::ToEnd => (self.cursor.col, self.cols),
            LineEraseMode::ToBegin => (0, self.cursor.col + 1),
            LineEraseMode::All => (0, self.cols),
        };
        let fill = self.erase_cell();
        for col in start..end.min(self.cols) {
            self.clear_wide_pair(row, col);
            let idx = self.idx(row, col);
            self.grid[idx] = fill;
        }
    }

    /// IL: insert blank lines at the cursor row (inside the region only).
    pub fn insert_lines(&mut self, n: u16) {
        if !self.cursor_in_region() {
            return;
        }
        let row = usize::from(self.cursor.row);
        let bottom = usize::from(self.cursor.scroll_bottom());
        let n = usize::from(n).min(bottom - row);
        for _ in 0..n {
            for r in (row + 1..bottom).rev() {
                self.copy_row(r - 1, r);
            }
            self.blank_row(row);
        }
        self.cursor.pending_wrap = false;
    }

    /// DL: delete lines at the cursor row (inside the region only).
    pub fn delete_lines(&mut self, n: u16) {
        if !self.cursor_in_region() {
            return;
        }
        let row = usize::from(self.cursor.row);
        let bottom = usize::from(self.cursor.scroll_bottom());
        let n = usize::from(n).min(bottom - row);
        for _ in 0..n {
            for r in row..bottom - 1 {
                self.copy_row(r + 1, r);
            }
            self.blank_row(bottom - 1);
        }
        self.cursor.pending_wrap = false;
    }

    /// ICH: shift cells right from the cursor, dropping overflow.
    pub fn insert_chars(&mut self, n: u16) {
        let row = self.cursor.row;
        let col = self.cursor.col;
        let n = n.min(self.cols - col);
        let fill = self.erase_cell();
        for c in (col..self.cols - n).rev() {
            let from = self.idx(row, c);
            let to = self.idx(row, c + n);
            self.grid[to] = self.grid[from];
        }
        for c in col..col + n {
            let idx = self.idx(row, c);
            self.grid[idx] = fill;
        }
        self.cursor.pending_wrap = false;
    }

    /// DCH: shift cells left into the cursor, blanking the tail.
    pub fn delete_chars(&mut self, n: u16) {
        let row = self.cursor.row;
        let col = self.cursor.col;
        let n = n.min(self.cols - col);
        let fill = self.erase_cell();
        for c in col..self.cols - n {
            let from = self.idx(row, c + n);
            let to = self.idx(row, c);
            self.grid[to] = self.grid[from];
        }
        for c in self.cols - n..self.cols {
            let idx = self.idx(row, c);
            self.grid[idx] = fill;
        }
        self.cursor.pending_wrap = false;
    }

    /// ECH: blank `n` cells from the cursor without shifting.
    pub fn erase_chars(&mut self, n: u16) {
        let row = self.cursor.row;
        let start = self.cursor.col;
        let end = start.saturating_add(n).min(self.cols);
        let fill = self.erase_cell();
        for col in start..end {
            self.clear_wide_pair(row, col);
            let idx = self.idx(row, col);
            self.grid[idx] = fill;
        }
    }

    // ── Alternate screen ────────────────────────────────────────────

    /// Swap the main/alternate screens. With `save_cursor` (DECSET 1049)
    /// the cursor is stashed on entry and restored on exit.
    pub fn switch_alternate(&mut self, enable: bool, save_cursor: bool) {
        if enable == self.alt_active {
            return;
        }
        if enable && save_cursor {
            self.alt_saved_cursor = Some(SavedCursor::save(&self.cursor));
        }

        let blank = self.default_cell();
        let stashed = self.inactive.take().unwrap_or_else(|| InactiveScreen {
            grid: vec![blank; usize::from(self.cols) * usize::from(self.rows)],
            row_wrapped: vec![false; usize::from(self.rows)],
        });
        let current = InactiveScreen {
            grid: std::mem::replace(&mut self.grid, stashed.grid),
            row_wrapped: std::mem::replace(&mut self.row_wrapped, stashed.row_wrapped),
        };
        self.inactive = Some(current);
        self.alt_active = enable;
        self.viewport_offset = 0;
        self.cursor.clamp(self.cols, self.rows);

        if !enable && save_cursor {
            if let Some(saved) = self.alt_saved_cursor.take() {
                saved.restore(&mut self.cursor, self.cols, self.rows);
            }
        }
    }

    // ── Reset / fill ────────────────────────────────────────────────

    /// RIS: everything back to power-on state (palette retained).
    pub fn full_reset(&mut self) {
        let blank = self.default_cell();
        self.grid = vec![blank; usize::from(self.cols) * usize::from(self.rows)];
        self.row_wrapped = vec![false; usize::from(self.rows)];
        self.inactive = None;
        self.alt_active = false;
        self.cursor = Cursor::new(self.cols, self.rows);
        self.saved_cursor = SavedCursor::default();
        self.alt_saved_cursor = None;
        self.modes.reset();
        self.scrollback.clear();
        self.viewport_offset = 0;
        self.hyperlinks.clear();
        self.active_hyperlink = 0;
        self.last_printed = None;
    }

    /// DECALN: fill the screen with `E`, reset margins, home the cursor.
    pub fn screen_alignment(&mut self) {
        let fg = self.palette.foreground;
        let bg = self.palette.background;
        for cell in &mut self.grid {
            *cell = Cell {
                ch: 'E',
                ..Cell::blank(fg, bg)
            };
        }
        for wrapped in &mut self.row_wrapped {
            *wrapped = false;
        }
        self.cursor.set_scroll_region(0, self.rows, self.rows);
        self.cursor.move_to(0, 0, self.cols, self.rows);
    }

    // ── Resize ──────────────────────────────────────────────────────

    /// Resize the grid: columns truncate or pad on the right, rows are
    /// added/removed at the bottom, and the cursor keeps its position
    /// relative to the bottom of the live view. Scrollback is preserved.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        assert!(cols > 0, "cols must be > 0");
        assert!(rows > 0, "rows must be > 0");
        if cols == self.cols && rows == self.rows {
            return;
        }
        let cursor_from_bottom = self.rows - 1 - self.cursor.row.min(self.rows - 1);

        self.grid = Self::rebuild_grid(
            &self.grid,
            self.cols,
            self.rows,
            cols,
            rows,
            self.default_cell(),
        );
        self.row_wrapped.resize(usize::from(rows), false);
        self.row_wrapped.truncate(usize::from(rows));

        if let Some(inactive) = self.inactive.take() {
            self.inactive = Some(InactiveScreen {
                grid: Self::rebuild_grid(
                    &inactive.grid,
                    self.cols,
                    self.rows,
                    cols,
                    rows,
                    self.default_cell(),
                ),
                row_wrapped: {
                    let mut wrapped = inactive.row_wrapped;
                    wrapped.resize(usize::from(rows), false);
                    wrapped.truncate(usize::from(rows));
                    wrapped
                },
            });
        }

        self.cols = cols;
        self.rows = rows;
        self.cursor.resize(cols, rows);
        self.cursor.row = rows - 1 - cursor_from_bottom.min(rows - 1);
        self.viewport_offset = self.viewport_offset.min(self.scrollback.len());
    }

    fn rebuild_grid(
        old: &[Cell],
        old_cols: u16,
        old_rows: u16,
        cols: u16,
        rows: u16,
        blank: Cell,
    ) -> Vec<Cell> {
        let mut grid = vec![blank; usize::from(cols) * usize::from(rows)];
        for row in 0..old_rows.min(rows) {
            for col in 0..old_cols.min(cols) {
                let from = usize::from(row) * usize::from(old_cols) + usize::from(col);
                let to = usize::from(row) * usize::from(cols) + usize::from(col);
                grid[to] = old[from];
            }
        }
        grid
    }

    // ── Internals ───────────────────────────────────────────────────

    fn idx(&self, row: u16, col: u16) -> usize {
        usize::from(row) * usize::from(self.cols) + usize::from(col)
    }

    fn cursor_in_region(&self) -> bool {
        self.cursor.row >= self.cursor.scroll_top()
            && self.cursor.row < self.cursor.scroll_bottom()
    }

    /// The blank cell used for brand-new rows (scheme defaults).
    fn default_cell(&self) -> Cell {
        Cell::blank(self.palette.foreground, self.palette.background)
    }

    /// The blank cell used by erase/scroll fills: current pen background,
    /// default everything else.
    fn erase_cell(&self) -> Cell {
        Cell::blank(
            self.palette.foreground,
            self.palette.resolve_bg(self.cursor.pen.bg),
        )
    }

    fn take_row(&mut self, row: usize) -> Vec<Cell> {
        let start = row * usize::from(self.cols);
        self.grid[start..start + usize::from(self.cols)].to_vec()
    }

    fn copy_row(&mut self, from: usize, to: usize) {
        let cols = usize::from(self.cols);
        self.grid.copy_within(from * cols..(from + 1) * cols, to * cols);
        self.row_wrapped[to] = self.row_wrapped[from];
    }

    fn blank_row(&mut self, row: usize) {
        let fill = self.erase_cell();
        let cols = usize::from(self.cols);
        for cell in &mut self.grid[row * cols..(row + 1) * cols] {
            *cell = fill;
        }
        self.row_wrapped[row] = false;
    }

    /// Blank the partner cell when overwriting half of a wide pair.
    fn clear_wide_pair(&mut self, row: u16, col: u16) {
        let idx = self.idx(row, col);
        let cell = self.grid[idx];
        if cell.is_wide() && col + 1 < self.cols {
            let cont = self.idx(row, col + 1);
            self.grid[cont] = self.erase_cell();
        } else if cell.is_wide_continuation() && col > 0 {
            let lead = self.idx(row, col - 1);
            self.grid[lead] = self.erase_cell();
        }
    }

    fn move_cursor_origin_aware(&mut self, row: u16, col: u16) {
        if self.modes.origin_mode() {
            let top = self.cursor.scroll_top();
            let bottom = self.cursor.scroll_bottom();
            let abs_row = row.saturating_add(top).min(bottom.saturating_sub(1));
            self.cursor.row = abs_row;
            self.cursor.col = col.min(self.cols - 1);
            self.cursor.pending_wrap = false;
        } else {
            self.cursor.move_to(row, col, self.cols, self.rows);
        }
    }

    fn intern_hyperlink(&mut self, uri: &str) -> HyperlinkId {
        if let Some(pos) = self.hyperlinks.iter().position(|u| u == uri) {
            return (pos + 1) as HyperlinkId;
        }
        if self.hyperlinks.len() >= usize::from(HyperlinkId::MAX) - 1 {
            // Registry full: newest links go unattributed.
            return 0;
        }
        self.hyperlinks.push(uri.to_string());
        self.hyperlinks.len() as HyperlinkId
    }

    /// The resolved default colors (for renderers and tests).
    #[must_use]
    pub fn default_colors(&self) -> (Rgba, Rgba) {
        (self.palette.foreground, self.palette.background)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn screen(cols: u16, rows: u16) -> ScreenBuffer {
        ScreenBuffer::new(cols, rows, 100, Palette::default(), WidthPolicy::Standard)
    }

    fn feed(sb: &mut ScreenBuffer, bytes: &[u8]) {
        let mut parser = Parser::new();
        for action in parser.feed(bytes) {
            sb.apply_action(&action);
        }
    }

    #[test]
    fn put_advances_cursor() {
        let mut sb = screen(10, 3);
        feed(&mut sb, b"abc");
        assert_eq!(sb.row_text(0), "abc");
        assert_eq!((sb.cursor().row, sb.cursor().col), (0, 3));
    }

    #[test]
    fn deferred_wrap_at_margin() {
        let mut sb = screen(3, 2);
        feed(&mut sb, b"abc");
        // Cursor sits on the last column with wrap pending.
        assert_eq!(sb.cursor().col, 2);
        assert!(sb.cursor().pending_wrap);
        feed(&mut sb, b"d");
        assert_eq!(sb.row_text(0), "abc");
        assert_eq!(sb.row_text(1), "d");
        assert!(sb.wrapped_at_absolute(sb.scrollback_len() + 1));
    }

    #[test]
    fn autowrap_off_overwrites_last_column() {
        let mut sb = screen(3, 2);
        feed(&mut sb, b"\x1b[?7labcdef");
        assert_eq!(sb.row_text(0), "abf");
        assert_eq!(sb.row_text(1), "");
    }

    #[test]
    fn linefeed_at_bottom_pushes_scrollback() {
        let mut sb = screen(5, 2);
        feed(&mut sb, b"aa\r\nbb\r\ncc");
        assert_eq!(sb.scrollback_len(), 1);
        assert_eq!(sb.at_absolute(0, 0).unwrap().ch, 'a');
        assert_eq!(sb.row_text(0), "bb");
        assert_eq!(sb.row_text(1), "cc");
    }

    #[test]
    fn scroll_region_restricts_scrolling() {
        let mut sb = screen(5, 4);
        feed(&mut sb, b"r0\r\nr1\r\nr2\r\nr3");
        // Region rows 1..3 (1-based 2..3), cursor homes afterwards.
        feed(&mut sb, b"\x1b[2;3r");
        feed(&mut sb, b"\x1b[3;1H\n");
        // Scrolling inside the region must not create scrollback.
        assert_eq!(sb.scrollback_len(), 0);
        assert_eq!(sb.row_text(0), "r0");
        assert_eq!(sb.row_text(1), "r2");
        assert_eq!(sb.row_text(2), "");
        assert_eq!(sb.row_text(3), "r3");
    }

    #[test]
    fn reverse_index_scrolls_down_at_top() {
        let mut sb = screen(5, 3);
        feed(&mut sb, b"aa\r\nbb\r\ncc\x1b[1;1H\x1bM");
        assert_eq!(sb.row_text(0), "");
        assert_eq!(sb.row_text(1), "aa");
        assert_eq!(sb.row_text(2), "bb");
    }

    #[test]
    fn erase_in_line_modes() {
        let mut sb = screen(5, 1);
        feed(&mut sb, b"abcde\x1b[3G\x1b[K");
        assert_eq!(sb.row_text(0), "ab");
        feed(&mut sb, b"\x1b[1K");
        assert_eq!(sb.row_text(0), "");
    }

    #[test]
    fn erase_display_all_keeps_scrollback() {
        let mut sb = screen(5, 2);
        feed(&mut sb, b"aa\r\nbb\r\ncc\x1b[2J");
        assert_eq!(sb.scrollback_len(), 1);
        assert_eq!(sb.screen_text(), "\n");
    }

    #[test]
    fn erase_scrollback_only() {
        let mut sb = screen(5, 2);
        feed(&mut sb, b"aa\r\nbb\r\ncc\x1b[3J");
        assert_eq!(sb.scrollback_len(), 0);
        assert_eq!(sb.row_text(0), "bb");
    }

    #[test]
    fn insert_and_delete_lines() {
        let mut sb = screen(5, 3);
        feed(&mut sb, b"aa\r\nbb\r\ncc\x1b[1;1H\x1b[L");
        assert_eq!(sb.screen_text(), "\naa\nbb");
        feed(&mut sb, b"\x1b[M");
        assert_eq!(sb.screen_text(), "aa\nbb\n");
    }

    #[test]
    fn insert_and_delete_chars() {
        let mut sb = screen(6, 1);
        feed(&mut sb, b"abcdef\x1b[2G\x1b[2@");
        assert_eq!(sb.row_text(0), "a  bcd");
        feed(&mut sb, b"\x1b[2P");
        assert_eq!(sb.row_text(0), "abcd");
    }

    #[test]
    fn erase_chars_blanks_without_shifting() {
        let mut sb = screen(6, 1);
        feed(&mut sb, b"abcdef\x1b[2G\x1b[3X");
        assert_eq!(sb.row_text(0), "a   ef");
    }

    #[test]
    fn wide_char_occupies_two_cells() {
        let mut sb = screen(6, 1);
        feed(&mut sb, "中b".as_bytes());
        assert_eq!(sb.cell(0, 0).unwrap().ch, '中');
        assert!(sb.cell(0, 0).unwrap().is_wide());
        assert!(sb.cell(0, 1).unwrap().is_wide_continuation());
        assert_eq!(sb.cell(0, 2).unwrap().ch, 'b');
    }

    #[test]
    fn overwriting_wide_half_clears_partner() {
        let mut sb = screen(6, 1);
        feed(&mut sb, "中".as_bytes());
        feed(&mut sb, b"\x1b[1Gx");
        assert_eq!(sb.cell(0, 0).unwrap().ch, 'x');
        assert!(!sb.cell(0, 1).unwrap().is_wide_continuation());
        assert_eq!(sb.cell(0, 1).unwrap().ch, ' ');
    }

    #[test]
    fn wide_char_wraps_when_not_fitting() {
        let mut sb = screen(3, 2);
        feed(&mut sb, "ab中".as_bytes());
        assert_eq!(sb.row_text(0), "ab");
        assert_eq!(sb.cell(1, 0).unwrap().ch, '中');
    }

    #[test]
    fn alternate_screen_preserves_main_and_scrollback() {
        let mut sb = screen(5, 2);
        feed(&mut sb, b"aa\r\nbb\r\ncc");
        let sb_before = sb.scrollback_len();
        feed(&mut sb, b"\x1b[?1049h\x1b[2Jalt");
        assert!(sb.alt_screen_active());
        assert_eq!(sb.row_text(0), "alt");
        // Writing past the bottom in alt must not grow scrollback.
        feed(&mut sb, b"\r\n\r\n\r\n");
        assert_eq!(sb.scrollback_len(), sb_before);
        feed(&mut sb, b"\x1b[?1049l");
        assert!(!sb.alt_screen_active());
        assert_eq!(sb.row_text(0), "bb");
        assert_eq!(sb.row_text(1), "cc");
    }

    #[test]
    fn alt_screen_content_survives_toggle() {
        let mut sb = screen(5, 2);
        feed(&mut sb, b"\x1b[?1049halt\x1b[?1049l\x1b[?1049h");
        assert_eq!(sb.row_text(0), "alt");
    }

    #[test]
    fn mode_1049_restores_cursor() {
        let mut sb = screen(10, 3);
        feed(&mut sb, b"ab\x1b[?1049h\x1b[3;5H\x1b[?1049l");
        assert_eq!((sb.cursor().row, sb.cursor().col), (0, 2));
    }

    #[test]
    fn resize_preserves_content_and_cursor_from_bottom() {
        let mut sb = screen(10, 4);
        feed(&mut sb, b"aa\r\nbb\r\ncc");
        // Cursor on row 2, one row above the bottom... from_bottom = 1.
        sb.resize(8, 3);
        assert_eq!(sb.rows(), 3);
        assert_eq!(sb.cols(), 8);
        assert_eq!(sb.cursor().row, 1);
        assert_eq!(sb.row_text(0), "aa");
        assert_eq!(sb.row_text(1), "bb");
    }

    #[test]
    fn viewport_offset_clamps_and_disables_in_alt() {
        let mut sb = screen(5, 2);
        feed(&mut sb, b"a\r\nb\r\nc\r\nd");
        assert_eq!(sb.scrollback_len(), 2);
        sb.set_viewport_offset(10);
        assert_eq!(sb.viewport_offset(), 2);
        feed(&mut sb, b"\x1b[?1049h");
        sb.set_viewport_offset(1);
        assert_eq!(sb.viewport_offset(), 0);
    }

    #[test]
    fn viewport_anchors_while_scrolled_back() {
        let mut sb = screen(5, 2);
        feed(&mut sb, b"a\r\nb\r\nc");
        sb.set_viewport_offset(1);
        feed(&mut sb, b"\r\nd");
        assert_eq!(sb.viewport_offset(), 2);
    }

    #[test]
    fn hyperlink_cells_carry_id() {
        let mut sb = screen(10, 1);
        feed(&mut sb, b"\x1b]8;;https://x.invalid\x1b\\ab\x1b]8;;\x1b\\c");
        let a = sb.cell(0, 0).unwrap();
        assert!(a.attrs.contains(CellAttrs::HYPERLINK));
        assert_eq!(sb.hyperlink_uri(a.hyperlink), Some("https://x.invalid"));
        let c = sb.cell(0, 2).unwrap();
        assert!(!c.attrs.contains(CellAttrs::HYPERLINK));
        assert_eq!(c.hyperlink, 0);
    }

    #[test]
    fn sgr_red_cells_resolve_to_palette() {
        let mut sb = screen(10, 1);
        feed(&mut sb, b"a\x1b[31mb\x1b[0mc");
        let (default_fg, _) = sb.default_colors();
        assert_eq!(sb.cell(0, 0).unwrap().fg, default_fg);
        assert_eq!(sb.cell(0, 1).unwrap().fg, Rgba::new(0xCD, 0, 0));
        assert_eq!(sb.cell(0, 2).unwrap().fg, default_fg);
    }

    #[test]
    fn erase_fills_with_current_background() {
        let mut sb = screen(4, 1);
        feed(&mut sb, b"\x1b[41m\x1b[2J");
        assert_eq!(sb.cell(0, 0).unwrap().bg, Rgba::new(0xCD, 0, 0));
        assert_eq!(sb.cell(0, 0).unwrap().attrs, CellAttrs::empty());
    }

    #[test]
    fn origin_mode_addresses_relative_to_region() {
        let mut sb = screen(10, 6);
        feed(&mut sb, b"\x1b[3;5r\x1b[?6h\x1b[1;1HX");
        assert_eq!(sb.cell(2, 0).unwrap().ch, 'X');
        // Addressing cannot escape the region.
        feed(&mut sb, b"\x1b[99;1HY");
        assert_eq!(sb.cell(4, 0).unwrap().ch, 'Y');
    }

    #[test]
    fn decaln_fills_screen() {
        let mut sb = screen(3, 2);
        feed(&mut sb, b"\x1b#8");
        assert_eq!(sb.screen_text(), "EEE\nEEE");
        assert_eq!((sb.cursor().row, sb.cursor().col), (0, 0));
    }

    #[test]
    fn rep_repeats_last_printed() {
        let mut sb = screen(10, 1);
        feed(&mut sb, b"x\x1b[3b");
        assert_eq!(sb.row_text(0), "xxxx");
    }

    #[test]
    fn full_reset_clears_everything() {
        let mut sb = screen(5, 2);
        feed(&mut sb, b"aa\r\nbb\r\ncc\x1b[31m\x1bc");
        assert_eq!(sb.scrollback_len(), 0);
        assert_eq!(sb.screen_text(), "\n");
        assert_eq!(sb.cursor().pen, crate::cell::Pen::default());
    }

    #[test]
    fn dynamic_colors_update_palette() {
        let mut sb = screen(5, 1);
        feed(&mut sb, b"\x1b]11;#102030\x07");
        assert_eq!(sb.palette().background, Rgba::new(0x10, 0x20, 0x30));
    }
}
