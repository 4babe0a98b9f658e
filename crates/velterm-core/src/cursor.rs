//! Terminal cursor: position, scroll region, tab stops, and saved state.
//!
//! The cursor tracks the current writing position plus the state that moves
//! with it: the active pen, the DECSTBM margins, per-column tab stops, and
//! the G0-G3 character set slots.

use crate::cell::Pen;

/// Default tab stop interval (every 8 columns).
const DEFAULT_TAB_INTERVAL: u16 = 8;

/// Terminal cursor state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    /// Current row (0-indexed from the top of the viewport).
    pub row: u16,
    /// Current column (0-indexed).
    pub col: u16,
    /// Whether the cursor is visible (DECTCEM).
    pub visible: bool,
    /// The cursor sits at the right margin and the next printable character
    /// should wrap first (xterm deferred-wrap semantics).
    pub pending_wrap: bool,
    /// Current pen applied to newly written characters.
    pub pen: Pen,
    /// Top of scroll region (inclusive, 0-indexed).
    scroll_top: u16,
    /// Bottom of scroll region (exclusive, 0-indexed).
    scroll_bottom: u16,
    /// `tab_stops[col]` is true when a tab stop is set at that column.
    tab_stops: Vec<bool>,
    /// Charset designators for slots G0-G3: `b'B'` ASCII, `b'0'` DEC
    /// Special Graphics.
    pub charset_slots: [u8; 4],
    /// Active charset slot index (0 = G0).
    pub active_charset: u8,
}

impl Cursor {
    /// Create a cursor for a grid of the given dimensions.
    #[must_use]
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            row: 0,
            col: 0,
            visible: true,
            pending_wrap: false,
            pen: Pen::default(),
            scroll_top: 0,
            scroll_bottom: rows,
            tab_stops: default_tab_stops(cols),
            charset_slots: [b'B'; 4],
            active_charset: 0,
        }
    }

    // ── Scroll region ───────────────────────────────────────────────

    /// Top of scroll region (inclusive).
    #[must_use]
    pub fn scroll_top(&self) -> u16 {
        self.scroll_top
    }

    /// Bottom of scroll region (exclusive).
    #[must_use]
    pub fn scroll_bottom(&self) -> u16 {
        self.scroll_bottom
    }

    /// Set the DECSTBM margins (0-indexed, `top` inclusive, `bottom`
    /// exclusive). Requests violating `top < bottom <= rows` are ignored.
    pub fn set_scroll_region(&mut self, top: u16, bottom: u16, rows: u16) {
        if top < bottom && bottom <= rows {
            self.scroll_top = top;
            self.scroll_bottom = bottom;
        }
    }

    /// Whether the full height is the scroll region.
    #[must_use]
    pub fn full_height_region(&self, rows: u16) -> bool {
        self.scroll_top == 0 && self.scroll_bottom == rows
    }

    // ── Movement ────────────────────────────────────────────────────

    /// Clamp the position to the grid bounds and clear pending wrap.
    pub fn clamp(&mut self, cols: u16, rows: u16) {
        self.row = self.row.min(rows.saturating_sub(1));
        self.col = self.col.min(cols.saturating_sub(1));
        self.pending_wrap = false;
    }

    /// CUP: absolute move, clamped.
    pub fn move_to(&mut self, row: u16, col: u16, cols: u16, rows: u16) {
        self.row = row.min(rows.saturating_sub(1));
        self.col = col.min(cols.saturating_sub(1));
        self.pending_wrap = false;
    }

    /// CUU: up, stopping at the top margin.
    pub fn move_up(&mut self, count: u16) {
        self.row = self.row.saturating_sub(count).max(self.scroll_top);
        self.pending_wrap = false;
    }

    /// CUD: down, stopping at the bottom margin.
    pub fn move_down(&mut self, count: u16, rows: u16) {
        let limit = self.scroll_bottom.min(rows).saturating_sub(1);
        self.row = self.row.saturating_add(count).min(limit);
        self.pending_wrap = false;
    }

    /// CUF: right, stopping at the right margin.
    pub fn move_right(&mut self, count: u16, cols: u16) {
        self.col = self.col.saturating_add(count).min(cols.saturating_sub(1));
        self.pending_wrap = false;
    }

    /// CUB: left, floor at column 0. Does not erase.
    pub fn move_left(&mut self, count: u16) {
        self.col = self.col.saturating_sub(count);
        self.pending_wrap = false;
    }

    /// CR: column 0.
    pub fn carriage_return(&mut self) {
        self.col = 0;
        self.pending_wrap = false;
    }

    // ── Tab stops ───────────────────────────────────────────────────

    /// Column of the next tab stop, clamped to the last column.
    #[must_use]
    pub fn next_tab_stop(&self, cols: u16) -> u16 {
        let start = (self.col as usize).saturating_add(1);
        for i in start..self.tab_stops.len().min(cols as usize) {
            if self.tab_stops[i] {
                return i as u16;
            }
        }
        cols.saturating_sub(1)
    }

    /// Column of the previous tab stop, floor at 0.
    #[must_use]
    pub fn prev_tab_stop(&self) -> u16 {
        for i in (0..self.col as usize).rev() {
            if self.tab_stops[i] {
                return i as u16;
            }
        }
        0
    }

    /// HTS: set a tab stop at the current column.
    pub fn set_tab_stop(&mut self) {
        if let Some(stop) = self.tab_stops.get_mut(self.col as usize) {
            *stop = true;
        }
    }

    /// TBC 0: clear the tab stop at the current column.
    pub fn clear_tab_stop(&mut self) {
        if let Some(stop) = self.tab_stops.get_mut(self.col as usize) {
            *stop = false;
        }
    }

    /// TBC 3: clear all tab stops.
    pub fn clear_all_tab_stops(&mut self) {
        for stop in &mut self.tab_stops {
            *stop = false;
        }
    }

    // ── Charsets ────────────────────────────────────────────────────

    /// The charset designator in effect for the next printed character.
    #[must_use]
    pub fn effective_charset(&self) -> u8 {
        self.charset_slots[self.active_charset as usize & 3]
    }

    /// Designate a charset for a G-slot (`ESC ( B`, `ESC ( 0`, ...).
    pub fn designate_charset(&mut self, slot: u8, charset: u8) {
        self.charset_slots[(slot as usize).min(3)] = charset;
    }

    /// Reset charset state to ASCII in all slots.
    pub fn reset_charset(&mut self) {
        self.charset_slots = [b'B'; 4];
        self.active_charset = 0;
    }

    // ── Resize ──────────────────────────────────────────────────────

    /// Adjust cursor state after a grid resize: margins reset to full
    /// height, position clamped, tab stops preserved in the surviving range
    /// with defaults on new columns.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        let old_cols = self.tab_stops.len();
        self.scroll_top = 0;
        self.scroll_bottom = rows;
        self.clamp(cols, rows);
        self.tab_stops.resize(cols as usize, false);
        for i in (0..cols).step_by(DEFAULT_TAB_INTERVAL as usize) {
            if (i as usize) >= old_cols {
                self.tab_stops[i as usize] = true;
            }
        }
    }
}

fn default_tab_stops(cols: u16) -> Vec<bool> {
    let mut stops = vec![false; cols as usize];
    for i in (0..cols).step_by(DEFAULT_TAB_INTERVAL as usize) {
        stops[i as usize] = true;
    }
    stops
}

/// Saved cursor state for DECSC / DECRC (`ESC 7` / `ESC 8`, CSI `s`/`u`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SavedCursor {
    pub row: u16,
    pub col: u16,
    pub pen: Pen,
    pub pending_wrap: bool,
    pub charset_slots: [u8; 4],
    pub active_charset: u8,
}

impl SavedCursor {
    /// Capture the current cursor state.
    #[must_use]
    pub fn save(cursor: &Cursor) -> Self {
        Self {
            row: cursor.row,
            col: cursor.col,
            pen: cursor.pen,
            pending_wrap: cursor.pending_wrap,
            charset_slots: cursor.charset_slots,
            active_charset: cursor.active_charset,
        }
    }

    /// Restore into the cursor, clamping to the current grid bounds.
    pub fn restore(&self, cursor: &mut Cursor, cols: u16, rows: u16) {
        cursor.row = self.row.min(rows.saturating_sub(1));
        cursor.col = self.col.min(cols.saturating_sub(1));
        cursor.pen = self.pen;
        cursor.pending_wrap = self.pending_wrap;
        cursor.charset_slots = self.charset_slots;
        cursor.active_charset = self.active_charset;
    }
}

// ── Character set translation ─────────────────────────────────────────

/// DEC Special Graphics substitution (`ESC ( 0`): maps 0x60-0x7E to
/// line-drawing and symbol characters. Everything else passes through.
fn dec_graphics_char(ch: char) -> char {
    match ch {
        '`' => '\u{25C6}', // ◆
        'a' => '\u{2592}', // ▒
        'f' => '\u{00B0}', // °
        'g' => '\u{00B1}', // ±
        'j' => '\u{2518}', // ┘
        'k' => '\u{2510}', // ┐
        'l' => '\u{250C}', // ┌
        'm' => '\u{2514}', // └
        'n' => '\u{253C}', // ┼
        'o' => '\u{23BA}', // ⎺
        'p' => '\u{23BB}', // ⎻
        'q' => '\u{2500}', // ─
        'r' => '\u{23BC}', // ⎼
        's' => '\u{23BD}', // ⎽
        't' => '\u{251C}', // ├
        'u' => '\u{2524}', // ┤
        'v' => '\u{2534}', // ┴
        'w' => '\u{252C}', // ┬
        'x' => '\u{2502}', // │
        'y' => '\u{2264}', // ≤
        'z' => '\u{2265}', // ≥
        '{' => '\u{03C0}', // π
        '|' => '\u{2260}', // ≠
        '}' => '\u{00A3}', // £
        '~' => '\u{00B7}', // ·
        _ => ch,
    }
}

/// Translate a character through a charset designator.
#[must_use]
pub fn translate_charset(ch: char, designator: u8) -> char {
    match designator {
        b'0' => dec_graphics_char(ch),
        _ => ch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellAttrs;

    #[test]
    fn new_cursor_at_origin_full_region() {
        let c = Cursor::new(80, 24);
        assert_eq!((c.row, c.col), (0, 0));
        assert_eq!(c.scroll_top(), 0);
        assert_eq!(c.scroll_bottom(), 24);
        assert!(c.visible);
        assert!(c.full_height_region(24));
    }

    #[test]
    fn invalid_scroll_region_is_ignored() {
        let mut c = Cursor::new(80, 24);
        c.set_scroll_region(20, 5, 24);
        assert_eq!(c.scroll_top(), 0);
        c.set_scroll_region(0, 30, 24);
        assert_eq!(c.scroll_bottom(), 24);
    }

    #[test]
    fn movement_respects_margins() {
        let mut c = Cursor::new(80, 24);
        c.set_scroll_region(5, 20, 24);
        c.row = 7;
        c.move_up(10);
        assert_eq!(c.row, 5);
        c.move_down(100, 24);
        assert_eq!(c.row, 19);
    }

    #[test]
    fn backspace_floors_at_zero() {
        let mut c = Cursor::new(80, 24);
        c.col = 2;
        c.move_left(5);
        assert_eq!(c.col, 0);
    }

    #[test]
    fn default_tab_stops_every_8() {
        let c = Cursor::new(80, 24);
        assert_eq!(c.next_tab_stop(80), 8);
        let mut c2 = c.clone();
        c2.col = 8;
        assert_eq!(c2.next_tab_stop(80), 16);
        c2.col = 79;
        assert_eq!(c2.next_tab_stop(80), 79);
    }

    #[test]
    fn tab_stop_set_and_clear() {
        let mut c = Cursor::new(80, 24);
        c.col = 5;
        c.set_tab_stop();
        c.col = 0;
        assert_eq!(c.next_tab_stop(80), 5);
        c.col = 5;
        c.clear_tab_stop();
        c.col = 0;
        assert_eq!(c.next_tab_stop(80), 8);
        c.clear_all_tab_stops();
        assert_eq!(c.next_tab_stop(80), 79);
    }

    #[test]
    fn prev_tab_stop_floors_at_zero() {
        let mut c = Cursor::new(80, 24);
        c.col = 10;
        assert_eq!(c.prev_tab_stop(), 8);
        c.col = 3;
        assert_eq!(c.prev_tab_stop(), 0);
    }

    #[test]
    fn save_restore_roundtrip() {
        let mut c = Cursor::new(80, 24);
        c.row = 5;
        c.col = 10;
        c.pen.flags = CellAttrs::BOLD;
        c.pending_wrap = true;
        let saved = SavedCursor::save(&c);

        let mut fresh = Cursor::new(80, 24);
        saved.restore(&mut fresh, 80, 24);
        assert_eq!((fresh.row, fresh.col), (5, 10));
        assert_eq!(fresh.pen.flags, CellAttrs::BOLD);
        assert!(fresh.pending_wrap);
    }

    #[test]
    fn restore_clamps_to_smaller_grid() {
        let mut c = Cursor::new(80, 24);
        c.row = 20;
        c.col = 70;
        let saved = SavedCursor::save(&c);
        let mut fresh = Cursor::new(40, 10);
        saved.restore(&mut fresh, 40, 10);
        assert_eq!((fresh.row, fresh.col), (9, 39));
    }

    #[test]
    fn resize_preserves_tab_stops_and_extends_defaults() {
        let mut c = Cursor::new(80, 24);
        c.col = 8;
        c.clear_tab_stop();
        c.resize(120, 24);
        c.col = 0;
        assert_eq!(c.next_tab_stop(120), 16, "cleared stop stays cleared");
        c.col = 79;
        assert_eq!(c.next_tab_stop(120), 80, "new columns get default stops");
    }

    #[test]
    fn dec_graphics_translation() {
        assert_eq!(translate_charset('q', b'0'), '─');
        assert_eq!(translate_charset('x', b'0'), '│');
        assert_eq!(translate_charset('q', b'B'), 'q');
        assert_eq!(translate_charset('A', b'0'), 'A');
    }
}
