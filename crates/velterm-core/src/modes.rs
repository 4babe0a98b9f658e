//! Terminal modes (ANSI + DEC private).
//!
//! Pure state with small helpers so the parser/terminal layer can toggle
//! modes deterministically by number.

use bitflags::bitflags;

bitflags! {
    /// DEC private mode flags (DECSET/DECRST, `CSI ? Pm h` / `CSI ? Pm l`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DecModes: u32 {
        /// DECCKM (mode 1): application cursor keys.
        const APPLICATION_CURSOR = 1 << 0;
        /// DECOM (mode 6): cursor addressing relative to the scroll region.
        const ORIGIN = 1 << 1;
        /// DECAWM (mode 7): auto-wrap at the right margin.
        const AUTOWRAP = 1 << 2;
        /// DECTCEM (mode 25): cursor visible.
        const CURSOR_VISIBLE = 1 << 3;
        /// Mode 47: alternate screen (plain swap, no cursor save, no clear).
        const ALT_SCREEN_47 = 1 << 4;
        /// Mode 1000: mouse button tracking.
        const MOUSE_BUTTON = 1 << 5;
        /// Mode 1002: mouse cell-motion tracking.
        const MOUSE_CELL_MOTION = 1 << 6;
        /// Mode 1006: SGR extended mouse coordinates.
        const MOUSE_SGR = 1 << 7;
        /// Mode 1047: alternate screen (swap only).
        const ALT_SCREEN_1047 = 1 << 8;
        /// Mode 1049: alternate screen with cursor save/restore.
        const ALT_SCREEN_1049 = 1 << 9;
        /// Mode 2004: bracketed paste.
        const BRACKETED_PASTE = 1 << 10;
    }
}

bitflags! {
    /// ANSI standard mode flags (SM/RM, `CSI Pm h` / `CSI Pm l`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AnsiModes: u8 {
        /// IRM (mode 4): insert/replace mode.
        const INSERT = 1 << 0;
        /// LNM (mode 20): linefeed/newline mode.
        const LINEFEED_NEWLINE = 1 << 1;
    }
}

/// Combined mode state for one screen buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modes {
    pub dec: DecModes,
    pub ansi: AnsiModes,
}

impl Modes {
    /// Power-on defaults: DECAWM and DECTCEM on, everything else off.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dec: DecModes::AUTOWRAP | DecModes::CURSOR_VISIBLE,
            ansi: AnsiModes::empty(),
        }
    }

    /// Reset all modes to power-on defaults.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    #[must_use]
    pub fn origin_mode(&self) -> bool {
        self.dec.contains(DecModes::ORIGIN)
    }

    #[must_use]
    pub fn autowrap(&self) -> bool {
        self.dec.contains(DecModes::AUTOWRAP)
    }

    #[must_use]
    pub fn cursor_visible(&self) -> bool {
        self.dec.contains(DecModes::CURSOR_VISIBLE)
    }

    #[must_use]
    pub fn application_cursor_keys(&self) -> bool {
        self.dec.contains(DecModes::APPLICATION_CURSOR)
    }

    #[must_use]
    pub fn insert_mode(&self) -> bool {
        self.ansi.contains(AnsiModes::INSERT)
    }

    /// Whether any alternate-screen mode variant is active.
    #[must_use]
    pub fn alt_screen(&self) -> bool {
        self.dec.intersects(
            DecModes::ALT_SCREEN_47 | DecModes::ALT_SCREEN_1047 | DecModes::ALT_SCREEN_1049,
        )
    }

    #[must_use]
    pub fn bracketed_paste(&self) -> bool {
        self.dec.contains(DecModes::BRACKETED_PASTE)
    }

    /// Set a DEC private mode by number. Returns `true` if recognized.
    pub fn set_dec_mode(&mut self, mode: u16, enabled: bool) -> bool {
        let Some(flag) = Self::dec_flag_for_mode(mode) else {
            return false;
        };
        self.dec.set(flag, enabled);
        true
    }

    /// Set an ANSI standard mode by number. Returns `true` if recognized.
    pub fn set_ansi_mode(&mut self, mode: u16, enabled: bool) -> bool {
        let Some(flag) = Self::ansi_flag_for_mode(mode) else {
            return false;
        };
        self.ansi.set(flag, enabled);
        true
    }

    fn dec_flag_for_mode(mode: u16) -> Option<DecModes> {
        let flag = match mode {
            1 => DecModes::APPLICATION_CURSOR,
            6 => DecModes::ORIGIN,
            7 => DecModes::AUTOWRAP,
            25 => DecModes::CURSOR_VISIBLE,
            47 => DecModes::ALT_SCREEN_47,
            1000 => DecModes::MOUSE_BUTTON,
            1002 => DecModes::MOUSE_CELL_MOTION,
            1006 => DecModes::MOUSE_SGR,
            1047 => DecModes::ALT_SCREEN_1047,
            1049 => DecModes::ALT_SCREEN_1049,
            2004 => DecModes::BRACKETED_PASTE,
            _ => return None,
        };
        Some(flag)
    }

    fn ansi_flag_for_mode(mode: u16) -> Option<AnsiModes> {
        let flag = match mode {
            4 => AnsiModes::INSERT,
            20 => AnsiModes::LINEFEED_NEWLINE,
            _ => return None,
        };
        Some(flag)
    }
}
