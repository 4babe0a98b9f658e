//! VT/xterm escape-sequence parser.
//!
//! A byte-driven, resumable state machine: every input byte is classified
//! exactly once, incomplete sequences persist across [`Parser::feed`] calls,
//! and feeding a stream byte-by-byte produces the same action sequence as
//! feeding it whole. Invalid UTF-8 is coerced to U+FFFD; CAN/SUB abort the
//! current sequence; malformed CSI bodies are consumed and dropped.
//!
//! The parser is pure: it emits semantic [`Action`]s and never touches the
//! screen. The only allocation on the hot path is the OSC/DCS string
//! buffer, which is capped at [`STRING_CAP`]; an overflowing string command
//! is consumed to its terminator and then discarded.

use crate::cell::Rgba;

/// Soft cap for OSC/DCS string payloads (bytes).
pub const STRING_CAP: usize = 4096;

/// Maximum number of numeric CSI parameters retained.
const MAX_PARAMS: usize = 16;

/// Erase-in-display regions (CSI J).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseMode {
    ToEnd,
    ToBegin,
    All,
    ScrollbackOnly,
}

/// Erase-in-line regions (CSI K).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEraseMode {
    ToEnd,
    ToBegin,
    All,
}

/// Dynamic color targets settable via OSC 10/11/12.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicColor {
    Foreground,
    Background,
    Cursor,
}

/// Semantic operations emitted by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Print one Unicode scalar at the cursor.
    Print(char),
    Bell,
    Backspace,
    Tab,
    LineFeed,
    CarriageReturn,

    /// DECSC (`ESC 7`, CSI `s`).
    SaveCursor,
    /// DECRC (`ESC 8`, CSI `u`).
    RestoreCursor,
    /// IND (`ESC D`).
    Index,
    /// RI (`ESC M`).
    ReverseIndex,
    /// NEL (`ESC E`).
    NextLine,
    /// RIS (`ESC c`).
    FullReset,
    /// `ESC ( B`, `ESC ( 0`, and the G1-G3 variants.
    DesignateCharset { slot: u8, charset: u8 },
    /// HTS (`ESC H`).
    SetTabStop,
    /// DECALN (`ESC # 8`).
    ScreenAlignment,

    CursorUp(u16),
    CursorDown(u16),
    CursorRight(u16),
    CursorLeft(u16),
    CursorNextLine(u16),
    CursorPrevLine(u16),
    /// CHA: absolute column (0-indexed).
    CursorColumn(u16),
    /// VPA: absolute row (0-indexed).
    CursorRow(u16),
    /// CUP/HVP: absolute position (0-indexed).
    CursorPosition { row: u16, col: u16 },
    EraseInDisplay(EraseMode),
    EraseInLine(LineEraseMode),
    ScrollUp(u16),
    ScrollDown(u16),
    InsertLines(u16),
    DeleteLines(u16),
    InsertChars(u16),
    DeleteChars(u16),
    EraseChars(u16),
    /// CBT (CSI Z).
    BackTab(u16),
    /// REP (CSI b): repeat the last printed character.
    RepeatChar(u16),
    /// TBC (CSI g): 0 = current column, 3 = all.
    ClearTabStops(u16),
    /// DECSTBM. `top` is 0-indexed inclusive; `bottom` is 0-indexed
    /// exclusive, with 0 meaning "full height" (the parser does not know
    /// the grid size).
    SetScrollRegion { top: u16, bottom: u16 },
    /// SGR with a flattened parameter list (colon sub-parameters arrive
    /// identical to semicolon-separated ones).
    Sgr(Vec<u16>),
    /// SM / DECSET.
    SetMode { private: bool, modes: Vec<u16> },
    /// RM / DECRST.
    ResetMode { private: bool, modes: Vec<u16> },
    /// DA1 (CSI c).
    DeviceAttributes,
    /// DSR 5 (CSI 5 n).
    DeviceStatusReport,
    /// DSR 6 (CSI 6 n).
    CursorPositionReport,

    /// OSC 0/2.
    SetTitle(String),
    /// OSC 8 with a non-empty URI.
    HyperlinkStart(String),
    /// OSC 8 with an empty URI.
    HyperlinkEnd,
    /// OSC 4.
    SetPaletteColor { index: u8, color: Rgba },
    /// OSC 10/11/12.
    SetDynamicColor { target: DynamicColor, color: Rgba },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ground,
    Escape,
    /// `ESC (` and friends: one designator byte follows.
    EscapeIntermediate,
    CsiEntry,
    CsiParam,
    CsiIntermediate,
    OscString,
    /// DCS / SOS / PM / APC: consumed up to ST and discarded.
    DcsPassthrough,
    /// Accumulating a UTF-8 sequence; the payload is continuation bytes
    /// still expected.
    Utf8Continuation(u8),
}

/// Resumable escape-sequence parser.
#[derive(Debug, Clone)]
pub struct Parser {
    state: State,
    params: Vec<u16>,
    cur_param: Option<u16>,
    intermediates: Vec<u8>,
    private_marker: Option<u8>,
    malformed: bool,
    esc_intermediate: u8,
    string_buf: Vec<u8>,
    string_truncated: bool,
    string_esc_pending: bool,
    utf8_buf: [u8; 4],
    utf8_len: u8,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    /// Create a parser in ground state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: State::Ground,
            params: Vec::with_capacity(MAX_PARAMS),
            cur_param: None,
            intermediates: Vec::with_capacity(2),
            private_marker: None,
            malformed: false,
            esc_intermediate: 0,
            string_buf: Vec::new(),
            string_truncated: false,
            string_esc_pending: false,
            utf8_buf: [0; 4],
            utf8_len: 0,
        }
    }

    /// Feed a chunk of bytes, returning the parsed actions.
    ///
    /// Incomplete trailing sequences are retained; the next call resumes
    /// where this one stopped.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Action> {
        let mut out = Vec::new();
        for &b in bytes {
            self.step(b, &mut out);
        }
        out
    }

    fn step(&mut self, b: u8, out: &mut Vec<Action>) {
        match self.state {
            State::Ground => self.ground(b, out),
            State::Escape => self.escape(b, out),
            State::EscapeIntermediate => self.escape_intermediate(b, out),
            State::CsiEntry => self.csi_entry(b, out),
            State::CsiParam => self.csi_param(b, out),
            State::CsiIntermediate => self.csi_intermediate(b, out),
            State::OscString => self.osc_string(b, out),
            State::DcsPassthrough => self.dcs_passthrough(b, out),
            State::Utf8Continuation(remaining) => self.utf8_continuation(b, remaining, out),
        }
    }

    // ── Ground ──────────────────────────────────────────────────────

    fn ground(&mut self, b: u8, out: &mut Vec<Action>) {
        match b {
            0x07 => out.push(Action::Bell),
            0x08 => out.push(Action::Backspace),
            0x09 => out.push(Action::Tab),
            0x0A | 0x0B | 0x0C => out.push(Action::LineFeed),
            0x0D => out.push(Action::CarriageReturn),
            0x1B => self.enter_escape(),
            0x00..=0x1F | 0x7F => {} // SO/SI, NUL, DEL, remaining C0: ignored
            0x20..=0x7E => out.push(Action::Print(b as char)),
            0xC2..=0xDF => self.start_utf8(b, 1),
            0xE0..=0xEF => self.start_utf8(b, 2),
            0xF0..=0xF4 => self.start_utf8(b, 3),
            _ => out.push(Action::Print('\u{FFFD}')),
        }
    }

    fn start_utf8(&mut self, b: u8, continuations: u8) {
        self.utf8_buf[0] = b;
        self.utf8_len = 1;
        self.state = State::Utf8Continuation(continuations);
    }

    fn utf8_continuation(&mut self, b: u8, remaining: u8, out: &mut Vec<Action>) {
        if (0x80..=0xBF).contains(&b) {
            self.utf8_buf[self.utf8_len as usize] = b;
            self.utf8_len += 1;
            if remaining == 1 {
                let bytes = &self.utf8_buf[..self.utf8_len as usize];
                let ch = std::str::from_utf8(bytes)
                    .ok()
                    .and_then(|s| s.chars().next())
                    .unwrap_or('\u{FFFD}');
                self.state = State::Ground;
                // Decoded C1 controls (U+0080-U+009F) are not printable.
                if !('\u{80}'..='\u{9F}').contains(&ch) {
                    out.push(Action::Print(ch));
                }
            } else {
                self.state = State::Utf8Continuation(remaining - 1);
            }
        } else {
            // Truncated sequence: emit a replacement and reclassify this
            // byte from ground state.
            out.push(Action::Print('\u{FFFD}'));
            self.state = State::Ground;
            self.step(b, out);
        }
    }

    // ── Escape ──────────────────────────────────────────────────────

    fn enter_escape(&mut self) {
        self.state = State::Escape;
        self.params.clear();
        self.cur_param = None;
        self.intermediates.clear();
        self.private_marker = None;
        self.malformed = false;
        self.string_buf.clear();
        self.string_truncated = false;
        self.string_esc_pending = false;
    }

    fn escape(&mut self, b: u8, out: &mut Vec<Action>) {
        match b {
            0x18 | 0x1A => self.state = State::Ground,
            0x1B => self.enter_escape(),
            b'[' => self.state = State::CsiEntry,
            b']' => self.state = State::OscString,
            b'P' | b'X' | b'^' | b'_' => self.state = State::DcsPassthrough,
            b'(' | b')' | b'*' | b'+' | b'#' => {
                self.esc_intermediate = b;
                self.state = State::EscapeIntermediate;
            }
            _ => {
                self.state = State::Ground;
                match b {
                    b'7' => out.push(Action::SaveCursor),
                    b'8' => out.push(Action::RestoreCursor),
                    b'D' => out.push(Action::Index),
                    b'M' => out.push(Action::ReverseIndex),
                    b'E' => out.push(Action::NextLine),
                    b'c' => out.push(Action::FullReset),
                    b'H' => out.push(Action::SetTabStop),
                    // DECKPAM/DECKPNM, stray ST, and everything else: consumed.
                    _ => {}
                }
            }
        }
    }

    fn escape_intermediate(&mut self, b: u8, out: &mut Vec<Action>) {
        match b {
            0x18 | 0x1A => self.state = State::Ground,
            0x1B => self.enter_escape(),
            _ => {
                self.state = State::Ground;
                match self.esc_intermediate {
                    b'#' => {
                        if b == b'8' {
                            out.push(Action::ScreenAlignment);
                        }
                    }
                    b'(' | b')' | b'*' | b'+' => {
                        let slot = match self.esc_intermediate {
                            b'(' => 0,
                            b')' => 1,
                            b'*' => 2,
                            _ => 3,
                        };
                        out.push(Action::DesignateCharset { slot, charset: b });
                    }
                    _ => {}
                }
            }
        }
    }

    // ── CSI ─────────────────────────────────────────────────────────

    fn csi_entry(&mut self, b: u8, out: &mut Vec<Action>) {
        match b {
            0x3C..=0x3F => {
                self.private_marker = Some(b);
                self.state = State::CsiParam;
            }
            _ => {
                // A private marker is only valid as the first body byte.
                self.state = State::CsiParam;
                self.csi_param(b, out);
            }
        }
    }

    fn csi_param(&mut self, b: u8, out: &mut Vec<Action>) {
        match b {
            b'0'..=b'9' => {
                let digit = u16::from(b - b'0');
                let cur = self.cur_param.unwrap_or(0);
                self.cur_param = Some(cur.saturating_mul(10).saturating_add(digit));
            }
            b';' | b':' => self.end_param(),
            0x20..=0x2F => {
                self.end_param();
                self.push_intermediate(b);
                self.state = State::CsiIntermediate;
            }
            0x3C..=0x3F => self.malformed = true,
            0x40..=0x7E => {
                self.end_param();
                self.dispatch_csi(b, out);
                self.state = State::Ground;
            }
            0x18 | 0x1A => self.state = State::Ground,
            0x1B => self.enter_escape(),
            // C0 controls execute without aborting the sequence.
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => self.execute_c0(b, out),
            // DEL and 8-bit bytes inside a CSI body: consumed, sequence
            // marked malformed so it cannot dispatch half-parsed.
            0x7F => {}
            0x80..=0xFF => self.malformed = true,
        }
    }

    fn csi_intermediate(&mut self, b: u8, out: &mut Vec<Action>) {
        match b {
            0x20..=0x2F => self.push_intermediate(b),
            0x30..=0x3F => self.malformed = true,
            0x40..=0x7E => {
                self.dispatch_csi(b, out);
                self.state = State::Ground;
            }
            0x18 | 0x1A => self.state = State::Ground,
            0x1B => self.enter_escape(),
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => self.execute_c0(b, out),
            0x7F => {}
            0x80..=0xFF => self.malformed = true,
        }
    }

    fn execute_c0(&mut self, b: u8, out: &mut Vec<Action>) {
        match b {
            0x07 => out.push(Action::Bell),
            0x08 => out.push(Action::Backspace),
            0x09 => out.push(Action::Tab),
            0x0A | 0x0B | 0x0C => out.push(Action::LineFeed),
            0x0D => out.push(Action::CarriageReturn),
            _ => {}
        }
    }

    fn end_param(&mut self) {
        // An omitted parameter is recorded as the 0 sentinel; dispatch
        // resolves per-sequence defaults.
        let value = self.cur_param.take().unwrap_or(0);
        if self.params.len() < MAX_PARAMS {
            self.params.push(value);
        }
    }

    fn push_intermediate(&mut self, b: u8) {
        if self.intermediates.len() < 2 {
            self.intermediates.push(b);
        } else {
            self.malformed = true;
        }
    }

    fn param(&self, index: usize, default: u16) -> u16 {
        match self.params.get(index) {
            Some(&0) | None => default,
            Some(&v) => v,
        }
    }

    /// Count parameter with the usual "0 or omitted means 1" rule.
    fn count(&self) -> u16 {
        self.param(0, 1).max(1)
    }

    fn dispatch_csi(&mut self, final_byte: u8, out: &mut Vec<Action>) {
        if self.malformed || !self.intermediates.is_empty() {
            return;
        }
        let private = self.private_marker == Some(b'?');
        if self.private_marker.is_some() && !private {
            // `>`/`=`/`<` prefixed sequences (DA2 etc.): consumed, no reply.
            return;
        }

        let action = match final_byte {
            b'A' => Some(Action::CursorUp(self.count())),
            b'B' => Some(Action::CursorDown(self.count())),
            b'C' => Some(Action::CursorRight(self.count())),
            b'D' => Some(Action::CursorLeft(self.count())),
            b'E' => Some(Action::CursorNextLine(self.count())),
            b'F' => Some(Action::CursorPrevLine(self.count())),
            b'G' => Some(Action::CursorColumn(self.param(0, 1).max(1) - 1)),
            b'd' => Some(Action::CursorRow(self.param(0, 1).max(1) - 1)),
            b'H' | b'f' => Some(Action::CursorPosition {
                row: self.param(0, 1).max(1) - 1,
                col: self.param(1, 1).max(1) - 1,
            }),
            b'J' if !private => match self.params.first().copied().unwrap_or(0) {
                0 => Some(Action::EraseInDisplay(EraseMode::ToEnd)),
                1 => Some(Action::EraseInDisplay(EraseMode::ToBegin)),
                2 => Some(Action::EraseInDisplay(EraseMode::All)),
                3 => Some(Action::EraseInDisplay(EraseMode::ScrollbackOnly)),
                _ => None,
            },
            b'K' if !private => match self.params.first().copied().unwrap_or(0) {
                0 => Some(Action::EraseInLine(LineEraseMode::ToEnd)),
                1 => Some(Action::EraseInLine(LineEraseMode::ToBegin)),
                2 => Some(Action::EraseInLine(LineEraseMode::All)),
                _ => None,
            },
            b'S' => Some(Action::ScrollUp(self.count())),
            b'T' => Some(Action::ScrollDown(self.count())),
            b'L' => Some(Action::InsertLines(self.count())),
            b'M' => Some(Action::DeleteLines(self.count())),
            b'@' => Some(Action::InsertChars(self.count())),
            b'P' => Some(Action::DeleteChars(self.count())),
            b'X' => Some(Action::EraseChars(self.count())),
            b'Z' => Some(Action::BackTab(self.count())),
            b'b' => Some(Action::RepeatChar(self.count())),
            b'g' => Some(Action::ClearTabStops(
                self.params.first().copied().unwrap_or(0),
            )),
            b'h' => Some(Action::SetMode {
                private,
                modes: self.mode_params(),
            }),
            b'l' => Some(Action::ResetMode {
                private,
                modes: self.mode_params(),
            }),
            b'm' if !private => Some(Action::Sgr(std::mem::take(&mut self.params))),
            b's' if !private => Some(Action::SaveCursor),
            b'u' if !private => Some(Action::RestoreCursor),
            b'c' if !private => match self.params.first().copied().unwrap_or(0) {
                0 => Some(Action::DeviceAttributes),
                _ => None,
            },
            b'n' if !private => match self.params.first().copied().unwrap_or(0) {
                5 => Some(Action::DeviceStatusReport),
                6 => Some(Action::CursorPositionReport),
                _ => None,
            },
            b'r' if !private => Some(Action::SetScrollRegion {
                top: self.param(0, 1).max(1) - 1,
                bottom: self.params.get(1).copied().unwrap_or(0),
            }),
            // Window manipulation (CSI t) and everything unrecognized:
            // consumed without effect.
            _ => None,
        };
        if let Some(action) = action {
            out.push(action);
        }
    }

    fn mode_params(&self) -> Vec<u16> {
        if self.params.is_empty() {
            Vec::new()
        } else {
            self.params.clone()
        }
    }

    // ── OSC / DCS ───────────────────────────────────────────────────

    fn osc_string(&mut self, b: u8, out: &mut Vec<Action>) {
        if self.string_esc_pending {
            self.string_esc_pending = false;
            if b == b'\\' {
                self.dispatch_osc(out);
                self.state = State::Ground;
            } else {
                // ESC not followed by ST aborts the string and begins a new
                // escape sequence with this byte.
                self.enter_escape();
                self.step(b, out);
            }
            return;
        }
        match b {
            0x07 => {
                self.dispatch_osc(out);
                self.state = State::Ground;
            }
            0x1B => self.string_esc_pending = true,
            0x18 | 0x1A => self.state = State::Ground,
            _ => {
                if self.string_buf.len() < STRING_CAP {
                    self.string_buf.push(b);
                } else {
                    self.string_truncated = true;
                }
            }
        }
    }

    fn dcs_passthrough(&mut self, b: u8, out: &mut Vec<Action>) {
        if self.string_esc_pending {
            self.string_esc_pending = false;
            if b == b'\\' {
                self.state = State::Ground;
            } else {
                self.enter_escape();
                self.step(b, out);
            }
            return;
        }
        match b {
            0x1B => self.string_esc_pending = true,
            0x18 | 0x1A => self.state = State::Ground,
            _ => {} // device-control payloads are discarded
        }
    }

    fn dispatch_osc(&mut self, out: &mut Vec<Action>) {
        if self.string_truncated {
            // Overflowed payloads are dropped whole rather than applied
            // half-formed.
            return;
        }
        let buf = std::mem::take(&mut self.string_buf);
        let Ok(text) = std::str::from_utf8(&buf) else {
            return;
        };
        let (code, rest) = match text.split_once(';') {
            Some((code, rest)) => (code, rest),
            None => (text, ""),
        };
        match code {
            "0" | "2" => out.push(Action::SetTitle(rest.to_string())),
            "8" => {
                // `8;params;uri` — params (id=...) are not interpreted.
                let uri = rest.split_once(';').map(|(_, uri)| uri).unwrap_or("");
                if uri.is_empty() {
                    out.push(Action::HyperlinkEnd);
                } else {
                    out.push(Action::HyperlinkStart(uri.to_string()));
                }
            }
            "4" => {
                let mut parts = rest.split(';');
                while let (Some(index), Some(spec)) = (parts.next(), parts.next()) {
                    let Ok(index) = index.parse::<u16>() else {
                        break;
                    };
                    if index > 255 {
                        continue;
                    }
                    if let Some(color) = parse_color_spec(spec) {
                        out.push(Action::SetPaletteColor {
                            index: index as u8,
                            color,
                        });
                    }
                }
            }
            "10" | "11" | "12" => {
                let target = match code {
                    "10" => DynamicColor::Foreground,
                    "11" => DynamicColor::Background,
                    _ => DynamicColor::Cursor,
                };
                if let Some(color) = parse_color_spec(rest) {
                    out.push(Action::SetDynamicColor { target, color });
                }
            }
            // OSC 52 (clipboard) and unknown codes: consumed and ignored.
            _ => {}
        }
    }
}

/// Parse an X11-style color specification: `#RRGGBB` or
/// `rgb:RR/GG/BB` (1-4 hex digits per component). Queries (`?`) and
/// unrecognized forms yield `None`.
fn parse_color_spec(spec: &str) -> Option<Rgba> {
    if let Some(hex) = spec.strip_prefix('#') {
        if hex.len() == 6 {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            return Some(Rgba::new(r, g, b));
        }
        return None;
    }
    let body = spec.strip_prefix("rgb:")?;
    let mut parts = body.split('/');
    let r = scale_component(parts.next()?)?;
    let g = scale_component(parts.next()?)?;
    let b = scale_component(parts.next()?)?;
    if parts.next().is_some() {
        return None;
    }
    Some(Rgba::new(r, g, b))
}

/// Scale a 1-4 digit hex component to 8 bits.
fn scale_component(digits: &str) -> Option<u8> {
    if digits.is_empty() || digits.len() > 4 {
        return None;
    }
    let value = u32::from_str_radix(digits, 16).ok()?;
    let max = (1u32 << (4 * digits.len() as u32)) - 1;
    Some(((value * 255 + max / 2) / max) as u8)
}
