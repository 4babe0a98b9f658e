#![forbid(unsafe_code)]

//! Terminal core: the systems backbone that turns raw pseudo-console byte
//! streams into a coherent, scrollable, selectable screen model.
//!
//! The crate is organized leaves-first:
//!
//! - [`cell`] — the per-cell value objects (character, colors, attributes)
//! - [`cursor`] — cursor position, scroll region, tab stops, charsets
//! - [`modes`] — ANSI + DEC private mode state
//! - [`scrollback`] — the ring of lines above the live viewport
//! - [`palette`] — concrete color resolution (16/256/truecolor)
//! - [`parser`] — the resumable VT/xterm escape-sequence state machine
//! - [`screen`] — the grid + scrollback screen-buffer data model
//! - [`selection`] — text selection in scrollback-absolute coordinates
//! - [`pty`] — the narrow pseudo-terminal abstraction and its host impl
//! - [`terminal`] — binds a PTY to a screen buffer via the parser
//! - [`input`] — semantic key → PTY byte-sequence encoding
//!
//! The renderer, window shell, clipboard, and configuration file parsing are
//! external collaborators; nothing in this crate touches GPU or windowing
//! types.

pub mod cell;
pub mod cursor;
pub mod input;
pub mod modes;
pub mod palette;
pub mod parser;
pub mod pty;
pub mod reply;
pub mod screen;
pub mod scrollback;
pub mod selection;
pub mod terminal;
pub mod width;

pub use cell::{Cell, CellAttrs, HyperlinkId, Pen, PenColor, Rgba};
pub use cursor::{Cursor, SavedCursor};
pub use modes::{AnsiModes, DecModes, Modes};
pub use palette::Palette;
pub use parser::{Action, DynamicColor, EraseMode, LineEraseMode, Parser};
pub use pty::{Pty, PtyError, PtyProcess, PtyReader};
pub use reply::ReplyEngine;
pub use screen::{ScreenBuffer, ViewportMetrics};
pub use scrollback::{Scrollback, ScrollbackLine};
pub use selection::{Selection, SelectionMode, SelectionState};
pub use terminal::{Terminal, TerminalEvent, TerminalOptions, TerminalSink};
pub use width::WidthPolicy;
