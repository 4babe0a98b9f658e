//! Terminal query replies (DA1 / DSR / CPR).
//!
//! Encodes deterministic response bytes for the query actions the parser
//! recognizes. The terminal queues these FIFO and writes them back to the
//! PTY on the next output drain.

use crate::cursor::Cursor;
use crate::parser::Action;

/// Primary device attributes: a VT102-class terminal.
const DA1_REPLY: &[u8] = b"\x1b[?6c";

/// Deterministic reply encoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplyEngine;

impl ReplyEngine {
    /// Encode the reply for a query action, if it is one.
    #[must_use]
    pub fn reply_for_action(self, action: &Action, cursor: &Cursor) -> Option<Vec<u8>> {
        match action {
            Action::DeviceAttributes => Some(DA1_REPLY.to_vec()),
            Action::DeviceStatusReport => Some(b"\x1b[0n".to_vec()),
            Action::CursorPositionReport => Some(
                format!(
                    "\x1b[{};{}R",
                    u32::from(cursor.row) + 1,
                    u32::from(cursor.col) + 1
                )
                .into_bytes(),
            ),
            _ => None,
        }
    }
}
