//! Semantic key → PTY byte-sequence encoding.
//!
//! The host shell resolves raw keyboard events into these semantic keys;
//! the terminal encodes them into the ANSI sequences the child process
//! expects, honoring application cursor-keys mode (DECCKM).

use crate::modes::Modes;

/// Keys with non-trivial encodings. Plain printable input goes to the PTY
/// as UTF-8 text directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Right,
    Left,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    /// F1-F12.
    Function(u8),
    ShiftTab,
}

/// Encode a key for the child process. Returns `None` for function keys
/// outside F1-F12.
#[must_use]
pub fn encode_key(key: Key, modes: &Modes) -> Option<Vec<u8>> {
    let app_cursor = modes.application_cursor_keys();
    let bytes: Vec<u8> = match key {
        Key::Up => cursor_key(b'A', app_cursor),
        Key::Down => cursor_key(b'B', app_cursor),
        Key::Right => cursor_key(b'C', app_cursor),
        Key::Left => cursor_key(b'D', app_cursor),
        Key::Home => b"\x1b[H".to_vec(),
        Key::End => b"\x1b[F".to_vec(),
        Key::PageUp => b"\x1b[5~".to_vec(),
        Key::PageDown => b"\x1b[6~".to_vec(),
        Key::Insert => b"\x1b[2~".to_vec(),
        Key::Delete => b"\x1b[3~".to_vec(),
        Key::ShiftTab => b"\x1b[Z".to_vec(),
        Key::Function(n) => match n {
            1 => b"\x1bOP".to_vec(),
            2 => b"\x1bOQ".to_vec(),
            3 => b"\x1bOR".to_vec(),
            4 => b"\x1bOS".to_vec(),
            5 => b"\x1b[15~".to_vec(),
            6 => b"\x1b[17~".to_vec(),
            7 => b"\x1b[18~".to_vec(),
            8 => b"\x1b[19~".to_vec(),
            9 => b"\x1b[20~".to_vec(),
            10 => b"\x1b[21~".to_vec(),
            11 => b"\x1b[23~".to_vec(),
            12 => b"\x1b[24~".to_vec(),
            _ => return None,
        },
    };
    Some(bytes)
}

fn cursor_key(final_byte: u8, application: bool) -> Vec<u8> {
    if application {
        vec![0x1b, b'O', final_byte]
    } else {
        vec![0x1b, b'[', final_byte]
    }
}

/// Wrap pasted text in bracketed-paste markers when mode 2004 is set.
#[must_use]
pub fn encode_paste(text: &str, modes: &Modes) -> Vec<u8> {
    if modes.bracketed_paste() {
        let mut out = Vec::with_capacity(text.len() + 12);
        out.extend_from_slice(b"\x1b[200~");
        out.extend_from_slice(text.as_bytes());
        out.extend_from_slice(b"\x1b[201~");
        out
    } else {
        text.as_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrows_switch_with_application_mode() {
        let mut modes = Modes::new();
        assert_eq!(encode_key(Key::Up, &modes).unwrap(), b"\x1b[A");
        modes.set_dec_mode(1, true);
        assert_eq!(encode_key(Key::Up, &modes).unwrap(), b"\x1bOA");
        assert_eq!(encode_key(Key::Left, &modes).unwrap(), b"\x1bOD");
    }

    #[test]
    fn editing_keys() {
        let modes = Modes::new();
        assert_eq!(encode_key(Key::Home, &modes).unwrap(), b"\x1b[H");
        assert_eq!(encode_key(Key::End, &modes).unwrap(), b"\x1b[F");
        assert_eq!(encode_key(Key::PageUp, &modes).unwrap(), b"\x1b[5~");
        assert_eq!(encode_key(Key::PageDown, &modes).unwrap(), b"\x1b[6~");
        assert_eq!(encode_key(Key::Insert, &modes).unwrap(), b"\x1b[2~");
        assert_eq!(encode_key(Key::Delete, &modes).unwrap(), b"\x1b[3~");
        assert_eq!(encode_key(Key::ShiftTab, &modes).unwrap(), b"\x1b[Z");
    }

    #[test]
    fn function_keys_use_standard_numbering() {
        let modes = Modes::new();
        assert_eq!(encode_key(Key::Function(1), &modes).unwrap(), b"\x1bOP");
        assert_eq!(encode_key(Key::Function(5), &modes).unwrap(), b"\x1b[15~");
        assert_eq!(encode_key(Key::Function(11), &modes).unwrap(), b"\x1b[23~");
        assert_eq!(encode_key(Key::Function(12), &modes).unwrap(), b"\x1b[24~");
        assert!(encode_key(Key::Function(13), &modes).is_none());
    }

    #[test]
    fn paste_brackets_only_when_enabled() {
        let mut modes = Modes::new();
        assert_eq!(encode_paste("hi", &modes), b"hi");
        modes.set_dec_mode(2004, true);
        assert_eq!(encode_paste("hi", &modes), b"\x1b[200~hi\x1b[201~");
    }
}
