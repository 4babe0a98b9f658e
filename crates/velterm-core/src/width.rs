//! Unicode character width policy.
//!
//! Terminal emulators disagree on the display width of the East Asian
//! Ambiguous category (box drawing, arrows, Greek letters). CJK locales
//! typically treat these as double-width; Western locales as single-width.
//! [`WidthPolicy`] lets the host pick the convention instead of guessing.

use unicode_width::UnicodeWidthChar;

/// Unicode character width measurement policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WidthPolicy {
    /// Standard Unicode width: East Asian Ambiguous characters are narrow.
    #[default]
    Standard,
    /// East Asian Ambiguous characters are double-width.
    CjkAmbiguousWide,
}

impl WidthPolicy {
    /// Display width of a single Unicode scalar in terminal columns.
    ///
    /// Returns 0 for non-spacing marks and format controls, 1 for narrow
    /// characters, 2 for wide ones. Widths above 2 are clamped to 2.
    #[inline]
    #[must_use]
    pub fn char_width(self, ch: char) -> u8 {
        let w = match self {
            WidthPolicy::Standard => UnicodeWidthChar::width(ch).unwrap_or(0),
            WidthPolicy::CjkAmbiguousWide => UnicodeWidthChar::width_cjk(ch).unwrap_or(0),
        };
        w.min(2) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_is_narrow() {
        for ch in ['a', 'Z', '0', '~', ' '] {
            assert_eq!(WidthPolicy::Standard.char_width(ch), 1, "{ch:?}");
            assert_eq!(WidthPolicy::CjkAmbiguousWide.char_width(ch), 1, "{ch:?}");
        }
    }

    #[test]
    fn cjk_ideographs_are_wide() {
        for ch in ['中', '国', '字'] {
            assert_eq!(WidthPolicy::Standard.char_width(ch), 2, "{ch:?}");
        }
    }

    #[test]
    fn combining_marks_are_zero_width() {
        for ch in ['\u{0300}', '\u{0301}'] {
            assert_eq!(WidthPolicy::Standard.char_width(ch), 0, "{ch:?}");
        }
    }

    #[test]
    fn ambiguous_width_depends_on_policy() {
        for ch in ['─', '→', '°'] {
            assert_eq!(WidthPolicy::Standard.char_width(ch), 1, "{ch:?}");
            assert_eq!(WidthPolicy::CjkAmbiguousWide.char_width(ch), 2, "{ch:?}");
        }
    }

    #[test]
    fn emoji_is_wide() {
        assert_eq!(WidthPolicy::Standard.char_width('\u{1F680}'), 2);
    }
}
