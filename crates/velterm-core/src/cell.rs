//! Terminal cell: the fundamental unit of the grid.
//!
//! Each cell stores one Unicode scalar plus fully resolved colors and an
//! attribute bitfield. Cells are plain value objects; the screen buffer
//! resolves the current pen (which may reference palette or default colors)
//! into concrete [`Rgba`] values at write time, so the renderer never needs
//! palette access.

use bitflags::bitflags;

bitflags! {
    /// Per-cell attribute flags.
    ///
    /// The low bits map to SGR text attributes; the high bits are cell-level
    /// flags orthogonal to SGR.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CellAttrs: u16 {
        const BOLD              = 1 << 0;
        const ITALIC            = 1 << 1;
        const UNDERLINE         = 1 << 2;
        const STRIKETHROUGH     = 1 << 3;
        const INVERSE           = 1 << 4;
        /// Cell was written while an OSC 8 hyperlink was active; the link id
        /// lives in [`Cell::hyperlink`].
        const HYPERLINK         = 1 << 5;
        /// Leading (left) half of a 2-column East-Asian wide character.
        const WIDE_CHAR         = 1 << 6;
        /// Trailing (right) half of a wide character. Content is a spacer;
        /// rendering uses the leading cell.
        const WIDE_CONTINUATION = 1 << 7;
    }
}

/// 24-bit color with an 8-bit alpha channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    /// Fully opaque color.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xFF }
    }

    /// Color with explicit alpha.
    #[must_use]
    pub const fn with_alpha(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Construct from a packed `0xAARRGGBB` word (the config file encoding).
    #[must_use]
    pub const fn from_argb(argb: u32) -> Self {
        Self {
            r: ((argb >> 16) & 0xFF) as u8,
            g: ((argb >> 8) & 0xFF) as u8,
            b: (argb & 0xFF) as u8,
            a: ((argb >> 24) & 0xFF) as u8,
        }
    }
}

/// Hyperlink identifier for OSC 8 links. Zero means "no link"; non-zero
/// values index the screen buffer's per-buffer link registry.
pub type HyperlinkId = u16;

/// Pen color: what the current SGR state references, before resolution.
///
/// Default and indexed colors are resolved against the palette when a cell
/// is written, so later palette changes do not rewrite existing cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PenColor {
    /// Terminal default (SGR 39 / SGR 49).
    #[default]
    Default,
    /// Palette index: 0-15 named, 16-231 color cube, 232-255 grayscale.
    Indexed(u8),
    /// 24-bit true color.
    Rgb(u8, u8, u8),
}

/// The current writing attributes: SGR flags plus pen colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pen {
    pub flags: CellAttrs,
    pub fg: PenColor,
    pub bg: PenColor,
}

impl Pen {
    /// Reset to SGR 0 state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Apply a flattened SGR parameter list.
    ///
    /// Colon-separated sub-parameters arrive pre-flattened, so `38;5;n` and
    /// `38:5:n` take the same path. Unknown parameters are skipped.
    pub fn apply_sgr(&mut self, params: &[u16]) {
        if params.is_empty() {
            self.reset();
            return;
        }
        let mut i = 0;
        while i < params.len() {
            match params[i] {
                0 => self.reset(),
                1 => self.flags.insert(CellAttrs::BOLD),
                2 => {} // faint: tracked as no-op, renderer has no dim tier
                3 => self.flags.insert(CellAttrs::ITALIC),
                4 => self.flags.insert(CellAttrs::UNDERLINE),
                7 => self.flags.insert(CellAttrs::INVERSE),
                9 => self.flags.insert(CellAttrs::STRIKETHROUGH),
                22 => self.flags.remove(CellAttrs::BOLD),
                23 => self.flags.remove(CellAttrs::ITALIC),
                24 => self.flags.remove(CellAttrs::UNDERLINE),
                27 => self.flags.remove(CellAttrs::INVERSE),
                29 => self.flags.remove(CellAttrs::STRIKETHROUGH),
                30..=37 => self.fg = PenColor::Indexed((params[i] - 30) as u8),
                38 => {
                    if let Some((color, used)) = Self::extended_color(&params[i + 1..]) {
                        self.fg = color;
                        i += used;
                    } else {
                        return;
                    }
                }
                39 => self.fg = PenColor::Default,
                40..=47 => self.bg = PenColor::Indexed((params[i] - 40) as u8),
                48 => {
                    if let Some((color, used)) = Self::extended_color(&params[i + 1..]) {
                        self.bg = color;
                        i += used;
                    } else {
                        return;
                    }
                }
                49 => self.bg = PenColor::Default,
                90..=97 => self.fg = PenColor::Indexed((params[i] - 90 + 8) as u8),
                100..=107 => self.bg = PenColor::Indexed((params[i] - 100 + 8) as u8),
                _ => {}
            }
            i += 1;
        }
    }

    /// Decode the tail of a `38`/`48` extended color: `5;n` or `2;r;g;b`.
    /// Returns the color and the number of parameters consumed.
    fn extended_color(rest: &[u16]) -> Option<(PenColor, usize)> {
        match rest.first()? {
            5 => {
                let n = *rest.get(1)?;
                Some((PenColor::Indexed(n.min(255) as u8), 2))
            }
            2 => {
                let r = *rest.get(1)?;
                let g = *rest.get(2)?;
                let b = *rest.get(3)?;
                Some((
                    PenColor::Rgb(r.min(255) as u8, g.min(255) as u8, b.min(255) as u8),
                    4,
                ))
            }
            _ => None,
        }
    }
}

/// A single cell in the terminal grid.
///
/// Fully resolved: `fg`/`bg` are concrete colors, never palette references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    /// The character content. A space for empty/erased cells.
    pub ch: char,
    pub fg: Rgba,
    pub bg: Rgba,
    pub attrs: CellAttrs,
    /// Hyperlink id (0 = no link).
    pub hyperlink: HyperlinkId,
}

impl Cell {
    /// A blank cell carrying the given default colors.
    #[must_use]
    pub const fn blank(fg: Rgba, bg: Rgba) -> Self {
        Self {
            ch: ' ',
            fg,
            bg,
            attrs: CellAttrs::empty(),
            hyperlink: 0,
        }
    }

    /// Whether this cell is the leading half of a wide character.
    #[must_use]
    pub fn is_wide(&self) -> bool {
        self.attrs.contains(CellAttrs::WIDE_CHAR)
    }

    /// Whether this cell is the trailing spacer of a wide character.
    #[must_use]
    pub fn is_wide_continuation(&self) -> bool {
        self.attrs.contains(CellAttrs::WIDE_CONTINUATION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_cell_is_space_with_no_attrs() {
        let cell = Cell::blank(Rgba::new(1, 2, 3), Rgba::new(4, 5, 6));
        assert_eq!(cell.ch, ' ');
        assert_eq!(cell.fg, Rgba::new(1, 2, 3));
        assert_eq!(cell.attrs, CellAttrs::empty());
        assert_eq!(cell.hyperlink, 0);
    }

    #[test]
    fn rgba_from_argb_unpacks_channels() {
        let c = Rgba::from_argb(0x40FF_CC01);
        assert_eq!(c, Rgba::with_alpha(0xFF, 0xCC, 0x01, 0x40));
    }

    #[test]
    fn sgr_empty_params_reset() {
        let mut pen = Pen {
            flags: CellAttrs::BOLD,
            fg: PenColor::Indexed(1),
            bg: PenColor::Rgb(9, 9, 9),
        };
        pen.apply_sgr(&[]);
        assert_eq!(pen, Pen::default());
    }

    #[test]
    fn sgr_attrs_on_and_off() {
        let mut pen = Pen::default();
        pen.apply_sgr(&[1, 3, 4, 7, 9]);
        assert!(pen.flags.contains(
            CellAttrs::BOLD
                | CellAttrs::ITALIC
                | CellAttrs::UNDERLINE
                | CellAttrs::INVERSE
                | CellAttrs::STRIKETHROUGH
        ));
        pen.apply_sgr(&[22, 23, 24, 27, 29]);
        assert_eq!(pen.flags, CellAttrs::empty());
    }

    #[test]
    fn sgr_16_color_and_bright() {
        let mut pen = Pen::default();
        pen.apply_sgr(&[31, 42]);
        assert_eq!(pen.fg, PenColor::Indexed(1));
        assert_eq!(pen.bg, PenColor::Indexed(2));
        pen.apply_sgr(&[91, 102]);
        assert_eq!(pen.fg, PenColor::Indexed(9));
        assert_eq!(pen.bg, PenColor::Indexed(10));
    }

    #[test]
    fn sgr_256_and_truecolor() {
        let mut pen = Pen::default();
        pen.apply_sgr(&[38, 5, 208]);
        assert_eq!(pen.fg, PenColor::Indexed(208));
        pen.apply_sgr(&[48, 2, 10, 20, 30]);
        assert_eq!(pen.bg, PenColor::Rgb(10, 20, 30));
    }

    #[test]
    fn sgr_extended_color_followed_by_more_params() {
        let mut pen = Pen::default();
        pen.apply_sgr(&[38, 5, 17, 1]);
        assert_eq!(pen.fg, PenColor::Indexed(17));
        assert!(pen.flags.contains(CellAttrs::BOLD));
    }

    #[test]
    fn sgr_truncated_extended_color_stops_cleanly() {
        let mut pen = Pen::default();
        pen.apply_sgr(&[38, 5]);
        assert_eq!(pen.fg, PenColor::Default);
    }

    #[test]
    fn sgr_default_colors() {
        let mut pen = Pen::default();
        pen.apply_sgr(&[31, 41]);
        pen.apply_sgr(&[39, 49]);
        assert_eq!(pen.fg, PenColor::Default);
        assert_eq!(pen.bg, PenColor::Default);
    }
}
