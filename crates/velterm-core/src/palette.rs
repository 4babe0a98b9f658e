//! Concrete color resolution for the 16/256/truecolor model.

use crate::cell::{PenColor, Rgba};

/// The resolved color set a screen buffer writes cells with.
///
/// Holds the default foreground/background/cursor colors plus the 16 ANSI
/// palette entries. Indices 16-255 are derived (6x6x6 cube + grayscale ramp)
/// and are not configurable, matching xterm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pub foreground: Rgba,
    pub background: Rgba,
    pub cursor: Rgba,
    pub ansi: [Rgba; 16],
}

impl Default for Palette {
    /// The stock dark scheme: `#CCCCCC` on `#1E1E1E` with xterm ANSI colors.
    fn default() -> Self {
        Self {
            foreground: Rgba::new(0xCC, 0xCC, 0xCC),
            background: Rgba::new(0x1E, 0x1E, 0x1E),
            cursor: Rgba::new(0xFF, 0xFF, 0xFF),
            ansi: [
                Rgba::new(0x00, 0x00, 0x00),
                Rgba::new(0xCD, 0x00, 0x00),
                Rgba::new(0x00, 0xCD, 0x00),
                Rgba::new(0xCD, 0xCD, 0x00),
                Rgba::new(0x00, 0x00, 0xEE),
                Rgba::new(0xCD, 0x00, 0xCD),
                Rgba::new(0x00, 0xCD, 0xCD),
                Rgba::new(0xE5, 0xE5, 0xE5),
                Rgba::new(0x7F, 0x7F, 0x7F),
                Rgba::new(0xFF, 0x00, 0x00),
                Rgba::new(0x00, 0xFF, 0x00),
                Rgba::new(0xFF, 0xFF, 0x00),
                Rgba::new(0x5C, 0x5C, 0xFF),
                Rgba::new(0xFF, 0x00, 0xFF),
                Rgba::new(0x00, 0xFF, 0xFF),
                Rgba::new(0xFF, 0xFF, 0xFF),
            ],
        }
    }
}

impl Palette {
    /// Resolve a pen foreground reference to a concrete color.
    #[must_use]
    pub fn resolve_fg(&self, color: PenColor) -> Rgba {
        self.resolve(color, self.foreground)
    }

    /// Resolve a pen background reference to a concrete color.
    #[must_use]
    pub fn resolve_bg(&self, color: PenColor) -> Rgba {
        self.resolve(color, self.background)
    }

    fn resolve(&self, color: PenColor, default: Rgba) -> Rgba {
        match color {
            PenColor::Default => default,
            PenColor::Indexed(i) => self.indexed(i),
            PenColor::Rgb(r, g, b) => Rgba::new(r, g, b),
        }
    }

    /// Resolve a 256-color palette index.
    #[must_use]
    pub fn indexed(&self, index: u8) -> Rgba {
        match index {
            0..=15 => self.ansi[index as usize],
            16..=231 => {
                let n = index - 16;
                let r = n / 36;
                let g = (n % 36) / 6;
                let b = n % 6;
                Rgba::new(cube_level(r), cube_level(g), cube_level(b))
            }
            232..=255 => {
                let level = 8 + 10 * (index - 232);
                Rgba::new(level, level, level)
            }
        }
    }

    /// Overwrite one of the 16 configurable ANSI entries (OSC 4).
    /// Indices 16-255 are derived and the request is ignored for them.
    pub fn set_ansi(&mut self, index: u8, color: Rgba) {
        if let Some(slot) = self.ansi.get_mut(index as usize) {
            *slot = color;
        }
    }
}

/// xterm 6-level color cube component values: 0, 95, 135, 175, 215, 255.
fn cube_level(n: u8) -> u8 {
    if n == 0 {
        0
    } else {
        55 + 40 * n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_resolves_to_scheme_colors() {
        let p = Palette::default();
        assert_eq!(p.resolve_fg(PenColor::Default), p.foreground);
        assert_eq!(p.resolve_bg(PenColor::Default), p.background);
    }

    #[test]
    fn ansi_red_is_palette_index_1() {
        let p = Palette::default();
        assert_eq!(p.resolve_fg(PenColor::Indexed(1)), Rgba::new(0xCD, 0, 0));
    }

    #[test]
    fn color_cube_corners() {
        let p = Palette::default();
        assert_eq!(p.indexed(16), Rgba::new(0, 0, 0));
        assert_eq!(p.indexed(231), Rgba::new(255, 255, 255));
        // 16 + 36*5 = 196 is pure red.
        assert_eq!(p.indexed(196), Rgba::new(255, 0, 0));
    }

    #[test]
    fn grayscale_ramp() {
        let p = Palette::default();
        assert_eq!(p.indexed(232), Rgba::new(8, 8, 8));
        assert_eq!(p.indexed(255), Rgba::new(238, 238, 238));
    }

    #[test]
    fn truecolor_passthrough() {
        let p = Palette::default();
        assert_eq!(
            p.resolve_fg(PenColor::Rgb(12, 34, 56)),
            Rgba::new(12, 34, 56)
        );
    }

    #[test]
    fn set_ansi_ignores_derived_range() {
        let mut p = Palette::default();
        let before = p.indexed(100);
        p.set_ansi(100, Rgba::new(1, 1, 1));
        assert_eq!(p.indexed(100), before);
        p.set_ansi(3, Rgba::new(1, 1, 1));
        assert_eq!(p.indexed(3), Rgba::new(1, 1, 1));
    }
}
