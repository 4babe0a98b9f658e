#![forbid(unsafe_code)]

//! Typed configuration for the terminal core.
//!
//! The core never parses a config file; the host shell deserializes into
//! these value types (any serde format) and passes them into constructors.
//! Invalid fields are defaulted individually and reported as warnings —
//! configuration problems are never fatal.

use serde::{Deserialize, Serialize};
use velterm_core::{Palette, Rgba};

/// Semantic actions the host shell binds keys to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAction {
    Copy,
    Paste,
    NewTab,
    CloseTab,
    NextTab,
    PrevTab,
    SplitH,
    SplitV,
    ClosePane,
    ScrollUp,
    ScrollDown,
    ScrollPageUp,
    ScrollPageDown,
    ToggleSearch,
    ToggleFullscreen,
}

/// A color scheme: defaults plus the 16 configurable ANSI entries.
/// Colors use the packed `0xAARRGGBB` encoding config files carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorScheme {
    pub name: String,
    pub foreground: u32,
    pub background: u32,
    pub cursor: u32,
    pub selection: u32,
    pub ansi_colors: [u32; 16],
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            name: "Default Dark".to_string(),
            foreground: 0xFFCC_CCCC,
            background: 0xFF1E_1E1E,
            cursor: 0xFFFF_FFFF,
            selection: 0x40FF_FFFF,
            ansi_colors: [
                0xFF00_0000,
                0xFFCD_0000,
                0xFF00_CD00,
                0xFFCD_CD00,
                0xFF00_00EE,
                0xFFCD_00CD,
                0xFF00_CDCD,
                0xFFE5_E5E5,
                0xFF7F_7F7F,
                0xFFFF_0000,
                0xFF00_FF00,
                0xFFFF_FF00,
                0xFF5C_5CFF,
                0xFFFF_00FF,
                0xFF00_FFFF,
                0xFFFF_FFFF,
            ],
        }
    }
}

impl ColorScheme {
    /// Resolve into the palette the screen buffer consumes.
    #[must_use]
    pub fn palette(&self) -> Palette {
        let mut ansi = [Rgba::new(0, 0, 0); 16];
        for (slot, packed) in ansi.iter_mut().zip(self.ansi_colors) {
            *slot = Rgba::from_argb(packed);
        }
        Palette {
            foreground: Rgba::from_argb(self.foreground),
            background: Rgba::from_argb(self.background),
            cursor: Rgba::from_argb(self.cursor),
            ansi,
        }
    }

    /// Selection overlay color (with its alpha).
    #[must_use]
    pub fn selection_color(&self) -> Rgba {
        Rgba::from_argb(self.selection)
    }
}

/// Everything the terminal core reads from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub font_family: String,
    pub font_size: f32,
    pub scrollback_lines: usize,
    pub color_scheme: ColorScheme,
    pub vsync: bool,
    pub cursor_blink: bool,
    /// Blink half-period in milliseconds.
    pub cursor_blink_rate: f32,
    /// Explicit shell override; empty means platform selection order.
    pub shell: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            font_family: "Cascadia Mono".to_string(),
            font_size: 14.0,
            scrollback_lines: 10_000,
            color_scheme: ColorScheme::default(),
            vsync: true,
            cursor_blink: true,
            cursor_blink_rate: 500.0,
            shell: String::new(),
        }
    }
}

/// A field that was out of range and got defaulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub field: &'static str,
    pub message: String,
}

impl Config {
    /// Shell hint for PTY creation (`None` = platform order).
    #[must_use]
    pub fn shell_hint(&self) -> Option<&str> {
        if self.shell.is_empty() {
            None
        } else {
            Some(&self.shell)
        }
    }

    /// Clamp out-of-range fields to sane values, collecting a warning for
    /// each correction. Never fails.
    pub fn sanitize(&mut self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if !(6.0..=96.0).contains(&self.font_size) || !self.font_size.is_finite() {
            warnings.push(ConfigWarning {
                field: "font_size",
                message: format!("{} out of range, using 14", self.font_size),
            });
            self.font_size = 14.0;
        }
        if self.font_family.trim().is_empty() {
            warnings.push(ConfigWarning {
                field: "font_family",
                message: "empty, using Cascadia Mono".to_string(),
            });
            self.font_family = "Cascadia Mono".to_string();
        }
        const MAX_SCROLLBACK: usize = 1_000_000;
        if self.scrollback_lines > MAX_SCROLLBACK {
            warnings.push(ConfigWarning {
                field: "scrollback_lines",
                message: format!("{} too large, capping at {MAX_SCROLLBACK}", self.scrollback_lines),
            });
            self.scrollback_lines = MAX_SCROLLBACK;
        }
        if !(50.0..=5000.0).contains(&self.cursor_blink_rate) || !self.cursor_blink_rate.is_finite()
        {
            warnings.push(ConfigWarning {
                field: "cursor_blink_rate",
                message: format!("{} out of range, using 500", self.cursor_blink_rate),
            });
            self.cursor_blink_rate = 500.0;
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_stock_scheme() {
        let config = Config::default();
        assert_eq!(config.scrollback_lines, 10_000);
        assert!(config.vsync);
        let palette = config.color_scheme.palette();
        assert_eq!(palette.foreground, Rgba::new(0xCC, 0xCC, 0xCC));
        assert_eq!(palette.background, Rgba::new(0x1E, 0x1E, 0x1E));
        assert_eq!(palette.ansi[1], Rgba::new(0xCD, 0, 0));
    }

    #[test]
    fn shell_hint_empty_means_none() {
        let mut config = Config::default();
        assert_eq!(config.shell_hint(), None);
        config.shell = "pwsh".to_string();
        assert_eq!(config.shell_hint(), Some("pwsh"));
    }

    #[test]
    fn sanitize_defaults_bad_fields_individually() {
        let mut config = Config {
            font_size: 500.0,
            font_family: "  ".to_string(),
            scrollback_lines: usize::MAX,
            cursor_blink_rate: 1.0,
            ..Config::default()
        };
        let warnings = config.sanitize();
        assert_eq!(warnings.len(), 4);
        assert_eq!(config.font_size, 14.0);
        assert_eq!(config.font_family, "Cascadia Mono");
        assert_eq!(config.scrollback_lines, 1_000_000);
        assert_eq!(config.cursor_blink_rate, 500.0);

        // A clean config stays untouched.
        let mut clean = Config::default();
        assert!(clean.sanitize().is_empty());
    }

    #[test]
    fn partial_json_deserializes_with_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "font_size": 12.0, "shell": "zsh" }"#).unwrap();
        assert_eq!(config.font_size, 12.0);
        assert_eq!(config.shell_hint(), Some("zsh"));
        assert_eq!(config.scrollback_lines, 10_000);
    }

    #[test]
    fn selection_color_keeps_alpha() {
        let scheme = ColorScheme::default();
        assert_eq!(scheme.selection_color().a, 0x40);
    }
}
