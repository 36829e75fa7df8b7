//! Value types published by the store.
//!
//! Everything here is plain data: cheap to clone, serializable, and never
//! mutated once published inside a [`Snapshot`].

use std::fmt;

use serde::{Serialize, Serializer};

use crate::engine::{RawSettings, RawTheme};

// ============================================================================
// Color
// ============================================================================

/// A color as four byte channels: red, green, blue, alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    /// Decodes a packed engine color. The low byte is red.
    ///
    /// `0xFF00FF00` decodes to `[0, 255, 0, 255]` (opaque green).
    #[must_use]
    pub const fn from_packed(packed: u32) -> Self { Self(packed.to_le_bytes()) }

    /// Packs the channels back into the engine's representation.
    #[must_use]
    pub const fn to_packed(self) -> u32 { u32::from_le_bytes(self.0) }

    #[must_use]
    pub const fn r(self) -> u8 { self.0[0] }

    #[must_use]
    pub const fn g(self) -> u8 { self.0[1] }

    #[must_use]
    pub const fn b(self) -> u8 { self.0[2] }

    #[must_use]
    pub const fn a(self) -> u8 { self.0[3] }

    /// Relative luminance in `0.0..=1.0`, ignoring alpha.
    #[must_use]
    pub fn luminance(self) -> f64 {
        (0.2126 * f64::from(self.r()) + 0.7152 * f64::from(self.g()) + 0.0722 * f64::from(self.b()))
            / 255.0
    }
}

impl fmt::Display for Rgba {
    /// Formats as `#rrggbb`, or `#rrggbbaa` when not fully opaque.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.0;
        if a == u8::MAX {
            write!(f, "#{r:02x}{g:02x}{b:02x}")
        } else {
            write!(f, "#{r:02x}{g:02x}{b:02x}{a:02x}")
        }
    }
}

impl Serialize for Rgba {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Preferred color scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    Light,
    Dark,
    /// Follow the operating system.
    #[default]
    System,
}

impl ColorScheme {
    /// Decodes the engine discriminant. Unknown values fall back to `System`.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        match raw {
            0 => Self::Light,
            1 => Self::Dark,
            _ => Self::System,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        }
    }
}

impl fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// User settings relevant to presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub scheme: ColorScheme,
    pub light_theme: String,
    pub dark_theme: String,
}

impl From<RawSettings> for Settings {
    fn from(raw: RawSettings) -> Self {
        Self {
            scheme: ColorScheme::from_raw(raw.scheme),
            light_theme: raw.light_theme,
            dark_theme: raw.dark_theme,
        }
    }
}

// ============================================================================
// Theme
// ============================================================================

/// The active theme's palette.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Theme {
    pub name: String,
    pub fg: Rgba,
    pub bg: Rgba,
    pub primary_fg: Rgba,
    pub primary_bg: Rgba,
    pub muted_fg: Rgba,
    pub muted_bg: Rgba,
    pub scroll_thumb: Rgba,
    pub scroll_track: Rgba,
    pub border: Rgba,
}

impl Theme {
    /// Returns every color with its field name, in declaration order.
    #[must_use]
    pub const fn colors(&self) -> [(&'static str, Rgba); 9] {
        [
            ("fg", self.fg),
            ("bg", self.bg),
            ("primary_fg", self.primary_fg),
            ("primary_bg", self.primary_bg),
            ("muted_fg", self.muted_fg),
            ("muted_bg", self.muted_bg),
            ("scroll_thumb", self.scroll_thumb),
            ("scroll_track", self.scroll_track),
            ("border", self.border),
        ]
    }

    /// Returns whether the background is dark.
    #[must_use]
    pub fn is_dark(&self) -> bool { self.bg.luminance() < 0.5 }
}

impl From<RawTheme> for Theme {
    fn from(raw: RawTheme) -> Self {
        Self {
            name: raw.name,
            fg: Rgba::from_packed(raw.fg),
            bg: Rgba::from_packed(raw.bg),
            primary_fg: Rgba::from_packed(raw.primary_fg),
            primary_bg: Rgba::from_packed(raw.primary_bg),
            muted_fg: Rgba::from_packed(raw.muted_fg),
            muted_bg: Rgba::from_packed(raw.muted_bg),
            scroll_thumb: Rgba::from_packed(raw.scroll_thumb),
            scroll_track: Rgba::from_packed(raw.scroll_track),
            border: Rgba::from_packed(raw.border),
        }
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Point-in-time view of presentation state.
///
/// `ready` turns true after the first load attempt, whether or not it
/// succeeded. `error` describes the most recent failed read and is cleared
/// by the next successful one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Snapshot {
    pub settings: Option<Settings>,
    pub theme: Option<Theme>,
    pub ready: bool,
    pub error: Option<String>,
}

impl Snapshot {
    /// A successfully loaded snapshot.
    #[must_use]
    pub const fn loaded(settings: Settings, theme: Theme) -> Self {
        Self { settings: Some(settings), theme: Some(theme), ready: true, error: None }
    }

    /// Copies this snapshot, marking it ready and recording `error`.
    #[must_use]
    pub fn with_error(&self, error: impl Into<String>) -> Self {
        Self { ready: true, error: Some(error.into()), ..self.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_color_is_low_byte_first() {
        let green = Rgba::from_packed(0xFF00_FF00);
        assert_eq!(green.0, [0, 255, 0, 255]);
        assert_eq!(green.to_packed(), 0xFF00_FF00);
        assert_eq!((green.r(), green.g(), green.b(), green.a()), (0, 255, 0, 255));
    }

    #[test]
    fn rgba_display() {
        assert_eq!(Rgba([0x26, 0x8b, 0xd2, 0xff]).to_string(), "#268bd2");
        assert_eq!(Rgba([0, 0, 0, 0x80]).to_string(), "#00000080");
    }

    #[test]
    fn scheme_decoding() {
        assert_eq!(ColorScheme::from_raw(0), ColorScheme::Light);
        assert_eq!(ColorScheme::from_raw(1), ColorScheme::Dark);
        assert_eq!(ColorScheme::from_raw(2), ColorScheme::System);
        assert_eq!(ColorScheme::from_raw(42), ColorScheme::System);
    }

    #[test]
    fn theme_from_raw_decodes_every_color() {
        let raw = RawTheme { name: "mono".to_string(), border: 0xFF00_FF00, ..RawTheme::default() };
        let theme = Theme::from(raw);

        assert_eq!(theme.name, "mono");
        assert_eq!(theme.border, Rgba([0, 255, 0, 255]));
        assert_eq!(theme.colors().len(), 9);
        assert_eq!(theme.colors()[8].0, "border");
    }

    #[test]
    fn with_error_keeps_previous_values() {
        let settings = Settings {
            scheme: ColorScheme::Dark,
            light_theme: "a".to_string(),
            dark_theme: "b".to_string(),
        };
        let theme = Theme::from(RawTheme::default());
        let snapshot = Snapshot::loaded(settings.clone(), theme.clone());

        let failed = snapshot.with_error("boom");
        assert_eq!(failed.settings, Some(settings));
        assert_eq!(failed.theme, Some(theme));
        assert!(failed.ready);
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }

    #[test]
    fn snapshot_serializes_colors_as_hex() {
        let snapshot = Snapshot::loaded(
            Settings::from(RawSettings { scheme: 1, ..RawSettings::default() }),
            Theme::from(RawTheme { fg: 0xFF00_FF00, ..RawTheme::default() }),
        );
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["settings"]["scheme"], "dark");
        assert_eq!(json["theme"]["fg"], "#00ff00");
        assert_eq!(json["ready"], true);
    }
}
