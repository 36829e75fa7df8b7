//! CLI output formatting utilities.
//!
//! This module provides utilities for formatting CLI output including:
//! - Tables for snapshot display
//! - JSON syntax highlighting

use std::fmt::Write as _;

use colored::Colorize;
use tabled::settings::object::Columns;
use tabled::settings::{Modify, Style, Width};
use tabled::{Table, Tabled};

use crate::store::{Rgba, Snapshot};

/// Maximum width of the value column before truncation.
const VALUE_WIDTH: usize = 60;

// ============================================================================
// JSON
// ============================================================================

/// Highlights pretty-printed JSON.
///
/// Colors:
/// - Keys: Cyan
/// - Strings: Green
/// - Numbers: Yellow
/// - Booleans/Null: Magenta
/// - Brackets/Braces: White, bold
#[must_use]
pub fn highlight_json(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut chars = json.char_indices().peekable();
    // One entry per open container; `true` for arrays.
    let mut containers: Vec<bool> = Vec::new();
    let mut after_colon = false;

    while let Some((start, ch)) = chars.next() {
        match ch {
            '"' => {
                let mut end = json.len();
                let mut escaped = false;
                for (idx, c) in chars.by_ref() {
                    if escaped {
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == '"' {
                        end = idx + 1;
                        break;
                    }
                }

                let token = &json[start..end];
                let is_key = !after_colon && containers.last() == Some(&false);
                let _ = write!(out, "{}", if is_key { token.cyan() } else { token.green() });
                after_colon = false;
            }
            ':' => {
                let _ = write!(out, "{}", ":".white());
                after_colon = true;
            }
            ',' => {
                let _ = write!(out, "{}", ",".white());
                after_colon = false;
            }
            '{' | '[' | '}' | ']' => {
                match ch {
                    '{' => containers.push(false),
                    '[' => containers.push(true),
                    _ => {
                        containers.pop();
                    }
                }
                let _ = write!(out, "{}", ch.to_string().white().bold());
                after_colon = false;
            }
            c if c.is_whitespace() => out.push(c),
            _ => {
                let mut end = start + ch.len_utf8();
                while let Some(&(idx, c)) = chars.peek() {
                    if c.is_whitespace() || matches!(c, ',' | '}' | ']') {
                        break;
                    }
                    end = idx + c.len_utf8();
                    chars.next();
                }

                let literal = &json[start..end];
                let _ = match literal {
                    "true" | "false" | "null" => write!(out, "{}", literal.magenta()),
                    _ if literal.parse::<f64>().is_ok() => write!(out, "{}", literal.yellow()),
                    _ => write!(out, "{literal}"),
                };
                after_colon = false;
            }
        }
    }

    out
}

/// Prints a value as highlighted JSON.
///
/// # Errors
///
/// Returns an error if `value` cannot be serialized.
pub fn print_json(value: &impl serde::Serialize) -> Result<(), serde_json::Error> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", highlight_json(&json));
    Ok(())
}

// ============================================================================
// Tables
// ============================================================================

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl FieldRow {
    fn new(field: &str, value: impl ToString) -> Self {
        Self { field: field.to_string(), value: value.to_string() }
    }
}

/// Renders a color as a swatch followed by its hex value.
#[must_use]
pub fn format_color(color: Rgba) -> String {
    format!("{} {color}", "  ".on_truecolor(color.r(), color.g(), color.b()))
}

/// Renders a snapshot as a two-column table.
#[must_use]
pub fn snapshot_table(snapshot: &Snapshot) -> String {
    let mut rows = Vec::new();

    if let Some(settings) = &snapshot.settings {
        rows.push(FieldRow::new("scheme", settings.scheme));
        rows.push(FieldRow::new("light theme", &settings.light_theme));
        rows.push(FieldRow::new("dark theme", &settings.dark_theme));
    }

    if let Some(theme) = &snapshot.theme {
        rows.push(FieldRow::new("theme", &theme.name));
        rows.extend(
            theme.colors().into_iter().map(|(name, color)| FieldRow::new(name, format_color(color))),
        );
    }

    if let Some(error) = &snapshot.error {
        rows.push(FieldRow::new("error", error.red()));
    }

    Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::last()).with(Width::truncate(VALUE_WIDTH).suffix("…")))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{RawSettings, RawTheme};
    use crate::store::{Settings, Theme};

    fn plain() { colored::control::set_override(false); }

    #[test]
    fn test_highlight_json_without_colors_is_identity() {
        plain();
        let json = serde_json::to_string_pretty(&serde_json::json!({
            "name": "ink \"dark\"",
            "sizes": [1, 2.5, -3],
            "tags": ["a", "b"],
            "nested": { "ok": true, "none": null }
        }))
        .unwrap();

        assert_eq!(highlight_json(&json), json);
    }

    #[test]
    fn test_snapshot_table_lists_fields() {
        plain();
        let snapshot = Snapshot::loaded(
            Settings::from(RawSettings {
                scheme: 0,
                light_theme: "paper".to_string(),
                dark_theme: "ink".to_string(),
            }),
            Theme::from(RawTheme { name: "paper".to_string(), fg: 0xFF00_FF00, ..RawTheme::default() }),
        )
        .with_error("theme unavailable");

        let table = snapshot_table(&snapshot);
        assert!(table.contains("Field"));
        assert!(table.contains("light"));
        assert!(table.contains("paper"));
        assert!(table.contains("#00ff00"));
        assert!(table.contains("theme unavailable"));
    }

    #[test]
    fn test_format_color_ends_with_hex() {
        plain();
        assert!(format_color(Rgba([0x26, 0x8b, 0xd2, 0xff])).ends_with("#268bd2"));
    }
}
