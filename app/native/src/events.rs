//! Centralized event definitions for engine notifications.
//!
//! The engine reports events as a numeric tag plus an optional payload. This
//! module owns the tag table and the decode step that turns a raw
//! notification into a typed [`DomainEvent`].
//!
//! ## Tag Table
//!
//! | Tag | Event            | Payload |
//! |-----|------------------|---------|
//! | 0   | `SettingsUpdate` | none    |
//! | 1   | `ThemeUpdate`    | none    |
//!
//! Any other tag is unknown and dropped by the bridge.

use std::fmt;

/// Numeric event tags understood by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventTag {
    /// Settings changed; settings and the derived theme must be re-read.
    SettingsUpdate = 0,
    /// Only the theme changed.
    ThemeUpdate = 1,
}

impl EventTag {
    /// Parses a raw tag. Returns `None` for unknown tags.
    #[must_use]
    pub const fn from_raw(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::SettingsUpdate),
            1 => Some(Self::ThemeUpdate),
            _ => None,
        }
    }

    /// Returns the raw tag value.
    #[must_use]
    pub const fn as_raw(self) -> u8 { self as u8 }
}

/// A decoded engine notification, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DomainEvent {
    /// Settings changed.
    SettingsUpdate,
    /// Theme changed.
    ThemeUpdate,
}

impl DomainEvent {
    /// Decodes a raw notification.
    ///
    /// Runs synchronously inside the engine callback, so `payload` is only
    /// borrowed; variants that need payload data must copy it here.
    #[must_use]
    pub fn decode(tag: u8, payload: Option<&[u8]>) -> Option<Self> {
        let event = match EventTag::from_raw(tag)? {
            EventTag::SettingsUpdate => Self::SettingsUpdate,
            EventTag::ThemeUpdate => Self::ThemeUpdate,
        };

        if let Some(bytes) = payload {
            tracing::trace!(tag, len = bytes.len(), "ignoring payload on payload-less event");
        }

        Some(event)
    }

    /// Returns the tag this event was decoded from.
    #[must_use]
    pub const fn tag(&self) -> EventTag {
        match self {
            Self::SettingsUpdate => EventTag::SettingsUpdate,
            Self::ThemeUpdate => EventTag::ThemeUpdate,
        }
    }
}

impl fmt::Display for DomainEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SettingsUpdate => f.write_str("settings-update"),
            Self::ThemeUpdate => f.write_str("theme-update"),
        }
    }
}
