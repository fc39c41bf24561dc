//! Notification data types.
//!
//! A [`Notification`] is immutable once received. The server identifies it by
//! its insertion index in the history log, not by any field it carries.

use std::collections::HashMap;

/// Urgency level per the freedesktop notification spec.
///
/// Used as an index into the per-urgency configuration triples
/// (foreground, background, border, timeout).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Low,
    Normal,
    Critical,
}

impl Urgency {
    /// Index into the per-urgency config arrays (low=0, normal=1, critical=2)
    pub fn index(self) -> usize {
        match self {
            Urgency::Low => 0,
            Urgency::Normal => 1,
            Urgency::Critical => 2,
        }
    }

    /// Decode the wire byte; anything out of range falls back to Normal.
    pub fn from_wire(level: u8) -> Self {
        match level {
            0 => Urgency::Low,
            2 => Urgency::Critical,
            _ => Urgency::Normal,
        }
    }
}

/// A single notification event as delivered by the host.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Short summary line
    pub summary: String,
    /// Body text (may contain newlines)
    pub body: String,
    /// Name of the sending application
    pub app_name: String,
    /// Path to an icon file, if the sender supplied one
    pub app_icon: Option<String>,
    /// Urgency level
    pub urgency: Urgency,
    /// Requested display duration in milliseconds. `None` means the sender
    /// left it to us (wire value -1); 0 means "never expire".
    pub timeout_ms: Option<u32>,
    /// Identifier of a previously shown notification to update in place
    /// (wire value 0 means none).
    pub replaces_id: Option<u32>,
    /// Remaining hints, unparsed
    pub hints: HashMap<String, String>,
}

impl Notification {
    /// Build a notification from the raw wire fields of the
    /// org.freedesktop.Notifications `Notify` call, normalizing the
    /// sentinel values (-1 timeout, 0 replaces_id, empty icon).
    #[allow(clippy::too_many_arguments)]
    pub fn from_wire(
        summary: String,
        body: String,
        app_name: String,
        app_icon: String,
        urgency: u8,
        timeout_ms: i32,
        replaces_id: u32,
        hints: HashMap<String, String>,
    ) -> Self {
        Self {
            summary,
            body,
            app_name,
            app_icon: if app_icon.is_empty() { None } else { Some(app_icon) },
            urgency: Urgency::from_wire(urgency),
            timeout_ms: if timeout_ms < 0 { None } else { Some(timeout_ms as u32) },
            replaces_id: if replaces_id == 0 { None } else { Some(replaces_id) },
            hints,
        }
    }
}
