//! User-facing notification system for the TUI status bar.
//!
//! Concise, level-aware notifications with auto-expiry. All user-visible
//! messages go through this module; verbose details belong in `tracing`
//! logs, not in the status bar.
//!
//! - Notifications auto-expire based on severity.
//! - Only one notification is active at a time (newest wins).
//! - Rendering picks color from the level.
//! - If no notification is active, the UI falls back to help text.

use ratatui::style::Color;
use std::time::{Duration, Instant};

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    /// Neutral informational message (e.g. "Rendering diff…").
    Info,
    /// Positive outcome (e.g. "Watermark embedded").
    Success,
    /// Non-critical issue (e.g. a validation error).
    Warning,
    /// Actionable failure (e.g. "Embed failed").
    Error,
}

impl NotifyLevel {
    /// Terminal color for the notification text.
    pub fn color(self) -> Color {
        match self {
            NotifyLevel::Info => Color::Cyan,
            NotifyLevel::Success => Color::Green,
            NotifyLevel::Warning => Color::Yellow,
            NotifyLevel::Error => Color::Red,
        }
    }

    /// How long the notification stays visible before auto-expiring.
    fn ttl(self) -> Duration {
        match self {
            NotifyLevel::Info => Duration::from_secs(5),
            NotifyLevel::Success => Duration::from_secs(5),
            NotifyLevel::Warning => Duration::from_secs(8),
            NotifyLevel::Error => Duration::from_secs(10),
        }
    }

    /// Single-char prefix for quick visual scanning.
    pub fn icon(self) -> &'static str {
        match self {
            NotifyLevel::Info => "(i)",
            NotifyLevel::Success => "(+)",
            NotifyLevel::Warning => "(~)",
            NotifyLevel::Error => "(!)",
        }
    }
}

/// A single user-facing notification.
#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotifyLevel,
    pub message: String,
    created_at: Instant,
    ttl: Duration,
}

impl Notification {
    fn new(level: NotifyLevel, message: impl Into<String>) -> Self {
        Self {
            ttl: level.ttl(),
            level,
            message: message.into(),
            created_at: Instant::now(),
        }
    }

    fn expired(&self) -> bool {
        self.created_at.elapsed() >= self.ttl
    }
}

/// Holds the single active notification; newest wins.
#[derive(Debug, Default)]
pub struct NotifyManager {
    active: Option<Notification>,
}

impl NotifyManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.active = Some(Notification::new(NotifyLevel::Info, message));
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.active = Some(Notification::new(NotifyLevel::Success, message));
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.active = Some(Notification::new(NotifyLevel::Warning, message));
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.active = Some(Notification::new(NotifyLevel::Error, message));
    }

    pub fn notify(&mut self, level: NotifyLevel, message: impl Into<String>) {
        self.active = Some(Notification::new(level, message));
    }

    /// The active notification, or `None` once it has expired.
    pub fn current(&self) -> Option<&Notification> {
        match &self.active {
            Some(n) if !n.expired() => Some(n),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_and_messages() {
        let mut mgr = NotifyManager::new();
        mgr.info("rendering");
        let n = mgr.current().unwrap();
        assert_eq!(n.level, NotifyLevel::Info);
        assert_eq!(n.message, "rendering");

        mgr.error("embed failed");
        assert_eq!(mgr.current().unwrap().level, NotifyLevel::Error);
    }

    #[test]
    fn test_newest_wins() {
        let mut mgr = NotifyManager::new();
        mgr.info("first");
        mgr.success("second");
        assert_eq!(mgr.current().unwrap().message, "second");
    }

    #[test]
    fn test_empty_manager_has_no_current() {
        let mgr = NotifyManager::new();
        assert!(mgr.current().is_none());
    }
}
