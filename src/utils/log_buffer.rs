//! Tracing layers for a TUI application.
//!
//! No fmt layer may write to stderr while the terminal is in raw mode,
//! so logs go to an in-memory ring buffer (rendered by the Logs panel)
//! and, in full detail, to a log file under the data directory.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::core::config::MAX_LOG_ENTRIES;

#[derive(Clone)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: Level,
    pub message: String,
}

/// Bounded ring buffer of recent log entries, shared with the UI.
#[derive(Clone)]
pub struct LogBuffer {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn push(&self, entry: LogEntry) {
        let mut entries = self.entries.lock().unwrap();
        if entries.len() >= MAX_LOG_ENTRIES {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().iter().cloned().collect()
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Layer feeding the ring buffer.
pub struct BufferLayer {
    buffer: LogBuffer,
}

impl BufferLayer {
    pub fn new(buffer: LogBuffer) -> Self {
        Self { buffer }
    }
}

struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else if self.message.is_empty() {
            self.message = format!("{} = {:?}", field.name(), value);
        } else {
            self.message
                .push_str(&format!(", {} = {:?}", field.name(), value));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else if self.message.is_empty() {
            self.message = format!("{} = {}", field.name(), value);
        } else {
            self.message
                .push_str(&format!(", {} = {}", field.name(), value));
        }
    }
}

fn render_message(event: &Event<'_>) -> String {
    let mut visitor = MessageVisitor {
        message: String::new(),
    };
    event.record(&mut visitor);

    let target = event.metadata().target();
    if visitor.message.is_empty() {
        target.to_string()
    } else {
        format!("{}: {}", target, visitor.message)
    }
}

impl<S: Subscriber> Layer<S> for BufferLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        let message = render_message(event);

        // Short wall-clock time; the file layer keeps full timestamps.
        let now = {
            let dur = SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default();
            let total_secs = dur.as_secs();
            let h = (total_secs / 3600) % 24;
            let m = (total_secs / 60) % 60;
            let s = total_secs % 60;
            format!("{:02}:{:02}:{:02}", h, m, s)
        };

        self.buffer.push(LogEntry {
            timestamp: now,
            level,
            message,
        });
    }
}

// ── File Logging Layer ──────────────────────────────────────────────────────

/// Appends log events to a file with full ISO 8601 timestamps.
pub struct FileLogLayer {
    writer: Arc<Mutex<File>>,
}

impl FileLogLayer {
    /// Creates parent directories if they don't exist.
    pub fn new(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Arc::new(Mutex::new(file)),
        })
    }
}

impl<S: Subscriber> Layer<S> for FileLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        let message = render_message(event);

        let timestamp = chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");

        let level_str = match level {
            Level::ERROR => "ERROR",
            Level::WARN => "WARN",
            Level::INFO => "INFO",
            Level::DEBUG => "DEBUG",
            Level::TRACE => "TRACE",
        };

        let log_line = format!("[{}] {} {}\n", timestamp, level_str, message);

        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.write_all(log_line.as_bytes());
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_is_bounded() {
        let buffer = LogBuffer::new();
        for i in 0..(MAX_LOG_ENTRIES + 10) {
            buffer.push(LogEntry {
                timestamp: "00:00:00".into(),
                level: Level::INFO,
                message: format!("entry {i}"),
            });
        }
        let entries = buffer.entries();
        assert_eq!(entries.len(), MAX_LOG_ENTRIES);
        // Oldest entries were evicted first.
        assert_eq!(entries[0].message, "entry 10");
    }
}
