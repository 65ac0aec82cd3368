//! Diagnostics handle threaded through the compilation passes
//!
//! Each pass receives a `&mut Diagnostics` instead of reaching for global
//! logger state. Entries are kept in order so callers and tests can inspect
//! what happened, and are forwarded to `tracing` as they are recorded.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: Level,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    history: Vec<LogEntry>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn debug(&mut self, message: impl Into<String>) {
        self.record(Level::Debug, message.into());
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.record(Level::Info, message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.record(Level::Warn, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.record(Level::Error, message.into());
    }

    fn record(&mut self, level: Level, message: String) {
        match level {
            Level::Debug => tracing::debug!("{}", message),
            Level::Info => tracing::info!("{}", message),
            Level::Warn => tracing::warn!("{}", message),
            Level::Error => tracing::error!("{}", message),
        }
        self.history.push(LogEntry { level, message });
    }

    pub fn history(&self) -> &[LogEntry] {
        &self.history
    }

    /// Entries at `level` or above
    pub fn at_least(&self, level: Level) -> impl Iterator<Item = &LogEntry> {
        self.history.iter().filter(move |e| e.level >= level)
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.history.iter().any(|e| e.message.contains(needle))
    }
}
