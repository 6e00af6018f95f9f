//! Warning collector handed to every parse
//!
//! Recoverable problems (bad numbers, skipped elements) are recorded here and
//! forwarded to the `log` facade. Only the first `max_lines` messages are kept.

use log::warn;

pub const DEFAULT_MAX_LINES: usize = 20;

#[derive(Debug, Clone)]
pub struct Warnings {
    title: String,
    messages: Vec<String>,
    max_lines: usize,
    skipped: usize,
}

impl Warnings {
    pub fn new(title: &str) -> Self {
        Self::with_max_lines(title, DEFAULT_MAX_LINES)
    }

    pub fn with_max_lines(title: &str, max_lines: usize) -> Self {
        Self {
            title: title.to_string(),
            messages: Vec::new(),
            max_lines,
            skipped: 0,
        }
    }

    pub fn log_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}: {}", self.title, message);
        if self.messages.len() < self.max_lines {
            self.messages.push(message);
        } else {
            self.skipped += 1;
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn has_errors(&self) -> bool {
        !self.messages.is_empty()
    }

    /// Number of messages dropped after the limit was reached
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Kept messages plus a trailing line for the dropped ones
    pub fn summary(&self) -> Vec<String> {
        let mut lines = self.messages.clone();
        if self.skipped > 0 {
            lines.push(format!("  ... skipped logging of {} additional errors ...", self.skipped));
        }
        lines
    }
}
