//! Output mirror: cursor reads and notification tailing
//!
//! The editor's Output panel is the source of truth. The mirror keeps two
//! positions over its parsed text, both counted in characters:
//! - `last_read_length`: the client-visible checkpoint behind
//!   `get_output(new_only)` / `get_output(clear)`
//! - `last_seen_length`: how far the notification tail has advanced
//!
//! Both positions clamp when the panel shrinks (the user cleared it).

use scope_core::envelope::{OutputKind, OutputRecord};

/// Result of a cursor read
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRead {
    pub output: String,
    pub length: usize,
    pub total_length: usize,
}

#[derive(Debug, Default)]
pub struct OutputMirror {
    last_read_length: usize,
    last_seen_length: usize,
}

impl OutputMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_read_length(&self) -> usize {
        self.last_read_length
    }

    /// Serve a `get_output` call against the panel's current parsed text
    pub fn read(&mut self, full_text: &str, new_only: bool, clear: bool) -> OutputRead {
        let total_length = full_text.chars().count();
        if self.last_read_length > total_length {
            self.last_read_length = total_length;
        }

        let output: String = if new_only {
            full_text.chars().skip(self.last_read_length).collect()
        } else {
            full_text.to_string()
        };

        if clear {
            self.last_read_length = total_length;
        }

        OutputRead {
            length: output.chars().count(),
            output,
            total_length,
        }
    }

    /// Tail the panel once per frame, returning records for every complete
    /// line appended since the last tick. A partial trailing line stays in
    /// the panel until its newline arrives.
    pub fn tick(&mut self, full_text: &str, timestamp: f64) -> Vec<OutputRecord> {
        let total_length = full_text.chars().count();
        if total_length < self.last_seen_length {
            // panel was cleared underneath us
            self.last_seen_length = total_length;
            if self.last_read_length > total_length {
                self.last_read_length = total_length;
            }
            return Vec::new();
        }

        if total_length == self.last_seen_length {
            return Vec::new();
        }

        let tail: String = full_text.chars().skip(self.last_seen_length).collect();
        let Some(complete_end) = tail.rfind('\n') else {
            return Vec::new();
        };

        let complete = &tail[..complete_end];
        self.last_seen_length += tail[..=complete_end].chars().count();

        complete
            .split('\n')
            .filter(|line| !line.is_empty())
            .map(|line| OutputRecord {
                kind: classify_line(line),
                message: line.to_string(),
                timestamp,
            })
            .collect()
    }
}

/// Classify a log line by the prefixes the engine prints
pub fn classify_line(line: &str) -> OutputKind {
    let trimmed = line.trim_start();
    if trimmed.starts_with("ERROR") || trimmed.starts_with("SCRIPT ERROR") {
        OutputKind::Error
    } else if trimmed.starts_with("WARNING") {
        OutputKind::Warning
    } else if trimmed.starts_with("at:") || trimmed.starts_with("At:") || trimmed.starts_with('#') {
        OutputKind::Stack
    } else {
        OutputKind::Print
    }
}
