//! Canonical breakpoint set
//!
//! The server owns the authoritative set; the code-editor widget and the
//! debugger session are both written through on every change, because the
//! session API alone does not arm the widget-level breakpoint that actually
//! halts execution.

use std::collections::BTreeMap;

/// Breakpoints keyed by (script path, 1-indexed line) → enabled
#[derive(Debug, Default)]
pub struct BreakpointSet {
    entries: BTreeMap<(String, u32), bool>,
}

impl BreakpointSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a breakpoint; the last write for a (path, line) wins
    pub fn set(&mut self, path: &str, line: u32, enabled: bool) {
        self.entries.insert((path.to_string(), line), enabled);
    }

    /// Empty the set, returning what was tracked so callers can disarm
    pub fn clear(&mut self) -> Vec<(String, u32, bool)> {
        let drained: Vec<_> = self
            .entries
            .iter()
            .map(|((path, line), enabled)| (path.clone(), *line, *enabled))
            .collect();
        self.entries.clear();
        drained
    }

    /// Enabled breakpoints, for re-applying to a fresh debugger session
    pub fn enabled(&self) -> Vec<(String, u32)> {
        self.entries
            .iter()
            .filter(|(_, &enabled)| enabled)
            .map(|((path, line), _)| (path.clone(), *line))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
