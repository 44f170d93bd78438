//! Trace sink shared by the bus, the resolver and the play controller.
//!
//! Components receive the sink explicitly; only the binary picks the
//! process-wide implementation.

use std::sync::{Arc, Mutex};

/// Diagnostic trace sink
pub trait Diagnostics {
    /// Whether `write` lines are recorded at all
    fn enabled(&self) -> bool;

    /// Record an audit line. Dropped when the sink is disabled.
    fn write(&self, line: &str);

    /// Record a non-fatal error. Always recorded.
    fn error(&self, line: &str);
}

/// Forwards trace lines to `tracing`
#[derive(Debug, Clone, Copy)]
pub struct TracingDiagnostics {
    enabled: bool,
}

impl TracingDiagnostics {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl Diagnostics for TracingDiagnostics {
    fn enabled(&self) -> bool {
        self.enabled
    }

    fn write(&self, line: &str) {
        if self.enabled {
            tracing::debug!(target: "tile_rogue::trace", "{}", line);
        }
    }

    fn error(&self, line: &str) {
        tracing::error!(target: "tile_rogue::trace", "{}", line);
    }
}

/// Records lines in memory, used by tests and the in-game debug log
#[derive(Debug, Clone, Default)]
pub struct MemoryDiagnostics {
    lines: Arc<Mutex<Vec<String>>>,
    errors: Arc<Mutex<Vec<String>>>,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl Diagnostics for MemoryDiagnostics {
    fn enabled(&self) -> bool {
        true
    }

    fn write(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }

    fn error(&self, line: &str) {
        if let Ok(mut errors) = self.errors.lock() {
            errors.push(line.to_string());
        }
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDiagnostics;

impl Diagnostics for NullDiagnostics {
    fn enabled(&self) -> bool {
        false
    }

    fn write(&self, _line: &str) {}

    fn error(&self, _line: &str) {}
}
