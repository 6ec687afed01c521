//! Shared in-memory audit log.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::entry::LogEntry;

/// Append-only log shared by every component that talks to the outside world.
///
/// Cloning the handle is cheap; all clones observe the same entries.
#[derive(Clone, Default)]
pub struct AuditLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditLog")
            .field("entries", &self.len())
            .finish()
    }
}

impl AuditLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogEntry>> {
        // Entries are only ever pushed, so a poisoned guard still holds a
        // consistent vector.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends an entry. This is the only mutator.
    pub fn append(&self, entry: LogEntry) {
        debug!(
            backend = entry.backend(),
            error = entry.is_error(),
            "audit entry appended"
        );
        self.lock().push(entry);
    }

    /// Returns every entry in insertion order.
    #[must_use]
    pub fn dump(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    /// Returns only the failed interactions, in insertion order.
    #[must_use]
    pub fn failures(&self) -> Vec<LogEntry> {
        self.lock()
            .iter()
            .filter(|entry| entry.is_error())
            .cloned()
            .collect()
    }

    /// Number of recorded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` when nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Renders the full log for printing.
    #[must_use]
    pub fn render(&self) -> String {
        let entries = self.lock();
        if entries.is_empty() {
            return "=== INTERACTION LOG ===\n(no interactions yet)\n".to_owned();
        }
        let mut out = String::from("=== INTERACTION LOG ===\n");
        for entry in entries.iter() {
            out.push_str(&entry.render());
            out.push('\n');
        }
        out
    }
}
