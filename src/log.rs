//! Statement logging
//!
//! Every statement a [`crate::Db`] sends is reported to its observers before
//! execution. [`QueryLog`] is the in-memory collector, [`TracingObserver`]
//! forwards to `tracing` at info level, and closures work too.
//!
//! ```
//! use dbwrap::{LogEntry, QueryLog, QueryObserver, Value};
//!
//! let log = QueryLog::new();
//! log.on_statement(&LogEntry::new("SELECT 1", vec![]));
//! log.on_statement(&LogEntry::new("SELECT * FROM t WHERE id = ?", vec![Value::Int(3)]));
//! assert_eq!(log.lines(), vec![
//!     "SQL: SELECT 1".to_string(),
//!     "SQL: SELECT * FROM t WHERE id = ?\nParam: [3]".to_string(),
//! ]);
//! ```

use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::value::Value;

/// One executed statement and a snapshot of its binds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub sql: String,
    pub binds: Vec<Value>,
}

impl LogEntry {
    pub fn new(sql: impl Into<String>, binds: Vec<Value>) -> Self {
        Self { sql: sql.into(), binds }
    }

    /// Binds serialized as a JSON array
    #[must_use]
    pub fn binds_json(&self) -> String {
        serde_json::to_string(&self.binds).unwrap_or_else(|_| "[]".to_string())
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SQL: {}", self.sql)?;
        if !self.binds.is_empty() {
            write!(f, "\nParam: {}", self.binds_json())?;
        }
        Ok(())
    }
}

/// Receives every statement before it is executed
pub trait QueryObserver: Send + Sync {
    fn on_statement(&self, entry: &LogEntry);
}

impl<F> QueryObserver for F
where
    F: Fn(&LogEntry) + Send + Sync,
{
    fn on_statement(&self, entry: &LogEntry) {
        self(entry);
    }
}

/// Append-only in-memory statement log
///
/// Clones share the same storage, so keep one handle and give another to the
/// wrapper.
#[derive(Debug, Clone, Default)]
pub struct QueryLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl QueryLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries, oldest first
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Entries rendered as `SQL: ...` / `Param: ...` text
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.entries.lock().iter().map(ToString::to_string).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl QueryObserver for QueryLog {
    fn on_statement(&self, entry: &LogEntry) {
        self.entries.lock().push(entry.clone());
    }
}

/// Emits each statement as an info event on target `dbwrap::sql`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl QueryObserver for TracingObserver {
    fn on_statement(&self, entry: &LogEntry) {
        if entry.binds.is_empty() {
            tracing::info!(target: "dbwrap::sql", sql = %entry.sql);
        } else {
            tracing::info!(target: "dbwrap::sql", sql = %entry.sql, params = %entry.binds_json());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_entry_display_without_binds() {
        let entry = LogEntry::new("SHOW TABLES", vec![]);
        assert_eq!(entry.to_string(), "SQL: SHOW TABLES");
    }

    #[test]
    fn test_entry_display_with_binds() {
        let entry = LogEntry::new(
            "INSERT INTO m SET `a`=? , `b`=?",
            vec![Value::from("x"), Value::Text(String::new())],
        );
        assert_eq!(entry.to_string(), "SQL: INSERT INTO m SET `a`=? , `b`=?\nParam: [\"x\",\"\"]");
    }

    #[test]
    fn test_query_log_clones_share_storage() {
        let log = QueryLog::new();
        let handle = log.clone();
        handle.on_statement(&LogEntry::new("SELECT 1", vec![]));
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].sql, "SELECT 1");
        log.clear();
        assert!(handle.is_empty());
    }

    #[test]
    fn test_closure_observer() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let observer = move |_: &LogEntry| {
            counter.fetch_add(1, Ordering::SeqCst);
        };
        observer.on_statement(&LogEntry::new("SELECT 1", vec![]));
        observer.on_statement(&LogEntry::new("SELECT 2", vec![]));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
