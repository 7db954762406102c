//! JSON Output Envelope Types
//!
//! This module defines the structured JSON output of the `dbwrap` binary.
//! Every command prints exactly one envelope to stdout.
//!
//! # Output Contract
//! - Success: `{"ok": true, "engine": "...", "command": "...", "data": {...}, "meta": {...}}`
//! - Error: `{"ok": false, "engine": "...", "command": "...", "error": {...}}` with
//!   `error` holding `{"code": "...", "message": "..."}`
//!
//! Driver failures additionally carry `error.driver` with the SQLSTATE triple.

use serde::{Deserialize, Serialize};

use crate::error::{DbError, DriverErrorInfo};

/// Success envelope for operation results
///
/// Generic over the data type to support different operation return values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessEnvelope<T> {
    /// Always true for success envelopes
    pub ok: bool,

    /// Database engine used for this operation (mysql, sqlite)
    pub engine: String,

    /// Command that was executed (connect, tables, fields, query, exec)
    pub command: String,

    /// Operation-specific data
    pub data: T,

    /// Execution metadata
    pub meta: Metadata,
}

impl<T> SuccessEnvelope<T> {
    pub fn new(
        engine: impl Into<String>,
        command: impl Into<String>,
        data: T,
        meta: Metadata,
    ) -> Self {
        Self { ok: true, engine: engine.into(), command: command.into(), data, meta }
    }
}

/// Error envelope for operation failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Always false for error envelopes
    pub ok: bool,

    /// Database engine (empty string if the failure happened before one was chosen)
    pub engine: String,

    /// Command that was attempted
    pub command: String,

    pub error: ErrorInfo,
}

impl ErrorEnvelope {
    pub fn new(engine: impl Into<String>, command: impl Into<String>, error: ErrorInfo) -> Self {
        Self { ok: false, engine: engine.into(), command: command.into(), error }
    }

    /// Create error envelope from a [`DbError`]
    pub fn from_error(
        engine: impl Into<String>,
        command: impl Into<String>,
        err: &DbError,
    ) -> Self {
        Self::new(engine, command, ErrorInfo::from(err))
    }
}

/// Error information structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable error code (e.g., "QUERY_FAILED", "EMPTY_CONDITION")
    pub code: String,

    /// Human-readable error message (no credentials)
    pub message: String,

    /// Driver diagnostics, for connection and execution failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<DriverErrorInfo>,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into(), driver: None }
    }
}

impl From<&DbError> for ErrorInfo {
    fn from(err: &DbError) -> Self {
        Self {
            code: err.error_code().to_string(),
            message: err.message(),
            driver: err.driver_info().cloned(),
        }
    }
}

/// Execution metadata included in all success responses
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    /// Execution time in milliseconds
    pub execution_ms: u64,

    /// Number of rows returned (queries and listings)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_returned: Option<usize>,

    /// Number of rows changed (exec)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
}

impl Metadata {
    #[must_use]
    pub fn new(execution_ms: u64) -> Self {
        Self { execution_ms, ..Self::default() }
    }

    #[must_use]
    pub fn with_rows(execution_ms: u64, rows_returned: usize) -> Self {
        Self { execution_ms, rows_returned: Some(rows_returned), ..Self::default() }
    }

    #[must_use]
    pub fn with_affected(execution_ms: u64, rows_affected: u64) -> Self {
        Self { execution_ms, rows_affected: Some(rows_affected), ..Self::default() }
    }
}
