//! Error Handling Infrastructure
//!
//! This module defines all error types used throughout dbwrap.
//! All errors are structured and map to specific error codes for JSON output.
//!
//! # Error Categories
//! - `ConnectionFailed`: the driver could not establish a connection
//! - `QueryFailed`: prepare/execute failures reported by the driver
//! - `EmptyMutation`: insert/update called without any field values
//! - `EmptyCondition`: delete (or update) called without a usable condition
//! - `InvalidInput`: malformed input or missing required parameters
//! - `EngineError`: engine-specific failures outside statement execution
//! - `ConfigError`: configuration file or connection registry errors

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// SQLSTATE reported when the last operation succeeded.
pub const SQLSTATE_OK: &str = "00000";

/// SQLSTATE used when a driver reports a failure without one.
pub const SQLSTATE_GENERAL: &str = "HY000";

/// Diagnostics reported by the database driver for a failed operation
///
/// Mirrors the classic `(SQLSTATE, driver code, message)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverErrorInfo {
    /// Five-character SQLSTATE
    pub sqlstate: String,

    /// Driver-specific numeric error code (e.g. MySQL 1146, SQLite extended code)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,

    /// Driver message
    pub message: String,
}

impl DriverErrorInfo {
    pub fn new(sqlstate: impl Into<String>, code: Option<i64>, message: impl Into<String>) -> Self {
        Self { sqlstate: sqlstate.into(), code, message: message.into() }
    }

    /// Failure without a SQLSTATE of its own
    pub fn general(message: impl Into<String>) -> Self {
        Self::new(SQLSTATE_GENERAL, None, message)
    }

    /// Attach a driver-specific code
    #[must_use]
    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    /// The "no error" triple
    #[must_use]
    pub fn ok() -> Self {
        Self::new(SQLSTATE_OK, None, "")
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.sqlstate == SQLSTATE_OK
    }
}

impl Default for DriverErrorInfo {
    fn default() -> Self {
        Self::ok()
    }
}

/// Main error type for dbwrap operations
#[derive(Error, Debug)]
pub enum DbError {
    /// Database connection failed
    #[error("Could not connect database: {}", .0.message)]
    ConnectionFailed(DriverErrorInfo),

    /// Statement preparation or execution failed
    #[error("Query execution failed: {}", .0.message)]
    QueryFailed(DriverErrorInfo),

    /// Insert/update without field values
    #[error("Empty mutation: {0}")]
    EmptyMutation(String),

    /// Delete/update without a usable condition
    #[error("Empty condition: {0}")]
    EmptyCondition(String),

    /// Invalid input or missing required parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Engine-specific database error
    #[error("Engine error ({engine}): {detail}")]
    EngineError { engine: String, detail: String },

    /// Configuration error (file not found, invalid JSON, etc.)
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DbError {
    /// Convert error to error code string for JSON output
    ///
    /// Error codes are stable and suitable for programmatic handling.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::ConnectionFailed(_) => "CONNECTION_FAILED",
            Self::QueryFailed(_) => "QUERY_FAILED",
            Self::EmptyMutation(_) => "EMPTY_MUTATION",
            Self::EmptyCondition(_) => "EMPTY_CONDITION",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::EngineError { .. } => "ENGINE_ERROR",
            Self::ConfigError(_) => "CONFIG_ERROR",
        }
    }

    /// Get human-readable error message
    ///
    /// Does not contain credentials.
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Driver diagnostics carried by connection and execution failures
    #[must_use]
    pub const fn driver_info(&self) -> Option<&DriverErrorInfo> {
        match self {
            Self::ConnectionFailed(info) | Self::QueryFailed(info) => Some(info),
            _ => None,
        }
    }

    /// Create a connection failed error without driver diagnostics
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed(DriverErrorInfo::general(message))
    }

    /// Create a query failed error without driver diagnostics
    pub fn query_failed(message: impl Into<String>) -> Self {
        Self::QueryFailed(DriverErrorInfo::general(message))
    }

    /// Create an empty mutation error
    pub fn empty_mutation(message: impl Into<String>) -> Self {
        Self::EmptyMutation(message.into())
    }

    /// Create an empty condition error
    pub fn empty_condition(message: impl Into<String>) -> Self {
        Self::EmptyCondition(message.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an engine-specific error
    pub fn engine_error(engine: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::EngineError { engine: engine.into(), detail: detail.into() }
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }
}

/// Result type alias for dbwrap operations
pub type Result<T> = std::result::Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(DbError::connection_failed("test").error_code(), "CONNECTION_FAILED");
        assert_eq!(DbError::query_failed("test").error_code(), "QUERY_FAILED");
        assert_eq!(DbError::empty_mutation("test").error_code(), "EMPTY_MUTATION");
        assert_eq!(DbError::empty_condition("test").error_code(), "EMPTY_CONDITION");
        assert_eq!(DbError::invalid_input("test").error_code(), "INVALID_INPUT");
        assert_eq!(DbError::engine_error("mysql", "test").error_code(), "ENGINE_ERROR");
        assert_eq!(DbError::config_error("test").error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_error_messages() {
        let err = DbError::connection_failed("Access denied for user 'root'");
        assert!(err.message().starts_with("Could not connect database"));
        assert!(err.message().contains("Access denied"));

        let err = DbError::engine_error("sqlite", "unsupported column type");
        assert!(err.message().contains("sqlite"));
        assert!(err.message().contains("unsupported column type"));
    }

    #[test]
    fn test_driver_info_preserved() {
        let info = DriverErrorInfo::new("42S02", Some(1146), "Table 'test.nope' doesn't exist");
        let err = DbError::QueryFailed(info.clone());
        assert_eq!(err.driver_info(), Some(&info));
        assert!(err.message().contains("doesn't exist"));

        assert!(DbError::empty_condition("delete").driver_info().is_none());
    }

    #[test]
    fn test_general_driver_info() {
        let err = DbError::query_failed("boom");
        let info = err.driver_info().unwrap();
        assert_eq!(info.sqlstate, SQLSTATE_GENERAL);
        assert!(info.code.is_none());
        assert!(!info.is_ok());
        assert!(DriverErrorInfo::default().is_ok());
    }
}
