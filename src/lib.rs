//! dbwrap - Thin Convenience Wrapper over Relational Database Clients
//!
//! dbwrap sits on top of a native driver (`mysql_async`, `rusqlite`) and adds
//! parameter-bound CRUD helpers, fetch variants, schema listing, statement
//! logging and last-error tracking. It never parses or validates SQL; table
//! names, literal conditions and raw SQL are passed through verbatim.
//!
//! # Core Principles
//! - Every value travels as a positional `?` bind, never as SQL text
//! - Field order in, placeholder order and bind order out
//! - No implicit "all rows": updating every row needs [`Condition::AllRows`],
//!   deleting every row is refused
//!
//! # Module Organization
//! - [`builder`] - Parameterized mutation builder and statement renderers
//! - [`dialect`] - Identifier quoting and statement shapes per engine
//! - [`value`] - Bind values, field mappings and result rows
//! - [`engine`] - Database client trait and driver implementations
//! - [`db`] - The [`Db`] wrapper
//! - [`log`] - Statement observers
//! - [`error`] - Error types and handling
//! - [`config`] - Connection registry
//! - [`output`] - JSON output envelope types for the CLI
//!
//! # Example
//! ```
//! use dbwrap::{build, Dialect, Fields, Value};
//!
//! let fields = Fields::new().set("name", "Alice").set("age", 30);
//! let fragment = build(&fields, ",", Dialect::MySql);
//! assert_eq!(fragment.sql, "`name`=? , `age`=?");
//! assert_eq!(fragment.binds, vec![Value::from("Alice"), Value::Int(30)]);
//! ```

pub mod builder;
pub mod config;
pub mod db;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod log;
pub mod output;
pub mod value;

pub use builder::{
    build, delete_statement, insert_statement, paginate, placeholder, update_statement,
    Condition, DeleteOptions, Fragment, InsertOptions, Statement, UpdateOptions,
};
pub use config::{
    list_connections, load_with_precedence, resolve_connection, save_connection, ConfigLocation,
    ConnectionRegistry, StoredConnection,
};
pub use db::{ColumnRef, Db, FetchOptions};
pub use dialect::Dialect;
pub use engine::{Client, ConnectionConfig, DatabaseType, Executed, FieldInfo};
pub use error::{DbError, DriverErrorInfo, Result};
pub use log::{LogEntry, QueryLog, QueryObserver, TracingObserver};
pub use output::{ErrorEnvelope, ErrorInfo, Metadata, SuccessEnvelope};
pub use value::{Fields, Row, Value};

#[cfg(feature = "mysql")]
pub use engine::mysql::MySqlClient;
#[cfg(feature = "sqlite")]
pub use engine::sqlite::SqliteClient;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_exports() {
        let _ = DatabaseType::MySQL.dialect();
        let _ = FetchOptions::default();
        let _ = QueryLog::new();
        assert_eq!(placeholder("id", Dialect::MySql), "`id`=?");
        assert_eq!(DriverErrorInfo::default().sqlstate, "00000");
    }
}
