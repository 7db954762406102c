//! `SQLite` Client Implementation
//!
//! This module implements the [`Client`] trait for `SQLite` databases.
//!
//! # Implementation Notes
//! - Uses `rusqlite` (synchronous driver, no async needed)
//! - File-based (`/path/to/db.sqlite`) and in-memory (`:memory:`) databases
//! - Statements go through the prepared statement cache
//! - `buffered` has no effect: rows are always stepped one at a time

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags};

use crate::dialect::Dialect;
use crate::engine::{Client, ConnectionConfig, DatabaseType, Executed};
use crate::error::{DbError, DriverErrorInfo, Result};
use crate::value::{Row, Value};

/// One open `SQLite` connection
pub struct SqliteClient {
    conn: Connection,
}

impl SqliteClient {
    /// Open the database file named by `config`, creating it if missing
    pub fn connect(config: &ConnectionConfig) -> Result<Self> {
        if config.engine != DatabaseType::SQLite {
            return Err(DbError::invalid_input(format!(
                "Expected SQLite engine, got {}",
                config.engine
            )));
        }

        let file_path = config
            .file
            .as_ref()
            .ok_or_else(|| DbError::invalid_input("SQLite requires 'file' parameter"))?;

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(file_path, flags).map_err(|e| {
            tracing::error!(error = %e, "sqlite open failed");
            DbError::ConnectionFailed(driver_error_info(&e))
        })?;

        tracing::debug!(file = %file_path.display(), "sqlite opened");
        Ok(Self { conn })
    }

    /// Wrap an already open connection
    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Fresh in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Connection::open_in_memory()
            .map(Self::from_connection)
            .map_err(|e| DbError::ConnectionFailed(driver_error_info(&e)))
    }

    /// Borrow the underlying driver connection
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Rows changed directly by the last statement, or 0 when it changed none
    ///
    /// `changes()` keeps the count of the last INSERT/UPDATE/DELETE across DDL
    /// and queries, so it is only read when the connection total moved.
    fn changes_since(&self, total_before: u64) -> u64 {
        if self.conn.total_changes() == total_before {
            0
        } else {
            self.conn.changes()
        }
    }
}

fn is_insert(sql: &str) -> bool {
    sql.split_whitespace().next().is_some_and(|keyword| {
        keyword.eq_ignore_ascii_case("INSERT") || keyword.eq_ignore_ascii_case("REPLACE")
    })
}

impl Client for SqliteClient {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&mut self, sql: &str, binds: &[Value]) -> Result<Executed> {
        let before = self.conn.total_changes();
        let mut stmt = self.conn.prepare_cached(sql).map_err(query_error)?;
        let mut rows = stmt.query(params_from_iter(binds.iter())).map_err(query_error)?;
        while rows.next().map_err(query_error)?.is_some() {}
        drop(rows);
        drop(stmt);

        let changed = self.changes_since(before);
        let last_insert_id = if changed > 0 && is_insert(sql) {
            u64::try_from(self.conn.last_insert_rowid()).ok()
        } else {
            None
        };

        Ok(Executed { rows_affected: changed, last_insert_id })
    }

    async fn fetch(&mut self, sql: &str, binds: &[Value], _buffered: bool) -> Result<Vec<Row>> {
        let mut stmt = self.conn.prepare_cached(sql).map_err(query_error)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query(params_from_iter(binds.iter())).map_err(query_error)?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(query_error)? {
            let mut record = Row::with_capacity(columns.len());
            for (idx, name) in columns.iter().enumerate() {
                let value = row.get_ref(idx).map_err(|e| {
                    DbError::engine_error("sqlite", format!("Failed to read column {name}: {e}"))
                })?;
                record.insert(name.clone(), from_value_ref(value));
            }
            records.push(record);
        }

        Ok(records)
    }

    async fn exec_raw(&mut self, sql: &str) -> Result<u64> {
        let before = self.conn.total_changes();
        self.conn.execute_batch(sql).map_err(query_error)?;
        Ok(self.changes_since(before))
    }

    fn quote(&self, text: &str) -> Result<String> {
        self.conn
            .prepare_cached("SELECT quote(?1)")
            .and_then(|mut stmt| stmt.query_row([text], |row| row.get(0)))
            .map_err(query_error)
    }

    async fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| {
            DbError::engine_error("sqlite", format!("Failed to close connection: {e}"))
        })
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as SqlValue;

        Ok(match self {
            Self::Null => ToSqlOutput::Owned(SqlValue::Null),
            Self::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Self::Int(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Self::UInt(u) => ToSqlOutput::Owned(SqlValue::Integer(
                i64::try_from(*u)
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
            )),
            Self::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Self::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Self::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
            Ok(s) => Value::Text(s.to_string()),
            Err(_) => Value::Bytes(bytes.to_vec()),
        },
        ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
    }
}

fn driver_error_info(e: &rusqlite::Error) -> DriverErrorInfo {
    match e {
        rusqlite::Error::SqliteFailure(err, message) => DriverErrorInfo::general(
            message.clone().unwrap_or_else(|| err.to_string()),
        )
        .with_code(i64::from(err.extended_code)),
        other => DriverErrorInfo::general(other.to_string()),
    }
}

fn query_error(e: rusqlite::Error) -> DbError {
    DbError::QueryFailed(driver_error_info(&e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_execute_and_fetch() {
        let mut client = SqliteClient::open_in_memory().unwrap();
        client
            .exec_raw("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT, data BLOB)")
            .await
            .unwrap();

        let done = client
            .execute(
                "INSERT INTO t (name, data) VALUES (?, ?)",
                &[Value::from("a"), Value::Bytes(vec![1, 2])],
            )
            .await
            .unwrap();
        assert_eq!(done, Executed { rows_affected: 1, last_insert_id: Some(1) });

        let rows = client.fetch("SELECT id, name, data FROM t", &[], true).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].keys().collect::<Vec<_>>(), vec!["id", "name", "data"]);
        assert_eq!(rows[0]["id"], Value::Int(1));
        assert_eq!(rows[0]["data"], Value::Bytes(vec![1, 2]));
    }

    #[tokio::test]
    async fn test_update_has_no_insert_id() {
        let mut client = SqliteClient::open_in_memory().unwrap();
        client.exec_raw("CREATE TABLE t (id INTEGER PRIMARY KEY, n INTEGER)").await.unwrap();
        client.execute("INSERT INTO t (n) VALUES (?)", &[Value::Int(1)]).await.unwrap();

        let done = client.execute("UPDATE t SET n = ?", &[Value::Int(2)]).await.unwrap();
        assert_eq!(done, Executed { rows_affected: 1, last_insert_id: None });
    }

    #[tokio::test]
    async fn test_failure_carries_driver_info() {
        let mut client = SqliteClient::open_in_memory().unwrap();
        let err = client.fetch("SELECT * FROM missing", &[], true).await.unwrap_err();
        let info = err.driver_info().expect("driver info");
        assert!(info.message.contains("no such table"));
        assert!(info.code.is_some());
    }

    #[tokio::test]
    async fn test_ddl_after_insert_reports_no_changes() {
        let mut client = SqliteClient::open_in_memory().unwrap();
        client.exec_raw("CREATE TABLE t (n INTEGER)").await.unwrap();

        let inserted = client.exec_raw("INSERT INTO t (n) VALUES (1), (2), (3)").await.unwrap();
        assert_eq!(inserted, 3);

        let ddl = client.exec_raw("CREATE TABLE u (x INTEGER)").await.unwrap();
        assert_eq!(ddl, 0);

        let done = client.execute("CREATE INDEX t_n ON t (n)", &[]).await.unwrap();
        assert_eq!(done, Executed { rows_affected: 0, last_insert_id: None });
    }

    #[tokio::test]
    async fn test_execute_accepts_row_returning_statements() {
        let mut client = SqliteClient::open_in_memory().unwrap();
        client.exec_raw("CREATE TABLE t (n INTEGER)").await.unwrap();
        client.exec_raw("INSERT INTO t (n) VALUES (1), (2)").await.unwrap();

        let done = client.execute("SELECT ?", &[Value::Int(1)]).await.unwrap();
        assert_eq!(done, Executed { rows_affected: 0, last_insert_id: None });

        let done = client.execute("SELECT n FROM t WHERE n > ?", &[Value::Int(0)]).await.unwrap();
        assert_eq!(done.rows_affected, 0);
    }

    #[tokio::test]
    async fn test_insert_id_with_newline_after_keyword() {
        let mut client = SqliteClient::open_in_memory().unwrap();
        client.exec_raw("CREATE TABLE t (id INTEGER PRIMARY KEY, n INTEGER)").await.unwrap();

        let done = client.execute("INSERT\nINTO t (n) VALUES (?)", &[Value::Int(5)]).await.unwrap();
        assert_eq!(done.last_insert_id, Some(1));

        let done = client
            .execute("replace\tINTO t (id, n) VALUES (1, ?)", &[Value::Int(6)])
            .await
            .unwrap();
        assert_eq!(done.last_insert_id, Some(1));

        assert!(!is_insert("INSERTED"));
        assert!(!is_insert("  "));
    }

    #[tokio::test]
    async fn test_invalid_utf8_text_decodes_as_bytes() {
        let mut client = SqliteClient::open_in_memory().unwrap();
        let rows = client
            .fetch("SELECT CAST(x'ff61' AS TEXT) AS t, 'ok' AS s", &[], true)
            .await
            .unwrap();
        assert_eq!(rows[0]["t"], Value::Bytes(vec![0xff, 0x61]));
        assert_eq!(rows[0]["s"], Value::from("ok"));
    }

    #[test]
    fn test_quote_uses_sqlite() {
        let client = SqliteClient::open_in_memory().unwrap();
        assert_eq!(client.quote("it's").unwrap(), "'it''s'");
        assert_eq!(client.quote("a\\b").unwrap(), "'a\\b'");
    }

    #[test]
    fn test_uint_overflow_is_rejected() {
        assert!(Value::UInt(u64::MAX).to_sql().is_err());
        assert!(Value::UInt(5).to_sql().is_ok());
    }

    #[test]
    fn test_connect_wrong_engine() {
        let mut config = ConnectionConfig::sqlite("/tmp/x.db".into());
        config.engine = DatabaseType::MySQL;
        let err = SqliteClient::connect(&config).err().expect("must fail");
        assert!(err.message().contains("Expected SQLite engine"));
    }
}
