//! Database Client Trait and Core Types
//!
//! This module defines the contract dbwrap expects from a native driver.
//! Each engine (`MySQL`, `SQLite`) implements the [`Client`] trait over one
//! open connection.
//!
//! # Engine Isolation
//! Driver calls and value decoding live in the engine modules. The SQL the
//! wrapper itself issues for introspection, and the decoding of those
//! result rows, are defined here because they depend only on the dialect.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::dialect::Dialect;
use crate::error::{DbError, Result};
use crate::value::{Row, Value};

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(feature = "sqlite")]
pub mod sqlite;

/// Default `MySQL` TCP port
pub const DEFAULT_MYSQL_PORT: u16 = 3306;

/// Connection character set used when none is configured
pub const DEFAULT_ENCODING: &str = "utf8";

/// Supported database engine types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// `MySQL` database (includes `MariaDB`)
    MySQL,
    /// `SQLite` database
    SQLite,
}

impl DatabaseType {
    /// Get the engine name as a string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MySQL => "mysql",
            Self::SQLite => "sqlite",
        }
    }

    /// SQL dialect spoken by this engine
    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        match self {
            Self::MySQL => Dialect::MySql,
            Self::SQLite => Dialect::Sqlite,
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Connection configuration for database engines
///
/// Fields are engine-specific (e.g., `file` only applies to `SQLite`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database engine type
    pub engine: DatabaseType,

    /// Hostname (mysql)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Port number (mysql)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Unix socket path (mysql, alternative to host/port)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket: Option<String>,

    /// Username (mysql)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Password (mysql)
    /// WARNING: Sensitive data, do not log or include in error messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Database name (mysql)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    /// Database file path (sqlite), `:memory:` for an in-memory database
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// Connection character set, sent as `SET NAMES` (mysql)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

impl ConnectionConfig {
    /// Create a new `MySQL` connection config
    #[must_use]
    pub const fn mysql(
        host: String,
        port: u16,
        user: String,
        password: String,
        database: String,
    ) -> Self {
        Self {
            engine: DatabaseType::MySQL,
            host: Some(host),
            port: Some(port),
            socket: None,
            user: Some(user),
            password: Some(password),
            database: Some(database),
            file: None,
            encoding: None,
        }
    }

    /// Create a new `SQLite` connection config
    #[must_use]
    pub const fn sqlite(file: PathBuf) -> Self {
        Self {
            engine: DatabaseType::SQLite,
            host: None,
            port: None,
            socket: None,
            user: None,
            password: None,
            database: None,
            file: Some(file),
            encoding: None,
        }
    }

    /// Parse a PDO-style DSN
    ///
    /// - `mysql:host=localhost;dbname=testdb`
    /// - `mysql:host=localhost;port=3306;dbname=testdb;charset=utf8mb4`
    /// - `mysql:unix_socket=/tmp/mysql.sock;dbname=testdb`
    /// - `sqlite:/path/to/file.db`, `sqlite::memory:`
    pub fn from_dsn(dsn: &str, user: Option<&str>, password: Option<&str>) -> Result<Self> {
        let (scheme, rest) = dsn.trim().split_once(':').ok_or_else(|| {
            DbError::invalid_input("DSN must start with 'mysql:' or 'sqlite:'")
        })?;

        match scheme.to_ascii_lowercase().as_str() {
            "sqlite" => {
                if rest.is_empty() {
                    return Err(DbError::invalid_input("SQLite DSN requires a file path"));
                }
                Ok(Self::sqlite(PathBuf::from(rest)))
            }
            "mysql" => {
                let mut config = Self {
                    engine: DatabaseType::MySQL,
                    host: None,
                    port: None,
                    socket: None,
                    user: user.map(String::from),
                    password: password.map(String::from),
                    database: None,
                    file: None,
                    encoding: None,
                };

                for pair in rest.split(';').map(str::trim).filter(|p| !p.is_empty()) {
                    let (key, value) = pair.split_once('=').ok_or_else(|| {
                        DbError::invalid_input(format!("Malformed DSN segment '{pair}'"))
                    })?;
                    let value = value.trim().to_string();
                    match key.trim().to_ascii_lowercase().as_str() {
                        "host" => config.host = Some(value),
                        "port" => {
                            config.port = Some(value.parse().map_err(|_| {
                                DbError::invalid_input(format!("Invalid port '{value}' in DSN"))
                            })?);
                        }
                        "dbname" => config.database = Some(value),
                        "unix_socket" => config.socket = Some(value),
                        "charset" => config.encoding = Some(value),
                        other => {
                            return Err(DbError::invalid_input(format!(
                                "Unknown DSN key '{other}'"
                            )));
                        }
                    }
                }

                if config.host.is_none() && config.socket.is_none() {
                    return Err(DbError::invalid_input(
                        "MySQL DSN requires 'host' or 'unix_socket'",
                    ));
                }
                if config.host.is_some() && config.port.is_none() {
                    config.port = Some(DEFAULT_MYSQL_PORT);
                }
                Ok(config)
            }
            other => Err(DbError::invalid_input(format!("Unsupported DSN scheme '{other}'"))),
        }
    }

    /// Configured encoding, lowercased, or the default
    #[must_use]
    pub fn encoding_or_default(&self) -> String {
        self.encoding.as_deref().unwrap_or(DEFAULT_ENCODING).to_lowercase()
    }
}

/// Outcome of a statement that returns no rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Executed {
    /// Rows inserted, changed or removed
    pub rows_affected: u64,

    /// Auto-increment identifier generated by the statement, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_insert_id: Option<u64>,
}

/// Column description returned by [`crate::Db::show_fields`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    /// Column name
    pub name: String,

    /// Declared column type (engine-specific)
    pub data_type: String,

    /// Column is declared NOT NULL
    pub not_null: bool,

    /// Default value (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Column is part of the primary key
    pub primary: bool,

    /// Column is filled by auto-increment
    pub auto_increment: bool,
}

/// The contract dbwrap needs from a database driver
///
/// One implementation owns one open connection. Statements use positional
/// `?` placeholders. Failures are returned as [`DbError::QueryFailed`] with
/// the driver's diagnostics attached.
pub trait Client: Send {
    /// SQL dialect of the connected engine
    fn dialect(&self) -> Dialect;

    /// Prepare and execute a statement that returns no rows
    fn execute(
        &mut self,
        sql: &str,
        binds: &[Value],
    ) -> impl std::future::Future<Output = Result<Executed>> + Send;

    /// Prepare and execute a query, materializing every row
    ///
    /// With `buffered == false` the driver reads rows incrementally instead of
    /// buffering the whole result set first, where it supports doing so.
    fn fetch(
        &mut self,
        sql: &str,
        binds: &[Value],
        buffered: bool,
    ) -> impl std::future::Future<Output = Result<Vec<Row>>> + Send;

    /// Execute raw SQL text without preparing it; returns affected rows
    fn exec_raw(&mut self, sql: &str) -> impl std::future::Future<Output = Result<u64>> + Send;

    /// Quote `text` as a string literal the way the driver escapes it for
    /// the current session
    fn quote(&self, text: &str) -> Result<String>;

    /// Close the connection
    fn close(self) -> impl std::future::Future<Output = Result<()>> + Send
    where
        Self: Sized;
}

// ============================================================================
// Introspection
// ============================================================================

/// SQL listing the tables of `dbname`
#[must_use]
pub fn show_tables_sql(dialect: Dialect, dbname: &str) -> String {
    match dialect {
        Dialect::MySql => format!("SHOW TABLES FROM {}", dialect.quote_ident(dbname)),
        Dialect::Sqlite => format!(
            "SELECT name FROM {}.sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            dialect.quote_ident(dbname)
        ),
    }
}

/// SQL describing the columns of `table`
#[must_use]
pub fn show_fields_sql(dialect: Dialect, table: &str) -> String {
    match dialect {
        Dialect::MySql => format!("SHOW COLUMNS FROM {table}"),
        Dialect::Sqlite => format!("PRAGMA table_info({table})"),
    }
}

/// Decode one row of `SHOW COLUMNS` / `PRAGMA table_info` output
pub fn parse_field_row(dialect: Dialect, row: &Row) -> Result<FieldInfo> {
    let text = |column: &str| -> Result<String> {
        row.get(column)
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| {
                DbError::engine_error(
                    dialect.to_string(),
                    format!("Failed to extract '{column}' from column description"),
                )
            })
    };
    let optional_text = |column: &str| -> Option<String> {
        row.get(column).filter(|v| !v.is_null()).map(|v| match v.as_str() {
            Some(s) => s.to_string(),
            None => v.to_json().to_string(),
        })
    };

    match dialect {
        Dialect::MySql => Ok(FieldInfo {
            name: text("Field")?,
            data_type: text("Type")?,
            not_null: text("Null")?.eq_ignore_ascii_case("NO"),
            default: optional_text("Default"),
            primary: text("Key")?.eq_ignore_ascii_case("PRI"),
            auto_increment: optional_text("Extra")
                .is_some_and(|extra| extra.to_lowercase().contains("auto_increment")),
        }),
        Dialect::Sqlite => {
            let data_type = text("type")?;
            let primary = row.get("pk").and_then(Value::as_i64).unwrap_or(0) > 0;
            Ok(FieldInfo {
                name: text("name")?,
                // An INTEGER PRIMARY KEY aliases the rowid and auto-assigns
                auto_increment: primary && data_type.eq_ignore_ascii_case("INTEGER"),
                data_type,
                not_null: row.get("notnull").and_then(Value::as_i64).unwrap_or(0) != 0,
                default: optional_text("dflt_value"),
                primary,
            })
        }
    }
}

/// Decode a full column description result, keyed by column name
pub fn parse_field_rows(dialect: Dialect, rows: &[Row]) -> Result<IndexMap<String, FieldInfo>> {
    let mut fields = rows
        .iter()
        .map(|row| parse_field_row(dialect, row).map(|info| (info.name.clone(), info)))
        .collect::<Result<IndexMap<_, _>>>()?;

    // Only a single-column INTEGER PRIMARY KEY is a rowid alias
    if dialect == Dialect::Sqlite && fields.values().filter(|f| f.primary).count() > 1 {
        for field in fields.values_mut() {
            field.auto_increment = false;
        }
    }

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    #[test]
    fn test_database_type_serialization() {
        assert_eq!(serde_json::to_string(&DatabaseType::MySQL).unwrap(), r#""mysql""#);
        assert_eq!(serde_json::to_string(&DatabaseType::SQLite).unwrap(), r#""sqlite""#);
        assert_eq!(DatabaseType::MySQL.dialect(), Dialect::MySql);
    }

    #[test]
    fn test_connection_config_constructors() {
        let mysql_config = ConnectionConfig::mysql(
            "localhost".to_string(),
            3306,
            "user".to_string(),
            "pass".to_string(),
            "db".to_string(),
        );
        assert_eq!(mysql_config.engine, DatabaseType::MySQL);
        assert_eq!(mysql_config.port, Some(3306));
        assert_eq!(mysql_config.encoding_or_default(), "utf8");

        let sqlite_config = ConnectionConfig::sqlite(PathBuf::from("/tmp/test.db"));
        assert_eq!(sqlite_config.engine, DatabaseType::SQLite);
        assert!(sqlite_config.file.is_some());
    }

    #[test]
    fn test_from_dsn_mysql_host() {
        let config = ConnectionConfig::from_dsn(
            "mysql:host=localhost;dbname=testdb;charset=UTF8MB4",
            Some("root"),
            Some("secret"),
        )
        .unwrap();
        assert_eq!(config.engine, DatabaseType::MySQL);
        assert_eq!(config.host.as_deref(), Some("localhost"));
        assert_eq!(config.port, Some(DEFAULT_MYSQL_PORT));
        assert_eq!(config.database.as_deref(), Some("testdb"));
        assert_eq!(config.user.as_deref(), Some("root"));
        assert_eq!(config.encoding_or_default(), "utf8mb4");
    }

    #[test]
    fn test_from_dsn_mysql_port_and_socket() {
        let config =
            ConnectionConfig::from_dsn("mysql:host=db;port=3307;dbname=x", None, None).unwrap();
        assert_eq!(config.port, Some(3307));

        let config =
            ConnectionConfig::from_dsn("mysql:unix_socket=/tmp/mysql.sock;dbname=x", None, None)
                .unwrap();
        assert_eq!(config.socket.as_deref(), Some("/tmp/mysql.sock"));
        assert!(config.host.is_none());
        assert!(config.port.is_none());
    }

    #[test]
    fn test_from_dsn_sqlite() {
        let config = ConnectionConfig::from_dsn("sqlite::memory:", None, None).unwrap();
        assert_eq!(config.file, Some(PathBuf::from(":memory:")));

        let config = ConnectionConfig::from_dsn("sqlite:/var/db/app.db", None, None).unwrap();
        assert_eq!(config.file, Some(PathBuf::from("/var/db/app.db")));
    }

    #[test]
    fn test_from_dsn_errors() {
        for dsn in [
            "localhost",
            "pgsql:host=x",
            "mysql:dbname=x",
            "mysql:host=x;port=abc",
            "mysql:host=x;bogus=1",
            "mysql:host",
            "sqlite:",
        ] {
            let err = ConnectionConfig::from_dsn(dsn, None, None).unwrap_err();
            assert!(matches!(err, DbError::InvalidInput(_)), "{dsn}: {err}");
        }
    }

    #[test]
    fn test_show_sql() {
        assert_eq!(show_tables_sql(Dialect::MySql, "shop"), "SHOW TABLES FROM `shop`");
        assert_eq!(
            show_tables_sql(Dialect::Sqlite, "main"),
            "SELECT name FROM \"main\".sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
        );
        assert_eq!(show_fields_sql(Dialect::MySql, "message"), "SHOW COLUMNS FROM message");
        assert_eq!(show_fields_sql(Dialect::Sqlite, "message"), "PRAGMA table_info(message)");
    }

    #[test]
    fn test_parse_mysql_show_columns() {
        let rows = vec![
            row(&[
                ("Field", Value::from("id")),
                ("Type", Value::from("int(11) unsigned")),
                ("Null", Value::from("NO")),
                ("Key", Value::from("PRI")),
                ("Default", Value::Null),
                ("Extra", Value::from("auto_increment")),
            ]),
            row(&[
                ("Field", Value::from("title")),
                ("Type", Value::from("varchar(255)")),
                ("Null", Value::from("YES")),
                ("Key", Value::from("")),
                ("Default", Value::from("untitled")),
                ("Extra", Value::from("")),
            ]),
        ];
        let fields = parse_field_rows(Dialect::MySql, &rows).unwrap();
        assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["id", "title"]);

        let id = &fields["id"];
        assert!(id.not_null && id.primary && id.auto_increment);
        assert_eq!(id.default, None);

        let title = &fields["title"];
        assert!(!title.not_null && !title.primary && !title.auto_increment);
        assert_eq!(title.default.as_deref(), Some("untitled"));
    }

    #[test]
    fn test_parse_sqlite_table_info() {
        let info = parse_field_row(
            Dialect::Sqlite,
            &row(&[
                ("cid", Value::Int(0)),
                ("name", Value::from("id")),
                ("type", Value::from("INTEGER")),
                ("notnull", Value::Int(0)),
                ("dflt_value", Value::Null),
                ("pk", Value::Int(1)),
            ]),
        )
        .unwrap();
        assert!(info.primary && info.auto_increment);
        assert!(!info.not_null);
    }

    #[test]
    fn test_sqlite_composite_key_is_not_auto_increment() {
        let column = |cid: i64, name: &str, pk: i64| {
            row(&[
                ("cid", Value::Int(cid)),
                ("name", Value::from(name)),
                ("type", Value::from("INTEGER")),
                ("notnull", Value::Int(1)),
                ("dflt_value", Value::Null),
                ("pk", Value::Int(pk)),
            ])
        };

        let composite = parse_field_rows(
            Dialect::Sqlite,
            &[column(0, "a", 1), column(1, "b", 2), column(2, "n", 0)],
        )
        .unwrap();
        assert!(composite["a"].primary && composite["b"].primary);
        assert!(composite.values().all(|f| !f.auto_increment));

        let single = parse_field_rows(Dialect::Sqlite, &[column(0, "id", 1), column(1, "n", 0)])
            .unwrap();
        assert!(single["id"].auto_increment);
        assert!(!single["n"].auto_increment);
    }

    #[test]
    fn test_parse_field_row_missing_column() {
        let err = parse_field_row(Dialect::MySql, &row(&[("Field", Value::from("id"))]))
            .unwrap_err();
        assert!(err.message().contains("'Type'"));
    }
}
