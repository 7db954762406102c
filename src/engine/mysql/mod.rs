//! MySQL Client Implementation
//!
//! This module implements the [`Client`] trait for MySQL databases (including MariaDB).
//!
//! # Implementation Notes
//! - Uses `mysql_async` (async driver, requires tokio runtime)
//! - Every connection runs `SET NAMES '<encoding>'` as its init command
//! - Statements are server-side prepared with positional `?` parameters
//! - Unbuffered fetches stream rows with `exec_iter`
//! - Text and binary protocol values are decoded into [`Value`]; UTF-8 byte
//!   strings become `Value::Text`
//! - `quote` escapes through the driver and follows the session's
//!   `NO_BACKSLASH_ESCAPES` mode, re-read whenever a statement touches `sql_mode`

use mysql_async::{prelude::*, Conn, OptsBuilder, Params, Row as MyRow, Value as MyValue};

use crate::dialect::Dialect;
use crate::engine::{Client, ConnectionConfig, DatabaseType, Executed};
use crate::error::{DbError, DriverErrorInfo, Result};
use crate::value::{Row, Value};

/// One open MySQL connection
pub struct MySqlClient {
    conn: Conn,
    no_backslash_escapes: bool,
}

impl MySqlClient {
    /// Connect using `config`
    ///
    /// Any driver failure is logged and reported as
    /// [`DbError::ConnectionFailed`] with the driver's diagnostics.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        if config.engine != DatabaseType::MySQL {
            return Err(DbError::invalid_input(format!(
                "Expected MySQL engine, got {}",
                config.engine
            )));
        }

        let opts = build_mysql_opts(config)?;

        let conn = Conn::new(opts).await.map_err(|e| {
            tracing::error!(error = %e, "mysql connect failed");
            DbError::ConnectionFailed(driver_error_info(&e))
        })?;

        let mut client = Self { conn, no_backslash_escapes: false };
        client.refresh_sql_mode().await?;

        tracing::debug!(
            host = config.host.as_deref().unwrap_or("-"),
            database = config.database.as_deref().unwrap_or("-"),
            no_backslash_escapes = client.no_backslash_escapes,
            "mysql connected"
        );
        Ok(client)
    }

    /// Re-read `@@SESSION.sql_mode`
    pub async fn refresh_sql_mode(&mut self) -> Result<()> {
        let mode: Option<String> =
            self.conn.query_first("SELECT @@SESSION.sql_mode").await.map_err(query_error)?;
        self.no_backslash_escapes = mode.as_deref().is_some_and(disables_backslash_escapes);
        Ok(())
    }

    /// The session runs with `NO_BACKSLASH_ESCAPES`
    #[must_use]
    pub const fn no_backslash_escapes(&self) -> bool {
        self.no_backslash_escapes
    }

    /// Borrow the underlying driver connection
    pub fn conn_mut(&mut self) -> &mut Conn {
        &mut self.conn
    }
}

impl Client for MySqlClient {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    async fn execute(&mut self, sql: &str, binds: &[Value]) -> Result<Executed> {
        self.conn.exec_drop(sql, to_params(binds)).await.map_err(query_error)?;

        let done = Executed {
            rows_affected: self.conn.affected_rows(),
            last_insert_id: self.conn.last_insert_id().filter(|id| *id != 0),
        };
        if touches_sql_mode(sql) {
            self.refresh_sql_mode().await?;
        }
        Ok(done)
    }

    async fn fetch(&mut self, sql: &str, binds: &[Value], buffered: bool) -> Result<Vec<Row>> {
        if buffered {
            let rows: Vec<MyRow> =
                self.conn.exec(sql, to_params(binds)).await.map_err(query_error)?;
            rows.iter().map(row_to_record).collect()
        } else {
            let mut result =
                self.conn.exec_iter(sql, to_params(binds)).await.map_err(query_error)?;
            let decoded: Vec<Result<Row>> =
                result.map(|row| row_to_record(&row)).await.map_err(query_error)?;
            decoded.into_iter().collect()
        }
    }

    async fn exec_raw(&mut self, sql: &str) -> Result<u64> {
        self.conn.query_drop(sql).await.map_err(query_error)?;
        let affected = self.conn.affected_rows();
        if touches_sql_mode(sql) {
            self.refresh_sql_mode().await?;
        }
        Ok(affected)
    }

    fn quote(&self, text: &str) -> Result<String> {
        Ok(quote_literal(text, self.no_backslash_escapes))
    }

    async fn close(self) -> Result<()> {
        self.conn.disconnect().await.map_err(|e| {
            DbError::engine_error("mysql", format!("Failed to disconnect: {e}"))
        })
    }
}

/// Build MySQL connection options from ConnectionConfig
fn build_mysql_opts(config: &ConnectionConfig) -> Result<OptsBuilder> {
    let user = config
        .user
        .as_ref()
        .ok_or_else(|| DbError::invalid_input("MySQL requires 'user' parameter"))?;

    let set_names = format!("SET NAMES {}", quote_literal(&config.encoding_or_default(), false));

    let mut opts = OptsBuilder::default()
        .user(Some(user))
        .pass(config.password.as_ref())
        .db_name(config.database.as_ref())
        .init(vec![set_names]);

    match (&config.socket, &config.host) {
        (Some(socket), _) => {
            opts = opts.socket(Some(socket));
        }
        (None, Some(host)) => {
            opts = opts
                .ip_or_hostname(host)
                .tcp_port(config.port.unwrap_or(crate::engine::DEFAULT_MYSQL_PORT));
        }
        (None, None) => {
            return Err(DbError::invalid_input("MySQL requires 'host' or 'socket' parameter"));
        }
    }

    Ok(opts)
}

fn quote_literal(text: &str, no_backslash_escapes: bool) -> String {
    MyValue::Bytes(text.as_bytes().to_vec()).as_sql(no_backslash_escapes)
}

fn disables_backslash_escapes(sql_mode: &str) -> bool {
    sql_mode.split(',').any(|mode| mode.trim().eq_ignore_ascii_case("NO_BACKSLASH_ESCAPES"))
}

fn touches_sql_mode(sql: &str) -> bool {
    sql.to_ascii_lowercase().contains("sql_mode")
}

fn to_params(binds: &[Value]) -> Params {
    if binds.is_empty() {
        Params::Empty
    } else {
        Params::Positional(binds.iter().map(to_mysql_value).collect())
    }
}

fn to_mysql_value(value: &Value) -> MyValue {
    match value {
        Value::Null => MyValue::NULL,
        Value::Bool(b) => MyValue::Int(i64::from(*b)),
        Value::Int(i) => MyValue::Int(*i),
        Value::UInt(u) => MyValue::UInt(*u),
        Value::Float(f) => MyValue::Double(*f),
        Value::Text(s) => MyValue::Bytes(s.as_bytes().to_vec()),
        Value::Bytes(b) => MyValue::Bytes(b.clone()),
    }
}

/// Convert a MySQL row to an ordered record
fn row_to_record(row: &MyRow) -> Result<Row> {
    let mut record = Row::with_capacity(row.len());

    for (idx, column) in row.columns_ref().iter().enumerate() {
        let value = row.as_ref(idx).ok_or_else(|| {
            DbError::engine_error("mysql", format!("Failed to get value at index {idx}"))
        })?;
        record.insert(column.name_str().to_string(), from_mysql_value(value));
    }

    Ok(record)
}

fn from_mysql_value(value: &MyValue) -> Value {
    match value {
        MyValue::NULL => Value::Null,

        MyValue::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(s) => Value::Text(s.to_string()),
            Err(_) => Value::Bytes(bytes.clone()),
        },

        MyValue::Int(i) => Value::Int(*i),
        MyValue::UInt(u) => Value::UInt(*u),
        MyValue::Float(f) => Value::Float(f64::from(*f)),
        MyValue::Double(d) => Value::Float(*d),

        MyValue::Date(year, month, day, hour, minute, second, micro) => Value::Text(format!(
            "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}.{micro:06}"
        )),

        MyValue::Time(is_negative, days, hours, minutes, seconds, microseconds) => {
            let sign = if *is_negative { "-" } else { "" };
            let total_hours = days * 24 + u32::from(*hours);
            Value::Text(format!("{sign}{total_hours}:{minutes:02}:{seconds:02}.{microseconds:06}"))
        }
    }
}

fn driver_error_info(e: &mysql_async::Error) -> DriverErrorInfo {
    match e {
        mysql_async::Error::Server(server) => DriverErrorInfo::new(
            server.state.clone(),
            Some(i64::from(server.code)),
            server.message.clone(),
        ),
        other => DriverErrorInfo::general(other.to_string()),
    }
}

fn query_error(e: mysql_async::Error) -> DbError {
    DbError::QueryFailed(driver_error_info(&e))
}
