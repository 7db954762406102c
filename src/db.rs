//! The caller-facing wrapper
//!
//! [`Db`] owns one [`Client`] and adds the CRUD helpers, fetch variants,
//! schema listing, statement logging and last-error tracking on top of it.
//!
//! ```no_run
//! # async fn demo() -> dbwrap::Result<()> {
//! use dbwrap::engine::sqlite::SqliteClient;
//! use dbwrap::{Condition, Db, Fields, InsertOptions, QueryLog, UpdateOptions};
//!
//! let log = QueryLog::new();
//! let mut db = Db::new(SqliteClient::open_in_memory()?).with_observer(log.clone());
//! db.exec("CREATE TABLE message (id INTEGER PRIMARY KEY, title TEXT)").await?;
//!
//! let id = db
//!     .insert("message", &Fields::new().set("title", "hello"), InsertOptions::default())
//!     .await?
//!     .last_insert_id;
//! db.update(
//!     "message",
//!     &Fields::new().set("title", "bye"),
//!     &Fields::new().set("id", id).into(),
//!     UpdateOptions::default(),
//! )
//! .await?;
//! assert_eq!(log.len(), 3);
//! # Ok(())
//! # }
//! ```

use indexmap::IndexMap;
use std::sync::Arc;

use crate::builder::{
    delete_statement, insert_statement, paginate, update_statement, Condition, DeleteOptions,
    InsertOptions, Statement, UpdateOptions,
};
use crate::dialect::Dialect;
use crate::engine::{
    parse_field_rows, show_fields_sql, show_tables_sql, Client, Executed, FieldInfo,
};
use crate::error::{DbError, DriverErrorInfo, Result};
use crate::log::{LogEntry, QueryObserver};
use crate::value::{Fields, Row, Value};

/// Paging and buffering for [`Db::fetch_all`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Offset of the first row (only used when `limit_step > 0`)
    pub limit_start: u64,
    /// Page size; 0 disables the `LIMIT` clause
    pub limit_step: u64,
    /// Let the driver buffer the whole result before decoding
    pub buffered: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self { limit_start: 0, limit_step: 0, buffered: true }
    }
}

impl FetchOptions {
    /// `LIMIT start, step`
    #[must_use]
    pub fn page(limit_start: u64, limit_step: u64) -> Self {
        Self { limit_start, limit_step, ..Self::default() }
    }

    #[must_use]
    pub fn unbuffered(mut self) -> Self {
        self.buffered = false;
        self
    }
}

/// Column selector for [`Db::fetch_column`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRef {
    Index(usize),
    Name(String),
}

impl From<usize> for ColumnRef {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for ColumnRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for ColumnRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

/// Convenience wrapper over one database connection
pub struct Db<C: Client> {
    client: C,
    observers: Vec<Arc<dyn QueryObserver>>,
    last_error: DriverErrorInfo,
}

impl<C: Client> Db<C> {
    pub fn new(client: C) -> Self {
        Self { client, observers: Vec::new(), last_error: DriverErrorInfo::ok() }
    }

    /// Attach an observer that sees every statement before it runs
    #[must_use]
    pub fn with_observer(mut self, observer: impl QueryObserver + 'static) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }

    pub fn add_observer(&mut self, observer: Arc<dyn QueryObserver>) {
        self.observers.push(observer);
    }

    pub fn dialect(&self) -> Dialect {
        self.client.dialect()
    }

    /// The wrapped driver client
    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    pub fn into_client(self) -> C {
        self.client
    }

    pub async fn close(self) -> Result<()> {
        self.client.close().await
    }

    // ------------------------------------------------------------------
    // Pass-through
    // ------------------------------------------------------------------

    /// Prepare and execute `sql` with positional binds
    pub async fn execute_sql(&mut self, sql: &str, binds: &[Value]) -> Result<Executed> {
        self.log(sql, binds);
        let result = self.client.execute(sql, binds).await;
        self.track(result)
    }

    /// Execute raw SQL text (no binds); returns affected rows
    pub async fn exec(&mut self, sql: &str) -> Result<u64> {
        self.log(sql, &[]);
        let result = self.client.exec_raw(sql).await;
        self.track(result)
    }

    /// Run a query without binds and return every row
    pub async fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        self.fetch_all(sql, &[], FetchOptions::default()).await
    }

    /// Quote `text` as a string literal, escaped by the driver for the
    /// current session
    pub fn quote(&self, text: &str) -> Result<String> {
        self.client.quote(text)
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// `INSERT INTO table SET ...`
    ///
    /// Fails with [`DbError::EmptyMutation`] before contacting the database
    /// when `fields` is empty. `Value::Null` fields are stored as `''`.
    pub async fn insert(
        &mut self,
        table: &str,
        fields: &Fields,
        opts: InsertOptions,
    ) -> Result<Executed> {
        let stmt = insert_statement(self.dialect(), table, fields, opts)?;
        self.run(stmt).await
    }

    /// `UPDATE table SET ... WHERE ...`
    ///
    /// Updating every row requires [`Condition::AllRows`].
    pub async fn update(
        &mut self,
        table: &str,
        fields: &Fields,
        condition: &Condition,
        opts: UpdateOptions,
    ) -> Result<Executed> {
        let stmt = update_statement(self.dialect(), table, fields, condition, opts)?;
        self.run(stmt).await
    }

    /// `DELETE FROM table WHERE ...`
    ///
    /// Never deletes without a condition: empty conditions and
    /// [`Condition::AllRows`] fail with [`DbError::EmptyCondition`].
    pub async fn delete(
        &mut self,
        table: &str,
        condition: &Condition,
        opts: DeleteOptions,
    ) -> Result<Executed> {
        let stmt = delete_statement(self.dialect(), table, condition, opts)?;
        self.run(stmt).await
    }

    // ------------------------------------------------------------------
    // Fetch variants
    // ------------------------------------------------------------------

    /// First column of the first row
    pub async fn fetch_one(&mut self, sql: &str, binds: &[Value]) -> Result<Option<Value>> {
        let row = self.fetch_row(sql, binds).await?;
        Ok(row.and_then(|row| row.into_iter().next().map(|(_, value)| value)))
    }

    /// First row
    pub async fn fetch_row(&mut self, sql: &str, binds: &[Value]) -> Result<Option<Row>> {
        let rows = self.fetch_all(sql, binds, FetchOptions::default()).await?;
        Ok(rows.into_iter().next())
    }

    /// One column of every row, by position or by name
    pub async fn fetch_column(
        &mut self,
        sql: &str,
        binds: &[Value],
        column: impl Into<ColumnRef>,
    ) -> Result<Vec<Value>> {
        let column = column.into();
        let rows = self.fetch_all(sql, binds, FetchOptions::default()).await?;

        rows.into_iter()
            .map(|mut row| {
                let value = match &column {
                    ColumnRef::Index(idx) => row.swap_remove_index(*idx).map(|(_, v)| v),
                    ColumnRef::Name(name) => row.swap_remove(name.as_str()),
                };
                value.ok_or_else(|| {
                    DbError::invalid_input(format!("Result set has no column {column:?}"))
                })
            })
            .collect()
    }

    /// Every row, optionally paged with `LIMIT start, step`
    pub async fn fetch_all(
        &mut self,
        sql: &str,
        binds: &[Value],
        opts: FetchOptions,
    ) -> Result<Vec<Row>> {
        let sql = paginate(sql, opts.limit_start, opts.limit_step);
        self.log(&sql, binds);
        let result = self.client.fetch(&sql, binds, opts.buffered).await;
        self.track(result)
    }

    // ------------------------------------------------------------------
    // Schema
    // ------------------------------------------------------------------

    /// Table names of database `dbname` (`main` for the primary SQLite file)
    pub async fn show_tables(&mut self, dbname: &str) -> Result<Vec<String>> {
        let sql = show_tables_sql(self.dialect(), dbname);
        let rows = self.query(&sql).await?;

        rows.iter()
            .map(|row| {
                row.first()
                    .and_then(|(_, v)| v.as_str())
                    .map(String::from)
                    .ok_or_else(|| {
                        DbError::engine_error(
                            self.dialect().to_string(),
                            "Failed to extract table name",
                        )
                    })
            })
            .collect()
    }

    /// Column descriptions of `table`, keyed by column name
    pub async fn show_fields(&mut self, table: &str) -> Result<IndexMap<String, FieldInfo>> {
        let sql = show_fields_sql(self.dialect(), table);
        let rows = self.query(&sql).await?;
        parse_field_rows(self.dialect(), &rows)
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    /// SQLSTATE of the last statement; `"00000"` if it succeeded
    pub fn error_code(&self) -> &str {
        &self.last_error.sqlstate
    }

    /// Full diagnostics of the last statement
    pub fn error_info(&self) -> &DriverErrorInfo {
        &self.last_error
    }

    async fn run(&mut self, stmt: Statement) -> Result<Executed> {
        self.execute_sql(&stmt.sql, &stmt.binds).await
    }

    fn log(&self, sql: &str, binds: &[Value]) {
        tracing::debug!(target: "dbwrap::sql", %sql, params = binds.len(), "statement");
        if self.observers.is_empty() {
            return;
        }
        let entry = LogEntry::new(sql, binds.to_vec());
        for observer in &self.observers {
            observer.on_statement(&entry);
        }
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.last_error = DriverErrorInfo::ok(),
            Err(e) => {
                let info = e
                    .driver_info()
                    .cloned()
                    .unwrap_or_else(|| DriverErrorInfo::general(e.message()));
                tracing::warn!(
                    target: "dbwrap::sql",
                    sqlstate = %info.sqlstate,
                    code = ?info.code,
                    "statement failed: {}",
                    info.message
                );
                self.last_error = info;
            }
        }
        result
    }
}
