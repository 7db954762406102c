//! Parameterized mutation builder
//!
//! Turns an ordered [`Fields`] mapping into a `col=? <glue> col=?` fragment
//! and a bind list whose order matches the placeholders, then composes those
//! fragments into INSERT/UPDATE/DELETE statements.
//!
//! Everything here is pure string building; nothing touches a connection.
//!
//! # Null handling
//! A `Value::Null` in a mapping is bound as an empty string, never as SQL
//! `NULL`. Callers that need `col = NULL` must use a raw condition or
//! [`crate::Db::execute_sql`].

use crate::dialect::Dialect;
use crate::error::{DbError, Result};
use crate::value::{Fields, Value};

/// A SET/WHERE clause body and its positional binds
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    /// One `col=?` clause per mapping entry, joined by the glue
    pub sql: String,
    /// One bind per clause, in clause order
    pub binds: Vec<Value>,
}

impl Fragment {
    /// Number of `col=?` clauses (always equal to the bind count)
    #[must_use]
    pub fn len(&self) -> usize {
        self.binds.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// A complete statement ready for the driver
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub binds: Vec<Value>,
}

/// Quote a column name and append a positional placeholder: `` `col`=? ``
///
/// Quotes already present on either end are stripped first, so the result is
/// the same for `id` and `` `id` ``.
#[must_use]
pub fn placeholder(field: &str, dialect: Dialect) -> String {
    let mut out = dialect.quote_ident(field);
    out.push_str("=?");
    out
}

/// Build a clause list from `fields`
///
/// `glue` is trimmed and padded with one space on each side, so `","` joins
/// as `" , "` and `"AND"` as `" AND "`. An empty mapping yields an empty
/// fragment; callers decide whether that is an error.
#[must_use]
pub fn build(fields: &Fields, glue: &str, dialect: Dialect) -> Fragment {
    let glue = format!(" {} ", glue.trim());
    let mut fragment = Fragment { sql: String::new(), binds: Vec::with_capacity(fields.len()) };

    for (name, value) in fields.iter() {
        if !fragment.binds.is_empty() {
            fragment.sql.push_str(&glue);
        }
        fragment.sql.push_str(&placeholder(name, dialect));
        fragment.binds.push(match value {
            Value::Null => Value::Text(String::new()),
            v => v.clone(),
        });
    }

    fragment
}

/// Row selector for UPDATE and DELETE
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `col=? AND col=?` built from the mapping
    Fields(Fields),
    /// Literal predicate, passed through verbatim, with its own binds
    Raw { sql: String, binds: Vec<Value> },
    /// Every row (`1 = 1`); accepted by UPDATE only
    AllRows,
}

impl Condition {
    /// Literal predicate without binds
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::Raw { sql: sql.into(), binds: Vec::new() }
    }

    /// Literal predicate with positional binds
    pub fn raw_with<I, V>(sql: impl Into<String>, binds: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Raw { sql: sql.into(), binds: binds.into_iter().map(Into::into).collect() }
    }

    /// Render the WHERE body; `AllRows` is only honored when `allow_all_rows`
    fn render(&self, dialect: Dialect, allow_all_rows: bool) -> Result<Fragment> {
        match self {
            Self::Fields(fields) => {
                let fragment = build(fields, "AND", dialect);
                if fragment.is_empty() {
                    return Err(DbError::empty_condition("condition mapping has no columns"));
                }
                Ok(fragment)
            }
            Self::Raw { sql, binds } => {
                if sql.trim().is_empty() {
                    return Err(DbError::empty_condition("condition is blank"));
                }
                Ok(Fragment { sql: sql.clone(), binds: binds.clone() })
            }
            Self::AllRows if allow_all_rows => {
                Ok(Fragment { sql: "1 = 1".to_string(), binds: Vec::new() })
            }
            Self::AllRows => {
                Err(DbError::empty_condition("refusing to delete every row without a condition"))
            }
        }
    }
}

impl From<Fields> for Condition {
    fn from(fields: Fields) -> Self {
        Self::Fields(fields)
    }
}

/// Options for [`insert_statement`]
#[derive(Debug, Clone, Copy, Default)]
pub struct InsertOptions {
    /// Use `REPLACE INTO` instead of `INSERT INTO`
    pub replace: bool,
}

/// Options for [`update_statement`]
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    /// `UPDATE LOW_PRIORITY` (MySQL only, ignored elsewhere)
    pub low_priority: bool,
}

/// Options for [`delete_statement`]
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteOptions {
    /// Maximum rows to delete; 0 means no limit
    pub limit: u64,
}

/// `INSERT INTO <table> SET ...` (or the column-list form where SET is unsupported)
pub fn insert_statement(
    dialect: Dialect,
    table: &str,
    fields: &Fields,
    opts: InsertOptions,
) -> Result<Statement> {
    if fields.is_empty() {
        return Err(DbError::empty_mutation(format!("insert into {table} has no field values")));
    }
    let cmd = if opts.replace { "REPLACE INTO" } else { "INSERT INTO" };
    let fragment = build(fields, ",", dialect);

    let sql = if dialect.supports_insert_set() {
        format!("{cmd} {table} SET {}", fragment.sql)
    } else {
        let columns: Vec<String> = fields.keys().map(|k| dialect.quote_ident(k)).collect();
        let marks = vec!["?"; columns.len()].join(", ");
        format!("{cmd} {table} ({}) VALUES ({marks})", columns.join(", "))
    };

    Ok(Statement { sql, binds: fragment.binds })
}

/// `UPDATE <table> SET ... WHERE ...`; data binds precede condition binds
pub fn update_statement(
    dialect: Dialect,
    table: &str,
    fields: &Fields,
    condition: &Condition,
    opts: UpdateOptions,
) -> Result<Statement> {
    let set = build(fields, ",", dialect);
    if set.is_empty() {
        return Err(DbError::empty_mutation(format!("update of {table} has no field values")));
    }
    let filter = condition.render(dialect, true)?;

    let cmd = if opts.low_priority && dialect.supports_low_priority() {
        "UPDATE LOW_PRIORITY"
    } else {
        "UPDATE"
    };
    let sql = format!("{cmd} {table} SET {} WHERE {}", set.sql, filter.sql);

    let mut binds = set.binds;
    binds.extend(filter.binds);
    Ok(Statement { sql, binds })
}

/// `DELETE FROM <table> WHERE ...`; never renders an unconditional delete
pub fn delete_statement(
    dialect: Dialect,
    table: &str,
    condition: &Condition,
    opts: DeleteOptions,
) -> Result<Statement> {
    let filter = condition.render(dialect, false)?;

    let sql = match opts.limit {
        0 => format!("DELETE FROM {table} WHERE {}", filter.sql),
        n if dialect.supports_delete_limit() => {
            format!("DELETE FROM {table} WHERE {} LIMIT {n}", filter.sql)
        }
        n => format!(
            "DELETE FROM {table} WHERE rowid IN (SELECT rowid FROM {table} WHERE {} LIMIT {n})",
            filter.sql
        ),
    };

    Ok(Statement { sql, binds: filter.binds })
}

/// Append ` LIMIT start, step` when `step > 0`
#[must_use]
pub fn paginate(sql: &str, limit_start: u64, limit_step: u64) -> String {
    if limit_step == 0 {
        return sql.to_string();
    }
    format!("{sql} LIMIT {limit_start}, {limit_step}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MY: Dialect = Dialect::MySql;

    #[test]
    fn test_placeholder_strips_existing_quotes() {
        assert_eq!(placeholder("id", MY), "`id`=?");
        assert_eq!(placeholder("`id`", MY), placeholder("id", MY));
        assert_eq!(placeholder("\"id\"", Dialect::Sqlite), "\"id\"=?");
    }

    #[test]
    fn test_build_comma_glue() {
        let fields = Fields::new().set("name", "Alice").set("age", 30);
        let fragment = build(&fields, ",", MY);
        assert_eq!(fragment.sql, "`name`=? , `age`=?");
        assert_eq!(fragment.binds, vec![Value::from("Alice"), Value::Int(30)]);
    }

    #[test]
    fn test_build_and_glue_is_padded() {
        let fields = Fields::new().set("a", 1).set("b", 2).set("c", 3);
        assert_eq!(build(&fields, "AND", MY).sql, "`a`=? AND `b`=? AND `c`=?");
        assert_eq!(build(&fields, "  OR ", MY).sql, "`a`=? OR `b`=? OR `c`=?");
    }

    #[test]
    fn test_build_single_field_has_no_glue() {
        let fragment = build(&Fields::new().set("id", 9), ",", MY);
        assert_eq!(fragment.sql, "`id`=?");
        assert_eq!(fragment.len(), 1);
    }

    #[test]
    fn test_build_empty_mapping() {
        let fragment = build(&Fields::new(), ",", MY);
        assert!(fragment.is_empty());
        assert!(fragment.binds.is_empty());
    }

    #[test]
    fn test_build_null_becomes_empty_string() {
        let fields = Fields::new().set("title", None::<&str>).set("views", 0);
        let fragment = build(&fields, ",", MY);
        assert_eq!(fragment.binds, vec![Value::Text(String::new()), Value::Int(0)]);
        assert!(!fragment.binds.iter().any(Value::is_null));
    }

    #[test]
    fn test_build_clause_count_matches_binds() {
        for n in 1..12 {
            let fields: Fields = (0..n).map(|i| (format!("c{i}"), i)).collect();
            let fragment = build(&fields, ",", MY);
            assert_eq!(fragment.sql.matches("=?").count(), n);
            assert_eq!(fragment.binds.len(), n);
            assert_eq!(fragment.binds.last(), Some(&Value::from(n - 1)));
        }
    }

    #[test]
    fn test_insert_statement_mysql() {
        let fields = Fields::new().set("name", "Alice").set("age", 30);
        let stmt = insert_statement(MY, "message", &fields, InsertOptions::default()).unwrap();
        assert_eq!(stmt.sql, "INSERT INTO message SET `name`=? , `age`=?");
        assert_eq!(stmt.binds.len(), 2);

        let stmt =
            insert_statement(MY, "message", &fields, InsertOptions { replace: true }).unwrap();
        assert!(stmt.sql.starts_with("REPLACE INTO message SET"));
    }

    #[test]
    fn test_insert_statement_sqlite_column_list() {
        let fields = Fields::new().set("`name`", "Alice").set("age", 30);
        let stmt = insert_statement(Dialect::Sqlite, "message", &fields, InsertOptions::default())
            .unwrap();
        assert_eq!(stmt.sql, "INSERT INTO message (\"name\", \"age\") VALUES (?, ?)");
        assert_eq!(stmt.binds, vec![Value::from("Alice"), Value::Int(30)]);
    }

    #[test]
    fn test_insert_statement_rejects_empty() {
        let err = insert_statement(MY, "message", &Fields::new(), InsertOptions::default())
            .unwrap_err();
        assert!(matches!(err, DbError::EmptyMutation(_)));
    }

    #[test]
    fn test_update_statement_with_field_condition() {
        let data = Fields::new().set("title", "x").set("body", "y");
        let cond = Condition::from(Fields::new().set("id", 40).set("owner", 7));
        let stmt = update_statement(MY, "message", &data, &cond, UpdateOptions::default()).unwrap();
        assert_eq!(stmt.sql, "UPDATE message SET `title`=? , `body`=? WHERE `id`=? AND `owner`=?");
        assert_eq!(
            stmt.binds,
            vec![Value::from("x"), Value::from("y"), Value::Int(40), Value::Int(7)]
        );
    }

    #[test]
    fn test_update_statement_all_rows_is_explicit() {
        let data = Fields::new().set("title", "x");
        let stmt =
            update_statement(MY, "message", &data, &Condition::AllRows, UpdateOptions::default())
                .unwrap();
        assert_eq!(stmt.sql, "UPDATE message SET `title`=? WHERE 1 = 1");
        assert_eq!(stmt.binds, vec![Value::from("x")]);
    }

    #[test]
    fn test_update_statement_raw_condition_binds_follow_data() {
        let data = Fields::new().set("title", "x");
        let cond = Condition::raw_with("id > ? AND id < ?", [10, 20]);
        let opts = UpdateOptions { low_priority: true };
        let stmt = update_statement(MY, "message", &data, &cond, opts).unwrap();
        assert_eq!(stmt.sql, "UPDATE LOW_PRIORITY message SET `title`=? WHERE id > ? AND id < ?");
        assert_eq!(stmt.binds, vec![Value::from("x"), Value::Int(10), Value::Int(20)]);
    }

    #[test]
    fn test_update_statement_low_priority_ignored_on_sqlite() {
        let data = Fields::new().set("title", "x");
        let stmt = update_statement(
            Dialect::Sqlite,
            "message",
            &data,
            &Condition::raw("id = 1"),
            UpdateOptions { low_priority: true },
        )
        .unwrap();
        assert_eq!(stmt.sql, "UPDATE message SET \"title\"=? WHERE id = 1");
    }

    #[test]
    fn test_update_statement_rejects_empty_inputs() {
        let err = update_statement(
            MY,
            "message",
            &Fields::new(),
            &Condition::AllRows,
            UpdateOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DbError::EmptyMutation(_)));

        let data = Fields::new().set("title", "x");
        let err = update_statement(
            MY,
            "message",
            &data,
            &Condition::Fields(Fields::new()),
            UpdateOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DbError::EmptyCondition(_)));

        let err =
            update_statement(MY, "message", &data, &Condition::raw("  "), UpdateOptions::default())
                .unwrap_err();
        assert!(matches!(err, DbError::EmptyCondition(_)));
    }

    #[test]
    fn test_delete_statement_variants() {
        let cond = Condition::from(Fields::new().set("id", 22));
        let stmt = delete_statement(MY, "message", &cond, DeleteOptions::default()).unwrap();
        assert_eq!(stmt.sql, "DELETE FROM message WHERE `id`=?");
        assert_eq!(stmt.binds, vec![Value::Int(22)]);

        let stmt = delete_statement(MY, "message", &cond, DeleteOptions { limit: 5 }).unwrap();
        assert_eq!(stmt.sql, "DELETE FROM message WHERE `id`=? LIMIT 5");

        let stmt = delete_statement(
            Dialect::Sqlite,
            "message",
            &Condition::raw_with("id > ?", [3]),
            DeleteOptions { limit: 2 },
        )
        .unwrap();
        assert_eq!(
            stmt.sql,
            "DELETE FROM message WHERE rowid IN (SELECT rowid FROM message WHERE id > ? LIMIT 2)"
        );
        assert_eq!(stmt.binds, vec![Value::Int(3)]);
    }

    #[test]
    fn test_delete_statement_refuses_missing_condition() {
        for cond in [Condition::Fields(Fields::new()), Condition::raw(""), Condition::AllRows] {
            let err = delete_statement(MY, "message", &cond, DeleteOptions::default()).unwrap_err();
            assert!(matches!(err, DbError::EmptyCondition(_)), "{cond:?}");
        }
    }

    #[test]
    fn test_raw_condition_binds_are_not_normalized() {
        let cond = Condition::raw_with("deleted_at IS ?", [Value::Null]);
        let stmt = delete_statement(MY, "message", &cond, DeleteOptions::default()).unwrap();
        assert_eq!(stmt.binds, vec![Value::Null]);
    }

    #[test]
    fn test_paginate() {
        assert_eq!(paginate("SELECT * FROM m", 0, 0), "SELECT * FROM m");
        assert_eq!(paginate("SELECT * FROM m", 5, 0), "SELECT * FROM m");
        assert_eq!(paginate("SELECT * FROM m", 0, 10), "SELECT * FROM m LIMIT 0, 10");
        assert_eq!(paginate("SELECT * FROM m", 20, 10), "SELECT * FROM m LIMIT 20, 10");
    }
}
