//! SQL dialect rules
//!
//! Identifier quoting and the handful of statement-shape differences between
//! the engines dbwrap drives. No SQL is parsed here. String literals are
//! quoted by the driver, see [`Client::quote`](crate::engine::Client::quote).

use serde::{Deserialize, Serialize};

/// Target SQL dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `MySQL` / `MariaDB`: backtick identifiers
    MySql,
    /// `SQLite`: double-quoted identifiers
    Sqlite,
}

impl Dialect {
    /// Identifier quote character emitted by [`Dialect::quote_ident`]
    #[must_use]
    pub const fn ident_quote(self) -> char {
        match self {
            Self::MySql => '`',
            Self::Sqlite => '"',
        }
    }

    /// Characters stripped from both ends of an identifier before re-quoting
    ///
    /// `SQLite` also accepts MySQL-style backticks, so both are stripped there.
    #[must_use]
    pub const fn stripped_quotes(self) -> &'static [char] {
        match self {
            Self::MySql => &['`'],
            Self::Sqlite => &['"', '`'],
        }
    }

    /// Remove any identifier quotes surrounding `name`
    #[must_use]
    pub fn strip_ident(self, name: &str) -> &str {
        name.trim_matches(self.stripped_quotes())
    }

    /// Quote a (possibly already quoted) identifier
    ///
    /// Idempotent: `quote_ident("id") == quote_ident("`id`")`. Embedded quote
    /// characters are not escaped.
    #[must_use]
    pub fn quote_ident(self, name: &str) -> String {
        let q = self.ident_quote();
        format!("{q}{}{q}", self.strip_ident(name))
    }

    /// `INSERT INTO t SET a=?, ...` is accepted
    #[must_use]
    pub const fn supports_insert_set(self) -> bool {
        matches!(self, Self::MySql)
    }

    /// `UPDATE LOW_PRIORITY` is accepted
    #[must_use]
    pub const fn supports_low_priority(self) -> bool {
        matches!(self, Self::MySql)
    }

    /// `DELETE ... LIMIT n` is accepted
    #[must_use]
    pub const fn supports_delete_limit(self) -> bool {
        matches!(self, Self::MySql)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MySql => write!(f, "mysql"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}
