//! SQL dialects.
//!
//! A [`Dialect`] decides placeholder style, identifier quoting, literal encoding
//! and the column type names used by `CREATE TABLE`. Statement trees are dialect
//! agnostic until they are rendered.

use crate::table::ColumnKind;
use crate::value::{Value, format_time};
use std::fmt;

/// Target SQL variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// SQLite 3.35+ (`?` placeholders, `excluded` pseudo-table, `RETURNING`).
    Sqlite,
    /// PostgreSQL (`$n` placeholders).
    Postgres,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
        })
    }
}

// Words that must be quoted when used as identifiers in either dialect.
const RESERVED: &[&str] = &[
    "all", "and", "as", "asc", "between", "by", "case", "check", "collate", "column",
    "constraint", "create", "cross", "default", "delete", "desc", "distinct", "drop", "else",
    "end", "except", "exists", "foreign", "from", "full", "group", "having", "in", "index",
    "inner", "insert", "intersect", "into", "is", "join", "key", "left", "like", "limit", "not",
    "null", "offset", "on", "or", "order", "outer", "primary", "references", "returning",
    "right", "select", "set", "table", "then", "to", "union", "unique", "update", "user",
    "using", "values", "when", "where", "with",
];

impl Dialect {
    /// Append the placeholder for the 1-based argument position `idx`.
    pub(crate) fn write_placeholder(self, buf: &mut String, idx: usize, reuse: bool) {
        match self {
            Dialect::Sqlite if reuse => {
                buf.push('?');
                buf.push_str(&idx.to_string());
            }
            Dialect::Sqlite => buf.push('?'),
            Dialect::Postgres => {
                buf.push('$');
                buf.push_str(&idx.to_string());
            }
        }
    }

    /// Append `name`, double-quoting it when it is not a plain identifier.
    pub fn write_ident(self, buf: &mut String, name: &str) {
        if is_plain_ident(name) {
            buf.push_str(name);
            return;
        }
        buf.push('"');
        for ch in name.chars() {
            if ch == '"' {
                buf.push('"');
            }
            buf.push(ch);
        }
        buf.push('"');
    }

    /// Quote an identifier into a new string.
    pub fn quote_ident(self, name: &str) -> String {
        let mut buf = String::with_capacity(name.len() + 2);
        self.write_ident(&mut buf, name);
        buf
    }

    /// Append `value` as an escaped SQL literal. Only used for logging output.
    pub(crate) fn write_literal(self, buf: &mut String, value: &Value) {
        match value {
            Value::Null => buf.push_str("NULL"),
            Value::Bool(b) => buf.push_str(match (self, b) {
                (Dialect::Sqlite, true) => "1",
                (Dialect::Sqlite, false) => "0",
                (Dialect::Postgres, true) => "TRUE",
                (Dialect::Postgres, false) => "FALSE",
            }),
            Value::Int(i) => buf.push_str(&i.to_string()),
            Value::Float(f) => buf.push_str(&f.to_string()),
            Value::Text(s) => write_string_literal(buf, s),
            Value::Bytes(b) => {
                buf.push_str(match self {
                    Dialect::Sqlite => "x'",
                    Dialect::Postgres => "'\\x",
                });
                for byte in b {
                    buf.push_str(&format!("{byte:02x}"));
                }
                buf.push('\'');
            }
            Value::Time(t) => {
                write_string_literal(buf, &format_time(t));
                if self == Dialect::Postgres {
                    buf.push_str("::timestamptz");
                }
            }
            Value::Json(j) => {
                write_string_literal(buf, &j.to_string());
                if self == Dialect::Postgres {
                    buf.push_str("::jsonb");
                }
            }
        }
    }

    /// Column type used by `CREATE TABLE` when a field declares none.
    pub fn column_type(self, kind: ColumnKind) -> &'static str {
        match (self, kind) {
            (_, ColumnKind::Boolean) => "BOOLEAN",
            (Dialect::Sqlite, ColumnKind::Integer) => "INTEGER",
            (Dialect::Postgres, ColumnKind::Integer) => "BIGINT",
            (Dialect::Sqlite, ColumnKind::Real) => "REAL",
            (Dialect::Postgres, ColumnKind::Real) => "DOUBLE PRECISION",
            (_, ColumnKind::Text) => "TEXT",
            (Dialect::Sqlite, ColumnKind::Time) => "DATETIME",
            (Dialect::Postgres, ColumnKind::Time) => "TIMESTAMPTZ",
            (Dialect::Sqlite, ColumnKind::Json) => "JSON",
            (Dialect::Postgres, ColumnKind::Json) => "JSONB",
            (Dialect::Sqlite, ColumnKind::Blob) => "BLOB",
            (Dialect::Postgres, ColumnKind::Blob) => "BYTEA",
        }
    }

    /// Name of the pseudo-table holding the row proposed for insertion in an upsert.
    pub(crate) fn excluded_table(self) -> &'static str {
        "EXCLUDED"
    }
}

fn write_string_literal(buf: &mut String, s: &str) {
    buf.push('\'');
    for ch in s.chars() {
        if ch == '\'' {
            buf.push('\'');
        }
        buf.push(ch);
    }
    buf.push('\'');
}

fn is_plain_ident(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return false;
    }
    let lower = name.to_ascii_lowercase();
    RESERVED.binary_search(&lower.as_str()).is_err()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_words_are_sorted() {
        let mut sorted = RESERVED.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, RESERVED);
    }

    #[test]
    fn quoting() {
        assert_eq!(Dialect::Sqlite.quote_ident("url"), "url");
        assert_eq!(Dialect::Sqlite.quote_ident("order"), "\"order\"");
        assert_eq!(Dialect::Postgres.quote_ident("my \"col\""), "\"my \"\"col\"\"\"");
        assert_eq!(Dialect::Sqlite.quote_ident("1abc"), "\"1abc\"");
    }

    #[test]
    fn literals() {
        let mut buf = String::new();
        Dialect::Sqlite.write_literal(&mut buf, &Value::Text("it's".into()));
        assert_eq!(buf, "'it''s'");

        let mut buf = String::new();
        Dialect::Sqlite.write_literal(&mut buf, &Value::Bool(true));
        assert_eq!(buf, "1");

        let mut buf = String::new();
        Dialect::Postgres.write_literal(&mut buf, &Value::Bool(false));
        assert_eq!(buf, "FALSE");

        let mut buf = String::new();
        Dialect::Sqlite.write_literal(&mut buf, &Value::Bytes(vec![0xde, 0xad]));
        assert_eq!(buf, "x'dead'");
    }
}
