//! `column = value` pairs for UPDATE and upsert clauses.

use crate::error::SqResult;
use crate::qb::expr::{ColumnRef, Expr};
use crate::qb::field::Field;
use crate::qb::writer::{Render, SqlWriter};

/// One `SET` entry. The left-hand side always renders unqualified.
#[derive(Debug, Clone)]
pub struct Assignment {
    column: ColumnRef,
    value: Expr,
}

impl Assignment {
    pub fn new(column: impl Into<ColumnRef>, value: impl Into<Expr>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn column(&self) -> &ColumnRef {
        &self.column
    }

    pub(crate) fn build_error(&self) -> Option<String> {
        self.value.build_error()
    }
}

/// `name = EXCLUDED.name`: take the value the failed insert proposed.
pub fn set_excluded<T>(field: &Field<T>) -> Assignment {
    Assignment {
        column: field.col(),
        value: Expr::Excluded(field.name().to_string()),
    }
}

impl Render for Assignment {
    fn render(&self, w: &mut SqlWriter) -> SqResult<()> {
        w.push_ident(&self.column.name);
        w.push(" = ");
        self.value.render(w)
    }
}
