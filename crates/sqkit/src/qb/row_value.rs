//! Fixed-arity tuples: `(a, b, ...)`.

use crate::error::SqResult;
use crate::qb::expr::Expr;
use crate::qb::predicate::{CmpOp, Predicate};
use crate::qb::select::SelectQb;
use crate::qb::writer::{Render, SqlWriter};

/// A parenthesized list of expressions.
#[derive(Debug, Clone)]
pub struct RowValue {
    items: Vec<Expr>,
}

impl RowValue {
    pub fn new(items: impl IntoIterator<Item = Expr>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn into_items(self) -> Vec<Expr> {
        self.items
    }

    pub(crate) fn build_error(&self) -> Option<String> {
        if self.items.is_empty() {
            return Some("RowValue: a row needs at least one value".to_string());
        }
        self.items.iter().find_map(Expr::build_error)
    }

    /// `(a, b) = (x, y)`
    pub fn eq(self, other: impl Into<RowValue>) -> Predicate {
        let other = other.into();
        if let Some(msg) = arity_mismatch("RowValue::eq", self.len(), 1, &other) {
            return Predicate::Invalid(msg);
        }
        Predicate::Compare {
            lhs: Expr::Row(self),
            op: CmpOp::Eq,
            rhs: Expr::Row(other),
        }
    }

    /// `(a, b) IN (VALUES (x1, y1), (x2, y2))`. An empty list matches nothing.
    pub fn in_values<R: Into<RowValue>>(self, rows: impl IntoIterator<Item = R>) -> Predicate {
        self.membership(rows, false)
    }

    /// `(a, b) NOT IN (VALUES ...)`. An empty list matches everything.
    pub fn not_in_values<R: Into<RowValue>>(self, rows: impl IntoIterator<Item = R>) -> Predicate {
        self.membership(rows, true)
    }

    fn membership<R: Into<RowValue>>(
        self,
        rows: impl IntoIterator<Item = R>,
        negated: bool,
    ) -> Predicate {
        let rows = RowValues::new(rows);
        for (i, row) in rows.rows.iter().enumerate() {
            if let Some(msg) = arity_mismatch("RowValue::in_values", self.len(), i + 1, row) {
                return Predicate::Invalid(msg);
            }
        }
        if rows.rows.is_empty() {
            return if negated {
                Predicate::True
            } else {
                Predicate::False
            };
        }
        Predicate::InRows {
            lhs: self,
            rows,
            negated,
        }
    }

    /// `(a, b) IN (SELECT x, y FROM ...)`
    pub fn in_select(self, query: SelectQb) -> Predicate {
        let width = query.column_count();
        if width != 0 && width != self.len() {
            return Predicate::Invalid(format!(
                "RowValue::in_select: row has {} values but the query selects {width} columns",
                self.len()
            ));
        }
        Predicate::InQuery {
            lhs: Expr::Row(self),
            query: Box::new(query),
            negated: false,
        }
    }
}

fn arity_mismatch(call: &str, want: usize, row: usize, got: &RowValue) -> Option<String> {
    (got.len() != want).then(|| {
        format!(
            "{call}: row {row} has {} values, expected {want}",
            got.len()
        )
    })
}

impl Render for RowValue {
    fn render(&self, w: &mut SqlWriter) -> SqResult<()> {
        w.push("(");
        w.push_list(&self.items, |e, w| e.render(w))?;
        w.push(")");
        Ok(())
    }
}

/// Comma-joined rows: `(a, b), (c, d)`.
#[derive(Debug, Clone, Default)]
pub struct RowValues {
    rows: Vec<RowValue>,
}

impl RowValues {
    pub fn new<R: Into<RowValue>>(rows: impl IntoIterator<Item = R>) -> Self {
        Self {
            rows: rows.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub(crate) fn build_error(&self) -> Option<String> {
        let width = self.rows.first().map(RowValue::len)?;
        for (i, row) in self.rows.iter().enumerate() {
            if let Some(msg) = arity_mismatch("RowValues", width, i + 1, row) {
                return Some(msg);
            }
            if let Some(msg) = row.build_error() {
                return Some(msg);
            }
        }
        None
    }
}

impl Render for RowValues {
    fn render(&self, w: &mut SqlWriter) -> SqResult<()> {
        w.push_list(&self.rows, |r, w| r.render(w))
    }
}

macro_rules! tuple_into_row {
    ($($name:ident),+) => {
        impl<$($name: Into<Expr>),+> From<($($name,)+)> for RowValue {
            #[allow(non_snake_case)]
            fn from(($($name,)+): ($($name,)+)) -> Self {
                RowValue::new([$($name.into()),+])
            }
        }
    };
}

tuple_into_row!(A);
tuple_into_row!(A, B);
tuple_into_row!(A, B, C);
tuple_into_row!(A, B, C, D);
tuple_into_row!(A, B, C, D, E);
tuple_into_row!(A, B, C, D, E, F);

impl From<Vec<Expr>> for RowValue {
    fn from(items: Vec<Expr>) -> Self {
        RowValue::new(items)
    }
}
