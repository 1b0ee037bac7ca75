//! Boolean expressions for WHERE / HAVING / ON / CASE WHEN.
//!
//! [`Predicate`] supports:
//! - AND/OR/NOT grouping
//! - comparison operators (`=`, `<>`, `<`, `LIKE`, ...)
//! - IN against value lists, sub-queries and row values
//! - NULL checks, BETWEEN, EXISTS
//! - templates with `?` placeholders
//!
//! Parentheses are only emitted where precedence needs them: an OR group inside
//! an AND, an AND group inside an OR, raw SQL inside either group, and any
//! non-atomic operand of NOT.

use crate::error::{SqError, SqResult};
use crate::qb::expr::Expr;
use crate::qb::row_value::{RowValue, RowValues};
use crate::qb::select::SelectQb;
use crate::qb::writer::{Render, SqlWriter, render_template};

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    NotLike,
    ILike,
    NotILike,
}

impl CmpOp {
    fn as_sql(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "<>",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Like => "LIKE",
            CmpOp::NotLike => "NOT LIKE",
            CmpOp::ILike => "ILIKE",
            CmpOp::NotILike => "NOT ILIKE",
        }
    }
}

/// Boolean expression node.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// AND group: all conditions must be true.
    And(Vec<Predicate>),

    /// OR group: at least one condition must be true.
    Or(Vec<Predicate>),

    /// NOT: negate the inner predicate.
    Not(Box<Predicate>),

    /// `lhs op rhs`
    Compare { lhs: Expr, op: CmpOp, rhs: Expr },

    /// `expr IS NULL` or `expr IS NOT NULL`
    NullCheck { expr: Expr, is_null: bool },

    /// `lhs IN (a, b, ...)` or `lhs NOT IN (...)`
    InList {
        lhs: Expr,
        values: Vec<Expr>,
        negated: bool,
    },

    /// `lhs IN (SELECT ...)`; `lhs` may be a row value.
    InQuery {
        lhs: Expr,
        query: Box<SelectQb>,
        negated: bool,
    },

    /// `(a, b) IN (VALUES (..), (..))`
    InRows {
        lhs: RowValue,
        rows: RowValues,
        negated: bool,
    },

    /// `expr BETWEEN low AND high`
    Between {
        expr: Expr,
        low: Expr,
        high: Expr,
        negated: bool,
    },

    /// `EXISTS (SELECT ...)`
    Exists { query: Box<SelectQb>, negated: bool },

    /// A boolean-valued expression (boolean column, CASE, ...).
    Expr(Expr),

    /// SQL with `?` slots filled by rendered arguments.
    Template { sql: String, args: Vec<Expr> },

    /// A predicate that could not be built. Carries the reason.
    Invalid(String),

    /// Always true.
    True,

    /// Always false (used for empty IN lists).
    False,
}

impl Predicate {
    pub fn and(self, other: Predicate) -> Predicate {
        match self {
            Predicate::And(mut items) => {
                items.push(other);
                Predicate::And(items)
            }
            first => Predicate::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Predicate {
        match self {
            Predicate::Or(mut items) => {
                items.push(other);
                Predicate::Or(items)
            }
            first => Predicate::Or(vec![first, other]),
        }
    }

    pub fn not(self) -> Predicate {
        Predicate::Not(Box::new(self))
    }

    /// First construction error anywhere in this tree.
    pub(crate) fn build_error(&self) -> Option<String> {
        match self {
            Predicate::Invalid(msg) => Some(msg.clone()),
            Predicate::And(items) | Predicate::Or(items) => {
                items.iter().find_map(Predicate::build_error)
            }
            Predicate::Not(inner) => inner.build_error(),
            Predicate::Compare { lhs, rhs, .. } => lhs.build_error().or_else(|| rhs.build_error()),
            Predicate::NullCheck { expr, .. } | Predicate::Expr(expr) => expr.build_error(),
            Predicate::InList { lhs, values, .. } => lhs
                .build_error()
                .or_else(|| values.iter().find_map(Expr::build_error)),
            Predicate::InQuery { lhs, query, .. } => {
                lhs.build_error().or_else(|| query.build_error_message())
            }
            Predicate::InRows { lhs, rows, .. } => lhs.build_error().or_else(|| rows.build_error()),
            Predicate::Between {
                expr, low, high, ..
            } => expr
                .build_error()
                .or_else(|| low.build_error())
                .or_else(|| high.build_error()),
            Predicate::Exists { query, .. } => query.build_error_message(),
            Predicate::Template { args, .. } => args.iter().find_map(Expr::build_error),
            Predicate::True | Predicate::False => None,
        }
    }

    /// The predicate a single-item group renders as.
    fn collapsed(&self) -> &Predicate {
        match self {
            Predicate::And(items) | Predicate::Or(items) if items.len() == 1 => {
                items[0].collapsed()
            }
            other => other,
        }
    }

    /// Raw SQL whose operators are unknown to the renderer.
    fn is_opaque(&self) -> bool {
        matches!(
            self,
            Predicate::Template { .. } | Predicate::Expr(Expr::Raw(_) | Expr::Template { .. })
        )
    }

    fn needs_parens_in_not(&self) -> bool {
        !matches!(
            self,
            Predicate::Expr(e) if e.is_atomic()
        ) && !matches!(self, Predicate::True | Predicate::False | Predicate::Exists { .. })
    }
}

/// Combine predicates with AND.
pub fn and(preds: impl IntoIterator<Item = Predicate>) -> Predicate {
    Predicate::And(preds.into_iter().collect())
}

/// Combine predicates with OR.
pub fn or(preds: impl IntoIterator<Item = Predicate>) -> Predicate {
    Predicate::Or(preds.into_iter().collect())
}

/// Negate a predicate.
pub fn not(pred: impl Into<Predicate>) -> Predicate {
    Predicate::Not(Box::new(pred.into()))
}

/// `EXISTS (query)`
pub fn exists(query: SelectQb) -> Predicate {
    Predicate::Exists {
        query: Box::new(query),
        negated: false,
    }
}

/// `NOT EXISTS (query)`
pub fn not_exists(query: SelectQb) -> Predicate {
    Predicate::Exists {
        query: Box::new(query),
        negated: true,
    }
}

/// A predicate written as SQL with `?` slots.
pub fn predicate(sql: impl Into<String>, args: impl IntoIterator<Item = Expr>) -> Predicate {
    Predicate::Template {
        sql: sql.into(),
        args: args.into_iter().collect(),
    }
}

impl From<Expr> for Predicate {
    fn from(e: Expr) -> Self {
        match e {
            Expr::Predicate(p) => *p,
            other => Predicate::Expr(other),
        }
    }
}

fn render_group(
    w: &mut SqlWriter,
    items: &[Predicate],
    sep: &str,
    empty: &str,
    wrap: fn(&Predicate) -> bool,
) -> SqResult<()> {
    match items {
        [] => {
            w.push(empty);
            Ok(())
        }
        [only] => only.render(w),
        _ => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    w.push(sep);
                }
                if wrap(item) {
                    w.push("(");
                    item.render(w)?;
                    w.push(")");
                } else {
                    item.render(w)?;
                }
            }
            Ok(())
        }
    }
}

/// Render a list of conditions AND-joined, as repeated `where_` calls are.
pub(crate) fn render_conjunction(w: &mut SqlWriter, items: &[Predicate]) -> SqResult<()> {
    render_group(w, items, " AND ", "1 = 1", |p| {
        let p = p.collapsed();
        p.is_opaque() || matches!(p, Predicate::Or(items) if items.len() > 1)
    })
}

impl Render for Predicate {
    fn render(&self, w: &mut SqlWriter) -> SqResult<()> {
        match self {
            Predicate::And(items) => render_conjunction(w, items),
            Predicate::Or(items) => render_group(w, items, " OR ", "1 = 0", |p| {
                let p = p.collapsed();
                p.is_opaque() || matches!(p, Predicate::And(items) if items.len() > 1)
            }),
            Predicate::Not(inner) => {
                w.push("NOT ");
                if inner.needs_parens_in_not() {
                    w.push("(");
                    inner.render(w)?;
                    w.push(")");
                    Ok(())
                } else {
                    inner.render(w)
                }
            }
            Predicate::Compare { lhs, op, rhs } => {
                if matches!(op, CmpOp::ILike | CmpOp::NotILike)
                    && w.dialect() == crate::dialect::Dialect::Sqlite
                {
                    return Err(w.unsupported("ILIKE"));
                }
                lhs.render(w)?;
                w.push(" ");
                w.push(op.as_sql());
                w.push(" ");
                rhs.render(w)
            }
            Predicate::NullCheck { expr, is_null } => {
                expr.render(w)?;
                w.push(if *is_null { " IS NULL" } else { " IS NOT NULL" });
                Ok(())
            }
            Predicate::InList {
                lhs,
                values,
                negated,
            } => {
                if values.is_empty() {
                    w.push(if *negated { "1 = 1" } else { "1 = 0" });
                    return Ok(());
                }
                lhs.render(w)?;
                w.push(if *negated { " NOT IN (" } else { " IN (" });
                w.push_list(values, |v, w| v.render(w))?;
                w.push(")");
                Ok(())
            }
            Predicate::InQuery {
                lhs,
                query,
                negated,
            } => {
                lhs.render(w)?;
                w.push(if *negated { " NOT IN (" } else { " IN (" });
                query.render_subquery(w)?;
                w.push(")");
                Ok(())
            }
            // SQLite only accepts a sub-query on the right of a row-value IN,
            // so the rows go through a VALUES table.
            Predicate::InRows { lhs, rows, negated } => {
                lhs.render(w)?;
                w.push(if *negated { " NOT IN (VALUES " } else { " IN (VALUES " });
                rows.render(w)?;
                w.push(")");
                Ok(())
            }
            Predicate::Between {
                expr,
                low,
                high,
                negated,
            } => {
                expr.render(w)?;
                w.push(if *negated { " NOT BETWEEN " } else { " BETWEEN " });
                low.render(w)?;
                w.push(" AND ");
                high.render(w)
            }
            Predicate::Exists { query, negated } => {
                w.push(if *negated { "NOT EXISTS (" } else { "EXISTS (" });
                query.render_subquery(w)?;
                w.push(")");
                Ok(())
            }
            Predicate::Expr(e) => e.render(w),
            Predicate::Template { sql, args } => render_template(w, sql, args, |a, w| a.render(w)),
            Predicate::Invalid(msg) => Err(SqError::render(msg.clone())),
            Predicate::True => {
                w.push("1 = 1");
                Ok(())
            }
            Predicate::False => {
                w.push("1 = 0");
                Ok(())
            }
        }
    }
}
