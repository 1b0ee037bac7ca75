//! Value expressions.
//!
//! [`Expr`] is the closed set of things that can appear where SQL expects a
//! value: literals, named parameters, column references, raw fragments,
//! templates, sub-queries, row values, CASE expressions and predicates.

use crate::error::SqResult;
use crate::qb::case::{CaseExpr, SimpleCase};
use crate::qb::field::Field;
use crate::qb::predicate::Predicate;
use crate::qb::row_value::RowValue;
use crate::qb::select::SelectQb;
use crate::qb::writer::{Render, SqlWriter, render_template};
use crate::row::ColumnKey;
use crate::table::TableInfo;
use crate::value::Value;
use chrono::{DateTime, Utc};

/// A reference to one column of one table instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub table: TableInfo,
    pub name: String,
}

impl ColumnRef {
    pub(crate) fn key(&self) -> ColumnKey {
        ColumnKey::new(self.table.qualifier(), &self.name)
    }
}

impl Render for ColumnRef {
    fn render(&self, w: &mut SqlWriter) -> SqResult<()> {
        w.push_column(&self.table, &self.name);
        Ok(())
    }
}

impl<T> From<&Field<T>> for ColumnRef {
    fn from(f: &Field<T>) -> Self {
        f.col()
    }
}

/// Expression node.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A bound literal.
    Value(Value),
    /// A named parameter; repeated names share one argument.
    Param { name: String, value: Value },
    /// A column reference.
    Column(ColumnRef),
    /// Raw SQL emitted verbatim.
    Raw(String),
    /// SQL with `?` slots filled by rendered arguments.
    Template { sql: String, args: Vec<Expr> },
    /// A parenthesized sub-query.
    Subquery(Box<SelectQb>),
    /// A row value `(a, b, ...)`.
    Row(RowValue),
    /// A searched CASE.
    Case(Box<CaseExpr>),
    /// A simple CASE.
    SimpleCase(Box<SimpleCase>),
    /// A boolean-valued predicate.
    Predicate(Box<Predicate>),
    /// The upsert pseudo-table's copy of a column (`EXCLUDED.name`).
    Excluded(String),
}

impl Expr {
    pub fn value(v: impl Into<Value>) -> Self {
        Expr::Value(v.into())
    }

    pub fn null() -> Self {
        Expr::Value(Value::Null)
    }

    /// Whether this node renders as a single token (no parentheses needed).
    pub(crate) fn is_atomic(&self) -> bool {
        matches!(
            self,
            Expr::Value(_) | Expr::Param { .. } | Expr::Column(_) | Expr::Excluded(_)
        )
    }

    pub(crate) fn build_error(&self) -> Option<String> {
        match self {
            Expr::Subquery(q) => q.build_error_message(),
            Expr::Predicate(p) => p.build_error(),
            Expr::Template { args, .. } => args.iter().find_map(Expr::build_error),
            Expr::Row(r) => r.build_error(),
            Expr::Case(c) => c.build_error(),
            Expr::SimpleCase(c) => c.build_error(),
            _ => None,
        }
    }

    /// Ascending order term.
    pub fn asc(self) -> OrderTerm {
        OrderTerm::from(self).asc()
    }

    /// Descending order term.
    pub fn desc(self) -> OrderTerm {
        OrderTerm::from(self).desc()
    }

    /// Use as a select column under `alias`.
    pub fn as_(self, alias: impl Into<String>) -> SelectItem {
        SelectItem {
            expr: self,
            alias: Some(alias.into()),
        }
    }
}

impl Render for Expr {
    fn render(&self, w: &mut SqlWriter) -> SqResult<()> {
        match self {
            Expr::Value(v) => w.push_value(v),
            Expr::Param { name, value } => w.push_param(name, value),
            Expr::Column(c) => c.render(w)?,
            Expr::Raw(sql) => w.push(sql),
            Expr::Template { sql, args } => render_template(w, sql, args, |a, w| a.render(w))?,
            Expr::Subquery(q) => {
                w.push("(");
                q.render_subquery(w)?;
                w.push(")");
            }
            Expr::Row(r) => r.render(w)?,
            Expr::Case(c) => c.render(w)?,
            Expr::SimpleCase(c) => c.render(w)?,
            Expr::Predicate(p) => {
                w.push("(");
                p.render(w)?;
                w.push(")");
            }
            Expr::Excluded(name) => {
                w.push(w.dialect().excluded_table());
                w.push(".");
                w.push_ident(name);
            }
        }
        Ok(())
    }
}

macro_rules! expr_from_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Expr {
                fn from(v: $ty) -> Self {
                    Expr::Value(v.into())
                }
            }
        )*
    };
}

expr_from_value!(
    Value,
    bool,
    i32,
    i64,
    f64,
    String,
    &str,
    Vec<u8>,
    DateTime<Utc>,
    serde_json::Value,
);

impl<T> From<&Field<T>> for Expr {
    fn from(f: &Field<T>) -> Self {
        Expr::Column(f.col())
    }
}

impl<T> From<Field<T>> for Expr {
    fn from(f: Field<T>) -> Self {
        Expr::Column(f.col())
    }
}

impl From<ColumnRef> for Expr {
    fn from(c: ColumnRef) -> Self {
        Expr::Column(c)
    }
}

impl From<SelectQb> for Expr {
    fn from(q: SelectQb) -> Self {
        Expr::Subquery(Box::new(q))
    }
}

impl From<RowValue> for Expr {
    fn from(r: RowValue) -> Self {
        Expr::Row(r)
    }
}

impl From<CaseExpr> for Expr {
    fn from(c: CaseExpr) -> Self {
        Expr::Case(Box::new(c))
    }
}

impl From<SimpleCase> for Expr {
    fn from(c: SimpleCase) -> Self {
        Expr::SimpleCase(Box::new(c))
    }
}

impl From<Predicate> for Expr {
    fn from(p: Predicate) -> Self {
        Expr::Predicate(Box::new(p))
    }
}

/// A named parameter. Every occurrence of the same name binds one argument.
pub fn param(name: impl Into<String>, value: impl Into<Value>) -> Expr {
    Expr::Param {
        name: name.into(),
        value: value.into(),
    }
}

/// Raw SQL emitted verbatim, e.g. `literal("CURRENT_TIMESTAMP")`.
pub fn literal(sql: impl Into<String>) -> Expr {
    Expr::Raw(sql.into())
}

/// SQL with `?` slots, e.g. `template("COALESCE(?, ?)", [a.into(), b.into()])`.
pub fn template(sql: impl Into<String>, args: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::Template {
        sql: sql.into(),
        args: args.into_iter().collect(),
    }
}

/// `COUNT(*)`
pub fn count_star() -> Expr {
    Expr::Raw("COUNT(*)".to_string())
}

/// One entry of a SELECT list.
#[derive(Debug, Clone)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectItem {
    pub(crate) fn key(&self) -> ColumnKey {
        match (&self.alias, &self.expr) {
            (Some(alias), _) => ColumnKey::new("", alias),
            (None, Expr::Column(c)) => c.key(),
            (None, _) => ColumnKey::default(),
        }
    }
}

impl Render for SelectItem {
    fn render(&self, w: &mut SqlWriter) -> SqResult<()> {
        self.expr.render(w)?;
        if let Some(alias) = &self.alias {
            w.push(" AS ");
            w.push_ident(alias);
        }
        Ok(())
    }
}

impl From<Expr> for SelectItem {
    fn from(expr: Expr) -> Self {
        SelectItem { expr, alias: None }
    }
}

impl From<Expr> for OrderTerm {
    fn from(expr: Expr) -> Self {
        OrderTerm {
            expr,
            direction: None,
            nulls: None,
        }
    }
}

// Everything that converts into an `Expr` can also head a select item or an
// order term without naming `Expr` first.
macro_rules! via_expr {
    ($($target:ty),*) => {
        $(
            impl<T> From<&Field<T>> for $target {
                fn from(f: &Field<T>) -> Self {
                    Expr::from(f).into()
                }
            }

            impl From<ColumnRef> for $target {
                fn from(c: ColumnRef) -> Self {
                    Expr::from(c).into()
                }
            }

            impl From<CaseExpr> for $target {
                fn from(c: CaseExpr) -> Self {
                    Expr::from(c).into()
                }
            }

            impl From<SimpleCase> for $target {
                fn from(c: SimpleCase) -> Self {
                    Expr::from(c).into()
                }
            }

            impl From<SelectQb> for $target {
                fn from(q: SelectQb) -> Self {
                    Expr::from(q).into()
                }
            }
        )*
    };
}

via_expr!(SelectItem, OrderTerm);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nulls {
    First,
    Last,
}

/// One entry of an ORDER BY list.
#[derive(Debug, Clone)]
pub struct OrderTerm {
    expr: Expr,
    direction: Option<Direction>,
    nulls: Option<Nulls>,
}

impl OrderTerm {
    pub fn asc(mut self) -> Self {
        self.direction = Some(Direction::Asc);
        self
    }

    pub fn desc(mut self) -> Self {
        self.direction = Some(Direction::Desc);
        self
    }

    pub fn nulls_first(mut self) -> Self {
        self.nulls = Some(Nulls::First);
        self
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls = Some(Nulls::Last);
        self
    }

    pub(crate) fn expr(&self) -> &Expr {
        &self.expr
    }
}

impl Render for OrderTerm {
    fn render(&self, w: &mut SqlWriter) -> SqResult<()> {
        self.expr.render(w)?;
        match self.direction {
            Some(Direction::Asc) => w.push(" ASC"),
            Some(Direction::Desc) => w.push(" DESC"),
            None => {}
        }
        match self.nulls {
            Some(Nulls::First) => w.push(" NULLS FIRST"),
            Some(Nulls::Last) => w.push(" NULLS LAST"),
            None => {}
        }
        Ok(())
    }
}
