//! SELECT query builder.

use crate::dialect::Dialect;
use crate::error::{SqError, SqResult};
use crate::qb::expr::{Expr, OrderTerm, SelectItem};
use crate::qb::predicate::{Predicate, render_conjunction};
use crate::qb::writer::{Render, SqlWriter, Statement};
use crate::row::{ColumnKey, Projection};
use crate::table::{ColumnDef, Table, TableInfo};

/// A table named in FROM or JOIN, with the columns it declares.
#[derive(Debug, Clone)]
pub(crate) struct Source {
    pub(crate) info: TableInfo,
    pub(crate) columns: Vec<ColumnDef>,
}

impl Source {
    pub(crate) fn of<T: Table + ?Sized>(table: &T) -> Self {
        Self {
            info: table.table_info().clone(),
            columns: table.columns(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinKind {
    fn as_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => " JOIN ",
            JoinKind::Left => " LEFT JOIN ",
            JoinKind::Right => " RIGHT JOIN ",
            JoinKind::Full => " FULL JOIN ",
            JoinKind::Cross => " CROSS JOIN ",
        }
    }
}

#[derive(Debug, Clone)]
struct Join {
    kind: JoinKind,
    source: Source,
    on: Option<Predicate>,
}

/// SELECT query builder.
///
/// Every method consumes the builder and returns the extended one; clone a
/// partially built query to branch it. Misuse (a clause given twice, a
/// malformed predicate) is recorded by the call that caused it and returned
/// by every later render or execution.
#[derive(Debug, Clone, Default)]
pub struct SelectQb {
    distinct: bool,
    distinct_on: Vec<Expr>,
    columns: Vec<SelectItem>,
    from: Option<Source>,
    joins: Vec<Join>,
    where_: Vec<Predicate>,
    group_by: Option<Vec<Expr>>,
    having: Option<Predicate>,
    order_by: Vec<OrderTerm>,
    limit: Option<u64>,
    offset: Option<u64>,
    build_error: Option<String>,
}

impl SelectQb {
    pub fn new() -> Self {
        Self::default()
    }

    fn fail(&mut self, msg: String) {
        if self.build_error.is_none() {
            self.build_error = Some(msg);
        }
    }

    fn check(&mut self, call: &str, err: Option<String>) {
        if let Some(msg) = err {
            self.fail(format!("{call}: {msg}"));
        }
    }

    // ==================== Source ====================

    pub fn from<T: Table + ?Sized>(mut self, table: &T) -> Self {
        if self.from.is_some() {
            self.fail("SelectQb::from: FROM given twice".to_string());
        } else {
            self.from = Some(Source::of(table));
        }
        self
    }

    fn push_join<T: Table + ?Sized>(mut self, kind: JoinKind, table: &T, on: Option<Predicate>) -> Self {
        if let Some(on) = &on {
            self.check("SelectQb::join", on.build_error());
        }
        self.joins.push(Join {
            kind,
            source: Source::of(table),
            on,
        });
        self
    }

    /// `JOIN table ON cond`
    pub fn join<T: Table + ?Sized>(self, table: &T, on: impl Into<Predicate>) -> Self {
        self.push_join(JoinKind::Inner, table, Some(on.into()))
    }

    pub fn left_join<T: Table + ?Sized>(self, table: &T, on: impl Into<Predicate>) -> Self {
        self.push_join(JoinKind::Left, table, Some(on.into()))
    }

    pub fn right_join<T: Table + ?Sized>(self, table: &T, on: impl Into<Predicate>) -> Self {
        self.push_join(JoinKind::Right, table, Some(on.into()))
    }

    pub fn full_join<T: Table + ?Sized>(self, table: &T, on: impl Into<Predicate>) -> Self {
        self.push_join(JoinKind::Full, table, Some(on.into()))
    }

    pub fn cross_join<T: Table + ?Sized>(self, table: &T) -> Self {
        self.push_join(JoinKind::Cross, table, None)
    }

    // ==================== Output ====================

    /// Append one output column.
    pub fn column(mut self, item: impl Into<SelectItem>) -> Self {
        let item = item.into();
        self.check("SelectQb::column", item.expr.build_error());
        self.columns.push(item);
        self
    }

    /// Append several output columns of one type.
    pub fn columns<I: Into<SelectItem>>(self, items: impl IntoIterator<Item = I>) -> Self {
        items.into_iter().fold(self, |q, item| q.column(item))
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// `SELECT DISTINCT ON (exprs)`. PostgreSQL only.
    pub fn distinct_on(mut self, exprs: impl IntoIterator<Item = Expr>) -> Self {
        if !self.distinct_on.is_empty() {
            self.fail("SelectQb::distinct_on: DISTINCT ON given twice".to_string());
            return self;
        }
        self.distinct_on = exprs.into_iter().collect();
        self
    }

    // ==================== Filtering ====================

    /// Add a WHERE condition. Repeated calls are AND-joined.
    pub fn where_(mut self, cond: impl Into<Predicate>) -> Self {
        let cond = cond.into();
        self.check("SelectQb::where_", cond.build_error());
        self.where_.push(cond);
        self
    }

    pub fn group_by(mut self, exprs: impl IntoIterator<Item = Expr>) -> Self {
        if self.group_by.is_some() {
            self.fail("SelectQb::group_by: GROUP BY given twice".to_string());
            return self;
        }
        self.group_by = Some(exprs.into_iter().collect());
        self
    }

    pub fn having(mut self, cond: impl Into<Predicate>) -> Self {
        let cond = cond.into();
        if self.having.is_some() {
            self.fail("SelectQb::having: HAVING given twice".to_string());
            return self;
        }
        self.check("SelectQb::having", cond.build_error());
        self.having = Some(cond);
        self
    }

    // ==================== Ordering & pagination ====================

    /// Add an ORDER BY term. Repeated calls accumulate.
    pub fn order_by(mut self, term: impl Into<OrderTerm>) -> Self {
        let term = term.into();
        self.check("SelectQb::order_by", term.expr().build_error());
        self.order_by.push(term);
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        if self.limit.is_some() {
            self.fail("SelectQb::limit: LIMIT given twice".to_string());
        } else {
            self.limit = Some(n);
        }
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        if self.offset.is_some() {
            self.fail("SelectQb::offset: OFFSET given twice".to_string());
        } else {
            self.offset = Some(n);
        }
        self
    }

    /// 1-based page of `per_page` rows.
    pub fn paginate(self, page: u64, per_page: u64) -> Self {
        let size = per_page.max(1);
        self.limit(size).offset((page.max(1) - 1) * size)
    }

    // ==================== Rendering ====================

    /// Wrap into `SELECT EXISTS (SELECT 1 ...)`.
    pub fn exists_query(self) -> ExistsQuery {
        ExistsQuery { query: self }
    }

    pub(crate) fn build_error_message(&self) -> Option<String> {
        self.build_error.clone()
    }

    /// Number of output columns, 0 when unknown.
    pub(crate) fn column_count(&self) -> usize {
        self.projection().len()
    }

    pub(crate) fn render_subquery(&self, w: &mut SqlWriter) -> SqResult<()> {
        self.render_body(w, false)
    }

    fn sources(&self) -> impl Iterator<Item = &Source> {
        self.from
            .iter()
            .chain(self.joins.iter().map(|j| &j.source))
    }

    fn render_body(&self, w: &mut SqlWriter, select_one: bool) -> SqResult<()> {
        if let Some(msg) = &self.build_error {
            return Err(SqError::build(msg.clone()));
        }

        w.push("SELECT ");
        if !self.distinct_on.is_empty() {
            if w.dialect() != Dialect::Postgres {
                return Err(w.unsupported("DISTINCT ON"));
            }
            w.push("DISTINCT ON (");
            w.push_list(&self.distinct_on, |e, w| e.render(w))?;
            w.push(") ");
        } else if self.distinct {
            w.push("DISTINCT ");
        }

        if select_one {
            w.push("1");
        } else if !self.columns.is_empty() {
            w.push_list(&self.columns, |c, w| c.render(w))?;
        } else {
            let defaults: Vec<(&TableInfo, &str)> = self
                .sources()
                .flat_map(|s| s.columns.iter().map(move |c| (&s.info, c.name.as_str())))
                .collect();
            if defaults.is_empty() {
                return Err(SqError::render(
                    "SelectQb: nothing to select, add from() or column()",
                ));
            }
            w.push_list(&defaults, |(table, name), w| {
                w.push_column(table, name);
                Ok(())
            })?;
        }

        if let Some(from) = &self.from {
            w.push(" FROM ");
            w.push_table(&from.info);
        }

        for join in &self.joins {
            w.push(join.kind.as_sql());
            w.push_table(&join.source.info);
            if let Some(on) = &join.on {
                w.push(" ON ");
                on.render(w)?;
            }
        }

        if !self.where_.is_empty() {
            w.push(" WHERE ");
            render_conjunction(w, &self.where_)?;
        }

        if let Some(group_by) = &self.group_by {
            if !group_by.is_empty() {
                w.push(" GROUP BY ");
                w.push_list(group_by, |e, w| e.render(w))?;
            }
        }

        if let Some(having) = &self.having {
            w.push(" HAVING ");
            having.render(w)?;
        }

        if !self.order_by.is_empty() {
            w.push(" ORDER BY ");
            w.push_list(&self.order_by, |t, w| t.render(w))?;
        }

        // Literal integers: they are not user input.
        match (self.limit, self.offset) {
            (Some(limit), offset) => {
                w.push(&format!(" LIMIT {limit}"));
                if let Some(offset) = offset {
                    w.push(&format!(" OFFSET {offset}"));
                }
            }
            (None, Some(offset)) => {
                // SQLite only accepts OFFSET after a LIMIT.
                if w.dialect() == Dialect::Sqlite {
                    w.push(" LIMIT -1");
                }
                w.push(&format!(" OFFSET {offset}"));
            }
            (None, None) => {}
        }

        Ok(())
    }
}

impl Statement for SelectQb {
    fn render_statement(&self, w: &mut SqlWriter) -> SqResult<()> {
        self.render_body(w, false)
    }

    fn build_error(&self) -> Option<&str> {
        self.build_error.as_deref()
    }

    fn projection(&self) -> Projection {
        if !self.columns.is_empty() {
            return Projection::new(self.columns.iter().map(SelectItem::key));
        }
        Projection::new(self.sources().flat_map(|s| {
            s.columns
                .iter()
                .map(|c| ColumnKey::new(s.info.qualifier(), &c.name))
        }))
    }
}

/// `SELECT EXISTS (SELECT 1 FROM ...)`: one boolean column.
#[derive(Debug, Clone)]
pub struct ExistsQuery {
    query: SelectQb,
}

impl Statement for ExistsQuery {
    fn render_statement(&self, w: &mut SqlWriter) -> SqResult<()> {
        w.push("SELECT EXISTS (");
        self.query.render_body(w, true)?;
        w.push(")");
        Ok(())
    }

    fn build_error(&self) -> Option<&str> {
        self.query.build_error.as_deref()
    }
}
