//! Hand-written SQL that still goes through the renderer.

use crate::error::SqResult;
use crate::qb::expr::SelectItem;
use crate::qb::writer::{Render, SqlWriter, Statement, render_template};
use crate::row::Projection;
use crate::value::Value;

/// A statement written by hand with `?` placeholders.
///
/// Placeholders are rewritten for the target dialect. With
/// [`field`](RawQuery::field) the statement becomes `SELECT <fields> <sql>`,
/// so typed getters can read the result; with
/// [`returning`](RawQuery::returning) a write gets `RETURNING <fields>`.
#[derive(Debug, Clone)]
pub struct RawQuery {
    sql: String,
    args: Vec<Value>,
    fields: Vec<SelectItem>,
    returning: Vec<SelectItem>,
}

/// Start a raw statement.
pub fn raw(sql: impl Into<String>) -> RawQuery {
    RawQuery {
        sql: sql.into(),
        args: Vec::new(),
        fields: Vec::new(),
        returning: Vec::new(),
    }
}

impl RawQuery {
    /// Bind the next `?`.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Prepend an output column: `SELECT <fields> <sql>`.
    pub fn field(mut self, item: impl Into<SelectItem>) -> Self {
        self.fields.push(item.into());
        self
    }

    /// Append a RETURNING column.
    pub fn returning(mut self, item: impl Into<SelectItem>) -> Self {
        self.returning.push(item.into());
        self
    }
}

impl Statement for RawQuery {
    fn render_statement(&self, w: &mut SqlWriter) -> SqResult<()> {
        if !self.fields.is_empty() {
            w.push("SELECT ");
            w.push_list(&self.fields, |item, w| item.render(w))?;
            w.push(" ");
        }
        render_template(w, &self.sql, &self.args, |v, w| {
            w.push_value(v);
            Ok(())
        })?;
        if !self.returning.is_empty() {
            w.push(" RETURNING ");
            w.push_list(&self.returning, |item, w| item.render(w))?;
        }
        Ok(())
    }

    fn projection(&self) -> Projection {
        let items = if self.fields.is_empty() {
            &self.returning
        } else {
            &self.fields
        };
        Projection::new(items.iter().map(SelectItem::key))
    }
}
