//! DELETE query builder.

use crate::error::SqResult;
use crate::qb::expr::SelectItem;
use crate::qb::predicate::{Predicate, render_conjunction};
use crate::qb::writer::{Render, SqlWriter, Statement};
use crate::row::Projection;
use crate::table::{Table, TableInfo};

/// DELETE query builder.
///
/// Omitting `where_` deletes every row of the table.
#[derive(Debug, Clone)]
pub struct DeleteQb {
    table: TableInfo,
    where_: Vec<Predicate>,
    returning: Vec<SelectItem>,
    build_error: Option<String>,
}

impl DeleteQb {
    pub fn new<T: Table + ?Sized>(table: &T) -> Self {
        Self {
            table: table.table_info().clone(),
            where_: Vec::new(),
            returning: Vec::new(),
            build_error: None,
        }
    }

    /// Add a WHERE condition. Repeated calls are AND-joined.
    pub fn where_(mut self, cond: impl Into<Predicate>) -> Self {
        let cond = cond.into();
        match cond.build_error() {
            Some(msg) if self.build_error.is_none() => {
                self.build_error = Some(format!("DeleteQb::where_: {msg}"));
            }
            Some(_) => {}
            None => self.where_.push(cond),
        }
        self
    }

    /// Append a RETURNING column.
    pub fn returning(mut self, item: impl Into<SelectItem>) -> Self {
        self.returning.push(item.into());
        self
    }
}

impl Statement for DeleteQb {
    fn render_statement(&self, w: &mut SqlWriter) -> SqResult<()> {
        w.push("DELETE FROM ");
        w.push_table(&self.table);
        if !self.where_.is_empty() {
            w.push(" WHERE ");
            render_conjunction(w, &self.where_)?;
        }
        if !self.returning.is_empty() {
            w.push(" RETURNING ");
            let qualifier = self.table.qualifier().to_string();
            w.with_excluded(&[qualifier.as_str()], |w| {
                w.push_list(&self.returning, |item, w| item.render(w))
            })?;
        }
        Ok(())
    }

    fn build_error(&self) -> Option<&str> {
        self.build_error.as_deref()
    }

    fn projection(&self) -> Projection {
        Projection::new(self.returning.iter().map(SelectItem::key))
    }
}
