//! UPDATE query builder.

use crate::error::{SqError, SqResult};
use crate::qb::assignment::Assignment;
use crate::qb::expr::{ColumnRef, SelectItem};
use crate::qb::insert::ColumnSetter;
use crate::qb::predicate::{Predicate, render_conjunction};
use crate::qb::writer::{Render, SqlWriter, Statement};
use crate::row::Projection;
use crate::table::{Table, TableInfo};

/// UPDATE query builder.
///
/// Omitting `where_` updates every row of the table.
#[derive(Debug, Clone)]
pub struct UpdateQb {
    table: TableInfo,
    sets: Vec<Assignment>,
    where_: Vec<Predicate>,
    returning: Vec<SelectItem>,
    build_error: Option<String>,
}

impl UpdateQb {
    pub fn new<T: Table + ?Sized>(table: &T) -> Self {
        Self {
            table: table.table_info().clone(),
            sets: Vec::new(),
            where_: Vec::new(),
            returning: Vec::new(),
            build_error: None,
        }
    }

    fn fail(&mut self, msg: String) {
        if self.build_error.is_none() {
            self.build_error = Some(msg);
        }
    }

    /// Add one assignment.
    pub fn set(mut self, assignment: Assignment) -> Self {
        let column = assignment.column();
        if column.table.name != self.table.name {
            let msg = format!(
                "UpdateQb::set: column {:?} belongs to table {:?}",
                column.name, column.table.name
            );
            self.fail(msg);
            return self;
        }
        if self.sets.iter().any(|s| s.column().name == column.name) {
            let msg = format!("UpdateQb::set: column {:?} set twice", column.name);
            self.fail(msg);
            return self;
        }
        if let Some(msg) = assignment.build_error() {
            self.fail(format!("UpdateQb::set: {msg}"));
            return self;
        }
        self.sets.push(assignment);
        self
    }

    /// Add several assignments.
    pub fn sets(self, assignments: impl IntoIterator<Item = Assignment>) -> Self {
        assignments.into_iter().fold(self, UpdateQb::set)
    }

    /// Add assignments through a setter callback.
    pub fn setx(mut self, f: impl FnOnce(&mut ColumnSetter)) -> Self {
        let mut setter = ColumnSetter::for_update(self.table.clone());
        f(&mut setter);
        match setter.finish() {
            Ok(rows) => {
                for cell in rows.into_iter().flatten() {
                    if self.sets.iter().any(|s| s.column().name == cell.name) {
                        self.fail(format!("UpdateQb::setx: column {:?} set twice", cell.name));
                        return self;
                    }
                    let column = ColumnRef {
                        table: self.table.clone(),
                        name: cell.name,
                    };
                    self.sets.push(Assignment::new(column, cell.value));
                }
            }
            Err(msg) => self.fail(format!("UpdateQb::setx: {msg}")),
        }
        self
    }

    /// Add a WHERE condition. Repeated calls are AND-joined.
    pub fn where_(mut self, cond: impl Into<Predicate>) -> Self {
        let cond = cond.into();
        if let Some(msg) = cond.build_error() {
            self.fail(format!("UpdateQb::where_: {msg}"));
            return self;
        }
        self.where_.push(cond);
        self
    }

    /// Append a RETURNING column.
    pub fn returning(mut self, item: impl Into<SelectItem>) -> Self {
        self.returning.push(item.into());
        self
    }
}

impl Statement for UpdateQb {
    fn render_statement(&self, w: &mut SqlWriter) -> SqResult<()> {
        if self.sets.is_empty() {
            return Err(SqError::build("UpdateQb::set: no assignments"));
        }
        w.push("UPDATE ");
        w.push_table(&self.table);
        w.push(" SET ");
        w.push_list(&self.sets, |a, w| a.render(w))?;
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
