//! INSERT query builder with upsert support.

use crate::error::{SqError, SqResult};
use crate::qb::assignment::Assignment;
use crate::qb::expr::{ColumnRef, Expr, SelectItem};
use crate::qb::field::{Field, FieldType};
use crate::qb::predicate::{Predicate, render_conjunction};
use crate::qb::row_value::RowValue;
use crate::qb::writer::{Render, SqlWriter, Statement};
use crate::row::Projection;
use crate::table::{Table, TableInfo};
use serde::Serialize;

#[derive(Debug, Clone)]
pub(crate) struct Cell {
    pub(crate) name: String,
    pub(crate) ordinal: usize,
    pub(crate) value: Expr,
}

/// Collects `column = value` pairs inside [`InsertQb::valuesx`] and
/// [`UpdateQb::setx`](crate::qb::UpdateQb::setx) callbacks.
///
/// For inserts, setting a column that the current row already has starts a
/// new row, so one callback can emit several rows from a loop.
#[derive(Debug)]
pub struct ColumnSetter {
    table: TableInfo,
    split_rows: bool,
    rows: Vec<Vec<Cell>>,
    current: Vec<Cell>,
    error: Option<String>,
}

impl ColumnSetter {
    pub(crate) fn for_insert(table: TableInfo) -> Self {
        Self::new(table, true)
    }

    pub(crate) fn for_update(table: TableInfo) -> Self {
        Self::new(table, false)
    }

    fn new(table: TableInfo, split_rows: bool) -> Self {
        Self {
            table,
            split_rows,
            rows: Vec::new(),
            current: Vec::new(),
            error: None,
        }
    }

    /// `column = value`
    pub fn set<T: FieldType>(&mut self, field: &Field<T>, value: impl Into<T>) -> &mut Self {
        let value: T = value.into();
        self.push(field, Expr::Value(value.into()))
    }

    /// `column = value`, or NULL for `None`.
    pub fn set_opt<T: FieldType>(&mut self, field: &Field<T>, value: Option<impl Into<T>>) -> &mut Self {
        match value {
            Some(v) => self.set(field, v),
            None => self.set_null(field),
        }
    }

    /// `column = value` for a JSON column, serializing `value` with serde.
    /// A serialization failure is recorded like any other build error.
    pub fn set_json<S: Serialize + ?Sized>(
        &mut self,
        field: &Field<serde_json::Value>,
        value: &S,
    ) -> &mut Self {
        match serde_json::to_value(value) {
            Ok(json) => self.set(field, json),
            Err(e) => {
                if self.error.is_none() {
                    self.error = Some(format!("set_json({}): {e}", field.name()));
                }
                self
            }
        }
    }

    /// `column = NULL`
    pub fn set_null<T>(&mut self, field: &Field<T>) -> &mut Self {
        self.push(field, Expr::null())
    }

    /// `column = <expr>` for anything that is not a plain value.
    pub fn set_expr<T>(&mut self, field: &Field<T>, value: impl Into<Expr>) -> &mut Self {
        self.push(field, value.into())
    }

    fn push<T>(&mut self, field: &Field<T>, value: Expr) -> &mut Self {
        if self.error.is_some() {
            return self;
        }
        if field.table_info().name != self.table.name {
            self.error = Some(format!(
                "column {:?} belongs to table {:?}, not {:?}",
                field.name(),
                field.table_info().name,
                self.table.name
            ));
            return self;
        }
        if let Some(msg) = value.build_error() {
            self.error = Some(msg);
            return self;
        }
        if self.current.iter().any(|c| c.name == field.name()) {
            if !self.split_rows {
                self.error = Some(format!("column {:?} set twice", field.name()));
                return self;
            }
            self.rows.push(std::mem::take(&mut self.current));
        }
        self.current.push(Cell {
            name: field.name().to_string(),
            ordinal: field.column_def().ordinal,
            value,
        });
        self
    }

    pub(crate) fn finish(mut self) -> Result<Vec<Vec<Cell>>, String> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if !self.current.is_empty() {
            self.rows.push(self.current);
        }
        if self.rows.is_empty() {
            return Err("no column was set".to_string());
        }
        Ok(self.rows)
    }
}

/// What to do when an insert hits a uniqueness conflict.
#[derive(Debug, Clone)]
pub enum ConflictAction {
    DoNothing,
    DoUpdate {
        sets: Vec<Assignment>,
        where_: Vec<Predicate>,
    },
}

#[derive(Debug, Clone)]
struct Conflict {
    target: Vec<String>,
    action: ConflictAction,
}

/// INSERT query builder.
///
/// Rows come from [`valuesx`](InsertQb::valuesx) callbacks (columns in
/// declaration order) or from [`columns`](InsertQb::columns) plus
/// [`values`](InsertQb::values). Every row must set the same columns.
#[derive(Debug, Clone)]
pub struct InsertQb {
    table: TableInfo,
    columns: Vec<String>,
    rows: Vec<Vec<Expr>>,
    conflict: Option<Conflict>,
    returning: Vec<SelectItem>,
    build_error: Option<String>,
}

impl InsertQb {
    pub fn new<T: Table + ?Sized>(table: &T) -> Self {
        Self {
            table: table.table_info().clone(),
            columns: Vec::new(),
            rows: Vec::new(),
            conflict: None,
            returning: Vec::new(),
            build_error: None,
        }
    }

    fn fail(&mut self, msg: String) {
        if self.build_error.is_none() {
            self.build_error = Some(msg);
        }
    }

    fn push_row(&mut self, call: &str, names: Vec<String>, values: Vec<Expr>) {
        if self.columns.is_empty() && self.rows.is_empty() {
            self.columns = names;
        } else if names != self.columns {
            self.fail(format!(
                "{call}: row {} sets ({}) but earlier rows set ({})",
                self.rows.len() + 1,
                names.join(", "),
                self.columns.join(", ")
            ));
            return;
        }
        self.rows.push(values);
    }

    /// Add rows through a setter callback.
    ///
    /// Each call starts a new row, and so does setting a column twice within
    /// one call. Columns are written in declaration order.
    pub fn valuesx(mut self, f: impl FnOnce(&mut ColumnSetter)) -> Self {
        let mut setter = ColumnSetter::for_insert(self.table.clone());
        f(&mut setter);
        let rows = match setter.finish() {
            Ok(rows) => rows,
            Err(msg) => {
                self.fail(format!("InsertQb::valuesx: {msg}"));
                return self;
            }
        };
        for mut row in rows {
            row.sort_by_key(|c| c.ordinal);
            let (names, values) = row.into_iter().map(|c| (c.name, c.value)).unzip();
            self.push_row("InsertQb::valuesx", names, values);
        }
        self
    }

    /// Name the columns for [`values`](InsertQb::values), in the given order.
    pub fn columns<I: Into<ColumnRef>>(mut self, cols: impl IntoIterator<Item = I>) -> Self {
        if !self.columns.is_empty() {
            self.fail("InsertQb::columns: columns already set".to_string());
            return self;
        }
        let mut names = Vec::new();
        for col in cols {
            let col = col.into();
            if col.table.name != self.table.name {
                self.fail(format!(
                    "InsertQb::columns: column {:?} belongs to table {:?}",
                    col.name, col.table.name
                ));
                return self;
            }
            names.push(col.name);
        }
        self.columns = names;
        self
    }

    /// Add one row matching [`columns`](InsertQb::columns).
    pub fn values(mut self, row: impl Into<RowValue>) -> Self {
        let row = row.into();
        if self.columns.is_empty() {
            self.fail("InsertQb::values: call columns() first".to_string());
            return self;
        }
        if row.len() != self.columns.len() {
            self.fail(format!(
                "InsertQb::values: row has {} values for {} columns",
                row.len(),
                self.columns.len()
            ));
            return self;
        }
        if let Some(msg) = row.build_error() {
            self.fail(format!("InsertQb::values: {msg}"));
            return self;
        }
        self.rows.push(row.into_items());
        self
    }

    /// `ON CONFLICT (cols)`. An empty target is only valid with `do_nothing`.
    pub fn on_conflict<I: Into<ColumnRef>>(self, target: impl IntoIterator<Item = I>) -> OnConflictQb {
        OnConflictQb {
            target: target.into_iter().map(|c| c.into().name).collect(),
            insert: self,
        }
    }

    /// `ON CONFLICT DO NOTHING`
    pub fn on_conflict_do_nothing(self) -> Self {
        self.on_conflict(Vec::<ColumnRef>::new()).do_nothing()
    }

    fn set_conflict(mut self, call: &str, conflict: Conflict) -> Self {
        if self.conflict.is_some() {
            self.fail(format!("{call}: ON CONFLICT given twice"));
        } else {
            self.conflict = Some(conflict);
        }
        self
    }

    /// Condition on the `DO UPDATE` branch of an upsert.
    pub fn where_(mut self, cond: impl Into<Predicate>) -> Self {
        let cond = cond.into();
        if let Some(msg) = cond.build_error() {
            self.fail(format!("InsertQb::where_: {msg}"));
            return self;
        }
        match &mut self.conflict {
            Some(Conflict {
                action: ConflictAction::DoUpdate { where_, .. },
                ..
            }) => where_.push(cond),
            _ => self.fail("InsertQb::where_: only valid after do_update_set".to_string()),
        }
        self
    }

    /// Append a RETURNING column.
    pub fn returning(mut self, item: impl Into<SelectItem>) -> Self {
        self.returning.push(item.into());
        self
    }

    /// Render `f` with the target's own columns unqualified.
    fn bare<R>(&self, w: &mut SqlWriter, f: impl FnOnce(&mut SqlWriter) -> R) -> R {
        w.with_excluded(&[self.table.qualifier(), self.table.name.as_str()], f)
    }

    fn render_body(&self, w: &mut SqlWriter) -> SqResult<()> {
        w.push("INSERT INTO ");
        w.push_table(&self.table);

        if self.rows.is_empty() {
            if !self.columns.is_empty() {
                return Err(SqError::build("InsertQb::values: columns set but no rows given"));
            }
            w.push(" DEFAULT VALUES");
        } else {
            w.push(" (");
            w.push_list(&self.columns, |c, w| {
                w.push_ident(c);
                Ok(())
            })?;
            w.push(") VALUES ");
            self.bare(w, |w| {
                w.push_list(&self.rows, |row, w| {
                    w.push("(");
                    w.push_list(row, |e, w| e.render(w))?;
                    w.push(")");
                    Ok(())
                })
            })?;
        }

        if let Some(conflict) = &self.conflict {
            w.push(" ON CONFLICT");
            if !conflict.target.is_empty() {
                w.push(" (");
                w.push_list(&conflict.target, |c, w| {
                    w.push_ident(c);
                    Ok(())
                })?;
                w.push(")");
            }
            match &conflict.action {
                ConflictAction::DoNothing => w.push(" DO NOTHING"),
                ConflictAction::DoUpdate { sets, where_ } => {
                    w.push(" DO UPDATE SET ");
                    w.push_list(sets, |a, w| a.render(w))?;
                    if !where_.is_empty() {
                        w.push(" WHERE ");
                        render_conjunction(w, where_)?;
                    }
                }
            }
        }

        if !self.returning.is_empty() {
            w.push(" RETURNING ");
            self.bare(w, |w| w.push_list(&self.returning, |item, w| item.render(w)))?;
        }
        Ok(())
    }
}

impl Statement for InsertQb {
    // Upsert right-hand sides and WHERE keep the target's qualifier: PostgreSQL
    // resolves a bare column there against both the target and EXCLUDED.
    fn render_statement(&self, w: &mut SqlWriter) -> SqResult<()> {
        self.render_body(w)
    }

    fn build_error(&self) -> Option<&str> {
        self.build_error.as_deref()
    }

    fn projection(&self) -> Projection {
        Projection::new(self.returning.iter().map(SelectItem::key))
    }
}

/// An insert waiting for its conflict action.
#[derive(Debug, Clone)]
#[must_use = "finish with do_nothing() or do_update_set()"]
pub struct OnConflictQb {
    insert: InsertQb,
    target: Vec<String>,
}

impl OnConflictQb {
    /// `DO NOTHING`
    pub fn do_nothing(self) -> InsertQb {
        let conflict = Conflict {
            target: self.target,
            action: ConflictAction::DoNothing,
        };
        self.insert
            .set_conflict("OnConflictQb::do_nothing", conflict)
    }

    /// `DO UPDATE SET ...`. Requires a conflict target.
    pub fn do_update_set(self, sets: impl IntoIterator<Item = Assignment>) -> InsertQb {
        let sets: Vec<Assignment> = sets.into_iter().collect();
        let mut insert = self.insert;
        if self.target.is_empty() {
            insert.fail("OnConflictQb::do_update_set: a conflict target is required".to_string());
            return insert;
        }
        if sets.is_empty() {
            insert.fail("OnConflictQb::do_update_set: no assignments".to_string());
            return insert;
        }
        if let Some(msg) = sets.iter().find_map(Assignment::build_error) {
            insert.fail(format!("OnConflictQb::do_update_set: {msg}"));
            return insert;
        }
        insert.set_conflict(
            "OnConflictQb::do_update_set",
            Conflict {
                target: self.target,
                action: ConflictAction::DoUpdate {
                    sets,
                    where_: Vec::new(),
                },
            },
        )
    }
}
