//! Typed column handles.

use crate::qb::assignment::Assignment;
use crate::qb::expr::{ColumnRef, Expr, OrderTerm, SelectItem, template};
use crate::qb::predicate::{CmpOp, Predicate};
use crate::qb::select::SelectQb;
use crate::table::{ColumnDef, ColumnKind, TableInfo};
use crate::value::{FromValue, Value};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;

/// Rust types a column can be declared with.
pub trait FieldType: Into<Value> + FromValue + Send + Sync + 'static {
    const KIND: ColumnKind;
}

impl FieldType for bool {
    const KIND: ColumnKind = ColumnKind::Boolean;
}

impl FieldType for i64 {
    const KIND: ColumnKind = ColumnKind::Integer;
}

impl FieldType for f64 {
    const KIND: ColumnKind = ColumnKind::Real;
}

impl FieldType for String {
    const KIND: ColumnKind = ColumnKind::Text;
}

impl FieldType for DateTime<Utc> {
    const KIND: ColumnKind = ColumnKind::Time;
}

impl FieldType for serde_json::Value {
    const KIND: ColumnKind = ColumnKind::Json;
}

impl FieldType for Vec<u8> {
    const KIND: ColumnKind = ColumnKind::Blob;
}

pub type BooleanField = Field<bool>;
pub type NumberField = Field<i64>;
pub type FloatField = Field<f64>;
pub type StringField = Field<String>;
pub type TimeField = Field<DateTime<Utc>>;
pub type JsonField = Field<serde_json::Value>;
pub type BlobField = Field<Vec<u8>>;

/// A column of one table instance, typed by the Rust value it holds.
///
/// The owning table and alias are stamped in when the descriptor is built and
/// never change afterwards.
pub struct Field<T> {
    table: TableInfo,
    def: ColumnDef,
    _ty: PhantomData<fn() -> T>,
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            def: self.def.clone(),
            _ty: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("table", &self.table.name)
            .field("alias", &self.table.alias)
            .field("name", &self.def.name)
            .finish()
    }
}

impl<T> Field<T> {
    pub(crate) fn new(table: TableInfo, def: ColumnDef) -> Self {
        Self {
            table,
            def,
            _ty: PhantomData,
        }
    }

    /// Column name.
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Alias of the owning table instance (may be empty).
    pub fn alias(&self) -> &str {
        &self.table.alias
    }

    /// Name used to qualify this column.
    pub fn qualifier(&self) -> &str {
        self.table.qualifier()
    }

    pub fn table_info(&self) -> &TableInfo {
        &self.table
    }

    pub fn column_def(&self) -> &ColumnDef {
        &self.def
    }

    /// Untyped column reference.
    pub fn col(&self) -> ColumnRef {
        ColumnRef {
            table: self.table.clone(),
            name: self.def.name.clone(),
        }
    }

    pub fn expr(&self) -> Expr {
        Expr::Column(self.col())
    }

    /// Compare against an arbitrary expression.
    pub fn cmp(&self, op: CmpOp, rhs: impl Into<Expr>) -> Predicate {
        Predicate::Compare {
            lhs: self.expr(),
            op,
            rhs: rhs.into(),
        }
    }

    pub fn eq_field(&self, other: &Field<T>) -> Predicate {
        self.cmp(CmpOp::Eq, other)
    }

    pub fn ne_field(&self, other: &Field<T>) -> Predicate {
        self.cmp(CmpOp::Ne, other)
    }

    pub fn is_null(&self) -> Predicate {
        Predicate::NullCheck {
            expr: self.expr(),
            is_null: true,
        }
    }

    pub fn is_not_null(&self) -> Predicate {
        Predicate::NullCheck {
            expr: self.expr(),
            is_null: false,
        }
    }

    /// `col IN (SELECT ...)`
    pub fn in_select(&self, query: SelectQb) -> Predicate {
        Predicate::InQuery {
            lhs: self.expr(),
            query: Box::new(query),
            negated: false,
        }
    }

    /// `col NOT IN (SELECT ...)`
    pub fn not_in_select(&self, query: SelectQb) -> Predicate {
        Predicate::InQuery {
            lhs: self.expr(),
            query: Box::new(query),
            negated: true,
        }
    }

    pub fn asc(&self) -> OrderTerm {
        OrderTerm::from(self).asc()
    }

    pub fn desc(&self) -> OrderTerm {
        OrderTerm::from(self).desc()
    }

    /// Select this column under another name.
    pub fn as_(&self, alias: impl Into<String>) -> SelectItem {
        self.expr().as_(alias)
    }

    /// `col = <expr>` with an arbitrary right-hand side (field, sub-query, CASE, ...).
    pub fn set_expr(&self, value: impl Into<Expr>) -> Assignment {
        Assignment::new(self.col(), value)
    }

    /// `col = NULL`
    pub fn set_null(&self) -> Assignment {
        Assignment::new(self.col(), Expr::null())
    }

    /// `COUNT(col)`
    pub fn count(&self) -> Expr {
        template("COUNT(?)", [self.expr()])
    }

    /// `MAX(col)`
    pub fn max(&self) -> Expr {
        template("MAX(?)", [self.expr()])
    }

    /// `MIN(col)`
    pub fn min(&self) -> Expr {
        template("MIN(?)", [self.expr()])
    }
}

fn typed<T: FieldType>(value: impl Into<T>) -> Expr {
    let value: T = value.into();
    Expr::Value(value.into())
}

impl<T: FieldType> Field<T> {
    pub fn eq(&self, value: impl Into<T>) -> Predicate {
        self.cmp(CmpOp::Eq, typed::<T>(value))
    }

    pub fn ne(&self, value: impl Into<T>) -> Predicate {
        self.cmp(CmpOp::Ne, typed::<T>(value))
    }

    pub fn lt(&self, value: impl Into<T>) -> Predicate {
        self.cmp(CmpOp::Lt, typed::<T>(value))
    }

    pub fn le(&self, value: impl Into<T>) -> Predicate {
        self.cmp(CmpOp::Le, typed::<T>(value))
    }

    pub fn gt(&self, value: impl Into<T>) -> Predicate {
        self.cmp(CmpOp::Gt, typed::<T>(value))
    }

    pub fn ge(&self, value: impl Into<T>) -> Predicate {
        self.cmp(CmpOp::Ge, typed::<T>(value))
    }

    /// `col IN (...)`. An empty list matches nothing.
    pub fn in_list<V: Into<T>>(&self, values: impl IntoIterator<Item = V>) -> Predicate {
        Predicate::InList {
            lhs: self.expr(),
            values: values
                .into_iter()
                .map(typed::<T>)
                .collect(),
            negated: false,
        }
    }

    /// `col NOT IN (...)`. An empty list matches everything.
    pub fn not_in_list<V: Into<T>>(&self, values: impl IntoIterator<Item = V>) -> Predicate {
        Predicate::InList {
            lhs: self.expr(),
            values: values
                .into_iter()
                .map(typed::<T>)
                .collect(),
            negated: true,
        }
    }

    pub fn between(&self, low: impl Into<T>, high: impl Into<T>) -> Predicate {
        Predicate::Between {
            expr: self.expr(),
            low: typed::<T>(low),
            high: typed::<T>(high),
            negated: false,
        }
    }

    /// `col = value`
    pub fn set(&self, value: impl Into<T>) -> Assignment {
        Assignment::new(self.col(), typed::<T>(value))
    }

    /// `col = value` where `None` stores NULL.
    pub fn set_opt(&self, value: Option<impl Into<T>>) -> Assignment {
        match value {
            Some(v) => Assignment::new(self.col(), typed::<T>(v)),
            None => self.set_null(),
        }
    }
}

impl Field<String> {
    pub fn like(&self, pattern: impl Into<String>) -> Predicate {
        self.cmp(CmpOp::Like, Expr::Value(Value::Text(pattern.into())))
    }

    pub fn not_like(&self, pattern: impl Into<String>) -> Predicate {
        self.cmp(CmpOp::NotLike, Expr::Value(Value::Text(pattern.into())))
    }

    /// Case-insensitive LIKE. Not available on SQLite.
    pub fn ilike(&self, pattern: impl Into<String>) -> Predicate {
        self.cmp(CmpOp::ILike, Expr::Value(Value::Text(pattern.into())))
    }
}

impl Field<serde_json::Value> {
    /// `col = value` serialized to JSON.
    pub fn set_json<S: Serialize + ?Sized>(&self, value: &S) -> serde_json::Result<Assignment> {
        Ok(self.set(serde_json::to_value(value)?))
    }
}

impl Field<bool> {
    /// The column itself as a condition.
    pub fn is_true(&self) -> Predicate {
        Predicate::Expr(self.expr())
    }

    /// `NOT col`
    pub fn is_false(&self) -> Predicate {
        Predicate::Expr(self.expr()).not()
    }
}

impl From<&Field<bool>> for Predicate {
    fn from(f: &Field<bool>) -> Self {
        f.is_true()
    }
}
