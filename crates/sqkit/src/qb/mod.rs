//! Typed query builder.
//!
//! Statements are built from table descriptors and rendered for a
//! [`Dialect`](crate::Dialect) only when executed (or when
//! [`Statement::to_sql`] is called).
//!
//! # Features
//!
//! - **Typed fields**: `p.url.eq("/a")` only accepts values of the column's type
//! - **Immutable builders**: every call consumes and returns the builder, clone to branch
//! - **Build errors at the call site**: misuse is recorded by the call that caused it
//! - **Dialect-parametric rendering**: `?`/`?N` for SQLite, `$N` for PostgreSQL
//!
//! # Usage
//!
//! ```ignore
//! use sqkit::qb;
//!
//! let p = Pages::new("p");
//! let q = qb::from(&p)
//!     .where_(p.url.like("/docs/%"))
//!     .order_by(p.url.asc())
//!     .limit(20);
//!
//! // INSERT ... ON CONFLICT DO UPDATE
//! let p = Pages::new("");
//! let upsert = qb::insert_into(&p)
//!     .valuesx(|col| {
//!         col.set(&p.url, "/a").set(&p.content, "hi");
//!     })
//!     .on_conflict([&p.url])
//!     .do_update_set([qb::set_excluded(&p.content)]);
//!
//! // UPDATE
//! let q = qb::update(&p).set(p.content.set("bye")).where_(p.url.eq("/a"));
//!
//! // DELETE
//! let q = qb::delete_from(&p).where_(p.url.eq("/a"));
//! ```

mod assignment;
mod case;
mod delete;
mod expr;
mod field;
mod insert;
mod predicate;
mod raw;
mod row_value;
mod select;
mod update;
mod writer;

pub use assignment::{Assignment, set_excluded};
pub use case::{CaseExpr, CaseOperand, SimpleCase, case, case_when};
pub use delete::DeleteQb;
pub use expr::{
    ColumnRef, Direction, Expr, Nulls, OrderTerm, SelectItem, count_star, literal, param,
    template,
};
pub use field::{
    BlobField, BooleanField, Field, FieldType, FloatField, JsonField, NumberField, StringField,
    TimeField,
};
pub use insert::{ColumnSetter, ConflictAction, InsertQb, OnConflictQb};
pub use predicate::{CmpOp, Predicate, and, exists, not, not_exists, or, predicate};
pub use raw::{RawQuery, raw};
pub use row_value::{RowValue, RowValues};
pub use select::{ExistsQuery, JoinKind, SelectQb};
pub use update::UpdateQb;
pub use writer::{Render, Rendered, SqlWriter, Statement};

use crate::table::Table;

/// An empty SELECT; add `from`, `column`, ...
pub fn select() -> SelectQb {
    SelectQb::new()
}

/// `SELECT <every declared column> FROM table`
pub fn from<T: Table + ?Sized>(table: &T) -> SelectQb {
    SelectQb::new().from(table)
}

/// Start an INSERT into `table`.
pub fn insert_into<T: Table + ?Sized>(table: &T) -> InsertQb {
    InsertQb::new(table)
}

/// Start an UPDATE of `table`.
pub fn update<T: Table + ?Sized>(table: &T) -> UpdateQb {
    UpdateQb::new(table)
}

/// Start a DELETE from `table`.
pub fn delete_from<T: Table + ?Sized>(table: &T) -> DeleteQb {
    DeleteQb::new(table)
}

/// Wrap a select as `SELECT EXISTS (SELECT 1 ...)`.
pub fn exists_query(query: SelectQb) -> ExistsQuery {
    query.exists_query()
}

#[cfg(test)]
mod tests;
