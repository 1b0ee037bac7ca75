//! `CREATE TABLE IF NOT EXISTS` from table descriptors.

use crate::client::GenericClient;
use crate::dialect::Dialect;
use crate::error::{SqError, SqResult};
use crate::exec::{ExecFlags, exec};
use crate::qb::raw;
use crate::table::Table;

/// DDL for one table.
///
/// A single primary-key column is declared inline; several become a
/// table-level `PRIMARY KEY (..)`.
pub fn create_table_sql<T: Table + ?Sized>(table: &T, dialect: Dialect) -> SqResult<String> {
    let info = table.table_info();
    let columns = table.columns();
    if columns.is_empty() {
        return Err(SqError::build(format!(
            "create_table_sql: table {:?} declares no columns",
            info.name
        )));
    }
    let primary: Vec<_> = columns.iter().filter(|c| c.primary_key).collect();

    let mut sql = String::from("CREATE TABLE IF NOT EXISTS ");
    dialect.write_ident(&mut sql, &info.name);
    sql.push_str(" (");
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        dialect.write_ident(&mut sql, &column.name);
        sql.push(' ');
        match &column.sql_type {
            Some(ty) => sql.push_str(ty),
            None => sql.push_str(dialect.column_type(column.kind)),
        }
        if column.primary_key && primary.len() == 1 {
            sql.push_str(" PRIMARY KEY");
        }
        if column.not_null {
            sql.push_str(" NOT NULL");
        }
        if column.unique {
            sql.push_str(" UNIQUE");
        }
    }
    if primary.len() > 1 {
        sql.push_str(", PRIMARY KEY (");
        for (i, column) in primary.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            dialect.write_ident(&mut sql, &column.name);
        }
        sql.push(')');
    }
    sql.push(')');
    Ok(sql)
}

/// Create every table that does not exist yet. Running it again is a no-op.
pub async fn ensure_tables<C>(conn: &C, tables: &[&dyn Table]) -> SqResult<()>
where
    C: GenericClient + ?Sized,
{
    let dialect = conn.dialect();
    let statements = tables
        .iter()
        .map(|table| create_table_sql(*table, dialect))
        .collect::<SqResult<Vec<_>>>()?;
    for ddl in statements {
        exec(conn, &raw(ddl), ExecFlags::empty()).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qb::{JsonField, NumberField, StringField, TimeField};

    crate::table! {
        struct Pages("pm_pages") {
            url: StringField [primary_key],
            content: StringField [not_null],
            views: NumberField,
            meta: JsonField,
        }
    }

    crate::table! {
        struct Memberships("pm_memberships") {
            user_id: NumberField [primary_key, not_null],
            group_id: NumberField [primary_key, not_null],
            joined_at: TimeField = "TEXT",
        }
    }

    #[test]
    fn single_primary_key_is_inline() {
        let sql = create_table_sql(&Pages::new(""), Dialect::Sqlite).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS pm_pages (url TEXT PRIMARY KEY, content TEXT NOT NULL, \
             views INTEGER, meta JSON)"
        );
    }

    #[test]
    fn postgres_types() {
        let sql = create_table_sql(&Pages::new("p"), Dialect::Postgres).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS pm_pages (url TEXT PRIMARY KEY, content TEXT NOT NULL, \
             views BIGINT, meta JSONB)"
        );
    }

    #[test]
    fn composite_primary_key_is_table_level() {
        let sql = create_table_sql(&Memberships::new(""), Dialect::Sqlite).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS pm_memberships (user_id INTEGER NOT NULL, \
             group_id INTEGER NOT NULL, joined_at TEXT, PRIMARY KEY (user_id, group_id))"
        );
    }

    #[test]
    fn empty_table_is_build_error() {
        let table = crate::table::TableBuilder::new("empty", "").finish();
        let err = create_table_sql(&table, Dialect::Sqlite).unwrap_err();
        assert!(err.is_build());
    }
}
