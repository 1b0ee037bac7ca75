//! Table descriptors.
//!
//! A table descriptor is a struct of typed [`Field`]s that all share one
//! [`TableInfo`] (table name + alias). Descriptors are cheap and are meant to be
//! built fresh for every query, which is what lets the same table appear twice in
//! one statement under different aliases.
//!
//! Descriptors are normally declared with the [`table!`](crate::table!) macro:
//!
//! ```ignore
//! sqkit::table! {
//!     pub struct Pages("pm_pages") {
//!         url: StringField = "TEXT" [primary_key, not_null],
//!         disabled: BooleanField,
//!         content: StringField,
//!     }
//! }
//!
//! let p = Pages::new("p");
//! let q = sqkit::select().from(&p).where_(p.url.eq("/about"));
//! ```
//!
//! Schemas only known at runtime use [`TableBuilder`] directly.

use crate::error::{SqError, SqResult};
use crate::qb::{Field, FieldType};

/// Name + alias pair shared by every field of one descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableInfo {
    pub name: String,
    pub alias: String,
}

impl TableInfo {
    pub fn new(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: alias.into(),
        }
    }

    /// The name fields are qualified with: the alias if set, else the table name.
    pub fn qualifier(&self) -> &str {
        if self.alias.is_empty() {
            &self.name
        } else {
            &self.alias
        }
    }
}

/// Storage class of a column, derived from the Rust type of its field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Boolean,
    Integer,
    Real,
    Text,
    Time,
    Json,
    Blob,
}

/// Column metadata carried by every field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnKind,
    /// Explicit SQL type; `None` means the dialect default for `kind`.
    pub sql_type: Option<String>,
    pub primary_key: bool,
    pub not_null: bool,
    pub unique: bool,
    /// Position in the table declaration, starting at 0.
    pub ordinal: usize,
}

/// Constraint and type options for a declared column.
#[derive(Debug, Clone, Default)]
pub struct ColumnOptions {
    sql_type: Option<String>,
    primary_key: bool,
    not_null: bool,
    unique: bool,
}

impl ColumnOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sql_type(mut self, sql_type: impl Into<String>) -> Self {
        self.sql_type = Some(sql_type.into());
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Implemented by every table descriptor.
pub trait Table: Send + Sync {
    /// Name and alias of this descriptor.
    fn table_info(&self) -> &TableInfo;

    /// Declared columns in declaration order.
    fn columns(&self) -> Vec<ColumnDef>;
}

impl<T: Table + ?Sized> Table for &T {
    fn table_info(&self) -> &TableInfo {
        (**self).table_info()
    }

    fn columns(&self) -> Vec<ColumnDef> {
        (**self).columns()
    }
}

/// Stamps fields with their owning table while a descriptor is being built.
#[derive(Debug)]
pub struct TableBuilder {
    info: TableInfo,
    columns: Vec<ColumnDef>,
}

impl TableBuilder {
    pub fn new(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            info: TableInfo::new(name, alias),
            columns: Vec::new(),
        }
    }

    /// Declare a column and return its typed field.
    ///
    /// Declaring the same column name twice is an error.
    pub fn field<T: FieldType>(
        &mut self,
        name: impl Into<String>,
        options: ColumnOptions,
    ) -> SqResult<Field<T>> {
        let name = name.into();
        if self.columns.iter().any(|c| c.name.eq_ignore_ascii_case(&name)) {
            return Err(SqError::build(format!(
                "TableBuilder::field: duplicate column {name:?} in table {:?}",
                self.info.name
            )));
        }
        Ok(self.declare(name, options))
    }

    /// Infallible declaration used by [`table!`](crate::table!), whose struct
    /// field names are unique by construction.
    #[doc(hidden)]
    pub fn declare<T: FieldType>(&mut self, name: impl Into<String>, options: ColumnOptions) -> Field<T> {
        let def = ColumnDef {
            name: name.into(),
            kind: T::KIND,
            sql_type: options.sql_type,
            primary_key: options.primary_key,
            not_null: options.not_null,
            unique: options.unique,
            ordinal: self.columns.len(),
        };
        self.columns.push(def.clone());
        Field::new(self.info.clone(), def)
    }

    #[doc(hidden)]
    pub fn into_info(self) -> TableInfo {
        self.info
    }

    /// Finish a runtime-defined table.
    pub fn finish(self) -> DynamicTable {
        DynamicTable {
            info: self.info,
            columns: self.columns,
        }
    }
}

/// A table whose columns are only known at runtime.
#[derive(Debug, Clone)]
pub struct DynamicTable {
    info: TableInfo,
    columns: Vec<ColumnDef>,
}

impl DynamicTable {
    /// Look up a declared column as a typed field.
    pub fn field<T: FieldType>(&self, name: &str) -> SqResult<Field<T>> {
        let def = self
            .columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                SqError::build(format!(
                    "DynamicTable::field: table {:?} has no column {name:?}",
                    self.info.name
                ))
            })?;
        if def.kind != T::KIND {
            return Err(SqError::build(format!(
                "DynamicTable::field: column {name:?} is {:?}, not {:?}",
                def.kind,
                T::KIND
            )));
        }
        Ok(Field::new(self.info.clone(), def.clone()))
    }

    /// The same table under another alias.
    pub fn with_alias(&self, alias: impl Into<String>) -> Self {
        Self {
            info: TableInfo::new(self.info.name.clone(), alias),
            columns: self.columns.clone(),
        }
    }
}

impl Table for DynamicTable {
    fn table_info(&self) -> &TableInfo {
        &self.info
    }

    fn columns(&self) -> Vec<ColumnDef> {
        self.columns.clone()
    }
}

/// Physical name of a per-tenant table: `{prefix}_{tenant}_{base}`, or
/// `{prefix}_{base}` when no tenant is given.
pub fn tenant_table_name(prefix: &str, base: &str, tenant: Option<&str>) -> String {
    match tenant {
        Some(tenant) if !tenant.is_empty() => format!("{prefix}_{tenant}_{base}"),
        _ => format!("{prefix}_{base}"),
    }
}

/// Declare a table descriptor struct.
///
/// Each field is `name: FieldType`, optionally followed by `= "SQL TYPE"` and a
/// bracketed list of constraints (`primary_key`, `not_null`, `unique`). The
/// generated struct gets `new(alias)`, `with_name(name, alias)` and a
/// [`Table`](crate::Table) impl.
#[macro_export]
macro_rules! table {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident ($table:literal) {
            $(
                $(#[$fmeta:meta])*
                $field:ident : $fty:ty $( = $sqltype:literal )? $( [ $($flag:ident),* $(,)? ] )?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        $vis struct $name {
            $(
                $(#[$fmeta])*
                pub $field: $fty,
            )*
            __table: $crate::TableInfo,
        }

        impl $name {
            /// Physical table name.
            pub const NAME: &'static str = $table;

            /// Build the descriptor under `alias` (empty for none).
            pub fn new(alias: &str) -> Self {
                Self::with_name($table, alias)
            }

            /// Build the descriptor for a differently named physical table.
            pub fn with_name(name: impl Into<String>, alias: &str) -> Self {
                let mut builder = $crate::TableBuilder::new(name, alias);
                Self {
                    $(
                        $field: builder.declare(
                            stringify!($field),
                            $crate::ColumnOptions::new()
                                $( .sql_type($sqltype) )?
                                $( $( .$flag() )* )?,
                        ),
                    )*
                    __table: builder.into_info(),
                }
            }
        }

        impl $crate::Table for $name {
            fn table_info(&self) -> &$crate::TableInfo {
                &self.__table
            }

            fn columns(&self) -> Vec<$crate::ColumnDef> {
                vec![$( self.$field.column_def().clone() ),*]
            }
        }
    };
}
