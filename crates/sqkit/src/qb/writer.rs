//! SQL text + argument accumulation.
//!
//! [`SqlWriter`] is the single buffer every expression renders into. It owns
//! the growing SQL text, the positional argument list and the named parameter
//! positions, so sub-queries rendered into the same writer splice their
//! arguments in at the right place.

use crate::dialect::Dialect;
use crate::error::{SqError, SqResult};
use crate::row::Projection;
use crate::table::TableInfo;
use crate::value::Value;
use std::collections::HashMap;

/// Output of rendering a statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub sql: String,
    pub args: Vec<Value>,
    /// Named parameter -> 1-based argument position.
    pub params: HashMap<String, usize>,
}

/// Accumulates SQL text and arguments for one statement.
#[derive(Debug)]
pub struct SqlWriter {
    dialect: Dialect,
    buf: String,
    args: Vec<Value>,
    params: HashMap<String, usize>,
    excluded: Vec<String>,
    interpolate: bool,
}

impl SqlWriter {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            buf: String::new(),
            args: Vec::new(),
            params: HashMap::new(),
            excluded: Vec::new(),
            interpolate: false,
        }
    }

    /// A writer that inlines values as escaped literals. Output is for logs only.
    pub fn interpolating(dialect: Dialect) -> Self {
        Self {
            interpolate: true,
            ..Self::new(dialect)
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn push(&mut self, sql: &str) {
        self.buf.push_str(sql);
    }

    pub fn push_ident(&mut self, name: &str) {
        self.dialect.write_ident(&mut self.buf, name);
    }

    /// Append a column reference, qualified unless its qualifier is excluded here.
    pub fn push_column(&mut self, table: &TableInfo, column: &str) {
        let qualifier = table.qualifier();
        if !qualifier.is_empty() && !self.excluded.iter().any(|q| q == qualifier) {
            self.dialect.write_ident(&mut self.buf, qualifier);
            self.buf.push('.');
        }
        self.dialect.write_ident(&mut self.buf, column);
    }

    /// Append `table [AS alias]`.
    pub fn push_table(&mut self, table: &TableInfo) {
        self.dialect.write_ident(&mut self.buf, &table.name);
        if !table.alias.is_empty() {
            self.buf.push_str(" AS ");
            self.dialect.write_ident(&mut self.buf, &table.alias);
        }
    }

    /// Append a value as a placeholder (or a literal when interpolating).
    pub fn push_value(&mut self, value: &Value) {
        if self.interpolate {
            self.dialect.write_literal(&mut self.buf, value);
            return;
        }
        self.args.push(value.clone());
        self.dialect.write_placeholder(&mut self.buf, self.args.len(), false);
    }

    /// Append a named parameter, reusing its position if it was seen before.
    pub fn push_param(&mut self, name: &str, value: &Value) {
        if self.interpolate {
            self.dialect.write_literal(&mut self.buf, value);
            return;
        }
        if let Some(&idx) = self.params.get(name) {
            self.dialect.write_placeholder(&mut self.buf, idx, true);
            return;
        }
        self.args.push(value.clone());
        let idx = self.args.len();
        self.params.insert(name.to_string(), idx);
        self.dialect.write_placeholder(&mut self.buf, idx, true);
    }

    /// Render `f` with the given table qualifiers stripped from column references.
    pub fn with_excluded<R>(&mut self, qualifiers: &[&str], f: impl FnOnce(&mut Self) -> R) -> R {
        let before = self.excluded.len();
        self.excluded
            .extend(qualifiers.iter().filter(|q| !q.is_empty()).map(|q| q.to_string()));
        let out = f(self);
        self.excluded.truncate(before);
        out
    }

    /// Render a comma separated list.
    pub fn push_list<T>(
        &mut self,
        items: &[T],
        mut render: impl FnMut(&T, &mut Self) -> SqResult<()>,
    ) -> SqResult<()> {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.buf.push_str(", ");
            }
            render(item, self)?;
        }
        Ok(())
    }

    pub fn unsupported(&self, feature: &'static str) -> SqError {
        SqError::Unsupported {
            dialect: self.dialect,
            feature,
        }
    }

    pub fn sql(&self) -> &str {
        &self.buf
    }

    pub fn finish(self) -> Rendered {
        Rendered {
            sql: self.buf,
            args: self.args,
            params: self.params,
        }
    }
}

/// Anything that can append itself to a [`SqlWriter`].
pub trait Render {
    fn render(&self, w: &mut SqlWriter) -> SqResult<()>;
}

/// A complete statement that can be rendered and executed.
pub trait Statement: Send + Sync {
    /// Append the statement text.
    fn render_statement(&self, w: &mut SqlWriter) -> SqResult<()>;

    /// First error recorded by a builder call, if any.
    fn build_error(&self) -> Option<&str> {
        None
    }

    /// Columns each result row will carry, in order.
    fn projection(&self) -> Projection {
        Projection::default()
    }

    /// Render to SQL text plus positional arguments.
    fn to_sql(&self, dialect: Dialect) -> SqResult<Rendered> {
        if let Some(err) = self.build_error() {
            return Err(SqError::build(err));
        }
        let mut w = SqlWriter::new(dialect);
        self.render_statement(&mut w)?;
        Ok(w.finish())
    }

    /// Render with values inlined as literals, for logging.
    fn to_interpolated_sql(&self, dialect: Dialect) -> SqResult<String> {
        if let Some(err) = self.build_error() {
            return Err(SqError::build(err));
        }
        let mut w = SqlWriter::interpolating(dialect);
        self.render_statement(&mut w)?;
        Ok(w.finish().sql)
    }
}

/// Replace each `?` outside quotes in `sql` with the next rendered argument.
///
/// A count mismatch fails the whole render.
pub(crate) fn render_template<T>(
    w: &mut SqlWriter,
    sql: &str,
    args: &[T],
    mut render_arg: impl FnMut(&T, &mut SqlWriter) -> SqResult<()>,
) -> SqResult<()> {
    let mut next = 0;
    let mut quote: Option<char> = None;
    for ch in sql.chars() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
                w.buf.push(ch);
            }
            None if ch == '\'' || ch == '"' => {
                quote = Some(ch);
                w.buf.push(ch);
            }
            None if ch == '?' => {
                let arg = args.get(next).ok_or_else(|| {
                    SqError::render(format!(
                        "template {sql:?} has more placeholders than its {} arguments",
                        args.len()
                    ))
                })?;
                render_arg(arg, w)?;
                next += 1;
            }
            None => w.buf.push(ch),
        }
    }
    if next != args.len() {
        return Err(SqError::render(format!(
            "template {sql:?} has {next} placeholders but {} arguments",
            args.len()
        )));
    }
    Ok(())
}
