//! CASE expressions.
//!
//! Both forms are evaluated top to bottom and yield NULL when nothing matches
//! and no ELSE was given. A CASE always has at least one WHEN: the fluent
//! constructors take the first branch up front, and the iterator constructors
//! reject an empty list.

use crate::error::{SqError, SqResult};
use crate::qb::expr::{Expr, OrderTerm, SelectItem};
use crate::qb::predicate::Predicate;
use crate::qb::writer::{Render, SqlWriter};

/// `CASE WHEN cond THEN result ... [ELSE fallback] END`
#[derive(Debug, Clone)]
pub struct CaseExpr {
    whens: Vec<(Predicate, Expr)>,
    fallback: Option<Expr>,
}

/// Start a searched CASE with its first branch.
pub fn case_when(cond: impl Into<Predicate>, result: impl Into<Expr>) -> CaseExpr {
    CaseExpr {
        whens: vec![(cond.into(), result.into())],
        fallback: None,
    }
}

impl CaseExpr {
    /// Build from a list of branches.
    pub fn from_whens(whens: impl IntoIterator<Item = (Predicate, Expr)>) -> SqResult<Self> {
        let whens: Vec<_> = whens.into_iter().collect();
        if whens.is_empty() {
            return Err(SqError::build("CaseExpr::from_whens: CASE needs at least one WHEN"));
        }
        Ok(Self {
            whens,
            fallback: None,
        })
    }

    pub fn when(mut self, cond: impl Into<Predicate>, result: impl Into<Expr>) -> Self {
        self.whens.push((cond.into(), result.into()));
        self
    }

    pub fn else_(mut self, fallback: impl Into<Expr>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    pub fn as_(self, alias: impl Into<String>) -> SelectItem {
        Expr::from(self).as_(alias)
    }

    pub fn asc(self) -> OrderTerm {
        Expr::from(self).asc()
    }

    pub fn desc(self) -> OrderTerm {
        Expr::from(self).desc()
    }

    pub(crate) fn build_error(&self) -> Option<String> {
        self.whens
            .iter()
            .find_map(|(cond, result)| cond.build_error().or_else(|| result.build_error()))
            .or_else(|| self.fallback.as_ref().and_then(Expr::build_error))
    }
}

impl Render for CaseExpr {
    fn render(&self, w: &mut SqlWriter) -> SqResult<()> {
        w.push("CASE");
        for (cond, result) in &self.whens {
            w.push(" WHEN ");
            cond.render(w)?;
            w.push(" THEN ");
            result.render(w)?;
        }
        render_else(w, self.fallback.as_ref())
    }
}

/// The operand of a simple CASE, waiting for its first WHEN.
#[derive(Debug, Clone)]
#[must_use = "a CASE needs at least one .when()"]
pub struct CaseOperand {
    operand: Expr,
}

/// Start a simple CASE: `case(expr).when(value, result)`.
pub fn case(operand: impl Into<Expr>) -> CaseOperand {
    CaseOperand {
        operand: operand.into(),
    }
}

impl CaseOperand {
    pub fn when(self, value: impl Into<Expr>, result: impl Into<Expr>) -> SimpleCase {
        SimpleCase {
            operand: self.operand,
            whens: vec![(value.into(), result.into())],
            fallback: None,
        }
    }
}

/// `CASE operand WHEN value THEN result ... [ELSE fallback] END`
#[derive(Debug, Clone)]
pub struct SimpleCase {
    operand: Expr,
    whens: Vec<(Expr, Expr)>,
    fallback: Option<Expr>,
}

impl SimpleCase {
    /// Build from an operand and a list of branches.
    pub fn from_whens(
        operand: impl Into<Expr>,
        whens: impl IntoIterator<Item = (Expr, Expr)>,
    ) -> SqResult<Self> {
        let whens: Vec<_> = whens.into_iter().collect();
        if whens.is_empty() {
            return Err(SqError::build("SimpleCase::from_whens: CASE needs at least one WHEN"));
        }
        Ok(Self {
            operand: operand.into(),
            whens,
            fallback: None,
        })
    }

    pub fn when(mut self, value: impl Into<Expr>, result: impl Into<Expr>) -> Self {
        self.whens.push((value.into(), result.into()));
        self
    }

    pub fn else_(mut self, fallback: impl Into<Expr>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    pub fn as_(self, alias: impl Into<String>) -> SelectItem {
        Expr::from(self).as_(alias)
    }

    pub(crate) fn build_error(&self) -> Option<String> {
        self.operand
            .build_error()
            .or_else(|| {
                self.whens
                    .iter()
                    .find_map(|(v, r)| v.build_error().or_else(|| r.build_error()))
            })
            .or_else(|| self.fallback.as_ref().and_then(Expr::build_error))
    }
}

impl Render for SimpleCase {
    fn render(&self, w: &mut SqlWriter) -> SqResult<()> {
        w.push("CASE ");
        self.operand.render(w)?;
        for (value, result) in &self.whens {
            w.push(" WHEN ");
            value.render(w)?;
            w.push(" THEN ");
            result.render(w)?;
        }
        render_else(w, self.fallback.as_ref())
    }
}

fn render_else(w: &mut SqlWriter, fallback: Option<&Expr>) -> SqResult<()> {
    if let Some(fallback) = fallback {
        w.push(" ELSE ");
        fallback.render(w)?;
    }
    w.push(" END");
    Ok(())
}
