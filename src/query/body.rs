//! Clauses shared by logical and physical queries

use std::fmt;

use serde::{Deserialize, Serialize};

use super::expressions::Expression;

/// A projected expression and the name it is returned under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedExpression {
    pub name: String,
    pub expression: Expression,
}

impl SelectedExpression {
    pub fn new(name: impl Into<String>, expression: Expression) -> Self {
        Self {
            name: name.into(),
            expression,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderByDirection {
    Asc,
    Desc,
}

impl OrderByDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderByDirection::Asc => "ASC",
            OrderByDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub direction: OrderByDirection,
    pub expression: Expression,
}

/// The clauses of a query, independent of where the data comes from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryBody {
    #[serde(default)]
    pub selected_columns: Vec<SelectedExpression>,
    #[serde(default)]
    pub condition: Option<Expression>,
    #[serde(default)]
    pub groupby: Vec<Expression>,
    #[serde(default)]
    pub having: Option<Expression>,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: u32,
}

impl QueryBody {
    /// Rewrites every expression slot of the query with `func`.
    ///
    /// Each tree is traversed with [`Expression::transform`], so `func`
    /// sees children before parents.
    pub fn transform_expressions<F>(&mut self, mut func: F)
    where
        F: FnMut(Expression) -> Expression,
    {
        for selected in &mut self.selected_columns {
            let expr = std::mem::replace(&mut selected.expression, Expression::literal(false));
            selected.expression = expr.transform(&mut func);
        }
        if let Some(cond) = self.condition.take() {
            self.condition = Some(cond.transform(&mut func));
        }
        self.groupby = std::mem::take(&mut self.groupby)
            .into_iter()
            .map(|e| e.transform(&mut func))
            .collect();
        if let Some(having) = self.having.take() {
            self.having = Some(having.transform(&mut func));
        }
        for ob in &mut self.order_by {
            let expr = std::mem::replace(&mut ob.expression, Expression::literal(false));
            ob.expression = expr.transform(&mut func);
        }
    }

    /// Iterates over the roots of every expression slot
    pub fn expressions(&self) -> impl Iterator<Item = &Expression> {
        self.selected_columns
            .iter()
            .map(|s| &s.expression)
            .chain(self.condition.iter())
            .chain(self.groupby.iter())
            .chain(self.having.iter())
            .chain(self.order_by.iter().map(|o| &o.expression))
    }

    /// Adds `condition` to the top-level conjunction
    pub fn add_condition(&mut self, condition: Expression) {
        self.condition = Some(match self.condition.take() {
            None => condition,
            Some(existing) => super::conditions::binary_condition(
                super::conditions::AND,
                existing,
                condition,
            ),
        });
    }

    /// Writes the `SELECT` list. The caller writes the source clause.
    pub(crate) fn fmt_select(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        if self.selected_columns.is_empty() {
            write!(f, "*")?;
        }
        for (i, s) in self.selected_columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", s.expression)?;
        }
        Ok(())
    }

    /// Writes everything after the source clause
    pub(crate) fn fmt_tail(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(cond) = &self.condition {
            write!(f, " WHERE {}", cond)?;
        }
        if !self.groupby.is_empty() {
            write!(f, " GROUP BY ")?;
            for (i, g) in self.groupby.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", g)?;
            }
        }
        if let Some(having) = &self.having {
            write!(f, " HAVING {}", having)?;
        }
        if !self.order_by.is_empty() {
            write!(f, " ORDER BY ")?;
            for (i, ob) in self.order_by.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{} {}", ob.expression, ob.direction.as_str())?;
            }
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {}", limit)?;
        }
        if self.offset > 0 {
            write!(f, " OFFSET {}", self.offset)?;
        }
        Ok(())
    }
}
