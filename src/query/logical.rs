//! Entity-level query, before storage selection

use std::fmt;

use serde::{Deserialize, Serialize};

use super::body::{OrderBy, QueryBody, SelectedExpression};
use super::expressions::Expression;

/// Names a logical entity (dataset-level abstraction over storages)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKey(String);

impl EntityKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A query over an entity. Columns and functions are not yet bound to a
/// physical table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalQuery {
    pub entity: EntityKey,
    #[serde(flatten)]
    pub body: QueryBody,
    #[serde(default, rename = "final")]
    pub final_: bool,
    #[serde(default)]
    pub sample: Option<f64>,
}

impl LogicalQuery {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: EntityKey::new(entity),
            body: QueryBody::default(),
            final_: false,
            sample: None,
        }
    }

    pub fn with_selected(mut self, name: impl Into<String>, expression: Expression) -> Self {
        self.body
            .selected_columns
            .push(SelectedExpression::new(name, expression));
        self
    }

    pub fn with_condition(mut self, condition: Expression) -> Self {
        self.body.add_condition(condition);
        self
    }

    pub fn with_groupby(mut self, expression: Expression) -> Self {
        self.body.groupby.push(expression);
        self
    }

    pub fn with_order_by(mut self, order_by: OrderBy) -> Self {
        self.body.order_by.push(order_by);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.body.limit = Some(limit);
        self
    }

    pub fn with_final(mut self, final_: bool) -> Self {
        self.final_ = final_;
        self
    }

    pub fn with_sample(mut self, sample: f64) -> Self {
        self.sample = Some(sample);
        self
    }

    pub fn get_final(&self) -> bool {
        self.final_
    }

    pub fn get_sample(&self) -> Option<f64> {
        self.sample
    }

    pub fn get_condition(&self) -> Option<&Expression> {
        self.body.condition.as_ref()
    }

    pub fn transform_expressions<F>(&mut self, func: F)
    where
        F: FnMut(Expression) -> Expression,
    {
        self.body.transform_expressions(func);
    }
}

impl fmt::Display for LogicalQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MATCH ({}) ", self.entity)?;
        self.body.fmt_select(f)?;
        if self.final_ {
            write!(f, " FINAL")?;
        }
        if let Some(sample) = self.sample {
            write!(f, " SAMPLE {}", sample)?;
        }
        self.body.fmt_tail(f)
    }
}
