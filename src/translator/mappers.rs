//! Translation mappers
//!
//! A mapper is one rewrite rule from a logical expression to its physical
//! equivalent. A [`TranslationMappers`] set is owned by a storage
//! connection; the translator tries its rules in order and the first one
//! that matches wins.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use super::translator::QueryTranslator;
use crate::planner::PlanningResult;
use crate::query::{Column, Expression, FunctionCall, Literal, LiteralValue};
use crate::storage::ColumnSet;

/// A single logical-to-physical rewrite rule
pub trait ExpressionMapper: fmt::Debug + Send + Sync {
    /// Returns the physical expression if this rule applies to
    /// `expression`, `None` otherwise. Rules that need their children
    /// translated call back into `children`.
    fn attempt_map(
        &self,
        expression: &Expression,
        children: &mut QueryTranslator<'_>,
    ) -> PlanningResult<Option<Expression>>;
}

fn matches_column<'a>(
    expression: &'a Expression,
    table_name: Option<&str>,
    column_name: &str,
) -> Option<&'a Column> {
    expression.as_column().filter(|c| {
        c.column_name == column_name
            && (table_name.is_none() || c.table_name.as_deref() == table_name)
    })
}

/// Renames a column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnToColumn {
    pub from_table_name: Option<String>,
    pub from_col_name: String,
    pub to_table_name: Option<String>,
    pub to_col_name: String,
}

impl ColumnToColumn {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from_table_name: None,
            from_col_name: from.into(),
            to_table_name: None,
            to_col_name: to.into(),
        }
    }
}

impl ExpressionMapper for ColumnToColumn {
    fn attempt_map(&self, expression: &Expression, _children: &mut QueryTranslator<'_>) -> PlanningResult<Option<Expression>> {
        Ok(
            matches_column(expression, self.from_table_name.as_deref(), &self.from_col_name).map(|c| {
                Expression::Column(Column {
                    alias: c.alias.clone(),
                    table_name: self.to_table_name.clone(),
                    column_name: self.to_col_name.clone(),
                })
            }),
        )
    }
}

/// Replaces a column with a constant
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnToLiteral {
    pub from_table_name: Option<String>,
    pub from_col_name: String,
    pub to_literal_value: LiteralValue,
}

impl ColumnToLiteral {
    pub fn new(from: impl Into<String>, value: impl Into<LiteralValue>) -> Self {
        Self {
            from_table_name: None,
            from_col_name: from.into(),
            to_literal_value: value.into(),
        }
    }
}

impl ExpressionMapper for ColumnToLiteral {
    fn attempt_map(&self, expression: &Expression, _children: &mut QueryTranslator<'_>) -> PlanningResult<Option<Expression>> {
        Ok(
            matches_column(expression, self.from_table_name.as_deref(), &self.from_col_name).map(|c| {
                Expression::Literal(Literal {
                    alias: c.alias.clone(),
                    value: self.to_literal_value.clone(),
                })
            }),
        )
    }
}

/// Replaces a column with a function call over physical expressions.
/// The parameters are already physical and are not translated again.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnToFunction {
    pub from_table_name: Option<String>,
    pub from_col_name: String,
    pub to_function_name: String,
    pub to_function_params: Vec<Expression>,
}

impl ColumnToFunction {
    pub fn new(from: impl Into<String>, function_name: impl Into<String>, params: Vec<Expression>) -> Self {
        Self {
            from_table_name: None,
            from_col_name: from.into(),
            to_function_name: function_name.into(),
            to_function_params: params,
        }
    }
}

impl ExpressionMapper for ColumnToFunction {
    fn attempt_map(&self, expression: &Expression, _children: &mut QueryTranslator<'_>) -> PlanningResult<Option<Expression>> {
        Ok(
            matches_column(expression, self.from_table_name.as_deref(), &self.from_col_name).map(|c| {
                Expression::FunctionCall(FunctionCall {
                    alias: c.alias.clone(),
                    function_name: self.to_function_name.clone(),
                    parameters: self.to_function_params.clone(),
                })
            }),
        )
    }
}

/// Renames a function, translating its parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionNameMapper {
    pub from_name: String,
    pub to_name: String,
}

impl FunctionNameMapper {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from_name: from.into(),
            to_name: to.into(),
        }
    }
}

impl ExpressionMapper for FunctionNameMapper {
    fn attempt_map(&self, expression: &Expression, children: &mut QueryTranslator<'_>) -> PlanningResult<Option<Expression>> {
        let Some(call) = expression.as_function().filter(|f| f.function_name == self.from_name) else {
            return Ok(None);
        };
        let parameters = call
            .parameters
            .iter()
            .map(|p| children.translate_expression(p))
            .collect::<PlanningResult<Vec<_>>>()?;
        Ok(Some(Expression::FunctionCall(FunctionCall {
            alias: call.alias.clone(),
            function_name: self.to_name.clone(),
            parameters,
        })))
    }
}

/// Ordered mapper set of one storage connection
#[derive(Debug, Clone, Default)]
pub struct TranslationMappers {
    mappers: Vec<Arc<dyn ExpressionMapper>>,
    identity_columns: BTreeSet<String>,
}

impl TranslationMappers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mapper set passing every column of `columns` through unchanged
    pub fn identity_for(columns: &ColumnSet) -> Self {
        Self::new().with_identity_columns(columns.names())
    }

    pub fn with_mapper(mut self, mapper: impl ExpressionMapper + 'static) -> Self {
        self.mappers.push(Arc::new(mapper));
        self
    }

    /// Columns that exist under the same name on both sides
    pub fn with_identity_columns(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.identity_columns
            .extend(columns.into_iter().map(Into::into));
        self
    }

    /// Rules of `self` followed by rules of `other`; identity columns are
    /// the union of both.
    pub fn concat(&self, other: &TranslationMappers) -> Self {
        Self {
            mappers: self.mappers.iter().chain(&other.mappers).cloned().collect(),
            identity_columns: self
                .identity_columns
                .union(&other.identity_columns)
                .cloned()
                .collect(),
        }
    }

    pub fn mappers(&self) -> &[Arc<dyn ExpressionMapper>] {
        &self.mappers
    }

    pub fn is_identity_column(&self, column_name: &str) -> bool {
        self.identity_columns.contains(column_name)
    }
}
