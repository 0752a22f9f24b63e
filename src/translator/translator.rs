//! Logical to physical query translation
//!
//! A translator is created for one translation and dropped at its end.
//! Its memo table of already-translated subexpressions therefore never
//! outlives the call, and one request's rewrites cannot leak into another.

use std::collections::HashMap;

use super::mappers::TranslationMappers;
use crate::planner::{PlanningError, PlanningResult};
use crate::query::{Expression, FunctionCall, LogicalQuery, OrderBy, PhysicalQuery, QueryBody, SelectedExpression};

pub struct QueryTranslator<'a> {
    mappers: &'a TranslationMappers,
    cache: HashMap<Expression, Expression>,
}

impl<'a> QueryTranslator<'a> {
    pub fn new(mappers: &'a TranslationMappers) -> Self {
        Self {
            mappers,
            cache: HashMap::new(),
        }
    }

    /// Translates every expression of `query`, producing a physical query
    /// with no data source attached. Consumes the translator.
    pub fn translate(mut self, query: &LogicalQuery) -> PlanningResult<PhysicalQuery> {
        let body = &query.body;
        let translated = QueryBody {
            selected_columns: body
                .selected_columns
                .iter()
                .map(|s| Ok(SelectedExpression::new(s.name.clone(), self.translate_expression(&s.expression)?)))
                .collect::<PlanningResult<_>>()?,
            condition: body
                .condition
                .as_ref()
                .map(|c| self.translate_expression(c))
                .transpose()?,
            groupby: body
                .groupby
                .iter()
                .map(|g| self.translate_expression(g))
                .collect::<PlanningResult<_>>()?,
            having: body
                .having
                .as_ref()
                .map(|h| self.translate_expression(h))
                .transpose()?,
            order_by: body
                .order_by
                .iter()
                .map(|o| {
                    Ok(OrderBy {
                        direction: o.direction,
                        expression: self.translate_expression(&o.expression)?,
                    })
                })
                .collect::<PlanningResult<_>>()?,
            limit: body.limit,
            offset: body.offset,
        };
        Ok(PhysicalQuery::skeleton(translated))
    }

    /// Translates one expression tree.
    ///
    /// Mappers are tried in order; the first match wins. Without a match,
    /// literals pass through, function calls are rebuilt from their
    /// translated parameters and columns must be identity columns.
    pub fn translate_expression(&mut self, expression: &Expression) -> PlanningResult<Expression> {
        if let Some(hit) = self.cache.get(expression) {
            return Ok(hit.clone());
        }

        let mappers = self.mappers;
        let mut translated = None;
        for mapper in mappers.mappers() {
            if let Some(mapped) = mapper.attempt_map(expression, self)? {
                translated = Some(mapped);
                break;
            }
        }

        let translated = match translated {
            Some(mapped) => mapped,
            None => self.translate_default(expression)?,
        };
        self.cache.insert(expression.clone(), translated.clone());
        Ok(translated)
    }

    fn translate_default(&mut self, expression: &Expression) -> PlanningResult<Expression> {
        match expression {
            Expression::Column(c) => {
                if self.mappers.is_identity_column(&c.column_name) {
                    Ok(expression.clone())
                } else {
                    Err(PlanningError::translation(expression, "column has no mapping on this storage"))
                }
            }
            Expression::Literal(_) => Ok(expression.clone()),
            Expression::FunctionCall(call) => {
                let parameters = call
                    .parameters
                    .iter()
                    .map(|p| self.translate_expression(p))
                    .collect::<PlanningResult<Vec<_>>>()?;
                Ok(Expression::FunctionCall(FunctionCall {
                    alias: call.alias.clone(),
                    function_name: call.function_name.clone(),
                    parameters,
                }))
            }
        }
    }

    /// Number of memoised subexpressions (visible for tests)
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

/// Translates `query` with a fresh translator over `mappers`
pub fn translate(query: &LogicalQuery, mappers: &TranslationMappers) -> PlanningResult<PhysicalQuery> {
    QueryTranslator::new(mappers).translate(query)
}
