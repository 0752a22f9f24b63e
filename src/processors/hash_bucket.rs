//! Hash-bucketed map column rewrite
//!
//! Wide `Map(String, _)` columns such as `attr_str` are stored as N
//! sub-columns `attr_str_0 .. attr_str_{N-1}`; a key lives in the bucket
//! given by [`crate::hashing::bucket_for`]. This processor rewrites
//! functions over the logical column into their physical equivalents:
//!
//! - `mapKeys(c)` / `mapValues(c)` become
//!   `arrayConcat(mapKeys(c_0), ..., mapKeys(c_{N-1}))`
//! - `mapContains(c, 'k')` becomes `mapContains(c_{bucket(k)}, 'k')`
//!
//! Anything else, including `mapContains` with a non-literal or non-string
//! key, is left untouched.

use std::collections::BTreeSet;

use super::{LogicalQueryProcessor, QueryProcessor};
use crate::hashing::{bucket_column_name, bucket_for, ATTRIBUTE_BUCKETS};
use crate::planner::{PlanningError, PlanningResult};
use crate::query::{Column, Expression, FunctionCall, LiteralValue, LogicalQuery, PhysicalQuery, QueryBody, QuerySettings};

const MAP_KEYS: &str = "mapKeys";
const MAP_VALUES: &str = "mapValues";
const MAP_CONTAINS: &str = "mapContains";
const ARRAY_CONCAT: &str = "arrayConcat";

#[derive(Debug, Clone)]
pub struct HashBucketFunctionTransformer {
    hash_bucket_names: BTreeSet<String>,
    buckets: u32,
}

impl HashBucketFunctionTransformer {
    /// Transformer over `hash_bucket_names` using [`ATTRIBUTE_BUCKETS`]
    pub fn new(hash_bucket_names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            hash_bucket_names: hash_bucket_names.into_iter().map(Into::into).collect(),
            buckets: ATTRIBUTE_BUCKETS,
        }
    }

    /// Overrides the bucket count. Zero buckets is a configuration error.
    pub fn with_buckets(mut self, buckets: u32) -> PlanningResult<Self> {
        if buckets == 0 {
            return Err(PlanningError::invalid_configuration(
                "hash bucket count must be greater than zero",
            ));
        }
        self.buckets = buckets;
        Ok(self)
    }

    pub fn buckets(&self) -> u32 {
        self.buckets
    }

    fn bucketed_column<'a>(&self, expr: &'a Expression) -> Option<&'a Column> {
        expr.as_column()
            .filter(|c| self.hash_bucket_names.contains(&c.column_name))
    }

    /// Rewrites a single node. Children are not inspected beyond the
    /// argument shape of the call itself.
    pub fn rewrite_expression(&self, expr: Expression) -> Expression {
        let call = match expr {
            Expression::FunctionCall(call) => call,
            other => return other,
        };
        let rewritten = match call.function_name.as_str() {
            MAP_KEYS | MAP_VALUES => self.rewrite_keys_or_values(&call),
            MAP_CONTAINS => self.rewrite_contains(&call),
            _ => None,
        };
        rewritten.unwrap_or(Expression::FunctionCall(call))
    }

    fn rewrite_keys_or_values(&self, call: &FunctionCall) -> Option<Expression> {
        let [param] = call.parameters.as_slice() else {
            return None;
        };
        let column = self.bucketed_column(param)?;

        let parts = (0..self.buckets)
            .map(|i| {
                Expression::function(
                    call.function_name.clone(),
                    vec![Expression::Column(Column {
                        alias: None,
                        table_name: column.table_name.clone(),
                        column_name: bucket_column_name(&column.column_name, i),
                    })],
                )
            })
            .collect();

        Some(Expression::FunctionCall(FunctionCall {
            alias: call.alias.clone(),
            function_name: ARRAY_CONCAT.to_string(),
            parameters: parts,
        }))
    }

    fn rewrite_contains(&self, call: &FunctionCall) -> Option<Expression> {
        let [map, key] = call.parameters.as_slice() else {
            return None;
        };
        let column = self.bucketed_column(map)?;
        let key_str = match key.as_literal() {
            Some(lit) => match &lit.value {
                LiteralValue::String(s) => s,
                _ => return None,
            },
            None => return None,
        };

        let bucket = bucket_for(key_str, self.buckets);
        Some(Expression::FunctionCall(FunctionCall {
            alias: call.alias.clone(),
            function_name: call.function_name.clone(),
            parameters: vec![
                Expression::Column(Column {
                    alias: None,
                    table_name: column.table_name.clone(),
                    column_name: bucket_column_name(&column.column_name, bucket),
                }),
                key.clone(),
            ],
        }))
    }

    fn transform_body(&self, body: &mut QueryBody) {
        body.transform_expressions(|e| self.rewrite_expression(e));
    }
}

impl LogicalQueryProcessor for HashBucketFunctionTransformer {
    fn name(&self) -> &str {
        "HashBucketFunctionTransformer"
    }

    fn process_query(&self, query: &mut LogicalQuery, _settings: &QuerySettings) -> PlanningResult<()> {
        self.transform_body(&mut query.body);
        Ok(())
    }
}

impl QueryProcessor for HashBucketFunctionTransformer {
    fn name(&self) -> &str {
        "HashBucketFunctionTransformer"
    }

    fn process_query(&self, query: &mut PhysicalQuery, _settings: &mut QuerySettings) -> PlanningResult<()> {
        self.transform_body(&mut query.body);
        Ok(())
    }
}
