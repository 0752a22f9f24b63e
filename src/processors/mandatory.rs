//! Mandatory condition application and enforcement
//!
//! The applier inserts every mandatory condition of the bound table into
//! the query's top-level conjunction. The enforcer runs last and checks that
//! each condition is still there; it fails closed.

use std::fmt;
use std::sync::Arc;

use super::QueryProcessor;
use crate::observability::{Event, Logger};
use crate::planner::{PlanningError, PlanningResult};
use crate::query::conditions::{get_first_level_and_conditions, EQUALS, IN};
use crate::query::{Expression, PhysicalQuery, QuerySettings};

/// Recognises one top-level condition as satisfying a requirement
pub trait ConditionChecker: fmt::Debug + Send + Sync {
    /// Identifier reported when the requirement is unmet
    fn id(&self) -> String;

    fn check(&self, condition: &Expression) -> bool;
}

/// Requires a condition structurally equal to a fixed expression
/// (aliases ignored)
#[derive(Debug, Clone)]
pub struct ExactConditionChecker {
    expected: Expression,
}

impl ExactConditionChecker {
    pub fn new(expected: Expression) -> Self {
        Self { expected }
    }
}

impl ConditionChecker for ExactConditionChecker {
    fn id(&self) -> String {
        self.expected.to_string()
    }

    fn check(&self, condition: &Expression) -> bool {
        condition.eq_ignoring_alias(&self.expected)
    }
}

/// Requires `column` to be pinned with `equals(column, literal)` or
/// `in(column, tuple(...))`, whatever the value. Used for tenant scoping
/// where the tenant id comes from the request.
#[derive(Debug, Clone)]
pub struct ColumnConstraintChecker {
    column_name: String,
}

impl ColumnConstraintChecker {
    pub fn new(column_name: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
        }
    }
}

impl ConditionChecker for ColumnConstraintChecker {
    fn id(&self) -> String {
        self.column_name.clone()
    }

    fn check(&self, condition: &Expression) -> bool {
        match condition.as_function() {
            Some(fc) if (fc.function_name == EQUALS || fc.function_name == IN) && fc.parameters.len() == 2 => {
                fc.parameters[0].is_column_named(&self.column_name)
            }
            _ => false,
        }
    }
}

/// Adds the bound table's mandatory conditions to the query.
///
/// Conditions already present at the top level are not added again, so
/// applying twice is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct MandatoryConditionApplier;

impl QueryProcessor for MandatoryConditionApplier {
    fn name(&self) -> &str {
        "MandatoryConditionApplier"
    }

    fn process_query(&self, query: &mut PhysicalQuery, _settings: &mut QuerySettings) -> PlanningResult<()> {
        let table = query.from_clause().ok_or(PlanningError::UnboundQuery)?;
        let mandatory: Vec<Expression> = table
            .mandatory_conditions
            .iter()
            .flat_map(get_first_level_and_conditions)
            .cloned()
            .collect();

        for condition in mandatory {
            let present = query
                .get_condition()
                .map(|c| {
                    get_first_level_and_conditions(c)
                        .into_iter()
                        .any(|existing| existing.eq_ignoring_alias(&condition))
                })
                .unwrap_or(false);
            if !present {
                query.body.add_condition(condition);
            }
        }
        Ok(())
    }
}

/// Verifies, after every other processor ran, that each checker is
/// satisfied by some top-level condition of the query
#[derive(Debug, Clone)]
pub struct MandatoryConditionEnforcer {
    checkers: Vec<Arc<dyn ConditionChecker>>,
}

impl MandatoryConditionEnforcer {
    pub fn new(checkers: Vec<Arc<dyn ConditionChecker>>) -> Self {
        Self { checkers }
    }

    pub fn checkers(&self) -> &[Arc<dyn ConditionChecker>] {
        &self.checkers
    }
}

impl QueryProcessor for MandatoryConditionEnforcer {
    fn name(&self) -> &str {
        "MandatoryConditionEnforcer"
    }

    fn process_query(&self, query: &mut PhysicalQuery, _settings: &mut QuerySettings) -> PlanningResult<()> {
        let storage_key = query.storage_key().cloned().ok_or(PlanningError::UnboundQuery)?;
        let top_level: Vec<&Expression> = query
            .get_condition()
            .map(get_first_level_and_conditions)
            .unwrap_or_default();

        for checker in &self.checkers {
            if !top_level.iter().any(|c| checker.check(c)) {
                let id = checker.id();
                Logger::error(
                    Event::MandatoryConditionViolated.as_str(),
                    &[("condition", id.as_str()), ("storage", storage_key.as_str())],
                );
                return Err(PlanningError::MandatoryConditionViolation {
                    storage_key,
                    checker: self.name().to_string(),
                    condition: id,
                });
            }
        }
        Ok(())
    }
}
