//! Condition helpers over the expression tree
//!
//! Conditions are plain function calls (`and`, `equals`, `in`, ...). The
//! helpers here build and decompose the top-level conjunction, which is
//! the only level the planner reasons about.

use super::expressions::{Expression, LiteralValue};

pub const AND: &str = "and";
pub const OR: &str = "or";
pub const EQUALS: &str = "equals";
pub const IN: &str = "in";
pub const TUPLE: &str = "tuple";

/// Builds `op(lhs, rhs)`
pub fn binary_condition(op: &str, lhs: Expression, rhs: Expression) -> Expression {
    Expression::function(op, vec![lhs, rhs])
}

/// Combines conditions into a right-nested chain of binary `and` calls.
///
/// Returns `None` for an empty input.
pub fn combine_and_conditions(conditions: Vec<Expression>) -> Option<Expression> {
    let mut iter = conditions.into_iter().rev();
    let last = iter.next()?;
    Some(iter.fold(last, |acc, cond| binary_condition(AND, cond, acc)))
}

/// Flattens nested `and` calls (any arity) into their operands.
pub fn get_first_level_and_conditions(condition: &Expression) -> Vec<&Expression> {
    match condition {
        Expression::FunctionCall(fc) if fc.function_name == AND => fc
            .parameters
            .iter()
            .flat_map(get_first_level_and_conditions)
            .collect(),
        other => vec![other],
    }
}

/// Literal values a top-level condition pins `column_name` to.
///
/// Recognises `equals(col, literal)`, `equals(literal, col)` and
/// `in(col, tuple(literal, ...))`. Returns `None` when no top-level
/// condition constrains the column.
pub fn pinned_literal_values(
    condition: Option<&Expression>,
    column_name: &str,
) -> Option<Vec<LiteralValue>> {
    let condition = condition?;
    let mut values: Option<Vec<LiteralValue>> = None;

    for cond in get_first_level_and_conditions(condition) {
        let Some(fc) = cond.as_function() else {
            continue;
        };
        if fc.parameters.len() != 2 {
            continue;
        }
        let (lhs, rhs) = (&fc.parameters[0], &fc.parameters[1]);

        let found: Option<Vec<LiteralValue>> = match fc.function_name.as_str() {
            EQUALS => match (lhs, rhs) {
                (Expression::Column(c), Expression::Literal(l))
                | (Expression::Literal(l), Expression::Column(c))
                    if c.column_name == column_name =>
                {
                    Some(vec![l.value.clone()])
                }
                _ => None,
            },
            IN if lhs.is_column_named(column_name) => match rhs.as_function() {
                Some(tuple) if tuple.function_name == TUPLE => tuple
                    .parameters
                    .iter()
                    .map(|p| p.as_literal().map(|l| l.value.clone()))
                    .collect(),
                _ => None,
            },
            _ => None,
        };

        // Several pinning conditions intersect.
        if let Some(found) = found {
            values = Some(match values {
                None => found,
                Some(existing) => existing.into_iter().filter(|v| found.contains(v)).collect(),
            });
        }
    }

    values.map(|mut v| {
        v.dedup();
        v
    })
}
