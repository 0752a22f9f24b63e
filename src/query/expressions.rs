//! Expression tree shared by logical and physical queries
//!
//! Expressions are immutable values. Rewrites produce new trees through
//! [`Expression::transform`], which visits children before their parent.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// A literal scalar value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum LiteralValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl LiteralValue {
    /// Returns the string payload, if this is a string literal
    pub fn as_str(&self) -> Option<&str> {
        match self {
            LiteralValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an integer literal
    pub fn as_int(&self) -> Option<i64> {
        match self {
            LiteralValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

// Floats compare by bit pattern so that expressions can key the
// translator's memo table.
impl PartialEq for LiteralValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (LiteralValue::Null, LiteralValue::Null) => true,
            (LiteralValue::Bool(a), LiteralValue::Bool(b)) => a == b,
            (LiteralValue::Int(a), LiteralValue::Int(b)) => a == b,
            (LiteralValue::Float(a), LiteralValue::Float(b)) => a.to_bits() == b.to_bits(),
            (LiteralValue::String(a), LiteralValue::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for LiteralValue {}

impl Hash for LiteralValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            LiteralValue::Null => {}
            LiteralValue::Bool(b) => b.hash(state),
            LiteralValue::Int(i) => i.hash(state),
            LiteralValue::Float(f) => f.to_bits().hash(state),
            LiteralValue::String(s) => s.hash(state),
        }
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Null => write!(f, "NULL"),
            LiteralValue::Bool(b) => write!(f, "{}", b),
            LiteralValue::Int(i) => write!(f, "{}", i),
            LiteralValue::Float(x) => write!(f, "{}", x),
            LiteralValue::String(s) => {
                write!(f, "'")?;
                for c in s.chars() {
                    match c {
                        '\'' => write!(f, "\\'")?,
                        '\\' => write!(f, "\\\\")?,
                        c => write!(f, "{}", c)?,
                    }
                }
                write!(f, "'")
            }
        }
    }
}

impl From<&str> for LiteralValue {
    fn from(value: &str) -> Self {
        LiteralValue::String(value.to_string())
    }
}

impl From<String> for LiteralValue {
    fn from(value: String) -> Self {
        LiteralValue::String(value)
    }
}

impl From<i64> for LiteralValue {
    fn from(value: i64) -> Self {
        LiteralValue::Int(value)
    }
}

impl From<i32> for LiteralValue {
    fn from(value: i32) -> Self {
        LiteralValue::Int(i64::from(value))
    }
}

impl From<bool> for LiteralValue {
    fn from(value: bool) -> Self {
        LiteralValue::Bool(value)
    }
}

impl From<f64> for LiteralValue {
    fn from(value: f64) -> Self {
        LiteralValue::Float(value)
    }
}

/// Column reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    pub column_name: String,
}

/// Literal value with an optional alias
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Literal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub value: LiteralValue,
}

/// Function call node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub function_name: String,
    #[serde(default)]
    pub parameters: Vec<Expression>,
}

/// A node of the query expression tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expression {
    Column(Column),
    Literal(Literal),
    FunctionCall(FunctionCall),
}

impl Expression {
    /// Unqualified column reference
    pub fn column(name: impl Into<String>) -> Self {
        Expression::Column(Column {
            alias: None,
            table_name: None,
            column_name: name.into(),
        })
    }

    /// Column reference qualified by a table name
    pub fn qualified_column(table: impl Into<String>, name: impl Into<String>) -> Self {
        Expression::Column(Column {
            alias: None,
            table_name: Some(table.into()),
            column_name: name.into(),
        })
    }

    pub fn literal(value: impl Into<LiteralValue>) -> Self {
        Expression::Literal(Literal {
            alias: None,
            value: value.into(),
        })
    }

    pub fn function(name: impl Into<String>, parameters: Vec<Expression>) -> Self {
        Expression::FunctionCall(FunctionCall {
            alias: None,
            function_name: name.into(),
            parameters,
        })
    }

    /// Returns a copy of this expression carrying `alias`
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        let alias = Some(alias.into());
        match &mut self {
            Expression::Column(c) => c.alias = alias,
            Expression::Literal(l) => l.alias = alias,
            Expression::FunctionCall(fc) => fc.alias = alias,
        }
        self
    }

    pub fn alias(&self) -> Option<&str> {
        match self {
            Expression::Column(c) => c.alias.as_deref(),
            Expression::Literal(l) => l.alias.as_deref(),
            Expression::FunctionCall(fc) => fc.alias.as_deref(),
        }
    }

    /// Returns the column node if this is a column reference
    pub fn as_column(&self) -> Option<&Column> {
        match self {
            Expression::Column(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Expression::Literal(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionCall> {
        match self {
            Expression::FunctionCall(fc) => Some(fc),
            _ => None,
        }
    }

    /// True if this is a reference to `column_name`, ignoring table and alias
    pub fn is_column_named(&self, column_name: &str) -> bool {
        matches!(self, Expression::Column(c) if c.column_name == column_name)
    }

    /// Rebuilds the tree bottom-up, applying `func` to every node after its
    /// children have been rewritten.
    pub fn transform<F>(self, func: &mut F) -> Expression
    where
        F: FnMut(Expression) -> Expression,
    {
        let node = match self {
            Expression::FunctionCall(fc) => Expression::FunctionCall(FunctionCall {
                alias: fc.alias,
                function_name: fc.function_name,
                parameters: fc
                    .parameters
                    .into_iter()
                    .map(|p| p.transform(func))
                    .collect(),
            }),
            leaf => leaf,
        };
        func(node)
    }

    /// Visits every node, parents before children.
    pub fn visit<'a, F>(&'a self, func: &mut F)
    where
        F: FnMut(&'a Expression),
    {
        func(self);
        if let Expression::FunctionCall(fc) = self {
            for p in &fc.parameters {
                p.visit(func);
            }
        }
    }

    /// All column references in the tree, in visit order
    pub fn columns(&self) -> Vec<&Column> {
        let mut found = Vec::new();
        self.visit(&mut |e| {
            if let Expression::Column(c) = e {
                found.push(c);
            }
        });
        found
    }

    /// Structural equality that ignores aliases at every level
    pub fn eq_ignoring_alias(&self, other: &Expression) -> bool {
        match (self, other) {
            (Expression::Column(a), Expression::Column(b)) => {
                a.table_name == b.table_name && a.column_name == b.column_name
            }
            (Expression::Literal(a), Expression::Literal(b)) => a.value == b.value,
            (Expression::FunctionCall(a), Expression::FunctionCall(b)) => {
                a.function_name == b.function_name
                    && a.parameters.len() == b.parameters.len()
                    && a
                        .parameters
                        .iter()
                        .zip(&b.parameters)
                        .all(|(x, y)| x.eq_ignoring_alias(y))
            }
            _ => false,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Column(c) => {
                if let Some(table) = &c.table_name {
                    write!(f, "{}.", table)?;
                }
                write!(f, "{}", c.column_name)?;
            }
            Expression::Literal(l) => write!(f, "{}", l.value)?,
            Expression::FunctionCall(fc) => {
                write!(f, "{}(", fc.function_name)?;
                for (i, p) in fc.parameters.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ")")?;
            }
        }
        if let Some(alias) = self.alias() {
            write!(f, " AS `{}`", alias)?;
        }
        Ok(())
    }
}
