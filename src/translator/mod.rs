//! Query translation
//!
//! Rewrites a logical query into a physical skeleton using the mapper set
//! of the chosen storage connection.

mod mappers;
mod translator;

pub use mappers::{
    ColumnToColumn, ColumnToFunction, ColumnToLiteral, ExpressionMapper, FunctionNameMapper,
    TranslationMappers,
};
pub use translator::{translate, QueryTranslator};
