//! Query representations flowing through the planning pipeline
//!
//! - [`LogicalQuery`]: entity-level query as received from the request layer
//! - [`PhysicalQuery`]: translated query bound to one storage's table
//! - [`QuerySettings`]: per-request flags, read-only to the pipeline

mod body;
pub mod conditions;
mod expressions;
mod logical;
mod physical;
mod settings;

pub use body::{OrderBy, OrderByDirection, QueryBody, SelectedExpression};
pub use expressions::{Column, Expression, FunctionCall, Literal, LiteralValue};
pub use logical::{EntityKey, LogicalQuery};
pub use physical::{PhysicalQuery, Table};
pub use settings::{QuerySettings, ResourceQuota, SettingsSource, TenantId};
