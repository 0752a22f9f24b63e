//! Storage planning
//!
//! [`EntityProcessingExecutor`] turns a logical query into a physical one
//! bound to a storage; [`PlanBuilder`] fixes the processors that physical
//! query goes through and runs them.

mod builder;
mod errors;
mod executor;
mod explain;

pub use builder::{ClickhouseQueryPlan, PlanBuilder};
pub use errors::{PlanningError, PlanningResult, Severity};
pub use executor::EntityProcessingExecutor;
pub use explain::{ExplainMeta, ExplainSink, NoopExplain, TransformStep};
