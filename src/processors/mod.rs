//! Query processors
//!
//! Processors rewrite a query in place. Logical processors run over the
//! entity-level query before storage selection; physical processors run
//! over the translated query as part of an executed plan, each exactly
//! once, in plan order.

mod hash_bucket;
mod mandatory;

use std::fmt;

pub use hash_bucket::HashBucketFunctionTransformer;
pub use mandatory::{
    ColumnConstraintChecker, ConditionChecker, ExactConditionChecker, MandatoryConditionApplier,
    MandatoryConditionEnforcer,
};

use crate::planner::PlanningResult;
use crate::query::{LogicalQuery, PhysicalQuery, QuerySettings};

/// Entity-level processor
pub trait LogicalQueryProcessor: fmt::Debug + Send + Sync {
    /// Stable name used in explain output and logs
    fn name(&self) -> &str;

    fn process_query(&self, query: &mut LogicalQuery, settings: &QuerySettings) -> PlanningResult<()>;
}

/// Storage-level processor.
///
/// May mutate the query and the request's settings (ClickHouse settings,
/// quota). Must not rebind the query to another storage.
pub trait QueryProcessor: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn process_query(&self, query: &mut PhysicalQuery, settings: &mut QuerySettings) -> PlanningResult<()>;
}
