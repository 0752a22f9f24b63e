//! storage-planner - storage selection and query rewrite for entity queries
//!
//! A logical query over an entity goes through:
//!
//! 1. [`planner::EntityProcessingExecutor`]: entity processors, storage
//!    selection, readiness gate, cluster selection, translation
//! 2. [`planner::PlanBuilder::build_plan`]: fixes the processor list
//! 3. [`planner::PlanBuilder::execute_plan`]: runs it, ending with
//!    mandatory condition enforcement

pub mod cli;
pub mod config;
pub mod hashing;
pub mod observability;
pub mod planner;
pub mod processors;
pub mod query;
pub mod selector;
pub mod storage;
pub mod translator;

pub use planner::{PlanningError, PlanningResult};
