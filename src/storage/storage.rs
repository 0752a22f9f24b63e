//! Physical storage definitions
//!
//! A [`Storage`] is a configuration-time constant: built once at startup,
//! shared read-only by every request through `Arc`.

use std::sync::Arc;

use super::types::{AllocationPolicy, Cluster, ColumnSet, ReadinessState, StorageKey, StorageSetKey};
use crate::processors::{ConditionChecker, ExactConditionChecker, QueryProcessor};
use crate::query::conditions::get_first_level_and_conditions;
use crate::query::Expression;

/// Table backing a storage
#[derive(Debug, Clone, PartialEq)]
pub struct TableSource {
    pub table_name: String,
    pub columns: ColumnSet,
    pub mandatory_conditions: Vec<Expression>,
}

/// Where a storage's rows come from
#[derive(Debug, Clone, PartialEq)]
pub enum RelationalSource {
    /// A single physical table
    Table(TableSource),
    /// A source that is not a plain table (system views, table functions).
    /// It cannot be attached as a query data source.
    Virtual { name: String },
}

#[derive(Debug)]
pub struct Storage {
    key: StorageKey,
    storage_set_key: StorageSetKey,
    source: RelationalSource,
    allocation_policies: Vec<AllocationPolicy>,
    readiness_state: ReadinessState,
    cluster: Cluster,
    query_processors: Vec<Arc<dyn QueryProcessor>>,
    condition_checkers: Vec<Arc<dyn ConditionChecker>>,
    writable: bool,
}

impl Storage {
    /// A table-backed storage with no mandatory conditions, processors or
    /// policies, in `complete` readiness on a local default cluster.
    pub fn table(
        key: impl Into<StorageKey>,
        storage_set_key: impl Into<StorageSetKey>,
        table_name: impl Into<String>,
        columns: ColumnSet,
    ) -> Self {
        Self::with_source(
            key.into(),
            storage_set_key.into(),
            RelationalSource::Table(TableSource {
                table_name: table_name.into(),
                columns,
                mandatory_conditions: Vec::new(),
            }),
        )
    }

    pub fn with_source(key: StorageKey, storage_set_key: StorageSetKey, source: RelationalSource) -> Self {
        Self {
            key,
            storage_set_key,
            source,
            allocation_policies: Vec::new(),
            readiness_state: ReadinessState::Complete,
            cluster: Cluster::new("default", "localhost", 9000, "default"),
            query_processors: Vec::new(),
            condition_checkers: Vec::new(),
            writable: false,
        }
    }

    /// Adds a condition every query against the table must carry.
    /// A conjunction is stored as its separate conjuncts, each applied and
    /// checked on its own. Ignored for non-table sources.
    pub fn with_mandatory_condition(mut self, condition: Expression) -> Self {
        if let RelationalSource::Table(table) = &mut self.source {
            for conjunct in get_first_level_and_conditions(&condition) {
                if !table.mandatory_conditions.iter().any(|c| c.eq_ignoring_alias(conjunct)) {
                    table.mandatory_conditions.push(conjunct.clone());
                }
            }
        }
        self
    }

    pub fn with_allocation_policy(mut self, policy: AllocationPolicy) -> Self {
        self.allocation_policies.push(policy);
        self
    }

    pub fn with_readiness_state(mut self, state: ReadinessState) -> Self {
        self.readiness_state = state;
        self
    }

    pub fn with_cluster(mut self, cluster: Cluster) -> Self {
        self.cluster = cluster;
        self
    }

    pub fn with_query_processor(mut self, processor: Arc<dyn QueryProcessor>) -> Self {
        self.query_processors.push(processor);
        self
    }

    /// Adds a checker beyond the ones derived from mandatory conditions
    pub fn with_condition_checker(mut self, checker: Arc<dyn ConditionChecker>) -> Self {
        self.condition_checkers.push(checker);
        self
    }

    pub fn writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }

    pub fn get_storage_key(&self) -> &StorageKey {
        &self.key
    }

    pub fn get_storage_set_key(&self) -> &StorageSetKey {
        &self.storage_set_key
    }

    pub fn get_data_source(&self) -> &RelationalSource {
        &self.source
    }

    /// The backing table, if this storage is table-backed
    pub fn table_source(&self) -> Option<&TableSource> {
        match &self.source {
            RelationalSource::Table(t) => Some(t),
            RelationalSource::Virtual { .. } => None,
        }
    }

    pub fn get_mandatory_conditions(&self) -> &[Expression] {
        self.table_source()
            .map(|t| t.mandatory_conditions.as_slice())
            .unwrap_or(&[])
    }

    pub fn get_allocation_policies(&self) -> &[AllocationPolicy] {
        &self.allocation_policies
    }

    pub fn get_readiness_state(&self) -> ReadinessState {
        self.readiness_state
    }

    /// Default cluster, used when the storage set is not sliced
    pub fn get_cluster(&self) -> &Cluster {
        &self.cluster
    }

    pub fn get_query_processors(&self) -> &[Arc<dyn QueryProcessor>] {
        &self.query_processors
    }

    /// One exact-match checker per mandatory condition, followed by the
    /// explicitly configured checkers.
    pub fn get_mandatory_condition_checkers(&self) -> Vec<Arc<dyn ConditionChecker>> {
        self.get_mandatory_conditions()
            .iter()
            .map(|c| Arc::new(ExactConditionChecker::new(c.clone())) as Arc<dyn ConditionChecker>)
            .chain(self.condition_checkers.iter().cloned())
            .collect()
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }
}
