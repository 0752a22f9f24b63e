//! Cluster selection for sliced storage sets
//!
//! A sliced storage set spreads its rows over several clusters. The value
//! of the partition-key column picks a logical partition
//! (`value % logical_partitions`), the deployment maps the logical
//! partition to a slice, and each slice is served by one cluster.

use crate::config::SlicingConfig;
use crate::planner::{PlanningError, PlanningResult};
use crate::query::conditions::pinned_literal_values;
use crate::query::{LiteralValue, LogicalQuery, QuerySettings};
use crate::storage::{Cluster, StorageKey, StorageSetKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnBasedStorageSliceSelector {
    pub storage: StorageKey,
    pub storage_set: StorageSetKey,
    pub partition_key_column_name: String,
}

impl ColumnBasedStorageSliceSelector {
    pub fn new(
        storage: StorageKey,
        storage_set: StorageSetKey,
        partition_key_column_name: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            storage_set,
            partition_key_column_name: partition_key_column_name.into(),
        }
    }

    /// Resolves the one cluster serving every partition-key value the query
    /// is pinned to. Fails if the column is not pinned, a value is not a
    /// non-negative integer, or the values span more than one slice.
    pub fn select_cluster(
        &self,
        query: &LogicalQuery,
        _settings: &QuerySettings,
        slicing: &SlicingConfig,
    ) -> PlanningResult<Cluster> {
        let column = &self.partition_key_column_name;
        let values = pinned_literal_values(query.get_condition(), column).ok_or_else(|| {
            PlanningError::cluster_selection(format!(
                "query on sliced storage {} does not constrain partition key {}",
                self.storage, column
            ))
        })?;

        let mut slice = None;
        for value in &values {
            let partition = partition_value(value).ok_or_else(|| {
                PlanningError::cluster_selection(format!(
                    "partition key {} must be a non-negative integer, got {}",
                    column, value
                ))
            })?;
            let s = slicing.slice_for(&self.storage_set, partition)?;
            match slice {
                Some(existing) if existing != s => {
                    return Err(PlanningError::cluster_selection(format!(
                        "partition key {} values span slices {} and {} of {}",
                        column, existing, s, self.storage_set
                    )));
                }
                _ => slice = Some(s),
            }
        }

        let slice = slice.ok_or_else(|| {
            PlanningError::cluster_selection(format!("partition key {} has no values", column))
        })?;
        slicing.cluster_for(&self.storage_set, slice).cloned()
    }
}

fn partition_value(value: &LiteralValue) -> Option<u64> {
    value.as_int().and_then(|i| u64::try_from(i).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageSetSlicing;
    use crate::query::conditions::{binary_condition, EQUALS, IN, TUPLE};
    use crate::query::Expression;
    use std::collections::BTreeMap;

    fn slicing() -> SlicingConfig {
        // even partitions on slice 0, odd on slice 1
        let mapping = (0..256).map(|p| p % 2).collect();
        SlicingConfig::new(256).with_storage_set(
            StorageSetKey::new("generic_metrics"),
            StorageSetSlicing {
                slice_count: 2,
                partition_mapping: mapping,
                clusters: BTreeMap::from([
                    (0, Cluster::new("metrics_0", "ch-0", 9000, "default")),
                    (1, Cluster::new("metrics_1", "ch-1", 9000, "default")),
                ]),
            },
        )
    }

    fn selector() -> ColumnBasedStorageSliceSelector {
        ColumnBasedStorageSliceSelector::new(
            StorageKey::new("generic_metrics_sets"),
            StorageSetKey::new("generic_metrics"),
            "org_id",
        )
    }

    fn query_for(condition: Expression) -> LogicalQuery {
        LogicalQuery::new("generic_metrics_sets").with_condition(condition)
    }

    #[test]
    fn test_equals_picks_slice() {
        let q = query_for(binary_condition(EQUALS, Expression::column("org_id"), Expression::literal(3)));
        let cluster = selector().select_cluster(&q, &QuerySettings::http("t"), &slicing()).unwrap();
        assert_eq!(cluster.name, "metrics_1");

        // 258 % 256 = 2, an even partition
        let q = query_for(binary_condition(EQUALS, Expression::column("org_id"), Expression::literal(258)));
        let cluster = selector().select_cluster(&q, &QuerySettings::http("t"), &slicing()).unwrap();
        assert_eq!(cluster.name, "metrics_0");
    }

    #[test]
    fn test_in_within_one_slice() {
        let q = query_for(binary_condition(
            IN,
            Expression::column("org_id"),
            Expression::function(TUPLE, vec![Expression::literal(2), Expression::literal(4)]),
        ));
        let cluster = selector().select_cluster(&q, &QuerySettings::http("t"), &slicing()).unwrap();
        assert_eq!(cluster.name, "metrics_0");
    }

    #[test]
    fn test_values_spanning_slices_rejected() {
        let q = query_for(binary_condition(
            IN,
            Expression::column("org_id"),
            Expression::function(TUPLE, vec![Expression::literal(2), Expression::literal(3)]),
        ));
        let err = selector().select_cluster(&q, &QuerySettings::http("t"), &slicing()).unwrap_err();
        assert_eq!(err.code(), "PLAN_CLUSTER_SELECTION");
    }

    #[test]
    fn test_unconstrained_partition_key_rejected() {
        let q = LogicalQuery::new("generic_metrics_sets");
        assert!(selector().select_cluster(&q, &QuerySettings::http("t"), &slicing()).is_err());

        let q = query_for(binary_condition(EQUALS, Expression::column("org_id"), Expression::literal("abc")));
        assert!(selector().select_cluster(&q, &QuerySettings::http("t"), &slicing()).is_err());
    }
}
