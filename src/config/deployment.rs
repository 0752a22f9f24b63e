//! Deployment configuration
//!
//! Loaded once at startup, validated, then shared read-only through `Arc`.
//! Nothing in the pipeline reads configuration from global state.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::{ConfigError, ConfigResult};
use crate::observability::Severity;
use crate::planner::{PlanningError, PlanningResult};
use crate::storage::{Cluster, ReadinessState, StorageSetKey};

pub const DEFAULT_LOGICAL_PARTITIONS: u32 = 256;

fn default_supported_states() -> BTreeSet<ReadinessState> {
    BTreeSet::from([ReadinessState::Stable, ReadinessState::Complete])
}

fn default_logical_partitions() -> u32 {
    DEFAULT_LOGICAL_PARTITIONS
}

fn default_log_level() -> Severity {
    Severity::Info
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeploymentConfig {
    /// Readiness states allowed to serve queries in this deployment
    #[serde(default = "default_supported_states")]
    pub supported_readiness_states: BTreeSet<ReadinessState>,

    /// When false, storages in unsupported states still serve queries and
    /// the gate only logs
    #[serde(default)]
    pub fail_queries_on_unsupported_readiness: bool,

    #[serde(default)]
    pub slicing: SlicingConfig,

    #[serde(default = "default_log_level")]
    pub log_level: Severity,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            supported_readiness_states: default_supported_states(),
            fail_queries_on_unsupported_readiness: false,
            slicing: SlicingConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl DeploymentConfig {
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: DeploymentConfig = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.fail_queries_on_unsupported_readiness && self.supported_readiness_states.is_empty() {
            return Err(ConfigError::invalid(
                "fail_queries_on_unsupported_readiness requires at least one supported readiness state",
            ));
        }
        self.slicing.validate()
    }
}

/// Slicing of one storage set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageSetSlicing {
    pub slice_count: u32,
    /// Slice of each logical partition; index is the logical partition
    pub partition_mapping: Vec<u32>,
    /// Cluster serving each slice
    pub clusters: BTreeMap<u32, Cluster>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlicingConfig {
    #[serde(default = "default_logical_partitions")]
    pub logical_partitions: u32,
    #[serde(default)]
    pub storage_sets: BTreeMap<StorageSetKey, StorageSetSlicing>,
}

impl Default for SlicingConfig {
    fn default() -> Self {
        Self::new(DEFAULT_LOGICAL_PARTITIONS)
    }
}

impl SlicingConfig {
    pub fn new(logical_partitions: u32) -> Self {
        Self {
            logical_partitions,
            storage_sets: BTreeMap::new(),
        }
    }

    pub fn with_storage_set(mut self, key: StorageSetKey, slicing: StorageSetSlicing) -> Self {
        self.storage_sets.insert(key, slicing);
        self
    }

    pub fn is_sliced(&self, storage_set: &StorageSetKey) -> bool {
        self.storage_sets.contains_key(storage_set)
    }

    fn set(&self, storage_set: &StorageSetKey) -> PlanningResult<&StorageSetSlicing> {
        self.storage_sets.get(storage_set).ok_or_else(|| {
            PlanningError::cluster_selection(format!("storage set {} is not sliced", storage_set))
        })
    }

    /// Slice holding `partition_value`
    pub fn slice_for(&self, storage_set: &StorageSetKey, partition_value: u64) -> PlanningResult<u32> {
        let set = self.set(storage_set)?;
        let logical = partition_value % u64::from(self.logical_partitions.max(1));
        usize::try_from(logical)
            .ok()
            .and_then(|i| set.partition_mapping.get(i))
            .copied()
            .ok_or_else(|| {
                PlanningError::cluster_selection(format!(
                    "logical partition {} of {} has no slice",
                    logical, storage_set
                ))
            })
    }

    pub fn cluster_for(&self, storage_set: &StorageSetKey, slice: u32) -> PlanningResult<&Cluster> {
        self.set(storage_set)?.clusters.get(&slice).ok_or_else(|| {
            PlanningError::cluster_selection(format!("slice {} of {} has no cluster", slice, storage_set))
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.logical_partitions == 0 {
            return Err(ConfigError::invalid("logical_partitions must be > 0"));
        }
        for (key, set) in &self.storage_sets {
            if set.slice_count == 0 {
                return Err(ConfigError::invalid(format!("{}: slice_count must be > 0", key)));
            }
            if set.partition_mapping.len() != self.logical_partitions as usize {
                return Err(ConfigError::invalid(format!(
                    "{}: partition_mapping has {} entries, expected {}",
                    key,
                    set.partition_mapping.len(),
                    self.logical_partitions
                )));
            }
            if let Some(bad) = set.partition_mapping.iter().find(|s| **s >= set.slice_count) {
                return Err(ConfigError::invalid(format!(
                    "{}: slice {} out of range (slice_count {})",
                    key, bad, set.slice_count
                )));
            }
            if let Some(missing) = (0..set.slice_count).find(|s| !set.clusters.contains_key(s)) {
                return Err(ConfigError::invalid(format!("{}: slice {} has no cluster", key, missing)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sliced(mapping: Vec<u32>, clusters: &[u32]) -> SlicingConfig {
        SlicingConfig::new(4).with_storage_set(
            StorageSetKey::new("metrics"),
            StorageSetSlicing {
                slice_count: 2,
                partition_mapping: mapping,
                clusters: clusters
                    .iter()
                    .map(|s| (*s, Cluster::new(format!("c{}", s), "localhost", 9000, "default")))
                    .collect(),
            },
        )
    }

    #[test]
    fn test_defaults() {
        let config: DeploymentConfig = serde_json::from_str("{}").unwrap();
        assert!(config.supported_readiness_states.contains(&ReadinessState::Stable));
        assert!(!config.fail_queries_on_unsupported_readiness);
        assert_eq!(config.slicing.logical_partitions, 256);
        assert_eq!(config.log_level, Severity::Info);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(serde_json::from_str::<DeploymentConfig>(r#"{"supported_states": []}"#).is_err());
    }

    #[test]
    fn test_slice_lookup() {
        let config = sliced(vec![0, 1, 1, 0], &[0, 1]);
        config.validate().unwrap();
        let key = StorageSetKey::new("metrics");
        assert!(config.is_sliced(&key));
        assert!(!config.is_sliced(&StorageSetKey::new("events")));
        assert_eq!(config.slice_for(&key, 1).unwrap(), 1);
        assert_eq!(config.slice_for(&key, 7).unwrap(), 0);
        assert_eq!(config.cluster_for(&key, 1).unwrap().name, "c1");
    }

    #[test]
    fn test_validation_failures() {
        assert!(sliced(vec![0, 1], &[0, 1]).validate().is_err());
        assert!(sliced(vec![0, 1, 2, 0], &[0, 1]).validate().is_err());
        assert!(sliced(vec![0, 1, 1, 0], &[0]).validate().is_err());
        assert!(SlicingConfig::new(0).validate().is_err());
    }

    #[test]
    fn test_fail_without_supported_states_rejected() {
        let config = DeploymentConfig {
            supported_readiness_states: BTreeSet::new(),
            fail_queries_on_unsupported_readiness: true,
            ..DeploymentConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().code(), "CONFIG_INVALID");
    }
}
