//! Storage and entity catalog
//!
//! Describes, as JSON, every storage and every entity's candidate storages.
//! [`CatalogConfig::build`] turns it into the read-only objects shared by
//! all requests: a storage registry, one executor per entity and a plan
//! builder.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::deployment::DeploymentConfig;
use super::errors::{ConfigError, ConfigResult};
use crate::observability::{Event, Logger, PlanningMetrics};
use crate::planner::{EntityProcessingExecutor, PlanBuilder};
use crate::processors::{ColumnConstraintChecker, HashBucketFunctionTransformer};
use crate::query::{EntityKey, Expression, LiteralValue};
use crate::selector::StorageSelector;
use crate::storage::{
    AllocationPolicy, Cluster, ColumnSet, InMemoryStorageRegistry, ReadinessState, Storage, StorageConnection,
    StorageKey, StorageRegistry, StorageSetKey,
};
use crate::translator::{ColumnToColumn, ColumnToFunction, ColumnToLiteral, FunctionNameMapper, TranslationMappers};

fn default_readiness() -> ReadinessState {
    ReadinessState::Complete
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageDefinition {
    pub storage_key: StorageKey,
    pub storage_set_key: StorageSetKey,
    pub table_name: String,
    pub columns: ColumnSet,
    #[serde(default)]
    pub mandatory_conditions: Vec<Expression>,
    /// Columns every query must pin with `equals` or `in`, whatever the
    /// value
    #[serde(default)]
    pub required_columns: Vec<String>,
    #[serde(default)]
    pub allocation_policies: Vec<AllocationPolicy>,
    #[serde(default = "default_readiness")]
    pub readiness_state: ReadinessState,
    #[serde(default)]
    pub cluster: Option<Cluster>,
    #[serde(default)]
    pub writable: bool,
    /// Physical map columns split into hash buckets, rewritten by a
    /// storage processor on every plan against this storage
    #[serde(default)]
    pub hash_bucketed_columns: Vec<String>,
    #[serde(default)]
    pub hash_buckets: Option<u32>,
}

impl StorageDefinition {
    fn build(&self) -> ConfigResult<Storage> {
        let mut storage = Storage::table(
            self.storage_key.clone(),
            self.storage_set_key.clone(),
            self.table_name.clone(),
            self.columns.clone(),
        )
        .with_readiness_state(self.readiness_state)
        .writable(self.writable);

        for condition in &self.mandatory_conditions {
            storage = storage.with_mandatory_condition(condition.clone());
        }
        for column in &self.required_columns {
            storage = storage.with_condition_checker(Arc::new(ColumnConstraintChecker::new(column.clone())));
        }
        for policy in &self.allocation_policies {
            storage = storage.with_allocation_policy(policy.clone());
        }
        if let Some(cluster) = &self.cluster {
            storage = storage.with_cluster(cluster.clone());
        }
        if !self.hash_bucketed_columns.is_empty() {
            let mut transformer = HashBucketFunctionTransformer::new(self.hash_bucketed_columns.iter().cloned());
            if let Some(buckets) = self.hash_buckets {
                transformer = transformer.with_buckets(buckets)?;
            }
            storage = storage.with_query_processor(Arc::new(transformer));
        }
        Ok(storage)
    }
}

/// A mapper as written in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MapperDefinition {
    ColumnToColumn { from: String, to: String },
    ColumnToLiteral { from: String, value: LiteralValue },
    ColumnToFunction {
        from: String,
        function: String,
        parameters: Vec<Expression>,
    },
    FunctionName { from: String, to: String },
}

impl MapperDefinition {
    fn add_to(&self, mappers: TranslationMappers) -> TranslationMappers {
        match self {
            MapperDefinition::ColumnToColumn { from, to } => mappers.with_mapper(ColumnToColumn::new(from, to)),
            MapperDefinition::ColumnToLiteral { from, value } => {
                mappers.with_mapper(ColumnToLiteral::new(from, value.clone()))
            }
            MapperDefinition::ColumnToFunction { from, function, parameters } => {
                mappers.with_mapper(ColumnToFunction::new(from, function, parameters.clone()))
            }
            MapperDefinition::FunctionName { from, to } => mappers.with_mapper(FunctionNameMapper::new(from, to)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityStorageDefinition {
    pub storage_key: StorageKey,
    /// Tried before the identity mapping of the storage's columns
    #[serde(default)]
    pub mappers: Vec<MapperDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityDefinition {
    pub entity: EntityKey,
    pub storages: Vec<EntityStorageDefinition>,
    #[serde(default)]
    pub selector: StorageSelector,
    #[serde(default)]
    pub partition_key_column_name: Option<String>,
    /// Map columns split into hash buckets; rewritten before translation
    #[serde(default)]
    pub hash_bucketed_columns: Vec<String>,
    #[serde(default)]
    pub hash_buckets: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    #[serde(default)]
    pub storages: Vec<StorageDefinition>,
    #[serde(default)]
    pub entities: Vec<EntityDefinition>,
}

/// Everything a request needs, built once
pub struct Catalog {
    pub registry: Arc<InMemoryStorageRegistry>,
    pub executors: BTreeMap<EntityKey, EntityProcessingExecutor>,
    pub plan_builder: PlanBuilder,
    pub metrics: Arc<PlanningMetrics>,
}

impl Catalog {
    pub fn executor(&self, entity: &EntityKey) -> ConfigResult<&EntityProcessingExecutor> {
        self.executors
            .get(entity)
            .ok_or_else(|| ConfigError::invalid(format!("unknown entity {}", entity)))
    }
}

impl CatalogConfig {
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn build(&self, deployment: Arc<DeploymentConfig>) -> ConfigResult<Catalog> {
        let metrics = Arc::new(PlanningMetrics::new());
        let mut registry = InMemoryStorageRegistry::new();
        for definition in &self.storages {
            registry.register(definition.build()?)?;
        }

        let mut executors = BTreeMap::new();
        for entity in &self.entities {
            let executor = self.build_executor(entity, &registry, Arc::clone(&deployment))?;
            if executors.insert(entity.entity.clone(), executor.with_metrics(Arc::clone(&metrics))).is_some() {
                return Err(ConfigError::invalid(format!("entity {} defined twice", entity.entity)));
            }
        }

        let registry = Arc::new(registry);
        let plan_builder = PlanBuilder::new(registry.clone(), deployment).with_metrics(Arc::clone(&metrics));
        let storages = registry.len().to_string();
        let entities = executors.len().to_string();
        Logger::info(
            Event::CatalogLoaded.as_str(),
            &[("entities", entities.as_str()), ("storages", storages.as_str())],
        );

        Ok(Catalog {
            registry,
            executors,
            plan_builder,
            metrics,
        })
    }

    fn build_executor(
        &self,
        entity: &EntityDefinition,
        registry: &InMemoryStorageRegistry,
        deployment: Arc<DeploymentConfig>,
    ) -> ConfigResult<EntityProcessingExecutor> {
        let connections = entity
            .storages
            .iter()
            .map(|s| -> ConfigResult<StorageConnection> {
                let storage = registry.get_storage(&s.storage_key)?;
                let columns = storage
                    .table_source()
                    .map(|t| t.columns.clone())
                    .unwrap_or_default();
                let mappers = s
                    .mappers
                    .iter()
                    .fold(TranslationMappers::new(), |m, d| d.add_to(m))
                    .concat(&TranslationMappers::identity_for(&columns));
                Ok(StorageConnection::new(storage, mappers))
            })
            .collect::<ConfigResult<Vec<_>>>()?;

        let mut executor = EntityProcessingExecutor::new(
            entity.entity.clone(),
            connections,
            entity.selector.clone(),
            entity.partition_key_column_name.clone(),
            deployment,
        )?;

        if !entity.hash_bucketed_columns.is_empty() {
            let mut transformer = HashBucketFunctionTransformer::new(entity.hash_bucketed_columns.iter().cloned());
            if let Some(buckets) = entity.hash_buckets {
                transformer = transformer.with_buckets(buckets)?;
            }
            executor = executor.with_logical_processor(Arc::new(transformer));
        }
        Ok(executor)
    }
}
