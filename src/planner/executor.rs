//! Entity processing executor
//!
//! Turns a logical query over one entity into a physical query bound to a
//! storage's table:
//!
//! 1. entity-level processors rewrite the logical query in place
//! 2. a storage connection is selected and passed through the readiness gate
//! 3. the cluster is resolved, through the slice selector if the storage
//!    set is sliced
//! 4. the query is translated with the connection's mappers
//! 5. the table, schema, policies, mandatory conditions and `final` /
//!    sampling flags are attached

use std::sync::Arc;

use super::errors::{PlanningError, PlanningResult};
use super::explain::{with_explain, ExplainSink};
use crate::config::DeploymentConfig;
use crate::observability::{Event, Logger, ObservationScope, PlanningMetrics};
use crate::processors::LogicalQueryProcessor;
use crate::query::{EntityKey, LogicalQuery, PhysicalQuery, QuerySettings, Table};
use crate::selector::{ColumnBasedStorageSliceSelector, StorageSelector};
use crate::storage::{Cluster, ReadinessGate, Storage, StorageConnection};
use crate::translator::translate;

#[derive(Debug)]
pub struct EntityProcessingExecutor {
    entity: EntityKey,
    connections: Vec<StorageConnection>,
    selector: StorageSelector,
    logical_processors: Vec<Arc<dyn LogicalQueryProcessor>>,
    partition_key_column_name: Option<String>,
    deployment: Arc<DeploymentConfig>,
    readiness: ReadinessGate,
    metrics: Arc<PlanningMetrics>,
}

impl EntityProcessingExecutor {
    /// Fails with `InvalidConfiguration` if a connection's storage set is
    /// sliced while no partition-key column is configured, or if a sliced
    /// storage is not table-backed.
    pub fn new(
        entity: EntityKey,
        connections: Vec<StorageConnection>,
        selector: StorageSelector,
        partition_key_column_name: Option<String>,
        deployment: Arc<DeploymentConfig>,
    ) -> PlanningResult<Self> {
        for connection in &connections {
            let storage = &connection.storage;
            if !deployment.slicing.is_sliced(storage.get_storage_set_key()) {
                continue;
            }
            if partition_key_column_name.is_none() {
                return Err(PlanningError::invalid_configuration(format!(
                    "entity {} uses sliced storage {} but has no partition_key_column_name",
                    entity,
                    storage.get_storage_key()
                )));
            }
            if storage.table_source().is_none() {
                return Err(PlanningError::invalid_configuration(format!(
                    "sliced storage {} must be table-backed",
                    storage.get_storage_key()
                )));
            }
        }

        Ok(Self {
            entity,
            connections,
            selector,
            logical_processors: Vec::new(),
            partition_key_column_name,
            readiness: ReadinessGate::from_config(&deployment),
            deployment,
            metrics: Arc::new(PlanningMetrics::new()),
        })
    }

    pub fn with_logical_processor(mut self, processor: Arc<dyn LogicalQueryProcessor>) -> Self {
        self.logical_processors.push(processor);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<PlanningMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn entity(&self) -> &EntityKey {
        &self.entity
    }

    pub fn connections(&self) -> &[StorageConnection] {
        &self.connections
    }

    /// Selects a connection and checks its storage's readiness. The gate
    /// runs on every call.
    pub fn select_storage(&self, query: &LogicalQuery, settings: &QuerySettings) -> PlanningResult<&StorageConnection> {
        let connection = self.selector.select_storage(query, settings, &self.connections)?;
        if let Err(e) = self.readiness.check(&connection.storage) {
            self.metrics.increment_readiness_rejections();
            return Err(e);
        }

        self.metrics.increment_storages_selected();
        let request_id = settings.request_id().to_string();
        Logger::info(
            Event::StorageSelected.as_str(),
            &[
                ("entity", self.entity.as_str()),
                ("request_id", request_id.as_str()),
                ("storage", connection.storage.get_storage_key().as_str()),
            ],
        );
        Ok(connection)
    }

    /// Cluster the query runs on. Unsliced storage sets use the storage's
    /// own cluster.
    pub fn get_cluster(&self, storage: &Storage, query: &LogicalQuery, settings: &QuerySettings) -> PlanningResult<Cluster> {
        let storage_set = storage.get_storage_set_key();
        if !self.deployment.slicing.is_sliced(storage_set) {
            return Ok(storage.get_cluster().clone());
        }

        let partition_key = self.partition_key_column_name.as_deref().ok_or_else(|| {
            PlanningError::invalid_configuration(format!(
                "sliced storage {} requires a partition key column",
                storage.get_storage_key()
            ))
        })?;
        let cluster = ColumnBasedStorageSliceSelector::new(
            storage.get_storage_key().clone(),
            storage_set.clone(),
            partition_key,
        )
        .select_cluster(query, settings, &self.deployment.slicing)?;

        Logger::trace(
            Event::ClusterSelected.as_str(),
            &[
                ("cluster", cluster.name.as_str()),
                ("storage", storage.get_storage_key().as_str()),
            ],
        );
        Ok(cluster)
    }

    /// Runs the whole executor pipeline over `query`, which is mutated by
    /// the entity-level processors.
    pub fn translate_and_attach(
        &self,
        query: &mut LogicalQuery,
        settings: &QuerySettings,
        explain: &mut dyn ExplainSink,
    ) -> PlanningResult<PhysicalQuery> {
        if query.entity != self.entity {
            return Err(PlanningError::invalid_configuration(format!(
                "executor for entity {} received a query on {}",
                self.entity, query.entity
            )));
        }

        let request_id = settings.request_id().to_string();
        let scope = ObservationScope::with_fields(
            "TRANSLATE",
            &[("entity", self.entity.as_str()), ("request_id", request_id.as_str())],
        );
        match self.run(query, settings, explain) {
            Ok(physical) => {
                let storage = physical.storage_key().map(|k| k.to_string()).unwrap_or_default();
                scope.complete_with_fields(&[("storage", storage.as_str())]);
                Ok(physical)
            }
            Err(e) => {
                scope.fail(e.code(), &e.to_string());
                Err(e)
            }
        }
    }

    fn run(
        &self,
        query: &mut LogicalQuery,
        settings: &QuerySettings,
        explain: &mut dyn ExplainSink,
    ) -> PlanningResult<PhysicalQuery> {
        for processor in &self.logical_processors {
            with_explain(explain, settings, "entity_processor", processor.name(), query, |q| {
                processor.process_query(q, settings)
            })?;
        }

        let connection = self.select_storage(query, settings)?;
        let storage = &connection.storage;
        let cluster = self.get_cluster(storage, query, settings)?;

        let mut physical = translate(query, &connection.translation_mappers).map_err(|e| {
            Logger::warn(
                Event::TranslationFailed.as_str(),
                &[("reason", e.to_string().as_str()), ("storage", storage.get_storage_key().as_str())],
            );
            e
        })?;
        self.metrics.increment_translations();
        if settings.get_dry_run() {
            explain.add_transform_step("storage_planning", "mappers", query.to_string(), physical.to_string());
        }

        physical.set_from_clause(Table::for_storage(
            storage,
            query.get_final(),
            query.get_sample(),
            cluster,
        )?);
        Logger::trace(
            Event::QueryTranslated.as_str(),
            &[("storage", storage.get_storage_key().as_str()), ("table", physical_table(&physical))],
        );
        Ok(physical)
    }
}

fn physical_table(query: &PhysicalQuery) -> &str {
    query.from_clause().map(|t| t.table_name.as_str()).unwrap_or("")
}
