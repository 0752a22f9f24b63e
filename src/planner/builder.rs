//! Plan builder
//!
//! A plan fixes, once, the processors a physical query goes through:
//!
//! ```text
//! [storage processors.., post processors.., MandatoryConditionApplier,
//!  MandatoryConditionEnforcer(storage checkers)]
//! ```
//!
//! Executing the plan consumes it, so each processor runs exactly once.

use std::sync::Arc;

use super::errors::{PlanningError, PlanningResult};
use super::explain::ExplainSink;
use crate::config::DeploymentConfig;
use crate::observability::{Event, Logger, ObservationScope, PlanningMetrics};
use crate::processors::{MandatoryConditionApplier, MandatoryConditionEnforcer, QueryProcessor};
use crate::query::{PhysicalQuery, QuerySettings, Table};
use crate::storage::{ReadinessGate, Storage, StorageKey, StorageRegistry, StorageSetKey};

/// An executable plan for one physical query
#[derive(Debug)]
pub struct ClickhouseQueryPlan {
    query: PhysicalQuery,
    storage_set_key: StorageSetKey,
    plan_query_processors: Vec<Arc<dyn QueryProcessor>>,
    db_query_processors: Vec<Arc<dyn QueryProcessor>>,
}

impl ClickhouseQueryPlan {
    pub fn query(&self) -> &PhysicalQuery {
        &self.query
    }

    pub fn storage_set_key(&self) -> &StorageSetKey {
        &self.storage_set_key
    }

    /// Always empty for now; run before the DB processors
    pub fn plan_query_processors(&self) -> &[Arc<dyn QueryProcessor>] {
        &self.plan_query_processors
    }

    pub fn db_query_processors(&self) -> &[Arc<dyn QueryProcessor>] {
        &self.db_query_processors
    }

    pub fn processor_names(&self) -> Vec<&str> {
        self.plan_query_processors
            .iter()
            .chain(&self.db_query_processors)
            .map(|p| p.name())
            .collect()
    }
}

pub struct PlanBuilder {
    registry: Arc<dyn StorageRegistry>,
    deployment: Arc<DeploymentConfig>,
    readiness: ReadinessGate,
    metrics: Arc<PlanningMetrics>,
}

impl PlanBuilder {
    pub fn new(registry: Arc<dyn StorageRegistry>, deployment: Arc<DeploymentConfig>) -> Self {
        Self {
            registry,
            readiness: ReadinessGate::from_config(&deployment),
            deployment,
            metrics: Arc::new(PlanningMetrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<PlanningMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &PlanningMetrics {
        &self.metrics
    }

    /// Storage the query is bound to. Sliced storage sets are rejected on
    /// this path and readiness is checked again.
    fn resolve_storage(&self, query: &PhysicalQuery) -> PlanningResult<Arc<Storage>> {
        let key = query.storage_key().ok_or(PlanningError::UnboundQuery)?;
        let storage = self.registry.get_storage(key)?;

        if self.deployment.slicing.is_sliced(storage.get_storage_set_key()) {
            return Err(PlanningError::UnsupportedSlicing {
                storage_key: storage.get_storage_key().clone(),
                storage_set: storage.get_storage_set_key().clone(),
            });
        }
        if let Err(e) = self.readiness.check(&storage) {
            self.metrics.increment_readiness_rejections();
            return Err(e);
        }
        Ok(storage)
    }

    pub fn build_plan(
        &self,
        query: PhysicalQuery,
        settings: &QuerySettings,
        post_processors: Vec<Arc<dyn QueryProcessor>>,
    ) -> PlanningResult<ClickhouseQueryPlan> {
        let request_id = settings.request_id().to_string();
        let storage = match self.resolve_storage(&query) {
            Ok(storage) => storage,
            Err(e) => {
                Logger::warn(
                    Event::PlanRejected.as_str(),
                    &[("code", e.code()), ("request_id", request_id.as_str())],
                );
                return Err(e);
            }
        };

        let mut db_query_processors: Vec<Arc<dyn QueryProcessor>> = storage.get_query_processors().to_vec();
        db_query_processors.extend(post_processors);
        db_query_processors.push(Arc::new(MandatoryConditionApplier));
        db_query_processors.push(Arc::new(MandatoryConditionEnforcer::new(
            storage.get_mandatory_condition_checkers(),
        )));

        let plan = ClickhouseQueryPlan {
            query,
            storage_set_key: storage.get_storage_set_key().clone(),
            plan_query_processors: Vec::new(),
            db_query_processors,
        };

        self.metrics.increment_plans_built();
        let processors = plan.processor_names().join(",");
        Logger::info(
            Event::PlanBuilt.as_str(),
            &[
                ("processors", processors.as_str()),
                ("request_id", request_id.as_str()),
                ("storage", storage.get_storage_key().as_str()),
                ("storage_set", plan.storage_set_key.as_str()),
            ],
        );
        Ok(plan)
    }

    /// Runs every processor of `plan` once, in order, and returns the
    /// final query.
    ///
    /// The storage is resolved again and the data source rebuilt from it,
    /// keeping the query's `final`, sampling and cluster. Processors may
    /// change the query and the settings but not the bound storage.
    pub fn execute_plan(
        &self,
        plan: ClickhouseQueryPlan,
        settings: &mut QuerySettings,
        explain: &mut dyn ExplainSink,
    ) -> PlanningResult<PhysicalQuery> {
        let request_id = settings.request_id().to_string();
        let scope = ObservationScope::with_fields("EXECUTE_PLAN", &[("request_id", request_id.as_str())]);
        match self.run_plan(plan, settings, explain) {
            Ok(query) => {
                self.metrics.increment_plans_executed();
                scope.complete();
                Ok(query)
            }
            Err(e) => {
                if matches!(e, PlanningError::MandatoryConditionViolation { .. }) {
                    self.metrics.increment_enforcement_violations();
                }
                scope.fail(e.code(), &e.to_string());
                Err(e)
            }
        }
    }

    fn run_plan(
        &self,
        plan: ClickhouseQueryPlan,
        settings: &mut QuerySettings,
        explain: &mut dyn ExplainSink,
    ) -> PlanningResult<PhysicalQuery> {
        let ClickhouseQueryPlan {
            mut query,
            storage_set_key,
            plan_query_processors,
            db_query_processors,
        } = plan;

        let storage = self.resolve_storage(&query)?;
        if storage.get_storage_set_key() != &storage_set_key {
            return Err(PlanningError::invalid_configuration(format!(
                "plan targets storage set {} but storage {} belongs to {}",
                storage_set_key,
                storage.get_storage_key(),
                storage.get_storage_set_key()
            )));
        }
        rebind(&mut query, &storage)?;

        let bound = storage.get_storage_key().clone();
        for processor in plan_query_processors.iter().chain(&db_query_processors) {
            let original = settings.get_dry_run().then(|| query.to_string());
            processor.process_query(&mut query, settings)?;
            check_still_bound(&query, &bound, processor.name())?;

            if let Some(original) = original {
                explain.add_transform_step("db_processor", processor.name(), original, query.to_string());
            }
            Logger::trace(
                Event::ProcessorApplied.as_str(),
                &[("processor", processor.name()), ("storage", bound.as_str())],
            );
        }

        Logger::info(
            Event::PlanExecuted.as_str(),
            &[("storage", bound.as_str()), ("storage_set", storage_set_key.as_str())],
        );
        Ok(query)
    }
}

fn rebind(query: &mut PhysicalQuery, storage: &Storage) -> PlanningResult<()> {
    let current = query.from_clause().ok_or(PlanningError::UnboundQuery)?;
    let table = Table::for_storage(storage, current.final_, current.sampling_rate, current.cluster.clone())?;
    query.set_from_clause(table);
    Ok(())
}

fn check_still_bound(query: &PhysicalQuery, bound: &StorageKey, processor: &str) -> PlanningResult<()> {
    match query.storage_key() {
        Some(key) if key == bound => Ok(()),
        other => Err(PlanningError::StorageRebound {
            processor: processor.to_string(),
            from: bound.clone(),
            to: other.map(|k| k.to_string()).unwrap_or_else(|| "<unbound>".to_string()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SlicingConfig, StorageSetSlicing};
    use crate::planner::{ExplainMeta, NoopExplain};
    use crate::query::conditions::{binary_condition, get_first_level_and_conditions, EQUALS};
    use crate::query::{Expression, QueryBody};
    use crate::storage::{Cluster, ColumnSet, InMemoryStorageRegistry};
    use std::collections::BTreeMap;

    fn tenant() -> Expression {
        binary_condition(EQUALS, Expression::column("project_id"), Expression::literal(1))
    }

    fn registry() -> Arc<InMemoryStorageRegistry> {
        let mut registry = InMemoryStorageRegistry::new();
        registry
            .register(
                Storage::table("errors", "events", "errors_local", ColumnSet::default())
                    .with_mandatory_condition(tenant()),
            )
            .unwrap();
        registry
            .register(Storage::table("metrics_sets", "metrics", "metrics_local", ColumnSet::default()))
            .unwrap();
        Arc::new(registry)
    }

    fn bound(storage: &str, registry: &InMemoryStorageRegistry) -> PhysicalQuery {
        let storage = registry.get_storage(&StorageKey::new(storage)).unwrap();
        let mut q = PhysicalQuery::skeleton(QueryBody::default());
        q.set_from_clause(Table::for_storage(&storage, false, Some(0.1), storage.get_cluster().clone()).unwrap());
        q
    }

    /// Post processor that rebinds the query to another table
    #[derive(Debug)]
    struct Rebinder;

    impl QueryProcessor for Rebinder {
        fn name(&self) -> &str {
            "Rebinder"
        }

        fn process_query(&self, query: &mut PhysicalQuery, _settings: &mut QuerySettings) -> PlanningResult<()> {
            let mut table = query.from_clause().cloned().ok_or(PlanningError::UnboundQuery)?;
            table.storage_key = StorageKey::new("somewhere_else");
            query.set_from_clause(table);
            Ok(())
        }
    }

    #[test]
    fn test_processor_order() {
        let registry = registry();
        let builder = PlanBuilder::new(registry.clone(), Arc::new(DeploymentConfig::default()));
        let plan = builder
            .build_plan(bound("errors", &registry), &QuerySettings::http("t"), vec![Arc::new(Rebinder) as Arc<dyn QueryProcessor>])
            .unwrap();
        assert_eq!(
            plan.processor_names(),
            vec!["Rebinder", "MandatoryConditionApplier", "MandatoryConditionEnforcer"]
        );
        assert!(plan.plan_query_processors().is_empty());
        assert_eq!(plan.storage_set_key().as_str(), "events");
    }

    #[test]
    fn test_execute_applies_mandatory_conditions() {
        let registry = registry();
        let builder = PlanBuilder::new(registry.clone(), Arc::new(DeploymentConfig::default()));
        let mut settings = QuerySettings::http("t").with_dry_run(true);
        let plan = builder.build_plan(bound("errors", &registry), &settings, vec![]).unwrap();
        let mut meta = ExplainMeta::new();
        let query = builder.execute_plan(plan, &mut settings, &mut meta).unwrap();

        let top = get_first_level_and_conditions(query.get_condition().unwrap());
        assert_eq!(top, vec![&tenant()]);
        assert_eq!(query.from_clause().unwrap().sampling_rate, Some(0.1));
        assert_eq!(meta.steps.len(), 2);
        assert_eq!(meta.steps[0].name, "MandatoryConditionApplier");
        assert_eq!(builder.metrics().snapshot().plans_executed, 1);
    }

    #[test]
    fn test_unbound_query_rejected() {
        let builder = PlanBuilder::new(registry(), Arc::new(DeploymentConfig::default()));
        let err = builder
            .build_plan(PhysicalQuery::skeleton(QueryBody::default()), &QuerySettings::http("t"), vec![])
            .unwrap_err();
        assert_eq!(err, PlanningError::UnboundQuery);
    }

    #[test]
    fn test_sliced_storage_rejected() {
        let registry = registry();
        let deployment = DeploymentConfig {
            slicing: SlicingConfig::new(1).with_storage_set(
                StorageSetKey::new("metrics"),
                StorageSetSlicing {
                    slice_count: 1,
                    partition_mapping: vec![0],
                    clusters: BTreeMap::from([(0, Cluster::new("m0", "ch", 9000, "default"))]),
                },
            ),
            ..DeploymentConfig::default()
        };
        let builder = PlanBuilder::new(registry.clone(), Arc::new(deployment));
        let err = builder
            .build_plan(bound("metrics_sets", &registry), &QuerySettings::http("t"), vec![])
            .unwrap_err();
        assert_eq!(err.code(), "PLAN_UNSUPPORTED_SLICING");
    }

    #[test]
    fn test_rebinding_processor_rejected() {
        let registry = registry();
        let builder = PlanBuilder::new(registry.clone(), Arc::new(DeploymentConfig::default()));
        let mut settings = QuerySettings::http("t");
        let plan = builder
            .build_plan(bound("errors", &registry), &settings, vec![Arc::new(Rebinder) as Arc<dyn QueryProcessor>])
            .unwrap();
        let err = builder.execute_plan(plan, &mut settings, &mut NoopExplain).unwrap_err();
        assert_eq!(err.code(), "PLAN_STORAGE_REBOUND");
    }
}
