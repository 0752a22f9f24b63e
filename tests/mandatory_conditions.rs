//! Mandatory Condition Tests
//!
//! Validates:
//! - Every executed plan ends with the applier then the enforcer
//! - The enforcer fails closed when a processor strips a condition
//! - Applying twice leaves a single copy of each condition
//! - Required columns accept any pinned value
//! - Conjunctive mandatory conditions are applied and checked per conjunct
//! - Storage processors run before caller post processors

use std::sync::Arc;

use storage_planner::config::DeploymentConfig;
use storage_planner::planner::{ExplainMeta, NoopExplain, PlanBuilder};
use storage_planner::processors::{
    ColumnConstraintChecker, HashBucketFunctionTransformer, MandatoryConditionApplier,
    QueryProcessor,
};
use storage_planner::query::conditions::{
    binary_condition, get_first_level_and_conditions, AND, EQUALS,
};
use storage_planner::query::{
    Expression, PhysicalQuery, QueryBody, QuerySettings, SelectedExpression, Table,
};
use storage_planner::storage::{
    ColumnSet, InMemoryStorageRegistry, Storage, StorageKey, StorageRegistry,
};
use storage_planner::{PlanningError, PlanningResult};

// =============================================================================
// Helpers
// =============================================================================

fn deleted_filter() -> Expression {
    binary_condition(EQUALS, Expression::column("deleted"), Expression::literal(0))
}

fn registry() -> Arc<InMemoryStorageRegistry> {
    let mut registry = InMemoryStorageRegistry::new();
    registry
        .register(
            Storage::table("errors", "events", "errors_local", ColumnSet::default())
                .with_mandatory_condition(deleted_filter())
                .with_condition_checker(Arc::new(ColumnConstraintChecker::new("project_id"))),
        )
        .unwrap();
    Arc::new(registry)
}

fn bound_query(registry: &InMemoryStorageRegistry, condition: Option<Expression>) -> PhysicalQuery {
    let storage = registry.get_storage(&StorageKey::new("errors")).unwrap();
    let mut query = PhysicalQuery::skeleton(QueryBody {
        condition,
        ..QueryBody::default()
    });
    query.set_from_clause(
        Table::for_storage(&storage, false, None, storage.get_cluster().clone()).unwrap(),
    );
    query
}

fn project_filter() -> Expression {
    binary_condition(EQUALS, Expression::column("project_id"), Expression::literal(11))
}

/// Removes every condition from the query
#[derive(Debug)]
struct ConditionStripper;

impl QueryProcessor for ConditionStripper {
    fn name(&self) -> &str {
        "ConditionStripper"
    }

    fn process_query(&self, query: &mut PhysicalQuery, _settings: &mut QuerySettings) -> PlanningResult<()> {
        query.body.condition = None;
        Ok(())
    }
}

// =============================================================================
// Application and Enforcement
// =============================================================================

/// Mandatory conditions are added to the top-level conjunction
#[test]
fn test_executed_plan_carries_mandatory_conditions() {
    let registry = registry();
    let builder = PlanBuilder::new(registry.clone(), Arc::new(DeploymentConfig::default()));
    let mut settings = QuerySettings::http("t");

    let plan = builder
        .build_plan(bound_query(&registry, Some(project_filter())), &settings, vec![])
        .unwrap();
    let names = plan.processor_names();
    assert_eq!(names[names.len() - 2..], ["MandatoryConditionApplier", "MandatoryConditionEnforcer"]);

    let query = builder.execute_plan(plan, &mut settings, &mut NoopExplain).unwrap();
    let top = get_first_level_and_conditions(query.get_condition().unwrap());
    assert!(top.contains(&&deleted_filter()));
    assert!(top.contains(&&project_filter()));
}

/// A required column that is never pinned fails the plan
#[test]
fn test_missing_required_column_fails() {
    let registry = registry();
    let builder = PlanBuilder::new(registry.clone(), Arc::new(DeploymentConfig::default()));
    let mut settings = QuerySettings::http("t");

    let plan = builder.build_plan(bound_query(&registry, None), &settings, vec![]).unwrap();
    let err = builder.execute_plan(plan, &mut settings, &mut NoopExplain).unwrap_err();
    match err {
        PlanningError::MandatoryConditionViolation {
            storage_key,
            condition,
            ..
        } => {
            assert_eq!(storage_key.as_str(), "errors");
            assert_eq!(condition, "project_id");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(builder.metrics().snapshot().enforcement_violations, 1);
}

/// A post processor that strips conditions is caught by the enforcer
#[test]
fn test_enforcer_fails_closed_after_stripping() {
    let registry = registry();
    let builder = PlanBuilder::new(registry.clone(), Arc::new(DeploymentConfig::default()));
    let mut settings = QuerySettings::http("t");

    let stripper: Arc<dyn QueryProcessor> = Arc::new(ConditionStripper);
    let plan = builder
        .build_plan(bound_query(&registry, Some(project_filter())), &settings, vec![stripper])
        .unwrap();
    let err = builder.execute_plan(plan, &mut settings, &mut NoopExplain).unwrap_err();
    assert_eq!(err.code(), "PLAN_MANDATORY_CONDITION_VIOLATION");
}

/// Dry-run explain records every processor including the enforcer
#[test]
fn test_dry_run_records_each_processor_once() {
    let registry = registry();
    let builder = PlanBuilder::new(registry.clone(), Arc::new(DeploymentConfig::default()));
    let mut settings = QuerySettings::http("t").with_dry_run(true);
    let mut meta = ExplainMeta::new();

    let plan = builder
        .build_plan(bound_query(&registry, Some(project_filter())), &settings, vec![])
        .unwrap();
    builder.execute_plan(plan, &mut settings, &mut meta).unwrap();

    let names: Vec<&str> = meta.steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["MandatoryConditionApplier", "MandatoryConditionEnforcer"]);
    assert!(meta.steps.iter().all(|s| s.category == "db_processor"));
    assert!(meta.steps[0].transformed.contains("equals(deleted, 0)"));
}

// =============================================================================
// Idempotence
// =============================================================================

/// Running the applier again does not duplicate conditions
#[test]
fn test_applier_idempotent() {
    let registry = registry();
    let mut query = bound_query(&registry, Some(project_filter()));
    let mut settings = QuerySettings::http("t");

    MandatoryConditionApplier.process_query(&mut query, &mut settings).unwrap();
    let once = query.clone();
    MandatoryConditionApplier.process_query(&mut query, &mut settings).unwrap();
    assert_eq!(query, once);

    let top = get_first_level_and_conditions(query.get_condition().unwrap());
    assert_eq!(top.len(), 2);
}

/// A condition already present under an alias counts as present
#[test]
fn test_applier_ignores_aliases() {
    let registry = registry();
    let aliased = deleted_filter().with_alias("_snuba_deleted");
    let mut query = bound_query(&registry, Some(aliased));
    let mut settings = QuerySettings::http("t");

    MandatoryConditionApplier.process_query(&mut query, &mut settings).unwrap();
    let top = get_first_level_and_conditions(query.get_condition().unwrap());
    assert_eq!(top.len(), 1);
}

// =============================================================================
// Conjunctive Mandatory Conditions
// =============================================================================

fn org_filter() -> Expression {
    binary_condition(EQUALS, Expression::column("org"), Expression::literal(1))
}

fn conjunctive_registry() -> Arc<InMemoryStorageRegistry> {
    let mut registry = InMemoryStorageRegistry::new();
    registry
        .register(
            Storage::table("errors", "events", "errors_local", ColumnSet::default())
                .with_mandatory_condition(binary_condition(AND, deleted_filter(), org_filter())),
        )
        .unwrap();
    Arc::new(registry)
}

/// An `and(...)` mandatory condition is applied once per conjunct
#[test]
fn test_conjunctive_condition_applied_once() {
    let registry = conjunctive_registry();
    let mut query = bound_query(&registry, None);
    let mut settings = QuerySettings::http("t");

    MandatoryConditionApplier.process_query(&mut query, &mut settings).unwrap();
    let once = query.clone();
    MandatoryConditionApplier.process_query(&mut query, &mut settings).unwrap();
    assert_eq!(query, once);

    let top = get_first_level_and_conditions(query.get_condition().unwrap());
    assert_eq!(top, vec![&deleted_filter(), &org_filter()]);
}

/// The enforcer accepts a query right after the applier inserted the conjuncts
#[test]
fn test_conjunctive_condition_passes_enforcement() {
    let registry = conjunctive_registry();
    let builder = PlanBuilder::new(registry.clone(), Arc::new(DeploymentConfig::default()));
    let mut settings = QuerySettings::http("t");

    let plan = builder.build_plan(bound_query(&registry, None), &settings, vec![]).unwrap();
    let query = builder.execute_plan(plan, &mut settings, &mut NoopExplain).unwrap();
    assert_eq!(
        query.get_condition().unwrap().to_string(),
        "and(equals(deleted, 0), equals(org, 1))"
    );
}

// =============================================================================
// Processor Order
// =============================================================================

/// Caller-supplied processor that tags the request settings
#[derive(Debug)]
struct SettingsTagger;

impl QueryProcessor for SettingsTagger {
    fn name(&self) -> &str {
        "SettingsTagger"
    }

    fn process_query(&self, _query: &mut PhysicalQuery, settings: &mut QuerySettings) -> PlanningResult<()> {
        settings.set_clickhouse_setting("max_threads", serde_json::json!(4));
        Ok(())
    }
}

/// Storage processors, then post processors, then applier and enforcer
#[test]
fn test_storage_processors_run_before_post_processors() {
    let mut registry = InMemoryStorageRegistry::new();
    registry
        .register(
            Storage::table("eap_spans", "events_analytics_platform", "eap_spans_local", ColumnSet::default())
                .with_mandatory_condition(deleted_filter())
                .with_query_processor(Arc::new(HashBucketFunctionTransformer::new(["attr_str"]))),
        )
        .unwrap();
    let registry = Arc::new(registry);
    let builder = PlanBuilder::new(registry.clone(), Arc::new(DeploymentConfig::default()));

    let storage = registry.get_storage(&StorageKey::new("eap_spans")).unwrap();
    let mut query = PhysicalQuery::skeleton(QueryBody {
        selected_columns: vec![SelectedExpression::new(
            "has_foo",
            Expression::function(
                "mapContains",
                vec![Expression::column("attr_str"), Expression::literal("foo")],
            ),
        )],
        ..QueryBody::default()
    });
    query.set_from_clause(
        Table::for_storage(&storage, false, None, storage.get_cluster().clone()).unwrap(),
    );

    let mut settings = QuerySettings::http("t").with_dry_run(true);
    let tagger: Arc<dyn QueryProcessor> = Arc::new(SettingsTagger);
    let plan = builder.build_plan(query, &settings, vec![tagger]).unwrap();
    let expected = vec![
        "HashBucketFunctionTransformer",
        "SettingsTagger",
        "MandatoryConditionApplier",
        "MandatoryConditionEnforcer",
    ];
    assert_eq!(plan.processor_names(), expected);

    let mut meta = ExplainMeta::new();
    let executed = builder.execute_plan(plan, &mut settings, &mut meta).unwrap();
    let ran: Vec<&str> = meta.steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(ran, expected);

    assert_eq!(
        executed.to_string(),
        "SELECT mapContains(attr_str_3, 'foo') FROM eap_spans_local WHERE equals(deleted, 0)"
    );
    assert_eq!(settings.get_clickhouse_settings()["max_threads"], 4);
}
