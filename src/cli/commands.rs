//! CLI command implementations
//!
//! Each command returns the `data` payload of its response; `run_command`
//! writes it, or the error, as one JSON line on stdout.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::config::{Catalog, CatalogConfig, DeploymentConfig};
use crate::hashing::{bucket_column_name, bucket_for};
use crate::observability::{Event, Logger};
use crate::planner::ExplainMeta;
use crate::query::{LogicalQuery, QuerySettings};
use crate::storage::StorageRegistry;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{read_request, write_error, write_response};

/// Request-level options of the `plan` command
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    pub entity: String,
    pub referrer: String,
    pub dry_run: bool,
    pub consistent: bool,
    pub flags: Vec<String>,
}

impl PlanOptions {
    fn settings(&self) -> QuerySettings {
        self.flags.iter().fold(
            QuerySettings::http(self.referrer.clone())
                .with_dry_run(self.dry_run)
                .with_consistent(self.consistent),
            |s, flag| s.with_flag(flag.clone(), true),
        )
    }
}

pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command)
}

pub fn run_command(cmd: Command) -> CliResult<()> {
    let result = match cmd {
        Command::Validate { config, catalog } => validate(&config, &catalog),
        Command::Plan {
            config,
            catalog,
            entity,
            referrer,
            dry_run,
            consistent,
            flags,
        } => {
            let options = PlanOptions {
                entity,
                referrer,
                dry_run,
                consistent,
                flags,
            };
            read_request().and_then(|request| plan(&config, &catalog, &options, request))
        }
        Command::Bucket { key, buckets } => bucket(&key, buckets),
    };

    match result {
        Ok(data) => write_response(data),
        Err(e) => {
            write_error(e.code_str(), e.message())?;
            Err(e)
        }
    }
}

/// Loads and validates both files and builds the catalog
pub fn load(config_path: &Path, catalog_path: &Path) -> CliResult<Catalog> {
    let path = config_path.display().to_string();
    let deployment = DeploymentConfig::load(config_path).map_err(|e| {
        let reason = e.to_string();
        Logger::error(
            Event::ConfigInvalid.as_str(),
            &[("code", e.code()), ("path", path.as_str()), ("reason", reason.as_str())],
        );
        e
    })?;
    Logger::set_min_severity(deployment.log_level);
    Logger::info(Event::ConfigLoaded.as_str(), &[("path", path.as_str())]);
    Ok(CatalogConfig::load(catalog_path)?.build(Arc::new(deployment))?)
}

pub fn validate(config_path: &Path, catalog_path: &Path) -> CliResult<Value> {
    let catalog = load(config_path, catalog_path)?;
    Ok(json!({
        "storages": catalog.registry.len(),
        "writable_storages": catalog.registry.get_writable_storage_keys(),
        "entities": catalog.executors.keys().collect::<Vec<_>>(),
    }))
}

pub fn plan(config_path: &Path, catalog_path: &Path, options: &PlanOptions, request: Value) -> CliResult<Value> {
    let catalog = load(config_path, catalog_path)?;
    plan_with_catalog(&catalog, options, request)
}

/// Runs translation, plan building and plan execution for one request.
/// The request's `entity` defaults to the one in `options` and must match
/// it when given.
pub fn plan_with_catalog(catalog: &Catalog, options: &PlanOptions, request: Value) -> CliResult<Value> {
    let mut request = request;
    let object = request
        .as_object_mut()
        .ok_or_else(|| CliError::invalid_input("query must be a JSON object"))?;
    match object.get("entity").and_then(Value::as_str) {
        Some(entity) if entity != options.entity => {
            return Err(CliError::invalid_input(format!(
                "query entity {} does not match --entity {}",
                entity, options.entity
            )));
        }
        Some(_) => {}
        None => {
            object.insert("entity".to_string(), Value::String(options.entity.clone()));
        }
    }

    let mut query: LogicalQuery = serde_json::from_value(request)?;
    let mut settings = options.settings();
    let mut explain = ExplainMeta::new();

    let executor = catalog.executor(&query.entity)?;
    let physical = executor.translate_and_attach(&mut query, &settings, &mut explain)?;
    let plan = catalog.plan_builder.build_plan(physical, &settings, Vec::new())?;
    let storage_set = plan.storage_set_key().to_string();
    let processors: Vec<String> = plan.processor_names().into_iter().map(String::from).collect();
    let query = catalog.plan_builder.execute_plan(plan, &mut settings, &mut explain)?;

    let mut data = json!({
        "request_id": settings.request_id(),
        "sql": query.to_string(),
        "storage": query.storage_key(),
        "storage_set": storage_set,
        "cluster": query.from_clause().map(|t| &t.cluster),
        "processors": processors,
        "clickhouse_settings": settings.get_clickhouse_settings(),
    });
    if settings.get_dry_run() {
        data["explain"] = serde_json::to_value(&explain.steps)?;
    }
    Ok(data)
}

pub fn bucket(key: &str, buckets: u32) -> CliResult<Value> {
    if buckets == 0 {
        return Err(CliError::invalid_input("--buckets must be greater than zero"));
    }
    let index = bucket_for(key, buckets);
    Ok(json!({
        "key": key,
        "buckets": buckets,
        "bucket": index,
        "suffix": bucket_column_name("", index),
    }))
}
