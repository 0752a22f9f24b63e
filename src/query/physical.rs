//! Storage-bound query produced by translation

use std::fmt;

use serde::Serialize;

use super::body::QueryBody;
use super::expressions::Expression;
use crate::planner::{PlanningError, PlanningResult};
use crate::storage::{AllocationPolicy, Cluster, ColumnSet, Storage, StorageKey};

/// Physical data source of a translated query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub table_name: String,
    pub schema: ColumnSet,
    pub storage_key: StorageKey,
    pub allocation_policies: Vec<AllocationPolicy>,
    #[serde(rename = "final")]
    pub final_: bool,
    pub sampling_rate: Option<f64>,
    pub mandatory_conditions: Vec<Expression>,
    pub cluster: Cluster,
}

impl Table {
    /// Data source for `storage`, carrying the query's `final` and
    /// sampling flags. Only table-backed storages can be attached.
    pub fn for_storage(
        storage: &Storage,
        final_: bool,
        sampling_rate: Option<f64>,
        cluster: Cluster,
    ) -> PlanningResult<Self> {
        let source = storage.table_source().ok_or_else(|| {
            PlanningError::invalid_configuration(format!(
                "storage {} is not table-backed",
                storage.get_storage_key()
            ))
        })?;
        Ok(Self {
            table_name: source.table_name.clone(),
            schema: source.columns.clone(),
            storage_key: storage.get_storage_key().clone(),
            allocation_policies: storage.get_allocation_policies().to_vec(),
            final_,
            sampling_rate,
            mandatory_conditions: source.mandatory_conditions.clone(),
            cluster,
        })
    }
}

/// A query bound (or about to be bound) to one physical table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhysicalQuery {
    pub body: QueryBody,
    from_clause: Option<Table>,
}

impl PhysicalQuery {
    /// A translated query with no data source attached yet
    pub fn skeleton(body: QueryBody) -> Self {
        Self {
            body,
            from_clause: None,
        }
    }

    pub fn from_clause(&self) -> Option<&Table> {
        self.from_clause.as_ref()
    }

    pub fn set_from_clause(&mut self, table: Table) {
        self.from_clause = Some(table);
    }

    /// Storage the query is bound to, if any
    pub fn storage_key(&self) -> Option<&StorageKey> {
        self.from_clause.as_ref().map(|t| &t.storage_key)
    }

    pub fn get_condition(&self) -> Option<&Expression> {
        self.body.condition.as_ref()
    }

    pub fn transform_expressions<F>(&mut self, func: F)
    where
        F: FnMut(Expression) -> Expression,
    {
        self.body.transform_expressions(func);
    }
}

impl fmt::Display for PhysicalQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.body.fmt_select(f)?;
        match &self.from_clause {
            Some(table) => {
                write!(f, " FROM {}", table.table_name)?;
                if table.final_ {
                    write!(f, " FINAL")?;
                }
                if let Some(rate) = table.sampling_rate {
                    write!(f, " SAMPLE {}", rate)?;
                }
            }
            None => write!(f, " FROM <unbound>")?,
        }
        self.body.fmt_tail(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::body::SelectedExpression;

    fn table() -> Table {
        Table {
            table_name: "eap_spans_local".into(),
            schema: ColumnSet::default(),
            storage_key: StorageKey::new("eap_spans"),
            allocation_policies: vec![],
            final_: true,
            sampling_rate: Some(0.5),
            mandatory_conditions: vec![],
            cluster: Cluster::new("default", "localhost", 9000, "default"),
        }
    }

    #[test]
    fn test_skeleton_is_unbound() {
        let q = PhysicalQuery::skeleton(QueryBody::default());
        assert!(q.from_clause().is_none());
        assert!(q.storage_key().is_none());
        assert_eq!(q.to_string(), "SELECT * FROM <unbound>");
    }

    #[test]
    fn test_display_bound() {
        let mut q = PhysicalQuery::skeleton(QueryBody {
            selected_columns: vec![SelectedExpression::new("c", Expression::column("c"))],
            ..QueryBody::default()
        });
        q.set_from_clause(table());
        assert_eq!(q.storage_key().unwrap().as_str(), "eap_spans");
        assert_eq!(q.to_string(), "SELECT c FROM eap_spans_local FINAL SAMPLE 0.5");
    }

    #[test]
    fn test_table_for_storage() {
        let storage = Storage::table(
            "errors",
            "events",
            "errors_local",
            ColumnSet::new(vec![crate::storage::ColumnSpec::new("project_id", "UInt64")]),
        )
        .with_allocation_policy(AllocationPolicy::new("ConcurrentRateLimit"))
        .with_mandatory_condition(Expression::column("deleted"));
        let table = Table::for_storage(&storage, true, None, storage.get_cluster().clone()).unwrap();
        assert_eq!(table.table_name, "errors_local");
        assert!(table.final_);
        assert_eq!(table.allocation_policies.len(), 1);
        assert_eq!(table.mandatory_conditions.len(), 1);
        assert!(table.schema.contains("project_id"));
    }
}
