//! Storage selection
//!
//! Picks one storage connection among an entity's candidates.
//!
//! Rules, in order:
//! 1. No candidates is always an error
//! 2. A single candidate is returned without consulting the strategy
//! 3. Otherwise the strategy names a storage key, which must be among the
//!    candidates
//!
//! Every strategy is a pure function of the query, the settings and the
//! candidate list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::hashing::fnv_1a;
use crate::planner::{PlanningError, PlanningResult};
use crate::query::conditions::pinned_literal_values;
use crate::query::{LiteralValue, LogicalQuery, QuerySettings};
use crate::storage::{StorageConnection, StorageKey};

/// Strategy used when an entity has more than one storage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageSelector {
    /// The entity is expected to have exactly one storage
    #[default]
    SingleStorage,

    /// Always the named storage
    ByStorageKey { storage_key: StorageKey },

    /// `enabled` when the settings flag is set, `disabled` otherwise.
    /// `{"flag": "consistent"}` routes consistent reads to the writable
    /// storage.
    SettingsFlag {
        flag: String,
        enabled: StorageKey,
        disabled: StorageKey,
    },

    /// Routes on the single value a top-level condition pins `column` to.
    /// Route keys are the literal's textual value (`"5"`, `"errors"`).
    ConditionBased {
        column: String,
        routes: BTreeMap<String, StorageKey>,
        #[serde(default)]
        fallback: Option<StorageKey>,
    },

    /// Deterministic percentage rollout keyed on the referrer
    ExperimentBased {
        experiment: String,
        treatment: StorageKey,
        control: StorageKey,
        percentage: u8,
    },
}

impl StorageSelector {
    pub fn select_storage<'a>(
        &self,
        query: &LogicalQuery,
        settings: &QuerySettings,
        candidates: &'a [StorageConnection],
    ) -> PlanningResult<&'a StorageConnection> {
        match candidates {
            [] => Err(PlanningError::NoStorage),
            [only] => Ok(only),
            _ => {
                let key = self.choose_key(query, settings)?;
                candidates
                    .iter()
                    .find(|c| c.storage.get_storage_key() == &key)
                    .ok_or_else(|| {
                        PlanningError::selector(format!(
                            "storage {} chosen for entity {} is not a candidate",
                            key, query.entity
                        ))
                    })
            }
        }
    }

    fn choose_key(&self, query: &LogicalQuery, settings: &QuerySettings) -> PlanningResult<StorageKey> {
        match self {
            StorageSelector::SingleStorage => Err(PlanningError::selector(format!(
                "entity {} has several storages but no selection strategy",
                query.entity
            ))),
            StorageSelector::ByStorageKey { storage_key } => Ok(storage_key.clone()),
            StorageSelector::SettingsFlag { flag, enabled, disabled } => {
                Ok(if settings.flag(flag) { enabled } else { disabled }.clone())
            }
            StorageSelector::ConditionBased { column, routes, fallback } => {
                let pinned = pinned_literal_values(query.get_condition(), column).unwrap_or_default();
                let route = match pinned.as_slice() {
                    [value] => route_key(value).and_then(|k| routes.get(&k)),
                    _ => None,
                };
                route
                    .or(fallback.as_ref())
                    .cloned()
                    .ok_or_else(|| {
                        PlanningError::selector(format!(
                            "no route for column {} and no fallback storage",
                            column
                        ))
                    })
            }
            StorageSelector::ExperimentBased {
                experiment,
                treatment,
                control,
                percentage,
            } => {
                let slot = experiment_slot(experiment, &settings.referrer);
                Ok(if slot < u32::from(*percentage) { treatment } else { control }.clone())
            }
        }
    }
}

/// Slot in `[0, 100)` a referrer lands in for an experiment
pub fn experiment_slot(experiment: &str, referrer: &str) -> u32 {
    fnv_1a(format!("{}:{}", experiment, referrer).as_bytes()) % 100
}

fn route_key(value: &LiteralValue) -> Option<String> {
    match value {
        LiteralValue::String(s) => Some(s.clone()),
        LiteralValue::Int(i) => Some(i.to_string()),
        LiteralValue::Bool(b) => Some(b.to_string()),
        LiteralValue::Null | LiteralValue::Float(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::conditions::{binary_condition, EQUALS};
    use crate::query::Expression;
    use crate::storage::{ColumnSet, Storage};
    use crate::translator::TranslationMappers;
    use std::sync::Arc;

    fn connection(key: &str) -> StorageConnection {
        StorageConnection::new(
            Arc::new(Storage::table(key, "events", format!("{}_local", key), ColumnSet::default())),
            TranslationMappers::new(),
        )
    }

    fn candidates() -> Vec<StorageConnection> {
        vec![connection("errors"), connection("errors_ro")]
    }

    fn key_of(c: &StorageConnection) -> &str {
        c.storage.get_storage_key().as_str()
    }

    #[test]
    fn test_empty_candidates() {
        let err = StorageSelector::SingleStorage
            .select_storage(&LogicalQuery::new("events"), &QuerySettings::http("t"), &[])
            .unwrap_err();
        assert_eq!(err, PlanningError::NoStorage);
    }

    #[test]
    fn test_single_candidate_bypasses_strategy() {
        let selector = StorageSelector::ByStorageKey {
            storage_key: StorageKey::new("missing"),
        };
        let only = vec![connection("errors")];
        let chosen = selector
            .select_storage(&LogicalQuery::new("events"), &QuerySettings::http("t"), &only)
            .unwrap();
        assert_eq!(key_of(chosen), "errors");
    }

    #[test]
    fn test_single_storage_strategy_with_many_candidates() {
        let err = StorageSelector::SingleStorage
            .select_storage(&LogicalQuery::new("events"), &QuerySettings::http("t"), &candidates())
            .unwrap_err();
        assert_eq!(err.code(), "PLAN_STORAGE_SELECTOR");
    }

    #[test]
    fn test_settings_flag_routes_consistent_reads() {
        let selector = StorageSelector::SettingsFlag {
            flag: "consistent".into(),
            enabled: StorageKey::new("errors"),
            disabled: StorageKey::new("errors_ro"),
        };
        let c = candidates();
        let q = LogicalQuery::new("events");
        let consistent = QuerySettings::http("t").with_consistent(true);
        assert_eq!(key_of(selector.select_storage(&q, &consistent, &c).unwrap()), "errors");
        assert_eq!(key_of(selector.select_storage(&q, &QuerySettings::http("t"), &c).unwrap()), "errors_ro");
    }

    #[test]
    fn test_condition_based() {
        let selector = StorageSelector::ConditionBased {
            column: "type".into(),
            routes: BTreeMap::from([("error".to_string(), StorageKey::new("errors"))]),
            fallback: Some(StorageKey::new("errors_ro")),
        };
        let c = candidates();
        let settings = QuerySettings::http("t");
        let q = LogicalQuery::new("events").with_condition(binary_condition(
            EQUALS,
            Expression::column("type"),
            Expression::literal("error"),
        ));
        assert_eq!(key_of(selector.select_storage(&q, &settings, &c).unwrap()), "errors");
        assert_eq!(
            key_of(selector.select_storage(&LogicalQuery::new("events"), &settings, &c).unwrap()),
            "errors_ro"
        );
    }

    #[test]
    fn test_condition_based_without_fallback() {
        let selector = StorageSelector::ConditionBased {
            column: "type".into(),
            routes: BTreeMap::new(),
            fallback: None,
        };
        assert!(selector
            .select_storage(&LogicalQuery::new("events"), &QuerySettings::http("t"), &candidates())
            .is_err());
    }

    #[test]
    fn test_experiment_is_deterministic() {
        let selector = StorageSelector::ExperimentBased {
            experiment: "new_table".into(),
            treatment: StorageKey::new("errors"),
            control: StorageKey::new("errors_ro"),
            percentage: 50,
        };
        let c = candidates();
        let q = LogicalQuery::new("events");
        let settings = QuerySettings::http("api.issues");
        let first = key_of(selector.select_storage(&q, &settings, &c).unwrap()).to_string();
        for _ in 0..20 {
            assert_eq!(key_of(selector.select_storage(&q, &settings, &c).unwrap()), first);
        }
        let expected = if experiment_slot("new_table", "api.issues") < 50 { "errors" } else { "errors_ro" };
        assert_eq!(first, expected);
    }

    #[test]
    fn test_experiment_bounds() {
        let c = candidates();
        let q = LogicalQuery::new("events");
        let s = QuerySettings::http("r");
        let all = StorageSelector::ExperimentBased {
            experiment: "x".into(),
            treatment: StorageKey::new("errors"),
            control: StorageKey::new("errors_ro"),
            percentage: 100,
        };
        let none = StorageSelector::ExperimentBased {
            experiment: "x".into(),
            treatment: StorageKey::new("errors"),
            control: StorageKey::new("errors_ro"),
            percentage: 0,
        };
        assert_eq!(key_of(all.select_storage(&q, &s, &c).unwrap()), "errors");
        assert_eq!(key_of(none.select_storage(&q, &s, &c).unwrap()), "errors_ro");
    }

    #[test]
    fn test_deserialize_tagged() {
        let selector: StorageSelector = serde_json::from_value(serde_json::json!({
            "type": "settings_flag",
            "flag": "consistent",
            "enabled": "errors",
            "disabled": "errors_ro"
        }))
        .unwrap();
        assert!(matches!(selector, StorageSelector::SettingsFlag { .. }));
    }
}
