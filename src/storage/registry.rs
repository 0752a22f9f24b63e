//! Storage registry

use std::collections::BTreeMap;
use std::sync::Arc;

use super::storage::Storage;
use super::types::StorageKey;
use crate::planner::{PlanningError, PlanningResult};

/// Read-only lookup of storages by key
pub trait StorageRegistry: Send + Sync {
    fn get_storage(&self, key: &StorageKey) -> PlanningResult<Arc<Storage>>;

    fn get_writable_storage_keys(&self) -> Vec<StorageKey>;
}

/// Registry built once at startup from a fixed set of storages
#[derive(Debug, Default)]
pub struct InMemoryStorageRegistry {
    storages: BTreeMap<StorageKey, Arc<Storage>>,
}

impl InMemoryStorageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a storage. Keys must be unique.
    pub fn register(&mut self, storage: Storage) -> PlanningResult<Arc<Storage>> {
        let key = storage.get_storage_key().clone();
        if self.storages.contains_key(&key) {
            return Err(PlanningError::invalid_configuration(format!(
                "storage {} registered twice",
                key
            )));
        }
        let storage = Arc::new(storage);
        self.storages.insert(key, Arc::clone(&storage));
        Ok(storage)
    }

    pub fn len(&self) -> usize {
        self.storages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Storage>> {
        self.storages.values()
    }
}

impl StorageRegistry for InMemoryStorageRegistry {
    fn get_storage(&self, key: &StorageKey) -> PlanningResult<Arc<Storage>> {
        self.storages
            .get(key)
            .cloned()
            .ok_or_else(|| PlanningError::StorageNotFound(key.clone()))
    }

    fn get_writable_storage_keys(&self) -> Vec<StorageKey> {
        self.storages
            .values()
            .filter(|s| s.is_writable())
            .map(|s| s.get_storage_key().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ColumnSet;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = InMemoryStorageRegistry::new();
        registry
            .register(Storage::table("errors", "events", "errors_local", ColumnSet::default()).writable(true))
            .unwrap();
        registry
            .register(Storage::table("errors_ro", "events_ro", "errors_local", ColumnSet::default()))
            .unwrap();

        let s = registry.get_storage(&StorageKey::new("errors")).unwrap();
        assert_eq!(s.get_storage_key().as_str(), "errors");
        assert_eq!(registry.get_writable_storage_keys(), vec![StorageKey::new("errors")]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unknown_storage() {
        let registry = InMemoryStorageRegistry::new();
        let err = registry.get_storage(&StorageKey::new("nope")).unwrap_err();
        assert_eq!(err, PlanningError::StorageNotFound(StorageKey::new("nope")));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = InMemoryStorageRegistry::new();
        registry
            .register(Storage::table("a", "s", "t", ColumnSet::default()))
            .unwrap();
        let err = registry
            .register(Storage::table("a", "s", "t", ColumnSet::default()))
            .unwrap_err();
        assert_eq!(err.code(), "PLAN_INVALID_CONFIGURATION");
    }
}
