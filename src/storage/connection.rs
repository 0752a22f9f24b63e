//! Storage connections: a storage plus the mappers that reach it

use std::sync::Arc;

use super::storage::Storage;
use crate::translator::TranslationMappers;

/// Pairs a physical storage with the ordered mapper set translating an
/// entity's logical expressions into that storage's physical ones.
#[derive(Debug, Clone)]
pub struct StorageConnection {
    pub storage: Arc<Storage>,
    pub translation_mappers: Arc<TranslationMappers>,
    pub is_writable: bool,
}

impl StorageConnection {
    pub fn new(storage: Arc<Storage>, translation_mappers: TranslationMappers) -> Self {
        let is_writable = storage.is_writable();
        Self {
            storage,
            translation_mappers: Arc::new(translation_mappers),
            is_writable,
        }
    }
}
