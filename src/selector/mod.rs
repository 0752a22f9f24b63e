//! Storage and cluster selection

mod cluster;
mod storage_selector;

pub use cluster::ColumnBasedStorageSliceSelector;
pub use storage_selector::{experiment_slot, StorageSelector};
