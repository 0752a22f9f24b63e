//! Physical storage catalog
//!
//! Storages, their connections to entities, the registry that resolves
//! them by key, and the readiness gate consulted whenever one is chosen.
//! Everything here is built once at startup and shared read-only.

mod connection;
mod readiness;
mod registry;
mod storage;
mod types;

pub use connection::StorageConnection;
pub use readiness::ReadinessGate;
pub use registry::{InMemoryStorageRegistry, StorageRegistry};
pub use storage::{RelationalSource, Storage, TableSource};
pub use types::{
    AllocationPolicy, Cluster, ColumnSet, ColumnSpec, ReadinessState, StorageKey, StorageSetKey,
};
