//! Configuration
//!
//! - [`DeploymentConfig`]: readiness policy and slicing of this deployment
//! - [`CatalogConfig`]: storages and entities
//!
//! Both are JSON files, loaded and validated once at startup.

mod catalog;
mod deployment;
mod errors;

pub use catalog::{
    Catalog, CatalogConfig, EntityDefinition, EntityStorageDefinition, MapperDefinition, StorageDefinition,
};
pub use deployment::{DeploymentConfig, SlicingConfig, StorageSetSlicing, DEFAULT_LOGICAL_PARTITIONS};
pub use errors::{ConfigError, ConfigResult};
