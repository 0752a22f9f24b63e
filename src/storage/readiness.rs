//! Readiness gate
//!
//! A storage may only serve queries when its declared readiness state is
//! supported by the current deployment. The gate is a pure predicate and is
//! consulted every time a storage is chosen; results are never cached.

use std::collections::BTreeSet;

use super::storage::Storage;
use super::types::ReadinessState;
use crate::config::DeploymentConfig;
use crate::observability::{Event, Logger};
use crate::planner::{PlanningError, PlanningResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessGate {
    supported_states: BTreeSet<ReadinessState>,
    fail_queries_on_unsupported: bool,
}

impl ReadinessGate {
    pub fn new(
        supported_states: impl IntoIterator<Item = ReadinessState>,
        fail_queries_on_unsupported: bool,
    ) -> Self {
        Self {
            supported_states: supported_states.into_iter().collect(),
            fail_queries_on_unsupported,
        }
    }

    pub fn from_config(config: &DeploymentConfig) -> Self {
        Self::new(
            config.supported_readiness_states.iter().copied(),
            config.fail_queries_on_unsupported_readiness,
        )
    }

    /// A gate that lets every storage through
    pub fn permissive() -> Self {
        Self::new([], false)
    }

    pub fn is_supported(&self, state: ReadinessState) -> bool {
        self.supported_states.contains(&state)
    }

    /// Allows the storage or fails with `StorageNotAvailable`
    pub fn check(&self, storage: &Storage) -> PlanningResult<()> {
        let state = storage.get_readiness_state();
        if self.is_supported(state) {
            return Ok(());
        }

        let storage_key = storage.get_storage_key().as_str();
        if !self.fail_queries_on_unsupported {
            Logger::trace(
                Event::ReadinessUnsupported.as_str(),
                &[("readiness_state", state.as_str()), ("storage", storage_key)],
            );
            return Ok(());
        }

        Logger::warn(
            Event::ReadinessRejected.as_str(),
            &[("readiness_state", state.as_str()), ("storage", storage_key)],
        );
        Err(PlanningError::StorageNotAvailable {
            storage_key: storage.get_storage_key().clone(),
            readiness_state: state,
            supported: self
                .supported_states
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }
}
