//! Planning error taxonomy
//!
//! Error codes:
//! - PLAN_NO_STORAGE (REJECT)
//! - PLAN_STORAGE_SELECTOR (REJECT)
//! - PLAN_STORAGE_NOT_AVAILABLE (REJECT)
//! - PLAN_TRANSLATION (DEFECT)
//! - PLAN_UNSUPPORTED_SLICING (DEFECT)
//! - PLAN_MANDATORY_CONDITION_VIOLATION (DEFECT)
//! - PLAN_STORAGE_NOT_FOUND (DEFECT)
//! - PLAN_UNBOUND_QUERY (DEFECT)
//! - PLAN_CLUSTER_SELECTION (REJECT)
//! - PLAN_STORAGE_REBOUND (DEFECT)
//! - PLAN_INVALID_CONFIGURATION (DEFECT)
//!
//! None of these are transient. The core never retries; every error is
//! terminal for the request and surfaces to the caller unchanged.

use std::fmt;

use thiserror::Error;

use crate::storage::{ReadinessState, StorageKey, StorageSetKey};

/// Severity levels for planning errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The request was rejected by policy or by its own shape
    Reject,
    /// Configuration, mapping or routing defect upstream of the request
    Defect,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Defect => write!(f, "DEFECT"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanningError {
    #[error("No storages specified to select from.")]
    NoStorage,

    #[error("Storage selection failed: {0}")]
    StorageSelector(String),

    #[error(
        "The selected storage={storage_key} (readiness_state={readiness_state}) is not available \
         in this environment yet; supported readiness states: [{supported}]. To enable it, \
         consider bumping the storage's readiness_state."
    )]
    StorageNotAvailable {
        storage_key: StorageKey,
        readiness_state: ReadinessState,
        supported: String,
    },

    #[error("No physical mapping for {expression}: {reason}")]
    Translation { expression: String, reason: String },

    #[error("Sliced storage set {storage_set} (storage={storage_key}) is not supported by this planning path")]
    UnsupportedSlicing {
        storage_key: StorageKey,
        storage_set: StorageSetKey,
    },

    #[error("Mandatory condition check {checker} failed on storage={storage_key}: {condition} is missing")]
    MandatoryConditionViolation {
        storage_key: StorageKey,
        checker: String,
        condition: String,
    },

    #[error("Storage {0} is not registered")]
    StorageNotFound(StorageKey),

    #[error("Physical query has no storage-bound data source")]
    UnboundQuery,

    #[error("Cluster selection failed: {0}")]
    ClusterSelection(String),

    #[error("Processor {processor} rebound the query from storage={from} to {to}")]
    StorageRebound {
        processor: String,
        from: StorageKey,
        to: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl PlanningError {
    pub fn selector(reason: impl Into<String>) -> Self {
        PlanningError::StorageSelector(reason.into())
    }

    pub fn translation(expression: impl fmt::Display, reason: impl Into<String>) -> Self {
        PlanningError::Translation {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }

    pub fn cluster_selection(reason: impl Into<String>) -> Self {
        PlanningError::ClusterSelection(reason.into())
    }

    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        PlanningError::InvalidConfiguration(reason.into())
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            PlanningError::NoStorage => "PLAN_NO_STORAGE",
            PlanningError::StorageSelector(_) => "PLAN_STORAGE_SELECTOR",
            PlanningError::StorageNotAvailable { .. } => "PLAN_STORAGE_NOT_AVAILABLE",
            PlanningError::Translation { .. } => "PLAN_TRANSLATION",
            PlanningError::UnsupportedSlicing { .. } => "PLAN_UNSUPPORTED_SLICING",
            PlanningError::MandatoryConditionViolation { .. } => {
                "PLAN_MANDATORY_CONDITION_VIOLATION"
            }
            PlanningError::StorageNotFound(_) => "PLAN_STORAGE_NOT_FOUND",
            PlanningError::UnboundQuery => "PLAN_UNBOUND_QUERY",
            PlanningError::ClusterSelection(_) => "PLAN_CLUSTER_SELECTION",
            PlanningError::StorageRebound { .. } => "PLAN_STORAGE_REBOUND",
            PlanningError::InvalidConfiguration(_) => "PLAN_INVALID_CONFIGURATION",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            PlanningError::NoStorage
            | PlanningError::StorageSelector(_)
            | PlanningError::StorageNotAvailable { .. }
            | PlanningError::ClusterSelection(_) => Severity::Reject,
            _ => Severity::Defect,
        }
    }

    /// Planning errors always end the request
    pub fn is_fatal(&self) -> bool {
        true
    }
}

/// Result type for planning operations
pub type PlanningResult<T> = Result<T, PlanningError>;
