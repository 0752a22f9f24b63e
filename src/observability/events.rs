//! Observable planning events

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    ConfigLoaded,
    ConfigInvalid,
    CatalogLoaded,

    // Storage selection
    StorageSelected,
    ReadinessUnsupported,
    ReadinessRejected,
    ClusterSelected,

    // Translation
    QueryTranslated,
    TranslationFailed,

    // Plans
    PlanBuilt,
    PlanRejected,
    PlanExecuted,
    ProcessorApplied,
    MandatoryConditionViolated,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::ConfigInvalid => "CONFIG_INVALID",
            Event::CatalogLoaded => "CATALOG_LOADED",
            Event::StorageSelected => "STORAGE_SELECTED",
            Event::ReadinessUnsupported => "STORAGE_READINESS_UNSUPPORTED",
            Event::ReadinessRejected => "STORAGE_READINESS_REJECTED",
            Event::ClusterSelected => "CLUSTER_SELECTED",
            Event::QueryTranslated => "QUERY_TRANSLATED",
            Event::TranslationFailed => "QUERY_TRANSLATION_FAILED",
            Event::PlanBuilt => "PLAN_BUILT",
            Event::PlanRejected => "PLAN_REJECTED",
            Event::PlanExecuted => "PLAN_EXECUTED",
            Event::ProcessorApplied => "PROCESSOR_APPLIED",
            Event::MandatoryConditionViolated => "MANDATORY_CONDITION_VIOLATED",
        }
    }

    /// Events that indicate a misconfigured deployment rather than a bad
    /// request
    pub fn is_defect(&self) -> bool {
        matches!(
            self,
            Event::ConfigInvalid | Event::TranslationFailed | Event::MandatoryConditionViolated
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
