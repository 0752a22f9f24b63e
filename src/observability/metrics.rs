//! Planning counters
//!
//! Counters only. They increase monotonically and reset on process start.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct PlanningMetrics {
    storages_selected: AtomicU64,
    readiness_rejections: AtomicU64,
    translations: AtomicU64,
    plans_built: AtomicU64,
    plans_executed: AtomicU64,
    enforcement_violations: AtomicU64,
}

impl PlanningMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_storages_selected(&self) {
        self.storages_selected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_readiness_rejections(&self) {
        self.readiness_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_translations(&self) {
        self.translations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_plans_built(&self) {
        self.plans_built.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_plans_executed(&self) {
        self.plans_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_enforcement_violations(&self) {
        self.enforcement_violations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            storages_selected: self.storages_selected.load(Ordering::Relaxed),
            readiness_rejections: self.readiness_rejections.load(Ordering::Relaxed),
            translations: self.translations.load(Ordering::Relaxed),
            plans_built: self.plans_built.load(Ordering::Relaxed),
            plans_executed: self.plans_executed.load(Ordering::Relaxed),
            enforcement_violations: self.enforcement_violations.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of every counter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub storages_selected: u64,
    pub readiness_rejections: u64,
    pub translations: u64,
    pub plans_built: u64,
    pub plans_executed: u64,
    pub enforcement_violations: u64,
}
