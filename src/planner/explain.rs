//! Dry-run explain recording
//!
//! Pipeline stages push before/after snapshots into an [`ExplainSink`]
//! only when the request runs in dry-run mode. Recording never changes
//! what the stage does.

use serde::Serialize;

use crate::query::QuerySettings;

/// One recorded transformation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformStep {
    pub category: String,
    pub name: String,
    pub original: String,
    pub transformed: String,
}

/// Receives transformation steps
pub trait ExplainSink {
    fn add_transform_step(&mut self, category: &str, name: &str, original: String, transformed: String);
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopExplain;

impl ExplainSink for NoopExplain {
    fn add_transform_step(&mut self, _category: &str, _name: &str, _original: String, _transformed: String) {}
}

/// Collects steps in order for the caller
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ExplainMeta {
    pub steps: Vec<TransformStep>,
}

impl ExplainMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl ExplainSink for ExplainMeta {
    fn add_transform_step(&mut self, category: &str, name: &str, original: String, transformed: String) {
        self.steps.push(TransformStep {
            category: category.to_string(),
            name: name.to_string(),
            original,
            transformed,
        });
    }
}

/// Runs `step` over `target`, recording its text before and after when
/// `settings` is a dry run. Rendering is skipped entirely otherwise.
pub(crate) fn with_explain<T, R, F>(
    sink: &mut dyn ExplainSink,
    settings: &QuerySettings,
    category: &str,
    name: &str,
    target: &mut T,
    step: F,
) -> R
where
    T: std::fmt::Display,
    F: FnOnce(&mut T) -> R,
{
    if !settings.get_dry_run() {
        return step(target);
    }
    let original = target.to_string();
    let result = step(target);
    sink.add_transform_step(category, name, original, target.to_string());
    result
}
