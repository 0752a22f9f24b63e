//! Observability: structured JSON logs, lifecycle scopes and counters
//!
//! Observability never changes planning results. Everything here is
//! synchronous; there are no background threads.

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsSnapshot, PlanningMetrics};
pub use scope::ObservationScope;
