//! Monitoring backend collaborators
//!
//! The analysis only needs four read-only calls from the backend. They are
//! expressed as a trait so the HTTP client can be swapped for an in-memory
//! double in tests.

mod api;
mod client;

pub use api::{ActiveTarget, TargetDescriptor};
pub use client::PrometheusClient;

use crate::error::Result;
use crate::rules::RuleGroup;
use crate::time_range::TimeRange;

/// Read-only view of a Prometheus-compatible server
pub trait MonitoringBackend {
    /// Rule groups currently loaded by the server
    fn fetch_rules(&self) -> Result<Vec<RuleGroup>>;

    /// Targets whose metadata lists `metric`; empty when none is known
    fn target_metadata(&self, metric: &str) -> Result<Vec<TargetDescriptor>>;

    /// Targets currently being scraped
    fn active_targets(&self) -> Result<Vec<ActiveTarget>>;

    /// Number of series matching `matcher` within `range`
    fn count_series(&self, matcher: &str, range: &TimeRange) -> Result<usize>;
}
