//! promsource - where do the metrics used by Prometheus rules come from?
//!
//! This library extracts the metric names referenced by alerting and
//! recording rules, finds the targets exporting each metric through the
//! metadata API, and attributes every metric to the scrape configurations
//! and recording-rule groups that produce it. Metrics nothing produces are
//! reported as unexplained.

pub mod analysis;
pub mod attribution;
pub mod cli;
pub mod config;
pub mod error;
pub mod expr;
pub mod identifiers;
pub mod prometheus;
pub mod report;
pub mod rules;
pub mod scrape_config;
pub mod time_range;
