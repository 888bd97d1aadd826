//! Producer identifiers for metrics
//!
//! A producer identifier is the `namespace/job` pair of a target. Metric
//! metadata tells which targets export a metric; those targets' identifiers
//! are the metric's producers.
//!
//! Counters, histograms and summaries are exposed under derived series names
//! (`_total`, `_bucket`, `_sum`, `_count`) while their metadata may be keyed
//! by the base name, so an empty lookup is retried with each suffix removed.

use crate::error::Result;
use crate::prometheus::TargetDescriptor;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Suffixes stripped, in this order, when the metric itself has no metadata
pub const SUFFIX_FALLBACKS: [&str; 4] = ["_total", "_bucket", "_sum", "_count"];

static NO_IDENTIFIERS: BTreeSet<Identifier> = BTreeSet::new();

/// Canonical `namespace/job` string
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(namespace: &str, job: &str) -> Self {
        Self(format!("{}/{}", namespace, job))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&TargetDescriptor> for Identifier {
    fn from(descriptor: &TargetDescriptor) -> Self {
        Self::new(&descriptor.namespace, &descriptor.job)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What is known about the producers of one metric
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Producers {
    /// Metadata named at least one target
    Found(BTreeSet<Identifier>),
    /// Every lookup succeeded and none named a target
    ConfirmedEmpty,
    /// Nothing found, and at least one lookup failed
    LookupFailed,
}

impl Producers {
    /// Identifier set; empty unless `Found`
    pub fn identifiers(&self) -> &BTreeSet<Identifier> {
        match self {
            Producers::Found(ids) => ids,
            Producers::ConfirmedEmpty | Producers::LookupFailed => &NO_IDENTIFIERS,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers().is_empty()
    }

    pub fn lookup_failed(&self) -> bool {
        matches!(self, Producers::LookupFailed)
    }
}

/// Source of target metadata for a metric name
pub trait MetadataLookup {
    fn lookup(&mut self, metric: &str) -> Result<Vec<TargetDescriptor>>;
}

impl<F> MetadataLookup for F
where
    F: FnMut(&str) -> Result<Vec<TargetDescriptor>>,
{
    fn lookup(&mut self, metric: &str) -> Result<Vec<TargetDescriptor>> {
        self(metric)
    }
}

/// Memoizes lookups; the same metric is referenced by many rules
pub struct CachedLookup<L> {
    inner: L,
    cache: HashMap<String, Result<Vec<TargetDescriptor>>>,
}

impl<L: MetadataLookup> CachedLookup<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            cache: HashMap::new(),
        }
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

impl<L: MetadataLookup> MetadataLookup for CachedLookup<L> {
    fn lookup(&mut self, metric: &str) -> Result<Vec<TargetDescriptor>> {
        if let Some(hit) = self.cache.get(metric) {
            return hit.clone();
        }
        let result = self.inner.lookup(metric);
        self.cache.insert(metric.to_string(), result.clone());
        result
    }
}

/// Build the producer identifiers of `metric`
///
/// The metric name is looked up first. If that yields nothing, each suffix of
/// [`SUFFIX_FALLBACKS`] the name ends with is stripped in turn, stopping at
/// the first lookup that names a target.
pub fn build_identifiers<L: MetadataLookup + ?Sized>(metric: &str, lookup: &mut L) -> Producers {
    let mut failed = false;

    let candidates = std::iter::once(metric).chain(
        SUFFIX_FALLBACKS
            .iter()
            .filter_map(|suffix| metric.strip_suffix(suffix))
            .filter(|base| !base.is_empty()),
    );

    for candidate in candidates {
        match lookup.lookup(candidate) {
            Ok(descriptors) if !descriptors.is_empty() => {
                if candidate != metric {
                    tracing::debug!("{}: metadata found under {}", metric, candidate);
                }
                return Producers::Found(descriptors.iter().map(Identifier::from).collect());
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!("metadata lookup for {} failed: {}", candidate, err);
                failed = true;
            }
        }
    }

    if failed {
        Producers::LookupFailed
    } else {
        Producers::ConfirmedEmpty
    }
}

/// Producers of every metric; the result has one entry per input metric
pub fn build_metric_identifiers<'m, I, L>(metrics: I, lookup: &mut L) -> HashMap<String, Producers>
where
    I: IntoIterator<Item = &'m String>,
    L: MetadataLookup + ?Sized,
{
    metrics
        .into_iter()
        .map(|metric| (metric.clone(), build_identifiers(metric, lookup)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;

    /// Lookup double that records every name it is asked for
    struct RecordingLookup {
        answers: HashMap<String, Result<Vec<TargetDescriptor>>>,
        calls: Vec<String>,
    }

    impl RecordingLookup {
        fn new() -> Self {
            Self {
                answers: HashMap::new(),
                calls: Vec::new(),
            }
        }

        fn with(mut self, metric: &str, targets: &[(&str, &str)]) -> Self {
            let descriptors = targets
                .iter()
                .map(|(ns, job)| TargetDescriptor::new(*ns, *job))
                .collect();
            self.answers.insert(metric.to_string(), Ok(descriptors));
            self
        }

        fn failing(mut self, metric: &str) -> Self {
            self.answers.insert(
                metric.to_string(),
                Err(AnalysisError::unavailable("api/v1/targets/metadata", "timeout")),
            );
            self
        }
    }

    impl MetadataLookup for RecordingLookup {
        fn lookup(&mut self, metric: &str) -> Result<Vec<TargetDescriptor>> {
            self.calls.push(metric.to_string());
            self.answers.get(metric).cloned().unwrap_or(Ok(Vec::new()))
        }
    }

    fn ids(values: &[&str]) -> BTreeSet<Identifier> {
        values
            .iter()
            .map(|v| {
                let (ns, job) = v.split_once('/').unwrap();
                Identifier::new(ns, job)
            })
            .collect()
    }

    #[test]
    fn test_identifier_format() {
        assert_eq!(Identifier::new("ns1", "job1").as_str(), "ns1/job1");
        assert_eq!(Identifier::new("", "job1").to_string(), "/job1");
    }

    #[test]
    fn test_direct_metadata_hit() {
        let mut lookup =
            RecordingLookup::new().with("up", &[("ns1", "job1"), ("ns2", "job2"), ("ns1", "job1")]);
        let producers = build_identifiers("up", &mut lookup);
        assert_eq!(producers, Producers::Found(ids(&["ns1/job1", "ns2/job2"])));
        assert_eq!(lookup.calls, vec!["up"]);
    }

    #[test]
    fn test_total_suffix_is_tried_first_and_stops() {
        let mut lookup = RecordingLookup::new().with("x", &[("ns", "exporter")]);
        let producers = build_identifiers("x_total", &mut lookup);
        assert_eq!(producers, Producers::Found(ids(&["ns/exporter"])));
        assert_eq!(lookup.calls, vec!["x_total", "x"]);
    }

    #[test]
    fn test_histogram_bucket_falls_back_to_base_name() {
        let mut lookup = RecordingLookup::new().with("http_request_duration_seconds", &[("web", "api")]);
        let producers = build_identifiers("http_request_duration_seconds_bucket", &mut lookup);
        assert_eq!(producers, Producers::Found(ids(&["web/api"])));
        assert_eq!(
            lookup.calls,
            vec![
                "http_request_duration_seconds_bucket",
                "http_request_duration_seconds"
            ]
        );
    }

    #[test]
    fn test_all_lookups_empty() {
        let mut lookup = RecordingLookup::new();
        let producers = build_identifiers("errors_total", &mut lookup);
        assert_eq!(producers, Producers::ConfirmedEmpty);
        assert!(producers.is_empty());
        assert_eq!(lookup.calls, vec!["errors_total", "errors"]);
    }

    #[test]
    fn test_name_without_listed_suffix_is_looked_up_once() {
        let mut lookup = RecordingLookup::new();
        let producers = build_identifiers("sli:errors:rate5m", &mut lookup);
        assert_eq!(producers, Producers::ConfirmedEmpty);
        assert_eq!(lookup.calls, vec!["sli:errors:rate5m"]);
    }

    #[test]
    fn test_bare_suffix_is_not_stripped_to_nothing() {
        let mut lookup = RecordingLookup::new();
        build_identifiers("_total", &mut lookup);
        assert_eq!(lookup.calls, vec!["_total"]);
    }

    #[test]
    fn test_failed_lookup_is_distinguished() {
        let mut lookup = RecordingLookup::new().failing("errors_total");
        let producers = build_identifiers("errors_total", &mut lookup);
        assert_eq!(producers, Producers::LookupFailed);
        assert!(producers.is_empty());
        assert!(producers.lookup_failed());
        // The fallback still runs after a failure
        assert_eq!(lookup.calls, vec!["errors_total", "errors"]);
    }

    #[test]
    fn test_fallback_success_after_failure_is_found() {
        let mut lookup = RecordingLookup::new()
            .failing("errors_total")
            .with("errors", &[("app", "backend")]);
        let producers = build_identifiers("errors_total", &mut lookup);
        assert_eq!(producers, Producers::Found(ids(&["app/backend"])));
    }

    #[test]
    fn test_closure_lookup() {
        let mut lookup = |metric: &str| -> Result<Vec<TargetDescriptor>> {
            if metric == "up" {
                Ok(vec![TargetDescriptor::new("default", "kubelet")])
            } else {
                Ok(Vec::new())
            }
        };
        assert_eq!(
            build_identifiers("up", &mut lookup),
            Producers::Found(ids(&["default/kubelet"]))
        );
    }

    #[test]
    fn test_cached_lookup_hits_backend_once() {
        let inner = RecordingLookup::new().with("up", &[("ns", "job")]);
        let mut cached = CachedLookup::new(inner);
        build_identifiers("up", &mut cached);
        build_identifiers("up", &mut cached);
        assert_eq!(cached.inner.calls, vec!["up"]);
        assert_eq!(cached.cached(), 1);
    }

    #[test]
    fn test_metric_identifier_map_is_total() {
        let metrics: Vec<String> = vec!["up".into(), "missing".into()];
        let mut lookup = RecordingLookup::new().with("up", &[("ns", "job")]);
        let map = build_metric_identifiers(&metrics, &mut lookup);
        assert_eq!(map.len(), 2);
        assert_eq!(map["missing"], Producers::ConfirmedEmpty);
        assert!(!map["up"].is_empty());
    }
}
