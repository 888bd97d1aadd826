//! End-to-end analysis over a monitoring backend
//!
//! Rules → referenced metrics → producers per metric, active targets →
//! identifiers per scrape config, then attribution. Backend failures are
//! logged and degrade to empty results; only a rule snapshot that cannot be
//! trusted stops the run.

use crate::attribution::attribute;
use crate::error::{AnalysisError, Result};
use crate::expr::{extract_all, Extraction};
use crate::identifiers::{build_metric_identifiers, CachedLookup, Producers};
use crate::prometheus::{MonitoringBackend, TargetDescriptor};
use crate::report::{Mode, Report, SERIES_COUNT_FAILED};
use crate::rules::{RuleSet, RuleSetStats, RulesSnapshot};
use crate::scrape_config::{build_index, ScrapeConfigIndex};
use crate::time_range::TimeRange;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

/// Where rule expressions come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RulesSource {
    /// `/api/v1/rules` of the backend
    Backend,
    /// Saved `/api/v1/rules` response
    SnapshotFile(PathBuf),
    /// Plain PromQL expressions separated by blank lines
    ExpressionsFile(PathBuf),
}

/// Rules and the metrics they reference
#[derive(Debug, Clone, Default)]
pub struct RuleMetrics {
    pub rules: RuleSet,
    pub extraction: Extraction,
}

pub struct Analyzer<'a, B: MonitoringBackend + ?Sized> {
    backend: &'a B,
    range: TimeRange,
}

impl<'a, B: MonitoringBackend + ?Sized> Analyzer<'a, B> {
    pub fn new(backend: &'a B, range: TimeRange) -> Self {
        Self { backend, range }
    }

    /// Load rules and extract every metric they reference
    ///
    /// # Errors
    /// A snapshot file that cannot be read, or a rule of unknown type.
    /// Unparseable expressions are returned in `extraction.failures`.
    pub fn rule_metrics(&self, source: &RulesSource) -> Result<RuleMetrics> {
        match source {
            RulesSource::ExpressionsFile(path) => {
                let text =
                    std::fs::read_to_string(path).map_err(|e| AnalysisError::Snapshot {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    })?;
                let expressions = crate::expr::split_expression_blocks(&text);
                Ok(RuleMetrics {
                    rules: RuleSet::default(),
                    extraction: extract_all(&expressions),
                })
            }
            RulesSource::SnapshotFile(path) => {
                let groups = RulesSnapshot::from_file(path)?.into_groups();
                Self::extract(RuleSet::new(groups)?)
            }
            RulesSource::Backend => {
                let groups = self.backend.fetch_rules().unwrap_or_else(|err| {
                    tracing::warn!("error when fetching rules: {}", err);
                    Vec::new()
                });
                Self::extract(RuleSet::new(groups)?)
            }
        }
    }

    fn extract(rules: RuleSet) -> Result<RuleMetrics> {
        let extraction = extract_all(rules.expressions());
        Ok(RuleMetrics { rules, extraction })
    }

    /// Producers of every metric, looking each name up at most once
    pub fn metric_producers<'m, I>(&self, metrics: I) -> HashMap<String, Producers>
    where
        I: IntoIterator<Item = &'m String>,
    {
        let backend = self.backend;
        let mut lookup = CachedLookup::new(|metric: &str| -> Result<Vec<TargetDescriptor>> {
            backend.target_metadata(metric)
        });
        let producers = build_metric_identifiers(metrics, &mut lookup);
        tracing::debug!("{} distinct metadata lookups", lookup.cached());
        producers
    }

    /// Identifier sets of the scrape configs of currently active targets
    pub fn scrape_config_index(&self) -> ScrapeConfigIndex {
        match self.backend.active_targets() {
            Ok(targets) => build_index(&targets),
            Err(err) => {
                tracing::warn!("error when fetching targets: {}", err);
                ScrapeConfigIndex::default()
            }
        }
    }

    /// Series count of one metric, or `SERIES_COUNT_FAILED`
    pub fn series_count(&self, metric: &str) -> i64 {
        match self.backend.count_series(metric, &self.range) {
            Ok(count) => i64::try_from(count).unwrap_or(i64::MAX),
            Err(err) => {
                tracing::warn!("series count for {} failed: {}", metric, err);
                SERIES_COUNT_FAILED
            }
        }
    }

    /// Run the analysis for `mode`
    pub fn run(&self, source: &RulesSource, mode: Mode) -> Result<Report> {
        let RuleMetrics { rules, extraction } = self.rule_metrics(source)?;
        let mut report = Report::new(mode);
        report.rules = RuleSetStats::from(&rules);
        if !extraction.is_clean() {
            tracing::debug!("{} expressions could not be parsed", extraction.failures.len());
        }
        report.malformed_expressions = extraction.failures.clone();

        if mode == Mode::MetricSeries {
            report.metrics = extraction.metrics.iter().cloned().collect();
            for metric in &extraction.metrics {
                let count = self.series_count(metric);
                report.series.insert(metric.clone(), count);
            }
            return Ok(report);
        }

        // Recording outputs are looked up too, referenced by an expression or not
        let recording = rules.recording_rules_by_group();
        let names: BTreeSet<&String> = extraction
            .metrics
            .iter()
            .chain(recording.values().flatten())
            .collect();
        let producers = self.metric_producers(names);
        let index = self.scrape_config_index();
        if index.is_empty() {
            tracing::warn!("no active target belongs to a scrape config");
        }
        tracing::debug!(
            "{} metrics, {} scrape configs, {} rule groups",
            producers.len(),
            index.len(),
            report.rules.groups
        );

        let mut attribution = attribute(&producers, &index.configs, &recording);
        report.rejected_targets = index.rejected;

        // Unexplained metrics are only worth reporting if they have series
        for metric in &attribution.unexplained {
            let count = self.series_count(metric);
            report.series.insert(metric.clone(), count);
        }
        let counts = &report.series;
        attribution.retain_observed(|metric| {
            counts
                .get(metric)
                .copied()
                .unwrap_or(SERIES_COUNT_FAILED)
        });

        if mode == Mode::ByScrapeConfigSummary {
            let attributed = attribution
                .scrape_config_metrics
                .values()
                .chain(attribution.rule_group_metrics.values())
                .flatten();
            for metric in attributed {
                if !report.series.contains_key(metric) {
                    let count = self.series_count(metric);
                    report.series.insert(metric.clone(), count);
                }
            }
        }

        report.attribution = attribution;
        Ok(report)
    }
}
