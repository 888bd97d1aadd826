//! Text and JSON rendering of analysis results
//!
//! Attribution maps are unordered; everything printed goes through
//! [`sorted_entries`] so identical snapshots give byte-identical output.

use crate::attribution::Attribution;
use crate::error::AnalysisError;
use crate::rules::RuleSetStats;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::io::{self, Write};

/// Printed when a series count could not be obtained
pub const SERIES_COUNT_FAILED: i64 = -1;

/// What the run reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Every referenced metric with its series count
    MetricSeries,
    /// Metrics grouped by scrape config and recording rule group
    ByScrapeConfig,
    /// Series totals per scrape config and recording rule group
    ByScrapeConfigSummary,
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct Report {
    pub mode: Mode,
    pub rules: RuleSetStats,
    pub attribution: Attribution,
    /// Series count per metric, for the metrics the mode needs
    pub series: HashMap<String, i64>,
    /// Every referenced metric (metric-series mode)
    pub metrics: Vec<String>,
    pub malformed_expressions: Vec<AnalysisError>,
    pub rejected_targets: Vec<AnalysisError>,
}

impl Report {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            rules: RuleSetStats::default(),
            attribution: Attribution::default(),
            series: HashMap::new(),
            metrics: Vec::new(),
            malformed_expressions: Vec::new(),
            rejected_targets: Vec::new(),
        }
    }

    fn count(&self, metric: &str) -> i64 {
        self.series
            .get(metric)
            .copied()
            .unwrap_or(SERIES_COUNT_FAILED)
    }

    /// Sum of series counts per key, largest first, ties by key
    ///
    /// Unknown counts add nothing to the total.
    pub fn series_totals<'a>(&self, map: &'a HashMap<String, Vec<String>>) -> Vec<(&'a str, i64)> {
        let mut totals: Vec<(&str, i64)> = sorted_entries(map)
            .into_iter()
            .map(|(key, metrics)| {
                let total = metrics.iter().map(|m| self.count(m).max(0)).sum();
                (key, total)
            })
            .collect();
        totals.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        totals
    }
}

/// Keys sorted byte-wise, each with its metrics sorted; empty lists skipped
pub fn sorted_entries(map: &HashMap<String, Vec<String>>) -> Vec<(&str, Vec<&str>)> {
    let mut entries: Vec<(&str, Vec<&str>)> = map
        .iter()
        .filter(|(_, metrics)| !metrics.is_empty())
        .map(|(key, metrics)| (key.as_str(), sorted_metrics(metrics)))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

pub fn sorted_metrics(metrics: &[String]) -> Vec<&str> {
    let mut sorted: Vec<&str> = metrics.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted
}

const SCRAPE_CONFIG_HEADER: &str = "Metrics per scrape config";
const RULE_GROUP_HEADER: &str = "Metrics (recording rules) per rule group";
const SCRAPE_CONFIG_SERIES_HEADER: &str = "Series per scrape config";
const RULE_GROUP_SERIES_HEADER: &str = "Series (recording rules) per rule group";
const UNEXPLAINED_HEADER: &str = "Metrics not exported by any scrape config nor by any recording rule";

/// Human-readable output
pub fn write_text<W: Write>(out: &mut W, report: &Report) -> io::Result<()> {
    match report.mode {
        Mode::MetricSeries => {
            for metric in sorted_metrics(&report.metrics) {
                writeln!(out, "{} {}", metric, report.count(metric))?;
            }
        }
        Mode::ByScrapeConfig => {
            writeln!(out, "{}", SCRAPE_CONFIG_HEADER)?;
            write_grouped(out, &report.attribution.scrape_config_metrics)?;
            writeln!(out, "{}", RULE_GROUP_HEADER)?;
            write_grouped(out, &report.attribution.rule_group_metrics)?;
            writeln!(out, "{}", UNEXPLAINED_HEADER)?;
            for metric in sorted_metrics(&report.attribution.unexplained) {
                if report.attribution.undetermined.iter().any(|m| m == metric) {
                    writeln!(out, "{} (metadata lookup failed)", metric)?;
                } else {
                    writeln!(out, "{}", metric)?;
                }
            }
        }
        Mode::ByScrapeConfigSummary => {
            writeln!(out, "{}", SCRAPE_CONFIG_SERIES_HEADER)?;
            for (key, total) in report.series_totals(&report.attribution.scrape_config_metrics) {
                writeln!(out, "{} {}", key, total)?;
            }
            writeln!(out, "{}", RULE_GROUP_SERIES_HEADER)?;
            for (key, total) in report.series_totals(&report.attribution.rule_group_metrics) {
                writeln!(out, "{} {}", key, total)?;
            }
            writeln!(out, "{}", UNEXPLAINED_HEADER)?;
            for metric in sorted_metrics(&report.attribution.unexplained) {
                writeln!(out, "{} {}", metric, report.count(metric))?;
            }
        }
    }
    Ok(())
}

fn write_grouped<W: Write>(out: &mut W, map: &HashMap<String, Vec<String>>) -> io::Result<()> {
    for (key, metrics) in sorted_entries(map) {
        writeln!(out, "{}", key)?;
        for metric in metrics {
            writeln!(out, "  {}", metric)?;
        }
    }
    Ok(())
}

/// A scrape config or rule group in JSON output
#[derive(Debug, Serialize)]
pub struct JsonGenerator {
    pub metrics: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct JsonMetric {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<i64>,
}

/// Root JSON output structure
#[derive(Debug, Serialize)]
pub struct JsonOutput {
    pub format: &'static str,
    pub version: &'static str,
    pub mode: Mode,
    pub rules: RuleSetStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Vec<JsonMetric>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scrape_configs: Option<BTreeMap<String, JsonGenerator>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_groups: Option<BTreeMap<String, JsonGenerator>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unexplained: Option<Vec<JsonMetric>>,
    pub undetermined: Vec<String>,
    pub malformed_expressions: Vec<String>,
    pub rejected_targets: Vec<String>,
}

impl JsonOutput {
    pub fn from_report(report: &Report) -> Self {
        let with_series = report.mode != Mode::ByScrapeConfig;
        let metric = |name: &str| JsonMetric {
            name: name.to_string(),
            series: with_series.then(|| report.count(name)),
        };
        let generators = |map: &HashMap<String, Vec<String>>| -> BTreeMap<String, JsonGenerator> {
            let totals: HashMap<&str, i64> = report.series_totals(map).into_iter().collect();
            sorted_entries(map)
                .into_iter()
                .map(|(key, metrics)| {
                    let generator = JsonGenerator {
                        metrics: metrics.iter().map(|m| m.to_string()).collect(),
                        series: if with_series { totals.get(key).copied() } else { None },
                    };
                    (key.to_string(), generator)
                })
                .collect()
        };

        let attributed = report.mode != Mode::MetricSeries;
        let mut undetermined = sorted_metrics(&report.attribution.undetermined)
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        undetermined.dedup();

        Self {
            format: "promsource-json-v1",
            version: env!("CARGO_PKG_VERSION"),
            mode: report.mode,
            rules: report.rules.clone(),
            metrics: (!attributed)
                .then(|| sorted_metrics(&report.metrics).into_iter().map(metric).collect()),
            scrape_configs: attributed
                .then(|| generators(&report.attribution.scrape_config_metrics)),
            rule_groups: attributed.then(|| generators(&report.attribution.rule_group_metrics)),
            unexplained: attributed.then(|| {
                sorted_metrics(&report.attribution.unexplained)
                    .into_iter()
                    .map(metric)
                    .collect()
            }),
            undetermined,
            malformed_expressions: report
                .malformed_expressions
                .iter()
                .map(ToString::to_string)
                .collect(),
            rejected_targets: report
                .rejected_targets
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

/// Machine-readable output
pub fn write_json<W: Write>(out: &mut W, report: &Report) -> io::Result<()> {
    let json = JsonOutput::from_report(report);
    serde_json::to_writer_pretty(&mut *out, &json)?;
    writeln!(out)
}
