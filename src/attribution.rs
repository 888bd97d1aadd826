//! Attribution of rule metrics to their producers
//!
//! Each metric referenced by a rule ends up in one of three places:
//! - under every scrape configuration whose identifiers intersect the
//!   metric's producer identifiers,
//! - under the rule group whose recording rule outputs it, when no target
//!   exports it (whether or not any expression reads it),
//! - in the unexplained list otherwise.

use crate::identifiers::{Identifier, Producers};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Result of attributing every referenced metric
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attribution {
    /// Scrape config -> metrics it exports; one entry per scrape config
    pub scrape_config_metrics: HashMap<String, Vec<String>>,
    /// Rule group -> recording rule outputs not exported by any target
    pub rule_group_metrics: HashMap<String, Vec<String>>,
    /// Metrics with no producer and no recording rule origin
    pub unexplained: Vec<String>,
    /// Metrics whose producer lookup failed (subset of the empty-producer metrics)
    pub undetermined: Vec<String>,
}

/// Attribute metrics to scrape configurations and recording rule groups
pub fn attribute(
    metric_producers: &HashMap<String, Producers>,
    scrape_configs: &HashMap<String, BTreeSet<Identifier>>,
    recording_rules_by_group: &HashMap<String, HashSet<String>>,
) -> Attribution {
    let mut attribution = Attribution::default();

    for (config, config_ids) in scrape_configs {
        let exported = attribution
            .scrape_config_metrics
            .entry(config.clone())
            .or_default();
        for (metric, producers) in metric_producers {
            if !producers.identifiers().is_disjoint(config_ids) {
                exported.push(metric.clone());
            }
        }
    }

    for (group, outputs) in recording_rules_by_group {
        let metrics = attribution
            .rule_group_metrics
            .entry(group.clone())
            .or_default();
        for output in outputs {
            // A name missing from the map has no known producer either
            let exported = metric_producers
                .get(output)
                .is_some_and(|producers| !producers.is_empty());
            if !exported {
                metrics.push(output.clone());
            }
        }
    }

    for (metric, producers) in metric_producers {
        if !producers.is_empty() {
            continue;
        }
        if producers.lookup_failed() {
            attribution.undetermined.push(metric.clone());
        }
        if !attribution.is_recorded(metric) {
            attribution.unexplained.push(metric.clone());
        }
    }

    attribution
}

impl Attribution {
    /// Drop unexplained metrics that have no series in storage
    ///
    /// `series_count` returns a negative value when the count is unknown;
    /// such metrics are kept.
    pub fn retain_observed<F>(&mut self, mut series_count: F)
    where
        F: FnMut(&str) -> i64,
    {
        self.unexplained.retain(|metric| series_count(metric) != 0);
    }

    pub fn is_recorded(&self, metric: &str) -> bool {
        self.rule_group_metrics
            .values()
            .any(|metrics| metrics.iter().any(|m| m == metric))
    }
}
