//! Identifiers grouped by scrape configuration
//!
//! The scrape pool of a target managed by the Prometheus Operator looks like
//! `serviceMonitor/<namespace>/<name>/<endpoint>`. Its second and third
//! segments name the configuration object that produced the target.

use crate::error::{AnalysisError, Result};
use crate::identifiers::Identifier;
use crate::prometheus::ActiveTarget;
use std::collections::{BTreeSet, HashMap};

/// Identifier sets per scrape configuration, plus targets that were skipped
#[derive(Debug, Clone, Default)]
pub struct ScrapeConfigIndex {
    pub configs: HashMap<String, BTreeSet<Identifier>>,
    /// One `MalformedScrapePool` per skipped target
    pub rejected: Vec<AnalysisError>,
}

impl ScrapeConfigIndex {
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

/// Scrape configuration key of a scrape pool
///
/// # Errors
/// `MalformedScrapePool` when the pool has fewer than three segments.
pub fn scrape_config_key(scrape_pool: &str) -> Result<String> {
    let mut segments = scrape_pool.split('/').skip(1);
    match (segments.next(), segments.next()) {
        (Some(namespace), Some(name)) => Ok(format!("{}/{}", namespace, name)),
        _ => Err(AnalysisError::MalformedScrapePool {
            scrape_pool: scrape_pool.to_string(),
        }),
    }
}

/// Group the identifiers of active targets by scrape configuration
pub fn build_index(targets: &[ActiveTarget]) -> ScrapeConfigIndex {
    let mut index = ScrapeConfigIndex::default();
    for target in targets {
        let key = match scrape_config_key(&target.scrape_pool) {
            Ok(key) => key,
            Err(err) => {
                tracing::warn!("skipping target: {}", err);
                index.rejected.push(err);
                continue;
            }
        };
        let identifier = Identifier::from(&target.descriptor());
        index.configs.entry(key).or_default().insert(identifier);
    }
    index
}
