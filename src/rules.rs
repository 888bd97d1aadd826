//! Rule groups: the live `/api/v1/rules` payload and static snapshots of it
//!
//! Snapshot files have the same shape as the API response:
//! `{"status": "success", "data": {"groups": [...]}}`.

use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// One rule of a group
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawRule")]
pub enum Rule {
    /// Materializes the result of `query` as the metric `name`
    Recording { name: String, query: String },
    /// Fires the alert `name` from `query`; adds no metric
    Alerting { name: String, query: String },
    /// Any other `type` value; rejected when the rule set is built
    Unrecognized { kind: String },
}

/// Wire form of a rule; everything except type/name/query is ignored
#[derive(Deserialize)]
struct RawRule {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    query: String,
}

impl From<RawRule> for Rule {
    fn from(raw: RawRule) -> Self {
        match raw.kind.as_str() {
            "recording" => Rule::Recording {
                name: raw.name,
                query: raw.query,
            },
            "alerting" => Rule::Alerting {
                name: raw.name,
                query: raw.query,
            },
            _ => Rule::Unrecognized { kind: raw.kind },
        }
    }
}

impl Rule {
    /// PromQL text of the rule, if it is a known variant
    pub fn query(&self) -> Option<&str> {
        match self {
            Rule::Recording { query, .. } | Rule::Alerting { query, .. } => Some(query),
            Rule::Unrecognized { .. } => None,
        }
    }
}

/// A named, filed group of rules
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuleGroup {
    pub name: String,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RuleGroup {
    /// Key used to report the group: base name of its rule file, or its name
    /// when the backend did not report a file
    pub fn key(&self) -> &str {
        match self.file.rsplit('/').next() {
            Some(base) if !base.is_empty() => base,
            _ => &self.name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SnapshotData {
    #[serde(default)]
    groups: Vec<RuleGroup>,
}

/// Rules snapshot file as saved from the rules endpoint
#[derive(Debug, Deserialize)]
pub struct RulesSnapshot {
    #[serde(default)]
    pub status: String,
    data: SnapshotData,
}

impl RulesSnapshot {
    /// Parse a snapshot from JSON text
    pub fn from_json(json: &str, origin: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| AnalysisError::Snapshot {
            path: origin.to_string(),
            reason: e.to_string(),
        })
    }

    /// Load and parse a snapshot from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| AnalysisError::Snapshot {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let snapshot = Self::from_json(&contents, &path.display().to_string())?;
        if snapshot.status != "success" {
            tracing::warn!(
                "rules snapshot {} has status {:?}",
                path.display(),
                snapshot.status
            );
        }
        Ok(snapshot)
    }

    pub fn into_groups(self) -> Vec<RuleGroup> {
        self.data.groups
    }
}

/// Validated rule groups: every rule is a recording or alerting rule
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    groups: Vec<RuleGroup>,
}

impl RuleSet {
    /// Validate rule groups
    ///
    /// # Errors
    /// `UnknownRuleVariant` for the first rule that is neither recording nor
    /// alerting; a snapshot containing one cannot be trusted.
    pub fn new(groups: Vec<RuleGroup>) -> Result<Self> {
        for group in &groups {
            for rule in &group.rules {
                if let Rule::Unrecognized { kind } = rule {
                    return Err(AnalysisError::UnknownRuleVariant {
                        group: group.name.clone(),
                        kind: kind.clone(),
                    });
                }
            }
        }
        Ok(Self { groups })
    }

    /// Query text of every rule, in snapshot order
    pub fn expressions(&self) -> Vec<&str> {
        self.groups
            .iter()
            .flat_map(|g| g.rules.iter())
            .filter_map(Rule::query)
            .collect()
    }

    /// Recording rule output names keyed by group key
    ///
    /// Groups that share a rule file are merged; groups without recording
    /// rules still get an (empty) entry.
    pub fn recording_rules_by_group(&self) -> HashMap<String, HashSet<String>> {
        let mut by_group: HashMap<String, HashSet<String>> = HashMap::new();
        for group in &self.groups {
            let names = by_group.entry(group.key().to_string()).or_default();
            for rule in &group.rules {
                if let Rule::Recording { name, .. } = rule {
                    names.insert(name.clone());
                }
            }
        }
        by_group
    }
}

/// Summary of a rule set, used by the JSON report
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RuleSetStats {
    pub groups: usize,
    pub recording_rules: usize,
    pub alerting_rules: usize,
}

impl From<&RuleSet> for RuleSetStats {
    fn from(rules: &RuleSet) -> Self {
        let mut stats = RuleSetStats {
            groups: rules.groups.len(),
            ..Default::default()
        };
        for rule in rules.groups.iter().flat_map(|g| g.rules.iter()) {
            match rule {
                Rule::Recording { .. } => stats.recording_rules += 1,
                Rule::Alerting { .. } => stats.alerting_rules += 1,
                Rule::Unrecognized { .. } => {}
            }
        }
        stats
    }
}
