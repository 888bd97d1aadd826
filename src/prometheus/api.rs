//! Wire types of the Prometheus HTTP API (`/api/v1/...`)

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub(crate) const NAMESPACE_LABEL: &str = "namespace";
pub(crate) const JOB_LABEL: &str = "job";

/// Common response envelope
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub status: String,
    pub data: Option<T>,
    #[serde(rename = "errorType")]
    pub error_type: Option<String>,
    pub error: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// `data` of `/api/v1/rules`
#[derive(Debug, Deserialize)]
pub(crate) struct RulesData {
    #[serde(default)]
    pub groups: Vec<crate::rules::RuleGroup>,
}

/// One entry of `/api/v1/targets/metadata`
#[derive(Debug, Deserialize)]
pub(crate) struct MetadataRecord {
    #[serde(default)]
    pub target: HashMap<String, String>,
}

/// `data` of `/api/v1/targets`
#[derive(Debug, Deserialize)]
pub(crate) struct TargetsData {
    #[serde(rename = "activeTargets", default)]
    pub active_targets: Vec<ActiveTarget>,
}

/// `data` of `/api/v1/series`; only the number of entries matters
pub(crate) type SeriesData = Vec<IgnoredAny>;

/// Namespace/job of a target that exports some metric
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetDescriptor {
    pub namespace: String,
    pub job: String,
}

impl TargetDescriptor {
    pub fn new(namespace: impl Into<String>, job: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            job: job.into(),
        }
    }
}

impl From<MetadataRecord> for TargetDescriptor {
    fn from(record: MetadataRecord) -> Self {
        let mut target = record.target;
        Self {
            namespace: target.remove(NAMESPACE_LABEL).unwrap_or_default(),
            job: target.remove(JOB_LABEL).unwrap_or_default(),
        }
    }
}

/// A target currently being scraped
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveTarget {
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// e.g. `serviceMonitor/openshift-monitoring/alertmanager-main/0`
    #[serde(rename = "scrapePool", default)]
    pub scrape_pool: String,
}

impl ActiveTarget {
    pub fn new(namespace: &str, job: &str, scrape_pool: &str) -> Self {
        let labels = HashMap::from([
            (NAMESPACE_LABEL.to_string(), namespace.to_string()),
            (JOB_LABEL.to_string(), job.to_string()),
        ]);
        Self {
            labels,
            scrape_pool: scrape_pool.to_string(),
        }
    }

    pub fn label(&self, name: &str) -> &str {
        self.labels.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn descriptor(&self) -> TargetDescriptor {
        TargetDescriptor::new(self.label(NAMESPACE_LABEL), self.label(JOB_LABEL))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_record_to_descriptor() {
        let json = r#"[{
            "target": {"instance": "10.0.0.1:9100", "job": "node-exporter", "namespace": "monitoring"},
            "type": "counter",
            "help": "Seconds the CPUs spent in each mode.",
            "unit": ""
        }, {
            "target": {"instance": "10.0.0.2:8080", "job": "api"},
            "type": "gauge",
            "help": "",
            "unit": ""
        }]"#;
        let records: Vec<MetadataRecord> = serde_json::from_str(json).unwrap();
        let descriptors: Vec<TargetDescriptor> =
            records.into_iter().map(TargetDescriptor::from).collect();
        assert_eq!(
            descriptors,
            vec![
                TargetDescriptor::new("monitoring", "node-exporter"),
                TargetDescriptor::new("", "api"),
            ]
        );
    }

    #[test]
    fn test_targets_payload() {
        let json = r#"{
            "activeTargets": [{
                "discoveredLabels": {"__address__": "10.128.0.5:9095"},
                "labels": {"job": "alertmanager-main", "namespace": "openshift-monitoring"},
                "scrapePool": "serviceMonitor/openshift-monitoring/alertmanager-main/0",
                "scrapeUrl": "https://10.128.0.5:9095/metrics",
                "health": "up"
            }],
            "droppedTargets": []
        }"#;
        let data: TargetsData = serde_json::from_str(json).unwrap();
        assert_eq!(data.active_targets.len(), 1);
        let target = &data.active_targets[0];
        assert_eq!(
            target.scrape_pool,
            "serviceMonitor/openshift-monitoring/alertmanager-main/0"
        );
        assert_eq!(
            target.descriptor(),
            TargetDescriptor::new("openshift-monitoring", "alertmanager-main")
        );
    }

    #[test]
    fn test_error_envelope() {
        let json = r#"{"status":"error","errorType":"bad_data","error":"invalid parameter \"match[]\""}"#;
        let response: ApiResponse<SeriesData> = serde_json::from_str(json).unwrap();
        assert_eq!(response.status, "error");
        assert!(response.data.is_none());
        assert_eq!(response.error_type.as_deref(), Some("bad_data"));
    }

    #[test]
    fn test_series_payload_counts_entries() {
        let json = r#"{"status":"success","data":[
            {"__name__":"up","job":"a"},
            {"__name__":"up","job":"b"}
        ]}"#;
        let response: ApiResponse<SeriesData> = serde_json::from_str(json).unwrap();
        assert_eq!(response.data.unwrap().len(), 2);
    }
}
