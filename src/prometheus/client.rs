//! Blocking HTTP client for the Prometheus API
//!
//! One client is built per run and shared by reference. Each request carries
//! the configured timeout; nothing is retried.

use super::api::{ApiResponse, MetadataRecord, RulesData, SeriesData, TargetsData};
use super::{ActiveTarget, MonitoringBackend, TargetDescriptor};
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::rules::RuleGroup;
use crate::time_range::TimeRange;
use reqwest::blocking::Client;
use reqwest::Url;
use serde::de::DeserializeOwned;

const RULES_PATH: &str = "api/v1/rules";
const TARGETS_PATH: &str = "api/v1/targets";
const METADATA_PATH: &str = "api/v1/targets/metadata";
const SERIES_PATH: &str = "api/v1/series";

#[derive(Debug, Clone)]
pub struct PrometheusClient {
    http: Client,
    base: Url,
    bearer_token: Option<String>,
}

impl PrometheusClient {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        config.validate()?;
        let http = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("promsource/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AnalysisError::InvalidConfig(format!("error creating API client: {}", e)))?;

        Ok(Self {
            http,
            base: config.server_url()?,
            bearer_token: config.bearer_token.clone().filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self
            .base
            .join(path)
            .map_err(|e| AnalysisError::unavailable(path, e))?;

        tracing::debug!("GET {} {:?}", url, query);
        let mut request = self.http.get(url).query(query);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .map_err(|e| AnalysisError::unavailable(path, e))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|e| AnalysisError::unavailable(path, e))?;

        // Error responses still use the JSON envelope; fall back to the HTTP
        // status only when the body is not one.
        let envelope: ApiResponse<T> = serde_json::from_str(&body).map_err(|e| {
            if status.is_success() {
                AnalysisError::unavailable(path, format!("invalid response body: {}", e))
            } else {
                AnalysisError::unavailable(path, format!("server returned {}", status))
            }
        })?;

        decode_envelope(path, envelope)
    }
}

fn decode_envelope<T>(path: &str, envelope: ApiResponse<T>) -> Result<T> {
    for warning in &envelope.warnings {
        tracing::warn!("{}: {}", path, warning);
    }
    if envelope.status != "success" {
        let error_type = envelope.error_type.unwrap_or_else(|| "unknown".to_string());
        let detail = envelope.error.unwrap_or_default();
        return Err(AnalysisError::unavailable(
            path,
            format!("query error: {} (detail: {})", error_type, detail.trim()),
        ));
    }
    envelope
        .data
        .ok_or_else(|| AnalysisError::unavailable(path, "response has no data"))
}

impl MonitoringBackend for PrometheusClient {
    fn fetch_rules(&self) -> Result<Vec<RuleGroup>> {
        let data: RulesData = self.get(RULES_PATH, &[])?;
        Ok(data.groups)
    }

    fn target_metadata(&self, metric: &str) -> Result<Vec<TargetDescriptor>> {
        let records: Vec<MetadataRecord> = self.get(METADATA_PATH, &[("metric", metric)])?;
        Ok(records.into_iter().map(TargetDescriptor::from).collect())
    }

    fn active_targets(&self) -> Result<Vec<ActiveTarget>> {
        let data: TargetsData = self.get(TARGETS_PATH, &[("state", "active")])?;
        Ok(data.active_targets)
    }

    fn count_series(&self, matcher: &str, range: &TimeRange) -> Result<usize> {
        let (start, end) = range.query_bounds();
        let series: SeriesData = self.get(
            SERIES_PATH,
            &[
                ("match[]", matcher),
                ("start", start.as_str()),
                ("end", end.as_str()),
            ],
        )?;
        Ok(series.len())
    }
}
