//! Integration test utilities
//!
//! A mocked Prometheus HTTP API. Every mock matches on method, path and query
//! parameters; a request no mock matches gets a non-JSON 404, which the
//! client reports as a failed call.

#![allow(dead_code)]

use httpmock::{Method::GET, Mock, MockServer};

pub struct Prometheus {
    server: MockServer,
    bearer_token: Option<String>,
    series_range: Option<(String, String)>,
}

impl Prometheus {
    pub fn start() -> Self {
        Self {
            server: MockServer::start(),
            bearer_token: None,
            series_range: None,
        }
    }

    /// Only answer requests carrying `Authorization: Bearer <token>`
    pub fn require_bearer_token(mut self, token: &str) -> Self {
        self.bearer_token = Some(token.to_string());
        self
    }

    /// Only answer series queries with exactly these `start`/`end` values
    pub fn require_series_range(mut self, start: &str, end: &str) -> Self {
        self.series_range = Some((start.to_string(), end.to_string()));
        self
    }

    pub fn url(&self) -> String {
        self.server.url("/")
    }

    fn respond(&self, path: &str, query: &[(&str, &str)], body: String) -> Mock<'_> {
        self.server.mock(|when, then| {
            let mut when = when.method(GET).path(path);
            for (name, value) in query {
                when = when.query_param(*name, *value);
            }
            if let Some(token) = &self.bearer_token {
                when.header("Authorization", format!("Bearer {}", token));
            }
            then.status(200)
                .header("content-type", "application/json")
                .body(body);
        })
    }

    pub fn rules(&self, groups: &str) -> Mock<'_> {
        self.respond("/api/v1/rules", &[], success(&format!(r#"{{"groups":{}}}"#, groups)))
    }

    pub fn targets(&self, active: &str) -> Mock<'_> {
        self.respond(
            "/api/v1/targets",
            &[("state", "active")],
            success(&format!(
                r#"{{"activeTargets":{},"droppedTargets":[]}}"#,
                active
            )),
        )
    }

    /// Metadata naming the given `(namespace, job)` targets; empty means no producer
    pub fn metadata(&self, metric: &str, targets: &[(&str, &str)]) -> Mock<'_> {
        let records: Vec<String> = targets
            .iter()
            .map(|(ns, job)| {
                format!(
                    r#"{{"target":{{"namespace":"{}","job":"{}","instance":"10.0.0.1:9100"}},"type":"gauge","help":"","unit":""}}"#,
                    ns, job
                )
            })
            .collect();
        self.respond(
            "/api/v1/targets/metadata",
            &[("metric", metric)],
            success(&format!("[{}]", records.join(","))),
        )
    }

    /// `count` distinct series for `metric`
    pub fn series(&self, metric: &str, count: usize) -> Mock<'_> {
        let items: Vec<String> = (0..count)
            .map(|i| format!(r#"{{"__name__":"{}","instance":"{}"}}"#, metric, i))
            .collect();
        let body = success(&format!("[{}]", items.join(",")));
        match &self.series_range {
            Some((start, end)) => self.respond(
                "/api/v1/series",
                &[("match[]", metric), ("start", start), ("end", end)],
                body,
            ),
            None => self.respond("/api/v1/series", &[("match[]", metric)], body),
        }
    }

    /// The `slo.yaml` cluster: one recording rule over an unexported counter,
    /// one alert on its output, and an alert on a scraped metric.
    pub fn slo_cluster(&self) -> SloMocks<'_> {
        let rules = self.rules(
            r#"[
                {"name":"slo","file":"/etc/prometheus/rules/slo.yaml","rules":[
                    {"type":"recording","name":"sli:errors:rate5m","query":"rate(errors_total[5m])"},
                    {"type":"alerting","name":"HighErrors","query":"sli:errors:rate5m > 0.1"}
                ]},
                {"name":"node","file":"/etc/prometheus/rules/node.yaml","rules":[
                    {"type":"alerting","name":"NodeDown","query":"up{job=\"node\"} == 0"}
                ]}
            ]"#,
        );
        let targets = self.targets(
            r#"[
                {"labels":{"namespace":"monitoring","job":"node","instance":"10.0.0.1:9100"},
                 "scrapePool":"serviceMonitor/monitoring/node-exporter/0","health":"up"},
                {"labels":{"namespace":"monitoring","job":"prometheus"},
                 "scrapePool":"prometheus","health":"up"}
            ]"#,
        );
        self.metadata("up", &[("monitoring", "node")]);
        for metric in ["errors_total", "errors", "sli:errors:rate5m"] {
            self.metadata(metric, &[]);
        }
        let series = vec![
            self.series("up", 10),
            self.series("errors_total", 3),
            self.series("sli:errors:rate5m", 1),
        ];
        SloMocks {
            rules,
            targets,
            series,
        }
    }
}

/// Handles for checking which endpoints a run touched
pub struct SloMocks<'a> {
    pub rules: Mock<'a>,
    pub targets: Mock<'a>,
    pub series: Vec<Mock<'a>>,
}

impl SloMocks<'_> {
    pub fn series_hits(&self) -> usize {
        self.series.iter().map(Mock::hits).sum()
    }
}

/// `{"status":"success","data":<data>}`
pub fn success(data: &str) -> String {
    format!(r#"{{"status":"success","data":{}}}"#, data)
}
