//! Connection and query settings
//!
//! Settings come from built-in defaults, optionally overlaid by a TOML file
//! (`--config`), and finally by command-line flags.
//!
//! ```toml
//! server = "https://prometheus-k8s.openshift-monitoring.svc:9091"
//! bearer_token = "sha256~..."
//! timeout_secs = 120
//! window_secs = 7200
//! ```

use crate::error::{AnalysisError, Result};
use crate::time_range::DEFAULT_WINDOW_SECS;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_SERVER: &str = "http://localhost:9090/";

/// Per-call timeout applied to every backend request
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Largest accepted `window_secs`: ten years
pub const MAX_WINDOW_SECS: i64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Prometheus base URL; `http` is assumed when no scheme is given
    pub server: String,

    /// Sent as `Authorization: Bearer <token>` when set
    pub bearer_token: Option<String>,

    /// Timeout for each backend call
    pub timeout_secs: u64,

    /// Distance from "now" of each default series-query bound
    pub window_secs: i64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            bearer_token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            window_secs: DEFAULT_WINDOW_SECS,
        }
    }
}

impl AnalysisConfig {
    /// Load settings from a TOML file; absent keys keep their defaults
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AnalysisError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            AnalysisError::InvalidConfig(format!("cannot parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(AnalysisError::InvalidConfig(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }
        if !(0..=MAX_WINDOW_SECS).contains(&self.window_secs) {
            return Err(AnalysisError::InvalidConfig(format!(
                "window_secs must be between 0 and {}, got {}",
                MAX_WINDOW_SECS, self.window_secs
            )));
        }
        self.server_url().map(|_| ())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn window(&self) -> Result<chrono::Duration> {
        chrono::Duration::try_seconds(self.window_secs).ok_or_else(|| {
            AnalysisError::InvalidConfig(format!(
                "window_secs {} is out of range",
                self.window_secs
            ))
        })
    }

    /// Parsed server URL, always ending in `/` so API paths join below it
    pub fn server_url(&self) -> Result<Url> {
        let server = self.server.trim();
        if server.is_empty() {
            return Err(AnalysisError::InvalidConfig("server URL is empty".to_string()));
        }
        let with_scheme = if server.contains("://") {
            server.to_string()
        } else {
            format!("http://{}", server)
        };
        let mut url = Url::parse(&with_scheme).map_err(|e| {
            AnalysisError::InvalidConfig(format!("error while parsing server {:?}: {}", server, e))
        })?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }
}
