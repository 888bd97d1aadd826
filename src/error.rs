//! Error taxonomy for metric attribution

use thiserror::Error;

/// Errors raised while collecting and attributing rule metrics
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// A rule expression is not valid PromQL
    #[error("malformed expression {expression:?}: {reason}")]
    MalformedExpression { expression: String, reason: String },

    /// A rule group entry is neither a recording nor an alerting rule
    #[error("rule group {group:?} contains a rule of unknown type {kind:?}")]
    UnknownRuleVariant { group: String, kind: String },

    /// A backend call failed, timed out, or returned an error envelope
    #[error("request to {endpoint} failed: {reason}")]
    CollaboratorUnavailable { endpoint: String, reason: String },

    /// A --start/--end value is neither a Unix timestamp nor RFC 3339
    #[error("invalid {bound} time: cannot parse {value:?} to a valid timestamp")]
    InvalidTimeBound { bound: &'static str, value: String },

    /// A target scrape pool does not have the `kind/namespace/name` shape
    #[error("scrape pool {scrape_pool:?} has fewer than three '/'-separated segments")]
    MalformedScrapePool { scrape_pool: String },

    /// A rules snapshot file could not be read or decoded
    #[error("rules snapshot {path}: {reason}")]
    Snapshot { path: String, reason: String },

    /// Configuration file or server URL is unusable
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

impl AnalysisError {
    pub(crate) fn unavailable(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        Self::CollaboratorUnavailable {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }
}
