//! Time window for series queries
//!
//! Bounds are given either as a Unix timestamp (fractional seconds allowed)
//! or as RFC 3339 with up to nanosecond precision. Missing bounds default to a
//! window around the current time.

use crate::error::{AnalysisError, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Default distance of each bound from "now" when none is given, in seconds
pub const DEFAULT_WINDOW_SECS: i64 = 2 * 60 * 60;

pub fn default_window() -> Duration {
    Duration::seconds(DEFAULT_WINDOW_SECS)
}

/// Closed time interval used by `/api/v1/series`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Build a range from optional user-supplied bounds
    ///
    /// # Errors
    /// `InvalidTimeBound` when a supplied bound does not parse, and
    /// `InvalidConfig` when a default bound falls outside the representable
    /// date range.
    pub fn from_bounds(
        start: Option<&str>,
        end: Option<&str>,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<Self> {
        let start = match start {
            Some(value) => parse_bound("start", value)?,
            None => now
                .checked_sub_signed(window)
                .ok_or_else(|| window_out_of_range(window))?,
        };
        let end = match end {
            Some(value) => parse_bound("end", value)?,
            None => now
                .checked_add_signed(window)
                .ok_or_else(|| window_out_of_range(window))?,
        };
        Ok(Self { start, end })
    }

    /// Range relative to the current time with the default window
    pub fn around_now() -> Self {
        let now = Utc::now();
        Self {
            start: now - default_window(),
            end: now + default_window(),
        }
    }

    /// Query-string form of the bounds
    pub fn query_bounds(&self) -> (String, String) {
        (
            self.start.to_rfc3339_opts(SecondsFormat::Nanos, true),
            self.end.to_rfc3339_opts(SecondsFormat::Nanos, true),
        )
    }
}

fn window_out_of_range(window: Duration) -> AnalysisError {
    AnalysisError::InvalidConfig(format!(
        "time window of {}s around now is out of range",
        window.num_seconds()
    ))
}

fn parse_bound(bound: &'static str, value: &str) -> Result<DateTime<Utc>> {
    parse_time(value).ok_or_else(|| AnalysisError::InvalidTimeBound {
        bound,
        value: value.to_string(),
    })
}

/// Parse a Unix timestamp or an RFC 3339 timestamp
pub fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(seconds) = value.parse::<f64>() {
        if !seconds.is_finite() {
            return None;
        }
        let whole = seconds.floor();
        let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
        return DateTime::from_timestamp(whole as i64, nanos);
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
