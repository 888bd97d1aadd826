//! CLI argument parsing for promsource

use crate::report::Mode;
use clap::{ArgGroup, Parser, ValueEnum};
use std::path::PathBuf;

/// Output format of the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "promsource")]
#[command(version)]
#[command(
    about = "Find where the metrics used by Prometheus rules come from",
    long_about = None
)]
#[command(group(ArgGroup::new("mode").args(["by_scrape_config", "by_scrape_config_summary"])))]
pub struct Cli {
    /// Prometheus server URL (default: http://localhost:9090/)
    #[arg(long, value_name = "URL")]
    pub server: Option<String>,

    /// Bearer token sent with every request
    #[arg(long, value_name = "TOKEN", env = "PROMSOURCE_BEARER_TOKEN", hide_env_values = true)]
    pub bearer_token: Option<String>,

    /// Read rules from a saved /api/v1/rules response instead of the server
    #[arg(long, value_name = "FILE", conflicts_with = "expressions_file")]
    pub rules_file: Option<PathBuf>,

    /// Read PromQL expressions separated by blank lines instead of rules
    #[arg(long, value_name = "FILE", conflicts_with = "mode")]
    pub expressions_file: Option<PathBuf>,

    /// Group metrics by the scrape configuration exporting them
    #[arg(long)]
    pub by_scrape_config: bool,

    /// Like --by-scrape-config, with series totals per scrape configuration
    #[arg(long)]
    pub by_scrape_config_summary: bool,

    /// Start of the series query window (Unix or RFC 3339 timestamp)
    #[arg(long, value_name = "TIME", allow_hyphen_values = true)]
    pub start: Option<String>,

    /// End of the series query window (Unix or RFC 3339 timestamp)
    #[arg(long, value_name = "TIME", allow_hyphen_values = true)]
    pub end: Option<String>,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// TOML settings file; flags override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Timeout of each request to the server, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Enable debug tracing output to stderr
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    pub fn mode(&self) -> Mode {
        if self.by_scrape_config_summary {
            Mode::ByScrapeConfigSummary
        } else if self.by_scrape_config {
            Mode::ByScrapeConfig
        } else {
            Mode::MetricSeries
        }
    }
}
