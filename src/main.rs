use anyhow::{Context, Result};
use clap::Parser;
use promsource::analysis::{Analyzer, RulesSource};
use promsource::cli::{Cli, OutputFormat};
use promsource::config::AnalysisConfig;
use promsource::prometheus::PrometheusClient;
use promsource::report::{self, Report};
use promsource::time_range::TimeRange;
use std::io::Write;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber; warnings always reach stderr
fn init_tracing(debug: bool) {
    let level = if debug {
        tracing::Level::TRACE
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
}

/// Settings file first, then command-line overrides
fn load_config(args: &Cli) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => AnalysisConfig::from_toml(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    if let Some(server) = &args.server {
        config.server = server.clone();
    }
    if let Some(token) = &args.bearer_token {
        config.bearer_token = Some(token.clone());
    }
    if let Some(timeout) = args.timeout_secs {
        config.timeout_secs = timeout;
    }
    config.validate()?;
    Ok(config)
}

fn rules_source(args: &Cli) -> RulesSource {
    match (&args.rules_file, &args.expressions_file) {
        (Some(path), _) => RulesSource::SnapshotFile(path.clone()),
        (None, Some(path)) => RulesSource::ExpressionsFile(path.clone()),
        (None, None) => RulesSource::Backend,
    }
}

/// Surface problems that did not stop the run
fn log_diagnostics(report: &Report) {
    for err in &report.malformed_expressions {
        tracing::warn!("{}", err);
    }
    for err in &report.rejected_targets {
        tracing::debug!("{}", err);
    }
    if !report.attribution.undetermined.is_empty() {
        tracing::warn!(
            "metadata lookup failed for {} metrics; their producers are unknown",
            report.attribution.undetermined.len()
        );
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let config = load_config(&args)?;

    // Reject bad bounds before talking to the server
    let range = TimeRange::from_bounds(
        args.start.as_deref(),
        args.end.as_deref(),
        chrono::Utc::now(),
        config.window()?,
    )?;

    let client = PrometheusClient::new(&config).context("failed to create Prometheus client")?;
    tracing::debug!("querying {}", client.base_url());

    let analyzer = Analyzer::new(&client, range);
    let report = analyzer.run(&rules_source(&args), args.mode())?;
    log_diagnostics(&report);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match args.format {
        OutputFormat::Text => report::write_text(&mut out, &report)?,
        OutputFormat::Json => report::write_json(&mut out, &report)?,
    }
    out.flush()?;

    Ok(())
}
