use anyhow::{bail, Context, Result};
use clap::Parser;
use eiaseries::{enrich::LookupTables, pipeline, RunConfig};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    std::panic::set_hook(Box::new(|info| {
        eprintln!("panic: {:?}", info);
    }));

    let config = RunConfig::parse();
    info!(
        dataset = ?config.dataset,
        input = %config.input.display(),
        output = %config.output.display(),
        "startup"
    );

    let tables = LookupTables::load_dir(&config.lookups)
        .with_context(|| format!("loading lookups from {}", config.lookups.display()))?;
    let report = pipeline::run(&config, Arc::new(tables))?;

    if report.has_fatal() {
        error!(
            extracts = report.extract_failures.len(),
            years = report.reconciliation_failures.len(),
            entities = report.entity_failures.len(),
            "run finished with failures; see {}",
            config.report_path().display()
        );
        bail!("run finished with failures");
    }
    info!("all done");
    Ok(())
}
