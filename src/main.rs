use anyhow::Result;
use toscane::{pipeline, PipelineConfig};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Optional overrides, read from the working directory when present.
const CONFIG_FILE: &str = "toscane.yaml";

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) resolve paths + price scenarios ──────────────────────────
    let config = PipelineConfig::load_or_default(CONFIG_FILE)?;
    info!(
        input = %config.raw_input.display(),
        scenarios = config.price_scenarios.len(),
        "configuration loaded"
    );

    // ─── 3) clean → cost → benchmark → report ────────────────────────
    let summary = pipeline::run(&config)?;
    info!(
        clean_rows = summary.clean_rows,
        groups = summary.cost_rows,
        brands = summary.benchmark.esg_summary.num_rows(),
        "all done"
    );
    Ok(())
}
