// src/report/mod.rs

use anyhow::{Context, Result};
use arrow::record_batch::RecordBatch;
use plotters::{prelude::*, style::register_font};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};
use tracing::{info, warn};

use crate::{
    config::PipelineConfig,
    fields::{AVG_COST_MID, BRAND, EFFICIENCY},
    table,
};

pub const COST_CHART: &str = "brand_carbon_cost_ranking.png";
pub const EFFICIENCY_CHART: &str = "emissions_vs_gdp.png";

const CHART_SIZE: (u32, u32) = (1600, 1000);

/// Chart text is drawn with a bundled font so rendering needs no system font
/// library.
const FONT_FAMILY: &str = "sans-serif";
const FONT_BYTES: &[u8] = include_bytes!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/fonts/DejaVuSans.ttf"
));

fn ensure_font() -> Result<()> {
    static REGISTERED: OnceLock<bool> = OnceLock::new();
    let ok = *REGISTERED
        .get_or_init(|| register_font(FONT_FAMILY, FontStyle::Normal, FONT_BYTES).is_ok());
    anyhow::ensure!(ok, "bundled chart font could not be loaded");
    Ok(())
}

/// Title and axis label of one bar chart.
#[derive(Debug, Clone, Copy)]
pub struct ChartSpec<'a> {
    pub title: &'a str,
    pub y_label: &'a str,
}

pub const COST_SPEC: ChartSpec<'static> = ChartSpec {
    title: "Brand carbon cost exposure (100 €/tCO2e)",
    y_label: "Avg annual carbon cost (€) at 100 €/tCO2e",
};

pub const EFFICIENCY_SPEC: ChartSpec<'static> = ChartSpec {
    title: "Emissions intensity relative to GDP contribution",
    y_label: "tCO2e per $1M GDP (lower = better)",
};

/// `(label, value)` bars from two columns, in table order.
///
/// Rows whose value is null or non-finite cannot be drawn; they are skipped with
/// a warning naming the label.
pub fn bar_series(batch: &RecordBatch, label: &str, value: &str) -> Result<Vec<(String, f64)>> {
    let labels = table::text_values(batch, label)?;
    let values = table::float_values(batch, value)?;

    let mut bars = Vec::with_capacity(labels.len());
    for (l, v) in labels.into_iter().zip(values) {
        let l = l.unwrap_or_default();
        match v {
            Some(v) if v.is_finite() => bars.push((l, v)),
            other => warn!(label = %l, value = ?other, column = value, "bar left out of chart"),
        }
    }
    Ok(bars)
}

/// y range covering every bar and zero, with a little headroom.
fn value_range(bars: &[(String, f64)]) -> (f64, f64) {
    let lo = bars.iter().map(|(_, v)| *v).fold(0.0_f64, f64::min);
    let hi = bars.iter().map(|(_, v)| *v).fold(0.0_f64, f64::max);
    let hi = if hi > lo { hi } else { lo + 1.0 };
    let pad = (hi - lo) * 0.05;
    (if lo < 0.0 { lo - pad } else { lo }, hi + pad)
}

/// Draw a vertical bar chart of `bars` to `path` as a PNG image.
pub fn render_bar_chart(path: &Path, bars: &[(String, f64)], spec: ChartSpec<'_>) -> Result<()> {
    ensure_font()?;
    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let (lo, hi) = value_range(bars);
    let slots = bars.len().max(1);
    let mut chart = ChartBuilder::on(&root)
        .caption(spec.title, (FONT_FAMILY, 36))
        .margin(24)
        .x_label_area_size(220)
        .y_label_area_size(140)
        .build_cartesian_2d((0..slots).into_segmented(), lo..hi)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc(spec.y_label)
        .x_labels(slots)
        .x_label_style(
            (FONT_FAMILY, 20)
                .into_font()
                .transform(FontTransform::Rotate90),
        )
        .x_label_formatter(&|x| match x {
            SegmentValue::CenterOf(i) => bars
                .get(*i)
                .map(|(b, _)| b.clone())
                .unwrap_or_default(),
            _ => String::new(),
        })
        .draw()?;

    chart.draw_series(
        Histogram::vertical(&chart)
            .style(BLUE.mix(0.7).filled())
            .margin(10)
            .data(bars.iter().enumerate().map(|(i, (_, v))| (i, *v))),
    )?;

    root.present()
        .with_context(|| format!("writing chart {}", path.display()))?;
    Ok(())
}

/// Read the cost ranking and ESG summary back and render both charts.
#[tracing::instrument(level = "info", skip(config), fields(dir = %config.figures_dir.display()))]
pub fn run(config: &PipelineConfig) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(&config.figures_dir)
        .with_context(|| format!("creating {}", config.figures_dir.display()))?;

    let rank_cost = table::read_table(&config.rank_cost_output)?;
    let esg_summary = table::read_table(&config.esg_summary_output)?;

    let charts = [
        (COST_CHART, bar_series(&rank_cost, BRAND, AVG_COST_MID)?, COST_SPEC),
        (EFFICIENCY_CHART, bar_series(&esg_summary, BRAND, EFFICIENCY)?, EFFICIENCY_SPEC),
    ];

    let mut written = Vec::with_capacity(charts.len());
    for (name, bars, spec) in &charts {
        let path = config.figures_dir.join(name);
        render_bar_chart(&path, bars, *spec)?;
        info!(bars = bars.len(), chart = %path.display(), "chart rendered");
        written.push(path);
    }
    Ok(written)
}
