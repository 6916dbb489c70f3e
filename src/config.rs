// src/config.rs

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs::File, path::Path, path::PathBuf};

/// A hypothetical carbon price, applied to summed emissions to produce `column`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PriceScenario {
    pub column: String,
    pub eur_per_tonne: f64,
}

impl PriceScenario {
    pub fn new(column: &str, eur_per_tonne: f64) -> Self {
        Self {
            column: column.to_string(),
            eur_per_tonne,
        }
    }
}

/// Where every stage reads and writes, plus the carbon price scenarios.
///
/// Built once at startup and handed to each stage by reference. Any field left
/// out of a YAML file keeps its default, which is the `data/` + `figures/` layout
/// under the working directory.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub raw_input: PathBuf,
    pub clean_output: PathBuf,
    pub cost_output: PathBuf,
    pub rank_emissions_output: PathBuf,
    pub rank_cost_output: PathBuf,
    pub rank_efficiency_output: PathBuf,
    pub esg_summary_output: PathBuf,
    pub figures_dir: PathBuf,
    pub price_scenarios: Vec<PriceScenario>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let processed = Path::new("data/processed");
        Self {
            raw_input: PathBuf::from("data/raw/true_cost_fast_fashion.csv"),
            clean_output: processed.join("clean_fast_fashion_emissions.csv"),
            cost_output: processed.join("brand_country_year_emissions_costs.csv"),
            rank_emissions_output: processed.join("toscane_rank_emissions.csv"),
            rank_cost_output: processed.join("toscane_rank_cost100.csv"),
            rank_efficiency_output: processed.join("toscane_rank_efficiency.csv"),
            esg_summary_output: processed.join("toscane_brand_esg_summary.csv"),
            figures_dir: PathBuf::from("figures"),
            price_scenarios: vec![
                PriceScenario::new("cost_low_eur", 50.0),
                PriceScenario::new("cost_mid_eur", 100.0),
                PriceScenario::new("cost_high_eur", 150.0),
            ],
        }
    }
}

impl PipelineConfig {
    /// Load a YAML config file; missing keys fall back to the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("opening config {}", path.display()))?;
        serde_yaml::from_reader(file).with_context(|| format!("parsing config {}", path.display()))
    }

    /// `path` if it exists, otherwise the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}
