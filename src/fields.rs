//! Column names shared between stages.

pub const BRAND: &str = "brand";
pub const COUNTRY: &str = "country";
pub const YEAR: &str = "year";

/// Identity of an observation group: one emissions-cost row per key.
pub const GROUP_KEY: [&str; 3] = [BRAND, COUNTRY, YEAR];

pub const EMISSIONS_KG: &str = "carbon_emissions_kgco2e";
pub const EMISSIONS_T: &str = "carbon_emissions_tco2e";

pub const COST_MID: &str = "cost_mid_eur";

pub const GDP: &str = "gdp_contribution_million_usd";
pub const SUSTAINABILITY: &str = "sustainability_score";
pub const ETHICAL: &str = "ethical_rating";
pub const TRANSPARENCY: &str = "transparency_index";
pub const SENTIMENT: &str = "sentiment_score";

pub const EFFICIENCY: &str = "efficiency_tco2e_per_gdp_musd";

pub const AVG_EMISSIONS: &str = "avg_emissions_tco2e";
pub const AVG_COST_MID: &str = "avg_cost_100eur";
pub const AVG_EFFICIENCY: &str = "avg_efficiency_tco2e_per_gdp_musd";
