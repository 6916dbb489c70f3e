pub mod benchmark;
pub mod clean;
pub mod config;
pub mod cost;
pub mod fields;
pub mod pipeline;
pub mod report;
pub mod table;

pub use config::{PipelineConfig, PriceScenario};
