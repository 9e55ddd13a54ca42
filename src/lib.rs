pub mod config;
pub mod data;
pub mod llm;
pub mod logging;
pub mod metrics;
pub mod record;
pub mod risk;
pub mod store;
pub mod synth;
