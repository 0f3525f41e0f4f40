//! Pipeline Configuration Module
//!
//! Every threshold, weight, rule table and timeout the pipeline uses is read
//! from a TOML file instead of being hardcoded.
//!
//! ## Loading Order
//!
//! 1. `TURBOFAN_CONFIG` environment variable (path to TOML file)
//! 2. `turbofan.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! Load once at startup and hand an `Arc<PipelineConfig>` to the orchestrator:
//!
//! ```ignore
//! let config = Arc::new(PipelineConfig::load());
//! let orchestrator = Orchestrator::from_config(config)?;
//! ```

mod pipeline_config;
pub mod defaults;

pub use pipeline_config::*;
