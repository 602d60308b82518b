//! Shared types, error model, and configuration for FoodFacts.
//!
//! This crate is the foundation depended on by all other FoodFacts crates.
//! It provides:
//! - [`FoodFactsError`]: the unified error type
//! - Domain records ([`LocalFoodRecord`], [`ExternalFoodRecord`], [`EnrichedFood`], [`RunId`])
//! - Configuration ([`AppConfig`], [`HttpConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DEFAULT_EXTERNAL_URL_TEMPLATE, DEFAULT_LOCAL_URL, HttpConfig, RenderConfig,
    SourcesConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{FoodFactsError, Result};
pub use types::{EnrichedFood, ExternalFoodRecord, LocalFoodRecord, Nutriments, Product, RunId};
