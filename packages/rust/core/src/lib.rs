//! Pipeline orchestration for FoodFacts.
//!
//! This crate ties together the catalog client, the enrichment fan-out, and
//! the render surface into the two-phase render pipeline.

pub mod pipeline;

pub use pipeline::{
    Pipeline, PipelineConfig, PipelineStage, ProgressReporter, RunReport, SilentProgress,
};
