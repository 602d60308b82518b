//! Presentation tree, render surfaces, and HTML output.
//!
//! This crate provides:
//! - [`node`]: [`RenderNode`] and the food-item builders
//! - [`surface`]: the [`RenderSurface`] capability and [`attach_all`]
//! - [`document`]: [`HtmlDocument`], an in-memory surface that serializes to HTML

pub mod document;
pub mod node;
pub mod surface;

pub use document::HtmlDocument;
pub use node::{FOOD_ITEM_CLASS, RenderNode, build_food_item, enrichment_nodes};
pub use surface::{ContainerId, RenderSurface, attach_all};
