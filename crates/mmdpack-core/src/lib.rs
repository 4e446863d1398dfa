#![forbid(unsafe_code)]

//! Extraction and bookkeeping half of the Mermaid batch converter.
//!
//! A Markdown document goes through three stages here:
//! - [`extract`]: fenced ` ```mermaid ` blocks become ordered [`DiagramRecord`]s
//! - [`classify`]: each record gets a category from its first line
//! - [`render`]: a [`RenderEngine`] turns each record into SVG markup (or a per-record failure)
//!
//! Rasterization and packaging live in the `mmdpack` crate.

pub mod classify;
pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod record;
pub mod render;

pub use classify::{DiagramCategory, classify};
pub use config::{ConverterConfig, RasterStrategy};
pub use document::{is_supported_document, read_document};
pub use error::{Error, Result};
pub use extract::BlockExtractor;
pub use record::{DiagramRecord, RecordId, RenderFailure, RenderState};
pub use render::{
    EngineError, EngineErrorKind, RenderAdapter, RenderEngine, RenderSummary, render_target_id,
};

#[cfg(test)]
mod tests;
