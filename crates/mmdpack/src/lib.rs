#![forbid(unsafe_code)]

//! `mmdpack` turns the Mermaid diagrams embedded in a Markdown document into PNG files.
//!
//! Extraction, classification and rendering come from `mmdpack-core` (re-exported here). This
//! crate adds rasterization ([`raster`]), batch packaging ([`export`]), clipboard hand-off
//! ([`clipboard`]), concrete rendering engines ([`engine`]) and the [`Converter`] facade.
//!
//! # Features
//!
//! - `mermaid-rs`: in-process rendering via `mermaid-rs-renderer` (`engine::NativeEngine`)
//! - `clipboard`: system clipboard support via `arboard` (`clipboard::SystemClipboard`)

pub use mmdpack_core::*;

pub mod clipboard;
pub mod converter;
pub mod engine;
pub mod export;
pub mod raster;

pub use converter::{Converter, Document, SingleExport};
pub use export::{BatchArchive, BatchExporter, ExportError, ExportProgress};
pub use raster::{RasterError, RasterOutcome, Rasterizer};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] mmdpack_core::Error),
    #[error(transparent)]
    Raster(#[from] RasterError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Clipboard(#[from] clipboard::ClipboardError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The document contained no diagram blocks.
    pub fn is_extraction_empty(&self) -> bool {
        matches!(self, Self::Core(mmdpack_core::Error::ExtractionEmpty))
    }
}
