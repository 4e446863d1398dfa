//! One-document session: extract → classify → render, then rasterize on demand.

use crate::clipboard::{ClipboardError, ClipboardSink, PNG_MIME};
use crate::export::{
    ArchivePackager, BatchArchive, BatchExporter, ExportProgress, ZipPackager, archive_folder_name,
};
use crate::raster::{Bitmap, Rasterizer};
use crate::Result;
use chrono::NaiveDateTime;
use mmdpack_core::{
    BlockExtractor, ConverterConfig, DiagramRecord, RecordId, RenderAdapter, RenderEngine,
    RenderSummary, read_document,
};
use std::path::Path;

/// The records of one loaded document, in document order.
#[derive(Debug, Clone)]
pub struct Document {
    pub records: Vec<DiagramRecord>,
    pub summary: RenderSummary,
}

impl Document {
    pub fn record(&self, id: RecordId) -> Option<&DiagramRecord> {
        self.records.iter().find(|record| record.id() == id)
    }
}

/// A single rasterized diagram, ready to be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleExport {
    /// `{displayName}-{category}.png`
    pub file_name: String,
    pub png: Vec<u8>,
}

pub struct Converter<E> {
    config: ConverterConfig,
    extractor: BlockExtractor,
    renderer: RenderAdapter<E>,
    rasterizer: Rasterizer,
    packager: Box<dyn ArchivePackager + Send + Sync>,
}

impl<E: RenderEngine> Converter<E> {
    pub fn new(engine: E, config: ConverterConfig) -> Result<Self> {
        config.validate()?;
        let extractor = BlockExtractor::for_language(&config.fence_language)?;
        Ok(Self {
            rasterizer: Rasterizer::from_config(&config),
            extractor,
            renderer: RenderAdapter::new(engine),
            packager: Box::new(ZipPackager),
            config,
        })
    }

    /// Replaces the rasterizer (for custom decoders or capture backends).
    pub fn with_rasterizer(mut self, rasterizer: Rasterizer) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub fn with_packager(mut self, packager: impl ArchivePackager + Send + Sync + 'static) -> Self {
        self.packager = Box::new(packager);
        self
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn rasterizer(&self) -> &Rasterizer {
        &self.rasterizer
    }

    pub fn engine(&self) -> &E {
        self.renderer.engine()
    }

    /// Extracts and renders every diagram in `text`.
    ///
    /// Per-record render failures are kept on the records; only a document with no diagram
    /// blocks at all is an error.
    pub fn load(&self, text: &str) -> Result<Document> {
        let mut records = self.extractor.extract(text);
        if records.is_empty() {
            return Err(mmdpack_core::Error::ExtractionEmpty.into());
        }
        let summary = self.renderer.render_all_sync(&mut records);
        tracing::info!(
            diagrams = records.len(),
            rendered = summary.rendered,
            failed = summary.failed,
            "document loaded"
        );
        Ok(Document { records, summary })
    }

    /// Like [`Converter::load`], for a `.md`/`.markdown`/`.txt` file.
    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<Document> {
        let text = read_document(path.as_ref())?;
        self.load(&text)
    }

    fn rendered_record<'d>(&self, doc: &'d Document, id: RecordId) -> Result<&'d DiagramRecord> {
        let record = doc
            .record(id)
            .ok_or(mmdpack_core::Error::UnknownRecord { id })?;
        if record.rendered_markup().is_none() {
            return Err(mmdpack_core::Error::NotRendered { id }.into());
        }
        Ok(record)
    }

    fn rasterize(&self, record: &DiagramRecord) -> Result<Bitmap> {
        Ok(self.rasterizer.rasterize_record(record).into_result()?)
    }

    pub fn export_record(&self, doc: &Document, id: RecordId) -> Result<SingleExport> {
        let record = self.rendered_record(doc, id)?;
        let bitmap = self.rasterize(record)?;
        Ok(SingleExport {
            file_name: record.png_file_name(),
            png: bitmap.png,
        })
    }

    /// Rasterizes one record and hands it to `clipboard` as `image/png`.
    ///
    /// Without a clipboard the call fails with [`ClipboardError::Unsupported`] before anything is
    /// rasterized.
    pub fn copy_record(
        &self,
        doc: &Document,
        id: RecordId,
        clipboard: Option<&mut dyn ClipboardSink>,
    ) -> Result<()> {
        let record = self.rendered_record(doc, id)?;
        let Some(clipboard) = clipboard else {
            return Err(ClipboardError::Unsupported.into());
        };
        let bitmap = self.rasterize(record)?;
        clipboard.write(PNG_MIME, &bitmap.png)?;
        tracing::debug!(%id, bytes = bitmap.png.len(), "copied diagram to clipboard");
        Ok(())
    }

    /// Synchronous variant of [`Converter::export_all`].
    pub fn export_all_sync(
        &self,
        doc: &Document,
        timestamp: NaiveDateTime,
        progress: &mut dyn FnMut(ExportProgress),
    ) -> Result<BatchArchive> {
        let folder = archive_folder_name(&self.config.archive_prefix, timestamp);
        let exporter = BatchExporter::new(&self.rasterizer, self.packager.as_ref());
        Ok(exporter.export_sync(&doc.records, &folder, progress)?)
    }

    /// Packs every rendered diagram into one archive named after `timestamp`.
    pub async fn export_all(
        &self,
        doc: &Document,
        timestamp: NaiveDateTime,
        progress: &mut dyn FnMut(ExportProgress),
    ) -> Result<BatchArchive> {
        self.export_all_sync(doc, timestamp, progress)
    }

    /// Async variant of [`Converter::load`].
    pub async fn render_all(&self, text: &str) -> Result<Document> {
        self.load(text)
    }
}
