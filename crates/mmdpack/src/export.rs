//! Batch export: every rendered record rasterized in order and packed into one archive.

use crate::raster::{RasterError, Rasterizer};
use chrono::NaiveDateTime;
use mmdpack_core::DiagramRecord;
use std::io::{Cursor, Write};

/// Archive entry name for the `position`-th (1-based) exported record.
pub fn archive_entry_name(position: usize, record: &DiagramRecord) -> String {
    format!("{position}_{}.png", record.category().label())
}

/// `{prefix}_{YYYYMMDD}_{HHMMSS}`; used both as the archive's folder and its file stem.
pub fn archive_folder_name(prefix: &str, timestamp: NaiveDateTime) -> String {
    format!("{prefix}_{}", timestamp.format("%Y%m%d_%H%M%S"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct PackagingError(pub String);

/// The archive boundary: named buffers plus a folder name in, one archive buffer out.
pub trait ArchivePackager {
    fn package(&self, folder: &str, entries: &[ArchiveEntry]) -> Result<Vec<u8>, PackagingError>;
}

/// Zip archive with every entry stored (PNGs don't compress further) under `folder/`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipPackager;

impl ArchivePackager for ZipPackager {
    fn package(&self, folder: &str, entries: &[ArchiveEntry]) -> Result<Vec<u8>, PackagingError> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.add_directory(format!("{folder}/"), stored())
            .map_err(zip_error)?;
        for entry in entries {
            zip.start_file(format!("{folder}/{}", entry.file_name), stored())
                .map_err(zip_error)?;
            zip.write_all(&entry.bytes).map_err(zip_error)?;
        }
        let cursor = zip.finish().map_err(zip_error)?;
        Ok(cursor.into_inner())
    }
}

fn stored() -> zip::write::SimpleFileOptions {
    zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored)
}

fn zip_error(err: impl std::fmt::Display) -> PackagingError {
    PackagingError(format!("zip: {err}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportProgress {
    /// About to rasterize the `current`-th of `total` records (1-based).
    Rasterizing { current: usize, total: usize },
    /// All records rasterized; building the archive.
    Packaging,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("No rendered diagrams to export")]
    NothingToExport,
    #[error("Export aborted: {display_name} ({position}/{total}) could not be rasterized: {source}")]
    RasterizationFailed {
        position: usize,
        total: usize,
        display_name: String,
        #[source]
        source: RasterError,
    },
    #[error("Export aborted: {0}")]
    Archive(#[from] PackagingError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchArchive {
    pub folder: String,
    pub file_name: String,
    /// Entry names without the folder prefix, in export order.
    pub entries: Vec<String>,
    pub bytes: Vec<u8>,
}

/// Rasterizes records one after another and packs them into a single archive.
///
/// All-or-nothing: the first rasterization failure aborts the export and nothing is packaged.
pub struct BatchExporter<'a> {
    rasterizer: &'a Rasterizer,
    packager: &'a dyn ArchivePackager,
}

impl<'a> BatchExporter<'a> {
    pub fn new(rasterizer: &'a Rasterizer, packager: &'a dyn ArchivePackager) -> Self {
        Self {
            rasterizer,
            packager,
        }
    }

    /// Synchronous variant of [`BatchExporter::export`].
    ///
    /// Records without rendered markup are skipped; entry positions count only the records that
    /// are exported.
    pub fn export_sync(
        &self,
        records: &[DiagramRecord],
        folder: &str,
        progress: &mut dyn FnMut(ExportProgress),
    ) -> Result<BatchArchive, ExportError> {
        let exportable: Vec<&DiagramRecord> = records
            .iter()
            .filter(|record| record.rendered_markup().is_some())
            .collect();
        if exportable.is_empty() {
            return Err(ExportError::NothingToExport);
        }

        let total = exportable.len();
        let mut entries = Vec::with_capacity(total);
        for (index, record) in exportable.into_iter().enumerate() {
            let position = index + 1;
            progress(ExportProgress::Rasterizing {
                current: position,
                total,
            });

            let outcome = self.rasterizer.rasterize_record(record);
            if outcome.used_fallback() {
                tracing::debug!(id = %record.id(), "rasterized via percent-encoded fallback");
            }
            let bitmap = outcome.into_result().map_err(|source| {
                tracing::warn!(id = %record.id(), position, total, "batch export aborted: {source}");
                ExportError::RasterizationFailed {
                    position,
                    total,
                    display_name: record.display_name().to_string(),
                    source,
                }
            })?;

            entries.push(ArchiveEntry {
                file_name: archive_entry_name(position, record),
                bytes: bitmap.png,
            });
        }

        progress(ExportProgress::Packaging);
        let bytes = self.packager.package(folder, &entries)?;
        tracing::info!(folder, entries = entries.len(), bytes = bytes.len(), "batch export complete");

        Ok(BatchArchive {
            folder: folder.to_string(),
            file_name: format!("{folder}.zip"),
            entries: entries.into_iter().map(|entry| entry.file_name).collect(),
            bytes,
        })
    }

    pub async fn export(
        &self,
        records: &[DiagramRecord],
        folder: &str,
        progress: &mut dyn FnMut(ExportProgress),
    ) -> Result<BatchArchive, ExportError> {
        self.export_sync(records, folder, progress)
    }
}
