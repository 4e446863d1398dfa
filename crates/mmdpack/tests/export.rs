use chrono::NaiveDate;
use mmdpack::export::{
    ArchiveEntry, ArchivePackager, PackagingError, ZipPackager, archive_folder_name,
};
use mmdpack::{
    BatchExporter, BlockExtractor, DiagramRecord, EngineError, ExportError, ExportProgress,
    RenderAdapter, RenderEngine, Rasterizer,
};
use std::cell::Cell;
use std::io::{Cursor, Read};

/// Valid SVG for every source except `broken…` (unparseable markup) and `bad…` (render failure).
struct FixtureEngine;

impl RenderEngine for FixtureEngine {
    fn render(&self, target_id: &str, source: &str) -> Result<String, EngineError> {
        if source.starts_with("bad") {
            return Err(EngineError::syntax("Parse error on line 1"));
        }
        if source.starts_with("broken") {
            return Ok("<svg><g></svg>".to_string());
        }
        Ok(format!(
            r#"<svg id="{target_id}" xmlns="http://www.w3.org/2000/svg" width="20" height="10"><rect width="5" height="5"/></svg>"#
        ))
    }
}

#[derive(Default)]
struct CountingPackager {
    calls: Cell<usize>,
}

impl ArchivePackager for CountingPackager {
    fn package(&self, folder: &str, entries: &[ArchiveEntry]) -> Result<Vec<u8>, PackagingError> {
        self.calls.set(self.calls.get() + 1);
        ZipPackager.package(folder, entries)
    }
}

fn records(doc: &str) -> Vec<DiagramRecord> {
    let mut records = BlockExtractor::new().extract(doc);
    RenderAdapter::new(FixtureEngine).render_all_sync(&mut records);
    records
}

fn fence(body: &str) -> String {
    format!("```mermaid\n{body}\n```\n\n")
}

fn rasterizer() -> Rasterizer {
    Rasterizer::new(mmdpack::raster::RasterOptions::default().with_scale(1.0))
}

fn zip_entries(bytes: &[u8]) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

#[test]
fn three_records_produce_positionally_named_entries() {
    let doc = [
        fence("graph TD\nA-->B"),
        fence("sequenceDiagram\nA->>B: hi"),
        fence("pie\n\"a\": 1"),
    ]
    .concat();
    let records = records(&doc);
    let rasterizer = rasterizer();
    let packager = CountingPackager::default();

    let archive = BatchExporter::new(&rasterizer, &packager)
        .export_sync(&records, "mermaid_charts_20240102_030405", &mut |_| {})
        .unwrap();

    assert_eq!(packager.calls.get(), 1);
    assert_eq!(archive.file_name, "mermaid_charts_20240102_030405.zip");
    assert_eq!(
        archive.entries,
        ["1_flowchart.png", "2_sequence diagram.png", "3_pie chart.png"]
    );
    assert_eq!(
        zip_entries(&archive.bytes),
        [
            "mermaid_charts_20240102_030405/",
            "mermaid_charts_20240102_030405/1_flowchart.png",
            "mermaid_charts_20240102_030405/2_sequence diagram.png",
            "mermaid_charts_20240102_030405/3_pie chart.png",
        ]
    );

    let mut zip = zip::ZipArchive::new(Cursor::new(&archive.bytes)).unwrap();
    let mut png = Vec::new();
    zip.by_name("mermaid_charts_20240102_030405/2_sequence diagram.png")
        .unwrap()
        .read_to_end(&mut png)
        .unwrap();
    assert!(png.starts_with(b"\x89PNG\r\n\x1a\n"));
    let pixmap = tiny_skia::Pixmap::decode_png(&png).unwrap();
    assert_eq!((pixmap.width(), pixmap.height()), (20, 10));
}

#[test]
fn nothing_rendered_means_nothing_to_export() {
    let records = records(&[fence("bad one"), fence("bad two")].concat());
    let rasterizer = rasterizer();
    let packager = CountingPackager::default();
    let mut events = Vec::new();

    let err = BatchExporter::new(&rasterizer, &packager)
        .export_sync(&records, "out", &mut |p| events.push(p))
        .unwrap_err();

    assert!(matches!(err, ExportError::NothingToExport));
    assert_eq!(packager.calls.get(), 0);
    assert!(events.is_empty());
}

#[test]
fn one_failing_record_aborts_the_whole_export() {
    let doc = [fence("graph TD"), fence("broken"), fence("pie")].concat();
    let records = records(&doc);
    let rasterizer = rasterizer();
    let packager = CountingPackager::default();
    let mut events = Vec::new();

    let err = BatchExporter::new(&rasterizer, &packager)
        .export_sync(&records, "out", &mut |p| events.push(p))
        .unwrap_err();

    match err {
        ExportError::RasterizationFailed {
            position,
            total,
            display_name,
            ..
        } => {
            assert_eq!((position, total), (2, 3));
            assert_eq!(display_name, "Chart 2");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(packager.calls.get(), 0);
    // The third record is never attempted.
    assert_eq!(
        events,
        [
            ExportProgress::Rasterizing {
                current: 1,
                total: 3
            },
            ExportProgress::Rasterizing {
                current: 2,
                total: 3
            },
        ]
    );
}

#[test]
fn progress_is_reported_before_each_step_then_packaging() {
    let records = records(&[fence("graph LR"), fence("gantt")].concat());
    let rasterizer = rasterizer();
    let mut events = Vec::new();

    BatchExporter::new(&rasterizer, &ZipPackager)
        .export_sync(&records, "out", &mut |p| events.push(p))
        .unwrap();

    assert_eq!(
        events,
        [
            ExportProgress::Rasterizing {
                current: 1,
                total: 2
            },
            ExportProgress::Rasterizing {
                current: 2,
                total: 2
            },
            ExportProgress::Packaging,
        ]
    );
}

#[test]
fn failed_renders_are_skipped_and_positions_count_exported_records() {
    let doc = [fence("bad"), fence("journey"), fence("bad again"), fence("mindmap")].concat();
    let records = records(&doc);
    let rasterizer = rasterizer();

    let archive = BatchExporter::new(&rasterizer, &ZipPackager)
        .export_sync(&records, "out", &mut |_| {})
        .unwrap();
    assert_eq!(archive.entries, ["1_user journey.png", "2_mind map.png"]);
}

#[test]
fn folder_name_uses_prefix_and_timestamp() {
    let ts = NaiveDate::from_ymd_opt(2025, 12, 31)
        .unwrap()
        .and_hms_opt(23, 5, 9)
        .unwrap();
    assert_eq!(
        archive_folder_name("mermaid_charts", ts),
        "mermaid_charts_20251231_230509"
    );
}

#[test]
fn async_export_matches_sync() {
    let records = records(&fence("timeline\n2024 : launch"));
    let rasterizer = rasterizer();
    let exporter = BatchExporter::new(&rasterizer, &ZipPackager);

    let archive = futures::executor::block_on(exporter.export(&records, "out", &mut |_| {}))
        .unwrap();
    assert_eq!(archive.entries, ["1_timeline.png"]);
}
