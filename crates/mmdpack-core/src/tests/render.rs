use crate::*;
use futures::executor::block_on;
use std::cell::RefCell;

#[derive(Default)]
struct RecordingEngine {
    calls: RefCell<Vec<(String, String)>>,
}

impl RenderEngine for RecordingEngine {
    fn render(&self, target_id: &str, source_text: &str) -> std::result::Result<String, EngineError> {
        self.calls
            .borrow_mut()
            .push((target_id.to_string(), source_text.to_string()));
        if source_text.starts_with("broken") {
            return Err(EngineError::syntax("Parse error on line 1"));
        }
        Ok(format!(r#"<svg id="{target_id}"></svg>"#))
    }
}

const DOC: &str = "```mermaid\ngraph TD\n```\n```mermaid\nbroken diagram\n```\n```mermaid\npie\n```\n";

#[test]
fn renders_each_record_sequentially_and_absorbs_failures() {
    let mut records = BlockExtractor::new().extract(DOC);
    let adapter = RenderAdapter::new(RecordingEngine::default());
    let summary = adapter.render_all_sync(&mut records);

    assert_eq!(
        summary,
        RenderSummary {
            rendered: 2,
            failed: 1,
            skipped: 0
        }
    );

    let calls = adapter.engine().calls.borrow();
    let targets: Vec<&str> = calls.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(
        targets,
        vec!["mermaid-chart-1", "mermaid-chart-2", "mermaid-chart-3"]
    );

    assert_eq!(
        records[0].rendered_markup(),
        Some(r#"<svg id="mermaid-chart-1"></svg>"#)
    );
    assert_eq!(records[0].render_target_id(), Some("mermaid-chart-1"));
    assert!(records[0].render_error().is_none());

    let failure = records[1].render_error().unwrap();
    assert!(records[1].rendered_markup().is_none());
    assert_eq!(failure.message, "Parse error on line 1");
    assert_eq!(failure.source_text, "broken diagram");
    assert!(failure.to_string().contains("broken diagram"));

    assert!(records[2].rendered_markup().is_some());
}

#[test]
fn settled_records_are_not_rendered_again() {
    let mut records = BlockExtractor::new().extract(DOC);
    let adapter = RenderAdapter::new(RecordingEngine::default());
    block_on(adapter.render_all(&mut records));
    let before = records.clone();

    let summary = block_on(adapter.render_all(&mut records));
    assert_eq!(summary.skipped, 3);
    assert_eq!(adapter.engine().calls.borrow().len(), 3);
    assert_eq!(records, before);
}

#[test]
fn target_ids_are_unique_per_record() {
    let a = render_target_id(RecordId::new(1).unwrap());
    let b = render_target_id(RecordId::new(12).unwrap());
    assert_eq!(a, "mermaid-chart-1");
    assert_eq!(b, "mermaid-chart-12");
}

#[test]
fn record_id_rejects_zero() {
    assert!(RecordId::new(0).is_none());
    assert_eq!(RecordId::new(3).map(RecordId::get), Some(3));
}
