//! The rendering-engine boundary and the adapter that drives it over a document's records.

use crate::record::{DiagramRecord, RecordId, RenderFailure, RenderState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    /// The engine rejected the diagram source.
    Syntax,
    /// The engine itself failed (missing binary, crashed, produced nothing).
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn syntax(message: impl Into<String>) -> Self {
        Self {
            kind: EngineErrorKind::Syntax,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: EngineErrorKind::Internal,
            message: message.into(),
        }
    }
}

/// Anything that can turn Mermaid source into SVG markup.
///
/// `target_id` is unique per record within a document; engines that emit document-global ids
/// (markers, `<style>` scoping) should use it as their root id so several SVGs can coexist.
pub trait RenderEngine {
    fn render(&self, target_id: &str, source_text: &str) -> Result<String, EngineError>;
}

impl<E: RenderEngine + ?Sized> RenderEngine for &E {
    fn render(&self, target_id: &str, source_text: &str) -> Result<String, EngineError> {
        (**self).render(target_id, source_text)
    }
}

impl<E: RenderEngine + ?Sized> RenderEngine for Box<E> {
    fn render(&self, target_id: &str, source_text: &str) -> Result<String, EngineError> {
        (**self).render(target_id, source_text)
    }
}

/// Render-target id for a record: `mermaid-chart-{id}`.
pub fn render_target_id(id: RecordId) -> String {
    format!("mermaid-chart-{id}")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    pub rendered: usize,
    pub failed: usize,
    /// Records that were already rendered and left untouched.
    pub skipped: usize,
}

/// Runs a [`RenderEngine`] over records one at a time.
///
/// A failing record never stops the others: the failure is stored on that record and the loop
/// moves on.
#[derive(Debug, Clone)]
pub struct RenderAdapter<E> {
    engine: E,
}

impl<E: RenderEngine> RenderAdapter<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Renders a single pending record. Returns `false` when the record had already settled.
    pub fn render_record(&self, record: &mut DiagramRecord) -> bool {
        if !record.is_pending() {
            tracing::debug!(id = %record.id(), "record already rendered; skipping");
            return false;
        }

        let target_id = render_target_id(record.id());
        let state = match self.engine.render(&target_id, record.source_text()) {
            Ok(markup) => {
                tracing::debug!(id = %record.id(), %target_id, bytes = markup.len(), "rendered");
                RenderState::Rendered { target_id, markup }
            }
            Err(err) => {
                tracing::warn!(id = %record.id(), kind = ?err.kind, "render failed: {err}");
                RenderState::Failed(RenderFailure {
                    message: err.message,
                    source_text: record.source_text().to_string(),
                })
            }
        };
        record.settle(state);
        true
    }

    /// Synchronous variant of [`RenderAdapter::render_all`].
    pub fn render_all_sync(&self, records: &mut [DiagramRecord]) -> RenderSummary {
        let mut summary = RenderSummary::default();
        for record in records.iter_mut() {
            if !self.render_record(record) {
                summary.skipped += 1;
            } else if record.rendered_markup().is_some() {
                summary.rendered += 1;
            } else {
                summary.failed += 1;
            }
        }
        summary
    }

    /// Renders every pending record in order. Rendering is CPU- or process-bound; this stays
    /// executor-agnostic and simply awaits nothing between records.
    pub async fn render_all(&self, records: &mut [DiagramRecord]) -> RenderSummary {
        self.render_all_sync(records)
    }
}
