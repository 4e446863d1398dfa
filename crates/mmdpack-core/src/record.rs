use crate::classify::DiagramCategory;
use serde::Serialize;
use std::fmt;

/// 1-based position of a block in its document, in extraction order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RecordId(u32);

impl RecordId {
    pub fn new(value: u32) -> Option<Self> {
        (value > 0).then_some(Self(value))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub(crate) fn first() -> Self {
        Self(1)
    }

    pub(crate) fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why the engine rejected a block. Keeps the source around so a UI can show it next to the error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderFailure {
    pub message: String,
    pub source_text: String,
}

impl fmt::Display for RenderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "render failed: {}\n{}", self.message, self.source_text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RenderState {
    Pending,
    Rendered { target_id: String, markup: String },
    Failed(RenderFailure),
}

/// One Mermaid block pulled out of a document.
///
/// Everything except [`RenderState`] is fixed at extraction time. The render state moves out of
/// `Pending` exactly once, and only through [`crate::RenderAdapter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramRecord {
    id: RecordId,
    source_text: String,
    category: DiagramCategory,
    display_name: String,
    #[serde(flatten)]
    state: RenderState,
}

impl DiagramRecord {
    pub(crate) fn new(id: RecordId, source_text: String) -> Self {
        let category = crate::classify::classify(&source_text);
        Self {
            id,
            display_name: format!("Chart {id}"),
            source_text,
            category,
            state: RenderState::Pending,
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn category(&self) -> DiagramCategory {
        self.category
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, RenderState::Pending)
    }

    pub fn rendered_markup(&self) -> Option<&str> {
        match &self.state {
            RenderState::Rendered { markup, .. } => Some(markup),
            _ => None,
        }
    }

    pub fn render_target_id(&self) -> Option<&str> {
        match &self.state {
            RenderState::Rendered { target_id, .. } => Some(target_id),
            _ => None,
        }
    }

    pub fn render_error(&self) -> Option<&RenderFailure> {
        match &self.state {
            RenderState::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Default file name for a single-record PNG download.
    pub fn png_file_name(&self) -> String {
        format!("{}-{}.png", self.display_name, self.category.label())
    }

    pub(crate) fn settle(&mut self, state: RenderState) {
        debug_assert!(self.is_pending(), "record {} rendered twice", self.id);
        self.state = state;
    }
}
