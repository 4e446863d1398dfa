use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagramCategory {
    Flowchart,
    Sequence,
    Class,
    State,
    EntityRelationship,
    Gantt,
    Pie,
    Journey,
    GitGraph,
    Mindmap,
    Timeline,
    Generic,
}

impl DiagramCategory {
    pub const ALL: [DiagramCategory; 12] = [
        Self::Flowchart,
        Self::Sequence,
        Self::Class,
        Self::State,
        Self::EntityRelationship,
        Self::Gantt,
        Self::Pie,
        Self::Journey,
        Self::GitGraph,
        Self::Mindmap,
        Self::Timeline,
        Self::Generic,
    ];

    /// Human-readable label, also used in export file names.
    pub fn label(self) -> &'static str {
        match self {
            Self::Flowchart => "flowchart",
            Self::Sequence => "sequence diagram",
            Self::Class => "class diagram",
            Self::State => "state diagram",
            Self::EntityRelationship => "ER diagram",
            Self::Gantt => "Gantt chart",
            Self::Pie => "pie chart",
            Self::Journey => "user journey",
            Self::GitGraph => "git graph",
            Self::Mindmap => "mind map",
            Self::Timeline => "timeline",
            Self::Generic => "diagram",
        }
    }
}

impl fmt::Display for DiagramCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for DiagramCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

// Matched against the lowercased first line. A keyword must never be a prefix of a keyword that
// maps to a different category, otherwise table order would start to matter.
pub(crate) const KEYWORDS: &[(&str, DiagramCategory)] = &[
    ("graph", DiagramCategory::Flowchart),
    ("flowchart", DiagramCategory::Flowchart),
    ("sequencediagram", DiagramCategory::Sequence),
    ("classdiagram", DiagramCategory::Class),
    ("statediagram", DiagramCategory::State),
    ("erdiagram", DiagramCategory::EntityRelationship),
    ("gantt", DiagramCategory::Gantt),
    ("pie", DiagramCategory::Pie),
    ("journey", DiagramCategory::Journey),
    ("gitgraph", DiagramCategory::GitGraph),
    ("mindmap", DiagramCategory::Mindmap),
    ("timeline", DiagramCategory::Timeline),
];

/// Guesses the diagram type from the first line of a Mermaid block.
///
/// This is a display heuristic, not a parser: `flowchart-elk`, `stateDiagram-v2` and friends all
/// land on their base category, and anything unknown is [`DiagramCategory::Generic`].
pub fn classify(source_text: &str) -> DiagramCategory {
    let first_line = source_text.lines().next().unwrap_or_default();
    let first_line = first_line.trim().to_lowercase();

    KEYWORDS
        .iter()
        .find(|(keyword, _)| first_line.starts_with(keyword))
        .map(|(_, category)| *category)
        .unwrap_or(DiagramCategory::Generic)
}
