use crate::record::RecordId;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No Mermaid diagrams found in the document")]
    ExtractionEmpty,

    #[error("Unsupported document {}: expected a Markdown file (.md, .markdown, .txt)", path.display())]
    UnsupportedDocument { path: PathBuf },

    #[error("No diagram with id {id}")]
    UnknownRecord { id: RecordId },

    #[error("Diagram {id} has not been rendered")]
    NotRendered { id: RecordId },

    #[error("Invalid converter config: {message}")]
    Config { message: String },

    #[error("Invalid converter config JSON: {0}")]
    ConfigJson(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
