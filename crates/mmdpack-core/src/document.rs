use crate::{Error, Result};
use std::path::Path;

const SUPPORTED_EXTENSIONS: &[&str] = &["md", "markdown", "txt"];

/// `true` for `.md`, `.markdown` and `.txt` files (case-insensitive).
pub fn is_supported_document(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
}

/// Reads a Markdown document as UTF-8, rejecting files that don't look like Markdown.
pub fn read_document(path: &Path) -> Result<String> {
    if !is_supported_document(path) {
        return Err(Error::UnsupportedDocument {
            path: path.to_path_buf(),
        });
    }
    Ok(std::fs::read_to_string(path)?)
}
