//! Fenced-block extraction.

use crate::record::{DiagramRecord, RecordId};
use crate::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

static MERMAID_FENCE: LazyLock<Regex> = LazyLock::new(|| fence_regex("mermaid").unwrap());

fn fence_regex(language: &str) -> std::result::Result<Regex, regex::Error> {
    // The body is the shortest run up to the next bare fence, so blocks never overlap and an
    // unterminated fence matches nothing.
    let pattern = format!(r"(?is)```{}\s*\n(.*?)```", regex::escape(language));
    Regex::new(&pattern)
}

/// Pulls ` ```mermaid ` blocks out of a document.
#[derive(Debug, Clone)]
pub struct BlockExtractor {
    fence: Regex,
}

impl Default for BlockExtractor {
    fn default() -> Self {
        Self {
            fence: MERMAID_FENCE.clone(),
        }
    }
}

impl BlockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extractor for a different fence info string (matched case-insensitively).
    pub fn for_language(language: &str) -> Result<Self> {
        let language = language.trim();
        if language.is_empty() {
            return Err(Error::Config {
                message: "fence language must not be empty".to_string(),
            });
        }
        if language.eq_ignore_ascii_case("mermaid") {
            return Ok(Self::default());
        }
        let fence = fence_regex(language).map_err(|err| Error::Config {
            message: format!("fence language {language:?}: {err}"),
        })?;
        Ok(Self { fence })
    }

    /// Returns one classified, unrendered record per non-empty block, ids `1..=n` in document
    /// order. Blocks whose body is only whitespace are dropped without consuming an id.
    pub fn extract(&self, document: &str) -> Vec<DiagramRecord> {
        let mut records = Vec::new();
        let mut next_id = RecordId::first();

        for caps in self.fence.captures_iter(document) {
            let Some(body) = caps.get(1) else {
                continue;
            };
            let source_text = body.as_str().trim();
            if source_text.is_empty() {
                tracing::debug!(offset = body.start(), "skipping empty mermaid block");
                continue;
            }

            let record = DiagramRecord::new(next_id, source_text.to_string());
            tracing::debug!(
                id = %record.id(),
                category = %record.category(),
                "extracted mermaid block"
            );
            records.push(record);
            next_id = next_id.next();
        }

        records
    }
}
