//! Analysis JSON → markdown text.
//!
//! The analysis service returns `{"data": {"chunks": [{"chunk_type", "text"}, …]}}`.
//! Every non-figure chunk's `text` is kept in the given order and joined
//! with a blank line. Figure chunks only describe images that the markdown
//! cannot carry.
//!
//! A payload without that structure is not an error: the assembler yields
//! empty markdown and reports why, and the pipeline continues to produce an
//! (empty) document.

use crate::error::Pdf2DocxError;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

/// Markdown built from an analysis payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembly {
    pub markdown: String,
    /// Set when the payload lacked the expected structure.
    pub degraded: Option<String>,
}

impl Assembly {
    fn degraded(reason: impl Into<String>) -> Self {
        Self {
            markdown: String::new(),
            degraded: Some(reason.into()),
        }
    }
}

/// Assemble markdown from a parsed analysis payload.
pub fn assemble_markdown(analysis: &Value) -> Assembly {
    let Some(chunks) = analysis.get("data").and_then(|d| d.get("chunks")) else {
        return Assembly::degraded("'data' or 'chunks' not found in analysis payload");
    };
    let Some(chunks) = chunks.as_array() else {
        return Assembly::degraded("'data.chunks' is not an array");
    };

    let texts: Vec<&str> = chunks
        .iter()
        .filter(|c| c.get("chunk_type").and_then(Value::as_str) != Some("figure"))
        .filter_map(|c| c.get("text").and_then(Value::as_str))
        .collect();
    debug!("Assembled {}/{} chunks", texts.len(), chunks.len());

    Assembly {
        markdown: texts.join("\n\n"),
        degraded: None,
    }
}

/// Read the analysis artifact at `analysis_path`, write markdown to
/// `markdown_path`.
///
/// Only I/O failures are errors; an unparseable or unexpected payload
/// degrades to an empty markdown file.
pub async fn assemble_file(
    analysis_path: &Path,
    markdown_path: &Path,
) -> Result<Assembly, Pdf2DocxError> {
    let raw = tokio::fs::read(analysis_path)
        .await
        .map_err(|e| Pdf2DocxError::io(analysis_path, e))?;

    let assembly = match serde_json::from_slice::<Value>(&raw) {
        Ok(value) => assemble_markdown(&value),
        Err(e) => Assembly::degraded(format!("analysis payload is not valid JSON: {e}")),
    };
    if let Some(ref reason) = assembly.degraded {
        warn!(
            "{} ({}); continuing with empty markdown",
            reason,
            analysis_path.display()
        );
    }

    tokio::fs::write(markdown_path, &assembly.markdown)
        .await
        .map_err(|e| Pdf2DocxError::io(markdown_path, e))?;
    Ok(assembly)
}
