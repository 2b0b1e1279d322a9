//! Structural PDF→DOCX conversion for text-layer ("digital") PDFs.

use crate::error::ToolError;
use crate::pipeline::tool::{ensure_output, ensure_success, run_tool};
use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Converts a digital PDF directly into a word-processor document.
#[async_trait]
pub trait StructuralConverter: Send + Sync {
    /// Convert `source` into a document written at `output`.
    async fn convert(&self, source: &Path, output: &Path) -> Result<(), ToolError>;
}

/// Adapter for the `pdf2docx` command-line tool
/// (`pdf2docx convert <source> <output>`).
#[derive(Debug, Clone)]
pub struct Pdf2DocxCli {
    program: PathBuf,
    timeout: Duration,
}

impl Pdf2DocxCli {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

#[async_trait]
impl StructuralConverter for Pdf2DocxCli {
    async fn convert(&self, source: &Path, output: &Path) -> Result<(), ToolError> {
        let out = run_tool(
            &self.program,
            [OsStr::new("convert"), source.as_os_str(), output.as_os_str()],
            self.timeout,
        )
        .await?;
        // pdf2docx reports some failures (encrypted input) on stderr with a
        // zero exit, so the output file is the real success signal.
        ensure_success(&self.program, &out)?;
        ensure_output(&self.program, output).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_surfaces_not_found() {
        let tmp = tempfile::TempDir::new().unwrap();
        let converter = Pdf2DocxCli::new("no-such-pdf2docx", Duration::from_secs(5));
        let err = converter
            .convert(&tmp.path().join("a.pdf"), &tmp.path().join("a.docx"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound { .. }), "got {err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn zero_exit_without_output_is_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let converter = Pdf2DocxCli::new("true", Duration::from_secs(5));
        let err = converter
            .convert(&tmp.path().join("a.pdf"), &tmp.path().join("a.docx"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NoOutput { .. }), "got {err:?}");
    }
}
