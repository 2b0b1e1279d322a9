//! Markdown→DOCX conversion through an external markup engine.

use crate::error::ToolError;
use crate::pipeline::tool::{ensure_output, ensure_success, run_tool};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Converts a markdown file into a word-processor document.
#[async_trait]
pub trait MarkupConverter: Send + Sync {
    async fn convert(&self, markup: &Path, output: &Path) -> Result<(), ToolError>;
}

/// Adapter for `pandoc`.
#[derive(Debug, Clone)]
pub struct PandocConverter {
    program: PathBuf,
    timeout: Duration,
}

impl PandocConverter {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn args(markup: &Path, output: &Path) -> Vec<OsString> {
        vec![
            markup.as_os_str().to_owned(),
            "--from=markdown".into(),
            "--to=docx".into(),
            "--output".into(),
            output.as_os_str().to_owned(),
        ]
    }
}

#[async_trait]
impl MarkupConverter for PandocConverter {
    async fn convert(&self, markup: &Path, output: &Path) -> Result<(), ToolError> {
        let out = run_tool(&self.program, Self::args(markup, output), self.timeout).await?;
        ensure_success(&self.program, &out)?;
        ensure_output(&self.program, output).await
    }
}
