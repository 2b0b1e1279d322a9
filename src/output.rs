//! Result types returned by the conversion orchestrator.

use crate::error::ErrorKind;
use crate::workspace::JobId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which conversion pipeline a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    /// Direct structural conversion of a text-layer ("digital") PDF.
    Structural,
    /// Remote document analysis, markdown assembly, markdown→DOCX.
    Ocr,
}

impl PipelineKind {
    /// Suffix appended to the source stem to name the output document.
    pub fn output_suffix(self) -> &'static str {
        match self {
            PipelineKind::Structural => "digital",
            PipelineKind::Ocr => "ocr",
        }
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineKind::Structural => f.write_str("structural"),
            PipelineKind::Ocr => f.write_str("ocr"),
        }
    }
}

impl FromStr for PipelineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "structural" | "digital" => Ok(PipelineKind::Structural),
            "ocr" | "image" | "image_ocr" => Ok(PipelineKind::Ocr),
            other => Err(format!(
                "unknown pipeline '{other}' (expected 'structural' or 'ocr')"
            )),
        }
    }
}

/// One step of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Upload bytes written to the workspace.
    Persist,
    /// PDF→DOCX structural conversion.
    StructuralConvert,
    /// Remote document analysis.
    Analyze,
    /// Analysis JSON→markdown.
    Assemble,
    /// Markdown→DOCX.
    MarkupConvert,
    /// DOCX→PDF→page images.
    Preview,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Persist => "upload persistence",
            Stage::StructuralConvert => "structural conversion",
            Stage::Analyze => "document analysis",
            Stage::Assemble => "markdown assembly",
            Stage::MarkupConvert => "markup conversion",
            Stage::Preview => "preview generation",
        };
        f.write_str(s)
    }
}

/// How a stage ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageStatus {
    Completed,
    /// Finished with a documented fallback; the job continues.
    Degraded { reason: String },
    Failed { kind: ErrorKind },
}

/// Per-stage record collected by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub stage: Stage,
    #[serde(flatten)]
    pub status: StageStatus,
    pub duration_ms: u64,
}

impl StageOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, StageStatus::Failed { .. })
    }
}

/// Timing and stage bookkeeping for one job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Outcomes in execution order.
    pub stages: Vec<StageOutcome>,
    pub total_duration_ms: u64,
}

/// Outcome of a successful job.
///
/// All artifact references are file names relative to the job's workspace;
/// combine them with `job_id` to retrieve them through
/// [`crate::resolve::ArtifactResolver`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub job_id: JobId,
    pub pipeline: PipelineKind,
    /// Sanitised name of the uploaded file.
    pub original_filename: String,
    /// File name of the converted document.
    pub document: String,
    /// Preview image file names, page order, at most the configured cap.
    pub previews: Vec<String>,
    pub stats: ConversionStats,
}

impl ConversionResult {
    /// `<job_id>/<document>` reference for the download.
    pub fn download_ref(&self) -> String {
        format!("{}/{}", self.job_id, self.document)
    }

    /// `<job_id>/<image>` references for every preview.
    pub fn preview_refs(&self) -> Vec<String> {
        self.previews
            .iter()
            .map(|p| format!("{}/{}", self.job_id, p))
            .collect()
    }
}
