//! # edgequake-pdf2docx
//!
//! Convert uploaded PDF documents to DOCX, with page previews, inside
//! isolated per-job workspaces that are reclaimed after a retention period.
//!
//! ## Pipelines
//!
//! ```text
//! upload ──▶ validate ──▶ sweep (best-effort) ──▶ allocate workspace
//!                                                   │
//!        ┌──────────────────────────────────────────┴─────────────┐
//!   structural                                                    ocr
//!   pdf2docx CLI                         remote analysis ─▶ markdown ─▶ pandoc
//!        └──────────────────────────────┬─────────────────────────┘
//!                                       ▼
//!                     previews: soffice → PDF → pdfium → PNG
//!                                       ▼
//!                   ConversionResult (job id + file names)
//! ```
//!
//! Artifacts are served afterwards through [`ArtifactResolver`] until the
//! Retention Sweeper removes the workspace.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2docx::{ConversionConfig, Converter, PipelineKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .store_root("/var/lib/pdf2docx")
//!         .build()?;
//!     let converter = Converter::new(config)?;
//!     let _retention = converter.spawn_retention_task();
//!
//!     let bytes = std::fs::read("report.pdf")?;
//!     let result = converter
//!         .submit(PipelineKind::Structural, &bytes, "report.pdf")
//!         .await?;
//!     println!("download: {}", result.download_ref());
//!     for preview in result.preview_refs() {
//!         println!("preview:  {preview}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2docx` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdf2docx = { version = "0.1", default-features = false }
//! ```
//!
//! ## External tools
//!
//! | Stage | Default program |
//! |-------|-----------------|
//! | structural conversion | `pdf2docx` |
//! | markup conversion | `pandoc` |
//! | preview rendering | `soffice` (LibreOffice) |
//! | preview rasterisation | system `libpdfium` |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod resolve;
pub mod sweep;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use convert::Converter;
pub use error::{ErrorKind, JobFailure, Pdf2DocxError, PreviewError, ToolError};
pub use output::{
    ConversionResult, ConversionStats, PipelineKind, Stage, StageOutcome, StageStatus,
};
pub use pipeline::analyze::{DocumentAnalyzer, LandingAiAnalyzer};
pub use pipeline::markup::{MarkupConverter, PandocConverter};
pub use pipeline::render::{OfficePreviewRenderer, PreviewRenderer};
pub use pipeline::structural::{Pdf2DocxCli, StructuralConverter};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use resolve::{ArtifactResolver, ResolveError, ResolvedArtifact};
pub use sweep::{spawn_retention_task, sweep, SweepReport};
pub use workspace::{FsWorkspaceStore, Job, JobId, WorkspaceEntry, WorkspaceStore};
