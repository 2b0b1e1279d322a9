//! Error types for the edgequake-pdf2docx library.
//!
//! Three distinct error types reflect three distinct failure modes:
//!
//! * [`Pdf2DocxError`] — **Fatal**: the job cannot produce a document
//!   (bad upload, missing credential, a mandatory conversion stage failed).
//!   Returned as `Err(Pdf2DocxError)` from [`crate::Converter::submit`].
//!   Every variant belongs to exactly one [`ErrorKind`].
//!
//! * [`PreviewError`] — **Non-fatal**: preview generation failed. The job
//!   still succeeds with an empty preview list; the error is only logged.
//!
//! * [`ToolError`] — detail of a failed external subprocess. Wrapped by
//!   [`Pdf2DocxError::ExternalTool`] for mandatory stages and by
//!   [`PreviewError::Render`] for the preview stage.
//!
//! The Artifact Resolver has its own small error type,
//! [`crate::resolve::ResolveError`].

use crate::output::Stage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// User-visible failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad or missing upload. Rejected before any workspace exists.
    Validation,
    /// Missing credential or unusable configured path.
    Configuration,
    /// External converter/renderer missing, failed or timed out.
    ExternalTool,
    /// Remote analysis service unreachable or returned non-2xx.
    RemoteService,
    /// Workspace or disk I/O failure.
    Resource,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::Configuration => "configuration_error",
            ErrorKind::ExternalTool => "external_tool_error",
            ErrorKind::RemoteService => "remote_service_error",
            ErrorKind::Resource => "resource_error",
        };
        f.write_str(s)
    }
}

/// All fatal errors returned by the edgequake-pdf2docx library.
#[derive(Debug, Error)]
pub enum Pdf2DocxError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// The upload carried no filename.
    #[error("No file selected: the upload has an empty filename")]
    EmptyFilename,

    /// The filename does not carry a recognised document extension.
    #[error("Invalid file type '{filename}'. Please upload a PDF.")]
    UnsupportedFileType { filename: String },

    /// The upload is zero bytes long.
    #[error("Uploaded file '{filename}' is empty")]
    EmptyUpload { filename: String },

    /// The bytes do not start with the PDF signature.
    #[error("File '{filename}' is not a valid PDF\nFirst bytes: {magic:?}")]
    NotAPdf { filename: String, magic: Vec<u8> },

    /// The file name, or a name derived from it, exceeds what a filesystem
    /// can store in one path component.
    #[error("File name '{filename}' is too long ({len} bytes, at most {max} allowed)")]
    FilenameTooLong {
        filename: String,
        len: usize,
        max: usize,
    },

    // ── Configuration errors ──────────────────────────────────────────────
    /// A remote service needs a credential that was not configured.
    #[error("{service} API key is not configured.\nSet LANDING_AI_API_KEY or provide it in the config file.")]
    MissingCredential { service: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── External tool errors ──────────────────────────────────────────────
    /// A mandatory conversion stage failed in its external tool.
    #[error("{stage} failed: {source}")]
    ExternalTool {
        stage: Stage,
        #[source]
        source: ToolError,
    },

    // ── Remote service errors ─────────────────────────────────────────────
    /// The request could not be sent or the response could not be read.
    #[error("{service} request failed: {reason}")]
    RemoteRequestFailed { service: String, reason: String },

    /// The remote service answered with a non-2xx status.
    #[error("{service} returned HTTP {status}: {body}")]
    RemoteStatus {
        service: String,
        status: u16,
        body: String,
    },

    /// The remote call exceeded the configured timeout.
    #[error("{service} did not answer within {secs}s")]
    RemoteTimeout { service: String, secs: u64 },

    // ── Resource errors ───────────────────────────────────────────────────
    /// The workspace store root cannot be created or written.
    #[error("Workspace store '{root}' is not writable: {source}")]
    StoreUnavailable {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading or writing an artifact inside a workspace failed.
    #[error("Workspace I/O failed on '{path}': {source}")]
    WorkspaceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2DocxError {
    /// The user-visible classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Pdf2DocxError::EmptyFilename
            | Pdf2DocxError::UnsupportedFileType { .. }
            | Pdf2DocxError::EmptyUpload { .. }
            | Pdf2DocxError::NotAPdf { .. }
            | Pdf2DocxError::FilenameTooLong { .. } => ErrorKind::Validation,
            Pdf2DocxError::MissingCredential { .. } | Pdf2DocxError::InvalidConfig(_) => {
                ErrorKind::Configuration
            }
            Pdf2DocxError::ExternalTool { .. } => ErrorKind::ExternalTool,
            Pdf2DocxError::RemoteRequestFailed { .. }
            | Pdf2DocxError::RemoteStatus { .. }
            | Pdf2DocxError::RemoteTimeout { .. } => ErrorKind::RemoteService,
            Pdf2DocxError::StoreUnavailable { .. }
            | Pdf2DocxError::WorkspaceIo { .. }
            | Pdf2DocxError::Internal(_) => ErrorKind::Resource,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Pdf2DocxError::WorkspaceIo {
            path: path.into(),
            source,
        }
    }
}

/// Serialisable failure handed across the external interface.
///
/// Carries only the classification and the rendered message, never the
/// source chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&Pdf2DocxError> for JobFailure {
    fn from(e: &Pdf2DocxError) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// Failure of one external subprocess invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The executable does not exist or is not on `PATH`.
    #[error("'{program}' is not installed or not found in PATH")]
    NotFound { program: String },

    /// The process exceeded its wall-clock ceiling and was killed.
    #[error("'{program}' timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    /// The process exited unsuccessfully.
    #[error("'{program}' exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    /// The process finished but the expected output file is missing.
    #[error("'{program}' produced no output at '{path}'")]
    NoOutput { program: String, path: PathBuf },

    /// The process could not be launched for another reason.
    #[error("Failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// A non-fatal preview failure.
///
/// Logged by the orchestrator and collapsed to "no previews available".
#[derive(Debug, Error)]
pub enum PreviewError {
    /// Document→PDF rendering failed (missing binary, no output, timeout).
    #[error("Preview rendering failed: {0}")]
    Render(#[from] ToolError),

    /// The private scratch directory could not be prepared.
    #[error("Preview scratch space unavailable: {0}")]
    Scratch(#[source] std::io::Error),

    /// pdfium could not be loaded.
    #[error("Failed to bind to pdfium library: {0}")]
    PdfiumBinding(String),

    /// The intermediate PDF could not be opened or a page failed to render.
    #[error("Rasterisation failed for page {page}: {detail}")]
    Rasterisation { page: usize, detail: String },

    /// Writing a preview image into the workspace failed.
    #[error("Failed to write preview '{path}': {detail}")]
    WriteFailed { path: PathBuf, detail: String },

    /// Unexpected internal error (e.g. a blocking task panicked).
    #[error("Internal preview error: {0}")]
    Internal(String),
}
