//! Artifact Resolver: `(job id, filename)` → a file inside exactly one
//! workspace, for read-only retrieval.
//!
//! Both inputs are screened for separators and traversal sequences before any
//! path is composed, and the composed path is canonicalised and checked to lie
//! inside the job's canonical workspace, which in turn must lie inside the
//! canonical store root. A symbolic link pointing anywhere else is
//! `Forbidden`, never followed.

use crate::workspace::{JobId, WorkspaceStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Why an artifact could not be served.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Artifact not found")]
    NotFound,

    #[error("Access forbidden: {reason}")]
    Forbidden { reason: String },
}

impl ResolveError {
    fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }
}

/// A file that is safe to stream back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    /// Canonical path of the file.
    pub path: PathBuf,
    pub content_type: &'static str,
    /// Ready-to-send `Content-Disposition` header value.
    pub content_disposition: String,
    pub len: u64,
}

/// Content type for a file, from its extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("doc") => "application/msword",
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("json") => "application/json",
        Some("md") => "text/markdown; charset=utf-8",
        _ => "application/octet-stream",
    }
}

fn content_disposition(filename: &str, content_type: &str) -> String {
    let disposition = if content_type.starts_with("image/") {
        "inline"
    } else {
        "attachment"
    };
    let quoted = filename.replace('\\', "\\\\").replace('"', "\\\"");
    format!("{disposition}; filename=\"{quoted}\"")
}

/// Reject anything that could address more than one path component.
fn check_component(value: &str, what: &str) -> Result<(), ResolveError> {
    if value.is_empty() {
        return Err(ResolveError::forbidden(format!("empty {what}")));
    }
    if value.contains(['/', '\\', '\0', ':']) {
        return Err(ResolveError::forbidden(format!(
            "{what} contains a path separator"
        )));
    }
    if value.contains("..") || value == "." {
        return Err(ResolveError::forbidden(format!(
            "{what} contains a traversal sequence"
        )));
    }
    Ok(())
}

async fn canonical(path: &Path) -> Result<PathBuf, ResolveError> {
    tokio::fs::canonicalize(path)
        .await
        .map_err(|_| ResolveError::NotFound)
}

/// Resolves artifact references against a [`WorkspaceStore`].
#[derive(Clone)]
pub struct ArtifactResolver {
    store: Arc<dyn WorkspaceStore>,
}

impl ArtifactResolver {
    pub fn new(store: Arc<dyn WorkspaceStore>) -> Self {
        Self { store }
    }

    /// Resolve `filename` inside the workspace of `job_id`.
    pub async fn resolve(
        &self,
        job_id: &str,
        filename: &str,
    ) -> Result<ResolvedArtifact, ResolveError> {
        check_component(job_id, "job id")?;
        check_component(filename, "filename")?;
        // Only canonical ids name a workspace directory.
        let job: JobId = job_id.parse().map_err(|_| ResolveError::NotFound)?;

        let root = canonical(self.store.root()).await?;
        let workspace = canonical(&self.store.workspace_dir(&job)).await?;
        if !workspace.starts_with(&root) || workspace == root {
            warn!("Workspace {} resolves outside the store root", job);
            return Err(ResolveError::forbidden("workspace outside store root"));
        }

        let candidate = self.store.path_for(&job, filename);
        let path = canonical(&candidate).await?;
        if !path.starts_with(&workspace) || path == workspace {
            warn!(
                "Refusing '{}': resolves outside workspace {}",
                candidate.display(),
                job
            );
            return Err(ResolveError::forbidden("path escapes the workspace"));
        }

        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|_| ResolveError::NotFound)?;
        if !meta.is_file() {
            return Err(ResolveError::NotFound);
        }

        let content_type = content_type_for(&path);
        debug!("Resolved {}/{} → {}", job, filename, path.display());
        Ok(ResolvedArtifact {
            content_disposition: content_disposition(filename, content_type),
            content_type,
            len: meta.len(),
            path,
        })
    }

    /// Resolve and open the artifact for streaming.
    pub async fn open(
        &self,
        job_id: &str,
        filename: &str,
    ) -> Result<(ResolvedArtifact, tokio::fs::File), ResolveError> {
        let artifact = self.resolve(job_id, filename).await?;
        let file = tokio::fs::File::open(&artifact.path)
            .await
            .map_err(|_| ResolveError::NotFound)?;
        Ok((artifact, file))
    }
}
