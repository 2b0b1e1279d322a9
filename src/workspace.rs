//! Workspace Store: one isolated directory per job.
//!
//! Job identity and state live entirely on the filesystem. A job's workspace
//! is always `store_root/<job id>`, never nested, and job ids are random v4
//! UUIDs, so concurrent requests are isolated by construction without any
//! in-memory registry or lock.
//!
//! The [`WorkspaceStore`] trait is the seam between the orchestrator and the
//! storage; [`FsWorkspaceStore`] is the directory-backed implementation.

use crate::error::Pdf2DocxError;
use crate::output::PipelineKind;
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::str::FromStr;
use std::time::SystemTime;
use thiserror::Error;
use tokio_stream::wrappers::ReadDirStream;
use tracing::{debug, info};
use uuid::Uuid;

/// Opaque job identifier; doubles as the workspace directory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// A string that is not a canonical job id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid job id '{0}'")]
pub struct InvalidJobId(pub String);

impl FromStr for JobId {
    type Err = InvalidJobId;

    /// Accepts only the lowercase hyphenated form used for directory names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Uuid::parse_str(s) {
            // Braced, URN, simple and upper-case spellings name no directory.
            Ok(id) if id.hyphenated().to_string() == s => Ok(Self(id)),
            _ => Err(InvalidJobId(s.to_string())),
        }
    }
}

/// A freshly allocated job.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub created_at: SystemTime,
    /// Sanitised upload file name.
    pub original_filename: String,
    pub kind: PipelineKind,
    /// Absolute or store-relative path of the workspace directory.
    pub dir: PathBuf,
}

/// One existing workspace as seen by [`WorkspaceStore::list`].
#[derive(Debug, Clone)]
pub struct WorkspaceEntry {
    pub job_id: JobId,
    pub path: PathBuf,
    /// Newest modification time of the directory and its direct children.
    pub last_modified: SystemTime,
}

/// A lazily evaluated listing of workspaces.
pub type WorkspaceStream = Pin<Box<dyn Stream<Item = WorkspaceEntry> + Send>>;

/// Storage of per-job workspaces.
#[async_trait]
pub trait WorkspaceStore: Send + Sync {
    /// Root directory under which all workspaces live.
    fn root(&self) -> &Path;

    /// Create a new job with a unique id and an empty workspace.
    async fn allocate(
        &self,
        original_filename: &str,
        kind: PipelineKind,
    ) -> Result<Job, Pdf2DocxError>;

    /// Compose the path of `filename` inside the job's workspace.
    ///
    /// Pure path arithmetic: nothing is checked on disk.
    fn path_for(&self, job: &JobId, filename: &str) -> PathBuf {
        self.workspace_dir(job).join(filename)
    }

    fn workspace_dir(&self, job: &JobId) -> PathBuf {
        self.root().join(job.to_string())
    }

    /// Enumerate existing workspaces.
    ///
    /// Workspaces created while the stream is consumed may or may not appear.
    /// Calling `list` again restarts the enumeration.
    async fn list(&self) -> Result<WorkspaceStream, Pdf2DocxError>;

    /// Delete a workspace. Returns `false` if it was already gone.
    async fn remove(&self, job: &JobId) -> Result<bool, Pdf2DocxError>;
}

/// Directory-backed [`WorkspaceStore`].
#[derive(Debug, Clone)]
pub struct FsWorkspaceStore {
    root: PathBuf,
}

impl FsWorkspaceStore {
    /// Create a store rooted at `root`. The directory is created lazily on
    /// the first allocation.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl WorkspaceStore for FsWorkspaceStore {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn allocate(
        &self,
        original_filename: &str,
        kind: PipelineKind,
    ) -> Result<Job, Pdf2DocxError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Pdf2DocxError::StoreUnavailable {
                root: self.root.clone(),
                source: e,
            })?;

        // A v4 collision is practically impossible; `create_dir` (not
        // `create_dir_all`) still refuses to reuse an existing directory.
        for _ in 0..3 {
            let id = JobId::new();
            let dir = self.workspace_dir(&id);
            match tokio::fs::create_dir(&dir).await {
                Ok(()) => {
                    info!("Allocated workspace {} for '{}'", id, original_filename);
                    return Ok(Job {
                        id,
                        created_at: SystemTime::now(),
                        original_filename: original_filename.to_string(),
                        kind,
                        dir,
                    });
                }
                Err(e) if e.kind() == IoErrorKind::AlreadyExists => {
                    debug!("Workspace {} already exists, drawing a new id", id);
                }
                Err(e) => {
                    return Err(Pdf2DocxError::StoreUnavailable {
                        root: self.root.clone(),
                        source: e,
                    })
                }
            }
        }

        Err(Pdf2DocxError::Internal(
            "could not allocate a unique workspace id".into(),
        ))
    }

    async fn list(&self) -> Result<WorkspaceStream, Pdf2DocxError> {
        let read_dir = match tokio::fs::read_dir(&self.root).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                return Ok(Box::pin(futures::stream::empty()));
            }
            Err(e) => return Err(Pdf2DocxError::io(&self.root, e)),
        };

        let stream = ReadDirStream::new(read_dir).filter_map(|entry| async move {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable store entry: {}", e);
                    return None;
                }
            };
            let job_id: JobId = entry.file_name().to_str()?.parse().ok()?;
            // Vanished between read_dir and stat: nothing to report.
            let meta = entry.metadata().await.ok()?;
            if !meta.is_dir() {
                return None;
            }
            let path = entry.path();
            let last_modified = newest_mtime(&path, meta.modified().ok()?).await;
            Some(WorkspaceEntry {
                job_id,
                path,
                last_modified,
            })
        });

        Ok(Box::pin(stream))
    }

    async fn remove(&self, job: &JobId) -> Result<bool, Pdf2DocxError> {
        let dir = self.workspace_dir(job);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(false),
            Err(e) => Err(Pdf2DocxError::io(dir, e)),
        }
    }
}

/// Newest of `dir_mtime` and the modification times of `dir`'s children.
///
/// Writing into an existing file does not touch the directory's own mtime,
/// so the children are consulted too.
async fn newest_mtime(dir: &Path, dir_mtime: SystemTime) -> SystemTime {
    let mut newest = dir_mtime;
    let Ok(mut rd) = tokio::fs::read_dir(dir).await else {
        return newest;
    };
    while let Ok(Some(child)) = rd.next_entry().await {
        if let Ok(modified) = child.metadata().await.and_then(|m| m.modified()) {
            newest = newest.max(modified);
        }
    }
    newest
}
