//! Progress-callback trait for per-stage conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the orchestrator drives each job through its pipeline.
//!
//! Callers can forward events to a channel, a WebSocket, or a terminal
//! spinner without the library knowing how the host application
//! communicates. Jobs run concurrently, so the trait is `Send + Sync` and
//! every event carries the job id.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2docx::{ConversionConfig, ConversionProgressCallback, JobId, StageOutcome};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct StageCounter(AtomicUsize);
//!
//! impl ConversionProgressCallback for StageCounter {
//!     fn on_stage_complete(&self, _job: &JobId, _outcome: &StageOutcome) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(StageCounter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{PipelineKind, Stage, StageOutcome};
use crate::workspace::JobId;
use std::sync::Arc;

/// Called by the orchestrator as a job moves through its stages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events for different jobs may interleave.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once the workspace is allocated, before the first stage.
    fn on_job_start(&self, job: &JobId, kind: PipelineKind) {
        let _ = (job, kind);
    }

    /// Called just before a stage runs.
    fn on_stage_start(&self, job: &JobId, stage: Stage) {
        let _ = (job, stage);
    }

    /// Called after a stage ends, whatever its status.
    fn on_stage_complete(&self, job: &JobId, outcome: &StageOutcome) {
        let _ = (job, outcome);
    }

    /// Called once when the job succeeded (`true`) or was aborted (`false`).
    fn on_job_complete(&self, job: &JobId, success: bool) {
        let _ = (job, success);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
