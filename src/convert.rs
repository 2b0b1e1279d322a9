//! Conversion Orchestrator.
//!
//! [`Converter::submit`] is the primary entry point of the library. It
//! validates the upload, allocates a workspace, drives the selected pipeline
//! stage by stage, then asks for previews of the finished document.
//!
//! ## Fatal vs. degraded
//!
//! Validation and configuration problems are rejected before a workspace is
//! allocated. A failed mandatory stage aborts the job: its workspace is
//! removed and the error is returned. Two stages degrade instead of failing:
//! markdown assembly (unexpected analysis payload → empty markdown) and
//! preview generation (any failure → no previews).
//!
//! Intermediate artifacts of a successful job stay in the workspace until
//! the Retention Sweeper reclaims it, so downloads and previews can be
//! fetched again after `submit` returns.

use crate::config::ConversionConfig;
use crate::error::{Pdf2DocxError, ToolError};
use crate::output::{
    ConversionResult, ConversionStats, PipelineKind, Stage, StageOutcome, StageStatus,
};
use crate::pipeline::analyze::{DocumentAnalyzer, LandingAiAnalyzer};
use crate::pipeline::assemble::assemble_file;
use crate::pipeline::input::{self, ANALYSIS_FILENAME, MARKDOWN_FILENAME};
use crate::pipeline::markup::{MarkupConverter, PandocConverter};
use crate::pipeline::render::{OfficePreviewRenderer, PreviewRenderer};
use crate::pipeline::structural::{Pdf2DocxCli, StructuralConverter};
use crate::pipeline::tool;
use crate::progress::ProgressCallback;
use crate::resolve::ArtifactResolver;
use crate::sweep::{self, SweepReport};
use crate::workspace::{FsWorkspaceStore, Job, JobId, WorkspaceStore};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Runs conversion jobs against a workspace store and a set of adapters.
///
/// Cheap to clone; every clone shares the same store and adapters, so one
/// `Converter` can serve any number of concurrent `submit` calls.
#[derive(Clone)]
pub struct Converter {
    config: Arc<ConversionConfig>,
    store: Arc<dyn WorkspaceStore>,
    structural: Arc<dyn StructuralConverter>,
    analyzer: Arc<dyn DocumentAnalyzer>,
    markup: Arc<dyn MarkupConverter>,
    previews: Arc<dyn PreviewRenderer>,
}

impl Converter {
    /// Build a converter with the default filesystem store and the external
    /// tool adapters named in `config`.
    pub fn new(config: ConversionConfig) -> Result<Self, Pdf2DocxError> {
        let store = Arc::new(FsWorkspaceStore::new(config.store_root.clone()));
        let structural = Arc::new(Pdf2DocxCli::new(
            config.structural_program.clone(),
            config.tool_timeout,
        ));
        let analyzer = Arc::new(LandingAiAnalyzer::from_config(&config)?);
        let markup = Arc::new(PandocConverter::new(
            config.markup_program.clone(),
            config.tool_timeout,
        ));
        let previews = Arc::new(OfficePreviewRenderer::from_config(&config));

        Ok(Self {
            config: Arc::new(config),
            store,
            structural,
            analyzer,
            markup,
            previews,
        })
    }

    pub fn with_store(mut self, store: Arc<dyn WorkspaceStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_structural_converter(mut self, converter: Arc<dyn StructuralConverter>) -> Self {
        self.structural = converter;
        self
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn DocumentAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_markup_converter(mut self, converter: Arc<dyn MarkupConverter>) -> Self {
        self.markup = converter;
        self
    }

    pub fn with_preview_renderer(mut self, renderer: Arc<dyn PreviewRenderer>) -> Self {
        self.previews = renderer;
        self
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn WorkspaceStore> {
        Arc::clone(&self.store)
    }

    /// A resolver over this converter's store.
    pub fn resolver(&self) -> ArtifactResolver {
        ArtifactResolver::new(self.store())
    }

    /// One retention pass with the configured TTL.
    pub async fn sweep(&self) -> SweepReport {
        sweep::sweep(self.store.as_ref(), self.config.retention_ttl).await
    }

    /// Start the periodic retention task with the configured TTL and interval.
    pub fn spawn_retention_task(&self) -> JoinHandle<()> {
        sweep::spawn_retention_task(
            self.store(),
            self.config.retention_ttl,
            self.config.sweep_interval,
        )
    }

    /// Convert one uploaded PDF.
    ///
    /// # Errors
    /// Returns `Err(Pdf2DocxError)` when no document could be produced. Use
    /// [`Pdf2DocxError::kind`] for the user-visible classification. A failed
    /// job leaves no workspace behind.
    pub async fn submit(
        &self,
        kind: PipelineKind,
        bytes: &[u8],
        filename: &str,
    ) -> Result<ConversionResult, Pdf2DocxError> {
        let total_start = Instant::now();

        // ── Preconditions: nothing touches the store before these pass ─────
        let source_name = input::validate_upload(filename, bytes)?;
        if kind == PipelineKind::Ocr {
            self.analyzer.check_ready()?;
        }

        // Runs before allocation, so it can never reclaim this job's workspace.
        if self.config.sweep_on_submit {
            self.sweep().await;
        }

        let job = self.store.allocate(&source_name, kind).await?;
        info!("Job {} started: {} pipeline for '{}'", job.id, kind, source_name);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_job_start(&job.id, kind);
        }

        let mut tracker = StageTracker::new(job.id, self.config.progress_callback.as_ref());
        let document = match self.run_pipeline(&job, bytes, &mut tracker).await {
            Ok(document) => document,
            Err(e) => {
                error!("Job {} failed ({}): {}", job.id, e.kind(), e);
                self.discard(&job).await;
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_job_complete(&job.id, false);
                }
                return Err(e);
            }
        };

        let previews = self
            .generate_previews(&job, &job.dir.join(&document), &mut tracker)
            .await;

        let stats = ConversionStats {
            stages: tracker.into_outcomes(),
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };
        info!(
            "Job {} complete: '{}' with {} preview(s) in {}ms",
            job.id,
            document,
            previews.len(),
            stats.total_duration_ms
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_job_complete(&job.id, true);
        }

        Ok(ConversionResult {
            job_id: job.id,
            pipeline: kind,
            original_filename: job.original_filename,
            document,
            previews,
            stats,
        })
    }

    /// Run the job's mandatory stages; returns the output document's name.
    async fn run_pipeline(
        &self,
        job: &Job,
        bytes: &[u8],
        tracker: &mut StageTracker<'_>,
    ) -> Result<String, Pdf2DocxError> {
        let source = job.dir.join(&job.original_filename);
        tracker
            .run(Stage::Persist, async {
                tokio::fs::write(&source, bytes)
                    .await
                    .map_err(|e| Pdf2DocxError::io(&source, e))
            })
            .await?;

        let document = input::output_filename(&job.original_filename, job.kind);
        let output = job.dir.join(&document);

        match job.kind {
            PipelineKind::Structural => {
                tracker
                    .run(Stage::StructuralConvert, async {
                        let converted = self.structural.convert(&source, &output).await;
                        checked_conversion(Stage::StructuralConvert, converted, &output).await
                    })
                    .await?;
            }
            PipelineKind::Ocr => {
                let analysis = job.dir.join(ANALYSIS_FILENAME);
                tracker
                    .run(Stage::Analyze, self.analyze_to(&source, &analysis))
                    .await?;

                let markdown = job.dir.join(MARKDOWN_FILENAME);
                let started = tracker.start(Stage::Assemble);
                match assemble_file(&analysis, &markdown).await {
                    Ok(assembly) => {
                        let status = match assembly.degraded {
                            Some(reason) => StageStatus::Degraded { reason },
                            None => StageStatus::Completed,
                        };
                        tracker.finish(Stage::Assemble, started, status);
                    }
                    Err(e) => {
                        tracker.finish(
                            Stage::Assemble,
                            started,
                            StageStatus::Failed { kind: e.kind() },
                        );
                        return Err(e);
                    }
                }

                tracker
                    .run(Stage::MarkupConvert, async {
                        let converted = self.markup.convert(&markdown, &output).await;
                        checked_conversion(Stage::MarkupConvert, converted, &output).await
                    })
                    .await?;
            }
        }

        Ok(document)
    }

    /// Analyse `source` and store the payload, pretty-printed, at `analysis`.
    async fn analyze_to(&self, source: &Path, analysis: &Path) -> Result<(), Pdf2DocxError> {
        let payload = self.analyzer.analyze(source).await?;
        let pretty = serde_json::to_vec_pretty(&payload)
            .map_err(|e| Pdf2DocxError::Internal(format!("serialise analysis payload: {e}")))?;
        tokio::fs::write(analysis, pretty)
            .await
            .map_err(|e| Pdf2DocxError::io(analysis, e))?;
        debug!("Analysis payload stored at '{}'", analysis.display());
        Ok(())
    }

    /// Preview stage. Never fails the job.
    async fn generate_previews(
        &self,
        job: &Job,
        document: &Path,
        tracker: &mut StageTracker<'_>,
    ) -> Vec<String> {
        let max = self.config.max_preview_pages;
        let started = tracker.start(Stage::Preview);
        match self.previews.render_previews(document, &job.dir, max).await {
            Ok(mut names) => {
                if names.len() > max {
                    // Only the capped set is ever referenced; drop the rest.
                    for extra in names.split_off(max) {
                        if input::sanitize_filename(&extra).as_deref() == Some(extra.as_str()) {
                            if let Err(e) = tokio::fs::remove_file(job.dir.join(&extra)).await {
                                debug!(
                                    "Job {}: could not remove surplus preview '{}': {}",
                                    job.id, extra, e
                                );
                            }
                        }
                    }
                }
                tracker.finish(Stage::Preview, started, StageStatus::Completed);
                names
            }
            Err(e) => {
                warn!("Job {}: previews unavailable: {}", job.id, e);
                tracker.finish(
                    Stage::Preview,
                    started,
                    StageStatus::Degraded {
                        reason: e.to_string(),
                    },
                );
                Vec::new()
            }
        }
    }

    /// Best-effort removal of a failed job's workspace.
    async fn discard(&self, job: &Job) {
        match self.store.remove(&job.id).await {
            Ok(_) => debug!("Removed workspace of failed job {}", job.id),
            Err(e) => warn!("Could not remove workspace of failed job {}: {}", job.id, e),
        }
    }
}

/// Map a converter's result to a stage error and require the document it
/// was asked to write. A converter that reports success without leaving a
/// non-empty file behind fails the stage.
async fn checked_conversion(
    stage: Stage,
    converted: Result<(), ToolError>,
    output: &Path,
) -> Result<(), Pdf2DocxError> {
    let label = stage.to_string();
    match converted {
        Ok(()) => tool::ensure_output(Path::new(&label), output).await,
        Err(e) => Err(e),
    }
    .map_err(|source| Pdf2DocxError::ExternalTool { stage, source })
}

/// Per-job stage bookkeeping and progress events.
struct StageTracker<'a> {
    job: JobId,
    callback: Option<&'a ProgressCallback>,
    outcomes: Vec<StageOutcome>,
}

impl<'a> StageTracker<'a> {
    fn new(job: JobId, callback: Option<&'a ProgressCallback>) -> Self {
        Self {
            job,
            callback,
            outcomes: Vec::new(),
        }
    }

    fn start(&self, stage: Stage) -> Instant {
        debug!("Job {}: {} started", self.job, stage);
        if let Some(cb) = self.callback {
            cb.on_stage_start(&self.job, stage);
        }
        Instant::now()
    }

    fn finish(&mut self, stage: Stage, started: Instant, status: StageStatus) {
        let outcome = StageOutcome {
            stage,
            status,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            "Job {}: {} finished in {}ms ({:?})",
            self.job, stage, outcome.duration_ms, outcome.status
        );
        if let Some(cb) = self.callback {
            cb.on_stage_complete(&self.job, &outcome);
        }
        self.outcomes.push(outcome);
    }

    /// Run a mandatory stage: any error is recorded as `Failed` and returned.
    async fn run<T, F>(&mut self, stage: Stage, fut: F) -> Result<T, Pdf2DocxError>
    where
        F: Future<Output = Result<T, Pdf2DocxError>>,
    {
        let started = self.start(stage);
        let result = fut.await;
        let status = match result {
            Ok(_) => StageStatus::Completed,
            Err(ref e) => StageStatus::Failed { kind: e.kind() },
        };
        self.finish(stage, started, status);
        result
    }

    fn into_outcomes(self) -> Vec<StageOutcome> {
        self.outcomes
    }
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("config", &self.config)
            .field("store_root", &PathBuf::from(self.store.root()))
            .finish_non_exhaustive()
    }
}
