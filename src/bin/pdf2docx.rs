//! CLI binary for edgequake-pdf2docx.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use edgequake_pdf2docx::{
    ArtifactResolver, ConversionConfig, ConversionProgressCallback, Converter, FsWorkspaceStore,
    JobFailure, JobId, PipelineKind, ProgressCallback, Stage, StageOutcome, StageStatus,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner naming the running stage, plus one
/// log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("validating upload…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_job_start(&self, job: &JobId, kind: PipelineKind) {
        self.bar.set_prefix("Converting");
        self.bar
            .println(format!("{} job {} ({} pipeline)", bold("◆"), dim(&job.to_string()), kind));
    }

    fn on_stage_start(&self, _job: &JobId, stage: Stage) {
        self.bar.set_message(format!("{stage}…"));
    }

    fn on_stage_complete(&self, _job: &JobId, outcome: &StageOutcome) {
        let timing = dim(&format!("{:.1}s", outcome.duration_ms as f64 / 1000.0));
        let line = match outcome.status {
            StageStatus::Completed => format!("  {} {:<24} {}", green("✓"), outcome.stage, timing),
            StageStatus::Degraded { ref reason } => format!(
                "  {} {:<24} {}  {}",
                yellow("⚠"),
                outcome.stage,
                timing,
                yellow(&truncate(reason, 80))
            ),
            StageStatus::Failed { kind } => format!(
                "  {} {:<24} {}  {}",
                red("✗"),
                outcome.stage,
                timing,
                red(&kind.to_string())
            ),
        };
        self.bar.println(line);
    }

    fn on_job_complete(&self, _job: &JobId, _success: bool) {
        self.bar.finish_and_clear();
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    } else {
        s.to_string()
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Digital PDF (has a text layer) → DOCX
  pdf2docx convert report.pdf

  # Scanned PDF through remote document analysis
  LANDING_AI_API_KEY=... pdf2docx convert --pipeline ocr scan.pdf

  # Copy the document and previews out of the workspace
  pdf2docx convert report.pdf --out-dir ./out

  # Machine-readable result
  pdf2docx convert --json report.pdf > result.json

  # Retrieve an artifact by job id and file name
  pdf2docx fetch 6f1c0a9e-0d7e-4c8b-9f3e-2b1d2c3e4f50 report_digital.docx -o report.docx

  # Reclaim workspaces older than ten minutes
  pdf2docx sweep --max-age 600

EXTERNAL TOOLS:
  pdf2docx   structural conversion (digital pipeline)
  pandoc     markdown → DOCX (ocr pipeline)
  soffice    DOCX → PDF for previews (LibreOffice)
  libpdfium  PDF → PNG previews

ENVIRONMENT VARIABLES:
  LANDING_AI_API_KEY      Credential for the document analysis service
  PDF2DOCX_STORE_ROOT     Workspace root directory
  PDF2DOCX_RENDERER       Path to the soffice executable
  PDFIUM_LIB_PATH         Path to an existing libpdfium
  RUST_LOG                Overrides the log filter
"#;

/// Convert PDF documents to DOCX with page previews.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2docx",
    version,
    about = "Convert PDF documents to DOCX with page previews",
    long_about = "Convert digital PDFs (structural conversion) or scanned PDFs (remote \
document analysis + markdown conversion) to DOCX. Every job runs in its own workspace \
directory; artifacts can be fetched by job id until the retention sweeper reclaims them.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Workspace root directory.
    #[arg(long, global = true, env = "PDF2DOCX_STORE_ROOT", default_value = "workspaces")]
    store_root: PathBuf,

    /// Retention age of workspaces in seconds.
    #[arg(long, global = true, env = "PDF2DOCX_TTL", default_value_t = 3600)]
    ttl: u64,

    /// Maximum number of preview pages (0–50).
    #[arg(long, global = true, env = "PDF2DOCX_MAX_PREVIEW_PAGES", default_value_t = 3,
          value_parser = clap::value_parser!(u64).range(0..=50))]
    max_preview_pages: u64,

    /// Document analysis API key.
    #[arg(long, global = true, env = "LANDING_AI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// JSON credential file: {"api_key": "..."}.
    #[arg(long, global = true, env = "PDF2DOCX_CONFIG")]
    config: Option<PathBuf>,

    /// Path to the soffice executable used for previews.
    #[arg(long, global = true, env = "PDF2DOCX_RENDERER")]
    renderer: Option<PathBuf>,

    /// Structural converter executable.
    #[arg(long, global = true, env = "PDF2DOCX_BIN", default_value = "pdf2docx")]
    pdf2docx_bin: PathBuf,

    /// Markup converter executable.
    #[arg(long, global = true, env = "PANDOC_BIN", default_value = "pandoc")]
    pandoc_bin: PathBuf,

    /// Path to libpdfium; the system library is used otherwise.
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Subprocess timeout in seconds.
    #[arg(long, global = true, env = "PDF2DOCX_TOOL_TIMEOUT", default_value_t = 300)]
    tool_timeout: u64,

    /// Document analysis timeout in seconds.
    #[arg(long, global = true, env = "PDF2DOCX_API_TIMEOUT", default_value_t = 300)]
    api_timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2DOCX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2DOCX_QUIET")]
    quiet: bool,

    /// Disable the progress spinner.
    #[arg(long, global = true, env = "PDF2DOCX_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a PDF file.
    Convert {
        /// Local PDF file.
        input: PathBuf,

        /// Conversion pipeline.
        #[arg(long, value_enum, default_value = "digital")]
        pipeline: PipelineArg,

        /// Copy the document and previews into this directory.
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Skip the retention sweep before the job.
        #[arg(long)]
        no_sweep: bool,

        /// Print the result (or failure) as JSON on stdout.
        #[arg(long)]
        json: bool,
    },

    /// Retrieve an artifact of a previous job.
    Fetch {
        job: String,
        file: String,

        /// Write here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete workspaces older than the retention age.
    Sweep {
        /// Override the retention age in seconds.
        #[arg(long)]
        max_age: Option<u64>,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PipelineArg {
    Digital,
    Ocr,
}

impl From<PipelineArg> for PipelineKind {
    fn from(v: PipelineArg) -> Self {
        match v {
            PipelineArg::Digital => PipelineKind::Structural,
            PipelineArg::Ocr => PipelineKind::Ocr,
        }
    }
}

/// `--config` file contents.
#[derive(Debug, Deserialize)]
struct CredentialFile {
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner provides the feedback while a conversion runs.
    let json = matches!(cli.command, Command::Convert { json: true, .. });
    let show_progress = !cli.quiet
        && !cli.no_progress
        && !json
        && matches!(cli.command, Command::Convert { .. });
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Convert {
            ref input,
            pipeline,
            ref out_dir,
            no_sweep,
            json,
        } => {
            let progress_cb: Option<ProgressCallback> = if show_progress {
                Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
            } else {
                None
            };
            let config = build_config(&cli, progress_cb, !no_sweep).await?;
            run_convert(&cli, config, input, pipeline.into(), out_dir.as_deref(), json).await
        }
        Command::Fetch {
            ref job,
            ref file,
            ref output,
        } => run_fetch(&cli, job, file, output.as_deref()).await,
        Command::Sweep { max_age } => {
            let store = FsWorkspaceStore::new(&cli.store_root);
            let max_age = Duration::from_secs(max_age.unwrap_or(cli.ttl));
            let report = edgequake_pdf2docx::sweep(&store, max_age).await;
            if !cli.quiet {
                eprintln!(
                    "{} {} workspace(s) scanned, {} removed, {} failed",
                    if report.failed == 0 { green("✔") } else { yellow("⚠") },
                    report.scanned,
                    bold(&report.removed.to_string()),
                    report.failed
                );
            }
            Ok(())
        }
    }
}

async fn run_convert(
    cli: &Cli,
    config: ConversionConfig,
    input: &Path,
    kind: PipelineKind,
    out_dir: Option<&Path>,
    json: bool,
) -> Result<()> {
    let bytes = tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read {:?}", input))?;
    let filename = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let converter = Converter::new(config).context("Invalid configuration")?;
    let result = match converter.submit(kind, &bytes, &filename).await {
        Ok(result) => result,
        Err(e) => {
            if json {
                let failure = JobFailure::from(&e);
                println!(
                    "{}",
                    serde_json::to_string_pretty(&failure).context("Failed to serialise failure")?
                );
            }
            return Err(anyhow::Error::new(e).context("Conversion failed"));
        }
    };

    if let Some(dir) = out_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {:?}", dir))?;
        let store = converter.store();
        for name in std::iter::once(&result.document).chain(result.previews.iter()) {
            let from = store.path_for(&result.job_id, name);
            let to = dir.join(name);
            tokio::fs::copy(&from, &to)
                .await
                .with_context(|| format!("Failed to copy {:?} to {:?}", from, to))?;
        }
    }

    if json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialise result")?;
        println!("{json}");
    } else {
        println!("{}", result.download_ref());
        for preview in result.preview_refs() {
            println!("{preview}");
        }
        if !cli.quiet {
            eprintln!(
                "{}  {}  {} preview(s)  {}ms",
                green("✔"),
                bold(&result.document),
                result.previews.len(),
                result.stats.total_duration_ms,
            );
        }
    }
    Ok(())
}

async fn run_fetch(cli: &Cli, job: &str, file: &str, output: Option<&Path>) -> Result<()> {
    let resolver = ArtifactResolver::new(Arc::new(FsWorkspaceStore::new(&cli.store_root)));
    let (artifact, mut reader) = resolver
        .open(job, file)
        .await
        .with_context(|| format!("Cannot fetch {job}/{file}"))?;

    let copied = match output {
        Some(path) => {
            let mut out = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create {:?}", path))?;
            tokio::io::copy(&mut reader, &mut out)
                .await
                .context("Failed to write artifact")?
        }
        None => tokio::io::copy(&mut reader, &mut tokio::io::stdout())
            .await
            .context("Failed to write to stdout")?,
    };

    if !cli.quiet {
        eprintln!(
            "{} {} bytes  {}  {}",
            green("✔"),
            copied,
            dim(artifact.content_type),
            dim(&artifact.content_disposition)
        );
    }
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
async fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
    sweep_on_submit: bool,
) -> Result<ConversionConfig> {
    let file_key = match cli.config {
        Some(ref path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config from {:?}", path))?;
            let parsed: CredentialFile = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid config file {:?}", path))?;
            parsed.api_key
        }
        None => None,
    };

    let mut builder = ConversionConfig::builder()
        .store_root(&cli.store_root)
        .retention_ttl(Duration::from_secs(cli.ttl))
        .sweep_on_submit(sweep_on_submit)
        .max_preview_pages(cli.max_preview_pages as usize)
        .structural_program(&cli.pdf2docx_bin)
        .markup_program(&cli.pandoc_bin)
        .tool_timeout(Duration::from_secs(cli.tool_timeout))
        .analyzer_timeout(Duration::from_secs(cli.api_timeout));

    // Flag / environment wins over the credential file.
    if let Some(key) = cli.api_key.clone().or(file_key) {
        builder = builder.analyzer_api_key(key);
    }
    if let Some(ref renderer) = cli.renderer {
        builder = builder.renderer_path(renderer);
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_library_path(lib);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
