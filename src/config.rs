//! Configuration types for PDF-to-DOCX conversion.
//!
//! Every knob the orchestrator, the workspace store, the sweeper and the
//! external tool adapters need lives in [`ConversionConfig`], built once at
//! startup via [`ConversionConfigBuilder`] and shared behind an `Arc`.
//! Pipeline code never reads environment variables or config files; the CLI
//! does that and hands the result in here.

use crate::error::Pdf2DocxError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default endpoint of the remote document-analysis service.
pub const DEFAULT_ANALYZER_URL: &str =
    "https://api.va.landing.ai/v1/tools/agentic-document-analysis";

/// Configuration for the conversion service.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdf2docx::ConversionConfig;
/// use std::time::Duration;
///
/// let config = ConversionConfig::builder()
///     .store_root("/var/lib/pdf2docx")
///     .retention_ttl(Duration::from_secs(1800))
///     .max_preview_pages(3)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Directory holding one sub-directory per job. Default: `./workspaces`.
    pub store_root: PathBuf,

    /// Workspaces untouched for longer than this are deleted. Default: 1 h.
    pub retention_ttl: Duration,

    /// Period of the background retention task. Default: 5 min.
    pub sweep_interval: Duration,

    /// Run a best-effort sweep before each submission. Default: true.
    pub sweep_on_submit: bool,

    /// Maximum number of preview images per job. Default: 3.
    pub max_preview_pages: usize,

    /// Width cap (and height cap) of a rendered preview in pixels. Default: 1200.
    pub max_rendered_pixels: u32,

    /// Credential for the document-analysis service.
    pub analyzer_api_key: Option<String>,

    /// Document-analysis endpoint. Default: [`DEFAULT_ANALYZER_URL`].
    pub analyzer_url: String,

    /// Timeout of the remote analysis call. Default: 300 s.
    ///
    /// Scanned documents of a few dozen pages routinely take more than a
    /// minute server-side.
    pub analyzer_timeout: Duration,

    /// Executable performing PDF→DOCX structural conversion. Default: `pdf2docx`.
    pub structural_program: PathBuf,

    /// Executable performing markdown→DOCX conversion. Default: `pandoc`.
    pub markup_program: PathBuf,

    /// Explicit path to the office renderer (`soffice`). If None, `soffice`
    /// is looked up on `PATH`.
    pub renderer_path: Option<PathBuf>,

    /// Explicit path to the pdfium shared library. If None, the system
    /// library is used.
    pub pdfium_library_path: Option<PathBuf>,

    /// Wall-clock ceiling for conversion subprocesses. Default: 300 s.
    pub tool_timeout: Duration,

    /// Wall-clock ceiling for the document→PDF renderer. Default: 120 s.
    pub render_timeout: Duration,

    /// Optional per-stage event sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            store_root: PathBuf::from("workspaces"),
            retention_ttl: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(300),
            sweep_on_submit: true,
            max_preview_pages: 3,
            max_rendered_pixels: 1200,
            analyzer_api_key: None,
            analyzer_url: DEFAULT_ANALYZER_URL.to_string(),
            analyzer_timeout: Duration::from_secs(300),
            structural_program: PathBuf::from("pdf2docx"),
            markup_program: PathBuf::from("pandoc"),
            renderer_path: None,
            pdfium_library_path: None,
            tool_timeout: Duration::from_secs(300),
            render_timeout: Duration::from_secs(120),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("store_root", &self.store_root)
            .field("retention_ttl", &self.retention_ttl)
            .field("sweep_interval", &self.sweep_interval)
            .field("sweep_on_submit", &self.sweep_on_submit)
            .field("max_preview_pages", &self.max_preview_pages)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field(
                "analyzer_api_key",
                &self.analyzer_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("analyzer_url", &self.analyzer_url)
            .field("analyzer_timeout", &self.analyzer_timeout)
            .field("structural_program", &self.structural_program)
            .field("markup_program", &self.markup_program)
            .field("renderer_path", &self.renderer_path)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("tool_timeout", &self.tool_timeout)
            .field("render_timeout", &self.render_timeout)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The renderer executable to launch.
    pub fn renderer_program(&self) -> PathBuf {
        self.renderer_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("soffice"))
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn store_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.store_root = root.into();
        self
    }

    pub fn retention_ttl(mut self, ttl: Duration) -> Self {
        self.config.retention_ttl = ttl;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    pub fn sweep_on_submit(mut self, v: bool) -> Self {
        self.config.sweep_on_submit = v;
        self
    }

    pub fn max_preview_pages(mut self, n: usize) -> Self {
        self.config.max_preview_pages = n.min(50);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn analyzer_api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.config.analyzer_api_key = if key.trim().is_empty() {
            None
        } else {
            Some(key)
        };
        self
    }

    pub fn analyzer_url(mut self, url: impl Into<String>) -> Self {
        self.config.analyzer_url = url.into();
        self
    }

    pub fn analyzer_timeout(mut self, timeout: Duration) -> Self {
        self.config.analyzer_timeout = timeout;
        self
    }

    pub fn structural_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.config.structural_program = program.into();
        self
    }

    pub fn markup_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.config.markup_program = program.into();
        self
    }

    pub fn renderer_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.renderer_path = Some(path.into());
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn tool_timeout(mut self, timeout: Duration) -> Self {
        self.config.tool_timeout = timeout;
        self
    }

    pub fn render_timeout(mut self, timeout: Duration) -> Self {
        self.config.render_timeout = timeout;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2DocxError> {
        let c = &self.config;
        if c.store_root.as_os_str().is_empty() {
            return Err(Pdf2DocxError::InvalidConfig(
                "store root must not be empty".into(),
            ));
        }
        if c.tool_timeout.is_zero() || c.render_timeout.is_zero() || c.analyzer_timeout.is_zero()
        {
            return Err(Pdf2DocxError::InvalidConfig(
                "timeouts must be greater than zero".into(),
            ));
        }
        if c.sweep_interval.is_zero() {
            return Err(Pdf2DocxError::InvalidConfig(
                "sweep interval must be greater than zero".into(),
            ));
        }
        if let Some(ref p) = c.renderer_path {
            if !p.is_file() {
                return Err(Pdf2DocxError::InvalidConfig(format!(
                    "renderer path '{}' does not exist",
                    p.display()
                )));
            }
        }
        if let Some(ref p) = c.pdfium_library_path {
            if !p.is_file() {
                return Err(Pdf2DocxError::InvalidConfig(format!(
                    "pdfium library '{}' does not exist",
                    p.display()
                )));
            }
        }
        Ok(self.config)
    }
}
