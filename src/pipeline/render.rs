//! Preview generation: DOCX → PDF (office renderer) → PNG pages (pdfium).
//!
//! ## Scratch space
//!
//! The intermediate PDF never touches the job's workspace. Each call gets a
//! private `TempDir` that is removed before returning, success or failure.
//! The renderer works on a copy of the document inside that directory, so
//! the office suite's lock files never land next to the caller's document,
//! and it gets its own profile directory so concurrent renders do not
//! contend for a shared user installation.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which is CPU-bound and not
//! async-safe. Rasterisation runs on the blocking pool so Tokio worker
//! threads keep serving other jobs.
//!
//! Every failure here is a [`PreviewError`]: a missing preview degrades the
//! result, it never fails the job.

use crate::config::ConversionConfig;
use crate::error::PreviewError;
use crate::pipeline::input::preview_filename;
use crate::pipeline::tool::{ensure_output, ensure_success, run_tool};
use async_trait::async_trait;
use image::ImageFormat;
use pdfium_render::prelude::*;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Produces page images of a finished document.
#[async_trait]
pub trait PreviewRenderer: Send + Sync {
    /// Write up to `max_pages` page images of `document` into `out_dir` and
    /// return their file names in page order.
    async fn render_previews(
        &self,
        document: &Path,
        out_dir: &Path,
        max_pages: usize,
    ) -> Result<Vec<String>, PreviewError>;
}

/// Headless office suite used as the document→PDF renderer.
#[derive(Debug, Clone)]
pub struct OfficeRenderer {
    program: PathBuf,
    timeout: Duration,
}

impl OfficeRenderer {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn args(profile: &Path, out_dir: &Path, input: &Path) -> Vec<OsString> {
        let profile_url = reqwest::Url::from_directory_path(profile)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| format!("file://{}", profile.display()));
        vec![
            format!("-env:UserInstallation={profile_url}").into(),
            "--headless".into(),
            "--norestore".into(),
            "--convert-to".into(),
            "pdf".into(),
            "--outdir".into(),
            out_dir.as_os_str().to_owned(),
            input.as_os_str().to_owned(),
        ]
    }

    /// Render `document` to a PDF inside `scratch` and return its path.
    ///
    /// A non-zero exit is tolerated when the PDF still materialises; the
    /// office suite exits non-zero on harmless profile warnings.
    pub async fn render_pdf(&self, document: &Path, scratch: &Path) -> Result<PathBuf, PreviewError> {
        let name = document
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from("document.docx"));
        let src_dir = scratch.join("src");
        let out_dir = scratch.join("out");
        for dir in [&src_dir, &out_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(PreviewError::Scratch)?;
        }
        let input = src_dir.join(&name);
        tokio::fs::copy(document, &input)
            .await
            .map_err(PreviewError::Scratch)?;

        let args = Self::args(&scratch.join("profile"), &out_dir, &input);
        let output = run_tool(&self.program, args, self.timeout).await?;

        let expected = out_dir.join(Path::new(&name).with_extension("pdf"));
        match ensure_output(&self.program, &expected).await {
            Ok(()) => {
                if !output.status.success() {
                    warn!(
                        "'{}' exited with {} but produced '{}'; continuing",
                        self.program.display(),
                        output.status,
                        expected.display()
                    );
                }
                Ok(expected)
            }
            Err(no_output) => {
                ensure_success(&self.program, &output)?;
                Err(no_output.into())
            }
        }
    }
}

/// Rasterises PDF pages to PNG files via pdfium.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    library_path: Option<PathBuf>,
    max_pixels: u32,
}

impl PdfiumRasterizer {
    pub fn new(library_path: Option<PathBuf>, max_pixels: u32) -> Self {
        Self {
            library_path,
            max_pixels,
        }
    }

    /// Rasterise the first `max_pages` pages of `pdf` into `out_dir`.
    pub async fn rasterize(
        &self,
        pdf: &Path,
        out_dir: &Path,
        max_pages: usize,
    ) -> Result<Vec<String>, PreviewError> {
        let this = self.clone();
        let pdf = pdf.to_path_buf();
        let out_dir = out_dir.to_path_buf();

        tokio::task::spawn_blocking(move || this.rasterize_blocking(&pdf, &out_dir, max_pages))
            .await
            .map_err(|e| PreviewError::Internal(format!("Rasterise task panicked: {e}")))?
    }

    fn bind(&self) -> Result<Pdfium, PreviewError> {
        let bindings = match self.library_path {
            Some(ref path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| PreviewError::PdfiumBinding(format!("{e:?}")))?;
        Ok(Pdfium::new(bindings))
    }

    /// Blocking implementation of page rasterisation.
    fn rasterize_blocking(
        &self,
        pdf: &Path,
        out_dir: &Path,
        max_pages: usize,
    ) -> Result<Vec<String>, PreviewError> {
        let pdfium = self.bind()?;
        let document =
            pdfium
                .load_pdf_from_file(pdf, None)
                .map_err(|e| PreviewError::Rasterisation {
                    page: 0,
                    detail: format!("{e:?}"),
                })?;

        let render_config = PdfRenderConfig::new()
            .set_target_width(self.max_pixels as i32)
            .set_maximum_height(self.max_pixels as i32);

        let mut written: Vec<String> = Vec::with_capacity(max_pages);
        let result = (|| -> Result<(), PreviewError> {
            for (idx, page) in document.pages().iter().take(max_pages).enumerate() {
                let page_num = idx + 1;
                let bitmap = page.render_with_config(&render_config).map_err(|e| {
                    PreviewError::Rasterisation {
                        page: page_num,
                        detail: format!("{e:?}"),
                    }
                })?;
                let image = bitmap.as_image();
                let name = preview_filename(page_num);
                let path = out_dir.join(&name);
                image
                    .save_with_format(&path, ImageFormat::Png)
                    .map_err(|e| PreviewError::WriteFailed {
                        path: path.clone(),
                        detail: e.to_string(),
                    })?;
                debug!(
                    "Preview page {} → {}x{} px",
                    page_num,
                    image.width(),
                    image.height()
                );
                written.push(name);
            }
            Ok(())
        })();

        if let Err(e) = result {
            // Half a preview set is worse than none.
            for name in &written {
                if let Err(rm) = std::fs::remove_file(out_dir.join(name)) {
                    warn!("Could not remove partial preview '{}': {}", name, rm);
                }
            }
            return Err(e);
        }
        Ok(written)
    }
}

/// [`PreviewRenderer`] chaining [`OfficeRenderer`] and [`PdfiumRasterizer`].
#[derive(Debug, Clone)]
pub struct OfficePreviewRenderer {
    renderer: OfficeRenderer,
    rasterizer: PdfiumRasterizer,
}

impl OfficePreviewRenderer {
    pub fn new(renderer: OfficeRenderer, rasterizer: PdfiumRasterizer) -> Self {
        Self {
            renderer,
            rasterizer,
        }
    }

    pub fn from_config(config: &ConversionConfig) -> Self {
        Self::new(
            OfficeRenderer::new(config.renderer_program(), config.render_timeout),
            PdfiumRasterizer::new(config.pdfium_library_path.clone(), config.max_rendered_pixels),
        )
    }
}

#[async_trait]
impl PreviewRenderer for OfficePreviewRenderer {
    async fn render_previews(
        &self,
        document: &Path,
        out_dir: &Path,
        max_pages: usize,
    ) -> Result<Vec<String>, PreviewError> {
        if max_pages == 0 {
            return Ok(Vec::new());
        }
        let scratch = tempfile::Builder::new()
            .prefix("pdf2docx-preview-")
            .tempdir()
            .map_err(PreviewError::Scratch)?;

        let result = async {
            let pdf = self.renderer.render_pdf(document, scratch.path()).await?;
            self.rasterizer.rasterize(&pdf, out_dir, max_pages).await
        }
        .await;

        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            warn!(
                "Failed to remove preview scratch '{}': {}",
                scratch_path.display(),
                e
            );
        }

        let mut names = result?;
        names.truncate(max_pages);
        info!("Rendered {} preview page(s) of '{}'", names.len(), document.display());
        Ok(names)
    }
}
