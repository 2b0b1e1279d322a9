//! End-to-end integration tests for edgequake-pdf2docx.
//!
//! Most tests drive the real `Converter` against a temporary workspace store
//! with in-process fakes standing in for the external tools and `wiremock`
//! standing in for the document analysis service.
//!
//! Tests that need the real tool chain (pdf2docx, pandoc, soffice,
//! libpdfium) and PDFs in `./test_cases/` are gated behind the
//! `E2E_ENABLED` environment variable so they do not run in CI unless
//! explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture

use async_trait::async_trait;
use edgequake_pdf2docx::{
    ConversionConfig, ConversionProgressCallback, Converter, ErrorKind, JobId, MarkupConverter,
    Pdf2DocxError, PipelineKind, PreviewError, PreviewRenderer, ResolveError, Stage,
    StageOutcome, StageStatus, StructuralConverter, ToolError, WorkspaceStore,
};
use futures::StreamExt;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PDF: &[u8] = b"%PDF-1.7\n1 0 obj << >> endobj\n%%EOF\n";

// ── Fakes ────────────────────────────────────────────────────────────────────

/// Writes a placeholder document, or fails like a crashed converter.
/// With `silent`, it reports success but writes nothing.
#[derive(Default)]
struct FakeStructural {
    fail: bool,
    silent: bool,
    sources: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl StructuralConverter for FakeStructural {
    async fn convert(&self, source: &Path, output: &Path) -> Result<(), ToolError> {
        self.sources.lock().unwrap().push(source.to_path_buf());
        if self.fail {
            return Err(ToolError::Failed {
                program: "pdf2docx".into(),
                status: "exit status: 1".into(),
                stderr: "PDF is encrypted".into(),
            });
        }
        assert!(tokio::fs::metadata(source).await.is_ok(), "source must be persisted first");
        if self.silent {
            return Ok(());
        }
        tokio::fs::write(output, b"PK\x03\x04 fake docx").await.unwrap();
        Ok(())
    }
}

/// Records the markdown it was handed.
#[derive(Default)]
struct FakeMarkup {
    inputs: Mutex<Vec<String>>,
}

#[async_trait]
impl MarkupConverter for FakeMarkup {
    async fn convert(&self, markup: &Path, output: &Path) -> Result<(), ToolError> {
        let text = tokio::fs::read_to_string(markup).await.unwrap();
        self.inputs.lock().unwrap().push(text);
        tokio::fs::write(output, b"PK\x03\x04 fake docx").await.unwrap();
        Ok(())
    }
}

/// Writes `pages` images regardless of the cap, or fails.
struct FakePreviews {
    pages: usize,
    fail: bool,
}

#[async_trait]
impl PreviewRenderer for FakePreviews {
    async fn render_previews(
        &self,
        document: &Path,
        out_dir: &Path,
        _max_pages: usize,
    ) -> Result<Vec<String>, PreviewError> {
        assert!(document.exists());
        if self.fail {
            return Err(PreviewError::Render(ToolError::NotFound {
                program: "soffice".into(),
            }));
        }
        let mut names = Vec::new();
        for n in 1..=self.pages {
            let name = format!("preview_{n}.png");
            tokio::fs::write(out_dir.join(&name), b"\x89PNG").await.unwrap();
            names.push(name);
        }
        Ok(names)
    }
}

#[derive(Default)]
struct Events(Mutex<Vec<String>>);

impl ConversionProgressCallback for Events {
    fn on_job_start(&self, _job: &JobId, kind: PipelineKind) {
        self.0.lock().unwrap().push(format!("start:{kind}"));
    }
    fn on_stage_complete(&self, _job: &JobId, outcome: &StageOutcome) {
        self.0.lock().unwrap().push(format!("{:?}", outcome.stage));
    }
    fn on_job_complete(&self, _job: &JobId, success: bool) {
        self.0.lock().unwrap().push(format!("done:{success}"));
    }
}

// ── Test helpers ─────────────────────────────────────────────────────────────

struct Harness {
    _tmp: TempDir,
    root: PathBuf,
    converter: Converter,
    structural: Arc<FakeStructural>,
    markup: Arc<FakeMarkup>,
}

fn harness(
    configure: impl FnOnce(edgequake_pdf2docx::ConversionConfigBuilder) -> edgequake_pdf2docx::ConversionConfigBuilder,
    structural: FakeStructural,
    previews: FakePreviews,
) -> Harness {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("workspaces");
    let config = configure(ConversionConfig::builder().store_root(&root))
        .build()
        .expect("valid config");

    let structural = Arc::new(structural);
    let markup = Arc::new(FakeMarkup::default());
    let converter = Converter::new(config)
        .unwrap()
        .with_structural_converter(structural.clone())
        .with_markup_converter(markup.clone())
        .with_preview_renderer(Arc::new(previews));

    Harness {
        _tmp: tmp,
        root,
        converter,
        structural,
        markup,
    }
}

fn default_harness() -> Harness {
    harness(
        |b| b,
        FakeStructural::default(),
        FakePreviews { pages: 2, fail: false },
    )
}

fn ocr_harness(server: &MockServer, key: Option<&str>) -> Harness {
    let url = format!("{}/v1/tools/agentic-document-analysis", server.uri());
    let key = key.map(str::to_string);
    harness(
        move |b| {
            let b = b.analyzer_url(url).analyzer_timeout(Duration::from_secs(5));
            match key {
                Some(k) => b.analyzer_api_key(k),
                None => b,
            }
        },
        FakeStructural::default(),
        FakePreviews { pages: 1, fail: false },
    )
}

/// Job directories currently in the store.
fn workspaces(root: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(root) {
        Ok(rd) => rd.map(|e| e.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    }
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            return;
        }
        p
    }};
}

// ── Structural pipeline ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_structural_report_pdf() {
    let h = default_harness();
    let result = assert_ok!(
        h.converter
            .submit(PipelineKind::Structural, PDF, "report.pdf")
            .await
    );

    assert!(result.download_ref().ends_with("report_digital.docx"));
    assert_eq!(result.document, "report_digital.docx");
    assert_eq!(result.original_filename, "report.pdf");
    assert!(result.previews.len() <= 3);
    assert_eq!(result.previews, vec!["preview_1.png", "preview_2.png"]);

    let dir = h.converter.store().workspace_dir(&result.job_id);
    assert_eq!(
        file_names(&dir),
        vec!["preview_1.png", "preview_2.png", "report.pdf", "report_digital.docx"]
    );
    assert_eq!(std::fs::read(dir.join("report.pdf")).unwrap(), PDF);
    assert_eq!(h.structural.sources.lock().unwrap()[0], dir.join("report.pdf"));

    let stages: Vec<Stage> = result.stats.stages.iter().map(|s| s.stage).collect();
    assert_eq!(
        stages,
        vec![Stage::Persist, Stage::StructuralConvert, Stage::Preview]
    );
    assert!(result
        .stats
        .stages
        .iter()
        .all(|s| s.status == StageStatus::Completed));
}

#[tokio::test]
async fn test_result_artifacts_resolve_inside_workspace() {
    let h = default_harness();
    let result = h
        .converter
        .submit(PipelineKind::Structural, PDF, "report.pdf")
        .await
        .unwrap();

    let resolver = h.converter.resolver();
    let job = result.job_id.to_string();
    let doc = resolver.resolve(&job, &result.document).await.unwrap();
    assert_eq!(
        doc.content_type,
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
    );
    let canonical_root = std::fs::canonicalize(&h.root).unwrap();
    assert!(doc.path.starts_with(canonical_root.join(&job)));

    for preview in &result.previews {
        let img = resolver.resolve(&job, preview).await.unwrap();
        assert_eq!(img.content_type, "image/png");
        assert!(img.content_disposition.starts_with("inline"));
    }

    for bad in ["../report.pdf", "/etc/passwd", "..", "a/../../b"] {
        let err = resolver.resolve(&job, bad).await.unwrap_err();
        assert!(matches!(err, ResolveError::Forbidden { .. }), "{bad}: {err:?}");
    }
    assert_eq!(
        resolver
            .resolve(&JobId::new().to_string(), &result.document)
            .await
            .unwrap_err(),
        ResolveError::NotFound
    );
}

#[tokio::test]
async fn test_unsafe_filename_is_sanitised() {
    let h = default_harness();
    let result = h
        .converter
        .submit(PipelineKind::Structural, PDF, "../../etc/my report.pdf")
        .await
        .unwrap();
    assert!(!result.original_filename.contains('/'));
    assert!(!result.original_filename.contains(".."));
    assert_eq!(workspaces(&h.root).len(), 1);
}

#[tokio::test]
async fn test_validation_failures_allocate_nothing() {
    let h = default_harness();
    let long_name = format!("{}.pdf", "x".repeat(296));
    let cases: [(&[u8], &str); 6] = [
        (PDF, ""),
        (PDF, "notes.txt"),
        (PDF, "report.docx"),
        (b"", "empty.pdf"),
        (b"PK\x03\x04 zip", "fake.pdf"),
        (PDF, &long_name),
    ];
    for (bytes, name) in cases {
        let err = assert_err!(
            h.converter
                .submit(PipelineKind::Structural, bytes, name)
                .await
        );
        assert_eq!(err.kind(), ErrorKind::Validation, "{name:?}: {err}");
    }
    assert!(workspaces(&h.root).is_empty());
    assert!(h.structural.sources.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_structural_failure_leaves_no_workspace() {
    let h = harness(
        |b| b,
        FakeStructural {
            fail: true,
            ..Default::default()
        },
        FakePreviews { pages: 1, fail: false },
    );
    let err = h
        .converter
        .submit(PipelineKind::Structural, PDF, "locked.pdf")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ExternalTool);
    assert!(matches!(
        err,
        Pdf2DocxError::ExternalTool {
            stage: Stage::StructuralConvert,
            ..
        }
    ));
    assert!(err.to_string().contains("structural conversion"));
    assert!(workspaces(&h.root).is_empty());
}

#[tokio::test]
async fn test_converter_reporting_success_without_output_fails_the_job() {
    let events = Arc::new(Events::default());
    let cb = events.clone();
    let h = harness(
        move |b| b.progress_callback(cb),
        FakeStructural {
            silent: true,
            ..Default::default()
        },
        FakePreviews { pages: 1, fail: false },
    );
    let err = h
        .converter
        .submit(PipelineKind::Structural, PDF, "report.pdf")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ExternalTool);
    assert!(matches!(
        err,
        Pdf2DocxError::ExternalTool {
            stage: Stage::StructuralConvert,
            source: ToolError::NoOutput { .. },
        }
    ));
    assert_eq!(h.structural.sources.lock().unwrap().len(), 1);
    assert!(workspaces(&h.root).is_empty());
    assert_eq!(
        events.0.lock().unwrap().last().map(String::as_str),
        Some("done:false")
    );
}

// ── Preview degradation ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_preview_failure_degrades_to_empty_list() {
    let h = harness(
        |b| b,
        FakeStructural::default(),
        FakePreviews { pages: 0, fail: true },
    );
    let result = h
        .converter
        .submit(PipelineKind::Structural, PDF, "report.pdf")
        .await
        .unwrap();

    assert!(result.previews.is_empty());
    let preview = result.stats.stages.last().unwrap();
    assert_eq!(preview.stage, Stage::Preview);
    assert!(matches!(preview.status, StageStatus::Degraded { .. }));
    assert!(h
        .converter
        .store()
        .path_for(&result.job_id, &result.document)
        .exists());
}

#[tokio::test]
async fn test_previews_truncated_to_cap() {
    let h = harness(
        |b| b.max_preview_pages(3),
        FakeStructural::default(),
        FakePreviews { pages: 5, fail: false },
    );
    let result = h
        .converter
        .submit(PipelineKind::Structural, PDF, "long.pdf")
        .await
        .unwrap();

    assert_eq!(
        result.previews,
        vec!["preview_1.png", "preview_2.png", "preview_3.png"]
    );
    let dir = h.converter.store().workspace_dir(&result.job_id);
    assert!(!dir.join("preview_4.png").exists());
    assert!(!dir.join("preview_5.png").exists());
}

// ── OCR pipeline ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_ocr_pipeline_assembles_markdown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("authorization", "Basic test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"chunks": [
                {"chunk_type": "title", "text": "# Invoice"},
                {"chunk_type": "figure", "text": "company logo"},
                {"chunk_type": "text", "text": "Total: 42 EUR"}
            ]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let h = ocr_harness(&server, Some("test-key"));
    let result = h
        .converter
        .submit(PipelineKind::Ocr, PDF, "scan.pdf")
        .await
        .unwrap();

    assert_eq!(result.document, "scan_ocr.docx");
    assert_eq!(result.pipeline, PipelineKind::Ocr);
    assert_eq!(
        h.markup.inputs.lock().unwrap().as_slice(),
        ["# Invoice\n\nTotal: 42 EUR".to_string()]
    );

    let dir = h.converter.store().workspace_dir(&result.job_id);
    let analysis = std::fs::read_to_string(dir.join("analysis_output.json")).unwrap();
    assert!(analysis.contains("\n  \"data\""), "pretty-printed: {analysis}");
    assert_eq!(
        std::fs::read_to_string(dir.join("extracted.md")).unwrap(),
        "# Invoice\n\nTotal: 42 EUR"
    );

    let stages: Vec<Stage> = result.stats.stages.iter().map(|s| s.stage).collect();
    assert_eq!(
        stages,
        vec![
            Stage::Persist,
            Stage::Analyze,
            Stage::Assemble,
            Stage::MarkupConvert,
            Stage::Preview
        ]
    );
}

#[tokio::test]
async fn test_ocr_missing_chunks_still_converts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
        .mount(&server)
        .await;

    let h = ocr_harness(&server, Some("k"));
    let result = h
        .converter
        .submit(PipelineKind::Ocr, PDF, "blank.pdf")
        .await
        .unwrap();

    assert_eq!(h.markup.inputs.lock().unwrap().as_slice(), [String::new()]);
    let assemble = result
        .stats
        .stages
        .iter()
        .find(|s| s.stage == Stage::Assemble)
        .unwrap();
    assert!(matches!(assemble.status, StageStatus::Degraded { .. }));
}

#[tokio::test]
async fn test_ocr_missing_credential_makes_no_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let h = ocr_harness(&server, None);
    let err = h
        .converter
        .submit(PipelineKind::Ocr, PDF, "scan.pdf")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(workspaces(&h.root).is_empty());
    assert!(h.markup.inputs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_ocr_remote_error_aborts_and_cleans_up() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let events = Arc::new(Events::default());
    let url = server.uri();
    let cb = events.clone();
    let h = harness(
        move |b| {
            b.analyzer_url(url)
                .analyzer_api_key("k")
                .progress_callback(cb)
        },
        FakeStructural::default(),
        FakePreviews { pages: 1, fail: false },
    );

    let err = h
        .converter
        .submit(PipelineKind::Ocr, PDF, "scan.pdf")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteService);
    assert!(err.to_string().contains("500"));
    assert!(workspaces(&h.root).is_empty());
    assert!(h.markup.inputs.lock().unwrap().is_empty());
    assert_eq!(
        events.0.lock().unwrap().as_slice(),
        ["start:ocr", "Persist", "Analyze", "done:false"]
    );
}

// ── Concurrency and retention ────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_jobs_get_disjoint_workspaces() {
    let h = default_harness();
    let a = h.converter.clone();
    let b = h.converter.clone();

    let (ra, rb) = tokio::join!(
        tokio::spawn(async move { a.submit(PipelineKind::Structural, PDF, "a.pdf").await }),
        tokio::spawn(async move { b.submit(PipelineKind::Structural, PDF, "b.pdf").await }),
    );
    let ra = ra.unwrap().unwrap();
    let rb = rb.unwrap().unwrap();

    assert_ne!(ra.job_id, rb.job_id);
    let dirs = workspaces(&h.root);
    assert_eq!(dirs.len(), 2);

    let store = h.converter.store();
    let a_files = file_names(&store.workspace_dir(&ra.job_id));
    let b_files = file_names(&store.workspace_dir(&rb.job_id));
    assert!(a_files.contains(&"a_digital.docx".to_string()));
    assert!(b_files.contains(&"b_digital.docx".to_string()));
    assert!(a_files.iter().all(|f| !b_files.contains(f) || f.starts_with("preview_")));
}

#[tokio::test]
async fn test_sweep_on_submit_reclaims_expired_workspaces() {
    let h = harness(
        |b| b.retention_ttl(Duration::ZERO).sweep_on_submit(true),
        FakeStructural::default(),
        FakePreviews { pages: 0, fail: false },
    );
    let first = h
        .converter
        .submit(PipelineKind::Structural, PDF, "old.pdf")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = h
        .converter
        .submit(PipelineKind::Structural, PDF, "new.pdf")
        .await
        .unwrap();

    let store = h.converter.store();
    assert!(!store.workspace_dir(&first.job_id).exists());
    assert!(store.path_for(&second.job_id, &second.document).exists());
}

#[tokio::test]
async fn test_sweep_respects_age() {
    let h = harness(
        |b| b.retention_ttl(Duration::from_secs(3600)),
        FakeStructural::default(),
        FakePreviews { pages: 0, fail: false },
    );
    let result = h
        .converter
        .submit(PipelineKind::Structural, PDF, "keep.pdf")
        .await
        .unwrap();

    let report = h.converter.sweep().await;
    assert_eq!(report.removed, 0);
    assert!(h.converter.store().workspace_dir(&result.job_id).exists());

    tokio::time::sleep(Duration::from_millis(50)).await;
    let report = edgequake_pdf2docx::sweep(h.converter.store().as_ref(), Duration::ZERO).await;
    assert_eq!(report.removed, 1);

    let listed: Vec<_> = h.converter.store().list().await.unwrap().collect().await;
    assert!(listed.is_empty());
}

#[tokio::test]
async fn test_progress_events_in_stage_order() {
    let events = Arc::new(Events::default());
    let cb = events.clone();
    let h = harness(
        move |b| b.progress_callback(cb),
        FakeStructural::default(),
        FakePreviews { pages: 1, fail: false },
    );
    h.converter
        .submit(PipelineKind::Structural, PDF, "report.pdf")
        .await
        .unwrap();
    assert_eq!(
        events.0.lock().unwrap().as_slice(),
        [
            "start:structural",
            "Persist",
            "StructuralConvert",
            "Preview",
            "done:true"
        ]
    );
}

// ── Real tool chain (gated) ──────────────────────────────────────────────────

#[tokio::test]
async fn test_real_tools_digital_pdf() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("sample_digital.pdf"));
    let tmp = TempDir::new().unwrap();

    let config = ConversionConfig::builder()
        .store_root(tmp.path())
        .max_preview_pages(3)
        .build()
        .expect("valid config");
    let converter = Converter::new(config).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let result = converter
        .submit(PipelineKind::Structural, &bytes, "sample_digital.pdf")
        .await
        .expect("conversion should succeed");

    assert_eq!(result.document, "sample_digital_digital.docx");
    assert!(result.previews.len() <= 3);
    let doc = converter
        .store()
        .path_for(&result.job_id, &result.document);
    let head = std::fs::read(&doc).unwrap();
    assert!(head.starts_with(b"PK"), "DOCX is a zip archive");

    println!(
        "✓ {} with {} preview(s) in {}ms",
        result.download_ref(),
        result.previews.len(),
        result.stats.total_duration_ms
    );
}

#[tokio::test]
async fn test_real_tools_scanned_pdf() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("sample_scanned.pdf"));
    let Ok(key) = std::env::var("LANDING_AI_API_KEY") else {
        println!("SKIP — LANDING_AI_API_KEY not set");
        return;
    };
    let tmp = TempDir::new().unwrap();

    let config = ConversionConfig::builder()
        .store_root(tmp.path())
        .analyzer_api_key(key)
        .build()
        .expect("valid config");
    let converter = Converter::new(config).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let result = converter
        .submit(PipelineKind::Ocr, &bytes, "sample_scanned.pdf")
        .await
        .expect("conversion should succeed");

    let md = std::fs::read_to_string(
        converter.store().path_for(&result.job_id, "extracted.md"),
    )
    .unwrap();
    assert!(!md.trim().is_empty(), "scanned sample should yield text");
    println!("✓ {} ({} chars of markdown)", result.download_ref(), md.len());
}
