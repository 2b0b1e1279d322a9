//! Upload validation and artifact naming.
//!
//! Everything here runs before a workspace is allocated: a rejected upload
//! leaves no trace on disk. We validate the PDF magic bytes (`%PDF`) as
//! well as the extension so callers get a meaningful error rather than a
//! converter crash deep inside the pipeline.

use crate::error::Pdf2DocxError;
use crate::output::PipelineKind;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Remote analysis payload, written by the analyze stage.
pub const ANALYSIS_FILENAME: &str = "analysis_output.json";

/// Assembled markdown, written by the assemble stage.
pub const MARKDOWN_FILENAME: &str = "extracted.md";

/// Longest single path component accepted by common filesystems.
pub const MAX_FILENAME_BYTES: usize = 255;

static RE_UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\x00-\x1f\x7f"*:<>?|]"#).unwrap());

/// Reduce an uploaded file name to a safe single path component.
///
/// Browsers may send a full client-side path; only the last component is
/// kept. Control characters and characters reserved on common filesystems
/// are replaced with `_`. Returns `None` if nothing usable remains.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned = RE_UNSAFE_CHARS.replace_all(last.trim(), "_");
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() || cleaned.contains("..") {
        return None;
    }
    Some(cleaned)
}

/// Check that `bytes` start with the PDF signature.
pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}

fn has_pdf_extension(filename: &str) -> bool {
    filename.to_ascii_lowercase().ends_with(".pdf")
}

/// Validate an upload and return its sanitised file name.
pub fn validate_upload(filename: &str, bytes: &[u8]) -> Result<String, Pdf2DocxError> {
    if filename.trim().is_empty() {
        return Err(Pdf2DocxError::EmptyFilename);
    }
    let sanitized = sanitize_filename(filename).ok_or_else(|| {
        Pdf2DocxError::UnsupportedFileType {
            filename: filename.to_string(),
        }
    })?;
    if !has_pdf_extension(&sanitized) || sanitized.len() == ".pdf".len() {
        return Err(Pdf2DocxError::UnsupportedFileType {
            filename: filename.to_string(),
        });
    }
    // The structural output name is the longest name derived from the upload.
    let longest = output_filename(&sanitized, PipelineKind::Structural).len();
    if longest > MAX_FILENAME_BYTES {
        return Err(Pdf2DocxError::FilenameTooLong {
            len: sanitized.len(),
            max: MAX_FILENAME_BYTES - (longest - sanitized.len()),
            filename: sanitized,
        });
    }
    if bytes.is_empty() {
        return Err(Pdf2DocxError::EmptyUpload {
            filename: sanitized,
        });
    }
    if !is_pdf(bytes) {
        return Err(Pdf2DocxError::NotAPdf {
            filename: sanitized,
            magic: bytes.iter().take(4).copied().collect(),
        });
    }
    debug!("Accepted upload '{}' ({} bytes)", sanitized, bytes.len());
    Ok(sanitized)
}

/// Name of the converted document: `<stem>_<suffix>.docx`.
pub fn output_filename(source: &str, kind: PipelineKind) -> String {
    let stem = if has_pdf_extension(source) {
        &source[..source.len() - ".pdf".len()]
    } else {
        source
    };
    format!("{}_{}.docx", stem, kind.output_suffix())
}

/// Name of the `n`-th preview image (1-indexed).
pub fn preview_filename(page_num: usize) -> String {
    format!("preview_{page_num}.png")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn sanitize_keeps_last_component() {
        assert_eq!(sanitize_filename("report.pdf").as_deref(), Some("report.pdf"));
        assert_eq!(
            sanitize_filename("C:\\Users\\me\\report.pdf").as_deref(),
            Some("report.pdf")
        );
        assert_eq!(
            sanitize_filename("../../etc/report.pdf").as_deref(),
            Some("report.pdf")
        );
    }

    #[test]
    fn sanitize_rejects_traversal_and_empty() {
        assert_eq!(sanitize_filename(""), None);
        assert_eq!(sanitize_filename("dir/"), None);
        assert_eq!(sanitize_filename(".."), None);
        assert_eq!(sanitize_filename("a..pdf"), None);
    }

    #[test]
    fn sanitize_replaces_reserved_characters() {
        assert_eq!(
            sanitize_filename("q3:\"final\"?.pdf").as_deref(),
            Some("q3__final__.pdf")
        );
        assert_eq!(sanitize_filename(".hidden.pdf").as_deref(), Some("hidden.pdf"));
    }

    #[test]
    fn validate_accepts_pdf() {
        let name = validate_upload("Report.PDF", b"%PDF-1.7\n...").unwrap();
        assert_eq!(name, "Report.PDF");
    }

    #[test]
    fn validate_rejects_wrong_extension() {
        let err = validate_upload("notes.txt", b"%PDF-1.7").unwrap_err();
        assert!(matches!(err, Pdf2DocxError::UnsupportedFileType { .. }));
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = validate_upload(".pdf", b"%PDF-1.7").unwrap_err();
        assert!(matches!(err, Pdf2DocxError::UnsupportedFileType { .. }));
    }

    #[test]
    fn validate_rejects_empty_filename_and_bytes() {
        assert!(matches!(
            validate_upload("  ", b"%PDF").unwrap_err(),
            Pdf2DocxError::EmptyFilename
        ));
        assert!(matches!(
            validate_upload("a.pdf", b"").unwrap_err(),
            Pdf2DocxError::EmptyUpload { .. }
        ));
    }

    #[test]
    fn validate_rejects_bad_magic() {
        let err = validate_upload("fake.pdf", b"PK\x03\x04rest").unwrap_err();
        match err {
            Pdf2DocxError::NotAPdf { magic, .. } => assert_eq!(magic, b"PK\x03\x04".to_vec()),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_names_too_long_for_the_filesystem() {
        let name = format!("{}.pdf", "a".repeat(296));
        let err = validate_upload(&name, b"%PDF-1.7").unwrap_err();
        assert!(matches!(err, Pdf2DocxError::FilenameTooLong { len: 300, .. }), "got {err:?}");
        assert_eq!(err.kind(), ErrorKind::Validation);

        // Accepted only if the derived document name still fits.
        let stem_max = MAX_FILENAME_BYTES - "_digital.docx".len();
        let fits = format!("{}.pdf", "a".repeat(stem_max));
        assert!(validate_upload(&fits, b"%PDF-1.7").is_ok());
        let too_long = format!("{}.pdf", "a".repeat(stem_max + 1));
        assert!(validate_upload(&too_long, b"%PDF-1.7").is_err());
    }

    #[test]
    fn output_names_carry_pipeline_suffix() {
        assert_eq!(
            output_filename("report.pdf", PipelineKind::Structural),
            "report_digital.docx"
        );
        assert_eq!(output_filename("Scan.PDF", PipelineKind::Ocr), "Scan_ocr.docx");
        assert_eq!(preview_filename(2), "preview_2.png");
    }
}
