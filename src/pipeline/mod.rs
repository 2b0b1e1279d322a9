//! Pipeline stages for PDF-to-DOCX conversion.
//!
//! Each submodule implements one transformation step behind a trait, so the
//! orchestrator can swap an external tool for a test double without touching
//! the other stages.
//!
//! ## Data Flow
//!
//! ```text
//! structural:  input ──▶ structural ─────────────────────────────▶ render
//!                        (pdf2docx)                                (soffice + pdfium)
//!
//! ocr:         input ──▶ analyze ──▶ assemble ──▶ markup ─────────▶ render
//!                        (HTTP)      (JSON→md)    (pandoc)
//! ```
//!
//! 1. [`input`]      — validate the upload, derive safe file names
//! 2. [`structural`] — direct PDF→DOCX for documents with a text layer
//! 3. [`analyze`]    — remote layout analysis; the only stage with network I/O
//! 4. [`assemble`]   — concatenate analysis chunks into markdown
//! 5. [`markup`]     — markdown→DOCX
//! 6. [`render`]     — page previews of the finished document; never fatal
//!
//! [`tool`] holds the subprocess plumbing shared by every external adapter.

pub mod analyze;
pub mod assemble;
pub mod input;
pub mod markup;
pub mod render;
pub mod structural;
pub mod tool;
