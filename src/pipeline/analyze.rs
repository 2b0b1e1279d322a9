//! Remote document analysis for scanned PDFs.
//!
//! The only pipeline stage with network I/O. One attempt per job: a failed
//! or timed-out call aborts the OCR pipeline with a remote-service error and
//! is never retried here.

use crate::config::ConversionConfig;
use crate::error::Pdf2DocxError;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Human-readable name used in errors and logs.
pub const LANDING_AI: &str = "Landing AI";

/// Longest response-body excerpt kept in an error message.
const BODY_EXCERPT: usize = 500;

/// Turns a PDF into a structured analysis payload.
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    /// Fail fast when the analyzer cannot possibly succeed (e.g. no
    /// credential). Called before a workspace is allocated.
    fn check_ready(&self) -> Result<(), Pdf2DocxError> {
        Ok(())
    }

    /// Analyse the PDF at `source`.
    async fn analyze(&self, source: &Path) -> Result<Value, Pdf2DocxError>;
}

/// Client for Landing AI's agentic document analysis endpoint.
#[derive(Debug, Clone)]
pub struct LandingAiAnalyzer {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl LandingAiAnalyzer {
    pub fn new(
        url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, Pdf2DocxError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .map_err(|e| Pdf2DocxError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            api_key,
            timeout,
        })
    }

    pub fn from_config(config: &ConversionConfig) -> Result<Self, Pdf2DocxError> {
        Self::new(
            config.analyzer_url.clone(),
            config.analyzer_api_key.clone(),
            config.analyzer_timeout,
        )
    }

    fn api_key(&self) -> Result<&str, Pdf2DocxError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Pdf2DocxError::MissingCredential {
                service: LANDING_AI.to_string(),
            })
    }

    fn map_send_error(&self, e: reqwest::Error) -> Pdf2DocxError {
        if e.is_timeout() {
            Pdf2DocxError::RemoteTimeout {
                service: LANDING_AI.to_string(),
                secs: self.timeout.as_secs(),
            }
        } else {
            Pdf2DocxError::RemoteRequestFailed {
                service: LANDING_AI.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl DocumentAnalyzer for LandingAiAnalyzer {
    fn check_ready(&self) -> Result<(), Pdf2DocxError> {
        self.api_key().map(|_| ())
    }

    async fn analyze(&self, source: &Path) -> Result<Value, Pdf2DocxError> {
        let api_key = self.api_key()?;
        let bytes = tokio::fs::read(source)
            .await
            .map_err(|e| Pdf2DocxError::io(source, e))?;
        let filename = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());

        let part = Part::bytes(bytes)
            .file_name(filename)
            .mime_str("application/pdf")
            .map_err(|e| Pdf2DocxError::Internal(format!("multipart: {e}")))?;
        let form = Form::new().part("pdf", part);

        info!("Sending '{}' to {}", source.display(), LANDING_AI);
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::AUTHORIZATION, format!("Basic {api_key}"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(Pdf2DocxError::RemoteStatus {
                service: LANDING_AI.to_string(),
                status: status.as_u16(),
                body: body.chars().take(BODY_EXCERPT).collect(),
            });
        }

        let payload = response
            .json::<Value>()
            .await
            .map_err(|e| self.map_send_error(e))?;
        debug!("{} answered HTTP {}", LANDING_AI, status);
        Ok(payload)
    }
}
