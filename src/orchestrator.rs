use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::error::ProcessError;
use crate::isin::{extract_isins, isin_like_tokens, uppercase_tokens, ExtractionResult};
use crate::retriever::Retriever;
use crate::utils::pdf::{DecodeError, DecodedDocument, PdfTextDecoder};
use crate::utils::text::{lossy_preview, truncate_chars};

const TEXT_SAMPLE_CHARS: usize = 500;
const LOG_SAMPLE_CHARS: usize = 1000;

/// Everything `/extract-isin` needs to answer a successful request.
#[derive(Debug, Clone)]
pub struct ExtractionReport {
    pub pdf_url: String,
    pub result: ExtractionResult,
    pub text_length: usize,
    pub text_sample: String,
    pub pages: usize,
}

/// Sequences retrieval, PDF decoding and ISIN extraction for one URL.
pub struct Orchestrator {
    retriever: Retriever,
    decoder: Arc<dyn PdfTextDecoder>,
    decode_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        retriever: Retriever,
        decoder: Arc<dyn PdfTextDecoder>,
        decode_timeout: Duration,
    ) -> Self {
        Self {
            retriever,
            decoder,
            decode_timeout,
        }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub async fn process(&self, pdf_url: &str) -> Result<ExtractionReport, ProcessError> {
        let url = pdf_url.trim();
        if url.is_empty() {
            return Err(ProcessError::BadRequest("pdfUrl is required".to_string()));
        }

        info!(target: "orchestrator", url = %url, "Processing PDF");

        let bytes = self.fetch(url).await?;
        let document = self.decode(bytes).await?;
        let text_length = document.text.chars().count();
        info!(target: "orchestrator", url = %url, chars = text_length, pages = document.page_count, "Extracted text from PDF");

        if document.text.trim().is_empty() {
            warn!(target: "orchestrator", url = %url, "No text extracted from PDF; it might be image-based or empty");
            return Err(ProcessError::EmptyDocument {
                pages: document.page_count,
            });
        }

        debug!(
            target: "orchestrator",
            sample = truncate_chars(&document.text, LOG_SAMPLE_CHARS),
            "Sample of extracted text"
        );
        let near = isin_like_tokens(&document.text, 20);
        if !near.is_empty() {
            debug!(target: "orchestrator", count = near.len(), tokens = %near.join(", "), "Potential ISIN-like patterns");
        }

        let result = extract_isins(&document.text);
        if result.is_empty() {
            warn!(target: "orchestrator", url = %url, "No ISIN codes found in extracted text");
            let tokens = uppercase_tokens(&document.text, 30);
            if !tokens.is_empty() {
                debug!(target: "orchestrator", tokens = %tokens.join(", "), "Other uppercase patterns (might be partial ISINs)");
            }
        } else {
            let shown: Vec<&str> = result.isins.iter().take(20).map(String::as_str).collect();
            info!(target: "orchestrator", count = result.count(), isins = %shown.join(", "), "Found unique ISIN codes");
        }

        Ok(ExtractionReport {
            pdf_url: url.to_string(),
            text_sample: truncate_chars(&document.text, TEXT_SAMPLE_CHARS).to_string(),
            pages: document.page_count,
            text_length,
            result,
        })
    }

    async fn fetch(&self, url: &str) -> Result<Bytes, ProcessError> {
        match self.retriever.retrieve(url, 0).await {
            Ok(bytes) => {
                debug!(target: "orchestrator", head = %lossy_preview(&bytes, 16), size = bytes.len(), "PDF bytes ready");
                Ok(bytes)
            }
            Err(err) => {
                error!(target: "orchestrator", url = %url, "PDF fetch error: {}", err);
                if let Some(bytes) = self.retriever.fetch_vendor_alternatives(url).await {
                    return Ok(bytes);
                }
                Err(ProcessError::from_retrieval(err))
            }
        }
    }

    /// Runs the blocking decoder off the runtime, bounded by `decode_timeout`.
    async fn decode(&self, bytes: Bytes) -> Result<DecodedDocument, ProcessError> {
        let decoder = Arc::clone(&self.decoder);
        let started = Instant::now();
        let task = tokio::task::spawn_blocking(move || decoder.decode(&bytes));

        let outcome = match tokio::time::timeout(self.decode_timeout, task).await {
            Err(_) => Err(DecodeError::TimedOut(self.decode_timeout.as_secs())),
            Ok(Err(join_err)) if join_err.is_panic() => {
                Err(DecodeError::Crashed(join_err.to_string()))
            }
            Ok(Err(join_err)) => return Err(ProcessError::Internal(join_err.to_string())),
            Ok(Ok(decoded)) => decoded,
        };

        match outcome {
            Ok(document) => {
                debug!(target: "orchestrator", elapsed_ms = started.elapsed().as_millis() as u64, "PDF decoding succeeded");
                Ok(document)
            }
            Err(e) => {
                error!(target: "orchestrator", elapsed_ms = started.elapsed().as_millis() as u64, "PDF decoding failed: {}", e);
                Err(ProcessError::Decode(e))
            }
        }
    }
}
