// PDF detection and the text-decoder seam used by the orchestrator.
// Glyph/layout decoding itself is delegated to `pdf-extract`.

use thiserror::Error;

pub const PDF_MAGIC: &[u8] = b"%PDF";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("encrypted PDF is not supported: {0}")]
    Encrypted(String),

    #[error("failed to parse PDF content: {0}")]
    Malformed(String),

    #[error("PDF decoder crashed: {0}")]
    Crashed(String),

    #[error("PDF decoding exceeded {0}s")]
    TimedOut(u64),
}

/// Best-effort text of a PDF.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedDocument {
    pub text: String,
    pub page_count: usize,
}

/// Turns raw PDF bytes into text. Implementations are blocking and are run off the async runtime.
pub trait PdfTextDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedDocument, DecodeError>;
}

/// Decoder backed by the `pdf-extract` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractDecoder;

impl PdfTextDecoder for PdfExtractDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedDocument, DecodeError> {
        let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
            .map_err(|e| classify_decoder_error(&e.to_string()))?;

        Ok(DecodedDocument {
            page_count: pages.len(),
            text: pages.join("\n"),
        })
    }
}

fn classify_decoder_error(message: &str) -> DecodeError {
    let lowered = message.to_ascii_lowercase();
    if lowered.contains("encrypt") || lowered.contains("password") {
        DecodeError::Encrypted(message.to_string())
    } else {
        DecodeError::Malformed(message.to_string())
    }
}

/// Returns true if given content-type or head indicates a PDF file.
/// - Content-Type: application/pdf (case-insensitive, substring match)
/// - Magic bytes: %PDF
pub fn is_pdf(content_type: Option<&str>, head: &[u8]) -> bool {
    let ct = content_type.unwrap_or("").to_ascii_lowercase();
    ct.contains("application/pdf") || head.starts_with(PDF_MAGIC)
}

/// Returns true for responses that look like an HTML page rather than a document.
pub fn is_html(content_type: Option<&str>, head: &[u8]) -> bool {
    let ct = content_type.unwrap_or("").to_ascii_lowercase();
    if ct.contains("text/html") {
        return true;
    }

    let start = head
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(head.len());
    let head = &head[start..];
    let prefix_len = head.len().min(5);
    let prefix = head[..prefix_len].to_ascii_lowercase();
    prefix.starts_with(b"<!") || prefix.starts_with(b"<html")
}
