use serde_json::json;
use thiserror::Error;

use crate::utils::pdf::DecodeError;

/// Why a single retrieval attempt did not yield a PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    Timeout,
    Transport(String),
    ServerError(u16),
    /// A response was read but was neither a PDF nor a followable landing page.
    NotPdf {
        status: u16,
        content_type: Option<String>,
    },
}

impl std::fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptFailure::Timeout => write!(f, "timed out"),
            AttemptFailure::Transport(e) => write!(f, "transport error: {}", e),
            AttemptFailure::ServerError(status) => write!(f, "HTTP {}", status),
            AttemptFailure::NotPdf {
                status,
                content_type,
            } => write!(
                f,
                "HTTP {} with non-PDF content ({})",
                status,
                content_type.as_deref().unwrap_or("unknown")
            ),
        }
    }
}

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("max depth exceeded ({depth} > {max})")]
    MaxDepth { depth: u32, max: u32 },

    #[error("could not retrieve PDF from {url} after {} attempts", .failures.len())]
    Exhausted {
        url: String,
        failures: Vec<AttemptFailure>,
    },
}

impl RetrievalError {
    pub fn failures(&self) -> &[AttemptFailure] {
        match self {
            RetrievalError::MaxDepth { .. } => &[],
            RetrievalError::Exhausted { failures, .. } => failures,
        }
    }

    /// True when at least one attempt ran and every attempt timed out.
    pub fn all_timed_out(&self) -> bool {
        let failures = self.failures();
        !failures.is_empty() && failures.iter().all(|f| *f == AttemptFailure::Timeout)
    }

    /// The last upstream status, when every attempt ended with a 5xx.
    pub fn upstream_status(&self) -> Option<u16> {
        let failures = self.failures();
        if failures.is_empty()
            || !failures
                .iter()
                .all(|f| matches!(f, AttemptFailure::ServerError(_)))
        {
            return None;
        }
        match failures.last() {
            Some(AttemptFailure::ServerError(status)) => Some(*status),
            _ => None,
        }
    }
}

/// Every failure `/extract-isin` can report.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("retrieval failed: {0}")]
    RetrievalFailure(#[source] RetrievalError),

    #[error("no text extracted from PDF ({pages} pages)")]
    EmptyDocument { pages: usize },

    #[error("upstream timed out: {0}")]
    UpstreamTimeout(#[source] RetrievalError),

    #[error("upstream returned HTTP {status}: {source}")]
    UpstreamHttpError {
        status: u16,
        #[source]
        source: RetrievalError,
    },

    #[error("PDF decoding failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProcessError {
    /// Classifies an exhausted retrieval by what the attempts ran into.
    pub fn from_retrieval(err: RetrievalError) -> Self {
        if err.all_timed_out() {
            ProcessError::UpstreamTimeout(err)
        } else if let Some(status) = err.upstream_status() {
            ProcessError::UpstreamHttpError {
                status,
                source: err,
            }
        } else {
            ProcessError::RetrievalFailure(err)
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ProcessError::BadRequest(_)
            | ProcessError::RetrievalFailure(_)
            | ProcessError::EmptyDocument { .. } => 400,
            ProcessError::UpstreamTimeout(_) => 408,
            ProcessError::UpstreamHttpError { status, .. } if (500..600).contains(status) => {
                *status
            }
            ProcessError::UpstreamHttpError { .. } => 502,
            ProcessError::Decode(_) | ProcessError::Internal(_) => 500,
        }
    }

    /// Message safe to show to the caller; internal detail stays in the log.
    pub fn user_message(&self) -> String {
        match self {
            ProcessError::BadRequest(reason) => reason.clone(),
            ProcessError::RetrievalFailure(_) => "Could not retrieve PDF from the provided URL. The URL might require authentication, be blocked, or the PDF might not be accessible. Try downloading the PDF and hosting it on a public service like Google Drive or Dropbox.".to_string(),
            ProcessError::EmptyDocument { .. } => "No text could be extracted from this PDF. The PDF might be image-based or the text might not be extractable.".to_string(),
            ProcessError::UpstreamTimeout(_) => "Request timed out. The PDF file might be too large or the server is slow to respond.".to_string(),
            ProcessError::UpstreamHttpError { status, .. } => format!(
                "Server returned error: {} {}",
                status,
                reqwest::StatusCode::from_u16(*status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("Unknown error")
            ),
            ProcessError::Decode(_) | ProcessError::Internal(_) => {
                "Failed to process the PDF".to_string()
            }
        }
    }

    /// Extra detail returned only when the caller asked for debug output.
    pub fn debug_details(&self) -> serde_json::Value {
        match self {
            ProcessError::EmptyDocument { .. } => json!({ "extractedLength": 0 }),
            _ => json!({ "originalError": self.to_string() }),
        }
    }
}
