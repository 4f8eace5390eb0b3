use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use reqwest::StatusCode;

use super::vendor::VendorRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptPreference {
    Pdf,
    Any,
}

impl AcceptPreference {
    pub fn header_value(self) -> &'static str {
        match self {
            AcceptPreference::Pdf => "application/pdf",
            AcceptPreference::Any => "*/*",
        }
    }
}

/// One concrete (URL, header set) combination tried against the network.
#[derive(Debug, Clone)]
pub struct FetchAttempt {
    pub url: String,
    pub headers: HeaderMap,
    pub accept: AcceptPreference,
}

impl FetchAttempt {
    pub fn new(url: impl Into<String>, accept: AcceptPreference, user_agent: &str) -> Self {
        let url = url.into();
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(accept.header_value()));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        if let Ok(ua) = HeaderValue::from_str(user_agent) {
            headers.insert(USER_AGENT, ua);
        }
        if let Ok(referer) = HeaderValue::from_str(&url) {
            headers.insert(REFERER, referer);
        }

        Self {
            url,
            headers,
            accept,
        }
    }
}

/// A response that was read to completion.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub body: Bytes,
    pub content_type: Option<String>,
    pub is_pdf: bool,
    pub status: StatusCode,
    pub final_url: String,
}

/// Attempts for `url`, in the order they should be tried.
///
/// Two direct GETs (strict PDF accept, then a generic accept) followed by one
/// direct-download attempt per vendor rule that recognizes the URL.
pub fn plan_attempts(url: &str, user_agent: &str, vendors: &[VendorRule]) -> Vec<FetchAttempt> {
    let mut attempts = vec![
        FetchAttempt::new(url, AcceptPreference::Pdf, user_agent),
        FetchAttempt::new(url, AcceptPreference::Any, user_agent),
    ];

    attempts.extend(vendors.iter().filter_map(|rule| {
        rule.direct_download(url)
            .map(|direct| FetchAttempt::new(direct, AcceptPreference::Pdf, user_agent))
    }));

    attempts
}
