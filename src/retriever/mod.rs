//! Best-effort PDF retrieval.
//!
//! A URL is tried with a short, ordered list of attempts. A response counts as
//! a PDF when its body starts with `%PDF` or its content-type says so. When the
//! outermost call gets an HTML page instead, the page is scanned for a PDF link
//! and retrieval recurses into it, bounded by [`RetrieverConfig::max_depth`].

pub mod attempt;
pub mod links;
pub mod vendor;

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{redirect, Client};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::RetrieverConfig;
use crate::error::{AttemptFailure, RetrievalError};
use crate::utils::pdf::{is_html, is_pdf, PDF_MAGIC};
use crate::utils::text::{decode_html, lossy_preview};

use attempt::{plan_attempts, FetchAttempt, FetchResult};
use links::find_pdf_link;
use vendor::VendorRule;

const HEAD_SNIFF_BYTES: usize = 512;

/// Outcome of a single diagnostic GET, as reported by `POST /test-url`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReport {
    pub status: u16,
    pub content_type: String,
    pub content_length: usize,
    pub is_pdf: bool,
    pub header_preview: String,
    pub redirects: bool,
    pub final_url: String,
}

#[derive(Clone)]
pub struct Retriever {
    client: Client,
    probe_client: Client,
    config: RetrieverConfig,
    vendors: Arc<[VendorRule]>,
}

impl Retriever {
    pub fn new(config: RetrieverConfig) -> Result<Self, reqwest::Error> {
        Self::with_vendors(config, vendor::default_rules())
    }

    pub fn with_vendors(
        config: RetrieverConfig,
        vendors: Vec<VendorRule>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.attempt_timeout)
            .redirect(redirect::Policy::limited(config.max_redirects))
            .build()?;

        let probe_client = Client::builder()
            .timeout(config.probe_timeout)
            .redirect(redirect::Policy::limited(config.probe_max_redirects))
            .build()?;

        Ok(Self {
            client,
            probe_client,
            config,
            vendors: vendors.into(),
        })
    }

    /// Retrieves PDF bytes for `url`. `depth` is 0 for the caller's own URL.
    pub fn retrieve<'a>(
        &'a self,
        url: &'a str,
        depth: u32,
    ) -> BoxFuture<'a, Result<Bytes, RetrievalError>> {
        async move {
            if depth > self.config.max_depth {
                warn!(target: "retriever", url = %url, depth, "Maximum retrieval depth exceeded");
                return Err(RetrievalError::MaxDepth {
                    depth,
                    max: self.config.max_depth,
                });
            }

            let attempts = plan_attempts(url, &self.config.user_agent, &self.vendors);
            let mut failures = Vec::with_capacity(attempts.len());

            for attempt in &attempts {
                info!(
                    target: "retriever",
                    url = %attempt.url,
                    depth,
                    accept = attempt.accept.header_value(),
                    "Trying to fetch"
                );

                let fetched = match self.execute(attempt).await {
                    Ok(fetched) => fetched,
                    Err(failure) => {
                        warn!(target: "retriever", url = %attempt.url, "Attempt failed: {}", failure);
                        failures.push(failure);
                        continue;
                    }
                };

                if fetched.is_pdf {
                    info!(
                        target: "retriever",
                        url = %attempt.url,
                        final_url = %fetched.final_url,
                        size = fetched.body.len(),
                        "Retrieved PDF"
                    );
                    return Ok(fetched.body);
                }

                let head = &fetched.body[..fetched.body.len().min(HEAD_SNIFF_BYTES)];
                if depth == 0 && is_html(fetched.content_type.as_deref(), head) {
                    let html = decode_html(&fetched.body, fetched.content_type.as_deref());
                    if let Some(link) = find_pdf_link(&html, &attempt.url) {
                        info!(
                            target: "retriever",
                            url = %attempt.url,
                            link = %link.url,
                            rule = link.rule,
                            "Found PDF link in HTML"
                        );
                        return self.retrieve(&link.url, depth + 1).await;
                    }
                    debug!(target: "retriever", url = %attempt.url, "HTML page contains no PDF link");
                }

                let failure = AttemptFailure::NotPdf {
                    status: fetched.status.as_u16(),
                    content_type: fetched.content_type,
                };
                warn!(target: "retriever", url = %attempt.url, "Attempt failed: {}", failure);
                failures.push(failure);
            }

            Err(RetrievalError::Exhausted {
                url: url.to_string(),
                failures,
            })
        }
        .boxed()
    }

    /// Runs one attempt. 3xx/4xx responses are returned for inspection; 5xx is a failure.
    async fn execute(&self, attempt: &FetchAttempt) -> Result<FetchResult, AttemptFailure> {
        let response = self
            .client
            .get(&attempt.url)
            .headers(attempt.headers.clone())
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(AttemptFailure::ServerError(status.as_u16()));
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .map(|s| s.to_string());

        let body = response.bytes().await.map_err(classify_transport_error)?;
        let head = &body[..body.len().min(PDF_MAGIC.len())];
        let is_pdf = is_pdf(content_type.as_deref(), head);

        debug!(
            target: "retriever",
            url = %attempt.url,
            final_url = %final_url,
            status = status.as_u16(),
            ct = ?content_type,
            size = body.len(),
            head = %lossy_preview(&body, 16),
            "Response received"
        );

        Ok(FetchResult {
            body,
            content_type,
            is_pdf,
            status,
            final_url,
        })
    }

    /// Tries the vendor alternative URLs for `url`, returning the first 2xx body that starts with `%PDF`.
    pub async fn fetch_vendor_alternatives(&self, url: &str) -> Option<Bytes> {
        let candidates: Vec<(&'static str, String)> = self
            .vendors
            .iter()
            .flat_map(|rule| {
                rule.alternative_downloads(url)
                    .into_iter()
                    .map(move |candidate| (rule.name, candidate))
            })
            .collect();
        if candidates.is_empty() {
            return None;
        }

        info!(target: "retriever", url = %url, count = candidates.len(), "Trying alternative vendor PDF URLs");
        for (vendor, candidate) in candidates {
            let response = self
                .client
                .get(&candidate)
                .timeout(self.config.alternative_timeout)
                .header(USER_AGENT, &self.config.user_agent)
                .header(ACCEPT, "application/pdf")
                .send()
                .await;

            let body = match response {
                Ok(response) if !response.status().is_success() => {
                    debug!(
                        target: "retriever",
                        url = %candidate,
                        status = response.status().as_u16(),
                        "Alternative URL returned an error status"
                    );
                    continue;
                }
                Ok(response) => response.bytes().await,
                Err(e) => Err(e),
            };

            match body {
                Ok(body) if body.starts_with(PDF_MAGIC) => {
                    info!(target: "retriever", url = %candidate, vendor, "Success with alternative URL");
                    return Some(body);
                }
                Ok(_) => {
                    debug!(target: "retriever", url = %candidate, "Alternative URL did not return a PDF");
                }
                Err(e) => {
                    warn!(target: "retriever", url = %candidate, "Alternative URL failed: {}", e);
                }
            }
        }

        None
    }

    /// Single GET used to diagnose why a URL can't be retrieved. Any status is accepted.
    pub async fn probe(&self, url: &str) -> Result<ProbeReport, reqwest::Error> {
        let response = self
            .probe_client
            .get(url)
            .header(USER_AGENT, &self.config.user_agent)
            .header(ACCEPT, "*/*")
            .send()
            .await?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        let body = response.bytes().await?;

        Ok(ProbeReport {
            status,
            content_type,
            content_length: body.len(),
            is_pdf: body.starts_with(PDF_MAGIC),
            header_preview: lossy_preview(&body, 100),
            redirects: final_url != url,
            final_url,
        })
    }
}

fn classify_transport_error(e: reqwest::Error) -> AttemptFailure {
    if e.is_timeout() {
        AttemptFailure::Timeout
    } else {
        AttemptFailure::Transport(e.to_string())
    }
}
