//! ISIN (ISO 6166) extraction from PDF-derived text.
//!
//! Validation is structural only: two uppercase letters, nine uppercase
//! alphanumerics, one digit. The check digit is not verified, so a string with
//! the right shape is accepted even if it is not a real security.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

pub const ISIN_LEN: usize = 12;

// No word boundaries: PDF text often glues codes to punctuation or other tokens.
static ISIN_SCAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z]{2}[A-Z0-9]{9}[0-9]").expect("valid ISIN scan regex"));

static ISIN_EXACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{2}[A-Z0-9]{9}[0-9]$").expect("valid ISIN shape regex"));

static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

static ISIN_LIKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z]{2}[A-Z0-9]{9,11}").expect("valid ISIN-like regex"));

static UPPERCASE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z]{2}[A-Z0-9]+").expect("valid uppercase token regex"));

/// Unique ISINs found in a document, in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionResult {
    pub isins: Vec<String>,
}

impl ExtractionResult {
    pub fn count(&self) -> usize {
        self.isins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.isins.is_empty()
    }
}

/// Exact structural check of a single candidate.
pub fn is_valid_isin(candidate: &str) -> bool {
    candidate.len() == ISIN_LEN && ISIN_EXACT.is_match(candidate)
}

/// Finds every ISIN in `text`.
///
/// Two passes are unioned: one over whitespace-collapsed text and one over
/// text with all whitespace removed, which recovers codes hard-wrapped across
/// lines. Every raw match is re-validated before it is kept.
pub fn extract_isins(text: &str) -> ExtractionResult {
    if text.is_empty() {
        return ExtractionResult::default();
    }

    let normalized = WHITESPACE_RUN.replace_all(text, " ");
    let stripped: String = text.chars().filter(|c| !c.is_whitespace()).collect();

    let isins: BTreeSet<String> = ISIN_SCAN
        .find_iter(&normalized)
        .chain(ISIN_SCAN.find_iter(&stripped))
        .map(|m| m.as_str())
        .filter(|candidate| is_valid_isin(candidate))
        .map(str::to_string)
        .collect();

    ExtractionResult {
        isins: isins.into_iter().collect(),
    }
}

/// ISIN-like tokens (11 to 13 characters) for diagnostics when matching looks off.
pub fn isin_like_tokens(text: &str, limit: usize) -> Vec<&str> {
    ISIN_LIKE
        .find_iter(text)
        .take(limit)
        .map(|m| m.as_str())
        .collect()
}

/// Any run starting with two capitals; logged when a document yields no ISIN.
pub fn uppercase_tokens(text: &str, limit: usize) -> Vec<&str> {
    UPPERCASE_TOKEN
        .find_iter(text)
        .take(limit)
        .map(|m| m.as_str())
        .collect()
}
