//! PDF link discovery in HTML landing pages.
//!
//! Rules are independent and evaluated in priority order; the first rule whose
//! match resolves to a usable absolute URL wins.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

pub struct LinkRule {
    pub name: &'static str,
    pattern: Regex,
}

impl LinkRule {
    fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("valid link rule regex"),
        }
    }

    /// First raw link this rule captures in `html`.
    pub fn find<'h>(&self, html: &'h str) -> Option<&'h str> {
        self.pattern
            .captures(html)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

static LINK_RULES: Lazy<Vec<LinkRule>> = Lazy::new(|| {
    vec![
        LinkRule::new("href", r#"(?i)href=["']([^"']*\.pdf[^"']*)["']"#),
        LinkRule::new("src", r#"(?i)src=["']([^"']*\.pdf[^"']*)["']"#),
        LinkRule::new("css-url", r#"(?i)url\(["']?([^"')]*\.pdf[^"')]*)["']?\)"#),
        LinkRule::new("pdf-path", r#"(?i)["']([^"']*/pdf/[^"']*)["']"#),
        LinkRule::new("file-path", r#"(?i)["']([^"']*/file/[^"']*\.pdf[^"']*)["']"#),
    ]
});

pub fn link_rules() -> &'static [LinkRule] {
    &LINK_RULES
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfLink {
    pub rule: &'static str,
    pub url: String,
}

/// Resolves `link` against the page it was found on.
///
/// Handles absolute, root-relative and path-relative links; only http(s)
/// results are returned.
pub fn resolve_link(link: &str, base: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    let link = link.trim().replace("&amp;", "&");
    if link.is_empty() {
        return None;
    }

    let resolved = base.join(&link).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

/// Finds the first PDF-looking link in `html` that points somewhere other than `page_url`.
pub fn find_pdf_link(html: &str, page_url: &str) -> Option<PdfLink> {
    let current = Url::parse(page_url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| page_url.to_string());

    link_rules().iter().find_map(|rule| {
        let raw = rule.find(html)?;
        let url = resolve_link(raw, page_url)?;
        (url != current).then_some(PdfLink {
            rule: rule.name,
            url,
        })
    })
}
