use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static PDF_PREVIEW_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/pdfPreview/(\d+)").expect("valid pdfPreview regex"));

/// Hard-coded knowledge about one document host whose viewer URLs don't serve PDF bytes.
///
/// A rule recognizes `/pdfPreview/<id>` URLs on its domain (or any subdomain)
/// and builds download URLs under `base_url` from the path templates, where
/// `{id}` stands for the document id. `direct_path` feeds an extra retrieval
/// attempt, `alternative_paths` are tried only once everything else failed.
#[derive(Debug, Clone)]
pub struct VendorRule {
    pub name: &'static str,
    domain: String,
    base_url: String,
    direct_path: &'static str,
    alternative_paths: &'static [&'static str],
}

impl VendorRule {
    pub fn credit_agricole() -> Self {
        Self {
            name: "credit-agricole",
            domain: "credit-agricole.com".to_string(),
            base_url: "https://www.credit-agricole.com".to_string(),
            direct_path: "/content/dam/cacorp/pdf/en/{id}.pdf",
            alternative_paths: &[
                "/content/dam/cacorp/pdf/en/{id}.pdf",
                "/content/dam/cacorp/pdf/fr/{id}.pdf",
                "/content/dam/cacorp/pdf/{id}.pdf",
                "/pdf/{id}.pdf",
            ],
        }
    }

    /// Same rule, but matching and downloading from `base_url` instead.
    #[cfg(test)]
    pub fn served_from(mut self, base_url: &str) -> Self {
        let parsed = Url::parse(base_url).expect("valid base url");
        self.domain = parsed.host_str().expect("base url has a host").to_string();
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn direct_download(&self, url: &str) -> Option<String> {
        let id = self.document_id(url)?;
        Some(self.expand(self.direct_path, &id))
    }

    pub fn alternative_downloads(&self, url: &str) -> Vec<String> {
        self.document_id(url)
            .map(|id| {
                self.alternative_paths
                    .iter()
                    .map(|path| self.expand(path, &id))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn matches_host(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        host == self.domain
            || host
                .strip_suffix(self.domain.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    }

    fn document_id(&self, url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        if !self.matches_host(parsed.host_str()?) {
            return None;
        }
        PDF_PREVIEW_ID
            .captures(parsed.path())
            .and_then(|caps| caps.get(1))
            .map(|id| id.as_str().to_string())
    }

    fn expand(&self, path: &str, id: &str) -> String {
        format!("{}{}", self.base_url, path.replace("{id}", id))
    }
}

/// Rules applied by a default [`Retriever`](super::Retriever).
pub fn default_rules() -> Vec<VendorRule> {
    vec![VendorRule::credit_agricole()]
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREVIEW: &str =
        "https://www.credit-agricole.com/en/finance/pdfPreview/197123?lang=en";

    #[test]
    fn rewrites_preview_to_direct_download() {
        let rule = VendorRule::credit_agricole();
        assert_eq!(
            rule.direct_download(PREVIEW).as_deref(),
            Some("https://www.credit-agricole.com/content/dam/cacorp/pdf/en/197123.pdf")
        );
    }

    #[test]
    fn lists_alternatives_in_order() {
        let alternatives = VendorRule::credit_agricole().alternative_downloads(PREVIEW);
        assert_eq!(alternatives.len(), 4);
        assert!(alternatives[1].ends_with("/cacorp/pdf/fr/197123.pdf"));
        assert_eq!(
            alternatives[3],
            "https://www.credit-agricole.com/pdf/197123.pdf"
        );
    }

    #[test]
    fn ignores_other_hosts_and_paths() {
        let rule = VendorRule::credit_agricole();
        assert!(rule
            .direct_download("https://example.com/pdfPreview/197123")
            .is_none());
        assert!(rule
            .direct_download("https://www.credit-agricole.com/en/finance/report.pdf")
            .is_none());
        assert!(rule
            .direct_download("https://www.credit-agricole.com/pdfPreview/abc")
            .is_none());
        assert!(rule.alternative_downloads("not a url").is_empty());
    }

    #[test]
    fn host_must_be_the_domain_or_a_subdomain() {
        let rule = VendorRule::credit_agricole();
        assert!(rule
            .direct_download("https://credit-agricole.com/pdfPreview/7")
            .is_some());
        assert!(rule
            .direct_download("https://docs.www.CREDIT-AGRICOLE.com/pdfPreview/7")
            .is_some());
        assert!(rule
            .direct_download("https://evilcredit-agricole.com/pdfPreview/7")
            .is_none());
        assert!(rule
            .direct_download("https://credit-agricole.com.attacker.net/pdfPreview/7")
            .is_none());
    }

    #[test]
    fn served_from_rebases_matching_and_downloads() {
        let rule = VendorRule::credit_agricole().served_from("http://127.0.0.1:8080/");
        assert_eq!(
            rule.direct_download("http://127.0.0.1:8080/en/pdfPreview/5").as_deref(),
            Some("http://127.0.0.1:8080/content/dam/cacorp/pdf/en/5.pdf")
        );
        assert!(rule.direct_download(PREVIEW).is_none());
    }
}
