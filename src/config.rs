use std::time::Duration;

// Sent with every retrieval attempt
pub const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_FRONTEND_ORIGIN: &str = "*";

/// Process-wide settings, built once in `main` and passed down explicitly.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Allowed CORS origin. `*` allows any origin.
    pub frontend_origin: String,
    pub retriever: RetrieverConfig,
    /// Upper bound for the blocking PDF-to-text step.
    pub decode_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            frontend_origin: DEFAULT_FRONTEND_ORIGIN.to_string(),
            retriever: RetrieverConfig::default(),
            decode_timeout: Duration::from_secs(60),
        }
    }
}

impl ServerConfig {
    pub fn allows_any_origin(&self) -> bool {
        self.frontend_origin.trim() == "*"
    }
}

#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Wall-clock limit for one network attempt, redirects included.
    pub attempt_timeout: Duration,
    pub max_redirects: usize,
    /// Recursion beyond this depth fails without touching the network.
    pub max_depth: u32,
    /// Timeout for each vendor alternative tried after the main path fails.
    pub alternative_timeout: Duration,
    pub probe_timeout: Duration,
    pub probe_max_redirects: usize,
    pub user_agent: String,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(30),
            max_redirects: 10,
            max_depth: 2,
            alternative_timeout: Duration::from_secs(15),
            probe_timeout: Duration::from_secs(10),
            probe_max_redirects: 5,
            user_agent: BROWSER_UA.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_limits() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 4000);
        assert!(config.allows_any_origin());
        assert_eq!(config.retriever.max_depth, 2);
        assert_eq!(config.retriever.max_redirects, 10);
        assert_eq!(config.retriever.attempt_timeout, Duration::from_secs(30));
    }

    #[test]
    fn specific_origin_is_not_wildcard() {
        let config = ServerConfig {
            frontend_origin: "https://isin.example.org".to_string(),
            ..ServerConfig::default()
        };
        assert!(!config.allows_any_origin());
    }
}
