use clap::{Arg, ArgMatches, Command};
use std::env;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod http;
mod isin;
mod orchestrator;
mod retriever;
mod utils;

use config::{RetrieverConfig, ServerConfig, DEFAULT_FRONTEND_ORIGIN, DEFAULT_PORT};
use orchestrator::Orchestrator;
use retriever::Retriever;
use utils::pdf::PdfExtractDecoder;

fn cli() -> Command {
    Command::new("isin-extractor")
        .version(env!("CARGO_PKG_VERSION"))
        .about("HTTP service that extracts ISIN codes from PDF documents")
        .long_about(
            "Serves the following endpoints:\n\
            - GET  /             service metadata\n\
            - GET  /health       liveness check\n\
            - POST /extract-isin retrieve a PDF by URL and list the ISIN codes it contains\n\
            - POST /test-url     diagnose how a URL responds",
        )
        .arg(
            Arg::new("port")
                .long("port")
                .short('p')
                .value_name("PORT")
                .help("Port to listen on (env: PORT)")
                .value_parser(clap::value_parser!(u16))
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("frontend-url")
                .long("frontend-url")
                .value_name("ORIGIN")
                .help("Allowed CORS origin, '*' for any (env: FRONTEND_URL)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("attempt-timeout-secs")
                .long("attempt-timeout-secs")
                .value_name("SECS")
                .help("Timeout for each PDF retrieval attempt")
                .value_parser(clap::value_parser!(u64))
                .default_value("30"),
        )
        .arg(
            Arg::new("max-redirects")
                .long("max-redirects")
                .value_name("N")
                .help("Redirects followed per retrieval attempt")
                .value_parser(clap::value_parser!(usize))
                .default_value("10"),
        )
        .arg(
            Arg::new("alternative-timeout-secs")
                .long("alternative-timeout-secs")
                .value_name("SECS")
                .help("Timeout for each vendor alternative URL")
                .value_parser(clap::value_parser!(u64))
                .default_value("15"),
        )
        .arg(
            Arg::new("decode-timeout-secs")
                .long("decode-timeout-secs")
                .value_name("SECS")
                .help("Upper bound for PDF text extraction")
                .value_parser(clap::value_parser!(u64))
                .default_value("60"),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .help("Only log errors")
                .action(clap::ArgAction::SetTrue),
        )
}

fn server_config(matches: &ArgMatches) -> ServerConfig {
    // Flags win over environment variables.
    let port = matches
        .get_one::<u16>("port")
        .copied()
        .or_else(|| env::var("PORT").ok().and_then(|p| p.trim().parse().ok()))
        .unwrap_or(DEFAULT_PORT);

    let frontend_origin = matches
        .get_one::<String>("frontend-url")
        .cloned()
        .or_else(|| env::var("FRONTEND_URL").ok())
        .filter(|origin| !origin.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FRONTEND_ORIGIN.to_string());

    let secs = |name: &str, fallback: u64| {
        Duration::from_secs(matches.get_one::<u64>(name).copied().unwrap_or(fallback))
    };

    ServerConfig {
        port,
        frontend_origin,
        retriever: RetrieverConfig {
            attempt_timeout: secs("attempt-timeout-secs", 30),
            max_redirects: matches
                .get_one::<usize>("max-redirects")
                .copied()
                .unwrap_or(10),
            alternative_timeout: secs("alternative-timeout-secs", 15),
            ..RetrieverConfig::default()
        },
        decode_timeout: secs("decode-timeout-secs", 60),
    }
}

fn init_tracing(quiet: bool) {
    // RUST_LOG wins; otherwise info, or errors only in quiet mode
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if quiet { "error" } else { "info" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("quiet"));

    let config = server_config(&matches);
    info!(
        port = config.port,
        origin = %config.frontend_origin,
        attempt_timeout_secs = config.retriever.attempt_timeout.as_secs(),
        max_redirects = config.retriever.max_redirects,
        "Configuration loaded"
    );

    let retriever = match Retriever::new(config.retriever.clone()) {
        Ok(retriever) => retriever,
        Err(e) => {
            error!("Failed to create HTTP client: {}", e);
            process::exit(1);
        }
    };
    let orchestrator = Orchestrator::new(
        retriever,
        Arc::new(PdfExtractDecoder),
        config.decode_timeout,
    );

    info!("Starting ISIN Extractor server...");
    if let Err(e) = http::server::serve(config, orchestrator).await {
        error!("Failed to start server: {:#}", e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let matches = cli()
            .try_get_matches_from([
                "isin-extractor",
                "--port",
                "8080",
                "--frontend-url",
                "https://isin.example.org",
                "--attempt-timeout-secs",
                "5",
                "--max-redirects",
                "3",
            ])
            .expect("valid args");
        let config = server_config(&matches);
        assert_eq!(config.port, 8080);
        assert_eq!(config.frontend_origin, "https://isin.example.org");
        assert_eq!(config.retriever.attempt_timeout, Duration::from_secs(5));
        assert_eq!(config.retriever.max_redirects, 3);
        assert_eq!(config.retriever.max_depth, 2);
        assert_eq!(config.decode_timeout, Duration::from_secs(60));
    }

    #[test]
    fn rejects_non_numeric_port() {
        assert!(cli()
            .try_get_matches_from(["isin-extractor", "--port", "http"])
            .is_err());
    }
}
