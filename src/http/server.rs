use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::types::{
    Endpoints, ErrorBody, ExtractDebug, ExtractRequest, ExtractResponse, HealthStatus,
    ServiceInfo, TestUrlRequest,
};
use crate::config::ServerConfig;
use crate::error::ProcessError;
use crate::orchestrator::Orchestrator;

const MAX_JSON_BODY_BYTES: usize = 2 * 1024 * 1024;

pub struct AppState {
    pub orchestrator: Orchestrator,
}

pub fn build_router(state: Arc<AppState>, config: &ServerConfig) -> anyhow::Result<Router> {
    let router = Router::new()
        .route("/", get(service_info))
        .route("/health", get(health))
        .route("/extract-isin", post(extract_isin))
        .route("/test-url", post(test_url))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_JSON_BODY_BYTES))
        .layer(cors_layer(config)?)
        .with_state(state);

    Ok(router)
}

pub async fn serve(config: ServerConfig, orchestrator: Orchestrator) -> anyhow::Result<()> {
    let app = build_router(Arc::new(AppState { orchestrator }), &config)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!(target: "http", %addr, origin = %config.frontend_origin, "ISIN Extractor server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!(target: "http", "Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(target: "http", "Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!(target: "http", "Shutdown signal received");
}

fn cors_layer(config: &ServerConfig) -> anyhow::Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if config.allows_any_origin() {
        return Ok(layer.allow_origin(Any));
    }

    let origin = HeaderValue::from_str(config.frontend_origin.trim())
        .with_context(|| format!("invalid CORS origin '{}'", config.frontend_origin))?;
    Ok(layer.allow_origin(origin).allow_credentials(true))
}

async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: "ISIN Extractor API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: Endpoints {
            health: "GET /health".to_string(),
            extract_isin: "POST /extract-isin".to_string(),
            test_url: "POST /test-url".to_string(),
        },
    })
}

async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
    })
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(ErrorBody::new("Not found"))).into_response()
}

async fn extract_isin(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Response {
    // Only a non-object body is discarded; fields are lenient on their own.
    let request: ExtractRequest = match payload {
        Ok(Json(value)) => serde_json::from_value(value).unwrap_or_default(),
        Err(rejection) => return rejection_response(rejection),
    };

    let span = info_span!("extract_isin", request_id = %Uuid::new_v4());
    async move {
        let pdf_url = request.pdf_url.unwrap_or_default();
        match state.orchestrator.process(&pdf_url).await {
            Ok(report) => {
                let debug = request.debug.then(|| ExtractDebug {
                    text_length: report.text_length,
                    text_sample: report.text_sample.clone(),
                    pages: report.pages,
                });
                let count = report.result.count();
                Json(ExtractResponse {
                    pdf_url: report.pdf_url,
                    isins: report.result.isins,
                    count,
                    debug,
                })
                .into_response()
            }
            Err(err) => {
                match &err {
                    ProcessError::BadRequest(_) => {
                        warn!(target: "http", "Rejected request: {}", err)
                    }
                    _ => error!(target: "http", url = %pdf_url.trim(), "Failed to process the PDF: {}", err),
                }
                error_response(&err, request.debug)
            }
        }
    }
    .instrument(span)
    .await
}

async fn test_url(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Response {
    let request: TestUrlRequest = match payload {
        Ok(Json(value)) => serde_json::from_value(value).unwrap_or_default(),
        Err(rejection) => return rejection_response(rejection),
    };

    let url = match request.url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => {
            return (StatusCode::BAD_REQUEST, Json(ErrorBody::new("url is required")))
                .into_response()
        }
    };

    info!(target: "http", url = %url, "Probing URL");
    match state.orchestrator.retriever().probe(&url).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            warn!(target: "http", url = %url, "Probe failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody::new(e.to_string())),
            )
                .into_response()
        }
    }
}

fn error_response(err: &ProcessError, debug: bool) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = ErrorBody {
        error: err.user_message(),
        debug: debug.then(|| err.debug_details()),
    };
    (status, Json(body)).into_response()
}

fn rejection_response(rejection: JsonRejection) -> Response {
    warn!(target: "http", "Invalid JSON body: {}", rejection.body_text());
    (
        rejection.status(),
        Json(ErrorBody::new(format!(
            "Invalid request body: {}",
            rejection.body_text()
        ))),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrieverConfig;
    use crate::retriever::Retriever;
    use crate::utils::pdf::{DecodeError, DecodedDocument, PdfTextDecoder};
    use httpmock::prelude::*;
    use serde_json::{json, Value};
    use std::time::Duration;

    struct FixedDecoder(&'static str);

    impl PdfTextDecoder for FixedDecoder {
        fn decode(&self, _bytes: &[u8]) -> Result<DecodedDocument, DecodeError> {
            Ok(DecodedDocument {
                text: self.0.to_string(),
                page_count: 3,
            })
        }
    }

    async fn spawn_app(decoder: FixedDecoder) -> String {
        let retriever = Retriever::new(RetrieverConfig {
            attempt_timeout: Duration::from_secs(5),
            ..RetrieverConfig::default()
        })
        .expect("client builds");
        let orchestrator = Orchestrator::new(retriever, Arc::new(decoder), Duration::from_secs(5));
        let app = build_router(Arc::new(AppState { orchestrator }), &ServerConfig::default())
            .expect("router builds");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move { axum::serve(listener, app).await });
        format!("http://{}", addr)
    }

    async fn post_json(url: String, body: Value) -> (u16, Value) {
        let response = reqwest::Client::new()
            .post(url)
            .json(&body)
            .send()
            .await
            .expect("request");
        let status = response.status().as_u16();
        (status, response.json().await.expect("json body"))
    }

    #[tokio::test]
    async fn health_and_metadata() {
        let base = spawn_app(FixedDecoder("")).await;

        let health: Value = reqwest::get(format!("{}/health", base))
            .await
            .expect("health")
            .json()
            .await
            .expect("json");
        assert_eq!(health, json!({ "status": "ok" }));

        let info: Value = reqwest::get(format!("{}/", base))
            .await
            .expect("info")
            .json()
            .await
            .expect("json");
        assert_eq!(info["name"], "ISIN Extractor API");
        assert_eq!(info["endpoints"]["extractIsin"], "POST /extract-isin");
    }

    #[tokio::test]
    async fn missing_or_blank_url_is_400() {
        let base = spawn_app(FixedDecoder("")).await;

        let (status, body) = post_json(format!("{}/extract-isin", base), json!({})).await;
        assert_eq!(status, 400);
        assert_eq!(body, json!({ "error": "pdfUrl is required" }));

        let (status, _) =
            post_json(format!("{}/extract-isin", base), json!({ "pdfUrl": "   " })).await;
        assert_eq!(status, 400);

        let (status, _) =
            post_json(format!("{}/extract-isin", base), json!({ "pdfUrl": 42 })).await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn extracts_isins_with_debug_details() {
        let upstream = MockServer::start_async().await;
        upstream
            .mock_async(|when, then| {
                when.method(GET).path("/annual.pdf");
                then.status(200)
                    .header("content-type", "application/pdf")
                    .body("%PDF-1.4");
            })
            .await;
        let base = spawn_app(FixedDecoder("US0378331005 random FR0000120271")).await;

        let pdf_url = upstream.url("/annual.pdf");
        let (status, body) = post_json(
            format!("{}/extract-isin", base),
            json!({ "pdfUrl": pdf_url, "debug": true }),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["pdfUrl"], pdf_url);
        assert_eq!(body["isins"], json!(["FR0000120271", "US0378331005"]));
        assert_eq!(body["count"], 2);
        assert_eq!(body["debug"]["pages"], 3);
        assert_eq!(body["debug"]["textLength"], 32);

        let (_, body) =
            post_json(format!("{}/extract-isin", base), json!({ "pdfUrl": pdf_url })).await;
        assert!(body.get("debug").is_none());
    }

    #[tokio::test]
    async fn non_boolean_debug_does_not_hide_the_url() {
        let upstream = MockServer::start_async().await;
        upstream
            .mock_async(|when, then| {
                when.method(GET).path("/annual.pdf");
                then.status(200).body("%PDF-1.4");
            })
            .await;
        let base = spawn_app(FixedDecoder("US0378331005")).await;
        let pdf_url = upstream.url("/annual.pdf");

        for (debug, expect_debug) in [
            (json!(null), false),
            (json!("true"), true),
            (json!(1), true),
            (json!(0), false),
            (json!(""), false),
        ] {
            let (status, body) = post_json(
                format!("{}/extract-isin", base),
                json!({ "pdfUrl": pdf_url, "debug": debug }),
            )
            .await;
            assert_eq!(status, 200, "debug = {}", debug);
            assert_eq!(body["isins"], json!(["US0378331005"]));
            assert_eq!(body.get("debug").is_some(), expect_debug, "debug = {}", debug);
        }
    }

    #[tokio::test]
    async fn empty_document_is_distinct_from_zero_matches() {
        let upstream = MockServer::start_async().await;
        upstream
            .mock_async(|when, then| {
                when.method(GET).path("/scan.pdf");
                then.status(200).body("%PDF-1.4");
            })
            .await;
        let base = spawn_app(FixedDecoder("   ")).await;

        let (status, body) = post_json(
            format!("{}/extract-isin", base),
            json!({ "pdfUrl": upstream.url("/scan.pdf"), "debug": true }),
        )
        .await;
        assert_eq!(status, 400);
        assert!(body["error"]
            .as_str()
            .unwrap_or_default()
            .starts_with("No text could be extracted"));
        assert_eq!(body["debug"], json!({ "extractedLength": 0 }));
    }

    #[tokio::test]
    async fn upstream_5xx_status_is_propagated() {
        let upstream = MockServer::start_async().await;
        upstream
            .mock_async(|when, then| {
                when.method(GET).path("/down.pdf");
                then.status(503);
            })
            .await;
        let base = spawn_app(FixedDecoder("")).await;

        let (status, body) = post_json(
            format!("{}/extract-isin", base),
            json!({ "pdfUrl": upstream.url("/down.pdf") }),
        )
        .await;
        assert_eq!(status, 503);
        assert_eq!(body["error"], "Server returned error: 503 Service Unavailable");
    }

    #[tokio::test]
    async fn probe_endpoint() {
        let upstream = MockServer::start_async().await;
        upstream
            .mock_async(|when, then| {
                when.method(GET).path("/x.pdf");
                then.status(200).body("%PDF-1.4");
            })
            .await;
        let base = spawn_app(FixedDecoder("")).await;

        let (status, body) = post_json(format!("{}/test-url", base), json!({})).await;
        assert_eq!(status, 400);
        assert_eq!(body["error"], "url is required");

        let (status, body) = post_json(
            format!("{}/test-url", base),
            json!({ "url": upstream.url("/x.pdf") }),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["isPdf"], true);
        assert_eq!(body["contentLength"], 8);
    }

    #[tokio::test]
    async fn malformed_json_gets_an_error_body() {
        let base = spawn_app(FixedDecoder("")).await;
        let response = reqwest::Client::new()
            .post(format!("{}/extract-isin", base))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .expect("request");
        assert_eq!(response.status().as_u16(), 400);
        let body: Value = response.json().await.expect("json");
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn unknown_routes_are_json_404() {
        let base = spawn_app(FixedDecoder("")).await;
        let response = reqwest::get(format!("{}/nope", base)).await.expect("request");
        assert_eq!(response.status().as_u16(), 404);
        let body: Value = response.json().await.expect("json");
        assert_eq!(body["error"], "Not found");
    }

    #[tokio::test]
    async fn cors_allows_any_origin_by_default() {
        let base = spawn_app(FixedDecoder("")).await;
        let response = reqwest::Client::new()
            .get(format!("{}/health", base))
            .header("origin", "https://app.example.org")
            .send()
            .await
            .expect("request");
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
    }

    #[test]
    fn invalid_origin_is_a_startup_error() {
        let config = ServerConfig {
            frontend_origin: "https://bad\norigin".to_string(),
            ..ServerConfig::default()
        };
        assert!(cors_layer(&config).is_err());
    }
}
