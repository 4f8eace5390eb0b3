use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Body of `POST /extract-isin`. Each field is read on its own: a non-string
/// `pdfUrl` counts as missing and `debug` follows JSON truthiness.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractRequest {
    #[serde(rename = "pdfUrl", default, deserialize_with = "string_or_none")]
    pub pdf_url: Option<String>,
    #[serde(default, deserialize_with = "truthy")]
    pub debug: bool,
}

fn string_or_none<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn truthy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractResponse {
    #[serde(rename = "pdfUrl")]
    pub pdf_url: String,
    pub isins: Vec<String>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<ExtractDebug>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractDebug {
    pub text_length: usize,
    pub text_sample: String,
    pub pages: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestUrlRequest {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            debug: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub endpoints: Endpoints,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoints {
    pub health: String,
    pub extract_isin: String,
    pub test_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: String,
}
