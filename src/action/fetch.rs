use std::collections::BTreeMap;

use async_trait::async_trait;
use mockall::automock;
use reqwest::header::CONTENT_TYPE;

use super::capability::CapabilityError;
use crate::config::FetchConfig;
use crate::value::{Record, Value};
use crate::{Error, InternalResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub status_text: String,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"))
    }
}

#[automock]
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, CapabilityError>;
}

/// Joins a relative URL onto `base_url`. Absolute URLs are kept.
pub fn resolve_url(base_url: Option<&str>, url: &str) -> String {
    match base_url {
        Some(base) if !url.contains("://") => {
            format!("{}/{}", base.trim_end_matches('/'), url.trim_start_matches('/'))
        }
        _ => url.to_string(),
    }
}

/// Builds the outgoing request from resolved `fetch` parameters.
///
/// Method defaults to GET. GET and HEAD never carry a body. Records and
/// arrays are JSON encoded with a JSON content type unless a content type
/// header was given explicitly.
pub fn build_request(
    base_url: Option<&str>,
    url: &str,
    method: Option<&str>,
    headers: Option<&Record>,
    body: Option<&Value>,
) -> FetchRequest {
    let method = method
        .filter(|m| !m.trim().is_empty())
        .map(|m| m.trim().to_ascii_uppercase())
        .unwrap_or_else(|| "GET".to_string());

    let mut request_headers: BTreeMap<String, String> = headers
        .map(|headers| {
            headers
                .iter()
                .filter(|(_, value)| !value.is_nullish())
                .map(|(name, value)| (name.clone(), value.to_display_string()))
                .collect()
        })
        .unwrap_or_default();

    let body = match body {
        _ if method == "GET" || method == "HEAD" => None,
        None | Some(Value::Undefined) | Some(Value::Null) => None,
        Some(value @ (Value::Object(_) | Value::Array(_))) => {
            let has_content_type = request_headers
                .keys()
                .any(|name| name.eq_ignore_ascii_case("content-type"));
            if !has_content_type {
                request_headers.insert("Content-Type".to_string(), "application/json".to_string());
            }
            Some(value.to_json_string())
        }
        Some(value) => Some(value.to_display_string()),
    };

    FetchRequest {
        url: resolve_url(base_url, url),
        method,
        headers: request_headers,
        body,
    }
}

/// JSON content types must decode; anything else is tried as JSON and
/// falls back to text.
pub fn parse_body(response: &FetchResponse) -> Result<Value, serde_json::Error> {
    if response.is_json() {
        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        return serde_json::from_str::<serde_json::Value>(&response.body).map(Value::from);
    }
    Ok(serde_json::from_str::<serde_json::Value>(&response.body)
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(response.body.clone())))
}

/// [`HttpClient`] backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new(config: &FetchConfig) -> InternalResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, CapabilityError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| CapabilityError::Request(e.to_string()))?;
        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CapabilityError::Request(e.to_string()))?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| CapabilityError::Request(e.to_string()))?;

        Ok(FetchResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            content_type,
            body,
        })
    }
}
