//! REST transport contract consumed by models and collections.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ApiConfig;
use crate::data::error::{DataError, FieldErrors, BASE_ERROR_KEY};

/// Query string parameters, kept sorted for stable URLs.
pub type QueryParams = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Envelope every API response is wrapped in.
///
/// `success != true` is uniformly a failure; `message` and `errors` describe it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Value>,
}

impl ApiResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data,
            message: None,
            errors: None,
        }
    }

    pub fn failure(message: impl Into<String>, errors: Option<Value>) -> Self {
        Self {
            success: false,
            data: Value::Null,
            message: Some(message.into()),
            errors,
        }
    }

    /// Unwrap the payload, turning a failed envelope into [`DataError::Api`].
    pub fn into_result(self) -> Result<Value, DataError> {
        if self.success {
            return Ok(self.data);
        }
        Err(DataError::Api {
            message: self
                .message
                .unwrap_or_else(|| "Request failed".to_string()),
            errors: self.errors.as_ref().map(parse_field_errors).unwrap_or_default(),
        })
    }
}

/// Normalise the loosely-shaped `errors` member into [`FieldErrors`].
///
/// Accepts `{field: "msg"}`, `{field: ["msg", ..]}`, `["msg", ..]` and `"msg"`.
pub fn parse_field_errors(errors: &Value) -> FieldErrors {
    let mut parsed = FieldErrors::new();
    match errors {
        Value::Object(map) => {
            for (field, messages) in map {
                let list = match messages {
                    Value::Array(items) => items.iter().map(message_text).collect(),
                    other => vec![message_text(other)],
                };
                parsed.insert(field.clone(), list);
            }
        }
        Value::Array(items) => {
            parsed.insert(
                BASE_ERROR_KEY.to_string(),
                items.iter().map(message_text).collect(),
            );
        }
        Value::Null => {}
        other => {
            parsed.insert(BASE_ERROR_KEY.to_string(), vec![message_text(other)]);
        }
    }
    parsed
}

fn message_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Asynchronous REST transport.
///
/// Implementations own timeouts and retries; the core imposes none.
#[async_trait(?Send)]
pub trait RestTransport: Send + Sync {
    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        params: Option<&QueryParams>,
    ) -> Result<ApiResponse, DataError>;

    async fn get(&self, url: &str, params: Option<&QueryParams>) -> Result<ApiResponse, DataError> {
        self.request(Method::Get, url, None, params).await
    }

    async fn post(&self, url: &str, body: &Value) -> Result<ApiResponse, DataError> {
        self.request(Method::Post, url, Some(body), None).await
    }

    async fn put(&self, url: &str, body: &Value) -> Result<ApiResponse, DataError> {
        self.request(Method::Put, url, Some(body), None).await
    }

    async fn delete(&self, url: &str) -> Result<ApiResponse, DataError> {
        self.request(Method::Delete, url, None, None).await
    }
}

/// `reqwest`-backed transport talking JSON to `base_url`.
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &ApiConfig) -> Result<Self, DataError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(u64::from(config.timeout_seconds)))
            .connect_timeout(Duration::from_secs(u64::from(config.connect_timeout_seconds)))
            .build()
            .map_err(|e| DataError::Transport {
                method: "-",
                url: config.base_url.clone(),
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for `url`; relative endpoints are joined onto the base.
    fn resolve(&self, method: Method, url: &str, params: Option<&QueryParams>) -> Result<Url, DataError> {
        let full = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}/{}", self.base_url, url.trim_start_matches('/'))
        };

        let mut parsed = Url::parse(&full).map_err(|e| DataError::Transport {
            method: method.as_str(),
            url: full.clone(),
            message: format!("Invalid URL: {}", e),
        })?;

        if let Some(params) = params.filter(|p| !p.is_empty()) {
            let mut pairs = parsed.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(parsed)
    }
}

#[async_trait(?Send)]
impl RestTransport for HttpTransport {
    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        params: Option<&QueryParams>,
    ) -> Result<ApiResponse, DataError> {
        let target = self.resolve(method, url, params)?;
        let transport_error = |message: String| DataError::Transport {
            method: method.as_str(),
            url: target.to_string(),
            message,
        };

        let mut builder = self.client.request(method.into(), target.clone());
        if let Some(body) = body {
            builder = builder.json(body);
        }

        tracing::debug!(method = method.as_str(), url = %target, "REST request");

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(e.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(format!("Failed to read response body: {}", e)))?;

        match serde_json::from_slice::<ApiResponse>(&bytes) {
            Ok(mut envelope) => {
                if !status.is_success() {
                    envelope.success = false;
                    if envelope.message.is_none() {
                        envelope.message = Some(format!("HTTP {}", status));
                    }
                }
                Ok(envelope)
            }
            Err(_) if !status.is_success() => Ok(ApiResponse::failure(format!("HTTP {}", status), None)),
            Err(e) => Err(DataError::Decode(format!(
                "{} {}: {}",
                method.as_str(),
                target,
                e
            ))),
        }
    }
}
