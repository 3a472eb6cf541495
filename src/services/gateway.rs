use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Relative to the API base url, or absolute for pagination links.
    pub path: String,
    pub body: Option<Value>,
    pub token: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            token: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path).with_body(body)
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Patch, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub data: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Performs one request. Non-2xx statuses are still `Ok`; only transport failures are `Err`.
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError>;
}

#[derive(Clone)]
pub struct ReqwestTransport {
    base_url: String,
    client: reqwest::Client,
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ReqwestTransport")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent("evalboard")
            .build()
            .map_err(|err| {
                ApiError::Configuration(format!("failed to initialize HTTP client: {err}"))
            })?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    fn url_for(&self, path: &str) -> String {
        resolve_url(&self.base_url, path)
    }
}

pub fn resolve_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = self.url_for(&request.path);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Patch => self.client.patch(&url),
            Method::Delete => self.client.delete(&url),
        };
        if let Some(token) = &request.token {
            builder = builder.header("Authorization", format!("Token {token}"));
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| ApiError::Transport(format!("{} {url}: {err}", request.method.as_str())))?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|err| {
            ApiError::Transport(format!("failed to read response from {url}: {err}"))
        })?;

        Ok(ApiResponse {
            status,
            data: parse_body(&text),
        })
    }
}

fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Sends requests and maps every call to exactly one outcome. No retry, no caching.
#[derive(Clone)]
pub struct Gateway {
    transport: Arc<dyn HttpTransport>,
}

impl fmt::Debug for Gateway {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("Gateway").finish_non_exhaustive()
    }
}

impl Gateway {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    pub async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        debug!(method = request.method.as_str(), path = %request.path, "sending request");
        let response = self.transport.execute(&request).await?;
        if response.is_success() {
            return Ok(response.data);
        }
        warn!(
            method = request.method.as_str(),
            path = %request.path,
            status = response.status,
            "request failed"
        );
        Err(ApiError::Status {
            status: response.status,
            body: response.data,
        })
    }

    pub async fn fetch<T>(&self, request: ApiRequest) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let path = request.path.clone();
        let data = self.send(request).await?;
        serde_json::from_value(data).map_err(|err| ApiError::Decode(format!("{path}: {err}")))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays queued responses in order and records every request it sees.
    #[derive(Debug, Default)]
    pub struct StubTransport {
        requests: Mutex<Vec<ApiRequest>>,
        responses: Mutex<VecDeque<Result<ApiResponse, String>>>,
    }

    impl StubTransport {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn push_ok(&self, data: Value) {
            self.push_status(200, data);
        }

        pub fn push_status(&self, status: u16, data: Value) {
            self.responses
                .lock()
                .unwrap()
                .push_back(Ok(ApiResponse { status, data }));
        }

        pub fn push_transport_error(&self, message: &str) {
            self.responses
                .lock()
                .unwrap()
                .push_back(Err(message.to_string()));
        }

        pub fn requests(&self) -> Vec<ApiRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl HttpTransport for StubTransport {
        async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
            self.requests.lock().unwrap().push(request.clone());
            match self.responses.lock().unwrap().pop_front() {
                Some(Ok(response)) => Ok(response),
                Some(Err(message)) => Err(ApiError::Transport(message)),
                None => Err(ApiError::Transport(
                    "stub transport has no more queued responses".to_string(),
                )),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::StubTransport;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url("http://host/api/", "/auth/login/"),
            "http://host/api/auth/login/"
        );
        assert_eq!(
            resolve_url("http://host/api", "hosts/challenge_host_team/"),
            "http://host/api/hosts/challenge_host_team/"
        );
        assert_eq!(
            resolve_url("http://host/api/", "https://other/api/x/?page=3"),
            "https://other/api/x/?page=3"
        );
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body("{\"a\":1}"), json!({ "a": 1 }));
        assert_eq!(parse_body("Bad Gateway"), json!("Bad Gateway"));
    }

    #[tokio::test]
    async fn test_success_returns_data() {
        let stub = StubTransport::new();
        stub.push_ok(json!({ "token": "abc" }));
        let gateway = Gateway::new(stub.clone());

        let data = gateway
            .send(ApiRequest::post("auth/login/", json!({ "username": "u" })))
            .await
            .unwrap();
        assert_eq!(data["token"], "abc");
        assert_eq!(stub.request_count(), 1);
        assert_eq!(stub.requests()[0].method, Method::Post);
    }

    #[tokio::test]
    async fn test_error_status_passes_body_through() {
        let stub = StubTransport::new();
        stub.push_status(403, json!({ "detail": "nope" }));
        let gateway = Gateway::new(stub.clone());

        let err = gateway
            .send(ApiRequest::get("challenges/challenge/1/"))
            .await
            .unwrap_err();
        match err {
            ApiError::Status { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, json!({ "detail": "nope" }));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_retry_on_transport_error() {
        let stub = StubTransport::new();
        stub.push_transport_error("connection refused");
        stub.push_ok(json!({}));
        let gateway = Gateway::new(stub.clone());

        let err = gateway.send(ApiRequest::get("x/")).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
        assert_eq!(stub.request_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_decode_error() {
        let stub = StubTransport::new();
        stub.push_ok(json!({ "unexpected": true }));
        let gateway = Gateway::new(stub.clone());

        let err = gateway
            .fetch::<crate::models::AuthToken>(ApiRequest::get("auth/"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }
}
