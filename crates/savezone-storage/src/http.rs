//! HTTP transport used by remote adapters.
//!
//! Adapters build [`HttpRequest`]s and read [`HttpResponse`]s; the transport
//! only moves bytes. Status handling stays in the adapters.

use async_trait::async_trait;
use reqwest::{Body, Client};
pub use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio_util::io::ReaderStream;

use savezone_core::error::{Result, SavezoneError};

/// Request payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpBody {
    Bytes(Vec<u8>),
    /// Streamed from disk when the request is sent.
    File { path: PathBuf, length: u64 },
}

impl HttpBody {
    /// Payload streamed from the file at `path`.
    pub fn file(path: &Path) -> Result<Self> {
        let length = std::fs::metadata(path)?.len();
        Ok(HttpBody::File {
            path: path.to_path_buf(),
            length,
        })
    }

    pub fn len(&self) -> u64 {
        match self {
            HttpBody::Bytes(bytes) => bytes.len() as u64,
            HttpBody::File { length, .. } => *length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// In-memory bytes; `None` for file payloads.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            HttpBody::Bytes(bytes) => Some(bytes),
            HttpBody::File { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<HttpBody>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.push((key.to_string(), value.into()));
        self
    }

    /// `Authorization: <scheme> <token>`
    pub fn authorization(self, scheme: &str, token: &str) -> Self {
        self.header("Authorization", format!("{scheme} {token}"))
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(HttpBody::Bytes(body));
        self
    }

    pub fn payload(mut self, body: HttpBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Stream the file at `path` as the payload.
    pub fn file_body(self, path: &Path) -> Result<Self> {
        Ok(self.payload(HttpBody::file(path)?))
    }

    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_ref().and_then(HttpBody::as_bytes)
    }

    pub fn json(self, value: &Value) -> Self {
        let body = value.to_string().into_bytes();
        self.header("Content-Type", "application/json; charset=UTF-8")
            .body(body)
    }

    /// URL with the query string appended, unencoded. For logs and matching.
    pub fn display_url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        let query: Vec<String> = self
            .query
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        format!("{}?{}", self.url, query.join("&"))
    }

    pub fn header_value(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn from_json(status: u16, value: Value) -> Self {
        Self::new(status, value.to_string()).with_header("Content-Type", "application/json")
    }

    pub fn empty(status: u16) -> Self {
        Self::new(status, Vec::new())
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            SavezoneError::remote(self.status, format!("unexpected response body: {e}"))
        })
    }

    /// Provider message from an error body.
    ///
    /// Yandex answers `{"message": ...}`, Google `{"error": {"message": ...}}`.
    pub fn message(&self) -> String {
        let parsed: Option<Value> = serde_json::from_slice(&self.body).ok();
        parsed
            .as_ref()
            .and_then(|v| {
                v.get("message")
                    .or_else(|| v.pointer("/error/message"))
                    .or_else(|| v.get("error_description"))
                    .and_then(Value::as_str)
            })
            .map(str::to_string)
            .unwrap_or_else(|| String::from_utf8_lossy(&self.body).trim().to_string())
    }

    /// Machine-readable error code (`{"error": "DiskPathDoesntExistsError"}`).
    pub fn error_code(&self) -> Option<String> {
        let parsed: Value = serde_json::from_slice(&self.body).ok()?;
        parsed.get("error")?.as_str().map(str::to_string)
    }

    /// Convert into a `Remote` error carrying status and provider message.
    pub fn into_error(self) -> SavezoneError {
        let message = self.message();
        SavezoneError::remote(self.status, message)
    }

    /// Pass successful responses through, fail everything else.
    pub fn ensure_success(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(self.into_error())
        }
    }
}

/// Sends requests and returns raw responses; never fails on a status code.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// `reqwest`-backed transport.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .query(&request.query);
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        match request.body {
            Some(HttpBody::Bytes(bytes)) => builder = builder.body(bytes),
            Some(HttpBody::File { path, length }) => {
                let file = tokio::fs::File::open(&path).await?;
                builder = builder
                    .header(reqwest::header::CONTENT_LENGTH, length.to_string())
                    .body(Body::wrap_stream(ReaderStream::new(file)));
            }
            None => {}
        }

        let response = builder
            .send()
            .await
            .map_err(|e| SavezoneError::Http(e.to_string()))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| SavezoneError::Http(e.to_string()))?
            .to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
