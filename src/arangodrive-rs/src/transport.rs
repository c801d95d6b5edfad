use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client as HttpClient, Method, RequestBuilder, Response};
use serde_json::Value;

use crate::{ClientError, Result};

/// Transport performs single HTTP requests against one ArangoDB host.
///
/// Paths are absolute (`/_api/database`) and appended to the host. Every
/// method fails with `ClientError::Server` on a non-2xx status.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `body` as JSON and decode the JSON response. An empty response
    /// body decodes as `Value::Null`.
    async fn query(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value>;

    async fn delete(&self, path: &str) -> Result<u16>;

    async fn put(&self, path: &str, body: Option<&Value>) -> Result<u16>;

    async fn patch(&self, path: &str, body: &Value) -> Result<u16>;

    /// PATCH with a pre-serialized JSON payload
    async fn patch_raw(&self, path: &str, raw: Vec<u8>) -> Result<u16>;

    /// Bearer token sent with every later request
    fn set_jwt(&mut self, token: String);
}

/// reqwest-backed transport
pub struct HttpTransport {
    base_url: String,
    jwt: Option<String>,
    client: HttpClient,
}

impl HttpTransport {
    /// Create a transport for the given host, e.g. `http://localhost:8529/`
    pub fn new(host: impl Into<String>) -> Self {
        let host = host.into();
        Self {
            base_url: host.trim_end_matches('/').to_string(),
            jwt: None,
            client: HttpClient::new(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.request(method, url);
        match &self.jwt {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(status, "ArangoDB returned an error response");
            return Err(ClientError::from_response(status, &body));
        }

        Ok(response)
    }

    async fn status_of(&self, builder: RequestBuilder) -> Result<u16> {
        let response = self.send(builder).await?;
        Ok(response.status().as_u16())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn query(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let mut builder = self.request(method, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = self.send(builder).await?;
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn delete(&self, path: &str) -> Result<u16> {
        self.status_of(self.request(Method::DELETE, path)).await
    }

    async fn put(&self, path: &str, body: Option<&Value>) -> Result<u16> {
        let mut builder = self.request(Method::PUT, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        self.status_of(builder).await
    }

    async fn patch(&self, path: &str, body: &Value) -> Result<u16> {
        self.status_of(self.request(Method::PATCH, path).json(body))
            .await
    }

    async fn patch_raw(&self, path: &str, raw: Vec<u8>) -> Result<u16> {
        let builder = self
            .request(Method::PATCH, path)
            .header(CONTENT_TYPE, "application/json")
            .body(raw);
        self.status_of(builder).await
    }

    fn set_jwt(&mut self, token: String) {
        self.jwt = Some(token);
    }
}
