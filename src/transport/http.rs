//! Pooled HTTP transport with bounded retry

use super::{RetryPolicy, TransportError};
use reqwest::{Client, RequestBuilder, StatusCode};

/// A fully read HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: StatusCode,
    pub body: String,
}

impl HttpReply {
    /// Create a reply (used by verifiers' tests and fakes)
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// A `200 OK` reply
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, body)
    }
}

/// An encoded request, built fresh per call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpRequest {
    Get {
        url: String,
    },
    Post {
        url: String,
        body: String,
        content_type: &'static str,
    },
}

impl HttpRequest {
    /// Target URL
    pub fn url(&self) -> &str {
        match self {
            HttpRequest::Get { url } | HttpRequest::Post { url, .. } => url,
        }
    }

    /// Request body, if any
    pub fn body(&self) -> Option<&str> {
        match self {
            HttpRequest::Get { .. } => None,
            HttpRequest::Post { body, .. } => Some(body),
        }
    }
}

impl std::fmt::Display for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpRequest::Get { url } => write!(f, "GET {}", url),
            HttpRequest::Post { url, body, .. } => write!(f, "POST {} {}", url, body),
        }
    }
}

/// HTTP client shared by every request of one adapter
pub struct HttpTransport {
    client: Client,
    retry: RetryPolicy,
}

impl HttpTransport {
    /// Create a transport with the default client settings
    pub fn new(retry: RetryPolicy) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(concat!("tsbench/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::from_reqwest("http client", e))?;

        Ok(Self { client, retry })
    }

    /// The retry policy applied to every request
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Execute an encoded request
    pub async fn send(&self, request: &HttpRequest) -> Result<HttpReply, TransportError> {
        match request {
            HttpRequest::Get { url } => self.get(url).await,
            HttpRequest::Post {
                url,
                body,
                content_type,
            } => self.post(url, body, content_type).await,
        }
    }

    /// GET `url`, asking for JSON
    pub async fn get(&self, url: &str) -> Result<HttpReply, TransportError> {
        self.execute(url, || {
            self.client
                .get(url)
                .header(reqwest::header::ACCEPT, "application/json")
        })
        .await
    }

    /// POST `body` to `url` with the given content type
    pub async fn post(
        &self,
        url: &str,
        body: &str,
        content_type: &str,
    ) -> Result<HttpReply, TransportError> {
        self.execute(url, || {
            self.client
                .post(url)
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(body.to_string())
        })
        .await
    }

    /// PUT with an empty body
    pub async fn put(&self, url: &str) -> Result<HttpReply, TransportError> {
        self.execute(url, || self.client.put(url)).await
    }

    /// Send a request under the retry policy and read the whole body, which
    /// also hands the connection back to the pool.
    async fn execute<B>(&self, url: &str, build: B) -> Result<HttpReply, TransportError>
    where
        B: Fn() -> RequestBuilder,
    {
        self.retry
            .run(url, || {
                let request = build();
                async move {
                    let response = request
                        .send()
                        .await
                        .map_err(|e| TransportError::from_reqwest(url, e))?;
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .map_err(|e| TransportError::from_reqwest(url, e))?;
                    Ok(HttpReply { status, body })
                }
            })
            .await
    }
}
