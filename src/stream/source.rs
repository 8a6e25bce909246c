//! Where log bytes come from.
//!
//! The viewer only sees [`LogSource`] and [`LogBody`]; the HTTP implementation
//! goes through the stream-logs proxy because upstream log hosts generally do
//! not allow direct cross-origin reads.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{StatusCode, Url};

use crate::errors::StreamError;

/// Path of the proxy endpoint, relative to the API base URL.
pub const STREAM_LOGS_PATH: &str = "api/stream-logs";

/// An open response body, read one chunk at a time.
#[async_trait]
pub trait LogBody: Send {
    /// Next chunk of raw bytes, `Ok(None)` once the stream has ended.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError>;
}

/// Abstraction over log fetching for testability.
/// Real implementation: `HttpLogSource`.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Start fetching `target`. `Ok(None)` means the response carried no readable body.
    async fn open(&self, target: &str) -> Result<Option<Box<dyn LogBody>>, StreamError>;
}

/// Fetches logs through `GET {base}/api/stream-logs?url=<target>`.
#[derive(Debug, Clone)]
pub struct HttpLogSource {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpLogSource {
    pub fn new(base_url: &str) -> Result<Self, StreamError> {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, StreamError> {
        Ok(Self {
            client,
            endpoint: stream_logs_endpoint(base_url)?,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// Resolve the proxy endpoint under `base_url`, keeping any path prefix.
fn stream_logs_endpoint(base_url: &str) -> Result<Url, StreamError> {
    let invalid = |message: String| StreamError::InvalidUrl {
        url: base_url.to_string(),
        message,
    };
    let mut base = base_url.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    let base = Url::parse(&base).map_err(|e| invalid(e.to_string()))?;
    if base.cannot_be_a_base() {
        return Err(invalid("not a base URL".to_string()));
    }
    base.join(STREAM_LOGS_PATH)
        .map_err(|e| invalid(e.to_string()))
}

#[async_trait]
impl LogSource for HttpLogSource {
    async fn open(&self, target: &str) -> Result<Option<Box<dyn LogBody>>, StreamError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("url", target)])
            .send()
            .await
            .map_err(StreamError::Request)?;

        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::Status {
                status: status.as_u16(),
            });
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        Ok(Some(Box::new(HttpLogBody { response })))
    }
}

struct HttpLogBody {
    response: reqwest::Response,
}

#[async_trait]
impl LogBody for HttpLogBody {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError> {
        self.response
            .chunk()
            .await
            .map_err(|e| StreamError::Read(e.to_string()))
    }
}
