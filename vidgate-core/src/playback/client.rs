use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::HeaderMap;
use reqwest::{redirect, Client, Method, StatusCode};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(error: reqwest::Error) -> Self {
        UpstreamError::Transport(error.to_string())
    }
}

pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// One upstream response: status, headers, and the body as a lazy stream
/// of transport-sized blocks.
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: BoxStream<'static, UpstreamResult<Bytes>>,
}

impl UpstreamResponse {
    /// Drains the body into a single buffer. Used for small non-video
    /// payloads such as an upstream 403 page.
    pub async fn into_bytes(mut self) -> UpstreamResult<Bytes> {
        let mut buffer = Vec::new();
        while let Some(block) = self.body.next().await {
            buffer.extend_from_slice(&block?);
        }
        Ok(Bytes::from(buffer))
    }
}

/// Seam over the outbound HTTP client so the resolver and fetcher can be
/// exercised against scripted responses in tests.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn head(&self, url: &Url, headers: &HeaderMap) -> UpstreamResult<UpstreamResponse>;
    async fn post(
        &self,
        url: &Url,
        headers: &HeaderMap,
        body: Vec<u8>,
    ) -> UpstreamResult<UpstreamResponse>;
}

/// Production client for the googlevideo origin. Redirects are never
/// followed automatically; the resolver owns the redirect chase.
pub struct GoogleVideoClient {
    client: Client,
}

impl GoogleVideoClient {
    pub fn new(timeout: Duration) -> UpstreamResult<Self> {
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl UpstreamClient for GoogleVideoClient {
    async fn head(&self, url: &Url, headers: &HeaderMap) -> UpstreamResult<UpstreamResponse> {
        let response = self
            .client
            .request(Method::HEAD, url.clone())
            .headers(headers.clone())
            .send()
            .await?;
        Ok(into_upstream(response))
    }

    async fn post(
        &self,
        url: &Url,
        headers: &HeaderMap,
        body: Vec<u8>,
    ) -> UpstreamResult<UpstreamResponse> {
        let response = self
            .client
            .request(Method::POST, url.clone())
            .headers(headers.clone())
            .body(body)
            .send()
            .await?;
        Ok(into_upstream(response))
    }
}

fn into_upstream(response: reqwest::Response) -> UpstreamResponse {
    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .bytes_stream()
        .map(|block| block.map_err(UpstreamError::from))
        .boxed();
    UpstreamResponse {
        status,
        headers,
        body,
    }
}
