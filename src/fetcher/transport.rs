use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use reqwest::Proxy;
use thiserror::Error;
use tracing::debug;

pub const TOKEN_HEADER: &str = "x-secure-token";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundRequest {
    pub endpoint: String,
    pub token: String,
    pub body: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("{0}")]
    Other(String),

    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to setup proxy: {proxy}: {source}")]
    ProxySetup {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },
}

/// One POST round-trip to the result provider.
pub trait Transport {
    fn send(&self, request: OutboundRequest) -> BoxFuture<'_, Result<RawResponse, TransportError>>;
}

#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout_secs: u64, proxy: Option<&str>) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(timeout_secs));
        if let Some(proxy) = proxy.map(str::trim).filter(|p| !p.is_empty()) {
            let p = Proxy::all(proxy).map_err(|source| TransportError::ProxySetup {
                proxy: proxy.to_string(),
                source,
            })?;
            builder = builder.proxy(p);
        }
        let client = builder
            .build()
            .map_err(|source| TransportError::HttpClientBuild { source })?;
        Ok(Self { client })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: OutboundRequest) -> BoxFuture<'_, Result<RawResponse, TransportError>> {
        Box::pin(async move {
            let token = HeaderValue::from_str(&request.token)
                .map_err(|e| TransportError::Other(format!("invalid token header: {e}")))?;
            debug!(endpoint = %request.endpoint, "posting lookup request");
            let resp = self
                .client
                .post(&request.endpoint)
                .header(CONTENT_TYPE, "application/json")
                .header(TOKEN_HEADER, token)
                .header(CACHE_CONTROL, "no-store")
                .header(PRAGMA, "no-cache")
                .body(request.body)
                .send()
                .await
                .map_err(classify)?;
            let status = resp.status().as_u16();
            let body = resp.text().await.map_err(classify)?;
            debug!(status, body_len = body.len(), "lookup response received");
            Ok(RawResponse { status, body })
        })
    }
}
