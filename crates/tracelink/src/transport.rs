// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery of encoded event batches to the ingestion endpoint.

use std::error::Error as StdError;
use std::time::Duration;

use async_trait::async_trait;
use http::header::{HeaderMap, HeaderValue, InvalidHeaderValue, CONTENT_TYPE};
use http::StatusCode;
use tracing::error;

use crate::config::Config;
use crate::propagation::RECURSIVE_HEADER;
use crate::{LIBRARY_NAME, LIBRARY_VERSION};

pub const PRIVATE_KEY_HEADER: &str = "x-tracelink-private-key";
pub const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to send request: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),
}

/// Sends one batch and reports the status code. Only a 2xx status confirms
/// delivery; the response body is not inspected.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, body: Vec<u8>, headers: HeaderMap) -> Result<StatusCode, TransportError>;
}

/// Headers of every ingestion call.
pub fn ingest_headers(config: &Config) -> Result<HeaderMap, TransportError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(PROTOBUF_CONTENT_TYPE));
    headers.insert(PRIVATE_KEY_HEADER, HeaderValue::from_str(&config.private_key)?);
    if config.recursive {
        headers.insert(RECURSIVE_HEADER, HeaderValue::from_static("1"));
    }
    Ok(headers)
}

/// `PUT {base_url}/api/ingest/be` over reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            client: get_client(config),
            url: config.ingest_url(),
        }
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, body: Vec<u8>, headers: HeaderMap) -> Result<StatusCode, TransportError> {
        let response = self
            .client
            .put(&self.url)
            .headers(headers)
            .body(body)
            .send()
            .await?;
        Ok(response.status())
    }
}

/// `User-Agent` of ingestion calls, e.g. `tracelink-rust/0.1.0`.
pub fn user_agent() -> String {
    format!("{LIBRARY_NAME}/{LIBRARY_VERSION}")
}

/// Builds the HTTP client, falling back to a direct connection when the proxy
/// configuration is unusable.
#[must_use]
pub fn get_client(config: &Config) -> reqwest::Client {
    match build_client(config, true) {
        Ok(client) => client,
        Err(e) => {
            error!(
                "TRACELINK | Unable to parse proxy configuration: {}, falling back to direct connection",
                e
            );
            match build_client(config, false) {
                Ok(client) => client,
                Err(inner) => {
                    error!(
                        "TRACELINK | Failed to build HTTP client without proxy: {}, using reqwest defaults",
                        inner
                    );
                    reqwest::Client::new()
                }
            }
        }
    }
}

fn build_client(config: &Config, allow_proxy: bool) -> Result<reqwest::Client, Box<dyn StdError>> {
    let mut client = reqwest::Client::builder()
        .user_agent(user_agent())
        .timeout(config.request_timeout)
        .pool_idle_timeout(Some(Duration::from_secs(270)))
        .tcp_keepalive(Some(Duration::from_secs(120)));

    if allow_proxy {
        if let Some(https_uri) = &config.https_proxy {
            let proxy = reqwest::Proxy::https(https_uri.clone())?;
            client = client.proxy(proxy);
        }
    }

    Ok(client.build()?)
}
