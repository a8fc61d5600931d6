//! Network access for the edge cache.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Method;

use super::{EdgeRequest, EdgeResponse};
use crate::error::{Error, Result};

/// Performs the network leg of an intercepted request.
///
/// Any HTTP status is a successful fetch; only transport failures are errors.
#[allow(async_fn_in_trait)]
pub trait Fetcher {
    async fn fetch(&self, request: &EdgeRequest) -> Result<EdgeResponse>;
}

/// `reqwest`-backed fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| Error::InvalidInput(format!("Failed to construct HTTP client: {error}")))?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &EdgeRequest) -> Result<EdgeResponse> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| Error::InvalidInput(format!("Invalid HTTP method '{}'", request.method)))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect::<BTreeMap<_, _>>();
        let body = response.bytes().await?.to_vec();

        tracing::debug!("Fetched {} {} -> {}", request.method, request.url, status);
        Ok(EdgeResponse {
            status,
            headers,
            body,
        })
    }
}
