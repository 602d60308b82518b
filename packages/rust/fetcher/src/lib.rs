//! HTTP clients for the local food catalog and the product enrichment service.
//!
//! This crate provides:
//! - [`LocalSource`]: fetches the base catalog in one request
//! - [`EnrichmentFetcher`]: one concurrent lookup per record, joined all-or-nothing
//! - [`build_client`]: the shared `reqwest` client

pub mod enrichment;
pub mod local;

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use foodfacts_shared::{FoodFactsError, HttpConfig, Result};

pub use enrichment::EnrichmentFetcher;
pub use local::LocalSource;

/// User-Agent string for all outbound requests.
const USER_AGENT: &str = concat!("FoodFacts/", env!("CARGO_PKG_VERSION"));

/// Build a reqwest client with the configured timeout and redirect limit.
pub fn build_client(http: &HttpConfig) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(http.max_redirects))
        .timeout(Duration::from_secs(http.timeout_secs))
        .build()
        .map_err(|e| FoodFactsError::Network(format!("failed to build HTTP client: {e}")))
}

/// GET `url` and decode the body as JSON.
///
/// Transport and body-read failures are `Network`; undecodable bodies are
/// `Parse`. Non-2xx statuses are `Network` only when `require_success` is set,
/// otherwise the body is decoded as usual.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &Url,
    require_success: bool,
) -> Result<T> {
    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| FoodFactsError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        if require_success {
            return Err(FoodFactsError::Network(format!("{url}: HTTP {status}")));
        }
        debug!(%url, %status, "non-success status, decoding body anyway");
    }

    let body = response
        .text()
        .await
        .map_err(|e| FoodFactsError::Network(format!("{url}: body read failed: {e}")))?;

    serde_json::from_str(&body).map_err(|e| FoodFactsError::parse(format!("{url}: {e}")))
}
