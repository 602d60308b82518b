//! Local food catalog client.

use reqwest::Client;
use tracing::{info, instrument};
use url::Url;

use foodfacts_shared::{FoodFactsError, HttpConfig, LocalFoodRecord, Result};

use crate::get_json;

/// The first-party API serving the base food catalog.
#[derive(Debug, Clone)]
pub struct LocalSource {
    client: Client,
    url: Url,
    require_success: bool,
}

impl LocalSource {
    pub fn new(client: Client, url: &str, http: &HttpConfig) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| FoodFactsError::config(format!("invalid local URL '{url}': {e}")))?;

        Ok(Self {
            client,
            url,
            require_success: http.require_success,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Fetch every catalog record in one request.
    #[instrument(skip_all, fields(url = %self.url))]
    pub async fn fetch_all(&self) -> Result<Vec<LocalFoodRecord>> {
        let records: Vec<LocalFoodRecord> =
            get_json(&self.client, &self.url, self.require_success).await?;

        info!(count = records.len(), "local catalog fetched");
        Ok(records)
    }
}
