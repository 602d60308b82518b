//! Enrichment fan-out/fan-in.
//!
//! One product lookup per local record, all in flight at once (optionally
//! capped). Each task carries its request key, so results are joined back to
//! their records regardless of completion order. The batch succeeds only if
//! every lookup succeeds.

use std::sync::Arc;

use reqwest::Client;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};
use url::Url;
use url::form_urlencoded;

use foodfacts_shared::{
    EnrichedFood, ExternalFoodRecord, FoodFactsError, HttpConfig, LocalFoodRecord, Result,
};

use crate::get_json;

/// Placeholder substituted with each record's barcode.
const BARCODE_PLACEHOLDER: &str = "{barcode}";

/// URL-safe stand-in used while the template is parsed.
const BARCODE_MARKER: &str = "__foodfacts_barcode__";

/// Identifies one outbound lookup within a batch.
#[derive(Debug, Clone)]
struct RequestKey {
    slot: usize,
    barcode: String,
}

/// Client for the external product enrichment service.
#[derive(Debug, Clone)]
pub struct EnrichmentFetcher {
    client: Client,
    /// Template with the placeholder swapped for [`BARCODE_MARKER`].
    template: Url,
    require_success: bool,
    max_concurrency: usize,
}

impl EnrichmentFetcher {
    pub fn new(client: Client, url_template: &str, http: &HttpConfig) -> Result<Self> {
        if !url_template.contains(BARCODE_PLACEHOLDER) {
            return Err(FoodFactsError::config(format!(
                "URL template '{url_template}' has no {BARCODE_PLACEHOLDER} placeholder"
            )));
        }

        let template = Url::parse(&url_template.replace(BARCODE_PLACEHOLDER, BARCODE_MARKER))
            .map_err(|e| {
                FoodFactsError::config(format!("invalid URL template '{url_template}': {e}"))
            })?;

        Ok(Self {
            client,
            template,
            require_success: http.require_success,
            max_concurrency: http.max_concurrency,
        })
    }

    /// Lookup URL for one barcode, percent-encoded into the placeholder slot.
    pub fn product_url(&self, barcode: &str) -> Result<Url> {
        let mut url = self.template.clone();

        let segments: Vec<String> = match url.path_segments() {
            Some(segments) => segments.map(|s| s.replace(BARCODE_MARKER, barcode)).collect(),
            None => Vec::new(),
        };
        if !segments.is_empty() {
            url.path_segments_mut()
                .map_err(|_| {
                    FoodFactsError::config(format!(
                        "URL template {} cannot carry a path",
                        self.template
                    ))
                })?
                .clear()
                .extend(segments.iter());
        }

        if let Some(query) = url.query().filter(|q| q.contains(BARCODE_MARKER)) {
            let encoded: String = form_urlencoded::byte_serialize(barcode.as_bytes()).collect();
            let query = query.replace(BARCODE_MARKER, &encoded);
            url.set_query(Some(&query));
        }

        Ok(url)
    }

    /// External records in the same order as `records`.
    pub async fn fetch_enrichment(
        &self,
        records: &[LocalFoodRecord],
    ) -> Result<Vec<ExternalFoodRecord>> {
        Ok(self
            .fetch_paired(records)
            .await?
            .into_iter()
            .map(|e| e.external)
            .collect())
    }

    /// Look up every record concurrently and join each result to its record.
    ///
    /// The first failure observed fails the whole batch; requests still in
    /// flight are left to finish in the background and their results dropped.
    #[instrument(skip_all, fields(records = records.len()))]
    pub async fn fetch_paired(&self, records: &[LocalFoodRecord]) -> Result<Vec<EnrichedFood>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        // Resolve every URL before anything is sent.
        let urls = records
            .iter()
            .map(|r| self.product_url(&r.barcode))
            .collect::<Result<Vec<_>>>()?;

        let semaphore =
            (self.max_concurrency > 0).then(|| Arc::new(Semaphore::new(self.max_concurrency)));

        info!(
            requests = records.len(),
            max_concurrency = self.max_concurrency,
            "starting enrichment fan-out"
        );

        let mut tasks = JoinSet::new();
        for (slot, (record, url)) in records.iter().zip(urls).enumerate() {
            let key = RequestKey {
                slot,
                barcode: record.barcode.clone(),
            };
            let client = self.client.clone();
            let sem = semaphore.clone();
            let require_success = self.require_success;

            tasks.spawn(async move {
                let result = fetch_product(&client, &url, require_success, sem).await;
                (key, result)
            });
        }

        let mut slots: Vec<Option<ExternalFoodRecord>> = vec![None; records.len()];

        while let Some(joined) = tasks.join_next().await {
            let (key, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    tasks.detach_all();
                    return Err(FoodFactsError::Network(format!("enrichment task failed: {e}")));
                }
            };

            match result {
                Ok(external) => {
                    let local = &records[key.slot];
                    debug!(
                        name = %local.name,
                        barcode = %key.barcode,
                        data = ?external,
                        "API data for {}",
                        local.name
                    );
                    if external.is_not_found() {
                        warn!(
                            barcode = %key.barcode,
                            status = ?external.status_verbose,
                            "product not found upstream"
                        );
                    }
                    slots[key.slot] = Some(external);
                }
                Err(e) => {
                    warn!(
                        barcode = %key.barcode,
                        error = %e,
                        "enrichment lookup failed, abandoning batch"
                    );
                    tasks.detach_all();
                    return Err(e);
                }
            }
        }

        records
            .iter()
            .zip(slots)
            .map(|(local, external)| {
                external
                    .map(|external| EnrichedFood {
                        local: local.clone(),
                        external,
                    })
                    .ok_or_else(|| {
                        FoodFactsError::Network(format!(
                            "no response for barcode {}",
                            local.barcode
                        ))
                    })
            })
            .collect()
    }
}

async fn fetch_product(
    client: &Client,
    url: &Url,
    require_success: bool,
    semaphore: Option<Arc<Semaphore>>,
) -> Result<ExternalFoodRecord> {
    let _permit = match semaphore {
        Some(sem) => Some(
            sem.acquire_owned()
                .await
                .map_err(|e| FoodFactsError::Network(format!("{url}: {e}")))?,
        ),
        None => None,
    };

    get_json(client, url, require_success).await
}
