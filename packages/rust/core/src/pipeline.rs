//! Two-phase render pipeline: catalog → baseline view → enrichment → enriched view.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use foodfacts_fetcher::{EnrichmentFetcher, LocalSource, build_client};
use foodfacts_render::{RenderNode, RenderSurface, attach_all, build_food_item, enrichment_nodes};
use foodfacts_shared::{AppConfig, HttpConfig, Result, RunId};

/// Configuration for one pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Local catalog endpoint.
    pub local_url: String,
    /// Enrichment URL template containing `{barcode}`.
    pub external_url_template: String,
    /// Selector of the container receiving the local-only view.
    pub baseline_container: String,
    /// Selector of the container receiving the enriched view.
    pub enriched_container: String,
    /// HTTP client settings shared by both clients.
    pub http: HttpConfig,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            local_url: config.sources.local_url.clone(),
            external_url_template: config.sources.external_url_template.clone(),
            baseline_container: config.render.baseline_container.clone(),
            enriched_container: config.render.enriched_container.clone(),
            http: config.http.clone(),
        }
    }
}

/// Pipeline stages, always visited in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    FetchLocal,
    RenderBaseline,
    FetchEnrichment,
    RenderEnriched,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::FetchLocal => "Fetching local catalog",
            Self::RenderBaseline => "Rendering baseline view",
            Self::FetchEnrichment => "Fetching product data",
            Self::RenderEnriched => "Rendering enriched view",
        };
        f.write_str(label)
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    /// Records returned by the local catalog.
    pub local_count: usize,
    pub baseline_attached: usize,
    pub enriched_attached: usize,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a stage.
    fn stage(&self, stage: PipelineStage);
    /// Called when the run completes successfully.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage(&self, _stage: PipelineStage) {}
    fn done(&self, _report: &RunReport) {}
}

/// The fetch-and-render pipeline.
///
/// Stages run strictly in sequence and are never revisited. Any failure ends
/// the run; whatever was already attached stays on the surface. Running twice
/// against the same surface appends a second copy of every view.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    local: LocalSource,
    enrichment: EnrichmentFetcher,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let client = build_client(&config.http)?;
        let local = LocalSource::new(client.clone(), &config.local_url, &config.http)?;
        let enrichment =
            EnrichmentFetcher::new(client, &config.external_url_template, &config.http)?;

        Ok(Self {
            config,
            local,
            enrichment,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage once against `surface`.
    #[instrument(skip_all, fields(local_url = %self.config.local_url))]
    pub async fn run<S>(
        &self,
        surface: &mut S,
        progress: &dyn ProgressReporter,
    ) -> Result<RunReport>
    where
        S: RenderSurface + ?Sized,
    {
        let start = Instant::now();
        let run_id = RunId::new();
        let started_at = Utc::now();

        info!(%run_id, "starting render pipeline");

        // --- FetchLocal ---
        progress.stage(PipelineStage::FetchLocal);
        let records = self
            .local
            .fetch_all()
            .await
            .inspect_err(|e| stage_failed(PipelineStage::FetchLocal, e))?;

        // --- RenderBaseline ---
        progress.stage(PipelineStage::RenderBaseline);
        let baseline: Vec<RenderNode> = records
            .iter()
            .map(|record| build_food_item(&*surface, record, Vec::new()))
            .collect();
        let baseline_attached = attach_all(surface, baseline, &self.config.baseline_container)
            .inspect_err(|e| stage_failed(PipelineStage::RenderBaseline, e))?;

        // --- FetchEnrichment ---
        progress.stage(PipelineStage::FetchEnrichment);
        let enriched = self
            .enrichment
            .fetch_paired(&records)
            .await
            .inspect_err(|e| stage_failed(PipelineStage::FetchEnrichment, e))?;

        // --- RenderEnriched ---
        progress.stage(PipelineStage::RenderEnriched);
        let enriched_nodes: Vec<RenderNode> = enriched
            .iter()
            .map(|item| {
                let extra = enrichment_nodes(&*surface, &item.external);
                build_food_item(&*surface, &item.local, extra)
            })
            .collect();
        let enriched_attached =
            attach_all(surface, enriched_nodes, &self.config.enriched_container)
                .inspect_err(|e| stage_failed(PipelineStage::RenderEnriched, e))?;

        let report = RunReport {
            run_id,
            started_at,
            local_count: records.len(),
            baseline_attached,
            enriched_attached,
            elapsed: start.elapsed(),
        };

        progress.done(&report);

        info!(
            run_id = %report.run_id,
            local_count = report.local_count,
            baseline_attached = report.baseline_attached,
            enriched_attached = report.enriched_attached,
            elapsed_ms = report.elapsed.as_millis(),
            "render pipeline complete"
        );

        Ok(report)
    }
}

fn stage_failed(stage: PipelineStage, error: &foodfacts_shared::FoodFactsError) {
    warn!(?stage, error = %error, "pipeline stage failed");
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use foodfacts_render::HtmlDocument;
    use foodfacts_shared::FoodFactsError;
    use scraper::{Html, Selector};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config_for(server: &MockServer) -> PipelineConfig {
        PipelineConfig {
            local_url: format!("{}/food", server.uri()),
            external_url_template: format!("{}/api/v0/product/{{barcode}}.json", server.uri()),
            baseline_container: "#foodList".into(),
            enriched_container: "#foodList2".into(),
            http: HttpConfig::default(),
        }
    }

    fn page() -> HtmlDocument {
        HtmlDocument::with_containers(["foodList", "foodList2"])
    }

    async fn mount_catalog(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/food"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    async fn mount_product(server: &MockServer, barcode: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(format!("/api/v0/product/{barcode}.json")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    fn food(name: &str, barcode: &str) -> serde_json::Value {
        serde_json::json!({
            "name": name,
            "type": "Main",
            "ethnicity": "Mexican",
            "barcode": barcode
        })
    }

    fn generic_product() -> serde_json::Value {
        serde_json::json!({"product": {"ingredients_text": "x", "countries": "y",
            "nutriments": {"energy": 1, "fat": 2, "sugars": 3}}})
    }

    fn texts(node: &RenderNode) -> Vec<&str> {
        node.children().iter().map(RenderNode::text).collect()
    }

    fn headings(doc: &HtmlDocument, selector: &str) -> Vec<String> {
        doc.container_children(selector)
            .unwrap()
            .iter()
            .map(|n| n.children()[0].text().to_string())
            .collect()
    }

    #[derive(Default)]
    struct RecordingProgress {
        stages: Mutex<Vec<PipelineStage>>,
        done: Mutex<bool>,
    }

    impl ProgressReporter for RecordingProgress {
        fn stage(&self, stage: PipelineStage) {
            self.stages.lock().unwrap().push(stage);
        }

        fn done(&self, _report: &RunReport) {
            *self.done.lock().unwrap() = true;
        }
    }

    #[tokio::test]
    async fn taco_scenario_renders_enriched_item() {
        let server = MockServer::start().await;
        mount_catalog(&server, serde_json::json!([food("Taco", "111")])).await;
        mount_product(
            &server,
            "111",
            serde_json::json!({"product": {"ingredients_text": "corn, beef", "countries": "Mexico",
                "nutriments": {"energy": 200, "fat": 10, "sugars": 1}}}),
        )
        .await;

        let pipeline = Pipeline::new(config_for(&server)).unwrap();
        let mut doc = page();
        let report = pipeline.run(&mut doc, &SilentProgress).await.unwrap();

        assert_eq!(report.local_count, 1);
        assert_eq!(report.baseline_attached, 1);
        assert_eq!(report.enriched_attached, 1);

        let baseline = doc.container_children("#foodList").unwrap();
        assert_eq!(texts(&baseline[0]), vec!["Taco", "Main", "Mexican"]);

        let enriched = doc.container_children("#foodList2").unwrap();
        assert_eq!(enriched.len(), 1);
        assert_eq!(enriched[0].class(), Some("foodItem"));
        assert_eq!(
            texts(&enriched[0]),
            vec!["Taco", "Main", "Mexican", "corn, beef", "Mexico", "200", "10", "1"]
        );
    }

    #[tokio::test]
    async fn baseline_and_enriched_keep_catalog_order() {
        let server = MockServer::start().await;
        let names = ["Taco", "Pho", "Paella", "Pierogi"];
        let catalog: Vec<_> = names
            .iter()
            .enumerate()
            .map(|(i, n)| food(n, &format!("{i}")))
            .collect();
        mount_catalog(&server, serde_json::Value::Array(catalog)).await;
        for i in 0..names.len() {
            mount_product(&server, &i.to_string(), generic_product()).await;
        }

        let pipeline = Pipeline::new(config_for(&server)).unwrap();
        let mut doc = page();
        pipeline.run(&mut doc, &SilentProgress).await.unwrap();

        assert_eq!(headings(&doc, "#foodList"), names);
        assert_eq!(headings(&doc, "#foodList2"), names);
        for node in doc.container_children("#foodList2").unwrap() {
            assert_eq!(node.children().len(), 8);
        }
    }

    #[tokio::test]
    async fn failed_lookup_leaves_enriched_view_empty() {
        let server = MockServer::start().await;
        mount_catalog(
            &server,
            serde_json::json!([food("Taco", "111"), food("Pho", "222")]),
        )
        .await;
        mount_product(&server, "111", generic_product()).await;
        Mock::given(path("/api/v0/product/222.json"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        // The status is not checked by default; the empty body fails to decode.
        let pipeline = Pipeline::new(config_for(&server)).unwrap();
        let mut doc = page();
        let err = pipeline.run(&mut doc, &SilentProgress).await.unwrap_err();

        assert!(matches!(err, FoodFactsError::Parse { .. }));
        assert_eq!(headings(&doc, "#foodList"), vec!["Taco", "Pho"]);
        assert!(doc.container_children("#foodList2").unwrap().is_empty());

        let mut strict = config_for(&server);
        strict.http.require_success = true;
        let mut doc = page();
        let err = Pipeline::new(strict)
            .unwrap()
            .run(&mut doc, &SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, FoodFactsError::Network(ref m) if m.contains("502")));
        assert!(doc.container_children("#foodList2").unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_product_renders_blank_enrichment() {
        let server = MockServer::start().await;
        mount_catalog(&server, serde_json::json!([food("Mystery", "999")])).await;
        Mock::given(path("/api/v0/product/999.json"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "status": 0,
                "status_verbose": "product not found"
            })))
            .mount(&server)
            .await;

        let pipeline = Pipeline::new(config_for(&server)).unwrap();
        let mut doc = page();
        let report = pipeline.run(&mut doc, &SilentProgress).await.unwrap();

        assert_eq!(report.enriched_attached, 1);
        let enriched = doc.container_children("#foodList2").unwrap();
        assert_eq!(
            texts(&enriched[0]),
            vec!["Mystery", "Main", "Mexican", "", "", "", "", ""]
        );
    }

    #[tokio::test]
    async fn running_twice_accumulates() {
        let server = MockServer::start().await;
        mount_catalog(
            &server,
            serde_json::json!([food("Taco", "111"), food("Pho", "222")]),
        )
        .await;
        mount_product(&server, "111", generic_product()).await;
        mount_product(&server, "222", generic_product()).await;

        let pipeline = Pipeline::new(config_for(&server)).unwrap();
        let mut doc = page();
        pipeline.run(&mut doc, &SilentProgress).await.unwrap();
        pipeline.run(&mut doc, &SilentProgress).await.unwrap();

        assert_eq!(
            headings(&doc, "#foodList"),
            vec!["Taco", "Pho", "Taco", "Pho"]
        );
        assert_eq!(doc.container_children("#foodList2").unwrap().len(), 4);
    }

    #[tokio::test]
    async fn local_failure_renders_nothing() {
        let server = MockServer::start().await;
        Mock::given(path("/food"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .mount(&server)
            .await;

        let pipeline = Pipeline::new(config_for(&server)).unwrap();
        let mut doc = page();
        let err = pipeline.run(&mut doc, &SilentProgress).await.unwrap_err();

        assert!(matches!(err, FoodFactsError::Parse { .. }));
        assert!(doc.container_children("#foodList").unwrap().is_empty());
        assert!(doc.container_children("#foodList2").unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_baseline_container_stops_before_enrichment() {
        let server = MockServer::start().await;
        mount_catalog(&server, serde_json::json!([food("Taco", "111")])).await;
        mount_product(&server, "111", generic_product()).await;

        let pipeline = Pipeline::new(config_for(&server)).unwrap();
        let mut doc = HtmlDocument::with_containers(["foodList2"]);
        let err = pipeline.run(&mut doc, &SilentProgress).await.unwrap_err();

        assert!(matches!(
            err,
            FoodFactsError::ContainerNotFound { ref selector } if selector == "#foodList"
        ));
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1, "only the catalog request is sent");
        assert!(doc.container_children("#foodList2").unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_enriched_container_keeps_baseline() {
        let server = MockServer::start().await;
        mount_catalog(&server, serde_json::json!([food("Taco", "111")])).await;
        mount_product(&server, "111", generic_product()).await;

        let pipeline = Pipeline::new(config_for(&server)).unwrap();
        let mut doc = HtmlDocument::with_containers(["foodList"]);
        let err = pipeline.run(&mut doc, &SilentProgress).await.unwrap_err();

        assert!(matches!(err, FoodFactsError::ContainerNotFound { .. }));
        assert_eq!(headings(&doc, "#foodList"), vec!["Taco"]);
    }

    #[tokio::test]
    async fn empty_catalog_completes_without_lookups() {
        let server = MockServer::start().await;
        mount_catalog(&server, serde_json::json!([])).await;

        let pipeline = Pipeline::new(config_for(&server)).unwrap();
        let mut doc = page();
        let report = pipeline.run(&mut doc, &SilentProgress).await.unwrap();

        assert_eq!(report.local_count, 0);
        assert_eq!(report.enriched_attached, 0);
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stages_reported_in_order() {
        let server = MockServer::start().await;
        mount_catalog(&server, serde_json::json!([food("Taco", "111")])).await;
        mount_product(&server, "111", generic_product()).await;

        let pipeline = Pipeline::new(config_for(&server)).unwrap();
        let progress = RecordingProgress::default();
        let mut doc = page();
        pipeline.run(&mut doc, &progress).await.unwrap();

        assert_eq!(
            *progress.stages.lock().unwrap(),
            vec![
                PipelineStage::FetchLocal,
                PipelineStage::RenderBaseline,
                PipelineStage::FetchEnrichment,
                PipelineStage::RenderEnriched,
            ]
        );
        assert!(*progress.done.lock().unwrap());
    }

    /// Surface that counts the nodes the pipeline asks it to create.
    struct CountingSurface {
        inner: HtmlDocument,
        created: std::cell::Cell<usize>,
    }

    impl RenderSurface for CountingSurface {
        fn create_node(
            &self,
            tag: &str,
            class: Option<&str>,
            text: Option<String>,
            children: Vec<RenderNode>,
        ) -> RenderNode {
            self.created.set(self.created.get() + 1);
            RenderNode::build(tag, class, text, children)
        }

        fn find_container(&self, selector: &str) -> Result<foodfacts_render::ContainerId> {
            self.inner.find_container(selector)
        }

        fn attach(&mut self, container: foodfacts_render::ContainerId, node: RenderNode) {
            self.inner.attach(container, node);
        }
    }

    #[tokio::test]
    async fn nodes_are_created_by_the_surface() {
        let server = MockServer::start().await;
        mount_catalog(&server, serde_json::json!([food("Taco", "111")])).await;
        mount_product(&server, "111", generic_product()).await;

        let pipeline = Pipeline::new(config_for(&server)).unwrap();
        let mut surface = CountingSurface {
            inner: page(),
            created: std::cell::Cell::new(0),
        };
        pipeline.run(&mut surface, &SilentProgress).await.unwrap();

        // Baseline: section + 3 header nodes. Enriched: section + 3 + 5.
        assert_eq!(surface.created.get(), 4 + 9);
    }

    #[tokio::test]
    async fn renders_into_host_template() {
        let server = MockServer::start().await;
        mount_catalog(&server, serde_json::json!([food("Taco", "111")])).await;
        mount_product(&server, "111", generic_product()).await;

        let template = r#"<html><head><title>Foods</title></head><body>
            <div id="foodList"></div><div id="foodList2"></div></body></html>"#;
        let mut doc = HtmlDocument::from_template(template);

        let pipeline = Pipeline::new(config_for(&server)).unwrap();
        pipeline.run(&mut doc, &SilentProgress).await.unwrap();

        let html = Html::parse_document(&doc.to_html("unused"));
        let sel = Selector::parse("#foodList2 section.foodItem p").unwrap();
        let paragraphs: Vec<String> = html.select(&sel).map(|e| e.text().collect()).collect();
        assert_eq!(paragraphs, vec!["Main", "Mexican", "x", "y", "1", "2", "3"]);
    }
}
