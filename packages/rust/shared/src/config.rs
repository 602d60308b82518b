//! Application configuration for FoodFacts.
//!
//! User config lives at `~/.foodfacts/foodfacts.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{FoodFactsError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "foodfacts.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".foodfacts";

/// Local catalog endpoint used when nothing else is configured.
pub const DEFAULT_LOCAL_URL: &str = "http://localhost:8088/food";

/// Open Food Facts product lookup; `{barcode}` is substituted per record.
pub const DEFAULT_EXTERNAL_URL_TEMPLATE: &str =
    "https://world.openfoodfacts.org/api/v0/product/{barcode}.json";

/// Placeholder that must appear in the external URL template.
const BARCODE_PLACEHOLDER: &str = "{barcode}";

// ---------------------------------------------------------------------------
// Config structs (matching foodfacts.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where records come from.
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Render targets.
    #[serde(default)]
    pub render: RenderConfig,

    /// HTTP client behavior.
    #[serde(default)]
    pub http: HttpConfig,
}

/// `[sources]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Local API returning the food catalog as a JSON array.
    #[serde(default = "default_local_url")]
    pub local_url: String,

    /// External enrichment URL template containing `{barcode}`.
    #[serde(default = "default_external_url_template")]
    pub external_url_template: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            local_url: default_local_url(),
            external_url_template: default_external_url_template(),
        }
    }
}

fn default_local_url() -> String {
    DEFAULT_LOCAL_URL.into()
}
fn default_external_url_template() -> String {
    DEFAULT_EXTERNAL_URL_TEMPLATE.into()
}

/// `[render]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Container receiving the local-only view.
    #[serde(default = "default_baseline_container")]
    pub baseline_container: String,

    /// Container receiving the enriched view.
    #[serde(default = "default_enriched_container")]
    pub enriched_container: String,

    /// Title of the generated page.
    #[serde(default = "default_page_title")]
    pub page_title: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            baseline_container: default_baseline_container(),
            enriched_container: default_enriched_container(),
            page_title: default_page_title(),
        }
    }
}

fn default_baseline_container() -> String {
    "#foodList".into()
}
fn default_enriched_container() -> String {
    "#foodList2".into()
}
fn default_page_title() -> String {
    "Food List".into()
}

/// `[http]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum redirects followed per request.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Treat non-2xx responses as network failures. Off by default: the body
    /// is decoded whatever the status, so an error page fails at parse time.
    #[serde(default)]
    pub require_success: bool,

    /// Cap on in-flight enrichment requests; 0 means unbounded.
    #[serde(default)]
    pub max_concurrency: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_redirects: default_max_redirects(),
            require_success: false,
            max_concurrency: 0,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_redirects() -> usize {
    5
}

impl AppConfig {
    /// Check the values that would otherwise fail deep inside a run.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.sources.local_url).map_err(|e| {
            FoodFactsError::config(format!(
                "invalid local_url '{}': {e}",
                self.sources.local_url
            ))
        })?;

        let template = &self.sources.external_url_template;
        if !template.contains(BARCODE_PLACEHOLDER) {
            return Err(FoodFactsError::config(format!(
                "external_url_template '{template}' has no {BARCODE_PLACEHOLDER} placeholder"
            )));
        }
        Url::parse(&template.replace(BARCODE_PLACEHOLDER, "0")).map_err(|e| {
            FoodFactsError::config(format!("invalid external_url_template '{template}': {e}"))
        })?;

        if self.render.baseline_container == self.render.enriched_container {
            return Err(FoodFactsError::config(
                "baseline_container and enriched_container must differ",
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.foodfacts/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| FoodFactsError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.foodfacts/foodfacts.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| FoodFactsError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| FoodFactsError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| FoodFactsError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| FoodFactsError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| FoodFactsError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
