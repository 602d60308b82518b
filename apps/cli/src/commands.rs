//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Report, Result, WrapErr};
use foodfacts_core::{Pipeline, PipelineConfig, PipelineStage, ProgressReporter, RunReport};
use foodfacts_render::HtmlDocument;
use foodfacts_shared::{AppConfig, FoodFactsError, init_config, load_config, load_config_from};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// FoodFacts: render a food catalog enriched with product data.
#[derive(Parser)]
#[command(
    name = "foodfacts",
    version,
    about = "Render a local food catalog, then enrich it with Open Food Facts product data.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.foodfacts/foodfacts.toml.
    #[arg(long, global = true, env = "FOODFACTS_CONFIG")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the pipeline once and write the rendered page.
    Run {
        /// Local catalog endpoint (overrides config).
        #[arg(long)]
        local_url: Option<String>,

        /// Host HTML page containing the target containers.
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Output file (defaults to stdout).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Page title for the generated document.
        #[arg(long)]
        title: Option<String>,

        /// Fail on any non-2xx response instead of decoding its body.
        #[arg(long)]
        strict_status: bool,

        /// Cap on concurrent product lookups (0 = unbounded).
        #[arg(long)]
        max_concurrency: Option<usize>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so the page can
/// be piped from stdout.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = [
        "foodfacts_cli",
        "foodfacts_core",
        "foodfacts_fetcher",
        "foodfacts_render",
        "foodfacts_shared",
    ]
    .iter()
    .map(|target| format!("{target}={level}"))
    .collect::<Vec<_>>()
    .join(",");

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_file.clone();
    match cli.command {
        Command::Run {
            local_url,
            template,
            out,
            title,
            strict_status,
            max_concurrency,
        } => {
            let mut config = resolve_config(config_path.as_deref())?;
            if let Some(url) = local_url {
                config.sources.local_url = url;
            }
            if let Some(title) = title {
                config.render.page_title = title;
            }
            if strict_status {
                config.http.require_success = true;
            }
            if let Some(n) = max_concurrency {
                config.http.max_concurrency = n;
            }
            cmd_run(&config, template.as_deref(), out.as_deref()).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path.as_deref()).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config: &AppConfig, template: Option<&Path>, out: Option<&Path>) -> Result<()> {
    config.validate()?;

    let mut doc = match template {
        Some(path) => HtmlDocument::from_template_file(path)?,
        None => HtmlDocument::with_containers([
            container_id(&config.render.baseline_container),
            container_id(&config.render.enriched_container),
        ]),
    };

    let pipeline = Pipeline::new(PipelineConfig::from(config))?;

    info!(
        local_url = %config.sources.local_url,
        template = ?template,
        "running food pipeline"
    );

    let reporter = CliProgress::new();
    let outcome = pipeline.run(&mut doc, &reporter).await;

    // Whatever rendered before a failure is still written out.
    let html = doc.to_html(&config.render.page_title);
    let written = write_page(&html, out);

    match outcome {
        Ok(report) => {
            written?;
            if let Some(path) = out {
                let started = report
                    .started_at
                    .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
                eprintln!();
                eprintln!("  Page rendered!");
                eprintln!("  Run:       {}", report.run_id);
                eprintln!("  Started:   {started}");
                eprintln!("  Records:   {}", report.local_count);
                eprintln!("  Baseline:  {}", report.baseline_attached);
                eprintln!("  Enriched:  {}", report.enriched_attached);
                eprintln!("  Output:    {}", path.display());
                eprintln!("  Time:      {:.1}s", report.elapsed.as_secs_f64());
                eprintln!();
            }
            Ok(())
        }
        Err(e) => {
            reporter.fail();
            Err(failed_run_report(e, written))
        }
    }
}

/// Report for a failed run. The pipeline error stays the root cause even when
/// the partial page could not be written either.
fn failed_run_report(error: FoodFactsError, written: Result<()>) -> Report {
    let report = Report::new(error);
    match written {
        Ok(()) => {
            warn!(error = %report, "pipeline failed, partial page written");
            report.wrap_err("food pipeline did not complete")
        }
        Err(write_err) => {
            warn!(error = %report, write_error = %write_err, "pipeline failed, page not written");
            report
                .wrap_err(format!("partial page not written: {write_err:#}"))
                .wrap_err("food pipeline did not complete")
        }
    }
}

fn container_id(selector: &str) -> String {
    selector.trim().trim_start_matches('#').to_string()
}

fn write_page(html: &str, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .wrap_err_with(|| format!("cannot create {}", parent.display()))?;
            }
            std::fs::write(path, html)
                .wrap_err_with(|| format!("cannot write {}", path.display()))?;
        }
        None => print!("{html}"),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn fail(&self) {
        self.spinner.abandon_with_message("failed");
    }
}

impl ProgressReporter for CliProgress {
    fn stage(&self, stage: PipelineStage) {
        self.spinner.set_message(stage.to_string());
    }

    fn done(&self, _report: &RunReport) {
        self.spinner.finish_and_clear();
    }
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
