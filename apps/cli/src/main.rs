//! FoodFacts CLI: render a food catalog enriched with Open Food Facts data.
//!
//! Fetches the local catalog, renders a baseline view, looks up every
//! barcode concurrently, and renders the enriched view into an HTML page.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
