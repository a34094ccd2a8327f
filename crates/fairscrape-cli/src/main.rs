mod extract;
mod locate;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::extract::ExtractArgs;

#[derive(Debug, Parser)]
#[command(name = "fairscrape")]
#[command(about = "Extract exhibitor lists from Easyfairs trade-fair sites")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract exhibitors from an event page
    Extract(ExtractArgs),
    /// Resolve the search backend behind an event page and print it as JSON
    Locate {
        /// Event page URL
        url: String,
    },
    /// List the events in the configured catalog
    Events,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = fairscrape_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let catalog = Arc::new(fairscrape_core::load_events(&config.events_path)?);

    match cli.command {
        Commands::Extract(args) => extract::run_extract(&config, catalog, args).await,
        Commands::Locate { url } => locate::run_locate(&config, catalog, &url).await,
        Commands::Events => {
            locate::print_events(&catalog);
            Ok(())
        }
    }
}
