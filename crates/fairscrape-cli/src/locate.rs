use std::sync::Arc;

use fairscrape_core::{AppConfig, EventCatalog};
use fairscrape_scraper::Extractor;

/// Resolve the backend for `url` and print it as pretty JSON.
///
/// # Errors
///
/// Returns an error if the URL is invalid or the host is unknown and
/// discovery fails.
pub(crate) async fn run_locate(
    config: &AppConfig,
    catalog: Arc<EventCatalog>,
    url: &str,
) -> anyhow::Result<()> {
    let extractor = Extractor::from_config(config, catalog)?;
    let located = extractor.locator().locate(url).await?;
    tracing::info!(
        host = %located.host,
        container_id = located.backend.container_id,
        "backend located"
    );
    println!("{}", serde_json::to_string_pretty(&located)?);
    Ok(())
}

pub(crate) fn print_events(catalog: &EventCatalog) {
    if catalog.is_empty() {
        println!("no events configured; check FAIRSCRAPE_EVENTS_PATH");
        return;
    }

    println!("{:<40}{:<11}{:<6}NAME", "HOST", "CONTAINER", "LANG");
    for event in catalog.iter() {
        println!(
            "{:<40}{:<11}{:<6}{}",
            event.host,
            event.container_id,
            event.language.as_deref().unwrap_or("-"),
            event.name.as_deref().unwrap_or("")
        );
    }
}
