//! `extract` command: run the fallback chain for one event and print or save
//! the rows.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use fairscrape_core::{AppConfig, EventCatalog, ExhibitorRow, UnconfirmedPolicy};
use fairscrape_export::{build_workbook, SheetMeta};
use fairscrape_scraper::{
    CountryStrategy, ExtractError, ExtractRequest, Extraction, ExtractionMeta, Extractor,
};
use serde::Serialize;

const NAME_DISPLAY_CHARS: usize = 40;

#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Event page URL
    pub url: String,

    /// Country to keep (repeatable; ISO codes and local spellings accepted)
    #[arg(short = 'c', long = "country")]
    pub countries: Vec<String>,

    /// Page cap per query sequence (0 = hard cap)
    #[arg(long)]
    pub max_pages: Option<u32>,

    /// Network timeout in seconds for this run
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Catalog language used for activity names
    #[arg(long)]
    pub language: Option<String>,

    /// Keep only exhibitors that describe themselves as manufacturers
    #[arg(long)]
    pub manufacturers_only: bool,

    /// Drop rows whose country cannot be confirmed
    #[arg(long)]
    pub strict_country: bool,

    /// Filter countries through backend facets, one query per country
    #[arg(long, conflicts_with = "client_side")]
    pub server_side: bool,

    /// Fetch unfiltered and filter countries locally
    #[arg(long)]
    pub client_side: bool,

    /// Write an .xlsx workbook to this path
    #[arg(long, value_name = "FILE.xlsx")]
    pub output: Option<PathBuf>,

    /// Print rows and extraction metadata as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct ExtractOutput<'a> {
    url: &'a str,
    total: usize,
    results: &'a [ExhibitorRow],
    extraction: &'a ExtractionMeta,
}

impl ExtractArgs {
    fn country_strategy(&self) -> Option<CountryStrategy> {
        if self.server_side {
            Some(CountryStrategy::ServerSide)
        } else if self.client_side {
            Some(CountryStrategy::ClientSide)
        } else {
            None
        }
    }

    /// `--strict-country` forces `Drop`; otherwise the configured policy applies.
    pub(crate) fn to_request(&self, default_policy: UnconfirmedPolicy) -> ExtractRequest {
        ExtractRequest {
            event_url: self.url.clone(),
            countries: self.countries.clone(),
            max_pages: self.max_pages,
            timeout: self.timeout_secs.map(Duration::from_secs),
            manufacturers_only: self.manufacturers_only,
            unconfirmed_policy: if self.strict_country {
                UnconfirmedPolicy::Drop
            } else {
                default_policy
            },
            country_strategy: self.country_strategy(),
            language: self.language.clone(),
        }
    }
}

/// Runs one extraction and renders the result.
///
/// # Errors
///
/// Returns an error if the extractor cannot be built, every strategy comes up
/// empty, or the workbook cannot be written.
pub(crate) async fn run_extract(
    config: &AppConfig,
    catalog: Arc<EventCatalog>,
    args: ExtractArgs,
) -> anyhow::Result<()> {
    if let Some(path) = &args.output {
        ensure_xlsx_path(path)?;
    }

    let extractor = Extractor::from_config(config, catalog)?;
    let request = args.to_request(config.unconfirmed_country);

    let extraction = match extractor.extract(&request).await {
        Ok(extraction) => extraction,
        Err(ExtractError::NoResultsAfterAllStrategies { attempts }) => {
            eprintln!("no exhibitors found; strategies tried:");
            for attempt in &attempts {
                let reason = attempt
                    .failure
                    .as_deref()
                    .or(attempt.note.as_deref())
                    .unwrap_or("returned no rows");
                eprintln!("  {:<20}{reason}", attempt.source.to_string());
            }
            anyhow::bail!("no results after {} strategies", attempts.len());
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(path) = &args.output {
        write_workbook(path, &args.url, &extraction)?;
        tracing::info!(path = %path.display(), rows = extraction.rows.len(), "workbook written");
    }

    match (&args.output, args.json) {
        (_, true) => {
            let output = ExtractOutput {
                url: &args.url,
                total: extraction.rows.len(),
                results: &extraction.rows,
                extraction: &extraction.meta,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        (None, false) => print_rows(&extraction),
        (Some(path), false) => println!(
            "{} exhibitors via {} written to {}",
            extraction.rows.len(),
            extraction.meta.source,
            path.display()
        ),
    }

    Ok(())
}

fn ensure_xlsx_path(path: &Path) -> anyhow::Result<()> {
    let is_xlsx = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"));
    if !is_xlsx {
        anyhow::bail!("output path '{}' must end in .xlsx", path.display());
    }
    Ok(())
}

fn write_workbook(path: &Path, url: &str, extraction: &Extraction) -> anyhow::Result<()> {
    let meta = SheetMeta {
        url: url.to_string(),
        driver: extraction.meta.source.to_string(),
        supported: extraction.meta.supported,
    };
    let bytes = build_workbook(&extraction.rows, &meta)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() > max_chars {
        format!("{}...", value.chars().take(max_chars).collect::<String>())
    } else {
        value.to_string()
    }
}

fn print_rows(extraction: &Extraction) {
    println!("{:<44}{:<14}WEBSITE", "COMPANY", "COUNTRY");
    for row in &extraction.rows {
        println!(
            "{:<44}{:<14}{}",
            truncate(&row.company, NAME_DISPLAY_CHARS),
            row.country,
            row.website
        );
    }
    println!();
    println!("{} exhibitors via {}", extraction.rows.len(), extraction.meta.source);
}
