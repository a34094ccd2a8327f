pub mod browser;
pub mod countries;
pub mod error;
pub mod html;
pub mod locator;
pub mod manufacturer;
pub mod meta;
pub mod normalize;
pub mod pipeline;
pub mod query;
pub mod retry;
pub mod types;

pub use browser::{BrowserDriver, ChromeDriver, ChromeOptions, ObservedRequest, WaitPolicy};
pub use countries::{dedup_rows, normalize_countries, CountryFilter};
pub use error::{BrowserError, DiscoveryFailure, ExtractError};
pub use html::HtmlFetcher;
pub use locator::{event_host, BackendLocator, DiscoverySettings, Located};
pub use meta::{CountryStrategy, ExtractionMeta, StrategyKind};
pub use normalize::normalize_hit;
pub use pipeline::{ExtractRequest, Extraction, Extractor, ExtractorOptions};
pub use query::{QueryOptions, QuerySettings, SearchClient};
pub use retry::RetryPolicy;
pub use types::{BackendConfig, BackendOrigin, QueryDialect, QueryStyle};
