use std::net::SocketAddr;
use std::path::PathBuf;

use crate::UnconfirmedPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    /// YAML catalog mapping event hosts to search-index container ids.
    pub events_path: PathBuf,
    /// Allow-list used when a request names no countries.
    pub default_countries: Vec<String>,
    pub language: String,
    pub query_seed: String,
    pub hits_per_page: u32,
    pub max_pages: u32,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Total attempts per upstream request, including the first.
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub inter_page_delay_ms: u64,
    pub country_concurrency: usize,
    pub discovery_timeout_secs: u64,
    pub browser_enabled: bool,
    pub unconfirmed_country: UnconfirmedPolicy,
    /// Fixed endpoint template used for statically mapped Easyfairs events.
    pub widgets_endpoint: String,
}
