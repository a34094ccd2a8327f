mod app_config;
mod config;
mod events;
mod exhibitor;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use events::{load_events, parse_events, EventCatalog, EventConfig, EventsFile};
pub use exhibitor::{DedupKey, ExhibitorRow, UnconfirmedPolicy, UNCONFIRMED_COUNTRY};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read events file {path}: {source}")]
    EventsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse events file: {0}")]
    EventsFileParse(#[from] serde_yaml::Error),

    #[error("events validation failed: {0}")]
    Validation(String),
}
