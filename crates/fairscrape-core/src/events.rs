use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// One trade fair whose exhibitor catalog is served by the Easyfairs
/// widgets backend under a known container id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventConfig {
    /// Exact authority of the event site (`host` or `host:port`).
    pub host: String,
    pub container_id: i64,
    pub name: Option<String>,
    /// Preferred catalog language, overriding the process default.
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventsFile {
    pub events: Vec<EventConfig>,
}

/// Read-only host → event lookup built once from [`EventsFile`].
///
/// Hosts are stored lowercased; lookups must already be lowercased
/// authorities. `www.` is significant, so both spellings of a site need
/// their own entry.
#[derive(Debug, Clone, Default)]
pub struct EventCatalog {
    by_host: BTreeMap<String, EventConfig>,
}

impl EventCatalog {
    /// Build a catalog from an already-validated events file.
    #[must_use]
    pub fn new(file: EventsFile) -> Self {
        let by_host = file
            .events
            .into_iter()
            .map(|mut event| {
                event.host = normalize_host(&event.host);
                (event.host.clone(), event)
            })
            .collect();
        Self { by_host }
    }

    #[must_use]
    pub fn get(&self, host: &str) -> Option<&EventConfig> {
        self.by_host.get(host)
    }

    #[must_use]
    pub fn container_id_for(&self, host: &str) -> Option<i64> {
        self.get(host).map(|event| event.container_id)
    }

    /// Events in host order.
    pub fn iter(&self) -> impl Iterator<Item = &EventConfig> {
        self.by_host.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_host.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_host.is_empty()
    }
}

impl FromIterator<EventConfig> for EventCatalog {
    fn from_iter<I: IntoIterator<Item = EventConfig>>(iter: I) -> Self {
        Self::new(EventsFile {
            events: iter.into_iter().collect(),
        })
    }
}

/// Load and validate the event catalog from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_events(path: &Path) -> Result<EventCatalog, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::EventsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_events(&content)
}

/// Parse and validate an event catalog from YAML text.
///
/// # Errors
///
/// Returns `ConfigError` if the text is not valid YAML or fails validation.
pub fn parse_events(content: &str) -> Result<EventCatalog, ConfigError> {
    let events_file: EventsFile =
        serde_yaml::from_str(content).map_err(ConfigError::EventsFileParse)?;

    validate_events(&events_file)?;

    Ok(EventCatalog::new(events_file))
}

fn validate_events(events_file: &EventsFile) -> Result<(), ConfigError> {
    let mut seen_hosts = HashSet::new();

    for event in &events_file.events {
        let host = normalize_host(&event.host);
        if host.is_empty() {
            return Err(ConfigError::Validation(
                "event host must be non-empty".to_string(),
            ));
        }

        if host.contains('/') || host.contains("://") {
            return Err(ConfigError::Validation(format!(
                "event host '{}' must be a bare authority, not a URL",
                event.host
            )));
        }

        if event.container_id <= 0 {
            return Err(ConfigError::Validation(format!(
                "event '{}' has invalid container_id {}; must be positive",
                event.host, event.container_id
            )));
        }

        if !seen_hosts.insert(host) {
            return Err(ConfigError::Validation(format!(
                "duplicate event host: '{}'",
                event.host
            )));
        }
    }

    Ok(())
}

fn normalize_host(host: &str) -> String {
    host.trim().to_lowercase()
}

#[cfg(test)]
#[path = "events_test.rs"]
mod tests;
