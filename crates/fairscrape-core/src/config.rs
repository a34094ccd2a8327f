use crate::app_config::{AppConfig, Environment};
use crate::{ConfigError, UnconfirmedPolicy};

/// Default Easyfairs widgets search endpoint, captured from live event pages.
const DEFAULT_WIDGETS_ENDPOINT: &str = "https://my.easyfairs.com/widgets/api/stands/";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files. Used by tests
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// This is the core parsing/validation logic, decoupled from the actual environment
/// so tests can pass a `HashMap` lookup instead of mutating the process env.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        match or_default(var, default).trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(invalid(var, format!("expected a boolean, got '{other}'"))),
        }
    };

    let env = parse_environment(&or_default("FAIRSCRAPE_ENV", "development"))?;

    let bind_addr = or_default("FAIRSCRAPE_BIND_ADDR", "0.0.0.0:8000")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("FAIRSCRAPE_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("FAIRSCRAPE_LOG_LEVEL", "info");
    let events_path = PathBuf::from(or_default(
        "FAIRSCRAPE_EVENTS_PATH",
        "./config/events.yaml",
    ));

    let default_countries = split_list(&or_default("FAIRSCRAPE_DEFAULT_COUNTRIES", "Spain,Portugal"));
    if default_countries.is_empty() {
        return Err(invalid(
            "FAIRSCRAPE_DEFAULT_COUNTRIES",
            "at least one country is required".to_string(),
        ));
    }

    let language = or_default("FAIRSCRAPE_LANGUAGE", "es").trim().to_lowercase();
    let query_seed = or_default("FAIRSCRAPE_QUERY_SEED", "a");
    if query_seed.trim().is_empty() {
        return Err(invalid(
            "FAIRSCRAPE_QUERY_SEED",
            "the search backend needs a non-empty seed term".to_string(),
        ));
    }

    let hits_per_page = parse_u32("FAIRSCRAPE_HITS_PER_PAGE", "100")?;
    if !(10..=200).contains(&hits_per_page) {
        return Err(invalid(
            "FAIRSCRAPE_HITS_PER_PAGE",
            format!("{hits_per_page} is outside 10..=200"),
        ));
    }

    let max_pages = parse_u32("FAIRSCRAPE_MAX_PAGES", "20")?;
    let request_timeout_secs = parse_u64("FAIRSCRAPE_REQUEST_TIMEOUT_SECS", "25")?;
    let user_agent = or_default("FAIRSCRAPE_USER_AGENT", "fairscrape/0.1 (exhibitor-catalog)");

    let max_attempts = parse_u32("FAIRSCRAPE_MAX_ATTEMPTS", "5")?;
    if max_attempts == 0 {
        return Err(invalid(
            "FAIRSCRAPE_MAX_ATTEMPTS",
            "must allow at least one attempt".to_string(),
        ));
    }
    let retry_base_delay_ms = parse_u64("FAIRSCRAPE_RETRY_BASE_DELAY_MS", "1000")?;
    let inter_page_delay_ms = parse_u64("FAIRSCRAPE_INTER_PAGE_DELAY_MS", "0")?;
    let country_concurrency = parse_usize("FAIRSCRAPE_COUNTRY_CONCURRENCY", "1")?.max(1);
    let discovery_timeout_secs = parse_u64("FAIRSCRAPE_DISCOVERY_TIMEOUT_SECS", "25")?;
    let browser_enabled = parse_bool("FAIRSCRAPE_BROWSER_ENABLED", "true")?;
    let unconfirmed_country = parse_unconfirmed_policy(&or_default(
        "FAIRSCRAPE_UNCONFIRMED_COUNTRY",
        "keep",
    ))?;
    let widgets_endpoint = or_default("FAIRSCRAPE_WIDGETS_ENDPOINT", DEFAULT_WIDGETS_ENDPOINT);

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        events_path,
        default_countries,
        language,
        query_seed,
        hits_per_page,
        max_pages,
        request_timeout_secs,
        user_agent,
        max_attempts,
        retry_base_delay_ms,
        inter_page_delay_ms,
        country_concurrency,
        discovery_timeout_secs,
        browser_enabled,
        unconfirmed_country,
        widgets_endpoint,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for unrecognized values.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "FAIRSCRAPE_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

fn parse_unconfirmed_policy(s: &str) -> Result<UnconfirmedPolicy, ConfigError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "keep" | "lenient" => Ok(UnconfirmedPolicy::Keep),
        "drop" | "strict" => Ok(UnconfirmedPolicy::Drop),
        other => Err(ConfigError::InvalidEnvVar {
            var: "FAIRSCRAPE_UNCONFIRMED_COUNTRY".to_string(),
            reason: format!("expected 'keep' or 'drop', got '{other}'"),
        }),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
