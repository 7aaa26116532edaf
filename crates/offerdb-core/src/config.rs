use std::path::PathBuf;

use chrono::Datelike;

use crate::app_config::{AppConfig, Environment, ScanWindow};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from the variables already in the process,
/// without touching `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var).ok().filter(|v| !v.trim().is_empty())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let positive = |var: &str, value: usize| -> Result<usize, ConfigError> {
        if value == 0 {
            Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: "must be greater than zero".to_string(),
            })
        } else {
            Ok(value)
        }
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("OFFERDB_ENV", "development"))?;
    let log_level = or_default("OFFERDB_LOG_LEVEL", "info");
    let sources_path = PathBuf::from(or_default("OFFERDB_SOURCES_PATH", "./config/sources.yaml"));
    let rules_path = optional("OFFERDB_RULES_PATH").map(PathBuf::from);

    let db_max_connections = parse_u32("OFFERDB_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("OFFERDB_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("OFFERDB_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let fetch_timeout_secs = parse_u64("OFFERDB_FETCH_TIMEOUT_SECS", "30")?;
    let fetch_user_agent = or_default("OFFERDB_FETCH_USER_AGENT", "offerdb/0.1 (deal-curation)");
    let headless_browser = optional("OFFERDB_HEADLESS_BROWSER").map(PathBuf::from);
    let max_concurrent_sources = positive(
        "OFFERDB_MAX_CONCURRENT_SOURCES",
        parse_usize("OFFERDB_MAX_CONCURRENT_SOURCES", "1")?,
    )?;

    let date_fallback_year = match optional("OFFERDB_DATE_FALLBACK_YEAR") {
        Some(raw) => parse_year(&raw)?,
        None => chrono::Utc::now().year(),
    };

    let scan_window = ScanWindow {
        merchant_lookback: parse_usize("OFFERDB_SCAN_MERCHANT_LOOKBACK", "3")?,
        validity_lookahead: parse_usize("OFFERDB_SCAN_VALIDITY_LOOKAHEAD", "12")?,
        cards_lookahead: parse_usize("OFFERDB_SCAN_CARDS_LOOKAHEAD", "5")?,
        ..ScanWindow::default()
    };

    let batch_size = positive(
        "OFFERDB_BATCH_SIZE",
        parse_usize("OFFERDB_BATCH_SIZE", "50")?,
    )?;

    if db_min_connections > db_max_connections {
        return Err(ConfigError::InvalidEnvVar {
            var: "OFFERDB_DB_MIN_CONNECTIONS".to_string(),
            reason: format!(
                "{db_min_connections} exceeds OFFERDB_DB_MAX_CONNECTIONS ({db_max_connections})"
            ),
        });
    }

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        sources_path,
        rules_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        fetch_timeout_secs,
        fetch_user_agent,
        headless_browser,
        max_concurrent_sources,
        date_fallback_year,
        scan_window,
        batch_size,
    })
}

fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "OFFERDB_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

fn parse_year(raw: &str) -> Result<i32, ConfigError> {
    let year = raw
        .trim()
        .parse::<i32>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: "OFFERDB_DATE_FALLBACK_YEAR".to_string(),
            reason: e.to_string(),
        })?;
    if (1970..=9999).contains(&year) {
        Ok(year)
    } else {
        Err(ConfigError::InvalidEnvVar {
            var: "OFFERDB_DATE_FALLBACK_YEAR".to_string(),
            reason: format!("{year} is outside 1970..=9999"),
        })
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
