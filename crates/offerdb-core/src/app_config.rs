use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
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

/// Line-window sizes for the flattened-text extraction tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanWindow {
    pub merchant_lookback: usize,
    pub validity_lookahead: usize,
    pub cards_lookahead: usize,
    pub category_lookback: usize,
}

impl Default for ScanWindow {
    fn default() -> Self {
        Self {
            merchant_lookback: 3,
            validity_lookahead: 12,
            cards_lookahead: 5,
            category_lookback: 5,
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub sources_path: PathBuf,
    pub rules_path: Option<PathBuf>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    pub fetch_user_agent: String,
    pub headless_browser: Option<PathBuf>,
    pub max_concurrent_sources: usize,
    pub date_fallback_year: i32,
    pub scan_window: ScanWindow,
    pub batch_size: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("sources_path", &self.sources_path)
            .field("rules_path", &self.rules_path)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("fetch_user_agent", &self.fetch_user_agent)
            .field("headless_browser", &self.headless_browser)
            .field("max_concurrent_sources", &self.max_concurrent_sources)
            .field("date_fallback_year", &self.date_fallback_year)
            .field("scan_window", &self.scan_window)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}
