use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// How a source page must be fetched before extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Plain HTTP GET; the served HTML already contains the offers.
    #[default]
    Static,
    /// Offers are rendered client-side and need a headless browser.
    Headless,
}

impl RenderMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderMode::Static => "static",
            RenderMode::Headless => "headless",
        }
    }
}

impl std::fmt::Display for RenderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RenderMode {
    type Err = crate::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(RenderMode::Static),
            "headless" => Ok(RenderMode::Headless),
            _ => Err(crate::CoreError::InvalidEnumValue {
                kind: "render mode",
                value: s.to_string(),
            }),
        }
    }
}

fn default_true() -> bool {
    true
}

/// One entry of `config/sources.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub slug: String,
    pub name: String,
    pub url: String,
    /// Key into the extractor registry, e.g. `"sab"` or `"generic"`.
    pub extractor: String,
    #[serde(default)]
    pub render: RenderMode,
    /// Applicable-cards text used when a page doesn't name the cards.
    pub default_cards: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct SourcesFile {
    pub sources: Vec<SourceConfig>,
}

impl SourcesFile {
    /// Active sources in file order.
    pub fn active(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.active)
    }
}

/// A source as persisted, with its database id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub url: String,
    pub extractor: String,
    pub render: RenderMode,
    pub default_cards: Option<String>,
    pub is_active: bool,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

impl SourceRecord {
    /// Builds an unsaved record, used by dry runs against the memory store.
    #[must_use]
    pub fn from_config(id: i64, config: &SourceConfig) -> Self {
        Self {
            id,
            slug: config.slug.clone(),
            name: config.name.clone(),
            url: config.url.clone(),
            extractor: config.extractor.clone(),
            render: config.render,
            default_cards: config.default_cards.clone(),
            is_active: config.active,
            last_fetched_at: None,
        }
    }
}

/// Load and validate the source registry from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_sources(path: &Path) -> Result<SourcesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let sources_file: SourcesFile =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::FileParse {
            path: path.display().to_string(),
            source: e,
        })?;

    validate_sources(&sources_file)?;

    Ok(sources_file)
}

fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

fn validate_sources(sources_file: &SourcesFile) -> Result<(), ConfigError> {
    let mut seen_slugs = HashSet::new();
    let mut seen_names = HashSet::new();

    for source in &sources_file.sources {
        if source.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "source name must be non-empty".to_string(),
            ));
        }

        if !is_valid_slug(&source.slug) {
            return Err(ConfigError::Validation(format!(
                "source '{}' has invalid slug '{}'; use lowercase letters, digits, and dashes",
                source.name, source.slug
            )));
        }

        if source.extractor.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "source '{}' has no extractor",
                source.slug
            )));
        }

        match url::Url::parse(&source.url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(parsed) => {
                return Err(ConfigError::Validation(format!(
                    "source '{}' url must be http(s), got scheme '{}'",
                    source.slug,
                    parsed.scheme()
                )));
            }
            Err(e) => {
                return Err(ConfigError::Validation(format!(
                    "source '{}' has invalid url '{}': {e}",
                    source.slug, source.url
                )));
            }
        }

        if !seen_slugs.insert(source.slug.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source slug: '{}'",
                source.slug
            )));
        }

        if !seen_names.insert(source.name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source name: '{}'",
                source.name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "sources_test.rs"]
mod tests;
