//! Content fetchers: plain HTTP for server-rendered pages and a headless
//! browser for pages that build their offer lists client-side.
//!
//! Fetches are single attempts with a bounded timeout. Retrying is left to
//! the caller.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use offerdb_core::{RenderMode, SourceRecord};
use reqwest::Client;

use crate::content::RenderedContent;
use crate::error::FetchError;

#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Retrieves the rendered page for `source`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the page cannot be retrieved.
    async fn fetch(&self, source: &SourceRecord) -> Result<RenderedContent, FetchError>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    /// Fetches `url` and returns its body.
    ///
    /// # Errors
    ///
    /// - [`FetchError::NotFound`] for HTTP 404.
    /// - [`FetchError::UnexpectedStatus`] for any other non-2xx status.
    /// - [`FetchError::EmptyBody`] when the body is blank.
    /// - [`FetchError::Http`] on network, TLS, or timeout failure.
    pub async fn fetch_url(&self, url: &str) -> Result<RenderedContent, FetchError> {
        let response = self
            .client
            .get(url)
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(FetchError::EmptyBody {
                url: url.to_string(),
            });
        }

        tracing::debug!(url, bytes = body.len(), "fetched page over HTTP");
        Ok(RenderedContent::new(url, body))
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, source: &SourceRecord) -> Result<RenderedContent, FetchError> {
        self.fetch_url(&source.url).await
    }
}

/// Renders a page by running a Chromium-family browser with `--dump-dom`.
pub struct HeadlessFetcher {
    browser: PathBuf,
    timeout: Duration,
    user_agent: String,
}

impl HeadlessFetcher {
    #[must_use]
    pub fn new(browser: impl Into<PathBuf>, timeout_secs: u64, user_agent: &str) -> Self {
        Self {
            browser: browser.into(),
            timeout: Duration::from_secs(timeout_secs),
            user_agent: user_agent.to_string(),
        }
    }

    /// Renders `url` and returns the serialized DOM after scripts have run.
    ///
    /// # Errors
    ///
    /// - [`FetchError::BrowserLaunch`] when the browser binary cannot be spawned.
    /// - [`FetchError::Timeout`] when rendering exceeds the configured timeout.
    /// - [`FetchError::BrowserFailed`] when the browser exits unsuccessfully.
    /// - [`FetchError::EmptyBody`] when the dumped DOM is blank.
    pub async fn render_url(&self, url: &str) -> Result<RenderedContent, FetchError> {
        let mut command = tokio::process::Command::new(&self.browser);
        command
            .arg("--headless")
            .arg("--disable-gpu")
            .arg("--no-first-run")
            .arg(format!("--user-agent={}", self.user_agent))
            .arg("--virtual-time-budget=10000")
            .arg("--dump-dom")
            .arg(url)
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
                secs: self.timeout.as_secs(),
            })?
            .map_err(FetchError::BrowserLaunch)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FetchError::BrowserFailed {
                status: output.status.to_string(),
                url: url.to_string(),
                stderr: stderr.lines().last().unwrap_or_default().to_string(),
            });
        }

        let html = String::from_utf8_lossy(&output.stdout).into_owned();
        if html.trim().is_empty() {
            return Err(FetchError::EmptyBody {
                url: url.to_string(),
            });
        }

        tracing::debug!(url, bytes = html.len(), "rendered page in headless browser");
        Ok(RenderedContent::new(url, html))
    }
}

#[async_trait]
impl ContentFetcher for HeadlessFetcher {
    async fn fetch(&self, source: &SourceRecord) -> Result<RenderedContent, FetchError> {
        self.render_url(&source.url).await
    }
}

/// Routes each source to the fetcher its render mode calls for.
pub struct SourceFetcher {
    http: HttpFetcher,
    headless: Option<HeadlessFetcher>,
}

impl SourceFetcher {
    #[must_use]
    pub fn new(http: HttpFetcher, headless: Option<HeadlessFetcher>) -> Self {
        Self { http, headless }
    }
}

#[async_trait]
impl ContentFetcher for SourceFetcher {
    async fn fetch(&self, source: &SourceRecord) -> Result<RenderedContent, FetchError> {
        match source.render {
            RenderMode::Static => self.http.fetch(source).await,
            RenderMode::Headless => match &self.headless {
                Some(headless) => headless.fetch(source).await,
                None => Err(FetchError::BrowserUnavailable {
                    slug: source.slug.clone(),
                }),
            },
        }
    }
}
