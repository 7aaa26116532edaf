use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("page not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("empty response body from {url}")]
    EmptyBody { url: String },

    #[error("source '{slug}' needs headless rendering but no browser is configured")]
    BrowserUnavailable { slug: String },

    #[error("failed to launch headless browser: {0}")]
    BrowserLaunch(#[source] std::io::Error),

    #[error("headless browser exited with {status} for {url}: {stderr}")]
    BrowserFailed {
        status: String,
        url: String,
        stderr: String,
    },

    #[error("fetch of {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no extractor registered under key '{0}'")]
    UnknownExtractor(String),

    #[error("invalid base URL {url}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("offer item has no title")]
    MissingTitle,

    #[error("cannot resolve link '{href}': {source}")]
    UnresolvableLink {
        href: String,
        #[source]
        source: url::ParseError,
    },
}
