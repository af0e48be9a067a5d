use thiserror::Error;

use crate::browser::BrowserError;

/// Errors raised while scraping or downloading.
///
/// Severity is decided by the caller: listing errors abort the run, while
/// discovery and per-page errors are logged and folded into empty results
/// or failure counts.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("expected pattern missing from page: {0}")]
    Parse(&'static str),

    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
