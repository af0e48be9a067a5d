use std::ffi::OsStr;

use headless_chrome::{Browser, LaunchOptions};
use log::debug;
use thiserror::Error;

/// Errors that can occur while rendering a page in headless Chrome.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("failed to navigate to {url}: {message}")]
    Navigation { url: String, message: String },

    #[error("page source extraction failed: {0}")]
    Source(String),
}

/// Render a URL in headless Chrome and return the final page source after
/// the site's scripts have run.
///
/// Image loading is disabled; only the script-rewritten DOM matters here.
/// The browser process is launched per call and torn down on drop, whatever
/// the outcome. Blocking; callers on a runtime should wrap this in
/// `spawn_blocking`.
pub fn render_page_source(url: &str) -> Result<String, BrowserError> {
    let options = LaunchOptions::default_builder()
        .headless(true)
        .args(vec![OsStr::new("--blink-settings=imagesEnabled=false")])
        .build()
        .map_err(|e| BrowserError::Launch(e.to_string()))?;

    debug!("Launching headless browser for {}", url);
    let browser = Browser::new(options).map_err(|e| BrowserError::Launch(e.to_string()))?;
    let tab = browser
        .new_tab()
        .map_err(|e| BrowserError::Launch(e.to_string()))?;

    tab.navigate_to(url)
        .and_then(|t| t.wait_until_navigated())
        .map_err(|e| BrowserError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        })?;

    tab.get_content()
        .map_err(|e| BrowserError::Source(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Requires Chrome to be installed
    fn renders_a_live_page() {
        let html = render_page_source("https://example.com").unwrap();
        assert!(html.contains("Example"));
        assert!(html.len() > 100);
    }
}
