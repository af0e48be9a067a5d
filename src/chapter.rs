use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::thread;

use log::{error, info};
use regex::Regex;
use reqwest::header;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

use crate::browser;
use crate::comic::USER_AGENT;
use crate::error::ScrapeError;
use crate::sanitize::sanitize_title;

// The site's page-selector script rewrites this <select> on load; the
// option values are the per-page image URLs.
static RE_SELECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)onchange="select_page\(\)">(.*?)</select>"#).unwrap());
static RE_OPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<option value="(.*?)".*?>第(\d*?)页<"#).unwrap());

/// One page image discovered in a chapter's select-box options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number; determines the output file name.
    pub index: u32,
    /// Protocol-relative URL as found in the DOM (`//images.dmzj.com/...`).
    pub url: String,
}

/// One chapter of a comic, with its own output directory.
///
/// The directory is created on construction. The page list is populated
/// lazily by [`Chapter::discover_pages`] and replaced wholesale on every
/// discovery call.
pub struct Chapter {
    client: reqwest::Client,
    pub comic_title: String,
    pub title: String,
    pub url: String,
    dir: PathBuf,
    pages: Vec<Page>,
}

impl Chapter {
    pub fn new(
        client: reqwest::Client,
        comic_title: &str,
        comic_dir: &Path,
        title: &str,
        url: &str,
    ) -> Result<Self, ScrapeError> {
        let dir = comic_dir.join(sanitize_title(title));
        fs::create_dir_all(&dir)?;
        Ok(Self {
            client,
            comic_title: comic_title.to_string(),
            title: title.to_string(),
            url: url.to_string(),
            dir,
            pages: Vec::new(),
        })
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Render the chapter page in headless Chrome and extract its page list.
    ///
    /// Discovery is best-effort: any launch, navigation or parse failure is
    /// logged and leaves an empty page list. Always logs the count obtained
    /// and returns the (possibly empty) result.
    pub async fn discover_pages(&mut self) -> Vec<Page> {
        let url = self.url.clone();
        let result = tokio::task::spawn_blocking(move || -> Result<Vec<Page>, ScrapeError> {
            let html = browser::render_page_source(&url)?;
            parse_pages(&html)
        })
        .await;

        self.pages = match result {
            Ok(Ok(pages)) => pages,
            Ok(Err(e)) => {
                error!("Page discovery failed for chapter {}: {}", self.title, e);
                Vec::new()
            }
            Err(e) => {
                error!("Page discovery task failed for chapter {}: {}", self.title, e);
                Vec::new()
            }
        };
        info!("Got {} pages in chapter {}", self.pages.len(), self.title);
        self.pages.clone()
    }

    /// Download every discovered page concurrently and return the number
    /// that succeeded.
    ///
    /// Runs a bounded pool (4..=8 workers, from available parallelism) and
    /// joins all tasks before returning. Per-page failures are logged and
    /// counted, never retried.
    pub async fn download_chapter(&self) -> usize {
        if self.pages.is_empty() {
            info!(
                "No pages in chapter {} of {}, nothing to download",
                self.title, self.comic_title
            );
            return 0;
        }

        let workers = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
            .clamp(4, 8);
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut tasks: JoinSet<usize> = JoinSet::new();

        for page in self.pages.clone() {
            let semaphore = Arc::clone(&semaphore);
            let client = self.client.clone();
            let referer = self.url.clone();
            let dir = self.dir.clone();
            let title = self.title.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
                match download_page(&client, &referer, &dir, &page).await {
                    Ok(()) => 1,
                    Err(e) => {
                        error!(
                            "Failed to download page {} of chapter {}: {}",
                            page.index, title, e
                        );
                        0
                    }
                }
            });
        }

        let mut downloaded = 0;
        while let Some(result) = tasks.join_next().await {
            downloaded += result.unwrap_or(0);
        }
        info!("Downloaded {} pages", downloaded);
        downloaded
    }
}

/// Extract the (index, image URL) pairs from a rendered chapter page.
pub fn parse_pages(html: &str) -> Result<Vec<Page>, ScrapeError> {
    let select = RE_SELECT
        .captures(html)
        .ok_or(ScrapeError::Parse("page select block"))?;
    let mut pages = Vec::new();
    for c in RE_OPTION.captures_iter(&select[1]) {
        let index = c[2]
            .parse()
            .map_err(|_| ScrapeError::Parse("page number"))?;
        pages.push(Page {
            index,
            url: c[1].to_string(),
        });
    }
    Ok(pages)
}

async fn download_page(
    client: &reqwest::Client,
    referer: &str,
    dir: &Path,
    page: &Page,
) -> Result<(), ScrapeError> {
    // Image URLs in the DOM are protocol-relative; absolute ones pass through.
    let absolute = if page.url.starts_with("//") {
        format!("https:{}", page.url)
    } else {
        page.url.clone()
    };
    let url = Url::parse(&absolute)?;
    // The chapter directory may have been removed externally since
    // construction; recreate it before writing.
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    let path = dir.join(format!("{}.{}", page.index, file_extension(&page.url)));

    info!("Downloading page {} into file {}", page.index, path.display());
    let response = client
        .get(url)
        .header(header::USER_AGENT, USER_AGENT)
        .header(header::REFERER, referer)
        .send()
        .await?;
    let bytes = response.bytes().await?;
    fs::write(&path, &bytes)?;
    Ok(())
}

/// File extension of an image URL, taken from its final dot-segment.
fn file_extension(url: &str) -> &str {
    url.rsplit('.').next().unwrap_or(url)
}
