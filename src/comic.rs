use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;

use log::{debug, error, info};
use regex::Regex;
use reqwest::header;
use resolve_path::PathResolveExt;

use crate::chapter::{Chapter, Page};
use crate::error::ScrapeError;
use crate::sanitize::sanitize_title;

pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_13_3) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/63.0.3239.132 Safari/537.36";

const ROOT_URL: &str = "http://manhua.dmzj.com";
const LISTING_REFERER: &str = "http://manhua.dmzj.com/tags/s.shtml";

static RE_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<span class="anim_title_text"><a href=".*?"><h1>(.*?)</h1></a></span>"#).unwrap()
});
static RE_DESCRIPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<meta name='description' content=".*?(介绍.*?)"/>"#).unwrap());
static RE_COVER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"src="(.*?)" id="cover_pic"/></a>"#).unwrap());
static RE_CHAPTER_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<div class="cartoon_online_border" >(.*?)<div class="clearfix"></div>"#)
        .unwrap()
});
static RE_CHAPTER_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<li><a title="(.*?)" href="(.*?)" .*?>.*?</a>"#).unwrap());

/// Metadata scraped from a comic's listing page. Immutable once fetched.
#[derive(Debug, Clone)]
pub struct Listing {
    pub title: String,
    /// Site-specific annotated description text; empty when absent.
    pub description: String,
    pub cover_url: String,
    /// (chapter title, chapter URL) pairs in document order. Chapter URLs
    /// carry a `#@page=1` suffix to force first-page selection in the
    /// headless browser.
    pub chapters: Vec<(String, String)>,
}

/// A comic and its chapters, rooted at an output directory.
///
/// Construction eagerly fetches the listing, creates the comic directory
/// and one subdirectory per chapter. Page lists stay empty until a chapter
/// is downloaded.
pub struct Comic {
    pub title: String,
    pub dir: PathBuf,
    pub listing: Listing,
    chapters: Vec<Chapter>,
    // Aggregate of every discovered page across chapters. Kept for
    // bookkeeping; nothing reads it back.
    pages: Vec<Page>,
}

impl Comic {
    /// Fetch and parse the listing page, then build the comic.
    ///
    /// Network and parse failures here are fatal; no defaults are filled in
    /// for missing fields.
    pub async fn new(
        client: reqwest::Client,
        seed_url: &str,
        title_override: Option<String>,
        dir_override: Option<String>,
    ) -> Result<Self, ScrapeError> {
        let listing = fetch_listing(&client, seed_url).await?;
        Self::from_listing(client, listing, title_override, dir_override)
    }

    pub fn from_listing(
        client: reqwest::Client,
        listing: Listing,
        title_override: Option<String>,
        dir_override: Option<String>,
    ) -> Result<Self, ScrapeError> {
        let title = title_override.unwrap_or_else(|| listing.title.clone());
        let dir = match dir_override {
            Some(dir) => dir.resolve().into_owned(),
            None => sanitize_title(&title).resolve().into_owned(),
        };
        fs::create_dir_all(&dir)?;
        info!(
            "There are {} chapters in comic {}",
            listing.chapters.len(),
            title
        );

        let mut chapters: Vec<Chapter> = Vec::with_capacity(listing.chapters.len());
        for (chapter_title, chapter_url) in &listing.chapters {
            let chapter = Chapter::new(client.clone(), &title, &dir, chapter_title, chapter_url)?;
            // Duplicate titles: last one wins, position keeps document order
            match chapters.iter().position(|c| c.title == *chapter_title) {
                Some(i) => chapters[i] = chapter,
                None => chapters.push(chapter),
            }
        }

        Ok(Self {
            title,
            dir,
            listing,
            chapters,
            pages: Vec::new(),
        })
    }

    pub fn chapter_titles(&self) -> Vec<&str> {
        self.chapters.iter().map(|c| c.title.as_str()).collect()
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    /// Every page discovered so far, across all chapters.
    pub fn discovered_pages(&self) -> &[Page] {
        &self.pages
    }

    /// Download every chapter, sequentially, in listing order.
    pub async fn download_all_chapters(&mut self) {
        info!(
            "Downloading all chapters of comic {} into dir {}",
            self.title,
            self.dir.display()
        );
        let titles: Vec<String> = self.chapters.iter().map(|c| c.title.clone()).collect();
        for title in titles {
            self.download_chapter(&title).await;
        }
    }

    /// Download one chapter by title, discovering its pages first if
    /// needed. Unknown titles are logged and ignored.
    pub async fn download_chapter(&mut self, key: &str) {
        let Some(i) = self.chapters.iter().position(|c| c.title == key) else {
            error!(
                "No such chapter {}; known chapters:\n{}",
                key,
                self.chapter_titles().join("\n")
            );
            return;
        };
        if self.chapters[i].pages().is_empty() {
            let discovered = self.chapters[i].discover_pages().await;
            self.pages.extend(discovered);
        }
        self.chapters[i].download_chapter().await;
    }
}

async fn fetch_listing(client: &reqwest::Client, url: &str) -> Result<Listing, ScrapeError> {
    debug!("Fetching listing page {}", url);
    let text = client
        .get(url)
        .header(header::USER_AGENT, USER_AGENT)
        .header(header::REFERER, LISTING_REFERER)
        .send()
        .await?
        .text()
        .await?;
    parse_listing(&text)
}

/// Extract the comic metadata and chapter list from listing-page HTML.
///
/// Title, cover and the chapter block are required; the description may be
/// absent and defaults to empty.
pub fn parse_listing(html: &str) -> Result<Listing, ScrapeError> {
    let title = RE_TITLE
        .captures(html)
        .ok_or(ScrapeError::Parse("comic title"))?[1]
        .to_string();
    let block = RE_CHAPTER_BLOCK
        .captures(html)
        .ok_or(ScrapeError::Parse("chapter list"))?;
    let chapters = RE_CHAPTER_ENTRY
        .captures_iter(&block[1])
        .map(|c| (c[1].to_string(), format!("{}{}#@page=1", ROOT_URL, &c[2])))
        .collect();
    let cover_url = RE_COVER
        .captures(html)
        .ok_or(ScrapeError::Parse("cover image"))?[1]
        .to_string();
    let description = RE_DESCRIPTION
        .captures(html)
        .map(|c| c[1].to_string())
        .unwrap_or_default();

    Ok(Listing {
        title,
        description,
        cover_url,
        chapters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING_FIXTURE: &str = r#"
<span class="anim_title_text"><a href="/test/"><h1>测试漫画</h1></a></span>
<meta name='description' content="测试漫画,介绍一部用于测试的漫画"/>
<a><img src="//images.dmzj.com/cover/test.jpg" id="cover_pic"/></a>
<div class="cartoon_online_border" ><ul>
<li><a title="第01卷" href="/test/001.shtml" class="">第01卷</a></li>
<li><a title="第02卷" href="/test/002.shtml" class="">第02卷</a></li>
<li><a title="第03卷" href="/test/003.shtml" class="">第03卷</a></li>
</ul><div class="clearfix"></div>
"#;

    #[test]
    fn parses_listing_fields() {
        let listing = parse_listing(LISTING_FIXTURE).unwrap();
        assert_eq!(listing.title, "测试漫画");
        assert_eq!(listing.cover_url, "//images.dmzj.com/cover/test.jpg");
        assert_eq!(listing.description, "介绍一部用于测试的漫画");
    }

    #[test]
    fn parses_chapters_in_document_order() {
        let listing = parse_listing(LISTING_FIXTURE).unwrap();
        assert_eq!(listing.chapters.len(), 3);
        assert_eq!(listing.chapters[0].0, "第01卷");
        assert_eq!(
            listing.chapters[0].1,
            "http://manhua.dmzj.com/test/001.shtml#@page=1"
        );
        assert_eq!(listing.chapters[2].0, "第03卷");
    }

    #[test]
    fn missing_title_is_fatal() {
        let html = LISTING_FIXTURE.replace("anim_title_text", "something_else");
        let err = parse_listing(&html).unwrap_err();
        assert!(matches!(err, ScrapeError::Parse("comic title")));
    }

    #[test]
    fn missing_chapter_block_is_fatal() {
        let html = LISTING_FIXTURE.replace("cartoon_online_border", "x");
        let err = parse_listing(&html).unwrap_err();
        assert!(matches!(err, ScrapeError::Parse("chapter list")));
    }

    #[test]
    fn missing_description_defaults_to_empty() {
        let html = LISTING_FIXTURE.replace("介绍", "说明");
        let listing = parse_listing(&html).unwrap();
        assert_eq!(listing.description, "");
    }

    fn listing_with(chapters: Vec<(String, String)>) -> Listing {
        Listing {
            title: "Comic: A/B".to_string(),
            description: String::new(),
            cover_url: "//images.dmzj.com/cover/test.jpg".to_string(),
            chapters,
        }
    }

    #[test]
    fn creates_directories_for_every_chapter() {
        let tmp = tempfile::tempdir().unwrap();
        let chapters = vec![
            ("第01卷".to_string(), "http://x/1#@page=1".to_string()),
            ("第02卷".to_string(), "http://x/2#@page=1".to_string()),
        ];
        let comic = Comic::from_listing(
            reqwest::Client::new(),
            listing_with(chapters),
            None,
            Some(tmp.path().join("out").to_string_lossy().into_owned()),
        )
        .unwrap();
        assert_eq!(comic.chapter_titles(), vec!["第01卷", "第02卷"]);
        assert!(tmp.path().join("out").join("第01卷").is_dir());
        assert!(tmp.path().join("out").join("第02卷").is_dir());
    }

    #[test]
    fn title_override_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let comic = Comic::from_listing(
            reqwest::Client::new(),
            listing_with(vec![]),
            Some("Renamed".to_string()),
            Some(tmp.path().join("out").to_string_lossy().into_owned()),
        )
        .unwrap();
        assert_eq!(comic.title, "Renamed");
    }

    #[test]
    fn duplicate_chapter_titles_last_write_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let chapters = vec![
            ("第01卷".to_string(), "http://x/old#@page=1".to_string()),
            ("第02卷".to_string(), "http://x/2#@page=1".to_string()),
            ("第01卷".to_string(), "http://x/new#@page=1".to_string()),
        ];
        let comic = Comic::from_listing(
            reqwest::Client::new(),
            listing_with(chapters),
            None,
            Some(tmp.path().join("out").to_string_lossy().into_owned()),
        )
        .unwrap();
        assert_eq!(comic.chapter_titles(), vec!["第01卷", "第02卷"]);
        assert_eq!(comic.chapters()[0].url, "http://x/new#@page=1");
    }

    #[tokio::test]
    async fn unknown_chapter_download_is_soft() {
        let tmp = tempfile::tempdir().unwrap();
        let mut comic = Comic::from_listing(
            reqwest::Client::new(),
            listing_with(vec![]),
            None,
            Some(tmp.path().join("out").to_string_lossy().into_owned()),
        )
        .unwrap();
        // Logs and returns; nothing to assert beyond not panicking
        comic.download_chapter("第99卷").await;
        assert!(comic.discovered_pages().is_empty());
    }
}
