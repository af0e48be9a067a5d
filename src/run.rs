use log::info;

use crate::comic::Comic;

/// Scrape the listing page at `url` and download every chapter.
///
/// Listing fetch/parse failures are fatal and bubble up; everything below
/// (discovery, per-page downloads) is best-effort and surfaces only as log
/// lines and reduced counts.
pub async fn run(
    url: String,
    title: Option<String>,
    directory: Option<String>,
) -> anyhow::Result<()> {
    info!("Downloading comic from {}", url);

    let client = reqwest::Client::new();
    let mut comic = Comic::new(client, &url, title, directory).await?;
    comic.download_all_chapters().await;

    info!("Finished!");
    Ok(())
}
