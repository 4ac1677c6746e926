//! Static HTML output.
//!
//! ## Generated Pages
//!
//! - **Comic page** (`/<page_prefix>-<date>.html`): one per published strip,
//!   carrying Open Graph and Twitter card metadata so links unfurl with the
//!   strip as the preview image.
//! - **Index page** (`/index.html`): landing page for the most recent strip,
//!   with the same preview metadata and a link to the feed.
//! - **Run log** (`/debug.html`): the summary of the last run, when
//!   `site.run_log` is enabled.
//!
//! ## Preview images
//!
//! Social platforms cache preview images aggressively by URL. The
//! `og:image` URL carries a `?v=YYYYMMDD` token from the publication date so
//! each day's page gets a fresh fetch. Apart from that token a comic page is
//! a pure function of its feed item and the config: rendering it twice
//! yields identical bytes.
//!
//! Markup is generated with [maud](https://maud.lambda.xyz/); all
//! interpolation is escaped.

use crate::config::SiteConfig;
use crate::feed::item_title;
use crate::store::write_atomic;
use crate::types::FeedItem;
use maud::{DOCTYPE, Markup, html};
use std::path::{Path, PathBuf};
use thiserror::Error;

const STYLE: &str = "body{font-family:system-ui,sans-serif;max-width:60rem;margin:2rem auto;padding:0 1rem}\
img{max-width:100%;height:auto}\
pre{white-space:pre-wrap}";

const RUN_LOG_FILENAME: &str = "debug.html";

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn write_page(path: &Path, markup: Markup) -> Result<(), RenderError> {
    write_atomic(path, markup.into_string().as_bytes()).map_err(|source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ============================================================================
// HTML Components
// ============================================================================

/// Renders the base HTML document structure
fn base_document(config: &SiteConfig, title: &str, head: Markup, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang=(config.site.language) prefix="og: http://ogp.me/ns#" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                link rel="alternate" type="application/rss+xml" title=(config.site.title) href=(config.feed_url());
                (head)
                style { (STYLE) }
            }
            body {
                (content)
            }
        }
    }
}

/// Preview image URL with the per-date cache-busting token.
fn preview_image_url(config: &SiteConfig, item: &FeedItem) -> String {
    format!(
        "{}?v={}",
        config.image_url(&item.image_filename),
        item.publication_date.format("%Y%m%d")
    )
}

fn preview_description(config: &SiteConfig) -> String {
    format!("View today's {} comic.", config.site.item_title)
}

/// Open Graph and Twitter card tags for an item.
fn social_meta(config: &SiteConfig, item: &FeedItem) -> Markup {
    let title = item_title(config, item);
    let page_url = config.page_url(item.publication_date);
    let image_url = preview_image_url(config, item);
    let description = preview_description(config);

    html! {
        meta property="og:title" content=(title);
        meta property="og:type" content="article";
        meta property="og:url" content=(page_url);
        meta property="og:image" content=(image_url);
        meta property="og:image:type" content=(item.mime_type);
        @if let Some((width, height)) = item.dimensions() {
            meta property="og:image:width" content=(width);
            meta property="og:image:height" content=(height);
        }
        meta property="og:description" content=(description);
        meta name="twitter:card" content="summary_large_image";
        meta name="twitter:title" content=(title);
        meta name="twitter:description" content=(description);
        meta name="twitter:image" content=(image_url);
    }
}

/// The strip itself, linking out to its source when known.
fn strip_figure(config: &SiteConfig, item: &FeedItem) -> Markup {
    let image_url = config.image_url(&item.image_filename);
    let href = item.source_url.clone().unwrap_or_else(|| image_url.clone());
    let alt = format!("{} comic for {}", config.site.item_title, item.publication_date);

    html! {
        a href=(href) target="_blank" rel="noopener" {
            img src=(image_url) alt=(alt)
                width=[item.width] height=[item.height];
        }
    }
}

// ============================================================================
// Page Renderers
// ============================================================================

/// Markup of the per-comic page.
pub fn comic_page(config: &SiteConfig, item: &FeedItem) -> Markup {
    let title = item_title(config, item);
    let page_url = config.page_url(item.publication_date);

    let head = html! {
        link rel="canonical" href=(page_url);
        (social_meta(config, item))
    };
    let content = html! {
        main {
            h1 { (title) }
            (strip_figure(config, item))
        }
    };

    base_document(config, &title, head, content)
}

/// Write the per-comic page and return its public URL.
pub fn render_comic_page(config: &SiteConfig, item: &FeedItem) -> Result<String, RenderError> {
    let path = config
        .output_dir()
        .join(config.page_filename(item.publication_date));
    write_page(&path, comic_page(config, item))?;
    tracing::info!("Wrote {}", path.display());
    Ok(config.page_url(item.publication_date))
}

/// Markup of the landing page for the latest item.
pub fn index_page(config: &SiteConfig, latest: Option<&FeedItem>) -> Markup {
    let head = match latest {
        Some(item) => social_meta(config, item),
        None => html! {},
    };
    let content = html! {
        main {
            h1 { (config.site.title) " RSS Feed" }
            @if let Some(item) = latest {
                @let page_url = config.page_url(item.publication_date);
                p {
                    "Latest comic: "
                    a href=(page_url) { (page_url) }
                }
                (strip_figure(config, item))
            } @else {
                p { "No comic has been published yet." }
            }
            p {
                a href=(config.site.feed_filename) { "RSS Feed" }
            }
        }
    };

    base_document(config, &config.site.title, head, content)
}

/// Write `index.html` for the latest item (or the empty landing page).
pub fn render_index(config: &SiteConfig, latest: Option<&FeedItem>) -> Result<(), RenderError> {
    let path = config.output_dir().join("index.html");
    write_page(&path, index_page(config, latest))?;
    tracing::info!("Wrote {}", path.display());
    Ok(())
}

/// Markup of the run log page.
pub fn run_log_page(config: &SiteConfig, lines: &[String]) -> Markup {
    let content = html! {
        main {
            h1 { "Debug Output" }
            pre { (lines.join("\n")) }
        }
    };
    base_document(config, "Debug Output", html! {}, content)
}

/// Write `debug.html` with the run log. No-op when `site.run_log` is off.
pub fn render_run_log(config: &SiteConfig, lines: &[String]) -> Result<(), RenderError> {
    if !config.site.run_log {
        return Ok(());
    }
    let path = config.output_dir().join(RUN_LOG_FILENAME);
    write_page(&path, run_log_page(config, lines))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{feed_item, test_config};
    use chrono::{TimeZone, Utc};
    use std::fs;
    use tempfile::TempDir;

    fn item_on(day: u32) -> FeedItem {
        feed_item(
            &format!("strip{day}"),
            Utc.with_ymd_and_hms(2025, 6, day, 6, 0, 0).unwrap(),
        )
    }

    // =========================================================================
    // Comic page
    // =========================================================================

    #[test]
    fn comic_page_has_preview_metadata() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let html = comic_page(&config, &item_on(1)).into_string();

        assert!(html.contains("<title>Dilbert for 2025-06-01</title>"));
        assert!(html.contains(
            r#"<meta property="og:url" content="https://comics.example.org/daily/dilbert-2025-06-01.html">"#
        ));
        assert!(html.contains(
            r#"<meta property="og:image" content="https://comics.example.org/daily/images/strip1.jpg?v=20250601">"#
        ));
        assert!(html.contains(r#"<meta property="og:image:type" content="image/jpeg">"#));
        assert!(html.contains(r#"<meta name="twitter:card" content="summary_large_image">"#));
        assert!(html.contains(
            r#"<link rel="canonical" href="https://comics.example.org/daily/dilbert-2025-06-01.html">"#
        ));
        assert!(html.contains(r#"src="https://comics.example.org/daily/images/strip1.jpg""#));
    }

    #[test]
    fn dimensions_only_when_known() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());

        let mut item = item_on(1);
        let without = comic_page(&config, &item).into_string();
        assert!(!without.contains("og:image:width"));

        item.width = Some(900);
        item.height = Some(280);
        let with = comic_page(&config, &item).into_string();
        assert!(with.contains(r#"<meta property="og:image:width" content="900">"#));
        assert!(with.contains(r#"<meta property="og:image:height" content="280">"#));
        assert!(with.contains(r#"width="900""#));
    }

    #[test]
    fn comic_page_links_to_source() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let mut item = item_on(1);
        item.source_url = Some("https://assets.example.com/strips/strip1".into());
        let html = comic_page(&config, &item).into_string();
        assert!(html.contains(r#"href="https://assets.example.com/strips/strip1""#));
    }

    #[test]
    fn render_comic_page_is_byte_identical_on_rerender() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let item = item_on(1);

        let url = render_comic_page(&config, &item).unwrap();
        assert_eq!(url, "https://comics.example.org/daily/dilbert-2025-06-01.html");
        let path = config.output_dir().join("dilbert-2025-06-01.html");
        let first = fs::read(&path).unwrap();

        render_comic_page(&config, &item).unwrap();
        assert_eq!(fs::read(&path).unwrap(), first);
    }

    #[test]
    fn titles_are_escaped() {
        let tmp = TempDir::new().unwrap();
        let mut config = test_config(tmp.path());
        config.site.item_title = "<Dilbert>".into();
        let html = comic_page(&config, &item_on(1)).into_string();
        assert!(html.contains("&lt;Dilbert&gt; for 2025-06-01"));
        assert!(!html.contains("<Dilbert>"));
    }

    // =========================================================================
    // Index page
    // =========================================================================

    #[test]
    fn index_reflects_latest_item() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        render_index(&config, Some(&item_on(3))).unwrap();

        let html = fs::read_to_string(config.output_dir().join("index.html")).unwrap();
        assert!(html.contains("dilbert-2025-06-03.html"));
        assert!(html.contains("strip3.jpg?v=20250603"));
        assert!(html.contains(r#"href="dilbert-clean.xml""#));
    }

    #[test]
    fn index_without_items_still_links_feed() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let html = index_page(&config, None).into_string();
        assert!(html.contains("No comic has been published yet."));
        assert!(html.contains(r#"href="dilbert-clean.xml""#));
        assert!(!html.contains("og:image"));
    }

    // =========================================================================
    // Run log
    // =========================================================================

    #[test]
    fn run_log_written_when_enabled() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        render_run_log(&config, &["Running for 2025-06-01".into(), "<done>".into()]).unwrap();

        let html = fs::read_to_string(config.output_dir().join("debug.html")).unwrap();
        assert!(html.contains("Running for 2025-06-01\n&lt;done&gt;"));
    }

    #[test]
    fn run_log_skipped_when_disabled() {
        let tmp = TempDir::new().unwrap();
        let mut config = test_config(tmp.path());
        config.site.run_log = false;
        render_run_log(&config, &["x".into()]).unwrap();
        assert!(!config.output_dir().join("debug.html").exists());
    }
}
