//! End-to-end runs through the public API with scripted upstream fakes.

use chrono::{DateTime, TimeZone, Utc};
use comic_rss::config::{SiteConfig, load_config};
use comic_rss::feed::FeedState;
use comic_rss::fetch::{AttemptError, Candidate, ComicSource};
use comic_rss::materialize::Downloader;
use comic_rss::pipeline::{self, RunOutcome};
use comic_rss::store::UsedComics;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use url::Url;

/// Serves strips from a fixed rotation of image URLs.
struct Rotation {
    urls: RefCell<VecDeque<&'static str>>,
}

impl Rotation {
    fn new(urls: &[&'static str]) -> Self {
        Self {
            urls: RefCell::new(urls.iter().copied().collect()),
        }
    }
}

impl ComicSource for Rotation {
    fn attempt(&self) -> Result<Candidate, AttemptError> {
        let next = self.urls.borrow_mut().pop_front();
        match next {
            Some(raw) => Ok(Candidate::from_image_url(
                Url::parse(raw).unwrap(),
                Url::parse("https://viewer.example.com/strip/1").unwrap(),
            )),
            None => Err(AttemptError::NoImage {
                url: "https://viewer.example.com/random".into(),
            }),
        }
    }
}

/// Serves the same PNG-signed payload for every URL.
struct PngServer;

impl Downloader for PngServer {
    fn download(&self, _url: &str) -> Result<Vec<u8>, AttemptError> {
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.resize(5000, 0);
        Ok(bytes)
    }
}

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, d, 7, 30, 0).unwrap()
}

fn write_config(root: &Path) -> SiteConfig {
    let path = root.join("comic-rss.toml");
    let toml = format!(
        r#"
[site]
base_url = "https://comics.example.org/"
output_dir = "{out}"

[source]
retry_delay_ms = 0
max_attempts = 3

[feed]
max_items = 2
used_comics_file = "{used}"
feed_state_file = "{state}"
"#,
        out = root.join("site").display(),
        used = root.join("used.json").display(),
        state = root.join("state.json").display(),
    );
    fs::write(&path, toml).unwrap();
    load_config(&path).unwrap()
}

#[test]
fn week_of_runs_keeps_feed_bounded_and_never_repeats() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path());

    // Query strings differ but host and path match, so the repeat is caught.
    let source = Rotation::new(&[
        "https://cdn.example.com/strip/a?width=900",
        "https://cdn.example.com/strip/a?width=1200",
        "https://cdn.example.com/strip/b",
        "https://cdn.example.com/strip/c",
    ]);

    let mut published = Vec::new();
    for d in 1..=4 {
        let report = pipeline::run(&config, &source, &PngServer, day(d)).unwrap();
        if let RunOutcome::Published { item, .. } = report.outcome {
            assert_eq!(item.mime_type, "image/png");
            assert!(item.image_filename.ends_with(".png"));
            published.push(item.image_identifier);
        }
    }

    // Day 1: a. Day 2: a again then b. Day 3: c. Day 4: nothing left.
    assert_eq!(published.len(), 3);
    let mut unique = published.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 3);

    let used = UsedComics::load(&config.feed.used_comics_file).unwrap();
    let feed = FeedState::load(&config.feed.feed_state_file).unwrap();
    assert_eq!(used.len(), 3);
    assert_eq!(feed.len(), 2);
    assert!(pipeline::check_invariant(&used, &feed).is_empty());

    let site = config.output_dir();
    let xml = fs::read_to_string(site.join("dilbert-clean.xml")).unwrap();
    assert!(xml.contains("<lastBuildDate>Wed, 4 Jun 2025 07:30:00 +0000</lastBuildDate>"));
    assert!(xml.contains("https://comics.example.org/dilbert-2025-06-03.html"));
    assert!(!xml.contains("dilbert-2025-06-01.html"));

    let index = fs::read_to_string(site.join("index.html")).unwrap();
    assert!(index.contains("dilbert-2025-06-03.html"));
    assert!(site.join("debug.html").exists());
}

#[test]
fn regenerate_on_fresh_checkout_writes_empty_site() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path());

    let report = pipeline::regenerate_only(&config, day(1)).unwrap();
    assert_eq!(report.outcome, RunOutcome::Regenerated);
    assert_eq!(report.feed_items, 0);

    let xml = fs::read_to_string(config.output_dir().join("dilbert-clean.xml")).unwrap();
    assert!(xml.contains("<channel>"));
    assert!(!xml.contains("<item>"));
    assert!(!config.feed.used_comics_file.exists());
}

#[test]
fn corrupt_state_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path());
    fs::write(&config.feed.used_comics_file, "not json").unwrap();

    let source = Rotation::new(&["https://cdn.example.com/strip/a"]);
    assert!(pipeline::run(&config, &source, &PngServer, day(1)).is_err());
}
