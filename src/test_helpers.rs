//! Shared test utilities for the comic-rss test suite.
//!
//! Provides scripted fakes for the two network seams ([`ComicSource`] and
//! [`Downloader`]), byte fixtures with real image signatures, and a config
//! rooted in a temp directory.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let config = test_config(tmp.path());
//! let source = FakeSource::new(vec![Ok(candidate("abc123")), Ok(candidate("xyz789"))]);
//! let downloader = FakeDownloader::new(vec![Ok(jpeg_bytes(4096))]);
//! ```

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use url::Url;

use crate::config::SiteConfig;
use crate::fetch::{AttemptError, Candidate, ComicSource};
use crate::materialize::Downloader;
use crate::types::{ComicId, FeedItem};

// =========================================================================
// Builders
// =========================================================================

/// Parse an identifier. Panics on legacy/invalid input.
pub fn id(raw: &str) -> ComicId {
    ComicId::parse(raw).unwrap_or_else(|| panic!("'{raw}' is not a valid identifier"))
}

/// Candidate with a fixed identifier and a deliberately misleading `.gif` URL.
pub fn candidate(raw_id: &str) -> Candidate {
    Candidate {
        id: id(raw_id),
        image_url: Url::parse(&format!("https://assets.example.com/strips/{raw_id}.gif")).unwrap(),
        page_url: Url::parse("https://viewer.example.com/random").unwrap(),
    }
}

/// Feed item for `raw_id` published at `at`.
pub fn feed_item(raw_id: &str, at: DateTime<Utc>) -> FeedItem {
    FeedItem {
        publication_date: at.date_naive(),
        image_identifier: id(raw_id),
        image_filename: format!("{raw_id}.jpg"),
        mime_type: "image/jpeg".to_string(),
        byte_size: 48213,
        publish_timestamp: at,
        source_url: None,
        width: None,
        height: None,
    }
}

/// 06:00 UTC on the given day of June 2025.
pub fn june(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, day, 6, 0, 0).unwrap()
}

/// Config with every path under `root` and no retry delay.
pub fn test_config(root: &Path) -> SiteConfig {
    let mut config = SiteConfig::default();
    config.site.base_url = "https://comics.example.org/daily".to_string();
    config.site.output_dir = root.join("docs");
    config.source.retry_delay_ms = 0;
    config.feed.used_comics_file = root.join("used_comics.json");
    config.feed.feed_state_file = root.join("feed_state.json");
    config
}

// =========================================================================
// Byte fixtures
// =========================================================================

/// `len` bytes starting with a JPEG SOI marker.
pub fn jpeg_bytes(len: usize) -> Vec<u8> {
    with_signature(&[0xFF, 0xD8, 0xFF, 0xE0], len)
}

/// `len` bytes starting with the PNG signature.
pub fn png_bytes(len: usize) -> Vec<u8> {
    with_signature(b"\x89PNG\r\n\x1a\n", len)
}

fn with_signature(signature: &[u8], len: usize) -> Vec<u8> {
    let mut bytes = signature.to_vec();
    bytes.resize(len.max(signature.len()), 0);
    bytes.truncate(len);
    bytes
}

// =========================================================================
// Scripted fakes
// =========================================================================

/// Source that replays scripted attempt results in order.
///
/// Once the script runs out every attempt fails with `NoImage`.
pub struct FakeSource {
    script: Mutex<VecDeque<Result<Candidate, AttemptError>>>,
    calls: Mutex<usize>,
}

impl FakeSource {
    pub fn new(script: Vec<Result<Candidate, AttemptError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl ComicSource for FakeSource {
    fn attempt(&self) -> Result<Candidate, AttemptError> {
        *self.calls.lock().unwrap() += 1;
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(AttemptError::NoImage {
                    url: "https://viewer.example.com/random".into(),
                })
            })
    }
}

/// Downloader that replays scripted payloads and records requested URLs.
pub struct FakeDownloader {
    script: Mutex<VecDeque<Result<Vec<u8>, AttemptError>>>,
    requested: Mutex<Vec<String>>,
}

impl FakeDownloader {
    pub fn new(script: Vec<Result<Vec<u8>, AttemptError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl Downloader for FakeDownloader {
    fn download(&self, url: &str) -> Result<Vec<u8>, AttemptError> {
        self.requested.lock().unwrap().push(url.to_string());
        self.script.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(AttemptError::Status {
                status: 404,
                url: url.to_string(),
            })
        })
    }
}
