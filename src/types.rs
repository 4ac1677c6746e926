//! Shared types persisted between runs.
//!
//! [`ComicId`] keys both the used-comic set and the image filenames;
//! [`FeedItem`] is the unit stored in the feed state file. Both are
//! serialized to JSON and must stay readable by older state files.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;

/// Number of hex characters kept from the SHA-256 digest.
const ID_LEN: usize = 16;

/// Content-derived identifier of one comic strip.
///
/// Derived from the image URL's host and path. Query strings and fragments
/// are dropped so cache-busting parameters on the upstream CDN do not mint a
/// fresh identifier for the same strip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComicId(String);

impl ComicId {
    pub fn from_image_url(url: &Url) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(url.host_str().unwrap_or_default().as_bytes());
        hasher.update(url.path().as_bytes());
        let hex = format!("{:x}", hasher.finalize());
        Self(hex[..ID_LEN].to_string())
    }

    /// Parse a stored identifier.
    ///
    /// Returns `None` for values that cannot be a content identifier: empty
    /// strings, strings with whitespace or path separators, and legacy
    /// `YYYY-MM-DD` keys written by date-keyed versions of the store.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty()
            || raw
                .chars()
                .any(|c| c.is_whitespace() || c == '/' || c == '\\' || c == '.')
        {
            return None;
        }
        if is_legacy_date_key(raw) {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_legacy_date_key(raw: &str) -> bool {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok()
}

/// One published comic, as retained in the feed state.
///
/// Created once per successful run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub publication_date: NaiveDate,
    pub image_identifier: ComicId,
    /// Filename under the images directory, e.g. `3f2a9c0e1b4d5a6f.jpg`.
    pub image_filename: String,
    pub mime_type: String,
    pub byte_size: u64,
    pub publish_timestamp: DateTime<Utc>,
    /// Upstream image URL the strip was downloaded from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl FeedItem {
    /// Pixel dimensions, when both were readable at download time.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.width.zip(self.height)
    }
}
