//! Run configuration.
//!
//! Handles loading, validating, and merging `comic-rss.toml`. Every value
//! has a stock default, so the tool runs with no config file at all; a user
//! file only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [site]
//! base_url = "https://djz2k.github.io/dilbert-rss"
//! output_dir = "docs"
//! title = "Daily Dilbert"
//! description = "Unofficial Dilbert feed with full comic previews."
//! language = "en"
//! item_title = "Dilbert"       # Items are titled "<item_title> for <date>"
//! page_prefix = "dilbert"      # Pages are written as "<page_prefix>-<date>.html"
//! feed_filename = "dilbert-clean.xml"
//! run_log = true               # Write debug.html with the last run's log
//!
//! [source]
//! random_url = "https://dilbert-viewer.herokuapp.com/random"
//! image_selector = "img[src*=\"amuniversal.com\"]"
//! user_agent = "Mozilla/5.0"
//! timeout_secs = 15
//! max_attempts = 5
//! retry_delay_ms = 1000
//! max_body_bytes = 20000000    # Larger image downloads are refused
//!
//! [images]
//! dir = "images"               # Relative to site.output_dir
//! min_bytes = 1000             # Smaller payloads are treated as broken
//!
//! [feed]
//! max_items = 30
//! used_comics_file = "used_comics.json"
//! feed_state_file = "feed_state.json"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILENAME: &str = "comic-rss.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Complete configuration for one run.
///
/// Passed by reference into every component; nothing reads global state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Published site identity and output layout.
    pub site: SiteSection,
    /// Upstream page scraping.
    pub source: SourceConfig,
    /// Image download and storage.
    pub images: ImagesConfig,
    /// Feed retention and state files.
    pub feed: FeedConfig,
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if url::Url::parse(&self.site.base_url).is_err() {
            return Err(ConfigError::Validation(format!(
                "site.base_url is not a valid URL: {:?}",
                self.site.base_url
            )));
        }
        if url::Url::parse(&self.source.random_url).is_err() {
            return Err(ConfigError::Validation(format!(
                "source.random_url is not a valid URL: {:?}",
                self.source.random_url
            )));
        }
        if scraper::Selector::parse(&self.source.image_selector).is_err() {
            return Err(ConfigError::Validation(format!(
                "source.image_selector is not a valid CSS selector: {:?}",
                self.source.image_selector
            )));
        }
        if self.source.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "source.max_attempts must be at least 1".into(),
            ));
        }
        if self.source.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "source.timeout_secs must be at least 1".into(),
            ));
        }
        if self.source.max_body_bytes < self.images.min_bytes {
            return Err(ConfigError::Validation(
                "source.max_body_bytes must not be below images.min_bytes".into(),
            ));
        }
        if self.feed.max_items == 0 {
            return Err(ConfigError::Validation(
                "feed.max_items must be at least 1".into(),
            ));
        }
        if self.site.page_prefix.is_empty() || self.site.page_prefix.contains('/') {
            return Err(ConfigError::Validation(
                "site.page_prefix must be a non-empty filename fragment".into(),
            ));
        }
        Ok(())
    }

    pub fn output_dir(&self) -> &Path {
        &self.site.output_dir
    }

    /// Directory images are materialized into.
    pub fn images_dir(&self) -> PathBuf {
        self.site.output_dir.join(&self.images.dir)
    }

    /// Filename of the per-comic page for a publication date.
    pub fn page_filename(&self, date: NaiveDate) -> String {
        format!("{}-{}.html", self.site.page_prefix, date.format("%Y-%m-%d"))
    }

    /// Absolute URL of the per-comic page for a publication date.
    pub fn page_url(&self, date: NaiveDate) -> String {
        format!("{}/{}", self.base_url(), self.page_filename(date))
    }

    /// Absolute URL of a materialized image.
    pub fn image_url(&self, filename: &str) -> String {
        format!("{}/{}/{}", self.base_url(), self.images.dir, filename)
    }

    /// Absolute URL of the RSS document.
    pub fn feed_url(&self) -> String {
        format!("{}/{}", self.base_url(), self.site.feed_filename)
    }

    /// Site root URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.site.base_url.trim_end_matches('/')
    }
}

/// Published site identity and output layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteSection {
    /// Public URL the output directory is served from.
    pub base_url: String,
    /// Directory all rendered documents and images are written to.
    pub output_dir: PathBuf,
    /// Feed channel and landing page title.
    pub title: String,
    /// Feed channel description.
    pub description: String,
    /// Feed channel language.
    pub language: String,
    /// Name used in item titles: `"<item_title> for <date>"`.
    pub item_title: String,
    /// Per-comic pages are written as `<page_prefix>-<date>.html`.
    pub page_prefix: String,
    /// RSS document filename inside the output directory.
    pub feed_filename: String,
    /// Write `debug.html` with the log of the last run.
    pub run_log: bool,
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            base_url: "https://djz2k.github.io/dilbert-rss".to_string(),
            output_dir: PathBuf::from("docs"),
            title: "Daily Dilbert".to_string(),
            description: "Unofficial Dilbert feed with full comic previews.".to_string(),
            language: "en".to_string(),
            item_title: "Dilbert".to_string(),
            page_prefix: "dilbert".to_string(),
            feed_filename: "dilbert-clean.xml".to_string(),
            run_log: true,
        }
    }
}

/// Upstream page scraping settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// Endpoint returning a page with a random strip on every request.
    pub random_url: String,
    /// CSS selector for the `<img>` carrying the strip.
    pub image_selector: String,
    /// User-Agent header sent with every request.
    pub user_agent: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Attempts per run before giving up on finding an unused strip.
    pub max_attempts: u32,
    /// Pause between attempts, in milliseconds.
    pub retry_delay_ms: u64,
    /// Largest image body accepted from upstream.
    pub max_body_bytes: u64,
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            random_url: "https://dilbert-viewer.herokuapp.com/random".to_string(),
            image_selector: r#"img[src*="amuniversal.com"]"#.to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            timeout_secs: 15,
            max_attempts: 5,
            retry_delay_ms: 1000,
            max_body_bytes: 20_000_000,
        }
    }
}

/// Image storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Subdirectory of the output directory holding images.
    pub dir: String,
    /// Payloads below this many bytes are rejected as broken or placeholders.
    pub min_bytes: u64,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            dir: "images".to_string(),
            min_bytes: 1000,
        }
    }
}

/// Feed retention and state file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedConfig {
    /// Most recent items kept in the feed; older ones are evicted.
    pub max_items: usize,
    /// JSON array of identifiers already published.
    pub used_comics_file: PathBuf,
    /// JSON array of retained feed items.
    pub feed_state_file: PathBuf,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            max_items: 30,
            used_comics_file: PathBuf::from("used_comics.json"),
            feed_state_file: PathBuf::from("feed_state.json"),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// Base layer that user overrides are merged on top of.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load config from a TOML file.
///
/// A missing file yields the stock defaults. An existing file is merged on
/// top of the defaults, checked for unknown keys, and validated.
pub fn load_config(path: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value();
    let merged = if path.exists() {
        let content = fs::read_to_string(path)?;
        let overlay: toml::Value = toml::from_str(&content)?;
        merge_toml(base, overlay)
    } else {
        base
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock config file.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# comic-rss configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Published site
# ---------------------------------------------------------------------------
[site]
# Public URL the output directory is served from. Used for every absolute
# link in pages and the feed.
base_url = "https://djz2k.github.io/dilbert-rss"

# Where pages, images and the feed are written.
output_dir = "docs"

title = "Daily Dilbert"
description = "Unofficial Dilbert feed with full comic previews."
language = "en"

# Items are titled "<item_title> for <date>".
item_title = "Dilbert"

# Per-comic pages are written as "<page_prefix>-<date>.html".
page_prefix = "dilbert"

feed_filename = "dilbert-clean.xml"

# Write debug.html with the log of the most recent run.
run_log = true

# ---------------------------------------------------------------------------
# Upstream source
# ---------------------------------------------------------------------------
[source]
# Endpoint that serves a random strip on every request.
random_url = "https://dilbert-viewer.herokuapp.com/random"

# CSS selector for the <img> element carrying the strip.
image_selector = 'img[src*="amuniversal.com"]'

user_agent = "Mozilla/5.0"
timeout_secs = 15

# Requests per run before giving up on finding a strip not yet published.
max_attempts = 5

# Pause between attempts, in milliseconds.
retry_delay_ms = 1000

# Image downloads larger than this many bytes are refused.
max_body_bytes = 20000000

# ---------------------------------------------------------------------------
# Images
# ---------------------------------------------------------------------------
[images]
# Subdirectory of site.output_dir.
dir = "images"

# Downloads smaller than this are treated as broken placeholders.
min_bytes = 1000

# ---------------------------------------------------------------------------
# Feed
# ---------------------------------------------------------------------------
[feed]
# Most recent items kept in the feed.
max_items = 30

# State files. Relative paths resolve against the working directory.
used_comics_file = "used_comics.json"
feed_state_file = "feed_state.json"
"##
}
