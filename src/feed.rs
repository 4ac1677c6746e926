//! Feed accumulation and RSS 2.0 rendering.
//!
//! [`FeedState`] is the list of retained items, persisted as a JSON array in
//! chronological order. Each successful run appends one item and evicts the
//! oldest beyond `feed.max_items`.
//!
//! [`render`] turns the state into the syndication document. It reads
//! nothing but the state and the config, so a run that found no new strip
//! can still rebuild a valid, current feed. Two renders of the same state
//! differ only in `<lastBuildDate>`.
//!
//! ```text
//! <rss version="2.0">
//!   <channel>
//!     title, link, description, language, atom:link, generator, lastBuildDate
//!     <item>                       newest first
//!       title, link, guid, pubDate, description (HTML), enclosure
//!     </item>
//!   </channel>
//! </rss>
//! ```

use crate::config::SiteConfig;
use crate::store::write_atomic;
use crate::types::{ComicId, FeedItem};
use chrono::{DateTime, NaiveDate, Utc};
use maud::html;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const GENERATOR: &str = concat!("comic-rss ", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path} is not a valid feed state: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize feed state for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("XML write error: {0}")]
    Xml(String),
}

/// Retained feed items, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct FeedState {
    items: Vec<FeedItem>,
}

impl FeedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from disk. A missing file is an empty feed.
    pub fn load(path: &Path) -> Result<Self, FeedError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(source) => {
                return Err(FeedError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let mut state: Self =
            serde_json::from_str(&content).map_err(|source| FeedError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        state.items.sort_by_key(|item| item.publish_timestamp);
        Ok(state)
    }

    pub fn save(&self, path: &Path) -> Result<(), FeedError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| FeedError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;
        write_atomic(path, json.as_bytes()).map_err(|source| FeedError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Add the newest item and evict the oldest beyond `cap`.
    ///
    /// Returns the evicted items, oldest first.
    pub fn append(&mut self, item: FeedItem, cap: usize) -> Vec<FeedItem> {
        self.items.push(item);
        self.items.sort_by_key(|item| item.publish_timestamp);
        let excess = self.items.len().saturating_sub(cap);
        self.items.drain(..excess).collect()
    }

    /// The most recently published item.
    pub fn latest(&self) -> Option<&FeedItem> {
        self.items.iter().max_by_key(|item| item.publish_timestamp)
    }

    /// Whether an item was already published for `date`.
    pub fn published_on(&self, date: NaiveDate) -> bool {
        self.items.iter().any(|item| item.publication_date == date)
    }

    pub fn items(&self) -> &[FeedItem] {
        &self.items
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &ComicId> {
        self.items.iter().map(|item| &item.image_identifier)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// RSS `<enclosure>` for a published image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure {
    pub url: String,
    pub length: u64,
    pub mime_type: String,
}

impl Enclosure {
    pub fn for_item(config: &SiteConfig, item: &FeedItem) -> Self {
        Self {
            url: config.image_url(&item.image_filename),
            length: item.byte_size,
            mime_type: item.mime_type.clone(),
        }
    }
}

/// Display title of an item, e.g. `"Dilbert for 2025-06-01"`.
pub fn item_title(config: &SiteConfig, item: &FeedItem) -> String {
    format!(
        "{} for {}",
        config.site.item_title,
        item.publication_date.format("%Y-%m-%d")
    )
}

/// HTML body of an item's `<description>`: a line of text and the strip.
pub fn item_description(config: &SiteConfig, item: &FeedItem) -> String {
    let date = item.publication_date.format("%Y-%m-%d").to_string();
    html! {
        p { (config.site.item_title) " comic for " (date) "." }
        img src=(config.image_url(&item.image_filename)) alt={ (config.site.item_title) " comic" };
    }
    .into_string()
}

/// Render the RSS document for `state`. `built_at` becomes `<lastBuildDate>`.
pub fn render(
    config: &SiteConfig,
    state: &FeedState,
    built_at: DateTime<Utc>,
) -> Result<String, FeedError> {
    let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);
    emit(&mut w, Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    rss.push_attribute(("xmlns:atom", "http://www.w3.org/2005/Atom"));
    emit(&mut w, Event::Start(rss))?;
    emit(&mut w, Event::Start(BytesStart::new("channel")))?;

    text_element(&mut w, "title", &config.site.title)?;
    text_element(&mut w, "link", &format!("{}/", config.base_url()))?;
    text_element(&mut w, "description", &config.site.description)?;
    text_element(&mut w, "language", &config.site.language)?;
    let feed_url = config.feed_url();
    let mut self_link = BytesStart::new("atom:link");
    self_link.push_attribute(("href", feed_url.as_str()));
    self_link.push_attribute(("rel", "self"));
    self_link.push_attribute(("type", "application/rss+xml"));
    emit(&mut w, Event::Empty(self_link))?;
    text_element(&mut w, "generator", GENERATOR)?;
    text_element(&mut w, "lastBuildDate", &built_at.to_rfc2822())?;

    let mut items: Vec<&FeedItem> = state.items().iter().collect();
    items.sort_by(|a, b| b.publish_timestamp.cmp(&a.publish_timestamp));
    for item in items {
        write_item(&mut w, config, item)?;
    }

    emit(&mut w, Event::End(BytesEnd::new("channel")))?;
    emit(&mut w, Event::End(BytesEnd::new("rss")))?;

    let mut out = String::from_utf8(w.into_inner()).map_err(|e| FeedError::Xml(e.to_string()))?;
    out.push('\n');
    Ok(out)
}

/// Render and write the feed to `<output>/<feed_filename>`.
pub fn write_feed(
    config: &SiteConfig,
    state: &FeedState,
    built_at: DateTime<Utc>,
) -> Result<PathBuf, FeedError> {
    let xml = render(config, state, built_at)?;
    let path = config.output_dir().join(&config.site.feed_filename);
    write_atomic(&path, xml.as_bytes()).map_err(|source| FeedError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

fn write_item<W: io::Write>(
    w: &mut Writer<W>,
    config: &SiteConfig,
    item: &FeedItem,
) -> Result<(), FeedError> {
    emit(w, Event::Start(BytesStart::new("item")))?;
    text_element(w, "title", &item_title(config, item))?;
    text_element(w, "link", &config.page_url(item.publication_date))?;

    let mut guid = BytesStart::new("guid");
    guid.push_attribute(("isPermaLink", "false"));
    emit(w, Event::Start(guid))?;
    emit(w, Event::Text(BytesText::new(item.image_identifier.as_str())))?;
    emit(w, Event::End(BytesEnd::new("guid")))?;

    text_element(w, "pubDate", &item.publish_timestamp.to_rfc2822())?;
    text_element(w, "description", &item_description(config, item))?;

    let enclosure = Enclosure::for_item(config, item);
    let length = enclosure.length.to_string();
    let mut el = BytesStart::new("enclosure");
    el.push_attribute(("url", enclosure.url.as_str()));
    el.push_attribute(("length", length.as_str()));
    el.push_attribute(("type", enclosure.mime_type.as_str()));
    emit(w, Event::Empty(el))?;

    emit(w, Event::End(BytesEnd::new("item")))
}

fn text_element<W: io::Write>(w: &mut Writer<W>, name: &str, text: &str) -> Result<(), FeedError> {
    emit(w, Event::Start(BytesStart::new(name)))?;
    emit(w, Event::Text(BytesText::new(text)))?;
    emit(w, Event::End(BytesEnd::new(name)))
}

fn emit<W: io::Write>(w: &mut Writer<W>, event: Event<'_>) -> Result<(), FeedError> {
    w.write_event(event).map_err(|e| FeedError::Xml(e.to_string()))
}
