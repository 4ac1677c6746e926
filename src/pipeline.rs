//! One run of the publishing pipeline.
//!
//! ```text
//! Start → CheckDedup ─┬─ already published today ──────────────→ Regenerate → End
//!                     └─ not yet ─→ Fetch ─┬─ not found ────────→ Regenerate → End
//!                                          └─ found ─→ Materialize ─┬─ failed → Regenerate → End
//!                                                                   └─ ok ─→ Render + Append
//!                                                                            → Save state
//!                                                                            → Regenerate → End
//! ```
//!
//! Regenerate rewrites the feed document, the index page and the run log
//! from persisted state on every path, so the published site never goes
//! stale or missing because upstream had a bad day.
//!
//! Both state files are loaded together and every identifier in the feed is
//! folded into the used set. A feed item has been published by definition,
//! so a lost or trimmed `used_comics.json` heals itself on the next run
//! instead of blocking every publish after it.
//!
//! Only local I/O failures are returned as `Err`. Upstream trouble (network
//! errors, missing images, duplicates, broken payloads) ends in a
//! [`RunOutcome`] and a successful exit.
//!
//! The clock is a parameter: "today" is `now.date_naive()` in UTC.

use crate::config::SiteConfig;
use crate::feed::{self, FeedError, FeedState};
use crate::fetch::{AttemptRecord, Candidate, ComicSource, FetchOutcome, FetchPolicy, fetch_unique};
use crate::materialize::{Downloader, MaterializeError, Materializer, StoredImage};
use crate::output;
use crate::render::{self, RenderError};
use crate::store::{StoreError, UsedComics};
use crate::types::{ComicId, FeedItem};
use chrono::{DateTime, NaiveDate, Utc};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("image storage failed: {0}")]
    Materialize(MaterializeError),
    #[error("feed items missing from the used-comic set: {0:?}")]
    Invariant(Vec<ComicId>),
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// A new strip was published.
    Published {
        item: FeedItem,
        page_url: String,
        /// The image file already existed from an interrupted earlier run.
        reused_image: bool,
    },
    /// The feed already has an item for today; outputs were regenerated.
    AlreadyPublishedToday { date: NaiveDate },
    /// Every attempt failed or returned a strip already published.
    NoNewComic,
    /// A candidate was found but its image could not be stored.
    MaterializeFailed { id: ComicId, reason: String },
    /// Appending the candidate would have left feed items outside the used
    /// set. Nothing was saved; outputs were regenerated from saved state.
    Inconsistent { id: ComicId, missing: Vec<ComicId> },
    /// Outputs were rebuilt from state without contacting upstream.
    Regenerated,
}

/// Everything the run summary needs.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    pub attempts: Vec<AttemptRecord>,
    /// Items dropped from the feed by the retention cap.
    pub evicted: Vec<ComicId>,
    /// Size of the used-comic set after the run.
    pub used_count: usize,
    /// Legacy entries dropped when loading the used-comic set.
    pub discarded_legacy: usize,
    /// Feed identifiers that were missing from the used set and restored.
    pub restored: usize,
    /// Feed length after the run.
    pub feed_items: usize,
    pub feed_path: PathBuf,
}

/// Feed identifiers that are not in the used set. Empty when consistent.
pub fn check_invariant(used: &UsedComics, feed: &FeedState) -> Vec<ComicId> {
    feed.identifiers()
        .filter(|id| !used.contains(id))
        .cloned()
        .collect()
}

/// Load both state files and restore feed identifiers into the used set.
///
/// Returns the number of identifiers restored.
fn load_state(config: &SiteConfig) -> Result<(UsedComics, FeedState, usize), PipelineError> {
    let mut used = UsedComics::load(&config.feed.used_comics_file)?;
    let feed = FeedState::load(&config.feed.feed_state_file)?;
    let restored = used.absorb(feed.identifiers());
    if restored > 0 {
        tracing::warn!(
            "{} feed items were missing from {}, restored",
            restored,
            config.feed.used_comics_file.display()
        );
    }
    Ok((used, feed, restored))
}

/// Run the full pipeline once.
pub fn run(
    config: &SiteConfig,
    source: &impl ComicSource,
    downloader: &impl Downloader,
    now: DateTime<Utc>,
) -> Result<RunReport, PipelineError> {
    let (mut used, mut feed, restored) = load_state(config)?;
    let today = now.date_naive();
    tracing::info!(
        "Loaded {} used comics, {} feed items",
        used.len(),
        feed.len()
    );

    let mut attempts = Vec::new();
    let mut evicted = Vec::new();

    let outcome = if feed.published_on(today) {
        tracing::info!("Already published for {}, regenerating only", today);
        RunOutcome::AlreadyPublishedToday { date: today }
    } else {
        let policy = FetchPolicy::from_source_config(&config.source);
        match fetch_unique(source, &used, &policy) {
            FetchOutcome::NotFound { attempts: tried } => {
                tracing::warn!("No unpublished strip after {} attempts", tried.len());
                attempts = tried;
                RunOutcome::NoNewComic
            }
            FetchOutcome::Found {
                candidate,
                attempts: tried,
            } => {
                attempts = tried;
                match Materializer::new(downloader, config).materialize(&candidate) {
                    Ok(stored) => {
                        match publish(config, &mut used, &mut feed, &candidate, stored, now) {
                            Ok((outcome, dropped)) => {
                                evicted = dropped;
                                outcome
                            }
                            Err(PipelineError::Invariant(missing)) => {
                                tracing::error!(
                                    "Not publishing {}: feed items {:?} missing from the used set",
                                    candidate.id,
                                    missing
                                );
                                RunOutcome::Inconsistent {
                                    id: candidate.id,
                                    missing,
                                }
                            }
                            Err(e) => return Err(e),
                        }
                    }
                    Err(e) if e.is_fatal() => return Err(PipelineError::Materialize(e)),
                    Err(e) => {
                        tracing::warn!("Could not store {}: {}", candidate.id, e);
                        RunOutcome::MaterializeFailed {
                            id: candidate.id,
                            reason: e.to_string(),
                        }
                    }
                }
            }
        }
    };

    let report = RunReport {
        started_at: now,
        outcome,
        attempts,
        evicted,
        used_count: used.len(),
        discarded_legacy: used.discarded(),
        restored,
        feed_items: feed.len(),
        feed_path: config.output_dir().join(&config.site.feed_filename),
    };
    regenerate(config, &feed, &report)?;
    Ok(report)
}

/// Rebuild feed, index and run log from persisted state only.
pub fn regenerate_only(
    config: &SiteConfig,
    now: DateTime<Utc>,
) -> Result<RunReport, PipelineError> {
    let (used, feed, restored) = load_state(config)?;

    let report = RunReport {
        started_at: now,
        outcome: RunOutcome::Regenerated,
        attempts: Vec::new(),
        evicted: Vec::new(),
        used_count: used.len(),
        discarded_legacy: used.discarded(),
        restored,
        feed_items: feed.len(),
        feed_path: config.output_dir().join(&config.site.feed_filename),
    };
    regenerate(config, &feed, &report)?;
    Ok(report)
}

/// Render the page, record the strip, append it, and persist both state files.
///
/// `used` and `feed` are only updated once the appended state passes
/// [`check_invariant`]; on `Err` they still match what is on disk.
fn publish(
    config: &SiteConfig,
    used: &mut UsedComics,
    feed: &mut FeedState,
    candidate: &Candidate,
    stored: StoredImage,
    now: DateTime<Utc>,
) -> Result<(RunOutcome, Vec<ComicId>), PipelineError> {
    let (width, height) = stored.dimensions.unzip();
    let item = FeedItem {
        publication_date: now.date_naive(),
        image_identifier: stored.id,
        image_filename: stored.filename,
        mime_type: stored.kind.mime_type().to_string(),
        byte_size: stored.byte_size,
        publish_timestamp: now,
        source_url: Some(candidate.image_url.to_string()),
        width,
        height,
    };

    let mut next_used = used.clone();
    let mut next_feed = feed.clone();
    next_used.insert(item.image_identifier.clone());
    let evicted: Vec<ComicId> = next_feed
        .append(item.clone(), config.feed.max_items)
        .into_iter()
        .map(|old| old.image_identifier)
        .collect();

    let missing = check_invariant(&next_used, &next_feed);
    if !missing.is_empty() {
        return Err(PipelineError::Invariant(missing));
    }

    let page_url = render::render_comic_page(config, &item)?;
    next_used.save(&config.feed.used_comics_file)?;
    next_feed.save(&config.feed.feed_state_file)?;
    *used = next_used;
    *feed = next_feed;
    tracing::info!("Published {} as {}", item.image_identifier, page_url);

    Ok((
        RunOutcome::Published {
            item,
            page_url,
            reused_image: stored.reused,
        },
        evicted,
    ))
}

fn regenerate(
    config: &SiteConfig,
    feed: &FeedState,
    report: &RunReport,
) -> Result<(), PipelineError> {
    feed::write_feed(config, feed, report.started_at)?;
    render::render_index(config, feed.latest())?;
    render::render_run_log(config, &output::format_run_report(report))?;
    Ok(())
}
