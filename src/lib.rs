//! # comic-rss
//!
//! Publishes one random daily comic strip per run as a static site plus an
//! RSS 2.0 feed. Every strip is published at most once, ever; the feed keeps
//! a bounded window of recent items; the site is rewritten on every run,
//! even when upstream has nothing new to offer.
//!
//! # Architecture: One Run
//!
//! ```text
//! used_comics.json ─┐
//! feed_state.json  ─┼→ fetch_unique ─→ materialize ─→ render page ─→ append ─→ save state
//!                   │        │               │                                     │
//!                   │   not found        failed                                    │
//!                   │        └───────────────┴──────────────→ regenerate ←─────────┘
//!                   │                                    feed.xml, index.html, debug.html
//! ```
//!
//! Two files are the only state. `used_comics.json` is the append-only
//! set of every identifier ever published and is what keeps repeats out.
//! `feed_state.json` is the feed's retained items; evicting an item from
//! the feed never removes it from the used set.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`store`] | The used-comic set: load, save, membership; atomic file writes |
//! | [`fetch`] | Scrapes the random-strip endpoint and retries until an unused strip turns up |
//! | [`materialize`] | Downloads a strip and stores it under a name derived from its signature bytes |
//! | [`render`] | Per-comic pages, the index page and the run log, rendered with Maud |
//! | [`feed`] | Bounded feed state and RSS 2.0 rendering with quick-xml |
//! | [`pipeline`] | The run state machine and its regenerate fallback |
//! | [`config`] | `comic-rss.toml` loading, merging over stock defaults, validation |
//! | [`types`] | Comic identifiers and feed items shared across modules |
//! | [`output`] | CLI output formatting for run reports and status |
//!
//! # Design Decisions
//!
//! ## Content Identifiers
//!
//! A strip is identified by a hash of its image URL's host and path, not by
//! the date it was published. Two runs that land on the same strip produce
//! the same identifier regardless of query strings or the day of the run,
//! so the used set actually prevents repeats. Older state files keyed by
//! date are recognised on load and dropped.
//!
//! ## Never Go Silent
//!
//! Feed readers and link unfurlers treat a missing or stale feed as broken.
//! Every run that can write locally rewrites the feed, with a fresh
//! `<lastBuildDate>`, and the index from whatever state exists. Only local
//! I/O failures end a run with an error.
//!
//! ## Network Seams
//!
//! Upstream access goes through two traits, [`fetch::ComicSource`] and
//! [`materialize::Downloader`]. [`fetch::HttpSource`] implements both with
//! a blocking reqwest client; tests substitute scripted fakes and never
//! touch the network.

pub mod config;
pub mod feed;
pub mod fetch;
pub mod materialize;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
