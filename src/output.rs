//! CLI output formatting for runs and state inspection.
//!
//! # Output Format
//!
//! ## Run
//!
//! ```text
//! Run 2025-06-01 06:00:00 UTC
//! State
//!     12 used comics, 5 feed items
//!     Dropped 2 legacy entries
//! Attempts
//!     001 already published: abc123
//!     002 failed: HTTP 503 from https://viewer.example.com/random
//!     003 accepted: xyz789
//! Published xyz789 → https://example.org/dilbert-2025-06-01.html
//!     Image: xyz789.jpg (48213 bytes, image/jpeg, 900x280)
//!     Evicted: a1b2c3
//! Feed: 6 items → docs/dilbert-clean.xml
//! ```
//!
//! ## Status
//!
//! ```text
//! Daily Dilbert → https://example.org/dilbert-clean.xml
//!     Used comics: 12
//!     Feed items: 5 of 30
//! Feed
//!     001 2025-06-01 xyz789 → dilbert-2025-06-01.html
//! ```
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure.

use crate::config::SiteConfig;
use crate::feed::FeedState;
use crate::fetch::AttemptRecord;
use crate::pipeline::{RunOutcome, RunReport};
use crate::store::UsedComics;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn attempt_line(index: usize, record: &AttemptRecord) -> String {
    let detail = match record {
        AttemptRecord::AlreadyUsed(id) => format!("already published: {id}"),
        AttemptRecord::Failed(reason) => format!("failed: {reason}"),
        AttemptRecord::Accepted(id) => format!("accepted: {id}"),
    };
    format!("{}{} {}", indent(1), format_index(index), detail)
}

/// Lines describing one pipeline run. Also used for the run log page.
pub fn format_run_report(report: &RunReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Run {}",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    )];

    lines.push("State".to_string());
    lines.push(format!(
        "{}{} used comics, {} feed items",
        indent(1),
        report.used_count,
        report.feed_items
    ));
    if report.restored > 0 {
        lines.push(format!(
            "{}Restored {} feed identifiers to the used set",
            indent(1),
            report.restored
        ));
    }
    if report.discarded_legacy > 0 {
        lines.push(format!(
            "{}Dropped {} legacy entries",
            indent(1),
            report.discarded_legacy
        ));
    }

    if !report.attempts.is_empty() {
        lines.push("Attempts".to_string());
        for (i, record) in report.attempts.iter().enumerate() {
            lines.push(attempt_line(i + 1, record));
        }
    }

    match &report.outcome {
        RunOutcome::Published {
            item,
            page_url,
            reused_image,
        } => {
            lines.push(format!("Published {} → {}", item.image_identifier, page_url));
            let dims = item
                .dimensions()
                .map(|(w, h)| format!(", {w}x{h}"))
                .unwrap_or_default();
            let reused = if *reused_image { ", reused" } else { "" };
            lines.push(format!(
                "{}Image: {} ({} bytes, {}{}{})",
                indent(1),
                item.image_filename,
                item.byte_size,
                item.mime_type,
                dims,
                reused
            ));
            if !report.evicted.is_empty() {
                let evicted: Vec<&str> = report.evicted.iter().map(|id| id.as_str()).collect();
                lines.push(format!("{}Evicted: {}", indent(1), evicted.join(", ")));
            }
        }
        RunOutcome::AlreadyPublishedToday { date } => {
            lines.push(format!("Already published for {date}, regenerated outputs"));
        }
        RunOutcome::NoNewComic => {
            lines.push(format!(
                "No new comic after {} attempts, regenerated outputs",
                report.attempts.len()
            ));
        }
        RunOutcome::MaterializeFailed { id, reason } => {
            lines.push(format!("Could not store {id}: {reason}"));
            lines.push(format!("{}Regenerated outputs", indent(1)));
        }
        RunOutcome::Inconsistent { id, missing } => {
            let missing: Vec<&str> = missing.iter().map(|id| id.as_str()).collect();
            lines.push(format!("Not publishing {id}: state is inconsistent"));
            lines.push(format!(
                "{}Missing from used set: {}",
                indent(1),
                missing.join(", ")
            ));
            lines.push(format!("{}Regenerated outputs", indent(1)));
        }
        RunOutcome::Regenerated => {
            lines.push("Regenerated outputs from saved state".to_string());
        }
    }

    lines.push(format!(
        "Feed: {} items → {}",
        report.feed_items,
        report.feed_path.display()
    ));
    lines
}

pub fn print_run_report(report: &RunReport) {
    for line in format_run_report(report) {
        println!("{}", line);
    }
}

/// Summary of persisted state, newest feed item first.
pub fn format_status(config: &SiteConfig, used: &UsedComics, feed: &FeedState) -> Vec<String> {
    let mut lines = vec![
        format!("{} → {}", config.site.title, config.feed_url()),
        format!("{}Used comics: {}", indent(1), used.len()),
        format!(
            "{}Feed items: {} of {}",
            indent(1),
            feed.len(),
            config.feed.max_items
        ),
    ];
    if used.discarded() > 0 {
        lines.push(format!(
            "{}Legacy entries (dropped on next save): {}",
            indent(1),
            used.discarded()
        ));
    }

    if !feed.is_empty() {
        lines.push("Feed".to_string());
        let mut items: Vec<_> = feed.items().iter().collect();
        items.sort_by(|a, b| b.publish_timestamp.cmp(&a.publish_timestamp));
        for (i, item) in items.iter().enumerate() {
            lines.push(format!(
                "{}{} {} {} → {}",
                indent(1),
                format_index(i + 1),
                item.publication_date,
                item.image_identifier,
                config.page_filename(item.publication_date)
            ));
        }
    }
    lines
}

pub fn print_status(config: &SiteConfig, used: &UsedComics, feed: &FeedState) {
    for line in format_status(config, used, feed) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{feed_item, id, june, test_config};
    use std::path::PathBuf;

    fn report(outcome: RunOutcome) -> RunReport {
        RunReport {
            started_at: june(1),
            outcome,
            attempts: Vec::new(),
            evicted: Vec::new(),
            used_count: 3,
            discarded_legacy: 0,
            restored: 0,
            feed_items: 2,
            feed_path: PathBuf::from("docs/dilbert-clean.xml"),
        }
    }

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(100), "100");
    }

    #[test]
    fn indent_depth() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    // =========================================================================
    // Run report
    // =========================================================================

    #[test]
    fn published_report() {
        let mut item = feed_item("xyz789", june(1));
        item.width = Some(900);
        item.height = Some(280);
        let mut r = report(RunOutcome::Published {
            item,
            page_url: "https://example.org/dilbert-2025-06-01.html".into(),
            reused_image: false,
        });
        r.attempts = vec![
            AttemptRecord::AlreadyUsed(id("abc123")),
            AttemptRecord::Failed("HTTP 503 from https://viewer.example.com/random".into()),
            AttemptRecord::Accepted(id("xyz789")),
        ];
        r.evicted = vec![id("old1")];

        let lines = format_run_report(&r);
        assert_eq!(lines[0], "Run 2025-06-01 06:00:00 UTC");
        assert!(lines.contains(&"    001 already published: abc123".to_string()));
        assert!(lines.contains(
            &"    002 failed: HTTP 503 from https://viewer.example.com/random".to_string()
        ));
        assert!(lines.contains(&"    003 accepted: xyz789".to_string()));
        assert!(lines.contains(
            &"Published xyz789 → https://example.org/dilbert-2025-06-01.html".to_string()
        ));
        assert!(
            lines.contains(&"    Image: xyz789.jpg (48213 bytes, image/jpeg, 900x280)".to_string())
        );
        assert!(lines.contains(&"    Evicted: old1".to_string()));
        assert_eq!(
            lines.last().unwrap(),
            "Feed: 2 items → docs/dilbert-clean.xml"
        );
    }

    #[test]
    fn no_new_comic_report() {
        let mut r = report(RunOutcome::NoNewComic);
        r.attempts = vec![
            AttemptRecord::AlreadyUsed(id("abc123")),
            AttemptRecord::AlreadyUsed(id("abc123")),
        ];
        let lines = format_run_report(&r);
        assert!(lines.contains(&"No new comic after 2 attempts, regenerated outputs".to_string()));
    }

    #[test]
    fn materialize_failure_report() {
        let r = report(RunOutcome::MaterializeFailed {
            id: id("xyz789"),
            reason: "payload is 200 bytes, below the 1000-byte minimum".into(),
        });
        let lines = format_run_report(&r);
        assert!(lines.contains(
            &"Could not store xyz789: payload is 200 bytes, below the 1000-byte minimum"
                .to_string()
        ));
        // No attempts section without attempts
        assert!(!lines.contains(&"Attempts".to_string()));
    }

    #[test]
    fn legacy_entries_reported_only_when_present() {
        let mut r = report(RunOutcome::Regenerated);
        assert!(!format_run_report(&r).iter().any(|l| l.contains("legacy")));
        r.discarded_legacy = 4;
        assert!(
            format_run_report(&r)
                .contains(&"    Dropped 4 legacy entries".to_string())
        );
    }

    #[test]
    fn restored_identifiers_reported() {
        let mut r = report(RunOutcome::NoNewComic);
        assert!(!format_run_report(&r).iter().any(|l| l.contains("Restored")));
        r.restored = 1;
        assert!(
            format_run_report(&r)
                .contains(&"    Restored 1 feed identifiers to the used set".to_string())
        );
    }

    #[test]
    fn inconsistent_state_report() {
        let r = report(RunOutcome::Inconsistent {
            id: id("xyz789"),
            missing: vec![id("abc123")],
        });
        let lines = format_run_report(&r);
        assert!(lines.contains(&"Not publishing xyz789: state is inconsistent".to_string()));
        assert!(lines.contains(&"    Missing from used set: abc123".to_string()));
    }

    // =========================================================================
    // Status
    // =========================================================================

    #[test]
    fn status_lists_feed_newest_first() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let used: UsedComics = [id("a"), id("b"), id("c")].into_iter().collect();
        let mut feed = FeedState::new();
        feed.append(feed_item("a", june(1)), 30);
        feed.append(feed_item("b", june(2)), 30);

        let lines = format_status(&config, &used, &feed);
        assert_eq!(
            lines[0],
            "Daily Dilbert → https://comics.example.org/daily/dilbert-clean.xml"
        );
        assert_eq!(lines[1], "    Used comics: 3");
        assert_eq!(lines[2], "    Feed items: 2 of 30");
        assert_eq!(lines[4], "    001 2025-06-02 b → dilbert-2025-06-02.html");
        assert_eq!(lines[5], "    002 2025-06-01 a → dilbert-2025-06-01.html");
    }

    #[test]
    fn status_empty_state() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let lines = format_status(&config, &UsedComics::new(), &FeedState::new());
        assert_eq!(lines.len(), 3);
    }
}
