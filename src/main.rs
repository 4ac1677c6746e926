use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use comic_rss::feed::FeedState;
use comic_rss::fetch::HttpSource;
use comic_rss::store::UsedComics;
use comic_rss::{config, output, pipeline};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    if env!("COMIC_RSS_RELEASE") == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("COMIC_RSS_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Parser)]
#[command(name = "comic-rss")]
#[command(about = "Publish a daily comic strip as a static site and RSS feed")]
#[command(long_about = "\
Publish a daily comic strip as a static site and RSS feed

Each run picks a random strip from upstream that has never been published,
stores its image, writes a page with social preview metadata, and appends
it to a bounded RSS feed. When nothing new can be found the feed, index and
run log are still regenerated from saved state.

Output layout (under site.output_dir):

  docs/
  ├── index.html                   # Latest strip with preview metadata
  ├── dilbert-2025-06-01.html      # One page per published strip
  ├── dilbert-clean.xml            # RSS 2.0 feed
  ├── debug.html                   # Log of the last run (site.run_log)
  └── images/
      └── 3f9a1c0b7d2e4a61.jpg     # Named by content identifier

State (paths set in [feed]):
  used_comics.json   every identifier ever published
  feed_state.json    items currently in the feed

Run 'comic-rss gen-config' to generate a documented comic-rss.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (missing file means stock defaults)
    #[arg(long, default_value = config::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    /// Log verbosity (overridden by RUST_LOG)
    #[arg(long, value_enum, default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch and publish today's strip, then regenerate outputs (default)
    Run,
    /// Rebuild feed, index and run log from saved state without fetching
    Regenerate,
    /// Show saved state
    Status,
    /// Print a stock comic-rss.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = match cli.log_level {
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let site_config = config::load_config(&cli.config)?;
            let http = HttpSource::new(&site_config.source)?;
            let report = pipeline::run(&site_config, &http, &http, Utc::now())?;
            output::print_run_report(&report);
        }
        Command::Regenerate => {
            let site_config = config::load_config(&cli.config)?;
            let report = pipeline::regenerate_only(&site_config, Utc::now())?;
            output::print_run_report(&report);
        }
        Command::Status => {
            let site_config = config::load_config(&cli.config)?;
            let used = UsedComics::load(&site_config.feed.used_comics_file)?;
            let feed = FeedState::load(&site_config.feed.feed_state_file)?;
            let missing = pipeline::check_invariant(&used, &feed);
            output::print_status(&site_config, &used, &feed);
            if !missing.is_empty() {
                tracing::warn!("Feed items missing from the used set: {:?}", missing);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
