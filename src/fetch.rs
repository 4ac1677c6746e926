//! Upstream scraping: find a strip that has not been published yet.
//!
//! A single [`ComicSource::attempt`] makes one request to the random-strip
//! endpoint and pulls the strip's image URL out of the returned markup.
//! [`fetch_unique`] is the loop around it: it keeps asking until it sees an
//! identifier that is not in the used set, or the attempt budget runs out.
//!
//! The loop never fails. Network errors, non-2xx responses and pages without
//! a matching `<img>` all count as a spent attempt, and running out of
//! attempts is reported as [`FetchOutcome::NotFound`]: "nothing new today",
//! which the pipeline handles by regenerating from existing state.
//!
//! The selector and endpoint come from [`SourceConfig`]; the upstream page
//! layout is outside our control, so both are configurable rather than
//! baked in.

use crate::config::SourceConfig;
use crate::materialize::Downloader;
use crate::store::UsedComics;
use crate::types::ComicId;
use reqwest::blocking::Client;
use scraper::{Html, Selector};
use std::io::Read;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Why a single attempt produced no candidate.
#[derive(Error, Debug)]
pub enum AttemptError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
    #[error("no image matching the selector on {url}")]
    NoImage { url: String },
    #[error("image reference {0:?} is not a usable URL")]
    BadImageUrl(String),
    #[error("body of {url} is at least {size} bytes, above the {max}-byte limit")]
    TooLarge { size: u64, max: u64, url: String },
    #[error("reading body of {url} failed: {source}")]
    Read {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP client setup failed: {0}")]
    Setup(String),
}

/// A strip found upstream, not yet downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: ComicId,
    /// Absolute URL of the strip image.
    pub image_url: Url,
    /// Page the image reference was scraped from.
    pub page_url: Url,
}

impl Candidate {
    pub fn from_image_url(image_url: Url, page_url: Url) -> Self {
        Self {
            id: ComicId::from_image_url(&image_url),
            image_url,
            page_url,
        }
    }
}

/// One request's worth of scraping.
pub trait ComicSource {
    fn attempt(&self) -> Result<Candidate, AttemptError>;
}

/// Attempt budget for [`fetch_unique`].
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl FetchPolicy {
    pub fn from_source_config(config: &SourceConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            retry_delay: config.retry_delay(),
        }
    }
}

/// What happened on one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptRecord {
    /// Found a strip that was already published.
    AlreadyUsed(ComicId),
    /// Request or extraction failed; the message is the error's display form.
    Failed(String),
    /// Found a strip not yet published.
    Accepted(ComicId),
}

#[derive(Debug)]
pub enum FetchOutcome {
    Found {
        candidate: Candidate,
        attempts: Vec<AttemptRecord>,
    },
    NotFound {
        attempts: Vec<AttemptRecord>,
    },
}

impl FetchOutcome {
    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            FetchOutcome::Found { attempts, .. } | FetchOutcome::NotFound { attempts } => attempts,
        }
    }
}

/// Ask `source` for strips until one is not in `existing`.
///
/// Makes at most `policy.max_attempts` calls, sleeping `policy.retry_delay`
/// between them. Never returns an error.
pub fn fetch_unique(
    source: &impl ComicSource,
    existing: &UsedComics,
    policy: &FetchPolicy,
) -> FetchOutcome {
    let mut attempts = Vec::new();

    for attempt in 1..=policy.max_attempts {
        if attempt > 1 && !policy.retry_delay.is_zero() {
            std::thread::sleep(policy.retry_delay);
        }

        match source.attempt() {
            Ok(candidate) if existing.contains(&candidate.id) => {
                tracing::info!(
                    "Attempt {}/{}: {} already published",
                    attempt,
                    policy.max_attempts,
                    candidate.id
                );
                attempts.push(AttemptRecord::AlreadyUsed(candidate.id));
            }
            Ok(candidate) => {
                tracing::info!(
                    "Attempt {}/{}: found new strip {}",
                    attempt,
                    policy.max_attempts,
                    candidate.id
                );
                attempts.push(AttemptRecord::Accepted(candidate.id.clone()));
                return FetchOutcome::Found {
                    candidate,
                    attempts,
                };
            }
            Err(e) => {
                tracing::warn!("Attempt {}/{} failed: {}", attempt, policy.max_attempts, e);
                attempts.push(AttemptRecord::Failed(e.to_string()));
            }
        }
    }

    FetchOutcome::NotFound { attempts }
}

/// Find the strip image in a page and resolve it to an absolute URL.
///
/// Takes the first element matching `selector` that carries a `src`.
/// Relative references are resolved against `page_url`.
pub fn extract_image_url(html: &str, page_url: &Url, selector: &Selector) -> Option<Url> {
    let document = Html::parse_document(html);
    document
        .select(selector)
        .filter_map(|el| el.value().attr("src"))
        .map(str::trim)
        .find(|src| !src.is_empty())
        .and_then(|src| page_url.join(src).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}

/// Live source backed by a blocking HTTP client.
///
/// Also serves as the [`Downloader`] for strip images, so both requests go
/// out with the same user agent and timeout. Image bodies are capped at
/// `source.max_body_bytes`.
pub struct HttpSource {
    client: Client,
    random_url: Url,
    selector: Selector,
    max_body_bytes: u64,
}

impl HttpSource {
    pub fn new(config: &SourceConfig) -> Result<Self, AttemptError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        let random_url = Url::parse(&config.random_url)
            .map_err(|e| AttemptError::Setup(format!("invalid random_url: {e}")))?;
        let selector = Selector::parse(&config.image_selector)
            .map_err(|e| AttemptError::Setup(format!("invalid image selector: {e:?}")))?;
        Ok(Self {
            client,
            random_url,
            selector,
            max_body_bytes: config.max_body_bytes,
        })
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, AttemptError> {
        let response = self.client.get(url).send()?;
        if !response.status().is_success() {
            return Err(AttemptError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

impl ComicSource for HttpSource {
    fn attempt(&self) -> Result<Candidate, AttemptError> {
        let response = self.get(self.random_url.as_str())?;
        // Random endpoints redirect to the strip's own page; resolve against that.
        let page_url = response.url().clone();
        let body = response.text()?;

        let image_url = extract_image_url(&body, &page_url, &self.selector).ok_or_else(|| {
            AttemptError::NoImage {
                url: page_url.to_string(),
            }
        })?;
        Ok(Candidate::from_image_url(image_url, page_url))
    }
}

impl Downloader for HttpSource {
    fn download(&self, url: &str) -> Result<Vec<u8>, AttemptError> {
        let response = self.get(url)?;
        let max = self.max_body_bytes;
        if let Some(size) = response.content_length()
            && size > max
        {
            return Err(AttemptError::TooLarge {
                size,
                max,
                url: url.to_string(),
            });
        }

        // Content-Length can be absent or wrong; never read past the limit.
        let mut bytes = Vec::new();
        response
            .take(max.saturating_add(1))
            .read_to_end(&mut bytes)
            .map_err(|source| AttemptError::Read {
                url: url.to_string(),
                source,
            })?;
        if bytes.len() as u64 > max {
            return Err(AttemptError::TooLarge {
                size: bytes.len() as u64,
                max,
                url: url.to_string(),
            });
        }
        Ok(bytes)
    }
}
