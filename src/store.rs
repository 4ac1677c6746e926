//! Used-comic store: the set of strips already published.
//!
//! The store is what keeps the feed from repeating itself. Each run loads
//! the set, the fetcher rejects any candidate whose identifier is already
//! in it, and a successful run adds exactly one identifier before saving.
//!
//! # Format
//!
//! A JSON array of strings, sorted for readable diffs:
//!
//! ```json
//! [
//!   "3f2a9c0e1b4d5a6f",
//!   "8be1d0f3a2c47719"
//! ]
//! ```
//!
//! Semantically it is a set; order carries no meaning.
//!
//! # Legacy entries
//!
//! Older versions keyed the store by calendar date (`"2025-06-01"`). Those
//! keys say nothing about which strip was published, so loading drops them
//! (and anything else [`ComicId::parse`] refuses) instead of failing. The
//! count of dropped entries is kept so the run summary can report it.
//!
//! # Writes
//!
//! [`write_atomic`] writes to a sibling temp file and renames it over the
//! target. A run killed mid-write leaves the previous file intact.

use crate::types::ComicId;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path} is not a JSON array: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize used comics for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Set of identifiers of comics already published.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsedComics {
    ids: BTreeSet<ComicId>,
    /// Entries discarded at load time (legacy or malformed).
    discarded: usize,
}

impl UsedComics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from disk. A missing file is an empty set.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let raw: Vec<serde_json::Value> =
            serde_json::from_str(&content).map_err(|source| StoreError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let mut used = Self::new();
        for value in raw {
            match value.as_str().and_then(ComicId::parse) {
                Some(id) => {
                    used.ids.insert(id);
                }
                None => {
                    tracing::debug!("Dropping legacy used-comic entry {}", value);
                    used.discarded += 1;
                }
            }
        }
        Ok(used)
    }

    /// Save as a sorted JSON array, replacing the file atomically.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let list: Vec<&str> = self.ids.iter().map(ComicId::as_str).collect();
        let json = serde_json::to_string_pretty(&list).map_err(|source| StoreError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;
        write_atomic(path, json.as_bytes()).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn contains(&self, id: &ComicId) -> bool {
        self.ids.contains(id)
    }

    /// Mark an identifier as used. Returns `false` if it already was.
    pub fn insert(&mut self, id: ComicId) -> bool {
        self.ids.insert(id)
    }

    /// Add every identifier in `ids`, returning how many were new.
    ///
    /// Used to fold the feed's identifiers back in: anything in the feed has
    /// been published, whether or not the used file still says so.
    pub fn absorb<'a>(&mut self, ids: impl IntoIterator<Item = &'a ComicId>) -> usize {
        ids.into_iter()
            .filter(|id| self.ids.insert((*id).clone()))
            .count()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComicId> {
        self.ids.iter()
    }

    /// Number of entries dropped while loading.
    pub fn discarded(&self) -> usize {
        self.discarded
    }
}

impl FromIterator<ComicId> for UsedComics {
    fn from_iter<I: IntoIterator<Item = ComicId>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
            discarded: 0,
        }
    }
}

/// Write `bytes` to `path` via a `.part` file in the same directory + rename.
///
/// Parent directories are created as needed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".part");
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path)
}
