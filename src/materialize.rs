//! Download a candidate strip and store it under its identifier.
//!
//! Images land at `<output>/<images.dir>/<id>.<ext>`, where `<ext>` comes
//! from the payload's signature bytes, never from the URL. The upstream CDN
//! serves extension-less URLs and redirects that mislabel their content,
//! so sniffing is the only reliable source.
//!
//! Materializing is idempotent: if a file for the identifier already exists
//! under any known extension, it is returned as-is and nothing is
//! downloaded.
//!
//! | Failure | Error | Fatal |
//! |---|---|---|
//! | request / status error | [`MaterializeError::Download`] | no |
//! | payload below `images.min_bytes` | [`MaterializeError::TooSmall`] | no |
//! | unrecognised signature | [`MaterializeError::UnknownFormat`] | no |
//! | local write failure | [`MaterializeError::Io`] | yes |

use crate::config::SiteConfig;
use crate::fetch::{AttemptError, Candidate};
use crate::store::write_atomic;
use crate::types::ComicId;
use image::{ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fetches raw bytes for a URL.
pub trait Downloader {
    fn download(&self, url: &str) -> Result<Vec<u8>, AttemptError>;
}

#[derive(Error, Debug)]
pub enum MaterializeError {
    #[error("download failed: {0}")]
    Download(#[from] AttemptError),
    #[error("payload is {size} bytes, below the {min}-byte minimum")]
    TooSmall { size: u64, min: u64 },
    #[error("payload is not a recognised image format")]
    UnknownFormat,
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MaterializeError {
    /// Local I/O failures abort the run; everything else means "no comic".
    pub fn is_fatal(&self) -> bool {
        matches!(self, MaterializeError::Io { .. })
    }
}

/// Image formats the feed publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageKind {
    pub const ALL: [ImageKind; 4] = [
        ImageKind::Jpeg,
        ImageKind::Png,
        ImageKind::Gif,
        ImageKind::Webp,
    ];

    /// Detect the format from leading signature bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match image::guess_format(bytes).ok()? {
            ImageFormat::Jpeg => Some(ImageKind::Jpeg),
            ImageFormat::Png => Some(ImageKind::Png),
            ImageFormat::Gif => Some(ImageKind::Gif),
            ImageFormat::WebP => Some(ImageKind::Webp),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::Gif => "gif",
            ImageKind::Webp => "webp",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Gif => "image/gif",
            ImageKind::Webp => "image/webp",
        }
    }
}

/// A strip stored on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub id: ComicId,
    /// Filename relative to the images directory.
    pub filename: String,
    pub path: PathBuf,
    pub kind: ImageKind,
    pub byte_size: u64,
    /// Pixel dimensions, if the header could be decoded.
    pub dimensions: Option<(u32, u32)>,
    /// True when the file already existed and no download happened.
    pub reused: bool,
}

pub struct Materializer<'a, D: Downloader> {
    downloader: &'a D,
    images_dir: PathBuf,
    min_bytes: u64,
}

impl<'a, D: Downloader> Materializer<'a, D> {
    pub fn new(downloader: &'a D, config: &SiteConfig) -> Self {
        Self {
            downloader,
            images_dir: config.images_dir(),
            min_bytes: config.images.min_bytes,
        }
    }

    pub fn materialize(&self, candidate: &Candidate) -> Result<StoredImage, MaterializeError> {
        if let Some(existing) = self.find_existing(&candidate.id)? {
            tracing::debug!("Image {} already stored, skipping download", existing.filename);
            return Ok(existing);
        }

        let bytes = self.downloader.download(candidate.image_url.as_str())?;
        let size = bytes.len() as u64;
        if size < self.min_bytes {
            return Err(MaterializeError::TooSmall {
                size,
                min: self.min_bytes,
            });
        }
        let kind = ImageKind::sniff(&bytes).ok_or(MaterializeError::UnknownFormat)?;

        let filename = format!("{}.{}", candidate.id, kind.extension());
        let path = self.images_dir.join(&filename);
        write_atomic(&path, &bytes).map_err(|source| MaterializeError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::info!("Downloaded {} ({} bytes)", path.display(), size);

        Ok(StoredImage {
            id: candidate.id.clone(),
            filename,
            path,
            kind,
            byte_size: size,
            dimensions: dimensions_of(&bytes),
            reused: false,
        })
    }

    /// Look for an image already stored under `id`.
    pub fn find_existing(&self, id: &ComicId) -> Result<Option<StoredImage>, MaterializeError> {
        for kind in ImageKind::ALL {
            let filename = format!("{}.{}", id, kind.extension());
            let path = self.images_dir.join(&filename);
            if !path.is_file() {
                continue;
            }
            let byte_size = std::fs::metadata(&path)
                .map_err(|source| MaterializeError::Io {
                    path: path.clone(),
                    source,
                })?
                .len();
            let dimensions = image::image_dimensions(&path).ok();
            return Ok(Some(StoredImage {
                id: id.clone(),
                filename,
                path,
                kind,
                byte_size,
                dimensions,
                reused: true,
            }));
        }
        Ok(None)
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }
}

fn dimensions_of(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}
