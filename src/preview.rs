//! Ephemeral preview URLs for selected and converted images.
//!
//! Every preview is a file inside a per-session directory owned by a
//! [`PreviewStore`], exposed as a `file://` URL through a [`PreviewUrl`]
//! handle. The handle *is* the resource: dropping it (or calling
//! [`PreviewUrl::revoke`]) deletes the file, and because `revoke` consumes
//! the handle a URL can never be released twice. Whoever owns the handle
//! owns the lifetime, so replacing a `Vec<PreviewUrl>` releases the old set.
//!
//! ## Unsupported previews
//!
//! Some image containers cannot be rendered inline by typical viewers.
//! Files in those formats get [`PreviewEntry::Unsupported`] instead of a URL.
//! The decision looks at content first (an ISO-BMFF `ftyp` box carrying a
//! HEIF brand) and falls back to the file name (`.heic` / `.heif`), so a
//! renamed HEIC file is still caught and a HEIC file without bytes loaded yet
//! is caught by name.

use crate::error::ImgConvError;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::{NamedTempFile, TempDir};
use tracing::debug;

/// File-name extensions whose content gets the unsupported-preview sentinel.
pub const UNSUPPORTED_PREVIEW_EXTENSIONS: [&str; 2] = ["heic", "heif"];

/// ISO-BMFF brands specific to HEVC-coded HEIF images and sequences.
const HEIF_BRANDS: [&[u8; 4]; 6] = [b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis"];

/// AV1-coded brands. These share the generic `mif1` / `msf1` structure
/// with HEIF but render fine.
const AVIF_BRANDS: [&[u8; 4]; 2] = [b"avif", b"avis"];

struct StoreInner {
    dir: TempDir,
    live: AtomicUsize,
}

/// Owner of the session's preview directory.
///
/// Cheap to clone; clones share the directory. The directory itself is
/// removed once the store and every [`PreviewUrl`] it handed out are gone.
#[derive(Clone)]
pub struct PreviewStore {
    inner: Arc<StoreInner>,
}

impl fmt::Debug for PreviewStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewStore")
            .field("dir", &self.inner.dir.path())
            .field("live", &self.live_count())
            .finish()
    }
}

impl PreviewStore {
    /// Create a store in the system temp dir.
    pub fn new() -> Result<Self, ImgConvError> {
        let dir = tempfile::Builder::new()
            .prefix("imgconv-previews-")
            .tempdir()
            .map_err(|source| ImgConvError::PreviewFailed { source })?;
        Ok(Self::from_dir(dir))
    }

    /// Create a store below `parent`.
    pub fn new_in(parent: impl AsRef<Path>) -> Result<Self, ImgConvError> {
        let dir = tempfile::Builder::new()
            .prefix("imgconv-previews-")
            .tempdir_in(parent)
            .map_err(|source| ImgConvError::PreviewFailed { source })?;
        Ok(Self::from_dir(dir))
    }

    fn from_dir(dir: TempDir) -> Self {
        debug!("Preview directory: {}", dir.path().display());
        Self {
            inner: Arc::new(StoreInner {
                dir,
                live: AtomicUsize::new(0),
            }),
        }
    }

    /// Directory holding the preview files.
    pub fn dir(&self) -> &Path {
        self.inner.dir.path()
    }

    /// Number of URLs created by this store that are not yet revoked.
    pub fn live_count(&self) -> usize {
        self.inner.live.load(Ordering::SeqCst)
    }

    /// Write `bytes` to a fresh preview file and return its URL handle.
    ///
    /// `extension` only decorates the file name so external viewers pick
    /// the right decoder; an empty extension is allowed.
    pub fn create(&self, bytes: &[u8], extension: &str) -> Result<PreviewUrl, ImgConvError> {
        let suffix = if extension.is_empty() {
            String::new()
        } else {
            format!(".{}", extension.trim_start_matches('.'))
        };
        let mut file = tempfile::Builder::new()
            .prefix("preview-")
            .suffix(&suffix)
            .tempfile_in(self.inner.dir.path())
            .map_err(|source| ImgConvError::PreviewFailed { source })?;
        file.write_all(bytes)
            .and_then(|_| file.flush())
            .map_err(|source| ImgConvError::PreviewFailed { source })?;

        self.inner.live.fetch_add(1, Ordering::SeqCst);
        let url = format!("file://{}", file.path().display());
        debug!("Created preview URL {} ({} bytes)", url, bytes.len());

        Ok(PreviewUrl {
            file,
            url,
            store: Arc::clone(&self.inner),
        })
    }
}

/// An ephemeral local URL referencing a blob of image bytes.
///
/// Revoked exactly once: when dropped, or when [`revoke`](Self::revoke)
/// consumes it.
pub struct PreviewUrl {
    file: NamedTempFile,
    url: String,
    store: Arc<StoreInner>,
}

impl fmt::Debug for PreviewUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PreviewUrl").field(&self.url).finish()
    }
}

impl PreviewUrl {
    /// The `file://` URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Filesystem path behind the URL.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Read back the referenced content.
    pub fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.file.path())
    }

    /// Release the URL now instead of waiting for the handle to drop.
    pub fn revoke(self) {
        drop(self);
    }
}

impl Drop for PreviewUrl {
    fn drop(&mut self) {
        self.store.live.fetch_sub(1, Ordering::SeqCst);
        debug!("Revoked preview URL {}", self.url);
        // NamedTempFile removes the file when it drops right after this.
    }
}

/// Preview slot for one selected file.
#[derive(Debug)]
pub enum PreviewEntry {
    /// A renderable preview.
    Url(PreviewUrl),
    /// Sentinel: the format cannot be previewed inline.
    Unsupported,
}

impl PreviewEntry {
    /// The URL, or `None` for the sentinel.
    pub fn url(&self) -> Option<&str> {
        match self {
            PreviewEntry::Url(u) => Some(u.url()),
            PreviewEntry::Unsupported => None,
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, PreviewEntry::Unsupported)
    }
}

/// Whether a file can get a renderable preview.
pub fn is_previewable(name: &str, bytes: &[u8]) -> bool {
    !(is_heif_content(bytes) || has_unsupported_extension(name))
}

/// `true` if `bytes` start with an ISO-BMFF `ftyp` box identifying an
/// HEVC-coded HEIF image.
///
/// The major brand and the compatible-brand list are both consulted, since
/// files often carry only the generic `mif1` / `msf1` as major brand. Any AV1
/// brand wins over HEIF brands.
pub fn is_heif_content(bytes: &[u8]) -> bool {
    if bytes.len() < 12 || &bytes[4..8] != b"ftyp" {
        return false;
    }
    let box_len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let end = box_len.clamp(12, bytes.len());

    // Major brand at 8..12, minor version at 12..16, compatible brands after.
    let mut brands = vec![&bytes[8..12]];
    if end > 16 {
        brands.extend(bytes[16..end].chunks_exact(4));
    }

    if brands.iter().any(|b| AVIF_BRANDS.iter().any(|a| &a[..] == *b)) {
        return false;
    }
    brands.iter().any(|b| HEIF_BRANDS.iter().any(|h| &h[..] == *b))
}

fn has_unsupported_extension(name: &str) -> bool {
    PathBuf::from(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            UNSUPPORTED_PREVIEW_EXTENSIONS
                .iter()
                .any(|u| e.eq_ignore_ascii_case(u))
        })
        .unwrap_or(false)
}
