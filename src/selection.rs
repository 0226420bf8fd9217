//! The file selection state machine.
//!
//! A [`Selection`] accumulates image files from any number of
//! [`add_files`](Selection::add_files) calls (a picker, a drop, a CLI glob)
//! and keeps one [`PreviewEntry`] per file, index-aligned. There is no
//! single-file removal; [`clear`](Selection::clear) is the only way back to
//! [`SelectionState::Empty`], and it releases every preview URL it owned.

use crate::error::ImgConvError;
use crate::preview::{is_heif_content, is_previewable, PreviewEntry, PreviewStore};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// MIME type used when neither content nor name identify the file.
pub const UNKNOWN_MIME: &str = "application/octet-stream";

/// A user-chosen file: name, declared MIME type and content.
///
/// Identity for de-duplication is the `(name, size)` pair.
#[derive(Clone, PartialEq, Eq)]
pub struct SelectedFile {
    name: String,
    mime: String,
    bytes: Vec<u8>,
}

impl fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedFile")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("size", &self.bytes.len())
            .finish()
    }
}

impl SelectedFile {
    /// A file whose MIME type the caller already knows (as a browser would
    /// report it).
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// Read a file from disk, deriving its MIME type with [`sniff_mime`].
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ImgConvError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ImgConvError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => ImgConvError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => ImgConvError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime = sniff_mime(&name, &bytes);
        debug!("Loaded {} ({} bytes, {})", name, bytes.len(), mime);

        Ok(Self { name, mime, bytes })
    }

    /// File name as picked, without directories.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared or sniffed MIME type.
    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// File content.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Whether the declared MIME type is `image/*`.
    pub fn is_image(&self) -> bool {
        self.mime
            .get(..6)
            .map(|p| p.eq_ignore_ascii_case("image/"))
            .unwrap_or(false)
    }

    fn same_identity(&self, other: &SelectedFile) -> bool {
        self.name == other.name && self.size() == other.size()
    }
}

/// Determine a MIME type from content, then from the file name.
///
/// Content wins so a mislabelled file is still recognised; the name is only
/// consulted for formats the sniffer does not know.
pub fn sniff_mime(name: &str, bytes: &[u8]) -> String {
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type().to_string();
    }
    if is_heif_content(bytes) {
        return "image/heic".to_string();
    }
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    if ext.eq_ignore_ascii_case("heic") || ext.eq_ignore_ascii_case("heif") {
        return "image/heic".to_string();
    }
    image::ImageFormat::from_extension(ext)
        .map(|f| f.to_mime_type().to_string())
        .unwrap_or_else(|| UNKNOWN_MIME.to_string())
}

/// Coarse state of a [`Selection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    Empty,
    HasFiles,
}

/// What an [`add_files`](Selection::add_files) call did with its input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddOutcome {
    pub added: usize,
    pub skipped_non_image: usize,
    pub skipped_duplicates: usize,
}

/// Selected files plus their index-aligned previews.
#[derive(Debug)]
pub struct Selection {
    store: PreviewStore,
    files: Vec<SelectedFile>,
    previews: Vec<PreviewEntry>,
}

impl Selection {
    /// An empty selection whose previews are created in `store`.
    pub fn new(store: PreviewStore) -> Self {
        Self {
            store,
            files: Vec::new(),
            previews: Vec::new(),
        }
    }

    /// [`SelectionState::Empty`] until the first file is accepted.
    pub fn state(&self) -> SelectionState {
        if self.files.is_empty() {
            SelectionState::Empty
        } else {
            SelectionState::HasFiles
        }
    }

    /// Accepted files, in the order they were added.
    pub fn files(&self) -> &[SelectedFile] {
        &self.files
    }

    /// One preview per file, index-aligned with [`files`](Self::files).
    pub fn previews(&self) -> &[PreviewEntry] {
        &self.previews
    }

    /// `(file, preview)` pairs in selection order.
    pub fn entries(&self) -> impl Iterator<Item = (&SelectedFile, &PreviewEntry)> {
        self.files.iter().zip(self.previews.iter())
    }

    /// Number of selected files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Append the image files in `incoming` that are not already selected.
    ///
    /// Non-image files are dropped, as are files whose `(name, size)` matches
    /// one already selected or one earlier in the same batch. Each accepted
    /// file gets a preview URL, or the unsupported sentinel.
    ///
    /// If a preview cannot be created the selection is left as it was before
    /// the call; previews created for this batch are released.
    pub fn add_files(
        &mut self,
        incoming: impl IntoIterator<Item = SelectedFile>,
    ) -> Result<AddOutcome, ImgConvError> {
        let mut outcome = AddOutcome::default();
        let mut new_files: Vec<SelectedFile> = Vec::new();

        for file in incoming {
            if !file.is_image() {
                debug!("Skipping non-image file {} ({})", file.name(), file.mime());
                outcome.skipped_non_image += 1;
                continue;
            }
            let duplicate = self
                .files
                .iter()
                .chain(new_files.iter())
                .any(|f| f.same_identity(&file));
            if duplicate {
                debug!("Skipping duplicate {} ({} bytes)", file.name(), file.size());
                outcome.skipped_duplicates += 1;
                continue;
            }
            new_files.push(file);
        }

        let new_previews = new_files
            .iter()
            .map(|f| self.preview_for(f))
            .collect::<Result<Vec<_>, _>>()?;

        outcome.added = new_files.len();
        self.files.extend(new_files);
        self.previews.extend(new_previews);
        debug_assert_eq!(self.files.len(), self.previews.len());

        info!(
            "Selection: +{} files ({} total, {} non-image skipped, {} duplicates skipped)",
            outcome.added,
            self.files.len(),
            outcome.skipped_non_image,
            outcome.skipped_duplicates
        );
        Ok(outcome)
    }

    /// Reset to [`SelectionState::Empty`], releasing every preview.
    pub fn clear(&mut self) {
        let released = self.previews.len();
        self.previews.clear();
        self.files.clear();
        debug!("Selection cleared ({} previews released)", released);
    }

    fn preview_for(&self, file: &SelectedFile) -> Result<PreviewEntry, ImgConvError> {
        if !is_previewable(file.name(), file.bytes()) {
            return Ok(PreviewEntry::Unsupported);
        }
        let ext = Path::new(file.name())
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Ok(PreviewEntry::Url(self.store.create(file.bytes(), ext)?))
    }
}
