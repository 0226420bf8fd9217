//! Converted results and everything a presenter needs to offer them.
//!
//! A [`ResultSet`] is the single active set of converted images. It owns one
//! [`PreviewUrl`] per result, so dropping or replacing the set releases every
//! URL. Download names follow `converted_image_<n>.<ext>` with `n` starting
//! at 1; the bundled archive puts the same names under a
//! `converted_images/` folder.

use crate::error::ImgConvError;
use crate::params::extension_for;
use crate::preview::PreviewUrl;
use std::io::{Cursor, Seek, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Prefix of every per-file download name.
pub const DOWNLOAD_PREFIX: &str = "converted_image_";

/// Folder inside the bundled archive.
pub const ARCHIVE_FOLDER: &str = "converted_images";

/// File name used when saving the bundled archive into a directory.
pub const ARCHIVE_FILE_NAME: &str = "converted_images.zip";

/// One converted image.
#[derive(Debug)]
pub struct ConvertedResult {
    preview: PreviewUrl,
    format: String,
}

impl ConvertedResult {
    pub fn new(preview: PreviewUrl, format: impl Into<String>) -> Self {
        Self {
            preview,
            format: format.into(),
        }
    }

    /// Local URL of the converted image.
    pub fn url(&self) -> &str {
        self.preview.url()
    }

    /// Output format string as declared in the request.
    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn path(&self) -> &Path {
        self.preview.path()
    }

    /// The converted image content.
    pub fn bytes(&self) -> Result<Vec<u8>, ImgConvError> {
        self.preview
            .read_bytes()
            .map_err(|e| ImgConvError::Internal(format!("reading converted image: {e}")))
    }
}

/// A per-file download action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadLink {
    /// Suggested file name, e.g. `converted_image_2.png`.
    pub file_name: String,
    pub url: String,
}

/// The active set of converted results, in input order.
#[derive(Debug, Default)]
pub struct ResultSet {
    results: Vec<ConvertedResult>,
}

impl ResultSet {
    pub fn new(results: Vec<ConvertedResult>) -> Self {
        Self { results }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConvertedResult> {
        self.results.iter()
    }

    pub fn get(&self, index: usize) -> Option<&ConvertedResult> {
        self.results.get(index)
    }

    /// Download name for the result at 0-based `index`.
    pub fn download_name(&self, index: usize) -> Option<String> {
        self.results
            .get(index)
            .map(|r| download_name(index, r.format()))
    }

    /// One download link per result.
    pub fn downloads(&self) -> Vec<DownloadLink> {
        self.results
            .iter()
            .enumerate()
            .map(|(i, r)| DownloadLink {
                file_name: download_name(i, r.format()),
                url: r.url().to_string(),
            })
            .collect()
    }

    /// Thumbnail URLs, one per result.
    pub fn thumbnails(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.url()).collect()
    }

    /// Package every result into a zip archive written to `writer`.
    ///
    /// Entries are `converted_images/converted_image_<n>.<ext>`.
    pub fn write_archive<W: Write + Seek>(&self, writer: W) -> Result<W, ImgConvError> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut zip = ZipWriter::new(writer);
        zip.add_directory(format!("{ARCHIVE_FOLDER}/"), options)?;

        for (i, result) in self.results.iter().enumerate() {
            let name = format!("{ARCHIVE_FOLDER}/{}", download_name(i, result.format()));
            zip.start_file(name, options)?;
            zip.write_all(&result.bytes()?)
                .map_err(|e| ImgConvError::ArchiveFailed(e.to_string()))?;
        }

        Ok(zip.finish()?)
    }

    /// Write the bundled archive to `path`.
    ///
    /// The archive is built in memory, then written atomically (temp file +
    /// rename), creating missing parent directories.
    pub async fn save_archive(&self, path: impl AsRef<Path>) -> Result<PathBuf, ImgConvError> {
        let path = path.as_ref().to_path_buf();
        let archive = self.write_archive(Cursor::new(Vec::new()))?.into_inner();
        create_parent(&path).await?;
        let tmp = tmp_path(&path);
        write_file(&tmp, &path, &archive).await?;
        rename_into_place(&tmp, &path).await?;
        info!("Saved {} images to {}", self.len(), path.display());
        Ok(path)
    }

    /// Save each result into `dir` under its download name.
    ///
    /// Every file is staged under a temporary name first and only renamed
    /// once all of them are written, so a failure leaves no outputs behind.
    pub async fn save_all(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, ImgConvError> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| ImgConvError::OutputWriteFailed {
                path: dir.to_path_buf(),
                source,
            })?;

        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(self.len());
        for (i, result) in self.results.iter().enumerate() {
            let path = dir.join(download_name(i, result.format()));
            let tmp = tmp_path(&path);
            let written = match tokio::fs::read(result.path()).await {
                Ok(bytes) => write_file(&tmp, &path, &bytes).await,
                Err(e) => Err(ImgConvError::Internal(format!(
                    "reading converted image: {e}"
                ))),
            };
            if let Err(e) = written {
                discard(&staged).await;
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(e);
            }
            staged.push((tmp, path));
        }

        let mut written = Vec::with_capacity(staged.len());
        for (tmp, path) in &staged {
            rename_into_place(tmp, path).await?;
            written.push(path.clone());
        }
        info!("Saved {} images to {}", written.len(), dir.display());
        Ok(written)
    }
}

/// `<name>.tmp` next to `path`.
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

async fn create_parent(path: &Path) -> Result<(), ImgConvError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| ImgConvError::OutputWriteFailed {
                path: path.to_path_buf(),
                source,
            }),
        _ => Ok(()),
    }
}

async fn write_file(tmp: &Path, path: &Path, bytes: &[u8]) -> Result<(), ImgConvError> {
    tokio::fs::write(tmp, bytes)
        .await
        .map_err(|source| ImgConvError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        })
}

async fn rename_into_place(tmp: &Path, path: &Path) -> Result<(), ImgConvError> {
    tokio::fs::rename(tmp, path)
        .await
        .map_err(|source| ImgConvError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        })
}

async fn discard(staged: &[(PathBuf, PathBuf)]) {
    for (tmp, _) in staged {
        let _ = tokio::fs::remove_file(tmp).await;
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a ConvertedResult;
    type IntoIter = std::slice::Iter<'a, ConvertedResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

fn download_name(index: usize, format: &str) -> String {
    format!("{DOWNLOAD_PREFIX}{}.{}", index + 1, extension_for(format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::PreviewStore;
    use std::io::{Cursor, Read};
    use zip::ZipArchive;

    fn set(store: &PreviewStore, items: &[(&[u8], &str)]) -> ResultSet {
        ResultSet::new(
            items
                .iter()
                .map(|(bytes, fmt)| ConvertedResult::new(store.create(bytes, fmt).unwrap(), *fmt))
                .collect(),
        )
    }

    #[test]
    fn download_names_are_one_based() {
        let store = PreviewStore::new().unwrap();
        let rs = set(&store, &[(b"a", "png"), (b"b", "webp"), (b"c", "")]);
        let names: Vec<_> = rs.downloads().into_iter().map(|d| d.file_name).collect();
        assert_eq!(
            names,
            [
                "converted_image_1.png",
                "converted_image_2.webp",
                "converted_image_3.jpg"
            ]
        );
        assert_eq!(rs.download_name(3), None);
    }

    #[test]
    fn thumbnails_match_urls() {
        let store = PreviewStore::new().unwrap();
        let rs = set(&store, &[(b"a", "png")]);
        assert_eq!(rs.thumbnails(), vec![rs.get(0).unwrap().url()]);
    }

    #[test]
    fn archive_contains_sequential_entries() {
        let store = PreviewStore::new().unwrap();
        let rs = set(&store, &[(b"first", "png"), (b"second", "png")]);
        let cursor = rs.write_archive(Cursor::new(Vec::new())).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap();
        let mut content = String::new();
        archive
            .by_name("converted_images/converted_image_2.png")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "second");
        assert!(archive
            .file_names()
            .any(|n| n == "converted_images/converted_image_1.png"));
    }

    #[tokio::test]
    async fn save_all_and_archive_to_disk() {
        let store = PreviewStore::new().unwrap();
        let out = tempfile::tempdir().unwrap();
        let rs = set(&store, &[(b"x", "jpeg")]);

        let written = rs.save_all(out.path()).await.unwrap();
        assert_eq!(written, vec![out.path().join("converted_image_1.jpeg")]);
        assert_eq!(std::fs::read(&written[0]).unwrap(), b"x");

        let zip_path = rs
            .save_archive(out.path().join(ARCHIVE_FILE_NAME))
            .await
            .unwrap();
        assert!(zip_path.metadata().unwrap().len() > 0);
    }

    #[tokio::test]
    async fn saving_creates_missing_directories() {
        let store = PreviewStore::new().unwrap();
        let out = tempfile::tempdir().unwrap();
        let rs = set(&store, &[(b"a", "png"), (b"b", "png")]);

        let nested = out.path().join("not").join("yet");
        let written = rs.save_all(&nested).await.unwrap();
        assert_eq!(written.len(), 2);
        assert!(written.iter().all(|p| p.exists()));

        let zip_path = rs
            .save_archive(out.path().join("fresh").join(ARCHIVE_FILE_NAME))
            .await
            .unwrap();
        let archive = ZipArchive::new(std::fs::File::open(&zip_path).unwrap()).unwrap();
        assert_eq!(archive.len(), 3);
    }

    #[tokio::test]
    async fn saving_leaves_no_temp_files() {
        let store = PreviewStore::new().unwrap();
        let out = tempfile::tempdir().unwrap();
        let rs = set(&store, &[(b"a", "webp")]);
        rs.save_all(out.path()).await.unwrap();
        rs.save_archive(out.path().join(ARCHIVE_FILE_NAME)).await.unwrap();

        let mut names: Vec<String> = std::fs::read_dir(out.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, [ARCHIVE_FILE_NAME, "converted_image_1.webp"]);
    }

    #[tokio::test]
    async fn failed_save_all_writes_nothing() {
        let store = PreviewStore::new().unwrap();
        let out = tempfile::tempdir().unwrap();
        let rs = set(&store, &[(b"a", "png"), (b"b", "png")]);
        // The second result's content is gone, so staging fails midway.
        std::fs::remove_file(rs.get(1).unwrap().path()).unwrap();

        assert!(rs.save_all(out.path()).await.is_err());
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn dropping_the_set_releases_urls() {
        let store = PreviewStore::new().unwrap();
        let rs = set(&store, &[(b"a", "png"), (b"b", "png")]);
        assert_eq!(store.live_count(), 2);
        drop(rs);
        assert_eq!(store.live_count(), 0);
    }
}
