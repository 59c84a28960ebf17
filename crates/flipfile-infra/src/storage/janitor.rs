use super::{StorageError, StorageResult};
use bytes::Bytes;
use futures::Stream;
use futures::StreamExt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// A freshly allocated, collision-free location under the storage root.
#[derive(Debug, Clone)]
pub struct StagedPath {
    /// Opaque filename (uuid stem + extension), safe to hand to clients.
    pub filename: String,
    /// Absolute-or-root-relative path, always inside the storage root.
    pub path: PathBuf,
}

/// Manages the shared upload/output directory.
///
/// Uniqueness of allocated names is the only cross-request discipline: names
/// are uuid-v4 derived, so concurrent requests never collide and no locking
/// of the directory is needed.
#[derive(Clone)]
pub struct StorageJanitor {
    root: PathBuf,
}

impl StorageJanitor {
    /// Create a janitor over `root`, creating the directory if missing.
    pub async fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();

        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(StorageJanitor { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate a collision-free path under the root.
    ///
    /// The name is a fresh uuid; the extension is taken from `original_name`
    /// unless `override_ext` is given. Extensions are lowercased.
    pub fn allocate(&self, original_name: &str, override_ext: Option<&str>) -> StagedPath {
        let ext = override_ext
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .or_else(|| {
                Path::new(original_name)
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.to_lowercase())
            });

        let filename = match ext {
            Some(ext) if !ext.is_empty() => format!("{}.{}", Uuid::new_v4(), ext),
            _ => Uuid::new_v4().to_string(),
        };

        let path = self.root.join(&filename);
        StagedPath { filename, path }
    }

    /// Allocate a collision-free subdirectory (for staged image sets).
    pub async fn allocate_dir(&self, prefix: &str) -> StorageResult<PathBuf> {
        let dir = self.root.join(format!("{}_{}", prefix, Uuid::new_v4()));
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Durably write `data` to `path`.
    ///
    /// Writes to a `.part` sibling first and renames into place, so a failed
    /// write never leaves a truncated artifact at `path`.
    pub async fn persist(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        let part = part_path(path);
        let size = data.len();

        let result = async {
            let mut file = fs::File::create(&part).await.map_err(|e| {
                StorageError::WriteFailed(format!(
                    "Failed to create file {}: {}",
                    part.display(),
                    e
                ))
            })?;

            file.write_all(data).await.map_err(|e| {
                StorageError::WriteFailed(format!("Failed to write file {}: {}", part.display(), e))
            })?;

            file.sync_all().await.map_err(|e| {
                StorageError::WriteFailed(format!("Failed to sync file {}: {}", part.display(), e))
            })?;

            fs::rename(&part, path).await.map_err(|e| {
                StorageError::WriteFailed(format!(
                    "Failed to move {} into place: {}",
                    part.display(),
                    e
                ))
            })
        }
        .await;

        if result.is_err() {
            let _ = fs::remove_file(&part).await;
        } else {
            tracing::debug!(path = %path.display(), size_bytes = size, "Persisted upload");
        }

        result
    }

    /// Delete every entry in the root older than `max_age`.
    ///
    /// Entries that disappear mid-scan are skipped; a single bad entry never
    /// fails the whole sweep. Returns the number of entries removed.
    pub async fn sweep(&self, max_age: Duration) -> StorageResult<usize> {
        let mut removed = 0usize;
        let mut entries = fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();

            let metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "Skipping entry during sweep");
                    continue;
                }
            };

            // Not every filesystem reports a creation time; fall back to mtime.
            let age = metadata
                .created()
                .or_else(|_| metadata.modified())
                .ok()
                .and_then(|t| t.elapsed().ok());

            let expired = match age {
                Some(age) => age > max_age,
                None => continue,
            };

            if !expired {
                continue;
            }

            let result = if metadata.is_dir() {
                fs::remove_dir_all(&path).await
            } else {
                fs::remove_file(&path).await
            };

            match result {
                Ok(()) => {
                    removed += 1;
                    tracing::debug!(path = %path.display(), "Swept expired artifact");
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to sweep entry");
                }
            }
        }

        if removed > 0 {
            tracing::info!(removed, root = %self.root.display(), "Sweep completed");
        }

        Ok(removed)
    }

    /// Delete a file; absent files are not an error.
    pub async fn remove(&self, path: &Path) -> StorageResult<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// Delete a directory tree; absent trees are not an error.
    pub async fn remove_tree(&self, path: &Path) -> StorageResult<()> {
        match fs::remove_dir_all(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// Build a flat zip archive (base names only, deterministic Deflate) from
    /// the given files. Runs on the blocking pool; returns the archive bytes.
    pub async fn zip_all(&self, paths: Vec<PathBuf>) -> StorageResult<Vec<u8>> {
        tokio::task::spawn_blocking(move || {
            use zip::write::{FileOptions, ZipWriter};
            use zip::CompressionMethod;

            let mut buffer = Vec::new();
            {
                let mut archive = ZipWriter::new(std::io::Cursor::new(&mut buffer));
                let options = FileOptions::default()
                    .compression_method(CompressionMethod::Deflated)
                    .unix_permissions(0o644);

                for path in &paths {
                    let name = path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .ok_or_else(|| {
                            StorageError::Archive(format!(
                                "Unusable entry name: {}",
                                path.display()
                            ))
                        })?;

                    let data = std::fs::read(path).map_err(|e| {
                        StorageError::Archive(format!("Failed to read {}: {}", path.display(), e))
                    })?;

                    archive
                        .start_file(name, options)
                        .map_err(|e| StorageError::Archive(format!("Failed to add {}: {}", name, e)))?;
                    archive
                        .write_all(&data)
                        .map_err(|e| StorageError::Archive(format!("Failed to write {}: {}", name, e)))?;
                }

                archive
                    .finish()
                    .map_err(|e| StorageError::Archive(format!("Failed to finalize zip: {}", e)))?;
            }

            Ok(buffer)
        })
        .await
        .map_err(|e| StorageError::Archive(format!("Zip task panicked: {}", e)))?
    }

    /// Resolve a client-supplied filename to a path inside the root.
    ///
    /// Rejects parent-directory and path-separator sequences before touching
    /// the filesystem.
    pub fn resolve(&self, filename: &str) -> StorageResult<PathBuf> {
        if filename.is_empty()
            || filename.contains("..")
            || filename.contains('/')
            || filename.contains('\\')
        {
            return Err(StorageError::InvalidName(
                "Filename contains path traversal sequences".to_string(),
            ));
        }

        Ok(self.root.join(filename))
    }

    /// Stream an artifact's bytes for download.
    pub async fn download_stream(
        &self,
        filename: &str,
    ) -> StorageResult<Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>> {
        let path = self.resolve(filename)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(filename.to_string()));
        }

        let file = fs::File::open(&path).await.map_err(StorageError::Io)?;
        let reader = tokio_util::io::ReaderStream::new(file);

        let stream = reader.map(|result| {
            result.map_err(|e| StorageError::Archive(format!("Failed to read chunk: {}", e)))
        });

        Ok(Box::pin(stream))
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_allocate_unique_paths() {
        let dir = tempdir().unwrap();
        let janitor = StorageJanitor::new(dir.path()).await.unwrap();

        let mut seen = HashSet::new();
        for _ in 0..100 {
            let staged = janitor.allocate("report.pdf", None);
            assert!(staged.filename.ends_with(".pdf"));
            assert!(seen.insert(staged.path), "allocated a duplicate path");
        }
    }

    #[tokio::test]
    async fn test_allocate_override_extension() {
        let dir = tempdir().unwrap();
        let janitor = StorageJanitor::new(dir.path()).await.unwrap();

        let staged = janitor.allocate("report.pdf", Some(".docx"));
        assert!(staged.filename.ends_with(".docx"));

        let staged = janitor.allocate("UPPER.PDF", None);
        assert!(staged.filename.ends_with(".pdf"));
    }

    #[tokio::test]
    async fn test_persist_and_read_back() {
        let dir = tempdir().unwrap();
        let janitor = StorageJanitor::new(dir.path()).await.unwrap();

        let staged = janitor.allocate("a.pdf", None);
        janitor.persist(&staged.path, b"content").await.unwrap();

        assert_eq!(fs::read(&staged.path).await.unwrap(), b"content");
        // No .part residue after a successful persist.
        assert!(!fs::try_exists(&part_path(&staged.path)).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_idempotent() {
        let dir = tempdir().unwrap();
        let janitor = StorageJanitor::new(dir.path()).await.unwrap();

        let staged = janitor.allocate("a.pdf", None);
        janitor.persist(&staged.path, b"x").await.unwrap();

        janitor.remove(&staged.path).await.unwrap();
        janitor.remove(&staged.path).await.unwrap();

        let missing = dir.path().join("never-existed.pdf");
        janitor.remove(&missing).await.unwrap();
        janitor.remove_tree(&dir.path().join("no-dir")).await.unwrap();
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let dir = tempdir().unwrap();
        let janitor = StorageJanitor::new(dir.path()).await.unwrap();

        let staged = janitor.allocate("old.pdf", None);
        janitor.persist(&staged.path, b"x").await.unwrap();
        let subdir = janitor.allocate_dir("images").await.unwrap();

        // Nothing is older than an hour yet.
        let removed = janitor.sweep(Duration::from_secs(3600)).await.unwrap();
        assert_eq!(removed, 0);
        assert!(fs::try_exists(&staged.path).await.unwrap());

        // With a zero threshold everything has expired.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let removed = janitor.sweep(Duration::ZERO).await.unwrap();
        assert_eq!(removed, 2);
        assert!(!fs::try_exists(&staged.path).await.unwrap());
        assert!(!fs::try_exists(&subdir).await.unwrap());
    }

    #[tokio::test]
    async fn test_resolve_rejects_traversal() {
        let dir = tempdir().unwrap();
        let janitor = StorageJanitor::new(dir.path()).await.unwrap();

        assert!(matches!(
            janitor.resolve("../../etc/passwd"),
            Err(StorageError::InvalidName(_))
        ));
        assert!(matches!(
            janitor.resolve("a/b.pdf"),
            Err(StorageError::InvalidName(_))
        ));
        assert!(matches!(
            janitor.resolve("a\\b.pdf"),
            Err(StorageError::InvalidName(_))
        ));
        assert!(janitor.resolve("plain.pdf").is_ok());
    }

    #[tokio::test]
    async fn test_zip_all_flattens_names() {
        let dir = tempdir().unwrap();
        let janitor = StorageJanitor::new(dir.path()).await.unwrap();

        let pages = janitor.allocate_dir("pages").await.unwrap();
        let one = pages.join("page_001.png");
        let two = pages.join("page_002.png");
        fs::write(&one, b"first").await.unwrap();
        fs::write(&two, b"second").await.unwrap();

        let buffer = janitor.zip_all(vec![one, two]).await.unwrap();

        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(buffer)).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["page_001.png", "page_002.png"]);
    }

    #[tokio::test]
    async fn test_download_stream_missing_file() {
        let dir = tempdir().unwrap();
        let janitor = StorageJanitor::new(dir.path()).await.unwrap();

        let result = janitor.download_stream("missing.pdf").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_download_stream_reads_content() {
        let dir = tempdir().unwrap();
        let janitor = StorageJanitor::new(dir.path()).await.unwrap();

        let staged = janitor.allocate("doc.pdf", None);
        janitor.persist(&staged.path, b"stream me").await.unwrap();

        let mut stream = janitor.download_stream(&staged.filename).await.unwrap();
        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(collected, b"stream me");
    }
}
