//! Local filesystem implementation.

use std::io::{Error, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::{DirectoryReader, FileSystem, LocalSearchParams};
use crate::{Entry, Metadata, MetadataProperty, Result, RootType, ScanConfig, ScanError, VolumeInfo};

/// A backing store over one local directory tree using `tokio::fs`.
///
/// Entry paths are resolved relative to `root`, and every entry carries the
/// store's volume.
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: PathBuf,
    root_url: String,
    volume: VolumeInfo,
    batch_size: usize,
    timeout: Duration,
}

impl LocalFileSystem {
    /// Create a store rooted at `root`, exposed as a `Downloads` volume.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let config = ScanConfig::default();
        Self {
            root: root.into(),
            root_url: "filesystem:downloads".to_owned(),
            volume: VolumeInfo {
                volume_id: "downloads".to_owned(),
                root_type: RootType::Downloads,
                read_only: false,
            },
            batch_size: config.read_batch_size,
            timeout: config.operation_timeout,
        }
    }

    /// Override the volume description and URL prefix of the store.
    #[must_use]
    pub fn with_volume(mut self, root_url: impl Into<String>, volume: VolumeInfo) -> Self {
        self.root_url = root_url.into();
        self.volume = volume;
        self
    }

    /// Apply batch size and timeout from `config`.
    #[must_use]
    pub fn with_config(mut self, config: &ScanConfig) -> Self {
        self.batch_size = config.read_batch_size.max(1);
        self.timeout = config.operation_timeout;
        self
    }

    /// The entry for the root of the store.
    #[must_use]
    pub fn root_entry(&self) -> Entry {
        Entry::directory(&self.root_url, "/").with_volume(&self.volume.volume_id, self.volume.root_type)
    }

    fn resolve(&self, entry: &Entry) -> PathBuf {
        self.root.join(entry.full_path().trim_start_matches('/'))
    }

    async fn metadata_of(&self, path: &Path) -> std::io::Result<std::fs::Metadata> {
        tokio::time::timeout(self.timeout, tokio::fs::metadata(path))
            .await
            .map_err(|_| Error::new(ErrorKind::TimedOut, format!("Timeout reading metadata: {}", path.display())))?
    }

    async fn walk(&self, params: &LocalSearchParams) -> Result<Vec<Entry>> {
        let query = params.query.to_lowercase();
        let mut pending = vec![params.root.clone()];
        let mut found = Vec::new();

        while let Some(dir) = pending.pop() {
            let mut reader = self.create_reader(&dir)?;
            loop {
                let batch = reader.read_entries().await?;
                if batch.is_empty() {
                    break;
                }
                for entry in batch {
                    if entry.is_dir() && !entry.is_symlink() {
                        pending.push(entry.clone());
                    }
                    if !entry.name().to_lowercase().contains(&query)
                        || !params.category.matches(entry.name(), entry.is_dir())
                    {
                        continue;
                    }
                    if let Some(cutoff) = params.modified_after {
                        let modified = self
                            .metadata_of(&self.resolve(&entry))
                            .await
                            .ok()
                            .and_then(|meta| meta.modified().ok())
                            .map(DateTime::<Utc>::from);
                        if modified.map_or(true, |modified| modified < cutoff) {
                            continue;
                        }
                    }
                    found.push(entry);
                    if found.len() >= params.max_results {
                        return Ok(found);
                    }
                }
            }
        }

        Ok(found)
    }
}

/// Reads one local directory in fixed-size batches.
#[derive(Debug)]
pub struct LocalDirectoryReader {
    path: PathBuf,
    parent: Entry,
    read_dir: Option<tokio::fs::ReadDir>,
    finished: bool,
    batch_size: usize,
    timeout: Duration,
}

impl DirectoryReader for LocalDirectoryReader {
    async fn read_entries(&mut self) -> Result<Vec<Entry>> {
        if self.finished {
            return Ok(Vec::new());
        }

        if self.read_dir.is_none() {
            let opened = tokio::time::timeout(self.timeout, tokio::fs::read_dir(&self.path))
                .await
                .map_err(|_| {
                    Error::new(
                        ErrorKind::TimedOut,
                        format!("Timeout reading directory: {}", self.path.display()),
                    )
                })??;
            self.read_dir = Some(opened);
        }
        let Some(read_dir) = self.read_dir.as_mut() else {
            return Ok(Vec::new());
        };

        let mut batch = Vec::new();
        while batch.len() < self.batch_size {
            let next = tokio::time::timeout(self.timeout, read_dir.next_entry())
                .await
                .map_err(|_| {
                    Error::new(
                        ErrorKind::TimedOut,
                        format!("Timeout reading directory: {}", self.path.display()),
                    )
                })??;
            let Some(dir_entry) = next else {
                self.finished = true;
                break;
            };

            let name = dir_entry.file_name().to_string_lossy().to_string();
            let file_type = match dir_entry.file_type().await {
                Ok(file_type) => file_type,
                Err(e) => {
                    tracing::debug!("Can't read file type for {}: {}", dir_entry.path().display(), e);
                    continue;
                }
            };

            // Symlinks are listed as whatever they point to.
            let is_symlink = file_type.is_symlink();
            let is_dir = if is_symlink {
                match tokio::fs::metadata(dir_entry.path()).await {
                    Ok(meta) => meta.is_dir(),
                    Err(e) => {
                        tracing::debug!("Broken or inaccessible symlink {}: {}", dir_entry.path().display(), e);
                        continue;
                    }
                }
            } else {
                file_type.is_dir()
            };

            let entry = self.parent.child(&name, is_dir);
            batch.push(if is_symlink { entry.as_symlink() } else { entry });
        }

        Ok(batch)
    }
}

impl FileSystem for LocalFileSystem {
    type Reader = LocalDirectoryReader;

    fn create_reader(&self, dir: &Entry) -> Result<Self::Reader> {
        if !dir.is_dir() {
            return Err(ScanError::InvalidModification);
        }
        Ok(LocalDirectoryReader {
            path: self.resolve(dir),
            parent: dir.clone(),
            read_dir: None,
            finished: false,
            batch_size: self.batch_size,
            timeout: self.timeout,
        })
    }

    async fn get_metadata(
        &self,
        entries: &[Entry],
        properties: &[MetadataProperty],
    ) -> Result<Vec<Metadata>> {
        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            let mut record = Metadata::default();
            match self.metadata_of(&self.resolve(entry)).await {
                Ok(meta) => {
                    for property in properties {
                        match property {
                            MetadataProperty::ModificationTime => record.modification_time = meta.modified().ok(),
                            MetadataProperty::Size => record.size = (!meta.is_dir()).then(|| meta.len()),
                            MetadataProperty::Present => record.present = Some(true),
                            MetadataProperty::Hosted => record.hosted = Some(false),
                            MetadataProperty::CanPin => record.can_pin = Some(false),
                            MetadataProperty::ContentMimeType => {}
                        }
                    }
                }
                Err(e) => {
                    // Vanished entries keep an empty record.
                    tracing::debug!("Failed to get metadata for {}: {}", entry.url(), e);
                }
            }
            records.push(record);
        }
        Ok(records)
    }

    fn volume_info(&self, entry: &Entry) -> Option<VolumeInfo> {
        (entry.volume_id() == Some(self.volume.volume_id.as_str())).then(|| self.volume.clone())
    }

    async fn search_files(&self, params: LocalSearchParams) -> Result<Vec<Entry>> {
        self.walk(&params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as std_fs;
    use tempfile::TempDir;

    fn read_all_sync(fs: &LocalFileSystem, dir: &Entry) -> Vec<Vec<Entry>> {
        tokio_test::block_on(async {
            let mut reader = fs.create_reader(dir).unwrap();
            let mut batches = Vec::new();
            loop {
                let batch = reader.read_entries().await.unwrap();
                if batch.is_empty() {
                    break;
                }
                batches.push(batch);
            }
            batches
        })
    }

    #[test]
    fn reads_in_batches_until_empty() {
        let temp_dir = TempDir::new().unwrap();
        for i in 0..5 {
            std_fs::write(temp_dir.path().join(format!("file{i}.txt")), "x").unwrap();
        }
        std_fs::create_dir(temp_dir.path().join("subdir")).unwrap();

        let config = ScanConfig {
            read_batch_size: 4,
            ..ScanConfig::default()
        };
        let fs = LocalFileSystem::new(temp_dir.path()).with_config(&config);
        let batches = read_all_sync(&fs, &fs.root_entry());

        assert_eq!(batches.iter().map(Vec::len).collect::<Vec<_>>(), vec![4, 2]);
        let subdir = batches.concat().into_iter().find(|e| e.name() == "subdir").unwrap();
        assert!(subdir.is_dir());
        assert_eq!(subdir.url(), "filesystem:downloads/subdir");
        assert_eq!(subdir.root_type(), Some(RootType::Downloads));
    }

    #[test]
    fn files_cannot_be_enumerated() {
        let temp_dir = TempDir::new().unwrap();
        let fs = LocalFileSystem::new(temp_dir.path());
        let err = fs.create_reader(&Entry::file("filesystem:downloads", "/a.txt")).unwrap_err();
        assert!(matches!(err, ScanError::InvalidModification));
    }

    #[tokio::test]
    async fn search_files_matches_names_recursively() {
        let temp_dir = TempDir::new().unwrap();
        std_fs::create_dir_all(temp_dir.path().join("a/b")).unwrap();
        std_fs::write(temp_dir.path().join("a/b/Report.pdf"), "x").unwrap();
        std_fs::write(temp_dir.path().join("a/notes.txt"), "x").unwrap();
        std_fs::write(temp_dir.path().join("report.mp3"), "x").unwrap();

        let fs = LocalFileSystem::new(temp_dir.path());
        let params = LocalSearchParams {
            root: fs.root_entry(),
            query: "report".to_owned(),
            category: crate::FileCategory::Document,
            modified_after: None,
            max_results: 100,
        };
        let found = fs.search_files(params).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].full_path(), "/a/b/Report.pdf");
    }

    #[cfg(unix)]
    fn tree_with_cycles() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        std_fs::write(temp_dir.path().join("x.txt"), "x").unwrap();
        std::os::unix::fs::symlink(".", temp_dir.path().join("a")).unwrap();
        std::os::unix::fs::symlink(".", temp_dir.path().join("b")).unwrap();
        temp_dir
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn search_lists_symlinked_directories_without_entering_them() {
        let temp_dir = tree_with_cycles();
        let fs = LocalFileSystem::new(temp_dir.path());
        let params = LocalSearchParams {
            root: fs.root_entry(),
            query: String::new(),
            category: crate::FileCategory::All,
            modified_after: None,
            max_results: 100,
        };

        let found = tokio::time::timeout(Duration::from_secs(10), fs.search_files(params))
            .await
            .expect("search terminates")
            .unwrap();

        let mut paths: Vec<&str> = found.iter().map(Entry::full_path).collect();
        paths.sort_unstable();
        assert_eq!(paths, vec!["/a", "/b", "/x.txt"]);
        assert!(found.iter().filter(|e| e.is_dir()).all(Entry::is_symlink));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn recursive_read_stops_at_symlink_cycles() {
        let temp_dir = tree_with_cycles();
        let fs = LocalFileSystem::new(temp_dir.path());
        let token = tokio_util::sync::CancellationToken::new();
        let mut listed = Vec::new();

        let root = fs.root_entry();
        let walk = crate::scanner::read_entries_recursively(&fs, &root, &token, |batch| {
            listed.extend(batch);
        });
        tokio::time::timeout(Duration::from_secs(10), walk)
            .await
            .expect("walk terminates")
            .unwrap();

        assert_eq!(listed.len(), 3);
    }

    #[tokio::test]
    async fn metadata_reports_size_and_mtime() {
        let temp_dir = TempDir::new().unwrap();
        std_fs::write(temp_dir.path().join("data.bin"), "12345").unwrap();

        let fs = LocalFileSystem::new(temp_dir.path());
        let entry = fs.root_entry().child("data.bin", false);
        let records = fs
            .get_metadata(&[entry], &[MetadataProperty::Size, MetadataProperty::ModificationTime])
            .await
            .unwrap();

        assert_eq!(records[0].size, Some(5));
        assert!(records[0].modification_time.is_some());
        assert_eq!(records[0].hosted, None);
    }
}
