//! Scriptable in-memory backing store.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use super::{
    DirectoryReader, DriveConnectionState, DriveSearchPage, DriveSearchParams, DriveSearchType,
    FileCategory, FileSystem, LocalSearchParams, SourceRestriction,
};
use crate::{lock, Entry, Metadata, MetadataProperty, Result, ScanError, VolumeInfo};

#[derive(Debug, Default)]
struct MemoryState {
    listings: HashMap<String, Vec<Vec<Entry>>>,
    read_errors: HashMap<String, ScanError>,
    metadata: HashMap<String, Metadata>,
    volumes: HashMap<String, VolumeInfo>,
    drive_results: Option<Result<Vec<Entry>>>,
    drive_metadata_results: Option<Result<Vec<Entry>>>,
    local_search_results: Option<Result<Vec<Entry>>>,
    recent_files: Option<Result<Vec<Entry>>>,
    crostini_mount: Option<Result<()>>,
    guest_mounts: HashMap<u32, Result<()>>,
    connection: DriveConnectionState,
    read_delay: Option<Duration>,
    metadata_delay: Option<Duration>,
    search_delay: Option<Duration>,
    drive_queries: Vec<DriveSearchParams>,
    local_queries: Vec<LocalSearchParams>,
    metadata_requests: Vec<usize>,
    mount_requests: usize,
}

/// A backing store whose listings and service responses are scripted.
///
/// Directories are registered with explicit read batches, so the shape of a
/// scan (how many chunks, in which order, followed by which error) is fully
/// controlled. Every service records the requests it received.
///
/// # Examples
///
/// ```
/// use dircontents::{Entry, MemoryFileSystem};
///
/// let fs = MemoryFileSystem::new();
/// let root = Entry::directory("mem:", "/");
/// fs.add_directory(&root, vec![vec![root.child("a.txt", false)]]);
/// ```
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    state: Mutex<MemoryState>,
}

impl MemoryFileSystem {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `dir` with the batches its reader returns, in order.
    ///
    /// Empty batches are dropped; the reader signals the end with one.
    pub fn add_directory(&self, dir: &Entry, batches: Vec<Vec<Entry>>) {
        let batches = batches.into_iter().filter(|batch| !batch.is_empty()).collect();
        lock(&self.state).listings.insert(dir.url().to_owned(), batches);
    }

    /// Make the reader of `dir` fail once its batches are exhausted.
    pub fn set_read_error(&self, dir: &Entry, error: ScanError) {
        lock(&self.state).read_errors.insert(dir.url().to_owned(), error);
    }

    pub fn add_volume(&self, volume: VolumeInfo) {
        lock(&self.state).volumes.insert(volume.volume_id.clone(), volume);
    }

    pub fn set_metadata(&self, entry: &Entry, metadata: Metadata) {
        lock(&self.state).metadata.insert(entry.url().to_owned(), metadata);
    }

    pub fn set_drive_results(&self, results: Result<Vec<Entry>>) {
        lock(&self.state).drive_results = Some(results);
    }

    pub fn set_drive_metadata_results(&self, results: Result<Vec<Entry>>) {
        lock(&self.state).drive_metadata_results = Some(results);
    }

    pub fn set_local_search_results(&self, results: Result<Vec<Entry>>) {
        lock(&self.state).local_search_results = Some(results);
    }

    pub fn set_recent_files(&self, results: Result<Vec<Entry>>) {
        lock(&self.state).recent_files = Some(results);
    }

    pub fn set_crostini_mount(&self, outcome: Result<()>) {
        lock(&self.state).crostini_mount = Some(outcome);
    }

    pub fn set_guest_mount(&self, guest_id: u32, outcome: Result<()>) {
        lock(&self.state).guest_mounts.insert(guest_id, outcome);
    }

    pub fn set_connection_state(&self, state: DriveConnectionState) {
        lock(&self.state).connection = state;
    }

    /// Delay every directory read by `delay`.
    pub fn set_read_delay(&self, delay: Duration) {
        lock(&self.state).read_delay = Some(delay);
    }

    /// Delay every metadata request by `delay`.
    pub fn set_metadata_delay(&self, delay: Duration) {
        lock(&self.state).metadata_delay = Some(delay);
    }

    /// Delay every search and recent-files request by `delay`.
    pub fn set_search_delay(&self, delay: Duration) {
        lock(&self.state).search_delay = Some(delay);
    }

    /// Drive search requests received so far.
    #[must_use]
    pub fn drive_queries(&self) -> Vec<DriveSearchParams> {
        lock(&self.state).drive_queries.clone()
    }

    /// Local search requests received so far.
    #[must_use]
    pub fn local_queries(&self) -> Vec<LocalSearchParams> {
        lock(&self.state).local_queries.clone()
    }

    /// Number of entries in each metadata request received so far.
    #[must_use]
    pub fn metadata_requests(&self) -> Vec<usize> {
        lock(&self.state).metadata_requests.clone()
    }

    #[must_use]
    pub fn mount_requests(&self) -> usize {
        lock(&self.state).mount_requests
    }

    async fn pause(delay: Option<Duration>) {
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn scripted<T: Clone>(slot: &Option<Result<T>>, service: &str) -> Result<T> {
        match slot {
            Some(result) => result.clone(),
            None => Err(ScanError::NotReadable(format!("no {service} scripted"))),
        }
    }
}

/// Replays the scripted batches of one directory.
#[derive(Debug)]
pub struct MemoryDirectoryReader {
    batches: VecDeque<Vec<Entry>>,
    error: Option<ScanError>,
    delay: Option<Duration>,
}

impl DirectoryReader for MemoryDirectoryReader {
    async fn read_entries(&mut self) -> Result<Vec<Entry>> {
        MemoryFileSystem::pause(self.delay).await;
        if let Some(batch) = self.batches.pop_front() {
            return Ok(batch);
        }
        match self.error.take() {
            Some(error) => Err(error),
            None => Ok(Vec::new()),
        }
    }
}

impl FileSystem for MemoryFileSystem {
    type Reader = MemoryDirectoryReader;

    fn create_reader(&self, dir: &Entry) -> Result<Self::Reader> {
        if !dir.is_dir() {
            return Err(ScanError::InvalidModification);
        }
        let state = lock(&self.state);
        Ok(MemoryDirectoryReader {
            batches: state
                .listings
                .get(dir.url())
                .cloned()
                .unwrap_or_default()
                .into(),
            error: state.read_errors.get(dir.url()).cloned(),
            delay: state.read_delay,
        })
    }

    async fn get_metadata(
        &self,
        entries: &[Entry],
        _properties: &[MetadataProperty],
    ) -> Result<Vec<Metadata>> {
        let delay = {
            let mut state = lock(&self.state);
            state.metadata_requests.push(entries.len());
            state.metadata_delay
        };
        Self::pause(delay).await;

        let state = lock(&self.state);
        Ok(entries
            .iter()
            .map(|entry| state.metadata.get(entry.url()).cloned().unwrap_or_default())
            .collect())
    }

    fn volume_info(&self, entry: &Entry) -> Option<VolumeInfo> {
        let volume_id = entry.volume_id()?;
        lock(&self.state).volumes.get(volume_id).cloned()
    }

    fn drive_connection_state(&self) -> DriveConnectionState {
        lock(&self.state).connection
    }

    async fn search_drive(&self, params: DriveSearchParams) -> Result<DriveSearchPage> {
        let delay = {
            let mut state = lock(&self.state);
            state.drive_queries.push(params);
            state.search_delay
        };
        Self::pause(delay).await;

        let entries = Self::scripted(&lock(&self.state).drive_results, "Drive results")?;
        Ok(DriveSearchPage {
            entries,
            next_cursor: None,
        })
    }

    async fn search_drive_metadata(
        &self,
        _search_type: DriveSearchType,
        max_results: usize,
    ) -> Result<Vec<Entry>> {
        let delay = lock(&self.state).search_delay;
        Self::pause(delay).await;

        let mut entries = Self::scripted(&lock(&self.state).drive_metadata_results, "Drive metadata")?;
        entries.truncate(max_results);
        Ok(entries)
    }

    async fn search_files(&self, params: LocalSearchParams) -> Result<Vec<Entry>> {
        let delay = {
            let mut state = lock(&self.state);
            state.local_queries.push(params);
            state.search_delay
        };
        Self::pause(delay).await;

        Self::scripted(&lock(&self.state).local_search_results, "local search")
    }

    async fn recent_files(
        &self,
        _source: SourceRestriction,
        category: FileCategory,
        _invalidate_cache: bool,
    ) -> Result<Vec<Entry>> {
        let delay = lock(&self.state).search_delay;
        Self::pause(delay).await;

        let entries = Self::scripted(&lock(&self.state).recent_files, "recent files")?;
        Ok(entries
            .into_iter()
            .filter(|entry| category.matches(entry.name(), entry.is_dir()))
            .collect())
    }

    async fn mount_crostini(&self) -> Result<()> {
        let mut state = lock(&self.state);
        state.mount_requests += 1;
        state.crostini_mount.clone().unwrap_or(Ok(()))
    }

    async fn mount_guest(&self, guest_id: u32) -> Result<()> {
        let mut state = lock(&self.state);
        state.mount_requests += 1;
        state.guest_mounts.get(&guest_id).cloned().unwrap_or(Ok(()))
    }
}
