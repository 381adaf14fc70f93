//! The scan orchestrator.
//!
//! A [`DirectoryContents`] owns one scan at a time. It builds a scanner
//! through its [`ScannerFactory`], consumes the scanner's chunks strictly in
//! arrival order, filters and dedupes them into the working list, prefetches
//! their metadata and reports the scan's life cycle as
//! [`DirectoryContentsEvent`]s.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::filesystem::{DriveSearchType, FileCategory, FileSystem, SourceRestriction};
use crate::scanner::{
    CrostiniMounter, DirectoryContentScanner, DriveMetadataSearchContentScanner, DriveSearchContentScanner,
    GuestOsMounter, LocalSearchContentScanner, MediaViewContentScanner, RecentContentScanner, SearchLocation,
    SearchRecency, SearchV2ContentScanner, TrashContentScanner,
};
use crate::{
    lock, ContentScanner, Entry, FileListContext, FileListModel, Metadata, MetadataModel, MetadataProperty,
    Result, ScanError, ScanMessage, ScanSink,
};

/// Builds the scanner of a scan around the scan's cancellation token.
pub type ScannerFactory<F> = Arc<dyn Fn(CancellationToken) -> ContentScanner<F> + Send + Sync>;

/// Life-cycle notification of a [`DirectoryContents`].
#[derive(Debug, Clone)]
pub enum DirectoryContentsEvent {
    /// New entries were appended to the working list.
    ScanUpdated,
    ScanCompleted,
    ScanFailed(ScanError),
    ScanCancelled,
}

impl DirectoryContentsEvent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ScanUpdated => "scan-updated",
            Self::ScanCompleted => "scan-completed",
            Self::ScanFailed(_) => "scan-failed",
            Self::ScanCancelled => "scan-cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScanState {
    #[default]
    Idle,
    Scanning,
    Completed,
    Failed,
    Cancelled,
}

/// The list ingested entries go to. It is private until
/// [`DirectoryContents::replace_context_file_list`] moves it into the shared
/// context, after which updates apply to the shared list.
#[derive(Debug)]
enum WorkingList {
    Shared,
    Private(FileListModel),
}

#[derive(Debug)]
struct State {
    scan_state: ScanState,
    cancelled: bool,
    token: Option<CancellationToken>,
    list: WorkingList,
    /// Modification times cached before a refresh, by URL.
    metadata_snapshot: Option<HashMap<String, Option<SystemTime>>>,
    updating: bool,
}

struct Inner<F: FileSystem> {
    context: FileListContext<F>,
    is_search: bool,
    directory_entry: Option<Entry>,
    factory: ScannerFactory<F>,
    state: Mutex<State>,
    // Chunks from the scanner and `update` calls are processed one at a time.
    queue: tokio::sync::Mutex<()>,
    events: broadcast::Sender<DirectoryContentsEvent>,
}

/// The contents of one directory or search, filled by one scan.
///
/// Cloning the handle shares the instance; use
/// [`clone_contents`](Self::clone_contents) for an independent copy.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use dircontents::{DirectoryContents, Entry, FileFilter, FileListContext, MemoryFileSystem, ScanConfig};
///
/// # tokio_test::block_on(async {
/// let fs = Arc::new(MemoryFileSystem::new());
/// let root = Entry::directory("mem:", "/");
/// fs.add_directory(&root, vec![vec![root.child("a.txt", false)]]);
///
/// let context = FileListContext::new(fs, Arc::new(FileFilter::new()), ScanConfig::default());
/// let contents = DirectoryContents::for_directory(context, root);
/// contents.scan(false, false).await;
/// assert_eq!(contents.file_list().len(), 1);
/// # });
/// ```
pub struct DirectoryContents<F: FileSystem> {
    inner: Arc<Inner<F>>,
}

impl<F: FileSystem> Clone for DirectoryContents<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: FileSystem> fmt::Debug for DirectoryContents<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryContents")
            .field("is_search", &self.inner.is_search)
            .field("directory_entry", &self.inner.directory_entry)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<F: FileSystem> DirectoryContents<F> {
    pub fn new(
        context: FileListContext<F>,
        is_search: bool,
        directory_entry: Option<Entry>,
        factory: ScannerFactory<F>,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        let direction = lock(&context.file_list).sort_direction();
        Self {
            inner: Arc::new(Inner {
                context,
                is_search,
                directory_entry,
                factory,
                state: Mutex::new(State {
                    scan_state: ScanState::Idle,
                    cancelled: false,
                    token: None,
                    list: WorkingList::Private(FileListModel::new(direction)),
                    metadata_snapshot: None,
                    updating: false,
                }),
                queue: tokio::sync::Mutex::new(()),
                events,
            }),
        }
    }

    /// Contents listing the children of `entry`.
    pub fn for_directory(context: FileListContext<F>, entry: Entry) -> Self {
        let fs = Arc::clone(context.filesystem());
        let dir = entry.clone();
        Self::new(
            context,
            false,
            Some(entry),
            Arc::new(move |token| {
                let scanner = DirectoryContentScanner::new(Arc::clone(&fs), dir.clone(), token);
                ContentScanner::from(scanner)
            }),
        )
    }

    /// Contents listing every file below `root`.
    pub fn for_media_view(context: FileListContext<F>, root: Entry) -> Self {
        let fs = Arc::clone(context.filesystem());
        let dir = root.clone();
        Self::new(
            context,
            false,
            Some(root),
            Arc::new(move |token| {
                let scanner = MediaViewContentScanner::new(Arc::clone(&fs), dir.clone(), token);
                ContentScanner::from(scanner)
            }),
        )
    }

    /// Contents of a remote Drive search for `query`.
    pub fn for_drive_search(
        context: FileListContext<F>,
        entry: Entry,
        query: &str,
        category: FileCategory,
    ) -> Self {
        let fs = Arc::clone(context.filesystem());
        let config = context.config.clone();
        let query = query.to_owned();
        Self::new(
            context,
            true,
            Some(entry),
            Arc::new(move |token| {
                ContentScanner::from(
                    DriveSearchContentScanner::new(Arc::clone(&fs), query.clone(), category, token)
                        .with_config(&config),
                )
            }),
        )
    }

    /// Contents of a name search below `entry`.
    pub fn for_local_search(context: FileListContext<F>, entry: Entry, query: &str) -> Self {
        let fs = Arc::clone(context.filesystem());
        let dir = entry.clone();
        let query = query.to_owned();
        Self::new(
            context,
            true,
            Some(entry),
            Arc::new(move |token| {
                let scanner = LocalSearchContentScanner::new(Arc::clone(&fs), dir.clone(), &query, token);
                ContentScanner::from(scanner)
            }),
        )
    }

    /// Contents of an aggregated local and Drive search.
    pub fn for_search(
        context: FileListContext<F>,
        directory: Entry,
        local_root: Entry,
        query: &str,
        location: SearchLocation,
        recency: SearchRecency,
        category: FileCategory,
    ) -> Self {
        let fs = Arc::clone(context.filesystem());
        let config = context.config.clone();
        let dir = directory.clone();
        let query = query.to_owned();
        Self::new(
            context,
            true,
            Some(directory),
            Arc::new(move |token| {
                ContentScanner::from(
                    SearchV2ContentScanner::new(Arc::clone(&fs), dir.clone(), local_root.clone(), query.clone(), token)
                        .with_config(&config)
                        .location(location)
                        .recency(recency)
                        .category(category),
                )
            }),
        )
    }

    /// Contents of a Drive listing such as shared-with-me or offline files.
    pub fn for_drive_metadata_search(
        context: FileListContext<F>,
        entry: Entry,
        search_type: DriveSearchType,
    ) -> Self {
        let fs = Arc::clone(context.filesystem());
        let config = context.config.clone();
        Self::new(
            context,
            true,
            Some(entry),
            Arc::new(move |token| {
                let scanner =
                    DriveMetadataSearchContentScanner::new(Arc::clone(&fs), search_type, token).with_config(&config);
                ContentScanner::from(scanner)
            }),
        )
    }

    /// Contents of the recent files view.
    pub fn for_recent(
        context: FileListContext<F>,
        entry: Entry,
        query: &str,
        source: SourceRestriction,
        category: FileCategory,
    ) -> Self {
        let fs = Arc::clone(context.filesystem());
        let query = query.to_owned();
        Self::new(
            context,
            true,
            Some(entry),
            Arc::new(move |token| {
                let scanner = RecentContentScanner::new(Arc::clone(&fs), &query, source, category, token);
                ContentScanner::from(scanner)
            }),
        )
    }

    /// Contents that only mount the Crostini volume.
    pub fn for_crostini(context: FileListContext<F>, entry: Entry) -> Self {
        let fs = Arc::clone(context.filesystem());
        Self::new(
            context,
            false,
            Some(entry),
            Arc::new(move |token| {
                let scanner = CrostiniMounter::new(Arc::clone(&fs), token);
                ContentScanner::from(scanner)
            }),
        )
    }

    /// Contents that only mount the volume of guest `guest_id`.
    pub fn for_guest_os(context: FileListContext<F>, entry: Entry, guest_id: u32) -> Self {
        let fs = Arc::clone(context.filesystem());
        Self::new(
            context,
            false,
            Some(entry),
            Arc::new(move |token| {
                let scanner = GuestOsMounter::new(Arc::clone(&fs), guest_id, token);
                ContentScanner::from(scanner)
            }),
        )
    }

    /// Contents merging all trash `locations`.
    pub fn for_trash(context: FileListContext<F>, entry: Entry, locations: Vec<Entry>) -> Self {
        let fs = Arc::clone(context.filesystem());
        Self::new(
            context,
            false,
            Some(entry),
            Arc::new(move |token| {
                let scanner = TrashContentScanner::new(Arc::clone(&fs), locations.clone(), token);
                ContentScanner::from(scanner)
            }),
        )
    }

    /// A fresh, unscanned instance sharing this one's context and factory.
    #[must_use]
    pub fn clone_contents(&self) -> Self {
        Self::new(
            self.inner.context.clone(),
            self.inner.is_search,
            self.inner.directory_entry.clone(),
            Arc::clone(&self.inner.factory),
        )
    }

    #[must_use]
    pub fn context(&self) -> &FileListContext<F> {
        &self.inner.context
    }

    #[must_use]
    pub fn is_search(&self) -> bool {
        self.inner.is_search
    }

    #[must_use]
    pub fn directory_entry(&self) -> Option<&Entry> {
        self.inner.directory_entry.as_ref()
    }

    #[must_use]
    pub fn state(&self) -> ScanState {
        lock(&self.inner.state).scan_state
    }

    /// Returns `true` while a scan or an update is in progress.
    #[must_use]
    pub fn is_scanning(&self) -> bool {
        let state = lock(&self.inner.state);
        state.scan_state == ScanState::Scanning || state.updating
    }

    /// Snapshot of the working list.
    #[must_use]
    pub fn file_list(&self) -> Vec<Entry> {
        let mut state = lock(&self.inner.state);
        with_list(&self.inner.context, &mut state, |list| list.entries().to_vec())
    }

    /// Use `list` as the private working list.
    pub fn set_file_list(&self, list: FileListModel) {
        lock(&self.inner.state).list = WorkingList::Private(list);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DirectoryContentsEvent> {
        self.inner.events.subscribe()
    }

    /// Fetch the prefetch properties of `entries` through the shared cache.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the fetch fails.
    pub async fn prefetch_metadata(&self, entries: &[Entry]) -> Result<Vec<Metadata>> {
        let context = &self.inner.context;
        context.metadata_model.get(entries, &context.prefetch_properties).await
    }

    /// Run the scan to its end.
    ///
    /// Entries are collected into the working list, which reaches the shared
    /// context on [`replace_context_file_list`](Self::replace_context_file_list).
    /// With `refresh`, the modification times of the shared list are
    /// snapshotted, the scan starts from an empty list and the metadata cache
    /// is dropped first. `invalidate_cache` is forwarded to scanners that keep
    /// their own cache.
    ///
    /// Returns once the scanner settled or the scan was cancelled.
    pub async fn scan(&self, refresh: bool, invalidate_cache: bool) {
        let Some(token) = self.begin_scan(refresh) else {
            return;
        };
        let scanner = (self.inner.factory)(token.clone());
        let (sink, rx) = ScanSink::channel();

        tokio::select! {
            biased;
            () = token.cancelled() => tracing::debug!("scan abandoned after cancellation"),
            _ = async { tokio::join!(scanner.scan(sink, invalidate_cache), self.consume(rx)) } => {}
        }

        lock(&self.inner.state).token = None;
    }

    /// Cancel the scan and announce it. Nothing is emitted afterwards.
    ///
    /// Calling it again has no effect.
    pub fn cancel_scan(&self) {
        let mut state = lock(&self.inner.state);
        if state.cancelled {
            return;
        }
        state.cancelled = true;
        state.scan_state = ScanState::Cancelled;
        if let Some(token) = state.token.take() {
            token.cancel();
        }
        tracing::debug!(directory = ?self.inner.directory_entry.as_ref().map(Entry::url), "scan cancelled");
        let _ = self.inner.events.send(DirectoryContentsEvent::ScanCancelled);
    }

    /// Stop all work silently.
    pub fn dispose(&self) {
        let mut state = lock(&self.inner.state);
        state.cancelled = true;
        if let Some(token) = state.token.take() {
            token.cancel();
        }
    }

    /// Apply changes observed outside of a scan: entries whose URL is in
    /// `removed_urls` are dropped, listed entries present in `updated` are
    /// replaced in place and the other `updated` entries are ingested as new.
    ///
    /// Emits `scan-completed` when done.
    pub async fn update(&self, updated: Vec<Entry>, removed_urls: &[String]) {
        let _turn = self.inner.queue.lock().await;
        let (replaced, added) = {
            let mut state = lock(&self.inner.state);
            if state.cancelled {
                return;
            }
            state.updating = true;
            let removed: HashSet<&str> = removed_urls.iter().map(String::as_str).collect();
            let mut pending: HashMap<String, Entry> = updated
                .iter()
                .map(|entry| (entry.url().to_owned(), entry.clone()))
                .collect();
            let replaced = with_list(&self.inner.context, &mut state, |list| {
                apply_update(list, &removed, &mut pending)
            });
            let added: Vec<Entry> = updated
                .into_iter()
                .filter(|entry| pending.contains_key(entry.url()))
                .collect();
            (replaced, added)
        };

        let context = &self.inner.context;
        context.metadata_model.clear(removed_urls);
        if !replaced.is_empty() {
            let urls: Vec<&str> = replaced.iter().map(Entry::url).collect();
            context.metadata_model.clear(urls.as_slice());
            if let Err(error) = context.metadata_model.get(&replaced, &context.prefetch_properties).await {
                tracing::warn!("metadata refresh of updated entries failed: {}", error);
            }
        }
        self.ingest(added).await;

        let mut state = lock(&self.inner.state);
        state.updating = false;
        if !state.cancelled {
            let _ = self.inner.events.send(DirectoryContentsEvent::ScanCompleted);
        }
    }

    /// Move the private working list into the shared context. After a
    /// refresh, only the rows whose modification time changed are announced
    /// as updated.
    pub fn replace_context_file_list(&self) {
        let mut state = lock(&self.inner.state);
        let WorkingList::Private(list) = std::mem::replace(&mut state.list, WorkingList::Shared) else {
            return;
        };
        let snapshot = state.metadata_snapshot.take();

        let mut shared = lock(&self.inner.context.file_list);
        shared.replace_all(list.into_entries());
        let Some(snapshot) = snapshot else {
            return;
        };
        let current = self.inner.context.metadata_model.get_cache(shared.entries());
        let changed = shared
            .entries()
            .iter()
            .zip(current)
            .enumerate()
            .filter_map(|(index, (entry, metadata))| {
                let previous = snapshot.get(entry.url())?;
                let modified = metadata.map(|metadata| metadata.modification_time);
                (modified.as_ref() != Some(previous)).then_some(index)
            })
            .collect();
        shared.update_indexes(changed);
    }

    fn begin_scan(&self, refresh: bool) -> Option<CancellationToken> {
        let mut state = lock(&self.inner.state);
        if state.cancelled {
            tracing::debug!("scan requested after cancellation");
            return None;
        }
        if state.token.is_some() {
            tracing::warn!("scan requested while another scan is running");
            return None;
        }

        if refresh {
            let model = &self.inner.context.metadata_model;
            let shared = lock(&self.inner.context.file_list);
            state.metadata_snapshot = Some(snapshot_modification_times(model, shared.entries()));
            state.list = WorkingList::Private(FileListModel::new(shared.sort_direction()));
            drop(shared);
            model.clear_all_cache();
        }

        let token = CancellationToken::new();
        state.token = Some(token.clone());
        state.scan_state = ScanState::Scanning;
        Some(token)
    }

    async fn consume(&self, mut rx: mpsc::UnboundedReceiver<ScanMessage>) {
        let mut settled = false;
        while let Some(message) = rx.recv().await {
            if settled {
                tracing::trace!("ignoring scanner message after its outcome");
                continue;
            }
            let _turn = self.inner.queue.lock().await;
            match message {
                ScanMessage::Entries(entries) => self.ingest(entries).await,
                ScanMessage::Success => {
                    settled = true;
                    self.settle(ScanState::Completed, DirectoryContentsEvent::ScanCompleted);
                }
                ScanMessage::Error(error) => {
                    settled = true;
                    self.settle(ScanState::Failed, DirectoryContentsEvent::ScanFailed(error));
                }
            }
        }
        if !settled {
            tracing::warn!("scanner stopped without reporting an outcome");
            self.settle(ScanState::Failed, DirectoryContentsEvent::ScanFailed(ScanError::Abort));
        }
    }

    fn settle(&self, scan_state: ScanState, event: DirectoryContentsEvent) {
        let mut state = lock(&self.inner.state);
        if state.cancelled {
            return;
        }
        state.scan_state = scan_state;
        if let DirectoryContentsEvent::ScanFailed(error) = &event {
            tracing::warn!("scan failed: {}", error);
        }
        let _ = self.inner.events.send(event);
    }

    /// Filter, dedupe and append one chunk, then prefetch its metadata.
    async fn ingest(&self, entries: Vec<Entry>) {
        if entries.is_empty() {
            return;
        }
        let context = &self.inner.context;
        let survivors: Vec<Entry> = {
            let mut state = lock(&self.inner.state);
            if state.cancelled {
                return;
            }
            let mut known = with_list(context, &mut state, |list| list.urls());
            entries
                .into_iter()
                .filter(|entry| context.file_filter.filter(entry) && known.insert(entry.url().to_owned()))
                .collect()
        };
        if survivors.is_empty() {
            return;
        }

        let prefetch = Prefetch::start(context, &survivors);
        {
            let mut state = lock(&self.inner.state);
            if state.cancelled {
                return;
            }
            let added = survivors.len();
            with_list(context, &mut state, |list| list.push(survivors));
            tracing::trace!(added, "entries appended");
            let _ = self.inner.events.send(DirectoryContentsEvent::ScanUpdated);
        }
        prefetch.run(|| lock(&self.inner.state).cancelled).await;
    }
}

fn with_list<F: FileSystem, R>(
    context: &FileListContext<F>,
    state: &mut State,
    f: impl FnOnce(&mut FileListModel) -> R,
) -> R {
    match &mut state.list {
        WorkingList::Private(list) => f(list),
        WorkingList::Shared => f(&mut *lock(&context.file_list)),
    }
}

fn snapshot_modification_times<F: FileSystem>(
    model: &MetadataModel<F>,
    entries: &[Entry],
) -> HashMap<String, Option<SystemTime>> {
    entries
        .iter()
        .zip(model.get_cache(entries))
        .filter_map(|(entry, metadata)| Some((entry.url().to_owned(), metadata?.modification_time)))
        .collect()
}

/// Removes listed entries whose URL is in `removed`, splicing contiguous runs
/// at once, and replaces listed entries found in `pending` in place. Replaced
/// entries are taken out of `pending` and returned.
fn apply_update(
    list: &mut FileListModel,
    removed: &HashSet<&str>,
    pending: &mut HashMap<String, Entry>,
) -> Vec<Entry> {
    let mut replaced = Vec::new();
    let mut index = 0;
    let mut run = 0;

    while let Some(url) = list.item(index).map(|entry| entry.url().to_owned()) {
        if removed.contains(url.as_str()) {
            run += 1;
            index += 1;
            continue;
        }
        if run > 0 {
            list.splice(index - run, run);
            index -= run;
            run = 0;
        }
        if let Some(entry) = pending.remove(&url) {
            list.replace_item(index, entry.clone());
            replaced.push(entry);
        }
        index += 1;
    }
    if run > 0 {
        list.splice(index - run, run);
    }
    replaced
}

/// Metadata prefetch of one chunk: sub-chunks of the configured size, with a
/// bounded number of requests in flight. Dropping it aborts what is left.
struct Prefetch<F: FileSystem> {
    model: Arc<MetadataModel<F>>,
    properties: Arc<[MetadataProperty]>,
    pending: VecDeque<Vec<Entry>>,
    running: JoinSet<Result<()>>,
    concurrency: usize,
}

impl<F: FileSystem> Prefetch<F> {
    /// Queue `entries` and start the first requests.
    fn start(context: &FileListContext<F>, entries: &[Entry]) -> Self {
        let chunk_size = context.config.prefetch_chunk_size.max(1);
        let mut prefetch = Self {
            model: Arc::clone(&context.metadata_model),
            properties: Arc::from(context.prefetch_properties.as_slice()),
            pending: entries.chunks(chunk_size).map(<[Entry]>::to_vec).collect(),
            running: JoinSet::new(),
            concurrency: context.config.prefetch_concurrency.max(1),
        };
        prefetch.fill();
        prefetch
    }

    fn fill(&mut self) {
        while self.running.len() < self.concurrency {
            let Some(chunk) = self.pending.pop_front() else {
                break;
            };
            let model = Arc::clone(&self.model);
            let properties = Arc::clone(&self.properties);
            self.running
                .spawn(async move { model.get(&chunk, &properties).await.map(drop) });
        }
    }

    /// Drive the remaining requests, abandoning them once `cancelled` holds.
    async fn run(mut self, cancelled: impl Fn() -> bool) {
        while let Some(joined) = self.running.join_next().await {
            if cancelled() {
                self.running.abort_all();
                return;
            }
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(error)) => tracing::warn!("metadata prefetch failed: {}", error),
                Err(error) => tracing::debug!("metadata prefetch task ended early: {}", error),
            }
            self.fill();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_of(paths: &[&str]) -> FileListModel {
        let mut list = FileListModel::default();
        list.push(paths.iter().map(|path| Entry::file("mem:", path)).collect());
        list
    }

    fn paths(list: &FileListModel) -> Vec<&str> {
        list.entries().iter().map(Entry::full_path).collect()
    }

    #[test]
    fn event_names() {
        assert_eq!(DirectoryContentsEvent::ScanUpdated.name(), "scan-updated");
        assert_eq!(DirectoryContentsEvent::ScanCompleted.name(), "scan-completed");
        assert_eq!(DirectoryContentsEvent::ScanFailed(ScanError::Abort).name(), "scan-failed");
        assert_eq!(DirectoryContentsEvent::ScanCancelled.name(), "scan-cancelled");
    }

    #[test]
    fn update_coalesces_contiguous_removals() {
        let mut list = list_of(&["/a", "/b", "/c", "/d", "/e"]);
        let mut changes = list.subscribe();
        let removed: HashSet<&str> = ["mem:/b", "mem:/c", "mem:/e"].into();
        let mut pending = HashMap::from([("mem:/d".to_owned(), Entry::file("mem:", "/d"))]);

        let replaced = apply_update(&mut list, &removed, &mut pending);

        assert_eq!(paths(&list), vec!["/a", "/d"]);
        assert_eq!(replaced.len(), 1);
        assert!(pending.is_empty());
        assert_eq!(
            changes.try_recv().unwrap(),
            crate::FileListChange::Spliced {
                index: 1,
                removed: 2,
                added: 0
            }
        );
        assert_eq!(changes.try_recv().unwrap(), crate::FileListChange::Updated(vec![1]));
        assert_eq!(
            changes.try_recv().unwrap(),
            crate::FileListChange::Spliced {
                index: 2,
                removed: 1,
                added: 0
            }
        );
    }

    #[test]
    fn unknown_updates_stay_pending() {
        let mut list = list_of(&["/a"]);
        let mut pending = HashMap::from([("mem:/new".to_owned(), Entry::file("mem:", "/new"))]);

        let replaced = apply_update(&mut list, &HashSet::new(), &mut pending);

        assert!(replaced.is_empty());
        assert!(pending.contains_key("mem:/new"));
        assert_eq!(paths(&list), vec!["/a"]);
    }
}
