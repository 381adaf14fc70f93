//! The current selection of the file list.

use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::filesystem::{DriveConnectionState, FileSystem};
use crate::metadata::SELECTION_PREFETCH_PROPERTIES;
use crate::{lock, Entry, MetadataModel, Result, ScanConfig};

/// Delay of the heavy selection computation when the user is not
/// selecting in bulk.
const QUICK_UPDATE_DELAY: Duration = Duration::from_millis(1);

/// What the embedding dialog accepts as a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AllowedPaths {
    /// Anything, including hosted documents that only exist as URLs.
    #[default]
    AnyPathOrUrl,
    /// Any file with real content.
    AnyPath,
    /// Files with real content on a native volume.
    NativePath,
}

/// Aggregates that need a metadata fetch.
#[derive(Debug, Clone)]
struct Additional {
    all_files_present: bool,
    any_files_hosted: bool,
    mime_types: Vec<String>,
}

/// A snapshot of the selected entries.
///
/// Indexes, entries and counts are fixed at construction. The cache-presence
/// and hosted flags are filled once by
/// [`compute_additional`](Self::compute_additional); until then they report
/// the conservative values (not in cache, hosted).
#[derive(Debug)]
pub struct FileSelection {
    indexes: Vec<usize>,
    entries: Vec<Entry>,
    file_count: usize,
    directory_count: usize,
    has_read_only: bool,
    additional: OnceLock<Additional>,
}

impl FileSelection {
    /// Select the entries of `list` at `indexes`. Out-of-range indexes are
    /// ignored.
    pub fn new<F: FileSystem>(filesystem: &F, indexes: Vec<usize>, list: &[Entry]) -> Self {
        let entries: Vec<Entry> = indexes.iter().filter_map(|&index| list.get(index).cloned()).collect();
        let directory_count = entries.iter().filter(|entry| entry.is_dir()).count();
        let has_read_only = entries
            .iter()
            .any(|entry| filesystem.volume_info(entry).is_some_and(|volume| volume.read_only));

        Self {
            file_count: entries.len() - directory_count,
            directory_count,
            indexes,
            entries,
            has_read_only,
            additional: OnceLock::new(),
        }
    }

    /// An empty selection.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            indexes: Vec::new(),
            entries: Vec::new(),
            file_count: 0,
            directory_count: 0,
            has_read_only: false,
            additional: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn indexes(&self) -> &[usize] {
        &self.indexes
    }

    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    #[must_use]
    pub fn total_count(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub const fn file_count(&self) -> usize {
        self.file_count
    }

    #[must_use]
    pub const fn directory_count(&self) -> usize {
        self.directory_count
    }

    /// Returns `true` if any entry lives on a read-only volume.
    #[must_use]
    pub const fn has_read_only(&self) -> bool {
        self.has_read_only
    }

    #[must_use]
    pub fn is_additional_computed(&self) -> bool {
        self.additional.get().is_some()
    }

    #[must_use]
    pub fn all_files_present(&self) -> bool {
        self.additional.get().is_some_and(|additional| additional.all_files_present)
    }

    #[must_use]
    pub fn any_files_not_in_cache(&self) -> bool {
        !self.all_files_present()
    }

    #[must_use]
    pub fn any_files_hosted(&self) -> bool {
        self.additional.get().map_or(true, |additional| additional.any_files_hosted)
    }

    /// Content types of the selected entries, in order. Empty until computed.
    #[must_use]
    pub fn mime_types(&self) -> &[String] {
        self.additional
            .get()
            .map(|additional| additional.mime_types.as_slice())
            .unwrap_or_default()
    }

    /// Fetch the selection properties and fill the cache-presence and hosted
    /// flags. Only the first successful call does any work.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the metadata fetch fails; the flags then
    /// keep their conservative values.
    pub async fn compute_additional<F: FileSystem>(&self, metadata_model: &MetadataModel<F>) -> Result<()> {
        if self.is_additional_computed() {
            return Ok(());
        }
        let metadata = metadata_model.get(&self.entries, SELECTION_PREFETCH_PROPERTIES).await?;

        let mut all_files_present = true;
        let mut any_files_hosted = false;
        for (entry, record) in self.entries.iter().zip(&metadata) {
            if entry.is_dir() {
                continue;
            }
            all_files_present &= record.present != Some(false);
            any_files_hosted |= record.hosted == Some(true);
        }
        let mime_types = metadata
            .into_iter()
            .map(|record| record.content_mime_type.unwrap_or_default())
            .collect();

        let _ = self.additional.set(Additional {
            all_files_present,
            any_files_hosted,
            mime_types,
        });
        Ok(())
    }
}

/// Notification of a [`FileSelectionHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionEvent {
    /// The selection was replaced.
    Change,
    /// The heavy properties of the current selection are available.
    ChangeThrottled,
}

/// The selection as pushed to the application store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionUpdate {
    pub selected_keys: Vec<String>,
    pub entries: Vec<Entry>,
}

/// An application-wide store receiving selection updates.
pub trait SelectionStore: Send + Sync + 'static {
    fn dispatch(&self, update: SelectionUpdate);
}

#[derive(Debug)]
struct HandlerState {
    selection: Arc<FileSelection>,
    /// Bumped on every change; a heavy computation only publishes if the
    /// generation it was started for is still current.
    generation: u64,
    last_computed: Option<Instant>,
    timer: Option<JoinHandle<()>>,
    store_update_pending: bool,
}

#[derive(educe::Educe)]
#[educe(Debug)]
struct HandlerInner<F: FileSystem> {
    #[educe(Debug(ignore))]
    metadata_model: Arc<MetadataModel<F>>,
    allowed_paths: AllowedPaths,
    config: ScanConfig,
    #[educe(Debug(ignore))]
    store: OnceLock<Arc<dyn SelectionStore>>,
    state: Mutex<HandlerState>,
    #[educe(Debug(ignore))]
    events: broadcast::Sender<SelectionEvent>,
}

/// Keeps exactly one live [`FileSelection`] and throttles the expensive part
/// of its computation.
///
/// `Change` is emitted synchronously on every selection change.
/// `ChangeThrottled` follows once the heavy properties of the *current*
/// selection are known. Small selections are computed after 1 ms unless a
/// computation finished within the update delay; everything else waits the
/// full delay. A newer change cancels the pending computation.
///
/// Timers run on tokio tasks, so changes must be reported from within a
/// runtime.
#[derive(Debug)]
pub struct FileSelectionHandler<F: FileSystem> {
    inner: Arc<HandlerInner<F>>,
}

impl<F: FileSystem> FileSelectionHandler<F> {
    pub fn new(metadata_model: Arc<MetadataModel<F>>, allowed_paths: AllowedPaths, config: ScanConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(HandlerInner {
                metadata_model,
                allowed_paths,
                config,
                store: OnceLock::new(),
                state: Mutex::new(HandlerState {
                    selection: Arc::new(FileSelection::empty()),
                    generation: 0,
                    last_computed: None,
                    timer: None,
                    store_update_pending: false,
                }),
                events,
            }),
        }
    }

    /// Also push every selection, once per frame at most, into `store`.
    pub fn set_store(&self, store: Arc<dyn SelectionStore>) {
        if self.inner.store.set(store).is_err() {
            tracing::warn!("selection store already attached");
        }
    }

    #[must_use]
    pub fn selection(&self) -> Arc<FileSelection> {
        Arc::clone(&lock(&self.inner.state).selection)
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SelectionEvent> {
        self.inner.events.subscribe()
    }

    #[must_use]
    pub fn allowed_paths(&self) -> AllowedPaths {
        self.inner.allowed_paths
    }

    /// Replace the selection with the entries of `list` at `indexes`.
    pub fn on_selection_changed(&self, indexes: Vec<usize>, list: &[Entry]) {
        let filesystem = self.inner.metadata_model.filesystem();
        let selection = Arc::new(FileSelection::new(&**filesystem, indexes, list));
        let config = &self.inner.config;

        {
            let mut state = lock(&self.inner.state);
            state.generation += 1;
            state.selection = Arc::clone(&selection);
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }

            let computed_recently = state
                .last_computed
                .is_some_and(|finished| finished.elapsed() <= config.selection_update_delay);
            let delay = if selection.total_count() < config.selection_bulk_threshold && !computed_recently {
                QUICK_UPDATE_DELAY
            } else {
                config.selection_update_delay
            };

            let inner = Arc::clone(&self.inner);
            let generation = state.generation;
            state.timer = Some(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                inner.update_additional(generation, selection).await;
            }));

            if self.inner.store.get().is_some() && !state.store_update_pending {
                state.store_update_pending = true;
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move { inner.flush_store().await });
            }
        }

        let _ = self.inner.events.send(SelectionEvent::Change);
    }

    /// Drop the selection, as on a directory change.
    pub fn clear(&self) {
        self.on_selection_changed(Vec::new(), &[]);
    }

    /// Returns `true` unless the selection cannot be opened right now: files
    /// missing from the cache while Drive is offline, or hosted documents in
    /// a dialog that needs real files.
    #[must_use]
    pub fn is_available(&self) -> bool {
        let selection = self.selection();
        let offline = self.inner.metadata_model.filesystem().drive_connection_state() == DriveConnectionState::Offline;

        let offline_with_uncached = offline && !selection.all_files_present();
        let hosted_in_dialog = self.inner.allowed_paths != AllowedPaths::AnyPathOrUrl && selection.any_files_hosted();
        !offline_with_uncached && !hosted_in_dialog
    }
}

impl<F: FileSystem> Drop for FileSelectionHandler<F> {
    fn drop(&mut self) {
        if let Some(timer) = lock(&self.inner.state).timer.take() {
            timer.abort();
        }
    }
}

impl<F: FileSystem> HandlerInner<F> {
    async fn update_additional(&self, generation: u64, selection: Arc<FileSelection>) {
        if let Err(error) = selection.compute_additional(&self.metadata_model).await {
            tracing::warn!("selection metadata unavailable: {}", error);
        }

        let mut state = lock(&self.state);
        if state.generation != generation {
            tracing::trace!(generation, "stale selection computation dropped");
            return;
        }
        state.last_computed = Some(Instant::now());
        state.timer = None;
        let _ = self.events.send(SelectionEvent::ChangeThrottled);
    }

    /// Push the latest selection to the store at the end of the frame.
    async fn flush_store(&self) {
        tokio::time::sleep(self.config.frame_interval).await;
        let update = {
            let mut state = lock(&self.state);
            state.store_update_pending = false;
            SelectionUpdate {
                selected_keys: state.selection.entries().iter().map(|entry| entry.url().to_owned()).collect(),
                entries: state.selection.entries().to_vec(),
            }
        };
        if let Some(store) = self.store.get() {
            store.dispatch(update);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Metadata, MemoryFileSystem, RootType, VolumeInfo};

    fn listing() -> Vec<Entry> {
        vec![
            Entry::directory("filesystem:drive", "/root/docs").with_volume("drive", RootType::Drive),
            Entry::file("filesystem:drive", "/root/plan.gdoc").with_volume("drive", RootType::Drive),
            Entry::file("filesystem:drive", "/root/photo.jpg").with_volume("drive", RootType::Drive),
        ]
    }

    fn scripted_fs() -> Arc<MemoryFileSystem> {
        let fs = Arc::new(MemoryFileSystem::new());
        let list = listing();
        fs.add_volume(VolumeInfo {
            volume_id: "drive".to_owned(),
            root_type: RootType::Drive,
            read_only: true,
        });
        fs.set_metadata(
            &list[1],
            Metadata {
                hosted: Some(true),
                present: Some(true),
                content_mime_type: Some("application/vnd.google-apps.document".to_owned()),
                ..Metadata::default()
            },
        );
        fs.set_metadata(
            &list[2],
            Metadata {
                present: Some(false),
                content_mime_type: Some("image/jpeg".to_owned()),
                ..Metadata::default()
            },
        );
        fs
    }

    #[tokio::test]
    async fn counts_are_known_before_additional_properties() {
        let fs = scripted_fs();
        let selection = FileSelection::new(&*fs, vec![0, 2, 9], &listing());

        assert_eq!(selection.total_count(), 2);
        assert_eq!(selection.file_count(), 1);
        assert_eq!(selection.directory_count(), 1);
        assert!(selection.has_read_only());
        assert!(selection.any_files_not_in_cache());
        assert!(selection.any_files_hosted());
        assert!(selection.mime_types().is_empty());

        let model = MetadataModel::new(fs);
        selection.compute_additional(&model).await.unwrap();

        assert!(selection.is_additional_computed());
        assert!(!selection.all_files_present());
        assert!(!selection.any_files_hosted());
        assert_eq!(selection.mime_types(), ["", "image/jpeg"]);
    }

    #[tokio::test(start_paused = true)]
    async fn hosted_files_are_unavailable_to_path_dialogs() {
        let fs = scripted_fs();
        let model = Arc::new(MetadataModel::new(fs));
        let handler = FileSelectionHandler::new(model, AllowedPaths::AnyPath, ScanConfig::default());
        let mut events = handler.subscribe();

        handler.on_selection_changed(vec![1], &listing());
        assert_eq!(events.recv().await.unwrap(), SelectionEvent::Change);
        assert!(!handler.is_available());

        assert_eq!(events.recv().await.unwrap(), SelectionEvent::ChangeThrottled);
        assert!(handler.selection().any_files_hosted());
        assert!(!handler.is_available());
    }

    #[tokio::test(start_paused = true)]
    async fn offline_selection_needs_cached_files() {
        let fs = scripted_fs();
        fs.set_connection_state(DriveConnectionState::Offline);
        let model = Arc::new(MetadataModel::new(fs));
        let handler = FileSelectionHandler::new(model, AllowedPaths::AnyPathOrUrl, ScanConfig::default());
        let mut events = handler.subscribe();

        handler.on_selection_changed(vec![1], &listing());
        assert!(!handler.is_available());
        assert_eq!(events.recv().await.unwrap(), SelectionEvent::Change);
        assert_eq!(events.recv().await.unwrap(), SelectionEvent::ChangeThrottled);
        assert!(handler.is_available());

        handler.on_selection_changed(vec![2], &listing());
        assert_eq!(events.recv().await.unwrap(), SelectionEvent::Change);
        assert_eq!(events.recv().await.unwrap(), SelectionEvent::ChangeThrottled);
        assert!(!handler.is_available());
    }

    #[tokio::test(start_paused = true)]
    async fn bulk_selections_wait_the_full_delay() {
        let fs = Arc::new(MemoryFileSystem::new());
        let list: Vec<Entry> = (0..150).map(|i| Entry::file("mem:", &format!("/{i}"))).collect();
        let model = Arc::new(MetadataModel::new(fs));
        let handler = FileSelectionHandler::new(model, AllowedPaths::AnyPathOrUrl, ScanConfig::default());
        let mut events = handler.subscribe();
        let start = Instant::now();

        handler.on_selection_changed((0..150).collect(), &list);
        assert_eq!(events.recv().await.unwrap(), SelectionEvent::Change);
        assert_eq!(events.recv().await.unwrap(), SelectionEvent::ChangeThrottled);

        assert!(start.elapsed() >= Duration::from_millis(200));
    }
}
