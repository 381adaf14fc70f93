//! The sorted list of displayed entries and the context it is shared through.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use crate::metadata::{
    ACTION_PREFETCH_PROPERTIES, LIST_PREFETCH_PROPERTIES, SELECTION_PREFETCH_PROPERTIES,
};
use crate::{filesystem::FileSystem, Entry, FileFilter, MetadataModel, MetadataProperty, ScanConfig};

/// Order of names within the directories-first listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// A change applied to a [`FileListModel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileListChange {
    /// `removed` entries were removed at `index` and `added` inserted there.
    Spliced {
        index: usize,
        removed: usize,
        added: usize,
    },
    /// The list was re-sorted.
    Sorted,
    /// The entries at these indexes changed in place.
    Updated(Vec<usize>),
}

/// The canonical, sorted list of displayed entries.
///
/// No two elements share a URL; callers dedupe before pushing.
#[derive(Debug)]
pub struct FileListModel {
    entries: Vec<Entry>,
    direction: SortDirection,
    changes: broadcast::Sender<FileListChange>,
}

impl Default for FileListModel {
    fn default() -> Self {
        Self::new(SortDirection::default())
    }
}

impl FileListModel {
    #[must_use]
    pub fn new(direction: SortDirection) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            entries: Vec::new(),
            direction,
            changes,
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn item(&self, index: usize) -> Option<&Entry> {
        self.entries.get(index)
    }

    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Consume the list, returning its entries in order.
    #[must_use]
    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }

    #[must_use]
    pub fn index_of_url(&self, url: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.url() == url)
    }

    /// The URLs currently listed.
    #[must_use]
    pub fn urls(&self) -> HashSet<String> {
        self.entries.iter().map(|entry| entry.url().to_owned()).collect()
    }

    #[must_use]
    pub const fn sort_direction(&self) -> SortDirection {
        self.direction
    }

    pub fn set_sort_direction(&mut self, direction: SortDirection) {
        self.direction = direction;
        self.sort();
    }

    /// Append `entries` and restore the sort order.
    pub fn push(&mut self, entries: Vec<Entry>) {
        if entries.is_empty() {
            return;
        }
        let index = self.entries.len();
        let added = entries.len();
        self.entries.extend(entries);
        let _ = self.changes.send(FileListChange::Spliced {
            index,
            removed: 0,
            added,
        });
        self.sort();
    }

    /// Remove `count` entries starting at `index`, returning them.
    pub fn splice(&mut self, index: usize, count: usize) -> Vec<Entry> {
        let start = index.min(self.entries.len());
        let end = (start + count).min(self.entries.len());
        let removed: Vec<Entry> = self.entries.drain(start..end).collect();
        if !removed.is_empty() {
            let _ = self.changes.send(FileListChange::Spliced {
                index: start,
                removed: removed.len(),
                added: 0,
            });
        }
        removed
    }

    /// Replace the entry at `index` without moving it.
    pub fn replace_item(&mut self, index: usize, entry: Entry) {
        if let Some(slot) = self.entries.get_mut(index) {
            *slot = entry;
            let _ = self.changes.send(FileListChange::Updated(vec![index]));
        }
    }

    /// Swap the whole content of the list for `entries`.
    pub fn replace_all(&mut self, entries: Vec<Entry>) {
        let removed = self.entries.len();
        let added = entries.len();
        self.entries = entries;
        let _ = self.changes.send(FileListChange::Spliced {
            index: 0,
            removed,
            added,
        });
        self.sort();
    }

    /// Announce that the entries at `indexes` changed.
    pub fn update_indexes(&self, indexes: Vec<usize>) {
        if !indexes.is_empty() {
            let _ = self.changes.send(FileListChange::Updated(indexes));
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<FileListChange> {
        self.changes.subscribe()
    }

    fn sort(&mut self) {
        let direction = self.direction;
        let sorted = self
            .entries
            .windows(2)
            .all(|pair| compare(&pair[0], &pair[1], direction) != Ordering::Greater);
        if sorted {
            return;
        }
        self.entries.sort_by(|a, b| compare(a, b, direction));
        let _ = self.changes.send(FileListChange::Sorted);
    }
}

// Directories first, then names case-insensitively.
fn compare(a: &Entry, b: &Entry, direction: SortDirection) -> Ordering {
    match (a.is_dir(), b.is_dir()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => {
            let by_name = a
                .name()
                .to_lowercase()
                .cmp(&b.name().to_lowercase())
                .then_with(|| a.name().cmp(b.name()));
            match direction {
                SortDirection::Ascending => by_name,
                SortDirection::Descending => by_name.reverse(),
            }
        }
    }
}

/// Everything a scan shares with the rest of the browser: the displayed list,
/// the metadata cache and the visibility filter.
pub struct FileListContext<F: FileSystem> {
    pub file_filter: Arc<FileFilter>,
    pub metadata_model: Arc<MetadataModel<F>>,
    pub file_list: Arc<Mutex<FileListModel>>,
    pub prefetch_properties: Vec<MetadataProperty>,
    pub config: ScanConfig,
}

impl<F: FileSystem> Clone for FileListContext<F> {
    fn clone(&self) -> Self {
        Self {
            file_filter: Arc::clone(&self.file_filter),
            metadata_model: Arc::clone(&self.metadata_model),
            file_list: Arc::clone(&self.file_list),
            prefetch_properties: self.prefetch_properties.clone(),
            config: self.config.clone(),
        }
    }
}

impl<F: FileSystem> FileListContext<F> {
    pub fn new(filesystem: Arc<F>, file_filter: Arc<FileFilter>, config: ScanConfig) -> Self {
        let prefetch_properties = LIST_PREFETCH_PROPERTIES
            .iter()
            .chain(ACTION_PREFETCH_PROPERTIES)
            .chain(SELECTION_PREFETCH_PROPERTIES)
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Self {
            file_filter,
            metadata_model: Arc::new(MetadataModel::new(filesystem)),
            file_list: Arc::new(Mutex::new(FileListModel::default())),
            prefetch_properties,
            config,
        }
    }

    /// The backing store of the context.
    #[must_use]
    pub fn filesystem(&self) -> &Arc<F> {
        self.metadata_model.filesystem()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &FileListModel) -> Vec<&str> {
        list.entries().iter().map(Entry::name).collect()
    }

    #[test]
    fn push_keeps_directories_first_and_names_sorted() {
        let mut list = FileListModel::default();
        list.push(vec![
            Entry::file("mem:", "/b.txt"),
            Entry::directory("mem:", "/Zeta"),
            Entry::file("mem:", "/A.txt"),
        ]);
        list.push(vec![Entry::directory("mem:", "/alpha")]);

        assert_eq!(names(&list), vec!["alpha", "Zeta", "A.txt", "b.txt"]);

        list.set_sort_direction(SortDirection::Descending);
        assert_eq!(names(&list), vec!["Zeta", "alpha", "b.txt", "A.txt"]);
    }

    #[test]
    fn splice_and_replace_are_announced() {
        let mut list = FileListModel::default();
        list.push(vec![
            Entry::file("mem:", "/a"),
            Entry::file("mem:", "/b"),
            Entry::file("mem:", "/c"),
        ]);
        let mut changes = list.subscribe();

        let removed = list.splice(1, 5);
        assert_eq!(removed.len(), 2);
        list.replace_item(0, Entry::file("mem:", "/a"));
        list.update_indexes(Vec::new());

        assert_eq!(
            changes.try_recv().unwrap(),
            FileListChange::Spliced {
                index: 1,
                removed: 2,
                added: 0
            }
        );
        assert_eq!(changes.try_recv().unwrap(), FileListChange::Updated(vec![0]));
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn prefetch_properties_are_deduplicated() {
        let fs = Arc::new(crate::MemoryFileSystem::new());
        let context = FileListContext::new(fs, Arc::new(FileFilter::new()), ScanConfig::default());
        let unique: BTreeSet<_> = context.prefetch_properties.iter().collect();

        assert_eq!(unique.len(), context.prefetch_properties.len());
        assert!(context.prefetch_properties.contains(&MetadataProperty::Hosted));
        assert!(context.prefetch_properties.contains(&MetadataProperty::ModificationTime));
    }
}
