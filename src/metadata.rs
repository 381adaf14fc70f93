//! Metadata records and the URL-keyed metadata cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use crate::{filesystem::FileSystem, lock, Entry, Result};

/// A metadata property that can be requested from the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetadataProperty {
    ModificationTime,
    Size,
    /// Whether the file content is available without a network connection.
    Present,
    /// Whether the file is a hosted document with no local content.
    Hosted,
    ContentMimeType,
    CanPin,
}

/// Properties the file list needs to render a row.
pub const LIST_PREFETCH_PROPERTIES: &[MetadataProperty] = &[
    MetadataProperty::ModificationTime,
    MetadataProperty::Size,
    MetadataProperty::Present,
];

/// Properties consulted by file actions.
pub const ACTION_PREFETCH_PROPERTIES: &[MetadataProperty] =
    &[MetadataProperty::Hosted, MetadataProperty::CanPin];

/// Properties consulted when computing the heavy part of a selection.
pub const SELECTION_PREFETCH_PROPERTIES: &[MetadataProperty] = &[
    MetadataProperty::Present,
    MetadataProperty::ContentMimeType,
    MetadataProperty::Hosted,
    MetadataProperty::CanPin,
];

/// A metadata record. Fields the backend did not fill stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub modification_time: Option<SystemTime>,
    pub size: Option<u64>,
    pub present: Option<bool>,
    pub hosted: Option<bool>,
    pub content_mime_type: Option<String>,
    pub can_pin: Option<bool>,
}

/// A cache of metadata records keyed by entry URL, filled from the backing
/// store on demand.
#[derive(Debug)]
pub struct MetadataModel<F: FileSystem> {
    filesystem: Arc<F>,
    cache: Mutex<HashMap<String, Metadata>>,
}

impl<F: FileSystem> MetadataModel<F> {
    pub fn new(filesystem: Arc<F>) -> Self {
        Self {
            filesystem,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the records of `entries`, fetching the ones missing from the
    /// cache in a single backend request.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the fetch fails.
    pub async fn get(
        &self,
        entries: &[Entry],
        properties: &[MetadataProperty],
    ) -> Result<Vec<Metadata>> {
        let missing: Vec<Entry> = {
            let cache = lock(&self.cache);
            entries
                .iter()
                .filter(|entry| !cache.contains_key(entry.url()))
                .cloned()
                .collect()
        };

        if !missing.is_empty() {
            let fetched = self.filesystem.get_metadata(&missing, properties).await?;
            let mut cache = lock(&self.cache);
            for (entry, metadata) in missing.iter().zip(fetched) {
                cache.insert(entry.url().to_owned(), metadata);
            }
        }

        let cache = lock(&self.cache);
        Ok(entries
            .iter()
            .map(|entry| cache.get(entry.url()).cloned().unwrap_or_default())
            .collect())
    }

    /// Returns the cached records of `entries` without touching the backend.
    #[must_use]
    pub fn get_cache(&self, entries: &[Entry]) -> Vec<Option<Metadata>> {
        let cache = lock(&self.cache);
        entries
            .iter()
            .map(|entry| cache.get(entry.url()).cloned())
            .collect()
    }

    /// Drops the cached records of the given URLs.
    pub fn clear<S: AsRef<str>>(&self, urls: &[S]) {
        let mut cache = lock(&self.cache);
        for url in urls {
            cache.remove(url.as_ref());
        }
    }

    pub fn clear_all_cache(&self) {
        lock(&self.cache).clear();
    }

    /// The backing store the model reads from.
    #[must_use]
    pub fn filesystem(&self) -> &Arc<F> {
        &self.filesystem
    }
}
