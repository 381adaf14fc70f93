use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{check_cancelled, read_entries_recursively, ScanSink};
use crate::filesystem::{DriveSearchParams, DriveSearchType, FileCategory, FileSystem};
use crate::{Entry, Result, ScanConfig, ScanError};

/// Full-text search over Drive.
///
/// The request is held back for a short delay so that a newer search (the next
/// keystroke) can cancel this one before it reaches the network. Results are
/// capped at a fixed maximum.
pub struct DriveSearchContentScanner<F: FileSystem> {
    filesystem: Arc<F>,
    query: String,
    category: FileCategory,
    delay: Duration,
    max_results: usize,
    pub(crate) token: CancellationToken,
}

impl<F: FileSystem> DriveSearchContentScanner<F> {
    pub fn new(
        filesystem: Arc<F>,
        query: impl Into<String>,
        category: FileCategory,
        token: CancellationToken,
    ) -> Self {
        let config = ScanConfig::default();
        Self {
            filesystem,
            query: query.into(),
            category,
            delay: config.drive_search_delay,
            max_results: config.drive_max_results,
            token,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: &ScanConfig) -> Self {
        self.delay = config.drive_search_delay;
        self.max_results = config.drive_max_results;
        self
    }

    pub(crate) async fn scan(&self, sink: &ScanSink) {
        sink.finish(self.search(sink).await);
    }

    async fn search(&self, sink: &ScanSink) -> Result<()> {
        tokio::select! {
            biased;
            () = self.token.cancelled() => return Err(ScanError::Abort),
            () = tokio::time::sleep(self.delay) => {}
        }

        tracing::debug!(query = %self.query, "searching Drive");
        let page = self
            .filesystem
            .search_drive(DriveSearchParams {
                query: self.query.trim().to_owned(),
                category: self.category,
                cursor: None,
                modified_after: None,
            })
            .await
            .inspect_err(|e| tracing::warn!("Drive search failed: {}", e))?;
        check_cancelled(&self.token)?;

        let mut entries = page.entries;
        if entries.len() > self.max_results {
            tracing::debug!(received = entries.len(), "truncating Drive search results");
            entries.truncate(self.max_results);
        }
        sink.entries(entries);
        Ok(())
    }
}

/// Case-insensitive name search over a local subtree.
pub struct LocalSearchContentScanner<F: FileSystem> {
    filesystem: Arc<F>,
    entry: Entry,
    query: String,
    pub(crate) token: CancellationToken,
}

impl<F: FileSystem> LocalSearchContentScanner<F> {
    pub fn new(filesystem: Arc<F>, entry: Entry, query: &str, token: CancellationToken) -> Self {
        Self {
            filesystem,
            entry,
            query: query.to_lowercase(),
            token,
        }
    }

    pub(crate) async fn scan(&self, sink: &ScanSink) {
        let query = self.query.as_str();
        let result = read_entries_recursively(&*self.filesystem, &self.entry, &self.token, |batch| {
            sink.entries(
                batch
                    .into_iter()
                    .filter(|entry| entry.name().to_lowercase().contains(query))
                    .collect(),
            );
        })
        .await;
        sink.finish(result);
    }
}

/// Lists one of the Drive metadata views (shared with me, offline...).
pub struct DriveMetadataSearchContentScanner<F: FileSystem> {
    filesystem: Arc<F>,
    search_type: DriveSearchType,
    max_results: usize,
    pub(crate) token: CancellationToken,
}

impl<F: FileSystem> DriveMetadataSearchContentScanner<F> {
    pub fn new(filesystem: Arc<F>, search_type: DriveSearchType, token: CancellationToken) -> Self {
        Self {
            filesystem,
            search_type,
            max_results: ScanConfig::default().drive_max_results,
            token,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: &ScanConfig) -> Self {
        self.max_results = config.drive_max_results;
        self
    }

    pub(crate) async fn scan(&self, sink: &ScanSink) {
        sink.finish(self.search(sink).await);
    }

    async fn search(&self, sink: &ScanSink) -> Result<()> {
        let entries = self
            .filesystem
            .search_drive_metadata(self.search_type, self.max_results)
            .await;
        check_cancelled(&self.token)?;

        let mut entries = entries.inspect_err(|e| {
            tracing::warn!(search_type = ?self.search_type, "Drive metadata search failed: {}", e);
        })?;
        entries.truncate(self.max_results);
        sink.entries(entries);
        Ok(())
    }
}
